use serde::{Deserialize, Serialize};
use std::path::Path;
use wonderlands_fluid::{ConfigError, WaterConfig};

use crate::error::SettingsError;
use crate::kernel::MAX_KERNEL_SIZE;

/// Feature toggles and tuning for the pipeline. Read once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub width: u32,
    pub height: u32,
    pub shadows: bool,
    pub ssao: bool,
    pub fxaa: bool,
    pub bloom: bool,
    pub dof: bool,
    pub god_rays: bool,
    pub wireframe: bool,
    pub shadow_resolution: u32,
    pub shadow_bias: f32,
    /// Half-width of the orthographic shadow volume around the camera.
    pub shadow_extent: f32,
    pub ao_kernel_size: usize,
    pub ao_radius: f32,
    pub ao_bias: f32,
    pub exposure: f32,
    pub bloom_threshold: f32,
    pub bloom_intensity: f32,
    /// Separable blur iterations across the ping-pong pair.
    pub bloom_blur_passes: u32,
    pub dof_focal_distance: f32,
    pub dof_focal_range: f32,
    /// Cap on lights sent to the lighting pass.
    pub max_lights: usize,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            shadows: true,
            ssao: true,
            fxaa: true,
            bloom: true,
            dof: true,
            god_rays: true,
            wireframe: false,
            shadow_resolution: 4096,
            shadow_bias: 0.005,
            shadow_extent: 100.0,
            ao_kernel_size: MAX_KERNEL_SIZE,
            ao_radius: 0.5,
            ao_bias: 0.025,
            exposure: 1.0,
            bloom_threshold: 0.8,
            bloom_intensity: 0.5,
            bloom_blur_passes: 10,
            dof_focal_distance: 20.0,
            dof_focal_range: 10.0,
            max_lights: 64,
        }
    }
}

impl RendererSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, v) in [("width", self.width), ("height", self.height)] {
            if v == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.shadow_resolution == 0 {
            return Err(ConfigError::Zero {
                field: "shadow_resolution",
            });
        }
        if self.ao_kernel_size == 0 {
            return Err(ConfigError::Zero {
                field: "ao_kernel_size",
            });
        }
        if self.ao_kernel_size > MAX_KERNEL_SIZE {
            return Err(ConfigError::TooLarge {
                field: "ao_kernel_size",
                value: self.ao_kernel_size,
                max: MAX_KERNEL_SIZE,
            });
        }
        if self.max_lights > crate::uniforms::MAX_LIGHTS {
            return Err(ConfigError::TooLarge {
                field: "max_lights",
                value: self.max_lights,
                max: crate::uniforms::MAX_LIGHTS,
            });
        }
        if self.bloom && self.bloom_blur_passes == 0 {
            return Err(ConfigError::Zero {
                field: "bloom_blur_passes",
            });
        }
        for (field, v) in [
            ("shadow_extent", self.shadow_extent),
            ("ao_radius", self.ao_radius),
            ("exposure", self.exposure),
            ("dof_focal_range", self.dof_focal_range),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(ConfigError::NonPositive { field, value: v });
            }
        }
        for (field, v) in [
            ("shadow_bias", self.shadow_bias),
            ("ao_bias", self.ao_bias),
            ("bloom_threshold", self.bloom_threshold),
            ("bloom_intensity", self.bloom_intensity),
            ("dof_focal_distance", self.dof_focal_distance),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(ConfigError::Negative { field, value: v });
            }
        }
        Ok(())
    }
}

/// Everything the engine reads from its config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub renderer: RendererSettings,
    pub water: WaterConfig,
}

impl EngineConfig {
    /// Load from `.yaml`/`.yml` or `.json`, chosen by extension, then validate.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let config: EngineConfig = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&text)?,
            "json" => serde_json::from_str(&text)?,
            other => return Err(SettingsError::UnsupportedFormat(other.to_string())),
        };
        config.validate()?;
        tracing::info!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.renderer.validate()?;
        self.water.validate()
    }

    pub fn to_yaml(&self) -> Result<String, SettingsError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
