use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::backend::{ProgramHandle, ShaderLoader};
use crate::error::ShaderError;

/// Every program the pipeline can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShaderPass {
    GBuffer,
    ShadowMap,
    Ssao,
    SsaoBlur,
    Lighting,
    Skybox,
    Water,
    Particle,
    /// Simple lit forward shading for the water reflection and refraction views.
    Forward,
    BrightPass,
    Blur,
    PostProcess,
}

impl ShaderPass {
    pub const ALL: [ShaderPass; 12] = [
        ShaderPass::GBuffer,
        ShaderPass::ShadowMap,
        ShaderPass::Ssao,
        ShaderPass::SsaoBlur,
        ShaderPass::Lighting,
        ShaderPass::Skybox,
        ShaderPass::Water,
        ShaderPass::Particle,
        ShaderPass::Forward,
        ShaderPass::BrightPass,
        ShaderPass::Blur,
        ShaderPass::PostProcess,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShaderPass::GBuffer => "gbuffer",
            ShaderPass::ShadowMap => "shadow_map",
            ShaderPass::Ssao => "ssao",
            ShaderPass::SsaoBlur => "ssao_blur",
            ShaderPass::Lighting => "lighting",
            ShaderPass::Skybox => "skybox",
            ShaderPass::Water => "water",
            ShaderPass::Particle => "particle",
            ShaderPass::Forward => "forward",
            ShaderPass::BrightPass => "bright_pass",
            ShaderPass::Blur => "blur",
            ShaderPass::PostProcess => "post_process",
        }
    }

    /// Without these there is no frame to show.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            ShaderPass::GBuffer | ShaderPass::Lighting | ShaderPass::PostProcess
        )
    }
}

impl fmt::Display for ShaderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Linked programs, one per pass.
///
/// Required programs are always present. An optional program that failed to
/// load is absent and the feature depending on it is switched off.
#[derive(Debug, Clone, Default)]
pub struct ShaderSet {
    programs: BTreeMap<ShaderPass, ProgramHandle>,
}

impl ShaderSet {
    /// Load every pass through `loader`.
    pub fn load(loader: &mut dyn ShaderLoader) -> Result<Self, ShaderError> {
        Self::from_results(
            ShaderPass::ALL
                .into_iter()
                .map(|pass| (pass, loader.load_program(pass))),
        )
    }

    /// Build a set from per-pass load outcomes, applying the required/optional rule.
    pub fn from_results(
        results: impl IntoIterator<Item = (ShaderPass, Result<ProgramHandle, ShaderError>)>,
    ) -> Result<Self, ShaderError> {
        let mut programs = BTreeMap::new();
        for (pass, result) in results {
            let checked = result.and_then(|handle| {
                if handle.is_valid() {
                    Ok(handle)
                } else {
                    Err(ShaderError::InvalidHandle { pass })
                }
            });
            match checked {
                Ok(handle) => {
                    programs.insert(pass, handle);
                }
                Err(e) if pass.is_required() => return Err(e),
                Err(e) => {
                    tracing::warn!(shader = %pass, error = %e, "optional shader unavailable, feature disabled");
                }
            }
        }
        if let Some(&pass) = ShaderPass::ALL
            .iter()
            .find(|p| p.is_required() && !programs.contains_key(p))
        {
            return Err(ShaderError::InvalidHandle { pass });
        }
        Ok(Self { programs })
    }

    pub fn get(&self, pass: ShaderPass) -> Option<ProgramHandle> {
        self.programs.get(&pass).copied()
    }

    pub fn has(&self, pass: ShaderPass) -> bool {
        self.programs.contains_key(&pass)
    }

    pub fn has_all(&self, passes: &[ShaderPass]) -> bool {
        passes.iter().all(|p| self.has(*p))
    }

    pub fn missing(&self) -> impl Iterator<Item = ShaderPass> + '_ {
        ShaderPass::ALL.into_iter().filter(|p| !self.has(*p))
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
