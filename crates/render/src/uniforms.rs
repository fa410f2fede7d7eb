//! GPU uniform blocks. Field order and padding mirror the WGSL structs.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wonderlands_common::{Light, LightKind, TimeOfDay, Weather};
use wonderlands_fluid::WaterFlow;

use crate::camera::FlyCamera;
use crate::kernel::SampleKernel;
use crate::scene::Scene;
use crate::settings::RendererSettings;

pub const MAX_LIGHTS: usize = 64;

/// Finite stand-in for an unbounded light range.
const UNBOUNDED_RANGE: f32 = 1.0e6;
const SUN_COLOR: Vec3 = Vec3::new(1.0, 0.95, 0.85);
const DAY_SKY: Vec3 = Vec3::new(0.55, 0.7, 0.9);
const NIGHT_SKY: Vec3 = Vec3::new(0.02, 0.03, 0.06);

/// Shared by every pass, bound at [`crate::UniformSlot::Frame`].
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    /// xyz position, w time of day.
    pub camera_position: [f32; 4],
    /// xyz unit vector toward the sun, w daylight.
    pub sun_direction: [f32; 4],
    /// rgb color, w intensity.
    pub sun_color: [f32; 4],
    /// rgb color, w density.
    pub fog: [f32; 4],
    /// width, height, 1/width, 1/height.
    pub viewport: [f32; 4],
    /// elapsed seconds, shadow bias, water height, water move factor.
    pub params: [f32; 4],
}

/// Inputs for [`FrameUniforms::build`] that do not come from the frame context.
#[derive(Debug, Clone, Copy)]
pub struct FrameParams<'a> {
    pub settings: &'a RendererSettings,
    pub viewport: (u32, u32),
    pub elapsed: f32,
    pub water: Option<&'a WaterFlow>,
}

impl FrameUniforms {
    pub fn build(
        scene: &Scene,
        camera: &FlyCamera,
        time_of_day: TimeOfDay,
        weather: Weather,
        params: FrameParams<'_>,
    ) -> Self {
        let (toward_sun, color, intensity) = match scene.sun() {
            Some(sun) => (-sun.direction, sun.color, sun.intensity),
            None => (time_of_day.sun_direction(), SUN_COLOR, time_of_day.daylight()),
        };
        let daylight = time_of_day.daylight();
        let sky = NIGHT_SKY.lerp(DAY_SKY, daylight);
        let (w, h) = (params.viewport.0.max(1) as f32, params.viewport.1.max(1) as f32);
        let (water_height, move_factor) = params
            .water
            .map(|f| (f.config().height, f.move_factor()))
            .unwrap_or((0.0, 0.0));
        let light_view_proj =
            light_view_projection(-toward_sun, camera.position, params.settings.shadow_extent);

        Self {
            view: camera.view_matrix().to_cols_array_2d(),
            projection: camera.projection_matrix().to_cols_array_2d(),
            view_proj: camera.view_projection().to_cols_array_2d(),
            light_view_proj: light_view_proj.to_cols_array_2d(),
            camera_position: camera.position.extend(time_of_day.fraction()).to_array(),
            sun_direction: toward_sun.normalize_or(Vec3::Y).extend(daylight).to_array(),
            sun_color: color.extend(intensity).to_array(),
            fog: sky.extend(weather.fog_density()).to_array(),
            viewport: [w, h, 1.0 / w, 1.0 / h],
            params: [
                params.elapsed,
                params.settings.shadow_bias,
                water_height,
                move_factor,
            ],
        }
    }

    /// Copy with the camera matrices swapped for `camera`'s.
    pub fn with_camera(&self, camera: &FlyCamera) -> Self {
        Self {
            view: camera.view_matrix().to_cols_array_2d(),
            projection: camera.projection_matrix().to_cols_array_2d(),
            view_proj: camera.view_projection().to_cols_array_2d(),
            camera_position: camera.position.extend(self.camera_position[3]).to_array(),
            ..*self
        }
    }

    pub fn with_viewport(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        Self {
            viewport: [w, h, 1.0 / w, 1.0 / h],
            ..*self
        }
    }
}

/// Orthographic light-space matrix centred on `focus`. `direction` is the
/// direction light travels.
pub fn light_view_projection(direction: Vec3, focus: Vec3, extent: f32) -> Mat4 {
    let dir = direction.normalize_or(Vec3::NEG_Y);
    let up = if dir.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
    let eye = focus - dir * extent * 2.0;
    let view = Mat4::look_at_rh(eye, focus, up);
    let proj = Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.1, extent * 4.0);
    proj * view
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// xyz position, w range.
    pub position_range: [f32; 4],
    /// xyz direction, w kind (0 directional, 1 point, 2 spot).
    pub direction_kind: [f32; 4],
    /// rgb color, w intensity.
    pub color_intensity: [f32; 4],
    /// inner cutoff, outer cutoff, casts shadows, unused.
    pub cone: [f32; 4],
}

impl From<&Light> for GpuLight {
    fn from(l: &Light) -> Self {
        let kind = match l.kind {
            LightKind::Directional => 0.0,
            LightKind::Point => 1.0,
            LightKind::Spot => 2.0,
        };
        let range = if l.range.is_finite() {
            l.range
        } else {
            UNBOUNDED_RANGE
        };
        Self {
            position_range: l.position.extend(range).to_array(),
            direction_kind: l.direction.extend(kind).to_array(),
            color_intensity: l.color.extend(l.intensity).to_array(),
            cone: [
                l.inner_cutoff,
                l.outer_cutoff,
                if l.casts_shadows { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct LightsUniforms {
    pub lights: [GpuLight; MAX_LIGHTS],
    /// x light count.
    pub count: [u32; 4],
}

impl LightsUniforms {
    /// Pack up to `limit` lights. Extra lights are dropped with a warning.
    pub fn pack(lights: &[Light], limit: usize) -> Self {
        let limit = limit.min(MAX_LIGHTS);
        if lights.len() > limit {
            tracing::warn!(
                lights = lights.len(),
                limit,
                "too many lights, extra lights ignored"
            );
        }
        let mut out = Self::zeroed();
        let mut n = 0;
        for (slot, light) in out.lights.iter_mut().zip(lights.iter().take(limit)) {
            *slot = GpuLight::from(light);
            n += 1;
        }
        out.count[0] = n;
        out
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SsaoUniforms {
    pub samples: [[f32; 4]; 64],
    /// radius, bias, noise scale x, noise scale y.
    pub params: [f32; 4],
    /// x sample count.
    pub count: [u32; 4],
}

impl SsaoUniforms {
    pub fn new(kernel: &SampleKernel, settings: &RendererSettings, viewport: (u32, u32)) -> Self {
        let dim = crate::kernel::NOISE_DIM as f32;
        Self {
            samples: kernel.uniform_samples(),
            params: [
                settings.ao_radius,
                settings.ao_bias,
                viewport.0.max(1) as f32 / dim,
                viewport.1.max(1) as f32 / dim,
            ],
            count: [kernel.len() as u32, 0, 0, 0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct BlurUniforms {
    /// x 1 for horizontal, 0 for vertical.
    pub direction: [f32; 4],
}

impl BlurUniforms {
    pub fn new(horizontal: bool) -> Self {
        Self {
            direction: [if horizontal { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PostUniforms {
    /// exposure, bloom intensity, bloom threshold, unused.
    pub tone: [f32; 4],
    /// focal distance, focal range, unused, unused.
    pub focus: [f32; 4],
    /// bloom, depth of field, fxaa, god rays.
    pub flags: [u32; 4],
}

impl PostUniforms {
    pub fn new(settings: &RendererSettings, bloom_active: bool) -> Self {
        Self {
            tone: [
                settings.exposure,
                settings.bloom_intensity,
                settings.bloom_threshold,
                0.0,
            ],
            focus: [settings.dof_focal_distance, settings.dof_focal_range, 0.0, 0.0],
            flags: [
                bloom_active as u32,
                settings.dof as u32,
                settings.fxaa as u32,
                settings.god_rays as u32,
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct WaterUniforms {
    /// height, wave height, wave frequency, move factor.
    pub surface: [f32; 4],
    /// origin x, origin z, extent, grid size.
    pub grid: [f32; 4],
}

impl WaterUniforms {
    pub fn new(flow: &WaterFlow) -> Self {
        let c = flow.config();
        Self {
            surface: [c.height, c.wave_height, c.wave_frequency, flow.move_factor()],
            grid: [
                c.origin.x,
                c.origin.y,
                c.flow.extent(),
                c.flow.grid_size as f32,
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ForwardUniforms {
    /// Plane (normal, distance); fragments with `dot(n, p) + d < 0` are clipped.
    pub clip_plane: [f32; 4],
}

impl ForwardUniforms {
    /// Keep geometry above `height`.
    pub fn above(height: f32) -> Self {
        Self {
            clip_plane: [0.0, 1.0, 0.0, -height],
        }
    }

    /// Keep geometry below `height`.
    pub fn below(height: f32) -> Self {
        Self {
            clip_plane: [0.0, -1.0, 0.0, height],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    #[test]
    fn block_sizes_are_16_byte_multiples() {
        for size in [
            std::mem::size_of::<FrameUniforms>(),
            std::mem::size_of::<LightsUniforms>(),
            std::mem::size_of::<SsaoUniforms>(),
            std::mem::size_of::<BlurUniforms>(),
            std::mem::size_of::<PostUniforms>(),
            std::mem::size_of::<WaterUniforms>(),
            std::mem::size_of::<ForwardUniforms>(),
        ] {
            assert_eq!(size % 16, 0);
        }
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 352);
    }

    #[test]
    fn sun_falls_back_to_time_of_day() {
        let scene = Scene::new();
        let cam = FlyCamera::default();
        let settings = RendererSettings::default();
        let u = FrameUniforms::build(
            &scene,
            &cam,
            TimeOfDay::NOON,
            Weather::Fog,
            FrameParams {
                settings: &settings,
                viewport: (1280, 720),
                elapsed: 1.5,
                water: None,
            },
        );
        assert!(u.sun_direction[1] > 0.9);
        assert_eq!(u.fog[3], Weather::Fog.fog_density());
        assert_eq!(u.viewport[0], 1280.0);
        assert_eq!(u.params[..2], [1.5, 0.005]);
    }

    #[test]
    fn scene_sun_points_against_light_travel() {
        let mut scene = Scene::new();
        scene.lights.push(Light::directional(Vec3::new(0.0, -1.0, 0.0), Vec3::ONE, 2.0));
        let settings = RendererSettings::default();
        let u = FrameUniforms::build(
            &scene,
            &FlyCamera::default(),
            TimeOfDay::new(0.0),
            Weather::Clear,
            FrameParams {
                settings: &settings,
                viewport: (0, 0),
                elapsed: 0.0,
                water: None,
            },
        );
        assert_eq!(u.sun_direction[..3], [0.0, 1.0, 0.0]);
        assert_eq!(u.sun_color[3], 2.0);
        assert_eq!(u.viewport[..2], [1.0, 1.0]);
    }

    #[test]
    fn light_space_contains_focus() {
        let m = light_view_projection(Vec3::new(-0.3, -1.0, 0.2), Vec3::new(10.0, 0.0, 5.0), 50.0);
        let p = m.project_point3(Vec3::new(10.0, 0.0, 5.0));
        assert!(p.x.abs() < 1e-3 && p.y.abs() < 1e-3);
        assert!(p.z > 0.0 && p.z < 1.0);
    }

    #[test]
    fn lights_are_capped() {
        let lights = vec![Light::point(Vec3::ZERO, Vec3::ONE, 1.0, 5.0); 80];
        let u = LightsUniforms::pack(&lights, 64);
        assert_eq!(u.count[0], 64);
        let u = LightsUniforms::pack(&lights[..3], 64);
        assert_eq!(u.count[0], 3);
        assert_eq!(u.lights[0].direction_kind[3], 1.0);
    }

    #[test]
    fn unbounded_range_is_finite_on_gpu() {
        let l = Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0);
        assert!(GpuLight::from(&l).position_range[3].is_finite());
    }
}
