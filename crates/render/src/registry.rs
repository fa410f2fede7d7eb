//! Owns every texture and framebuffer the pipeline renders into.
//!
//! # Invariants
//! - Each handle is created once and destroyed once, by this registry.
//! - A failed allocation destroys whatever it had already created.
//! - Viewport-sized targets follow the window; fixed targets never resize.

use crate::backend::{
    FramebufferDesc, FramebufferHandle, FramebufferStatus, GpuBackend, TextureDesc, TextureFormat,
    TextureHandle,
};
use crate::error::ResourceError;
use crate::kernel::NOISE_DIM;

/// What to allocate. Built from the renderer settings and water config.
#[derive(Debug, Clone, PartialEq)]
pub struct PassSpec {
    pub width: u32,
    pub height: u32,
    /// Square shadow map edge, or `None` with shadows off.
    pub shadow_resolution: Option<u32>,
    pub ambient_occlusion: bool,
    pub bloom: bool,
    pub water: Option<WaterSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterSpec {
    pub reflection: [u32; 2],
    pub refraction: [u32; 2],
    /// Flow map edge in cells.
    pub flow_grid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GBuffer {
    pub position: TextureHandle,
    pub normal: TextureHandle,
    pub albedo: TextureHandle,
    pub material: TextureHandle,
    pub framebuffer: FramebufferHandle,
}

/// A color target with its framebuffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTarget {
    pub color: TextureHandle,
    pub framebuffer: FramebufferHandle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AoTargets {
    pub raw: ColorTarget,
    pub blurred: ColorTarget,
}

/// Targets sized to the viewport, rebuilt on resize.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportTargets {
    pub width: u32,
    pub height: u32,
    /// Shared by the G-buffer and HDR framebuffers.
    pub depth: TextureHandle,
    pub gbuffer: GBuffer,
    pub hdr: ColorTarget,
    pub ao: Option<AoTargets>,
    pub ping_pong: Option<[ColorTarget; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowTargets {
    /// Light-space depth as a sampleable color channel.
    pub light_depth: TextureHandle,
    pub depth: TextureHandle,
    pub framebuffer: FramebufferHandle,
    pub resolution: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterTargets {
    pub reflection: ColorTarget,
    pub reflection_depth: TextureHandle,
    pub refraction: ColorTarget,
    pub refraction_depth: TextureHandle,
    /// Per-cell flow data uploaded each frame.
    pub flow: TextureHandle,
    pub reflection_size: [u32; 2],
    pub refraction_size: [u32; 2],
}

/// Targets whose size does not depend on the viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedTargets {
    pub noise: TextureHandle,
    /// 1x1 white texel bound where an optional input is absent.
    pub neutral: TextureHandle,
    pub shadow: Option<ShadowTargets>,
    pub water: Option<WaterTargets>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameTargets {
    pub viewport: ViewportTargets,
    pub fixed: FixedTargets,
}

#[derive(Debug)]
pub struct ResourceRegistry {
    spec: PassSpec,
    targets: Option<FrameTargets>,
}

impl ResourceRegistry {
    /// Create every target `spec` asks for. Zero viewport dimensions are
    /// clamped to 1.
    pub fn allocate(backend: &mut dyn GpuBackend, spec: PassSpec) -> Result<Self, ResourceError> {
        let mut builder = Builder::new(backend);
        let viewport = build_viewport(&mut builder, &spec, spec.width, spec.height);
        let fixed = viewport.and_then(|v| build_fixed(&mut builder, &spec).map(|f| (v, f)));
        match fixed {
            Ok((viewport, fixed)) => {
                let (textures, framebuffers) = builder.commit();
                tracing::info!(
                    backend = backend.name(),
                    width = viewport.width,
                    height = viewport.height,
                    textures,
                    framebuffers,
                    "frame targets allocated"
                );
                Ok(Self {
                    spec,
                    targets: Some(FrameTargets { viewport, fixed }),
                })
            }
            Err(e) => {
                builder.rollback();
                tracing::error!(error = %e, "frame target allocation failed");
                Err(e)
            }
        }
    }

    pub fn spec(&self) -> &PassSpec {
        &self.spec
    }

    pub fn targets(&self) -> Result<&FrameTargets, ResourceError> {
        self.targets.as_ref().ok_or(ResourceError::AlreadyReleased)
    }

    pub fn is_released(&self) -> bool {
        self.targets.is_none()
    }

    /// Rebuild the viewport-sized targets. On failure the old targets stay live.
    pub fn resize(&mut self, backend: &mut dyn GpuBackend, width: u32, height: u32) -> Result<(), ResourceError> {
        let Some(targets) = self.targets.as_mut() else {
            return Err(ResourceError::AlreadyReleased);
        };
        let (width, height) = (width.max(1), height.max(1));
        if targets.viewport.width == width && targets.viewport.height == height {
            return Ok(());
        }
        let mut builder = Builder::new(backend);
        let fresh = match build_viewport(&mut builder, &self.spec, width, height) {
            Ok(v) => {
                builder.commit();
                v
            }
            Err(e) => {
                builder.rollback();
                tracing::warn!(width, height, error = %e, "resize failed, keeping previous targets");
                return Err(e);
            }
        };
        let old = std::mem::replace(&mut targets.viewport, fresh);
        destroy_viewport(backend, &old);
        self.spec.width = width;
        self.spec.height = height;
        tracing::debug!(width, height, "viewport targets resized");
        Ok(())
    }

    /// Destroy everything. A second call is rejected and changes nothing.
    pub fn release(&mut self, backend: &mut dyn GpuBackend) -> Result<(), ResourceError> {
        let Some(targets) = self.targets.take() else {
            tracing::warn!("frame targets released twice");
            return Err(ResourceError::AlreadyReleased);
        };
        destroy_viewport(backend, &targets.viewport);
        let f = &targets.fixed;
        if let Some(s) = &f.shadow {
            backend.destroy_framebuffer(s.framebuffer);
            backend.destroy_texture(s.light_depth);
            backend.destroy_texture(s.depth);
        }
        if let Some(w) = &f.water {
            for t in [w.reflection, w.refraction] {
                backend.destroy_framebuffer(t.framebuffer);
                backend.destroy_texture(t.color);
            }
            backend.destroy_texture(w.reflection_depth);
            backend.destroy_texture(w.refraction_depth);
            backend.destroy_texture(w.flow);
        }
        backend.destroy_texture(f.noise);
        backend.destroy_texture(f.neutral);
        tracing::debug!("frame targets released");
        Ok(())
    }
}

fn destroy_viewport(backend: &mut dyn GpuBackend, v: &ViewportTargets) {
    let g = &v.gbuffer;
    backend.destroy_framebuffer(g.framebuffer);
    for t in [g.position, g.normal, g.albedo, g.material] {
        backend.destroy_texture(t);
    }
    let mut targets = vec![v.hdr];
    if let Some(ao) = &v.ao {
        targets.extend([ao.raw, ao.blurred]);
    }
    if let Some(pp) = &v.ping_pong {
        targets.extend(pp.iter().copied());
    }
    for t in targets {
        backend.destroy_framebuffer(t.framebuffer);
        backend.destroy_texture(t.color);
    }
    backend.destroy_texture(v.depth);
}

/// Tracks handles created during one allocation so a failure can undo them.
struct Builder<'a> {
    backend: &'a mut dyn GpuBackend,
    textures: Vec<TextureHandle>,
    framebuffers: Vec<FramebufferHandle>,
}

impl<'a> Builder<'a> {
    fn new(backend: &'a mut dyn GpuBackend) -> Self {
        Self {
            backend,
            textures: Vec::new(),
            framebuffers: Vec::new(),
        }
    }

    fn texture(&mut self, desc: TextureDesc) -> Result<TextureHandle, ResourceError> {
        let handle = self.backend.create_texture(&desc)?;
        self.textures.push(handle);
        Ok(handle)
    }

    fn target(&mut self, label: &str, width: u32, height: u32, format: TextureFormat) -> Result<TextureHandle, ResourceError> {
        self.texture(TextureDesc::target(label, width, height, format))
    }

    fn framebuffer(
        &mut self,
        label: &str,
        color: Vec<TextureHandle>,
        depth: Option<TextureHandle>,
    ) -> Result<FramebufferHandle, ResourceError> {
        let handle = self.backend.create_framebuffer(&FramebufferDesc {
            label: label.to_string(),
            color,
            depth,
        })?;
        self.framebuffers.push(handle);
        match self.backend.framebuffer_status(handle) {
            FramebufferStatus::Complete => Ok(handle),
            status => Err(ResourceError::IncompleteFramebuffer {
                label: label.to_string(),
                status,
            }),
        }
    }

    fn color_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        depth: Option<TextureHandle>,
    ) -> Result<ColorTarget, ResourceError> {
        let color = self.target(label, width, height, format)?;
        let framebuffer = self.framebuffer(label, vec![color], depth)?;
        Ok(ColorTarget { color, framebuffer })
    }

    fn commit(self) -> (usize, usize) {
        (self.textures.len(), self.framebuffers.len())
    }

    fn rollback(self) {
        for fb in self.framebuffers.iter().rev() {
            self.backend.destroy_framebuffer(*fb);
        }
        for t in self.textures.iter().rev() {
            self.backend.destroy_texture(*t);
        }
    }
}

fn build_viewport(b: &mut Builder<'_>, spec: &PassSpec, width: u32, height: u32) -> Result<ViewportTargets, ResourceError> {
    use TextureFormat::*;
    let (w, h) = (width.max(1), height.max(1));

    let depth = b.target("scene_depth", w, h, Depth32Float)?;
    let position = b.target("gbuffer_position", w, h, Rgba16Float)?;
    let normal = b.target("gbuffer_normal", w, h, Rgba16Float)?;
    let albedo = b.target("gbuffer_albedo", w, h, Rgba8Unorm)?;
    let material = b.target("gbuffer_material", w, h, Rgba8Unorm)?;
    let framebuffer = b.framebuffer("gbuffer", vec![position, normal, albedo, material], Some(depth))?;
    let gbuffer = GBuffer {
        position,
        normal,
        albedo,
        material,
        framebuffer,
    };

    let hdr = b.color_target("hdr", w, h, Rgba16Float, Some(depth))?;

    let ao = if spec.ambient_occlusion {
        Some(AoTargets {
            raw: b.color_target("ssao", w, h, R16Float, None)?,
            blurred: b.color_target("ssao_blur", w, h, R16Float, None)?,
        })
    } else {
        None
    };

    let ping_pong = if spec.bloom {
        Some([
            b.color_target("ping_pong_0", w, h, Rgba16Float, None)?,
            b.color_target("ping_pong_1", w, h, Rgba16Float, None)?,
        ])
    } else {
        None
    };

    Ok(ViewportTargets {
        width: w,
        height: h,
        depth,
        gbuffer,
        hdr,
        ao,
        ping_pong,
    })
}

fn build_fixed(b: &mut Builder<'_>, spec: &PassSpec) -> Result<FixedTargets, ResourceError> {
    use TextureFormat::*;
    let dim = NOISE_DIM as u32;
    let noise = b.texture(TextureDesc::upload("ssao_noise", dim, dim, Rgba32Float))?;
    let neutral = b.texture(TextureDesc::upload("neutral", 1, 1, Rgba32Float))?;
    b.backend
        .upload_texture(neutral, bytemuck::cast_slice(&[1.0f32; 4]))?;

    let shadow = match spec.shadow_resolution {
        Some(res) => {
            let res = res.max(1);
            let light_depth = b.target("shadow_light_depth", res, res, R32Float)?;
            let depth = b.target("shadow_depth", res, res, Depth32Float)?;
            let framebuffer = b.framebuffer("shadow", vec![light_depth], Some(depth))?;
            Some(ShadowTargets {
                light_depth,
                depth,
                framebuffer,
                resolution: res,
            })
        }
        None => None,
    };

    let water = match spec.water {
        Some(ws) => {
            let [rw, rh] = ws.reflection.map(|v| v.max(1));
            let [fw, fh] = ws.refraction.map(|v| v.max(1));
            let reflection_depth = b.target("water_reflection_depth", rw, rh, Depth32Float)?;
            let reflection = b.color_target("water_reflection", rw, rh, Rgba8Unorm, Some(reflection_depth))?;
            let refraction_depth = b.target("water_refraction_depth", fw, fh, Depth32Float)?;
            let refraction = b.color_target("water_refraction", fw, fh, Rgba8Unorm, Some(refraction_depth))?;
            let g = ws.flow_grid.max(1);
            let flow = b.texture(TextureDesc::upload("water_flow", g, g, Rgba32Float))?;
            Some(WaterTargets {
                reflection,
                reflection_depth,
                refraction,
                refraction_depth,
                flow,
                reflection_size: [rw, rh],
                refraction_size: [fw, fh],
            })
        }
        None => None,
    };

    Ok(FixedTargets {
        noise,
        neutral,
        shadow,
        water,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;

    fn full_spec() -> PassSpec {
        PassSpec {
            width: 64,
            height: 32,
            shadow_resolution: Some(128),
            ambient_occlusion: true,
            bloom: true,
            water: Some(WaterSpec {
                reflection: [32, 18],
                refraction: [64, 36],
                flow_grid: 16,
            }),
        }
    }

    #[test]
    fn allocates_every_requested_target() {
        let mut b = HeadlessBackend::new();
        let reg = ResourceRegistry::allocate(&mut b, full_spec()).unwrap();
        let t = reg.targets().unwrap();
        assert!(t.viewport.ao.is_some());
        assert!(t.viewport.ping_pong.is_some());
        assert_eq!(t.fixed.shadow.map(|s| s.resolution), Some(128));
        assert_eq!(b.texture(t.viewport.gbuffer.position).map(|d| d.format), Some(TextureFormat::Rgba16Float));
        assert_eq!(b.texture(t.viewport.gbuffer.albedo).map(|d| d.format), Some(TextureFormat::Rgba8Unorm));
        let ao = t.viewport.ao.unwrap();
        assert_eq!(b.texture(ao.raw.color).map(|d| d.format), Some(TextureFormat::R16Float));
        // G-buffer and HDR share one depth attachment
        let hdr_fb = b.framebuffer(t.viewport.hdr.framebuffer).unwrap();
        let g_fb = b.framebuffer(t.viewport.gbuffer.framebuffer).unwrap();
        assert_eq!(hdr_fb.depth, g_fb.depth);
        // depth, 4 gbuffer, hdr, 2 ao, 2 ping-pong, noise, neutral, 2 shadow, 5 water
        assert_eq!(b.live_textures(), 19);
        assert_eq!(b.live_framebuffers(), 9);
    }

    #[test]
    fn disabled_features_skip_their_targets() {
        let mut b = HeadlessBackend::new();
        let spec = PassSpec {
            shadow_resolution: None,
            ambient_occlusion: false,
            bloom: false,
            water: None,
            ..full_spec()
        };
        let reg = ResourceRegistry::allocate(&mut b, spec).unwrap();
        let t = reg.targets().unwrap();
        assert!(t.viewport.ao.is_none() && t.fixed.shadow.is_none() && t.fixed.water.is_none());
        assert_eq!(b.live_framebuffers(), 2);
    }

    #[test]
    fn failed_allocation_rolls_back() {
        let mut b = HeadlessBackend::new();
        b.fail_framebuffer("ping_pong_1");
        let err = ResourceRegistry::allocate(&mut b, full_spec()).unwrap_err();
        assert!(matches!(err, ResourceError::IncompleteFramebuffer { ref label, .. } if label == "ping_pong_1"));
        assert_eq!(b.live_textures(), 0);
        assert_eq!(b.live_framebuffers(), 0);
    }

    #[test]
    fn release_twice_is_rejected() {
        let mut b = HeadlessBackend::new();
        let mut reg = ResourceRegistry::allocate(&mut b, full_spec()).unwrap();
        reg.release(&mut b).unwrap();
        assert_eq!(b.live_textures(), 0);
        assert_eq!(b.live_framebuffers(), 0);
        let destroyed = b.destroyed();
        assert_eq!(reg.release(&mut b), Err(ResourceError::AlreadyReleased));
        assert_eq!(b.destroyed(), destroyed);
        assert!(reg.targets().is_err());
    }

    #[test]
    fn resize_rebuilds_only_viewport_targets() {
        let mut b = HeadlessBackend::new();
        let mut reg = ResourceRegistry::allocate(&mut b, full_spec()).unwrap();
        let before = reg.targets().unwrap().clone();
        reg.resize(&mut b, 200, 100).unwrap();
        let after = reg.targets().unwrap();
        assert_eq!(after.fixed, before.fixed);
        assert_ne!(after.viewport.hdr, before.viewport.hdr);
        assert_eq!(b.texture(after.viewport.hdr.color).map(|d| d.width), Some(200));
        assert!(b.texture(before.viewport.hdr.color).is_none());
        assert_eq!(b.live_textures(), 19);
    }

    #[test]
    fn zero_size_is_clamped() {
        let mut b = HeadlessBackend::new();
        let mut reg = ResourceRegistry::allocate(
            &mut b,
            PassSpec {
                width: 0,
                height: 0,
                ..full_spec()
            },
        )
        .unwrap();
        assert_eq!(reg.targets().unwrap().viewport.width, 1);
        reg.resize(&mut b, 0, 50).unwrap();
        let v = &reg.targets().unwrap().viewport;
        assert_eq!((v.width, v.height), (1, 50));
    }
}
