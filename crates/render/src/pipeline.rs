//! Frame orchestration: construction, per-frame stage execution, resize and teardown.

use wonderlands_common::ObjectId;
use wonderlands_fluid::WaterFlow;

use crate::backend::{GpuBackend, ShaderLoader};
use crate::error::{PipelineError, ResourceError, RuntimeDrawError};
use crate::kernel::SampleKernel;
use crate::registry::{PassSpec, ResourceRegistry, WaterSpec};
use crate::scene::FrameContext;
use crate::settings::{EngineConfig, RendererSettings};
use crate::shaders::ShaderSet;
use crate::stage::{RenderStage, StageContext, StageGate, StageKind};
use crate::stages::default_stages;
use crate::uniforms::{FrameParams, FrameUniforms};

/// How many times each stage has run since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounters {
    runs: [u64; StageKind::ALL.len()],
}

impl StageCounters {
    pub fn runs(&self, kind: StageKind) -> u64 {
        self.runs[kind.index()]
    }

    fn record(&mut self, kind: StageKind) {
        self.runs[kind.index()] += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: StageKind,
    pub error: RuntimeDrawError,
    /// The placed object whose draw failed, when the failure came from one.
    pub object: Option<ObjectId>,
}

/// What happened during one [`RenderPipeline::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub ran: Vec<StageKind>,
    pub skipped: Vec<StageKind>,
    pub draw_calls: u32,
    pub failures: Vec<StageFailure>,
    /// Set when the frame could not start or finish at all.
    pub frame_error: Option<RuntimeDrawError>,
}

impl FrameReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.frame_error.is_none()
    }
}

/// Owns the backend, every GPU target and the water flow, and drives the
/// stages once per frame.
pub struct RenderPipeline<B: GpuBackend> {
    backend: B,
    settings: RendererSettings,
    shaders: ShaderSet,
    registry: ResourceRegistry,
    kernel: SampleKernel,
    water: WaterFlow,
    stages: Vec<Box<dyn RenderStage>>,
    counters: StageCounters,
    elapsed: f32,
    frame_index: u64,
}

impl<B: GpuBackend + ShaderLoader> RenderPipeline<B> {
    /// Validate config, load programs, allocate targets and build the
    /// occlusion kernel. Any failure here is fatal.
    pub fn new(mut backend: B, config: &EngineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let settings = config.renderer.clone();

        let shaders = ShaderSet::load(&mut backend)?;
        let missing: Vec<_> = shaders.missing().map(|p| p.name()).collect();
        if !missing.is_empty() {
            tracing::warn!(?missing, "running without optional shaders");
        }

        let water = WaterFlow::new(config.water.clone())?;
        let kernel = SampleKernel::generate(settings.ao_kernel_size)?;

        let spec = PassSpec {
            width: settings.width,
            height: settings.height,
            shadow_resolution: settings.shadows.then_some(settings.shadow_resolution),
            ambient_occlusion: settings.ssao,
            bloom: settings.bloom,
            water: Some(WaterSpec {
                reflection: config.water.reflection_size,
                refraction: config.water.refraction_size,
                // validated against MAX_GRID_SIZE above, so this cannot truncate
                flow_grid: config.water.flow.grid_size as u32,
            }),
        };
        let mut registry = ResourceRegistry::allocate(&mut backend, spec)?;

        let noise = registry.targets()?.fixed.noise;
        if let Err(e) = backend.upload_texture(noise, &kernel.noise_texels()) {
            // Release error is impossible right after a successful allocate.
            let _ = registry.release(&mut backend);
            return Err(e.into());
        }

        tracing::info!(
            backend = backend.name(),
            width = settings.width,
            height = settings.height,
            kernel = kernel.len(),
            programs = shaders.len(),
            "render pipeline ready"
        );

        Ok(Self {
            backend,
            settings,
            shaders,
            registry,
            kernel,
            water,
            stages: default_stages(),
            counters: StageCounters::default(),
            elapsed: 0.0,
            frame_index: 0,
        })
    }
}

impl<B: GpuBackend> RenderPipeline<B> {
    /// Advance the water flow by `dt` and render one frame.
    ///
    /// Stages run in order. A stage error is logged, the stage's bindings are
    /// dropped and the next stage still runs.
    pub fn tick(&mut self, frame: &FrameContext<'_>, dt: f32) -> FrameReport {
        let _span = tracing::debug_span!("frame", index = self.frame_index).entered();
        let mut report = FrameReport {
            frame: self.frame_index,
            ..FrameReport::default()
        };
        self.frame_index += 1;
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
        }

        let targets = match self.registry.targets() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "tick after release");
                report.frame_error = Some(RuntimeDrawError::Backend(e.to_string()));
                return report;
            }
        };

        if frame.scene.water.is_some() {
            self.water.update(dt);
            if let Some(w) = &targets.fixed.water {
                let texels = self.water.flow_map();
                if let Err(e) = self.backend.upload_texture(w.flow, bytemuck::cast_slice(&texels)) {
                    tracing::warn!(error = %e, "flow map upload failed");
                }
            }
        }

        if let Err(e) = self.backend.begin_frame() {
            tracing::warn!(error = %e, "frame could not begin");
            report.frame_error = Some(e);
            return report;
        }

        let viewport = (targets.viewport.width, targets.viewport.height);
        let uniforms = FrameUniforms::build(
            frame.scene,
            frame.camera,
            frame.time_of_day,
            frame.weather,
            FrameParams {
                settings: &self.settings,
                viewport,
                elapsed: self.elapsed,
                water: Some(&self.water),
            },
        );
        let gate = StageGate {
            settings: &self.settings,
            shaders: &self.shaders,
            frame,
        };

        let mut finished = Vec::with_capacity(self.stages.len());
        for stage in self.stages.iter_mut() {
            let kind = stage.kind();
            if !stage.enabled(&gate) {
                tracing::trace!(stage = %kind, "stage skipped");
                report.skipped.push(kind);
                continue;
            }

            let mut ctx = StageContext {
                backend: &mut self.backend,
                targets,
                shaders: &self.shaders,
                settings: &self.settings,
                kernel: &self.kernel,
                frame,
                uniforms: &uniforms,
                water: Some(&self.water),
                finished: &finished,
                draw_calls: 0,
                failures: Vec::new(),
            };
            let result = {
                let _stage = tracing::trace_span!("stage", name = %kind).entered();
                stage.run(&mut ctx)
            };
            report.draw_calls += ctx.draw_calls;
            let mut failures = std::mem::take(&mut ctx.failures);
            if let Err(e) = result {
                tracing::warn!(stage = %kind, error = %e, "stage failed");
                failures.push((e, None));
            }
            // never leave a target bound for the next stage
            self.backend.end_pass();
            if failures.is_empty() {
                finished.push(kind);
            }

            report
                .failures
                .extend(failures.into_iter().map(|(error, object)| StageFailure {
                    stage: kind,
                    error,
                    object,
                }));
            self.counters.record(kind);
            report.ran.push(kind);
        }

        if let Err(e) = self.backend.end_frame() {
            tracing::warn!(error = %e, "frame could not finish");
            report.frame_error = Some(e);
        }
        report
    }

    /// Rebuild viewport-sized targets. Zero dimensions are clamped to 1.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), ResourceError> {
        self.registry.resize(&mut self.backend, width, height)?;
        self.settings.width = width.max(1);
        self.settings.height = height.max(1);
        Ok(())
    }

    pub fn toggle_wireframe(&mut self) -> bool {
        self.settings.wireframe = !self.settings.wireframe;
        tracing::info!(wireframe = self.settings.wireframe, "wireframe toggled");
        self.settings.wireframe
    }

    /// Release every GPU target. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if !self.registry.is_released() {
            // only fails when already released, which was just ruled out
            let _ = self.registry.release(&mut self.backend);
            tracing::info!(frames = self.frame_index, "render pipeline shut down");
        }
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn shaders(&self) -> &ShaderSet {
        &self.shaders
    }

    pub fn kernel(&self) -> &SampleKernel {
        &self.kernel
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn counters(&self) -> StageCounters {
        self.counters
    }

    pub fn water(&self) -> &WaterFlow {
        &self.water
    }

    pub fn water_mut(&mut self) -> &mut WaterFlow {
        &mut self.water
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frame_index
    }
}

impl<B: GpuBackend> Drop for RenderPipeline<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use crate::scene::Scene;
    use crate::shaders::ShaderPass;
    use crate::FlyCamera;
    use wonderlands_fluid::ConfigError;

    fn small_config() -> EngineConfig {
        let mut c = EngineConfig::default();
        c.renderer.width = 64;
        c.renderer.height = 36;
        c.renderer.shadow_resolution = 64;
        c.water.flow = wonderlands_fluid::FluidConfig::with_grid(16, 1.0);
        c
    }

    #[test]
    fn construction_uploads_noise_and_allocates() {
        let p = RenderPipeline::new(HeadlessBackend::new(), &small_config()).unwrap();
        assert_eq!(p.kernel().len(), 64);
        assert!(p.backend().live_textures() > 0);
        assert_eq!(p.shaders().missing().count(), 0);
    }

    #[test]
    fn invalid_config_is_fatal() {
        let mut c = small_config();
        c.renderer.ao_kernel_size = 0;
        assert!(matches!(
            RenderPipeline::new(HeadlessBackend::new(), &c),
            Err(PipelineError::Config(_))
        ));

        let mut c = small_config();
        c.water.flow.grid_size = 1 << 33;
        assert!(matches!(
            RenderPipeline::new(HeadlessBackend::new(), &c),
            Err(PipelineError::Config(ConfigError::TooLarge { .. }))
        ));
    }

    #[test]
    fn required_shader_failure_is_fatal() {
        let mut b = HeadlessBackend::new();
        b.fail_shader(ShaderPass::Lighting);
        let err = RenderPipeline::new(b, &small_config()).err().unwrap();
        assert!(err.to_string().contains("lighting"));
    }

    #[test]
    fn shutdown_releases_everything_once() {
        let mut p = RenderPipeline::new(HeadlessBackend::new(), &small_config()).unwrap();
        p.shutdown();
        p.shutdown();
        assert_eq!(p.backend().live_textures(), 0);
        assert_eq!(p.backend().live_framebuffers(), 0);
        let scene = Scene::new();
        let cam = FlyCamera::default();
        let report = p.tick(&FrameContext::new(&scene, &cam), 0.016);
        assert!(report.frame_error.is_some());
    }

    #[test]
    fn resize_updates_settings_and_targets() {
        let mut p = RenderPipeline::new(HeadlessBackend::new(), &small_config()).unwrap();
        p.resize(0, 10).unwrap();
        assert_eq!((p.settings().width, p.settings().height), (1, 10));
        let v = &p.registry().targets().unwrap().viewport;
        assert_eq!((v.width, v.height), (1, 10));
    }

    use crate::headless::Command;
    use crate::scene::{InstanceBatch, ParticleField, SceneObject, Skybox, TerrainPatch, WaterSurface};
    use crate::backend::{PolygonMode, TextureHandle};
    use glam::{Mat4, Vec3};
    use wonderlands_common::{Light, MaterialHandle, Renderable, Transform};

    fn renderable(b: &mut HeadlessBackend) -> Renderable {
        Renderable {
            mesh: b.register_mesh(),
            material: MaterialHandle(1),
        }
    }

    fn full_scene(b: &mut HeadlessBackend) -> Scene {
        let mut scene = Scene::new();
        scene.terrain.push(TerrainPatch {
            renderable: renderable(b),
            transform: Transform::default(),
            lod: 0,
        });
        scene
            .objects
            .push(SceneObject::new("cottage", renderable(b), Transform::default()));
        let mut ruin = SceneObject::new("ruin", renderable(b), Transform::default());
        ruin.casts_shadows = false;
        scene.objects.push(ruin);
        scene.batches.push(InstanceBatch::new(
            "trees",
            renderable(b),
            (0..100).map(|i| Transform::from_position(Vec3::new(i as f32, 0.0, 0.0))),
        ));
        scene
            .lights
            .push(Light::directional(Vec3::new(-0.3, -1.0, -0.2), Vec3::ONE, 1.0));
        scene.water = Some(WaterSurface {
            mesh: b.register_mesh(),
            transform: Transform::default(),
        });
        scene.particles = Some(ParticleField {
            renderable: renderable(b),
            particles: vec![Mat4::IDENTITY; 10],
        });
        scene.skybox = Some(Skybox {
            mesh: b.register_mesh(),
            cubemap: MaterialHandle(9),
        });
        scene
    }

    fn opaque_only(b: &mut HeadlessBackend) -> Scene {
        let mut scene = full_scene(b);
        scene.water = None;
        scene.particles = None;
        scene
    }

    fn draws_with(b: &HeadlessBackend, pass: ShaderPass) -> Vec<(usize, PolygonMode)> {
        b.commands()
            .iter()
            .filter_map(|c| match c {
                Command::Draw {
                    program,
                    instances,
                    mode,
                    ..
                } if *program == pass => Some((*instances, *mode)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn minimal_features_run_three_stages() {
        let mut c = small_config();
        c.renderer.shadows = false;
        c.renderer.ssao = false;
        c.renderer.bloom = false;
        let mut p = RenderPipeline::new(HeadlessBackend::new(), &c).unwrap();
        let scene = opaque_only(p.backend_mut());
        let cam = FlyCamera::default();

        let report = p.tick(&FrameContext::new(&scene, &cam), 0.016);

        assert!(report.is_clean(), "{report:?}");
        let counters = p.counters();
        assert_eq!(counters.runs(StageKind::Geometry), 1);
        assert_eq!(counters.runs(StageKind::Lighting), 1);
        assert_eq!(counters.runs(StageKind::PostProcess), 1);
        assert_eq!(counters.runs(StageKind::Shadow), 0);
        assert_eq!(counters.runs(StageKind::AmbientOcclusion), 0);
        assert_eq!(counters.runs(StageKind::Transparency), 0);
        assert_eq!(
            report.skipped,
            vec![StageKind::Shadow, StageKind::AmbientOcclusion, StageKind::Transparency]
        );
        assert!(!p.backend().drawn_programs().contains(&ShaderPass::Blur));
    }

    #[test]
    fn full_frame_runs_passes_in_order() {
        let mut p = RenderPipeline::new(HeadlessBackend::new(), &small_config()).unwrap();
        let scene = full_scene(p.backend_mut());
        let cam = FlyCamera::default();

        let report = p.tick(&FrameContext::new(&scene, &cam), 0.016);

        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.ran, StageKind::ALL.to_vec());
        let drawn = p.backend().drawn_programs();
        let first = |pass: ShaderPass| drawn.iter().position(|p| *p == pass).unwrap();
        let order = [
            ShaderPass::ShadowMap,
            ShaderPass::GBuffer,
            ShaderPass::Ssao,
            ShaderPass::SsaoBlur,
            ShaderPass::Lighting,
            ShaderPass::Skybox,
            ShaderPass::Forward,
            ShaderPass::Water,
            ShaderPass::Particle,
            ShaderPass::BrightPass,
            ShaderPass::Blur,
            ShaderPass::PostProcess,
        ];
        for pair in order.windows(2) {
            assert!(first(pair[0]) < first(pair[1]), "{:?} before {:?}", pair[0], pair[1]);
        }
        assert_eq!(drawn.last(), Some(&ShaderPass::PostProcess));
        assert!(!p.backend().has_bound_target());
    }

    #[test]
    fn shadow_pass_skips_non_casters_and_batches_draw_once() {
        let mut p = RenderPipeline::new(HeadlessBackend::new(), &small_config()).unwrap();
        let scene = opaque_only(p.backend_mut());
        let cam = FlyCamera::default();
        p.tick(&FrameContext::new(&scene, &cam), 0.016);

        // terrain, cottage, trees
        assert_eq!(draws_with(p.backend(), ShaderPass::ShadowMap).len(), 3);
        let geometry = draws_with(p.backend(), ShaderPass::GBuffer);
        assert_eq!(geometry.len(), 4);
        assert_eq!(geometry.iter().filter(|(n, _)| *n == 100).count(), 1);
    }

    #[test]
    fn wireframe_applies_to_geometry_only() {
        let mut c = small_config();
        c.renderer.wireframe = true;
        let mut p = RenderPipeline::new(HeadlessBackend::new(), &c).unwrap();
        let scene = opaque_only(p.backend_mut());
        let cam = FlyCamera::default();
        p.tick(&FrameContext::new(&scene, &cam), 0.016);

        let b = p.backend();
        assert!(draws_with(b, ShaderPass::GBuffer).iter().all(|(_, m)| *m == PolygonMode::Line));
        assert!(draws_with(b, ShaderPass::Skybox).iter().all(|(_, m)| *m == PolygonMode::Fill));
        assert_eq!(b.polygon_mode(), PolygonMode::Fill);
    }

    #[test]
    fn failing_stage_does_not_stop_the_frame() {
        let mut b = HeadlessBackend::new();
        b.fail_draws(ShaderPass::Ssao);
        let mut p = RenderPipeline::new(b, &small_config()).unwrap();
        let scene = opaque_only(p.backend_mut());
        let cam = FlyCamera::default();

        let report = p.tick(&FrameContext::new(&scene, &cam), 0.016);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, StageKind::AmbientOcclusion);
        assert_eq!(p.counters().runs(StageKind::PostProcess), 1);
        assert_eq!(p.backend().drawn_programs().last(), Some(&ShaderPass::PostProcess));
        let begins = p
            .backend()
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::BeginPass { .. }))
            .count();
        let ends = p
            .backend()
            .commands()
            .iter()
            .filter(|c| **c == Command::EndPass)
            .count();
        assert_eq!(begins, ends);
    }

    fn lighting_bindings(b: &HeadlessBackend) -> Vec<(u32, TextureHandle)> {
        b.commands()
            .iter()
            .skip_while(|c| **c != Command::UseProgram(ShaderPass::Lighting))
            .take_while(|c| !matches!(c, Command::DrawFullscreen { .. }))
            .filter_map(|c| match c {
                Command::BindTexture { slot, texture } => Some((*slot, *texture)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn lighting_ignores_targets_of_failed_stages() {
        let mut b = HeadlessBackend::new();
        b.fail_draws(ShaderPass::Ssao);
        b.fail_draws(ShaderPass::ShadowMap);
        let mut p = RenderPipeline::new(b, &small_config()).unwrap();
        let scene = opaque_only(p.backend_mut());
        let cam = FlyCamera::default();

        let report = p.tick(&FrameContext::new(&scene, &cam), 0.016);

        let failed: Vec<StageKind> = report.failures.iter().map(|f| f.stage).collect();
        assert!(failed.contains(&StageKind::Shadow));
        assert!(failed.contains(&StageKind::AmbientOcclusion));
        let targets = p.registry().targets().unwrap();
        let neutral = targets.fixed.neutral;
        let binds = lighting_bindings(p.backend());
        assert!(binds.contains(&(4, neutral)), "{binds:?}");
        assert!(binds.contains(&(5, neutral)), "{binds:?}");
        let blurred = targets.viewport.ao.unwrap().blurred.color;
        assert!(!binds.iter().any(|&(_, t)| t == blurred));
    }

    #[test]
    fn lighting_samples_targets_of_finished_stages() {
        let mut p = RenderPipeline::new(HeadlessBackend::new(), &small_config()).unwrap();
        let scene = opaque_only(p.backend_mut());
        let cam = FlyCamera::default();

        let report = p.tick(&FrameContext::new(&scene, &cam), 0.016);

        assert!(report.is_clean(), "{report:?}");
        let targets = p.registry().targets().unwrap();
        let binds = lighting_bindings(p.backend());
        assert!(binds.contains(&(4, targets.viewport.ao.unwrap().blurred.color)));
        assert!(binds.contains(&(5, targets.fixed.shadow.unwrap().light_depth)));
    }

    #[test]
    fn unknown_mesh_is_logged_and_skipped() {
        let mut p = RenderPipeline::new(HeadlessBackend::new(), &small_config()).unwrap();
        let mut scene = opaque_only(p.backend_mut());
        scene.objects.push(SceneObject::new(
            "missing",
            Renderable {
                mesh: wonderlands_common::MeshHandle(9999),
                material: MaterialHandle(0),
            },
            Transform::default(),
        ));
        let cam = FlyCamera::default();

        let report = p.tick(&FrameContext::new(&scene, &cam), 0.016);

        // once in the shadow pass, once in the geometry pass
        assert_eq!(report.failures.len(), 2);
        assert!(report
            .failures
            .iter()
            .all(|f| matches!(f.error, RuntimeDrawError::UnknownMesh(_))));
        let missing = scene.objects.last().map(|o| o.id);
        assert!(report.failures.iter().all(|f| f.object == missing));
        assert_eq!(draws_with(p.backend(), ShaderPass::GBuffer).len(), 4);
    }

    #[test]
    fn missing_optional_shader_disables_its_stage() {
        let mut b = HeadlessBackend::new();
        b.fail_shader(ShaderPass::Ssao);
        b.fail_shader(ShaderPass::Blur);
        let mut p = RenderPipeline::new(b, &small_config()).unwrap();
        let scene = opaque_only(p.backend_mut());
        let cam = FlyCamera::default();

        let report = p.tick(&FrameContext::new(&scene, &cam), 0.016);

        assert!(report.is_clean());
        assert!(report.skipped.contains(&StageKind::AmbientOcclusion));
        assert!(!p.backend().drawn_programs().contains(&ShaderPass::BrightPass));
    }

    #[test]
    fn water_flow_advances_only_with_water() {
        let mut p = RenderPipeline::new(HeadlessBackend::new(), &small_config()).unwrap();
        let dry = opaque_only(p.backend_mut());
        let wet = full_scene(p.backend_mut());
        let cam = FlyCamera::default();
        p.water_mut().add_ripple(0.0, 0.0, 1.0);

        p.tick(&FrameContext::new(&dry, &cam), 0.5);
        assert_eq!(p.water().solver().steps(), 0);
        p.tick(&FrameContext::new(&wet, &cam), 0.5);
        assert_eq!(p.water().solver().steps(), 1);
        assert_eq!(p.frames_rendered(), 2);
    }

    #[test]
    fn wireframe_toggles() {
        let mut p = RenderPipeline::new(HeadlessBackend::new(), &small_config()).unwrap();
        assert!(p.toggle_wireframe());
        assert!(!p.toggle_wireframe());
    }
}
