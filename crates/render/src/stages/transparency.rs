use glam::Mat4;

use crate::backend::{DrawCall, LoadAction, PassTarget};
use crate::error::RuntimeDrawError;
use crate::registry::{ColorTarget, WaterTargets};
use crate::shaders::ShaderPass;
use crate::stage::{RenderStage, StageContext, StageGate, StageKind};
use crate::uniforms::{ForwardUniforms, FrameUniforms, WaterUniforms};

use super::scene_draw::{SceneSubset, draw_scene};

/// Water and particles over the lit scene. Runs only when the scene has either.
pub struct TransparencyStage;

impl TransparencyStage {
    fn has_water(gate: &StageGate<'_>) -> bool {
        gate.frame.scene.water.is_some() && gate.shaders.has(ShaderPass::Water)
    }

    fn has_particles(gate: &StageGate<'_>) -> bool {
        gate.frame
            .scene
            .particles
            .as_ref()
            .is_some_and(|p| !p.particles.is_empty())
            && gate.shaders.has(ShaderPass::Particle)
    }

    /// Forward-render the scene into the water's reflection and refraction targets.
    fn render_water_views(
        ctx: &mut StageContext<'_>,
        water: &WaterTargets,
        height: f32,
    ) -> Result<(), RuntimeDrawError> {
        let camera = ctx.frame.camera;
        let fog = ctx.uniforms.fog;
        let sky = [fog[0], fog[1], fog[2], 1.0];

        let [rw, rh] = water.reflection_size;
        let mirrored = ctx
            .uniforms
            .with_camera(&camera.mirrored(height))
            .with_viewport(rw, rh);
        Self::forward_view(ctx, water.reflection, sky, &mirrored, ForwardUniforms::above(height))?;

        let [fw, fh] = water.refraction_size;
        let below = ctx.uniforms.with_viewport(fw, fh);
        Self::forward_view(ctx, water.refraction, sky, &below, ForwardUniforms::below(height))
    }

    fn forward_view(
        ctx: &mut StageContext<'_>,
        target: ColorTarget,
        clear: [f32; 4],
        uniforms: &FrameUniforms,
        clip: ForwardUniforms,
    ) -> Result<(), RuntimeDrawError> {
        ctx.backend.begin_pass(
            PassTarget::Framebuffer(target.framebuffer),
            LoadAction::ClearAll(clear),
        )?;
        ctx.use_program_with(ShaderPass::Forward, uniforms)?;
        ctx.set_pass_uniforms(&clip);
        draw_scene(ctx, SceneSubset::Opaque);
        ctx.backend.end_pass();
        Ok(())
    }
}

impl RenderStage for TransparencyStage {
    fn kind(&self) -> StageKind {
        StageKind::Transparency
    }

    fn enabled(&self, gate: &StageGate<'_>) -> bool {
        Self::has_water(gate) || Self::has_particles(gate)
    }

    fn run(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RuntimeDrawError> {
        let targets = ctx.targets;
        let scene = ctx.frame.scene;
        let shaders = ctx.shaders;

        let water = match (scene.water.as_ref(), ctx.water, targets.fixed.water) {
            (Some(surface), Some(flow), Some(water_targets)) if shaders.has(ShaderPass::Water) => {
                Some((surface, flow, water_targets))
            }
            _ => None,
        };

        if let Some((_, flow, water_targets)) = water {
            if shaders.has(ShaderPass::Forward) {
                if let Err(e) = Self::render_water_views(ctx, &water_targets, flow.config().height) {
                    // water still draws, just without fresh reflections
                    ctx.backend.end_pass();
                    tracing::warn!(error = %e, "water reflection pass failed");
                    ctx.record_failure(e);
                }
            }
        }

        ctx.backend.begin_pass(
            PassTarget::Framebuffer(targets.viewport.hdr.framebuffer),
            LoadAction::Load,
        )?;

        if let Some((surface, flow, water_targets)) = water {
            ctx.use_program(ShaderPass::Water)?;
            ctx.backend.bind_texture(0, water_targets.flow)?;
            ctx.backend.bind_texture(1, water_targets.reflection.color)?;
            ctx.backend.bind_texture(2, water_targets.refraction.color)?;
            ctx.set_pass_uniforms(&WaterUniforms::new(flow));
            let model: [Mat4; 1] = [surface.transform.model_matrix()];
            ctx.draw(&DrawCall {
                mesh: surface.mesh,
                material: wonderlands_common::MaterialHandle(0),
                instances: &model,
            });
        }

        if let Some(particles) = scene.particles.as_ref() {
            if shaders.has(ShaderPass::Particle) {
                ctx.use_program(ShaderPass::Particle)?;
                ctx.draw(&DrawCall {
                    mesh: particles.renderable.mesh,
                    material: particles.renderable.material,
                    instances: &particles.particles,
                });
            }
        }

        ctx.backend.end_pass();
        Ok(())
    }
}
