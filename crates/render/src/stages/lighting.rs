use glam::Mat4;

use crate::backend::{DrawCall, LoadAction, PassTarget};
use crate::error::RuntimeDrawError;
use crate::shaders::ShaderPass;
use crate::stage::{RenderStage, StageContext, StageGate, StageKind};
use crate::uniforms::LightsUniforms;

/// Resolves the G-buffer into the HDR target, then draws the sky behind it.
pub struct LightingStage;

impl RenderStage for LightingStage {
    fn kind(&self) -> StageKind {
        StageKind::Lighting
    }

    fn enabled(&self, _gate: &StageGate<'_>) -> bool {
        true
    }

    fn run(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RuntimeDrawError> {
        let targets = ctx.targets;
        let settings = ctx.settings;
        let scene = ctx.frame.scene;
        let v = &targets.viewport;
        let g = v.gbuffer;

        // A producer that failed this frame left its target stale.
        let occlusion = v
            .ao
            .filter(|_| settings.ssao && ctx.finished(StageKind::AmbientOcclusion))
            .map_or(targets.fixed.neutral, |ao| ao.blurred.color);
        let light_depth = targets
            .fixed
            .shadow
            .filter(|_| settings.shadows && ctx.finished(StageKind::Shadow))
            .map_or(targets.fixed.neutral, |s| s.light_depth);

        // depth stays: the sky and transparent surfaces test against it
        ctx.backend.begin_pass(
            PassTarget::Framebuffer(v.hdr.framebuffer),
            LoadAction::ClearColor([0.0, 0.0, 0.0, 1.0]),
        )?;
        ctx.use_program(ShaderPass::Lighting)?;
        for (slot, texture) in [
            g.position,
            g.normal,
            g.albedo,
            g.material,
            occlusion,
            light_depth,
        ]
        .into_iter()
        .enumerate()
        {
            ctx.backend.bind_texture(slot as u32, texture)?;
        }
        ctx.set_pass_uniforms(&LightsUniforms::pack(&scene.lights, settings.max_lights));
        ctx.draw_fullscreen()?;

        if let Some(sky) = scene.skybox {
            if ctx.shaders.has(ShaderPass::Skybox) {
                ctx.use_program(ShaderPass::Skybox)?;
                ctx.draw(&DrawCall {
                    mesh: sky.mesh,
                    material: sky.cubemap,
                    instances: &[Mat4::IDENTITY],
                });
            }
        }

        ctx.backend.end_pass();
        Ok(())
    }
}
