use crate::backend::{LoadAction, PassTarget};
use crate::error::RuntimeDrawError;
use crate::shaders::ShaderPass;
use crate::stage::{RenderStage, StageContext, StageGate, StageKind};
use crate::uniforms::SsaoUniforms;

/// Raw occlusion from the G-buffer, then a blur into the target lighting reads.
pub struct AmbientOcclusionStage;

impl RenderStage for AmbientOcclusionStage {
    fn kind(&self) -> StageKind {
        StageKind::AmbientOcclusion
    }

    fn enabled(&self, gate: &StageGate<'_>) -> bool {
        gate.settings.ssao
            && gate
                .shaders
                .has_all(&[ShaderPass::Ssao, ShaderPass::SsaoBlur])
    }

    fn run(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RuntimeDrawError> {
        let targets = ctx.targets;
        let viewport = &targets.viewport;
        let Some(ao) = viewport.ao else {
            return Ok(());
        };
        let g = viewport.gbuffer;

        ctx.backend.begin_pass(
            PassTarget::Framebuffer(ao.raw.framebuffer),
            LoadAction::ClearAll([1.0; 4]),
        )?;
        ctx.use_program(ShaderPass::Ssao)?;
        ctx.backend.bind_texture(0, g.position)?;
        ctx.backend.bind_texture(1, g.normal)?;
        ctx.backend.bind_texture(2, targets.fixed.noise)?;
        let params = SsaoUniforms::new(ctx.kernel, ctx.settings, (viewport.width, viewport.height));
        ctx.set_pass_uniforms(&params);
        ctx.draw_fullscreen()?;
        ctx.backend.end_pass();

        ctx.backend.begin_pass(
            PassTarget::Framebuffer(ao.blurred.framebuffer),
            LoadAction::ClearAll([1.0; 4]),
        )?;
        ctx.use_program(ShaderPass::SsaoBlur)?;
        ctx.backend.bind_texture(0, ao.raw.color)?;
        ctx.draw_fullscreen()?;
        ctx.backend.end_pass();
        Ok(())
    }
}
