use crate::backend::{LoadAction, PassTarget};
use crate::error::RuntimeDrawError;
use crate::shaders::ShaderPass;
use crate::stage::{RenderStage, StageContext, StageGate, StageKind};

use super::scene_draw::{SceneSubset, draw_scene};

/// Depth of shadow casters from the sun's point of view.
pub struct ShadowStage;

impl RenderStage for ShadowStage {
    fn kind(&self) -> StageKind {
        StageKind::Shadow
    }

    fn enabled(&self, gate: &StageGate<'_>) -> bool {
        gate.settings.shadows && gate.shaders.has(ShaderPass::ShadowMap)
    }

    fn run(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RuntimeDrawError> {
        let Some(shadow) = ctx.targets.fixed.shadow else {
            return Ok(());
        };
        ctx.backend.begin_pass(
            PassTarget::Framebuffer(shadow.framebuffer),
            LoadAction::ClearAll([1.0; 4]),
        )?;
        ctx.use_program(ShaderPass::ShadowMap)?;
        draw_scene(ctx, SceneSubset::DepthOnly);
        ctx.backend.end_pass();
        Ok(())
    }
}
