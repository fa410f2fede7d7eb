use crate::backend::{LoadAction, PassTarget, PolygonMode};
use crate::error::RuntimeDrawError;
use crate::shaders::ShaderPass;
use crate::stage::{RenderStage, StageContext, StageGate, StageKind};

use super::scene_draw::{SceneSubset, draw_scene};

/// Fills the G-buffer with position, normal, albedo and material.
pub struct GeometryStage;

impl RenderStage for GeometryStage {
    fn kind(&self) -> StageKind {
        StageKind::Geometry
    }

    fn enabled(&self, _gate: &StageGate<'_>) -> bool {
        true
    }

    fn run(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RuntimeDrawError> {
        let gbuffer = ctx.targets.viewport.gbuffer;
        ctx.backend.begin_pass(
            PassTarget::Framebuffer(gbuffer.framebuffer),
            LoadAction::ClearAll([0.0; 4]),
        )?;
        ctx.use_program(ShaderPass::GBuffer)?;

        if ctx.settings.wireframe {
            ctx.backend.set_polygon_mode(PolygonMode::Line);
        }
        draw_scene(ctx, SceneSubset::Opaque);
        // later passes always rasterize filled
        ctx.backend.set_polygon_mode(PolygonMode::Fill);

        ctx.backend.end_pass();
        Ok(())
    }
}
