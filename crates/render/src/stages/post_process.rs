use crate::backend::{LoadAction, PassTarget, TextureHandle};
use crate::error::RuntimeDrawError;
use crate::registry::ColorTarget;
use crate::shaders::ShaderPass;
use crate::stage::{RenderStage, StageContext, StageGate, StageKind};
use crate::uniforms::{BlurUniforms, PostUniforms};

/// Bloom through the ping-pong pair, then tone mapping and effects onto the surface.
pub struct PostProcessStage;

impl PostProcessStage {
    /// Returns the texture holding the final blurred highlights.
    fn bloom(ctx: &mut StageContext<'_>, pair: [ColorTarget; 2]) -> Result<TextureHandle, RuntimeDrawError> {
        let hdr = ctx.targets.viewport.hdr.color;
        let settings = ctx.settings;

        ctx.backend.begin_pass(
            PassTarget::Framebuffer(pair[0].framebuffer),
            LoadAction::ClearAll([0.0; 4]),
        )?;
        ctx.use_program(ShaderPass::BrightPass)?;
        ctx.backend.bind_texture(0, hdr)?;
        ctx.set_pass_uniforms(&PostUniforms::new(settings, true));
        ctx.draw_fullscreen()?;
        ctx.backend.end_pass();

        let mut src = 0;
        for i in 0..settings.bloom_blur_passes {
            let dst = 1 - src;
            ctx.backend.begin_pass(
                PassTarget::Framebuffer(pair[dst].framebuffer),
                LoadAction::ClearAll([0.0; 4]),
            )?;
            ctx.use_program(ShaderPass::Blur)?;
            ctx.backend.bind_texture(0, pair[src].color)?;
            ctx.set_pass_uniforms(&BlurUniforms::new(i % 2 == 0));
            ctx.draw_fullscreen()?;
            ctx.backend.end_pass();
            src = dst;
        }
        Ok(pair[src].color)
    }
}

impl RenderStage for PostProcessStage {
    fn kind(&self) -> StageKind {
        StageKind::PostProcess
    }

    fn enabled(&self, _gate: &StageGate<'_>) -> bool {
        true
    }

    fn run(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RuntimeDrawError> {
        let targets = ctx.targets;
        let settings = ctx.settings;
        let v = &targets.viewport;

        let pair = v.ping_pong.filter(|_| {
            settings.bloom
                && ctx
                    .shaders
                    .has_all(&[ShaderPass::BrightPass, ShaderPass::Blur])
        });
        let bloom = match pair {
            Some(pair) => match Self::bloom(ctx, pair) {
                Ok(texture) => Some(texture),
                Err(e) => {
                    ctx.backend.end_pass();
                    tracing::warn!(error = %e, "bloom failed, compositing without it");
                    ctx.record_failure(e);
                    None
                }
            },
            None => None,
        };

        ctx.backend
            .begin_pass(PassTarget::Surface, LoadAction::ClearAll([0.0, 0.0, 0.0, 1.0]))?;
        ctx.use_program(ShaderPass::PostProcess)?;
        ctx.backend.bind_texture(0, v.hdr.color)?;
        ctx.backend
            .bind_texture(1, bloom.unwrap_or(targets.fixed.neutral))?;
        ctx.backend.bind_texture(2, v.gbuffer.position)?;
        ctx.set_pass_uniforms(&PostUniforms::new(settings, bloom.is_some()));
        ctx.draw_fullscreen()?;
        ctx.backend.end_pass();
        Ok(())
    }
}
