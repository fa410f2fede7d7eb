use std::fmt;

use wonderlands_common::ObjectId;
use wonderlands_fluid::WaterFlow;

use crate::backend::{DrawCall, GpuBackend, UniformSlot};
use crate::error::RuntimeDrawError;
use crate::kernel::SampleKernel;
use crate::registry::FrameTargets;
use crate::scene::FrameContext;
use crate::settings::RendererSettings;
use crate::shaders::{ShaderPass, ShaderSet};
use crate::uniforms::FrameUniforms;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    Shadow,
    Geometry,
    AmbientOcclusion,
    Lighting,
    Transparency,
    PostProcess,
}

impl StageKind {
    pub const ALL: [StageKind; 6] = [
        StageKind::Shadow,
        StageKind::Geometry,
        StageKind::AmbientOcclusion,
        StageKind::Lighting,
        StageKind::Transparency,
        StageKind::PostProcess,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Shadow => "shadow",
            StageKind::Geometry => "geometry",
            StageKind::AmbientOcclusion => "ambient_occlusion",
            StageKind::Lighting => "lighting",
            StageKind::Transparency => "transparency",
            StageKind::PostProcess => "post_process",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only inputs for deciding whether a stage runs this frame.
#[derive(Clone, Copy)]
pub struct StageGate<'a> {
    pub settings: &'a RendererSettings,
    pub shaders: &'a ShaderSet,
    pub frame: &'a FrameContext<'a>,
}

/// Everything a stage may touch while it runs.
pub struct StageContext<'a> {
    pub backend: &'a mut dyn GpuBackend,
    pub targets: &'a FrameTargets,
    pub shaders: &'a ShaderSet,
    pub settings: &'a RendererSettings,
    pub kernel: &'a SampleKernel,
    pub frame: &'a FrameContext<'a>,
    pub uniforms: &'a FrameUniforms,
    pub water: Option<&'a WaterFlow>,
    /// Stages that ran this frame without recording a failure.
    pub finished: &'a [StageKind],
    pub(crate) draw_calls: u32,
    /// Each failure with the placed object whose draw raised it, if any.
    pub(crate) failures: Vec<(RuntimeDrawError, Option<ObjectId>)>,
}

impl StageContext<'_> {
    /// Whether `kind` fully wrote its targets earlier this frame.
    pub fn finished(&self, kind: StageKind) -> bool {
        self.finished.contains(&kind)
    }

    /// Bind `pass`'s program and the frame uniforms.
    pub fn use_program(&mut self, pass: ShaderPass) -> Result<(), RuntimeDrawError> {
        let uniforms = self.uniforms;
        self.use_program_with(pass, uniforms)
    }

    /// Bind `pass`'s program with frame uniforms other than this frame's main view.
    pub fn use_program_with(
        &mut self,
        pass: ShaderPass,
        uniforms: &FrameUniforms,
    ) -> Result<(), RuntimeDrawError> {
        let program = self.shaders.get(pass).ok_or(RuntimeDrawError::NoProgram)?;
        self.backend.use_program(program)?;
        self.backend
            .set_uniforms(UniformSlot::Frame, bytemuck::bytes_of(uniforms));
        Ok(())
    }

    pub(crate) fn record_failure(&mut self, error: RuntimeDrawError) {
        self.failures.push((error, None));
    }

    pub fn set_pass_uniforms<T: bytemuck::Pod>(&mut self, data: &T) {
        self.backend
            .set_uniforms(UniformSlot::Pass, bytemuck::bytes_of(data));
    }

    /// Issue a mesh draw. A failure is recorded and the stage carries on.
    pub fn draw(&mut self, call: &DrawCall<'_>) {
        self.submit(call, None);
    }

    /// [`Self::draw`] for a placed object, so a failure names it.
    pub fn draw_object(&mut self, id: ObjectId, call: &DrawCall<'_>) {
        self.submit(call, Some(id));
    }

    fn submit(&mut self, call: &DrawCall<'_>, object: Option<ObjectId>) {
        if call.instances.is_empty() {
            return;
        }
        match self.backend.draw(call) {
            Ok(()) => self.draw_calls += 1,
            Err(e) => {
                tracing::warn!(mesh = ?call.mesh, ?object, error = %e, "draw failed");
                self.failures.push((e, object));
            }
        }
    }

    pub fn draw_fullscreen(&mut self) -> Result<(), RuntimeDrawError> {
        self.backend.draw_fullscreen()?;
        self.draw_calls += 1;
        Ok(())
    }
}

/// One step of the frame. Stages run in [`StageKind`] order and each reads only
/// targets written by stages before it.
pub trait RenderStage {
    fn kind(&self) -> StageKind;

    fn enabled(&self, gate: &StageGate<'_>) -> bool;

    /// Leave no pass open on success. On error the pipeline unbinds.
    fn run(&mut self, ctx: &mut StageContext<'_>) -> Result<(), RuntimeDrawError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_fixed() {
        let idx: Vec<usize> = StageKind::ALL.iter().map(|k| k.index()).collect();
        assert_eq!(idx, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(StageKind::AmbientOcclusion.to_string(), "ambient_occlusion");
    }
}
