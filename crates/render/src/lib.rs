//! Deferred renderer core: backend seam, frame targets, SSAO kernel and the
//! staged frame pipeline.
//!
//! # Invariants
//! - Stages run in a fixed order: shadow, geometry, ambient occlusion,
//!   lighting, transparency, post-process.
//! - A stage reads only targets written by stages before it in the same frame.
//! - No target stays bound once a stage returns.
//! - Every GPU target is owned by the [`ResourceRegistry`] and released once.
//! - Construction failures are fatal; per-frame draw failures are logged and
//!   the frame continues.

mod backend;
mod camera;
mod error;
mod headless;
mod kernel;
mod pipeline;
mod registry;
mod scene;
mod settings;
mod shaders;
mod stage;
pub mod stages;
pub mod uniforms;

pub use backend::{
    DrawCall, FramebufferDesc, FramebufferHandle, FramebufferStatus, GpuBackend, LoadAction,
    PassTarget, PolygonMode, ProgramHandle, ShaderLoader, TEXTURE_SLOTS, TextureDesc,
    TextureFormat, TextureHandle, TextureUsage, UniformSlot,
};
pub use camera::{FlyCamera, Movement};
pub use error::{PipelineError, ResourceError, RuntimeDrawError, SettingsError, ShaderError};
pub use headless::{Command, HeadlessBackend};
pub use kernel::{MAX_KERNEL_SIZE, NOISE_DIM, SampleKernel};
pub use pipeline::{FrameReport, RenderPipeline, StageCounters, StageFailure};
pub use registry::{
    AoTargets, ColorTarget, FixedTargets, FrameTargets, GBuffer, PassSpec, ResourceRegistry,
    ShadowTargets, ViewportTargets, WaterSpec, WaterTargets,
};
pub use scene::{
    FrameContext, InstanceBatch, ParticleField, Scene, SceneObject, Skybox, TerrainPatch,
    WaterSurface,
};
pub use settings::{EngineConfig, RendererSettings};
pub use shaders::{ShaderPass, ShaderSet};
pub use stage::{RenderStage, StageContext, StageGate, StageKind};
pub use wonderlands_fluid::{ConfigError, FluidConfig, WaterConfig, WaterFlow};

pub fn crate_info() -> &'static str {
    "wonderlands-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
