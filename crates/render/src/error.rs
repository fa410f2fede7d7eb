use wonderlands_common::MeshHandle;
use wonderlands_fluid::ConfigError;

use crate::backend::{FramebufferHandle, FramebufferStatus, TextureHandle};
use crate::shaders::ShaderPass;

/// GPU resource creation or lifetime failures. Fatal when raised during
/// pipeline construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    #[error("failed to create texture '{label}': {reason}")]
    TextureCreation { label: String, reason: String },

    #[error("framebuffer '{label}' is incomplete: {status:?}")]
    IncompleteFramebuffer {
        label: String,
        status: FramebufferStatus,
    },

    #[error("upload to '{label}' expected {expected} bytes, got {actual}")]
    UploadSize {
        label: String,
        expected: usize,
        actual: usize,
    },

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureHandle),

    #[error("unknown framebuffer {0:?}")]
    UnknownFramebuffer(FramebufferHandle),

    #[error("frame targets were already released")]
    AlreadyReleased,
}

/// Program compile or link failure, naming the pass it belongs to.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShaderError {
    #[error("shader '{pass}' failed to compile: {message}")]
    Compile { pass: ShaderPass, message: String },

    #[error("shader '{pass}' produced an invalid program handle")]
    InvalidHandle { pass: ShaderPass },
}

impl ShaderError {
    pub fn pass(&self) -> ShaderPass {
        match self {
            ShaderError::Compile { pass, .. } | ShaderError::InvalidHandle { pass } => *pass,
        }
    }
}

/// Per-frame draw failure. Logged by the pipeline; the frame continues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeDrawError {
    #[error("no render pass is active")]
    NoActivePass,

    #[error("a render pass is already active")]
    PassAlreadyActive,

    #[error("no frame is in progress")]
    NoActiveFrame,

    #[error("no program is bound")]
    NoProgram,

    #[error("unknown mesh {0:?}")]
    UnknownMesh(MeshHandle),

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureHandle),

    #[error("unknown framebuffer {0:?}")]
    UnknownFramebuffer(FramebufferHandle),

    #[error("texture slot {0} is out of range")]
    TextureSlot(u32),

    #[error("texture {0:?} is both sampled and written in the same pass")]
    FeedbackLoop(TextureHandle),

    #[error("no presentation surface is available")]
    NoSurface,

    #[error("backend error: {0}")]
    Backend(String),
}

/// Anything that can stop [`crate::RenderPipeline::new`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Shader(#[from] ShaderError),
}

/// Failures loading an [`crate::EngineConfig`] from disk.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}
