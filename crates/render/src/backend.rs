//! The seam between the pipeline and a graphics API.
//!
//! Stages talk to the GPU only through [`GpuBackend`]. The wgpu backend lives
//! in its own crate; [`crate::HeadlessBackend`] records commands for tests
//! and dry runs.

use glam::Mat4;
use serde::{Deserialize, Serialize};
use wonderlands_common::{MaterialHandle, MeshHandle};

use crate::error::{ResourceError, RuntimeDrawError, ShaderError};
use crate::shaders::ShaderPass;

/// Number of texture slots a program can sample from in one draw.
pub const TEXTURE_SLOTS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FramebufferHandle(pub u32);

/// Linked program. Zero is never a valid program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramHandle(pub u32);

impl ProgramHandle {
    pub const INVALID: ProgramHandle = ProgramHandle(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// Single-channel float, used for occlusion.
    R16Float,
    /// Single-channel float, used for light-space depth.
    R32Float,
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
}

impl TextureFormat {
    pub fn bytes_per_texel(self) -> usize {
        match self {
            TextureFormat::R16Float => 2,
            TextureFormat::R32Float | TextureFormat::Rgba8Unorm | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    /// Written by passes, sampled by later ones.
    RenderTarget,
    /// Filled from the CPU, sampled only.
    Upload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDesc {
    pub fn target(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
            usage: TextureUsage::RenderTarget,
        }
    }

    pub fn upload(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
            usage: TextureUsage::Upload,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_texel()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FramebufferDesc {
    pub label: String,
    pub color: Vec<TextureHandle>,
    pub depth: Option<TextureHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    Complete,
    MissingAttachment,
    SizeMismatch,
    UnsupportedFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassTarget {
    Framebuffer(FramebufferHandle),
    /// The presentation surface.
    Surface,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadAction {
    /// Clear color attachments and depth.
    ClearAll([f32; 4]),
    /// Clear color attachments, keep depth from earlier passes.
    ClearColor([f32; 4]),
    Load,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    /// Camera, sun and timing data shared by every pass.
    Frame,
    /// Data specific to the bound program.
    Pass,
}

/// One instanced mesh draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    /// One model matrix per instance.
    pub instances: &'a [Mat4],
}

/// Graphics operations the render stages need.
///
/// Binding state behaves like a classic immediate-mode API: a pass target,
/// a program, uniform data and texture slots are bound, then draws consume
/// them. [`GpuBackend::end_pass`] must be safe to call with no pass active.
pub trait GpuBackend {
    fn name(&self) -> &str;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle, ResourceError>;
    fn upload_texture(&mut self, texture: TextureHandle, data: &[u8]) -> Result<(), ResourceError>;
    fn destroy_texture(&mut self, texture: TextureHandle);

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferHandle, ResourceError>;
    fn framebuffer_status(&self, framebuffer: FramebufferHandle) -> FramebufferStatus;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    fn begin_frame(&mut self) -> Result<(), RuntimeDrawError>;
    fn begin_pass(&mut self, target: PassTarget, load: LoadAction) -> Result<(), RuntimeDrawError>;
    fn use_program(&mut self, program: ProgramHandle) -> Result<(), RuntimeDrawError>;
    fn set_uniforms(&mut self, slot: UniformSlot, data: &[u8]);
    fn bind_texture(&mut self, slot: u32, texture: TextureHandle) -> Result<(), RuntimeDrawError>;
    fn set_polygon_mode(&mut self, mode: PolygonMode);
    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), RuntimeDrawError>;
    /// Full-screen triangle with the bound program.
    fn draw_fullscreen(&mut self) -> Result<(), RuntimeDrawError>;
    /// Close the active pass and unbind program, textures and uniforms.
    fn end_pass(&mut self);
    fn end_frame(&mut self) -> Result<(), RuntimeDrawError>;
}

/// Compiles and links the program for one [`ShaderPass`].
///
/// A returned [`ProgramHandle::INVALID`] counts as a link failure.
pub trait ShaderLoader {
    fn load_program(&mut self, pass: ShaderPass) -> Result<ProgramHandle, ShaderError>;
}
