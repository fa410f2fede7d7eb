//! A [`GpuBackend`] that validates binding state and records what it was asked
//! to do, without touching a GPU. Used by tests and by CLI dry runs.

use std::collections::{BTreeMap, BTreeSet};
use wonderlands_common::MeshHandle;

use crate::backend::{
    DrawCall, FramebufferDesc, FramebufferHandle, FramebufferStatus, GpuBackend, LoadAction,
    PassTarget, PolygonMode, ProgramHandle, ShaderLoader, TEXTURE_SLOTS, TextureDesc,
    TextureHandle, UniformSlot,
};
use crate::error::{ResourceError, RuntimeDrawError, ShaderError};
use crate::shaders::ShaderPass;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginFrame,
    BeginPass { target: PassTarget, load: LoadAction },
    UseProgram(ShaderPass),
    SetUniforms { slot: UniformSlot, bytes: usize },
    BindTexture { slot: u32, texture: TextureHandle },
    SetPolygonMode(PolygonMode),
    Draw {
        program: ShaderPass,
        mesh: MeshHandle,
        instances: usize,
        mode: PolygonMode,
    },
    DrawFullscreen { program: ShaderPass },
    EndPass,
    EndFrame,
}

#[derive(Debug, Default)]
struct Bound {
    target: Option<PassTarget>,
    program: Option<ShaderPass>,
    textures: BTreeMap<u32, TextureHandle>,
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    textures: BTreeMap<TextureHandle, TextureDesc>,
    framebuffers: BTreeMap<FramebufferHandle, FramebufferDesc>,
    programs: BTreeMap<ProgramHandle, ShaderPass>,
    meshes: BTreeSet<MeshHandle>,
    next_id: u32,
    in_frame: bool,
    bound: Bound,
    polygon_mode: PolygonMode,
    log: Vec<Command>,
    failing_shaders: BTreeSet<ShaderPass>,
    failing_framebuffers: BTreeSet<String>,
    failing_draws: BTreeSet<ShaderPass>,
    destroyed_textures: usize,
    destroyed_framebuffers: usize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mesh the way a model loader would.
    pub fn register_mesh(&mut self) -> MeshHandle {
        let handle = MeshHandle(self.next_handle() as u64);
        self.meshes.insert(handle);
        handle
    }

    /// Make the program for `pass` fail to compile.
    pub fn fail_shader(&mut self, pass: ShaderPass) {
        self.failing_shaders.insert(pass);
    }

    /// Report framebuffers with this label as incomplete.
    pub fn fail_framebuffer(&mut self, label: impl Into<String>) {
        self.failing_framebuffers.insert(label.into());
    }

    /// Fail every draw issued while `pass`'s program is bound.
    pub fn fail_draws(&mut self, pass: ShaderPass) {
        self.failing_draws.insert(pass);
    }

    pub fn commands(&self) -> &[Command] {
        &self.log
    }

    pub fn clear_commands(&mut self) {
        self.log.clear();
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn destroyed(&self) -> (usize, usize) {
        (self.destroyed_textures, self.destroyed_framebuffers)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureDesc> {
        self.textures.get(&handle)
    }

    pub fn framebuffer(&self, handle: FramebufferHandle) -> Option<&FramebufferDesc> {
        self.framebuffers.get(&handle)
    }

    /// Programs used by draws, in issue order.
    pub fn drawn_programs(&self) -> Vec<ShaderPass> {
        self.log
            .iter()
            .filter_map(|c| match c {
                Command::Draw { program, .. } | Command::DrawFullscreen { program } => Some(*program),
                _ => None,
            })
            .collect()
    }

    pub fn polygon_mode(&self) -> PolygonMode {
        self.polygon_mode
    }

    pub fn has_bound_target(&self) -> bool {
        self.bound.target.is_some()
    }

    fn next_handle(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn ready_to_draw(&self) -> Result<ShaderPass, RuntimeDrawError> {
        if self.bound.target.is_none() {
            return Err(RuntimeDrawError::NoActivePass);
        }
        let program = self.bound.program.ok_or(RuntimeDrawError::NoProgram)?;
        if self.failing_draws.contains(&program) {
            return Err(RuntimeDrawError::Backend(format!("injected failure in {program}")));
        }
        Ok(program)
    }
}

impl GpuBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle, ResourceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(ResourceError::TextureCreation {
                label: desc.label.clone(),
                reason: format!("zero size {}x{}", desc.width, desc.height),
            });
        }
        let handle = TextureHandle(self.next_handle());
        self.textures.insert(handle, desc.clone());
        Ok(handle)
    }

    fn upload_texture(&mut self, texture: TextureHandle, data: &[u8]) -> Result<(), ResourceError> {
        let desc = self
            .textures
            .get(&texture)
            .ok_or(ResourceError::UnknownTexture(texture))?;
        if data.len() != desc.byte_len() {
            return Err(ResourceError::UploadSize {
                label: desc.label.clone(),
                expected: desc.byte_len(),
                actual: data.len(),
            });
        }
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.destroyed_textures += 1;
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferHandle, ResourceError> {
        for t in desc.color.iter().chain(desc.depth.iter()) {
            if !self.textures.contains_key(t) {
                return Err(ResourceError::UnknownTexture(*t));
            }
        }
        let handle = FramebufferHandle(self.next_handle());
        self.framebuffers.insert(handle, desc.clone());
        Ok(handle)
    }

    fn framebuffer_status(&self, framebuffer: FramebufferHandle) -> FramebufferStatus {
        let Some(desc) = self.framebuffers.get(&framebuffer) else {
            return FramebufferStatus::MissingAttachment;
        };
        if self.failing_framebuffers.contains(&desc.label) || desc.color.is_empty() {
            return FramebufferStatus::MissingAttachment;
        }
        let mut sizes = desc
            .color
            .iter()
            .chain(desc.depth.iter())
            .filter_map(|t| self.textures.get(t))
            .map(|d| (d.width, d.height));
        let first = sizes.next();
        if sizes.any(|s| Some(s) != first) {
            return FramebufferStatus::SizeMismatch;
        }
        let depth_ok = desc
            .depth
            .and_then(|t| self.textures.get(&t))
            .is_none_or(|d| d.format.is_depth());
        let color_ok = desc
            .color
            .iter()
            .filter_map(|t| self.textures.get(t))
            .all(|d| !d.format.is_depth());
        if depth_ok && color_ok {
            FramebufferStatus::Complete
        } else {
            FramebufferStatus::UnsupportedFormat
        }
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.framebuffers.remove(&framebuffer).is_some() {
            self.destroyed_framebuffers += 1;
        }
    }

    fn begin_frame(&mut self) -> Result<(), RuntimeDrawError> {
        self.in_frame = true;
        self.log.push(Command::BeginFrame);
        Ok(())
    }

    fn begin_pass(&mut self, target: PassTarget, load: LoadAction) -> Result<(), RuntimeDrawError> {
        if !self.in_frame {
            return Err(RuntimeDrawError::NoActiveFrame);
        }
        if self.bound.target.is_some() {
            return Err(RuntimeDrawError::PassAlreadyActive);
        }
        if let PassTarget::Framebuffer(fb) = target {
            if !self.framebuffers.contains_key(&fb) {
                return Err(RuntimeDrawError::UnknownFramebuffer(fb));
            }
        }
        self.bound.target = Some(target);
        self.log.push(Command::BeginPass { target, load });
        Ok(())
    }

    fn use_program(&mut self, program: ProgramHandle) -> Result<(), RuntimeDrawError> {
        let pass = *self
            .programs
            .get(&program)
            .ok_or(RuntimeDrawError::NoProgram)?;
        self.bound.program = Some(pass);
        self.log.push(Command::UseProgram(pass));
        Ok(())
    }

    fn set_uniforms(&mut self, slot: UniformSlot, data: &[u8]) {
        self.log.push(Command::SetUniforms {
            slot,
            bytes: data.len(),
        });
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureHandle) -> Result<(), RuntimeDrawError> {
        if slot >= TEXTURE_SLOTS {
            return Err(RuntimeDrawError::TextureSlot(slot));
        }
        if !self.textures.contains_key(&texture) {
            return Err(RuntimeDrawError::UnknownTexture(texture));
        }
        if let Some(PassTarget::Framebuffer(fb)) = self.bound.target {
            let writes = self.framebuffers.get(&fb).is_some_and(|d| {
                d.color.contains(&texture) || d.depth == Some(texture)
            });
            if writes {
                return Err(RuntimeDrawError::FeedbackLoop(texture));
            }
        }
        self.bound.textures.insert(slot, texture);
        self.log.push(Command::BindTexture { slot, texture });
        Ok(())
    }

    fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.polygon_mode = mode;
        self.log.push(Command::SetPolygonMode(mode));
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), RuntimeDrawError> {
        let program = self.ready_to_draw()?;
        if !self.meshes.contains(&call.mesh) {
            return Err(RuntimeDrawError::UnknownMesh(call.mesh));
        }
        self.log.push(Command::Draw {
            program,
            mesh: call.mesh,
            instances: call.instances.len(),
            mode: self.polygon_mode,
        });
        Ok(())
    }

    fn draw_fullscreen(&mut self) -> Result<(), RuntimeDrawError> {
        let program = self.ready_to_draw()?;
        self.log.push(Command::DrawFullscreen { program });
        Ok(())
    }

    fn end_pass(&mut self) {
        if self.bound.target.is_some() {
            self.log.push(Command::EndPass);
        }
        self.bound = Bound::default();
    }

    fn end_frame(&mut self) -> Result<(), RuntimeDrawError> {
        if !self.in_frame {
            return Err(RuntimeDrawError::NoActiveFrame);
        }
        self.end_pass();
        self.in_frame = false;
        self.log.push(Command::EndFrame);
        Ok(())
    }
}

impl ShaderLoader for HeadlessBackend {
    fn load_program(&mut self, pass: ShaderPass) -> Result<ProgramHandle, ShaderError> {
        if self.failing_shaders.contains(&pass) {
            return Err(ShaderError::Compile {
                pass,
                message: "injected compile failure".into(),
            });
        }
        let handle = ProgramHandle(self.next_handle());
        self.programs.insert(handle, pass);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureFormat;
    use glam::Mat4;
    use wonderlands_common::MaterialHandle;

    fn framebuffer(b: &mut HeadlessBackend, label: &str) -> (TextureHandle, FramebufferHandle) {
        let color = b
            .create_texture(&TextureDesc::target("c", 4, 4, TextureFormat::Rgba8Unorm))
            .unwrap();
        let fb = b
            .create_framebuffer(&FramebufferDesc {
                label: label.into(),
                color: vec![color],
                depth: None,
            })
            .unwrap();
        (color, fb)
    }

    #[test]
    fn draw_needs_pass_and_program() {
        let mut b = HeadlessBackend::new();
        let mesh = b.register_mesh();
        let call = DrawCall {
            mesh,
            material: MaterialHandle(0),
            instances: &[Mat4::IDENTITY],
        };
        b.begin_frame().unwrap();
        assert_eq!(b.draw(&call), Err(RuntimeDrawError::NoActivePass));
        b.begin_pass(PassTarget::Surface, LoadAction::Load).unwrap();
        assert_eq!(b.draw(&call), Err(RuntimeDrawError::NoProgram));
        let p = b.load_program(ShaderPass::GBuffer).unwrap();
        b.use_program(p).unwrap();
        assert!(b.draw(&call).is_ok());
        assert_eq!(b.drawn_programs(), vec![ShaderPass::GBuffer]);
    }

    #[test]
    fn sampling_a_bound_attachment_is_rejected() {
        let mut b = HeadlessBackend::new();
        let (color, fb) = framebuffer(&mut b, "hdr");
        b.begin_frame().unwrap();
        b.begin_pass(PassTarget::Framebuffer(fb), LoadAction::ClearAll([0.0; 4]))
            .unwrap();
        assert_eq!(b.bind_texture(0, color), Err(RuntimeDrawError::FeedbackLoop(color)));
    }

    #[test]
    fn end_pass_unbinds_and_is_idempotent() {
        let mut b = HeadlessBackend::new();
        b.begin_frame().unwrap();
        b.begin_pass(PassTarget::Surface, LoadAction::Load).unwrap();
        b.end_pass();
        b.end_pass();
        assert!(!b.has_bound_target());
        let ends = b.commands().iter().filter(|c| **c == Command::EndPass).count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn injected_framebuffer_failure_reports_incomplete() {
        let mut b = HeadlessBackend::new();
        b.fail_framebuffer("gbuffer");
        let (_, fb) = framebuffer(&mut b, "gbuffer");
        assert_eq!(b.framebuffer_status(fb), FramebufferStatus::MissingAttachment);
        let (_, ok) = framebuffer(&mut b, "hdr");
        assert_eq!(b.framebuffer_status(ok), FramebufferStatus::Complete);
    }

    #[test]
    fn mismatched_attachment_sizes_detected() {
        let mut b = HeadlessBackend::new();
        let c = b
            .create_texture(&TextureDesc::target("c", 4, 4, TextureFormat::Rgba8Unorm))
            .unwrap();
        let d = b
            .create_texture(&TextureDesc::target("d", 8, 8, TextureFormat::Depth32Float))
            .unwrap();
        let fb = b
            .create_framebuffer(&FramebufferDesc {
                label: "x".into(),
                color: vec![c],
                depth: Some(d),
            })
            .unwrap();
        assert_eq!(b.framebuffer_status(fb), FramebufferStatus::SizeMismatch);
    }

    #[test]
    fn upload_size_checked() {
        let mut b = HeadlessBackend::new();
        let t = b
            .create_texture(&TextureDesc::upload("noise", 4, 4, TextureFormat::Rgba32Float))
            .unwrap();
        assert!(b.upload_texture(t, &[0u8; 256]).is_ok());
        assert!(matches!(
            b.upload_texture(t, &[0u8; 10]),
            Err(ResourceError::UploadSize { expected: 256, .. })
        ));
    }
}
