use std::collections::HashMap;
use std::rc::Rc;

use wgpu::util::DeviceExt;
use wonderlands_common::{MaterialHandle, MeshHandle};
use wonderlands_render::uniforms::LightsUniforms;
use wonderlands_render::{
    DrawCall, FramebufferDesc, FramebufferHandle, FramebufferStatus, GpuBackend, LoadAction,
    PassTarget, PolygonMode, ProgramHandle, ResourceError, RuntimeDrawError, ShaderError,
    ShaderLoader, ShaderPass, TEXTURE_SLOTS, TextureDesc, TextureFormat, TextureHandle,
    TextureUsage, UniformSlot,
};

use crate::mesh::{InstanceData, MeshData, Vertex};
use crate::shaders::{shader_source, uses_mesh_input};

const SLOTS: usize = TEXTURE_SLOTS as usize;
const DEFAULT_COLOR: [f32; 4] = [0.8, 0.8, 0.8, 1.0];

pub fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::R16Float => wgpu::TextureFormat::R16Float,
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

pub fn texture_usages(desc: &TextureDesc) -> wgpu::TextureUsages {
    match desc.usage {
        TextureUsage::RenderTarget if desc.format.is_depth() => {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        }
        TextureUsage::RenderTarget => {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        }
        TextureUsage::Upload => {
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
        }
    }
}

/// Fixed-function state that depends only on which pass a program serves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassTraits {
    pub mesh_input: bool,
    pub depth_write: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub blend: Option<wgpu::BlendState>,
    pub cull: Option<wgpu::Face>,
}

const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent::OVER,
};

pub fn pass_traits(pass: ShaderPass) -> PassTraits {
    use wgpu::CompareFunction::{Always, Less, LessEqual};
    let (depth_write, depth_compare, blend, cull) = match pass {
        ShaderPass::GBuffer | ShaderPass::ShadowMap => (true, Less, None, Some(wgpu::Face::Back)),
        ShaderPass::Forward => (true, Less, None, None),
        ShaderPass::Skybox => (false, LessEqual, None, None),
        ShaderPass::Water => (false, Less, Some(wgpu::BlendState::ALPHA_BLENDING), None),
        ShaderPass::Particle => (false, Less, Some(ADDITIVE), None),
        ShaderPass::Ssao
        | ShaderPass::SsaoBlur
        | ShaderPass::Lighting
        | ShaderPass::BrightPass
        | ShaderPass::Blur
        | ShaderPass::PostProcess => (false, Always, None, None),
    };
    PassTraits {
        mesh_input: uses_mesh_input(pass),
        depth_write,
        depth_compare,
        blend,
        cull,
    }
}

fn load_ops(load: LoadAction) -> (wgpu::LoadOp<wgpu::Color>, wgpu::LoadOp<f32>) {
    let clear = |c: [f32; 4]| {
        wgpu::LoadOp::Clear(wgpu::Color {
            r: c[0] as f64,
            g: c[1] as f64,
            b: c[2] as f64,
            a: c[3] as f64,
        })
    };
    match load {
        LoadAction::ClearAll(c) => (clear(c), wgpu::LoadOp::Clear(1.0)),
        LoadAction::ClearColor(c) => (clear(c), wgpu::LoadOp::Load),
        LoadAction::Load => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
    }
}

/// Completeness of `desc` given the descriptors of its attachments.
pub fn attachment_status<'a>(
    desc: &FramebufferDesc,
    lookup: impl Fn(TextureHandle) -> Option<&'a TextureDesc>,
) -> FramebufferStatus {
    if desc.color.is_empty() {
        return FramebufferStatus::MissingAttachment;
    }
    let mut colors = Vec::with_capacity(desc.color.len());
    for t in &desc.color {
        match lookup(*t) {
            Some(d) => colors.push(d),
            None => return FramebufferStatus::MissingAttachment,
        }
    }
    let depth = match desc.depth {
        Some(t) => match lookup(t) {
            Some(d) => Some(d),
            None => return FramebufferStatus::MissingAttachment,
        },
        None => None,
    };
    let size = (colors[0].width, colors[0].height);
    if colors
        .iter()
        .chain(depth.iter())
        .any(|d| (d.width, d.height) != size)
    {
        return FramebufferStatus::SizeMismatch;
    }
    let usable = colors
        .iter()
        .all(|d| !d.format.is_depth() && d.usage == TextureUsage::RenderTarget)
        && depth.is_none_or(|d| d.format.is_depth());
    if usable {
        FramebufferStatus::Complete
    } else {
        FramebufferStatus::UnsupportedFormat
    }
}

struct GpuTexture {
    desc: TextureDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct Program {
    pass: ShaderPass,
    module: wgpu::ShaderModule,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    mode: PolygonMode,
    colors: Vec<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureFormat>,
}

enum Geometry {
    Fullscreen,
    Mesh {
        mesh: Rc<GpuMesh>,
        instances: wgpu::Buffer,
        count: u32,
    },
}

struct RecordedDraw {
    pipeline: Rc<wgpu::RenderPipeline>,
    bind_group: Rc<wgpu::BindGroup>,
    geometry: Geometry,
}

/// A pass is recorded first and encoded on `end_pass`, once every draw
/// has its own bind group snapshot.
struct PendingPass {
    target: PassTarget,
    load: LoadAction,
    colors: Vec<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureFormat>,
    draws: Vec<RecordedDraw>,
}

#[derive(Default)]
struct Bound {
    program: Option<ProgramHandle>,
    frame_uniforms: Option<Rc<wgpu::Buffer>>,
    pass_uniforms: Option<Rc<wgpu::Buffer>>,
    textures: [Option<TextureHandle>; SLOTS],
    bind_group: Option<Rc<wgpu::BindGroup>>,
}

/// [`GpuBackend`] over a wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    surface_view: Option<wgpu::TextureView>,
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    fallback_view: wgpu::TextureView,
    fallback_uniforms: wgpu::Buffer,
    line_mode_supported: bool,
    line_mode_warned: bool,
    next_id: u32,
    textures: HashMap<TextureHandle, GpuTexture>,
    framebuffers: HashMap<FramebufferHandle, FramebufferDesc>,
    programs: HashMap<ProgramHandle, Program>,
    pipelines: HashMap<PipelineKey, Rc<wgpu::RenderPipeline>>,
    meshes: HashMap<MeshHandle, Rc<GpuMesh>>,
    materials: HashMap<MaterialHandle, [f32; 4]>,
    encoder: Option<wgpu::CommandEncoder>,
    pass: Option<PendingPass>,
    bound: Bound,
    polygon_mode: PolygonMode,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, surface_format: wgpu::TextureFormat) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass_bind_group_layout"),
            entries: &bind_group_layout_entries(),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pass_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("nearest_clamp"),
            ..Default::default()
        });

        let fallback = device.create_texture_with_data(
            &queue,
            &wgpu::TextureDescriptor {
                label: Some("fallback_texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let fallback_view = fallback.create_view(&wgpu::TextureViewDescriptor::default());
        // large enough for any pass block a shader may declare
        let fallback_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fallback_uniforms"),
            size: std::mem::size_of::<LightsUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });

        let line_mode_supported = device.features().contains(wgpu::Features::POLYGON_MODE_LINE);
        tracing::info!(?surface_format, line_mode_supported, "wgpu backend ready");

        Self {
            device,
            queue,
            surface_format,
            surface_view: None,
            layout,
            pipeline_layout,
            sampler,
            fallback_view,
            fallback_uniforms,
            line_mode_supported,
            line_mode_warned: false,
            next_id: 0,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            meshes: HashMap::new(),
            materials: HashMap::new(),
            encoder: None,
            pass: None,
            bound: Bound::default(),
            polygon_mode: PolygonMode::Fill,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    /// View the next surface pass renders into. Set once per frame before
    /// the pipeline ticks.
    pub fn set_surface_view(&mut self, view: Option<wgpu::TextureView>) {
        self.surface_view = view;
    }

    pub fn register_mesh(&mut self, data: &MeshData) -> MeshHandle {
        let handle = MeshHandle(self.next_handle() as u64);
        let vertices = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertices"),
            contents: bytemuck::cast_slice::<Vertex, u8>(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_indices"),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.meshes.insert(
            handle,
            Rc::new(GpuMesh {
                vertices,
                indices,
                index_count: data.indices.len() as u32,
            }),
        );
        tracing::debug!(?handle, vertices = data.vertices.len(), "mesh registered");
        handle
    }

    /// A flat-colored material. Unknown handles draw in a neutral grey.
    pub fn register_material(&mut self, color: [f32; 4]) -> MaterialHandle {
        let handle = MaterialHandle(self.next_handle() as u64);
        self.materials.insert(handle, color);
        handle
    }

    fn next_handle(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn pending(&self) -> Result<&PendingPass, RuntimeDrawError> {
        self.pass.as_ref().ok_or(RuntimeDrawError::NoActivePass)
    }

    fn pipeline(&mut self) -> Result<Rc<wgpu::RenderPipeline>, RuntimeDrawError> {
        let program = self.bound.program.ok_or(RuntimeDrawError::NoProgram)?;
        let pass = self.pending()?;
        let key = PipelineKey {
            program,
            mode: self.polygon_mode,
            colors: pass.colors.clone(),
            depth: pass.depth,
        };
        if let Some(p) = self.pipelines.get(&key) {
            return Ok(p.clone());
        }
        let prog = self.programs.get(&program).ok_or(RuntimeDrawError::NoProgram)?;
        let traits = pass_traits(prog.pass);

        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .colors
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: traits.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();
        let buffers = if traits.mesh_input {
            vec![Vertex::layout(), InstanceData::layout()]
        } else {
            Vec::new()
        };
        let polygon_mode = match key.mode {
            PolygonMode::Fill => wgpu::PolygonMode::Fill,
            PolygonMode::Line => wgpu::PolygonMode::Line,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(prog.pass.name()),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &prog.module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &prog.module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &targets,
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: traits.cull,
                    polygon_mode,
                    ..Default::default()
                },
                depth_stencil: key.depth.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: traits.depth_write,
                    depth_compare: traits.depth_compare,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RuntimeDrawError::Backend(format!(
                "pipeline '{}': {err}",
                prog.pass
            )));
        }
        tracing::debug!(pass = %prog.pass, mode = ?key.mode, "pipeline created");
        let pipeline = Rc::new(pipeline);
        self.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    fn bind_group(&mut self) -> Rc<wgpu::BindGroup> {
        if let Some(group) = &self.bound.bind_group {
            return group.clone();
        }
        let frame = self
            .bound
            .frame_uniforms
            .as_deref()
            .unwrap_or(&self.fallback_uniforms);
        let pass = self
            .bound
            .pass_uniforms
            .as_deref()
            .unwrap_or(&self.fallback_uniforms);
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: frame.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: pass.as_entire_binding(),
            },
        ];
        for (slot, texture) in self.bound.textures.iter().enumerate() {
            let view = texture
                .and_then(|t| self.textures.get(&t))
                .map_or(&self.fallback_view, |t| &t.view);
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + slot as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: 8,
            resource: wgpu::BindingResource::Sampler(&self.sampler),
        });
        let group = Rc::new(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pass_bind_group"),
            layout: &self.layout,
            entries: &entries,
        }));
        self.bound.bind_group = Some(group.clone());
        group
    }

    fn record(&mut self, geometry: Geometry) -> Result<(), RuntimeDrawError> {
        let pipeline = self.pipeline()?;
        let bind_group = self.bind_group();
        let pass = self.pass.as_mut().ok_or(RuntimeDrawError::NoActivePass)?;
        pass.draws.push(RecordedDraw {
            pipeline,
            bind_group,
            geometry,
        });
        Ok(())
    }

    fn pass_formats(
        &self,
        target: PassTarget,
    ) -> Result<(Vec<wgpu::TextureFormat>, Option<wgpu::TextureFormat>), RuntimeDrawError> {
        match target {
            PassTarget::Surface => {
                if self.surface_view.is_none() {
                    return Err(RuntimeDrawError::NoSurface);
                }
                Ok((vec![self.surface_format], None))
            }
            PassTarget::Framebuffer(fb) => {
                let desc = self
                    .framebuffers
                    .get(&fb)
                    .ok_or(RuntimeDrawError::UnknownFramebuffer(fb))?;
                let format_of = |t: &TextureHandle| {
                    self.textures
                        .get(t)
                        .map(|g| texture_format(g.desc.format))
                        .ok_or(RuntimeDrawError::UnknownTexture(*t))
                };
                let colors: Vec<wgpu::TextureFormat> =
                    desc.color.iter().map(format_of).collect::<Result<_, _>>()?;
                let depth = desc.depth.as_ref().map(format_of).transpose()?;
                Ok((colors, depth))
            }
        }
    }
}

fn bind_group_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let visibility = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
    let uniform = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    let mut entries = vec![uniform(0), uniform(1)];
    entries.extend((0..TEXTURE_SLOTS).map(|slot| wgpu::BindGroupLayoutEntry {
        binding: 2 + slot,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }));
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: 8,
        visibility,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
        count: None,
    });
    entries
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle, ResourceError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(ResourceError::TextureCreation {
                label: desc.label.clone(),
                reason: format!("size {}x{} outside 1..={max}", desc.width, desc.height),
            });
        }
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage: texture_usages(desc),
            view_formats: &[],
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ResourceError::TextureCreation {
                label: desc.label.clone(),
                reason: err.to_string(),
            });
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let handle = TextureHandle(self.next_handle());
        tracing::trace!(label = %desc.label, ?handle, "texture created");
        self.textures.insert(
            handle,
            GpuTexture {
                desc: desc.clone(),
                texture,
                view,
            },
        );
        Ok(handle)
    }

    fn upload_texture(&mut self, texture: TextureHandle, data: &[u8]) -> Result<(), ResourceError> {
        let gpu = self
            .textures
            .get(&texture)
            .ok_or(ResourceError::UnknownTexture(texture))?;
        let desc = &gpu.desc;
        if data.len() != desc.byte_len() {
            return Err(ResourceError::UploadSize {
                label: desc.label.clone(),
                expected: desc.byte_len(),
                actual: data.len(),
            });
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(desc.width * desc.format.bytes_per_texel() as u32),
                rows_per_image: Some(desc.height),
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(gpu) = self.textures.remove(&texture) {
            gpu.texture.destroy();
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
        match self.framebuffers.get(&framebuffer) {
            Some(desc) => attachment_status(desc, |t| self.textures.get(&t).map(|g| &g.desc)),
            None => FramebufferStatus::MissingAttachment,
        }
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.framebuffers.remove(&framebuffer);
    }

    fn begin_frame(&mut self) -> Result<(), RuntimeDrawError> {
        if self.encoder.is_some() {
            tracing::warn!("frame started before the previous one ended, dropping it");
            self.pass = None;
        }
        self.encoder = Some(self.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            },
        ));
        self.bound = Bound::default();
        Ok(())
    }

    fn begin_pass(&mut self, target: PassTarget, load: LoadAction) -> Result<(), RuntimeDrawError> {
        if self.encoder.is_none() {
            return Err(RuntimeDrawError::NoActiveFrame);
        }
        if self.pass.is_some() {
            return Err(RuntimeDrawError::PassAlreadyActive);
        }
        let (colors, depth) = self.pass_formats(target)?;
        self.pass = Some(PendingPass {
            target,
            load,
            colors,
            depth,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn use_program(&mut self, program: ProgramHandle) -> Result<(), RuntimeDrawError> {
        if !self.programs.contains_key(&program) {
            return Err(RuntimeDrawError::NoProgram);
        }
        self.bound.program = Some(program);
        Ok(())
    }

    fn set_uniforms(&mut self, slot: UniformSlot, data: &[u8]) {
        let buffer = Rc::new(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniforms"),
            contents: data,
            usage: wgpu::BufferUsages::UNIFORM,
        }));
        match slot {
            UniformSlot::Frame => self.bound.frame_uniforms = Some(buffer),
            UniformSlot::Pass => self.bound.pass_uniforms = Some(buffer),
        }
        self.bound.bind_group = None;
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureHandle) -> Result<(), RuntimeDrawError> {
        if slot >= TEXTURE_SLOTS {
            return Err(RuntimeDrawError::TextureSlot(slot));
        }
        if !self.textures.contains_key(&texture) {
            return Err(RuntimeDrawError::UnknownTexture(texture));
        }
        if let Some(PendingPass {
            target: PassTarget::Framebuffer(fb),
            ..
        }) = &self.pass
        {
            let writes = self
                .framebuffers
                .get(fb)
                .is_some_and(|d| d.color.contains(&texture) || d.depth == Some(texture));
            if writes {
                return Err(RuntimeDrawError::FeedbackLoop(texture));
            }
        }
        self.bound.textures[slot as usize] = Some(texture);
        self.bound.bind_group = None;
        Ok(())
    }

    fn set_polygon_mode(&mut self, mode: PolygonMode) {
        if mode == PolygonMode::Line && !self.line_mode_supported {
            if !self.line_mode_warned {
                tracing::warn!("line polygon mode unsupported by this device, drawing filled");
                self.line_mode_warned = true;
            }
            self.polygon_mode = PolygonMode::Fill;
            return;
        }
        self.polygon_mode = mode;
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), RuntimeDrawError> {
        self.pending()?;
        let mesh = self
            .meshes
            .get(&call.mesh)
            .cloned()
            .ok_or(RuntimeDrawError::UnknownMesh(call.mesh))?;
        if call.instances.is_empty() {
            return Ok(());
        }
        let color = self
            .materials
            .get(&call.material)
            .copied()
            .unwrap_or(DEFAULT_COLOR);
        let data: Vec<InstanceData> = call
            .instances
            .iter()
            .map(|m| InstanceData::new(m, color))
            .collect();
        let instances = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("instances"),
            contents: bytemuck::cast_slice(&data),
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.record(Geometry::Mesh {
            mesh,
            instances,
            count: data.len() as u32,
        })
    }

    fn draw_fullscreen(&mut self) -> Result<(), RuntimeDrawError> {
        self.pending()?;
        self.record(Geometry::Fullscreen)
    }

    fn end_pass(&mut self) {
        let frame_uniforms = self.bound.frame_uniforms.take();
        self.bound = Bound {
            frame_uniforms,
            ..Bound::default()
        };
        let Some(pass) = self.pass.take() else {
            return;
        };
        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };

        let (colors, depth): (Vec<&wgpu::TextureView>, Option<&wgpu::TextureView>) =
            match pass.target {
                PassTarget::Surface => match self.surface_view.as_ref() {
                    Some(view) => (vec![view], None),
                    None => return,
                },
                PassTarget::Framebuffer(fb) => {
                    let Some(desc) = self.framebuffers.get(&fb) else {
                        return;
                    };
                    let colors = desc
                        .color
                        .iter()
                        .filter_map(|t| self.textures.get(t).map(|g| &g.view))
                        .collect();
                    let depth = desc
                        .depth
                        .and_then(|t| self.textures.get(&t).map(|g| &g.view));
                    (colors, depth)
                }
            };

        let (color_load, depth_load) = load_ops(pass.load);
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = colors
            .into_iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();
        let depth_stencil_attachment = depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
            view,
            depth_ops: Some(wgpu::Operations {
                load: depth_load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        });

        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pipeline_pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            ..Default::default()
        });
        for draw in &pass.draws {
            rp.set_pipeline(&draw.pipeline);
            rp.set_bind_group(0, &*draw.bind_group, &[]);
            match &draw.geometry {
                Geometry::Fullscreen => rp.draw(0..3, 0..1),
                Geometry::Mesh {
                    mesh,
                    instances,
                    count,
                } => {
                    rp.set_vertex_buffer(0, mesh.vertices.slice(..));
                    rp.set_vertex_buffer(1, instances.slice(..));
                    rp.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                    rp.draw_indexed(0..mesh.index_count, 0, 0..*count);
                }
            }
        }
    }

    fn end_frame(&mut self) -> Result<(), RuntimeDrawError> {
        self.end_pass();
        let encoder = self.encoder.take().ok_or(RuntimeDrawError::NoActiveFrame)?;
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl ShaderLoader for WgpuBackend {
    fn load_program(&mut self, pass: ShaderPass) -> Result<ProgramHandle, ShaderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(pass.name()),
            source: wgpu::ShaderSource::Wgsl(shader_source(pass).into()),
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ShaderError::Compile {
                pass,
                message: err.to_string(),
            });
        }
        let handle = ProgramHandle(self.next_handle());
        self.programs.insert(handle, Program { pass, module });
        tracing::debug!(%pass, ?handle, "program compiled");
        Ok(handle)
    }
}
