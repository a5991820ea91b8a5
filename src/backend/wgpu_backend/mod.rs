//! wgpu backend implementation
//!
//! Draws are buffered into a pending render pass per target binding and replayed
//! into a real `wgpu::RenderPass` when the binding changes, the target is cleared
//! again, or the frame ends. Effect uniforms live in one dynamic-offset arena that
//! is uploaded right before submission.

mod overlay;

use crate::backend::traits::*;
use crate::backend::types::*;
use overlay::TextOverlayRenderer;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Upper bound on draws recorded between `begin_frame` and `end_frame`
const MAX_DRAWS_PER_FRAME: u32 = 1024;

const BACKBUFFER_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct GpuTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    dimension: TextureDimension,
}

struct GpuRenderTarget {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

struct GpuDepthSurface {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct GpuProgram {
    module: wgpu::ShaderModule,
    passes: Vec<ProgramPass>,
    slots: Vec<TextureSlot>,
    texture_layout: Option<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: u64,
    pass: u32,
    color_format: wgpu::TextureFormat,
    depth: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextureBindingKey {
    program: u64,
    textures: Vec<(u32, TextureRef)>,
}

/// Buffered draw command
struct RecordedDraw {
    pipeline: PipelineKey,
    textures: Option<TextureBindingKey>,
    mesh: u64,
    uniform_offset: u32,
}

/// Pending render pass with buffered draws
struct PendingRenderPass {
    binding: TargetBinding,
    clear: Option<([f32; 4], f32)>,
    draws: Vec<RecordedDraw>,
}

/// wgpu backend implementation
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    #[allow(dead_code)]
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    backbuffer_depth: GpuDepthSurface,

    // Frame state
    current_texture: Option<wgpu::SurfaceTexture>,
    current_view: Option<wgpu::TextureView>,
    encoder: Option<wgpu::CommandEncoder>,
    pending_render_pass: Option<PendingRenderPass>,
    binding: TargetBinding,
    overlay_text: Option<TextOverlay>,

    // Resource storage
    meshes: HashMap<u64, GpuMesh>,
    textures: HashMap<u64, GpuTexture>,
    render_targets: HashMap<u64, GpuRenderTarget>,
    depth_surfaces: HashMap<u64, GpuDepthSurface>,
    programs: HashMap<u64, GpuProgram>,
    next_resource_id: u64,

    // Caches
    render_pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    texture_bind_groups: HashMap<TextureBindingKey, wgpu::BindGroup>,

    // Uniform arena
    uniform_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_stride: u32,
    uniform_staging: Vec<u8>,
    draws_this_frame: u32,

    repeat_sampler: wgpu::Sampler,
    clamp_sampler: wgpu::Sampler,
    overlay: TextOverlayRenderer,
}

impl WgpuBackend {
    fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }

    fn convert_vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
        match format {
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        }
    }

    fn convert_color(color: [f32; 4]) -> wgpu::Color {
        wgpu::Color {
            r: color[0] as f64,
            g: color[1] as f64,
            b: color[2] as f64,
            a: color[3] as f64,
        }
    }

    fn clamp_to_limits(&self, width: u32, height: u32) -> (u32, u32) {
        clamp_extent(self.device.limits().max_texture_dimension_2d, width, height)
    }

    fn check_extent(&self, label: &str, width: u32, height: u32) -> BackendResult<()> {
        check_texture_extent(
            self.device.limits().max_texture_dimension_2d,
            label,
            width,
            height,
        )
    }

    /// Pop the validation scope pushed before a resource creation
    fn pop_validation(&self) -> Option<wgpu::Error> {
        pollster::block_on(self.device.pop_error_scope())
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_resource_id;
        self.next_resource_id += 1;
        id
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
    ) -> GpuDepthSurface {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: BACKBUFFER_DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuDepthSurface {
            texture,
            view,
            width,
            height,
        }
    }

    fn create_sampler(device: &wgpu::Device, label: &str, mode: wgpu::AddressMode) -> wgpu::Sampler {
        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: mode,
            address_mode_v: mode,
            address_mode_w: mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        })
    }
}

impl WgpuBackend {
    /// Create the device, swapchain and shared per-frame resources for `window`
    pub fn new(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window, vsync))
    }

    async fn new_async(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        let (instance, surface, adapter, device, queue) = Self::init_native(window.clone()).await?;

        device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
            log::error!("wgpu: {}", error);
        }));

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| {
                BackendError::SurfaceCreationFailed("surface reports no formats".into())
            })?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let (width, height) = clamp_extent(
            device.limits().max_texture_dimension_2d,
            size.width,
            size.height,
        );

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &surface_config);

        let backbuffer_depth = Self::create_depth_texture(&device, "Backbuffer Depth", width, height);

        let uniform_size = std::mem::size_of::<EffectUniforms>() as u64;
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let uniform_stride = uniform_size.div_ceil(alignment) * alignment;

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Effect Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(uniform_size),
                },
                count: None,
            }],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Effect Uniform Arena"),
            size: uniform_stride * MAX_DRAWS_PER_FRAME as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Uniforms"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(uniform_size),
                }),
            }],
        });

        let repeat_sampler = Self::create_sampler(&device, "Asset Sampler", wgpu::AddressMode::Repeat);
        let clamp_sampler =
            Self::create_sampler(&device, "Target Sampler", wgpu::AddressMode::ClampToEdge);
        let overlay = TextOverlayRenderer::new(&device, surface_format);

        Ok(Self {
            instance,
            surface,
            adapter,
            device,
            queue,
            surface_config,
            backbuffer_depth,
            current_texture: None,
            current_view: None,
            encoder: None,
            pending_render_pass: None,
            binding: TargetBinding::BACKBUFFER,
            overlay_text: None,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            render_targets: HashMap::new(),
            depth_surfaces: HashMap::new(),
            programs: HashMap::new(),
            next_resource_id: 1,
            render_pipelines: HashMap::new(),
            texture_bind_groups: HashMap::new(),
            uniform_layout,
            uniform_buffer,
            uniform_bind_group,
            uniform_stride: uniform_stride as u32,
            uniform_staging: Vec::new(),
            draws_this_frame: 0,
            repeat_sampler,
            clamp_sampler,
            overlay,
        })
    }

    /// Native initialization
    async fn init_native(
        window: Arc<winit::window::Window>,
    ) -> BackendResult<(
        wgpu::Instance,
        wgpu::Surface<'static>,
        wgpu::Adapter,
        wgpu::Device,
        wgpu::Queue,
    )> {
        let backends = wgpu::util::backend_bits_from_env().unwrap_or_else(wgpu::Backends::all);

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                BackendError::InitializationFailed("No suitable adapter found".into())
            })?;

        let adapter_info = adapter.get_info();
        if adapter_info.device_type == wgpu::DeviceType::Cpu {
            return Err(BackendError::InitializationFailed(format!(
                "{} is a software adapter",
                adapter_info.name
            )));
        }
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Demo Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        Ok((instance, surface, adapter, device, queue))
    }

    fn require_frame(&self, op: &'static str) -> BackendResult<()> {
        if self.encoder.is_some() {
            Ok(())
        } else {
            Err(BackendError::NotInFrame(op))
        }
    }

    fn color_target(&self, color: ColorTarget) -> BackendResult<(wgpu::TextureFormat, u32, u32)> {
        match color {
            ColorTarget::Backbuffer => Ok((
                self.surface_config.format,
                self.surface_config.width,
                self.surface_config.height,
            )),
            ColorTarget::Offscreen(h) => self
                .render_targets
                .get(&h.0)
                .map(|t| (t.format, t.width, t.height))
                .ok_or(BackendError::InvalidHandle {
                    kind: "render target",
                    id: h.0,
                }),
        }
    }

    fn depth_target(&self, depth: DepthTarget) -> BackendResult<Option<&GpuDepthSurface>> {
        match depth {
            DepthTarget::Backbuffer => Ok(Some(&self.backbuffer_depth)),
            DepthTarget::Offscreen(h) => self
                .depth_surfaces
                .get(&h.0)
                .map(Some)
                .ok_or(BackendError::InvalidHandle {
                    kind: "depth surface",
                    id: h.0,
                }),
            DepthTarget::None => Ok(None),
        }
    }

    fn validate_binding(&self, binding: TargetBinding) -> BackendResult<()> {
        let (_, width, height) = self.color_target(binding.color)?;
        if let Some(depth) = self.depth_target(binding.depth)? {
            if depth.width != width || depth.height != height {
                return Err(BackendError::TargetBindFailed(format!(
                    "depth {}x{} does not match color {}x{}",
                    depth.width, depth.height, width, height
                )));
            }
        }
        Ok(())
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> BackendResult<()> {
        if self.render_pipelines.contains_key(&key) {
            return Ok(());
        }

        let program = self.programs.get(&key.program).ok_or(BackendError::InvalidHandle {
            kind: "program",
            id: key.program,
        })?;
        let pass = program.passes.get(key.pass as usize).ok_or_else(|| {
            BackendError::PipelineCreationFailed(format!(
                "pass {} of {}",
                key.pass,
                program.passes.len()
            ))
        })?;

        let layout = Vertex::layout();
        let attributes: Vec<wgpu::VertexAttribute> = layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: Self::convert_vertex_format(a.format),
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();
        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: layout.array_stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];

        let color_targets = [Some(wgpu::ColorTargetState {
            format: key.color_format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let depth_stencil = key.depth.then(|| wgpu::DepthStencilState {
            format: BACKBUFFER_DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(pass.vertex_entry.as_str()),
                layout: Some(&program.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.module,
                    entry_point: &pass.vertex_entry,
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.module,
                    entry_point: &pass.fragment_entry,
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        self.render_pipelines.insert(key, pipeline);
        Ok(())
    }

    fn ensure_texture_bind_group(
        &mut self,
        program_id: u64,
        textures: &[(u32, TextureRef)],
    ) -> BackendResult<Option<TextureBindingKey>> {
        let program = self.programs.get(&program_id).ok_or(BackendError::InvalidHandle {
            kind: "program",
            id: program_id,
        })?;
        let Some(layout) = program.texture_layout.as_ref() else {
            return Ok(None);
        };

        let key = TextureBindingKey {
            program: program_id,
            textures: textures.to_vec(),
        };
        if self.texture_bind_groups.contains_key(&key) {
            return Ok(Some(key));
        }

        let mut entries = Vec::with_capacity(program.slots.len() * 2);
        for slot in &program.slots {
            let texture = textures
                .iter()
                .find(|(binding, _)| *binding == slot.binding)
                .map(|(_, t)| *t)
                .ok_or_else(|| {
                    BackendError::PipelineCreationFailed(format!(
                        "no texture bound for slot {}",
                        slot.name
                    ))
                })?;

            let (view, dimension, sampler) = match texture {
                TextureRef::Texture(h) => {
                    let tex = self.textures.get(&h.0).ok_or(BackendError::InvalidHandle {
                        kind: "texture",
                        id: h.0,
                    })?;
                    (&tex.view, tex.dimension, &self.repeat_sampler)
                }
                TextureRef::Target(h) => {
                    let target =
                        self.render_targets
                            .get(&h.0)
                            .ok_or(BackendError::InvalidHandle {
                                kind: "render target",
                                id: h.0,
                            })?;
                    (&target.view, TextureDimension::D2, &self.clamp_sampler)
                }
            };

            let expected = match slot.kind {
                SlotKind::FilteredCube => TextureDimension::Cube,
                SlotKind::Filtered | SlotKind::Unfiltered => TextureDimension::D2,
            };
            if dimension != expected {
                return Err(BackendError::PipelineCreationFailed(format!(
                    "slot {} expects a {:?} texture",
                    slot.name, expected
                )));
            }

            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            if slot.kind != SlotKind::Unfiltered {
                entries.push(wgpu::BindGroupEntry {
                    binding: slot.binding + 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                });
            }
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout,
            entries: &entries,
        });

        self.texture_bind_groups.insert(key.clone(), bind_group);
        Ok(Some(key))
    }

    /// Replay the pending pass into the frame encoder
    fn flush_pending_pass(&mut self) {
        let Some(pending) = self.pending_render_pass.take() else {
            return;
        };

        let Some(mut encoder) = self.encoder.take() else {
            return;
        };

        {
            let color_view = match pending.binding.color {
                ColorTarget::Backbuffer => self.current_view.as_ref(),
                ColorTarget::Offscreen(h) => self.render_targets.get(&h.0).map(|t| &t.view),
            };
            let depth_view = match pending.binding.depth {
                DepthTarget::Backbuffer => Some(&self.backbuffer_depth.view),
                DepthTarget::Offscreen(h) => self.depth_surfaces.get(&h.0).map(|d| &d.view),
                DepthTarget::None => None,
            };

            if let Some(color_view) = color_view {
                let (color_load, depth_load) = match pending.clear {
                    Some((color, depth)) => (
                        wgpu::LoadOp::Clear(Self::convert_color(color)),
                        wgpu::LoadOp::Clear(depth),
                    ),
                    None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
                };

                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Effect Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: color_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: color_load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: depth_view.map(|view| {
                        wgpu::RenderPassDepthStencilAttachment {
                            view,
                            depth_ops: Some(wgpu::Operations {
                                load: depth_load,
                                store: wgpu::StoreOp::Store,
                            }),
                            stencil_ops: None,
                        }
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                for draw in &pending.draws {
                    let (Some(pipeline), Some(mesh)) = (
                        self.render_pipelines.get(&draw.pipeline),
                        self.meshes.get(&draw.mesh),
                    ) else {
                        continue;
                    };
                    render_pass.set_pipeline(pipeline);
                    render_pass.set_bind_group(0, &self.uniform_bind_group, &[draw.uniform_offset]);
                    if let Some(bind_group) = draw
                        .textures
                        .as_ref()
                        .and_then(|key| self.texture_bind_groups.get(key))
                    {
                        render_pass.set_bind_group(1, bind_group, &[]);
                    }
                    render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    render_pass
                        .set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }
        }

        self.encoder = Some(encoder);
    }

    fn pending_for_current_binding(&mut self) -> &mut PendingRenderPass {
        let binding = self.binding;
        if self
            .pending_render_pass
            .as_ref()
            .is_some_and(|p| p.binding != binding)
        {
            self.flush_pending_pass();
        }
        self.pending_render_pass.get_or_insert_with(|| PendingRenderPass {
            binding,
            clear: None,
            draws: Vec::new(),
        })
    }

    fn invalidate_bind_groups(&mut self) {
        self.texture_bind_groups.clear();
    }
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            let (width, height) = self.clamp_to_limits(width, height);
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.device, &self.surface_config);
            self.backbuffer_depth =
                Self::create_depth_texture(&self.device, "Backbuffer Depth", width, height);
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        if self.encoder.is_some() {
            return Err(BackendError::FrameInProgress);
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return Err(BackendError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(BackendError::OutOfMemory),
            Err(e) => return Err(BackendError::AcquireImageFailed(e.to_string())),
        };

        self.current_view = Some(
            output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        );
        self.current_texture = Some(output);
        self.encoder = Some(
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                }),
        );
        self.binding = TargetBinding::BACKBUFFER;
        self.uniform_staging.clear();
        self.draws_this_frame = 0;
        self.overlay_text = None;

        Ok(())
    }

    fn clear(&mut self, color: [f32; 4], depth: f32) -> BackendResult<()> {
        self.require_frame("clear")?;
        let pending = self.pending_for_current_binding();
        if !pending.draws.is_empty() {
            self.flush_pending_pass();
        }
        self.pending_for_current_binding().clear = Some((color, depth));
        Ok(())
    }

    fn render_target(&self) -> TargetBinding {
        self.binding
    }

    fn set_render_target(&mut self, binding: TargetBinding) -> BackendResult<()> {
        self.require_frame("set_render_target")?;
        self.validate_binding(binding)?;
        if binding != self.binding {
            self.flush_pending_pass();
            self.binding = binding;
        }
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) -> BackendResult<()> {
        self.require_frame("draw")?;
        if self.draws_this_frame >= MAX_DRAWS_PER_FRAME {
            return Err(BackendError::FrameCapacityExceeded(MAX_DRAWS_PER_FRAME));
        }
        if !self.meshes.contains_key(&call.mesh.0) {
            return Err(BackendError::InvalidHandle {
                kind: "mesh",
                id: call.mesh.0,
            });
        }

        let (color_format, _, _) = self.color_target(self.binding.color)?;
        let key = PipelineKey {
            program: call.program.0,
            pass: call.pass,
            color_format,
            depth: self.binding.depth != DepthTarget::None,
        };
        self.ensure_pipeline(key)?;
        let textures = self.ensure_texture_bind_group(call.program.0, &call.textures)?;

        let uniform_offset = self.draws_this_frame * self.uniform_stride;
        self.uniform_staging
            .resize(uniform_offset as usize, 0);
        self.uniform_staging
            .extend_from_slice(bytemuck::bytes_of(&call.uniforms));
        self.draws_this_frame += 1;

        self.pending_for_current_binding().draws.push(RecordedDraw {
            pipeline: key,
            textures,
            mesh: call.mesh.0,
            uniform_offset,
        });
        Ok(())
    }

    fn draw_text(&mut self, overlay: &TextOverlay) -> BackendResult<()> {
        self.require_frame("draw_text")?;
        self.overlay_text = Some(overlay.clone());
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.require_frame("end_frame")?;
        self.flush_pending_pass();

        let Some(mut encoder) = self.encoder.take() else {
            return Err(BackendError::NotInFrame("end_frame"));
        };

        if let (Some(text), Some(view)) = (self.overlay_text.take(), self.current_view.as_ref()) {
            let size = (self.surface_config.width, self.surface_config.height);
            self.overlay
                .render(&self.device, &self.queue, &mut encoder, view, size, &text);
        }

        if !self.uniform_staging.is_empty() {
            self.queue
                .write_buffer(&self.uniform_buffer, 0, &self.uniform_staging);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.binding = TargetBinding::BACKBUFFER;
        Ok(())
    }

    fn present(&mut self) -> BackendResult<()> {
        self.current_view = None;
        if let Some(texture) = self.current_texture.take() {
            texture.present();
        }
        Ok(())
    }

    fn create_mesh(&mut self, mesh: &MeshDescriptor) -> BackendResult<MeshHandle> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(BackendError::BufferCreationFailed(format!(
                "mesh {} has no geometry",
                mesh.label
            )));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(mesh.label),
                contents: bytemuck::cast_slice(mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(mesh.label),
                contents: bytemuck::cast_slice(mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        if let Some(error) = self.pop_validation() {
            return Err(BackendError::BufferCreationFailed(format!(
                "{}: {}",
                mesh.label, error
            )));
        }

        let id = self.allocate_id();
        self.meshes.insert(
            id,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
            },
        );
        Ok(MeshHandle(id))
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: &[u8],
    ) -> BackendResult<TextureHandle> {
        if data.len() != desc.byte_size() {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: expected {} bytes, got {}",
                desc.label,
                desc.byte_size(),
                data.len()
            )));
        }

        let label = desc.label.as_deref().unwrap_or("texture");
        self.check_extent(label, desc.width, desc.height)?;

        let layers = desc.dimension.layers();
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: layers,
        };
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::convert_texture_format(desc.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(desc.width * desc.format.bytes_per_pixel()),
                rows_per_image: Some(desc.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(match desc.dimension {
                TextureDimension::D2 => wgpu::TextureViewDimension::D2,
                TextureDimension::Cube => wgpu::TextureViewDimension::Cube,
            }),
            ..Default::default()
        });
        if let Some(error) = self.pop_validation() {
            return Err(BackendError::TextureCreationFailed(format!("{label}: {error}")));
        }

        let id = self.allocate_id();
        self.textures.insert(
            id,
            GpuTexture {
                texture,
                view,
                dimension: desc.dimension,
            },
        );
        Ok(TextureHandle(id))
    }

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> BackendResult<RenderTargetHandle> {
        if desc.format.is_depth() {
            return Err(BackendError::TextureCreationFailed(
                "depth format used as color target".into(),
            ));
        }
        let label = desc.label.as_deref().unwrap_or("render target");
        self.check_extent(label, desc.width, desc.height)?;

        let format = Self::convert_texture_format(desc.format);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        if let Some(error) = self.pop_validation() {
            return Err(BackendError::TextureCreationFailed(format!("{label}: {error}")));
        }

        let id = self.allocate_id();
        self.render_targets.insert(
            id,
            GpuRenderTarget {
                texture,
                view,
                format,
                width: desc.width,
                height: desc.height,
            },
        );
        Ok(RenderTargetHandle(id))
    }

    fn create_depth_surface(
        &mut self,
        width: u32,
        height: u32,
    ) -> BackendResult<DepthSurfaceHandle> {
        self.check_extent("Offscreen Depth", width, height)?;
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let surface = Self::create_depth_texture(&self.device, "Offscreen Depth", width, height);
        if let Some(error) = self.pop_validation() {
            return Err(BackendError::TextureCreationFailed(format!(
                "Offscreen Depth: {error}"
            )));
        }
        let id = self.allocate_id();
        self.depth_surfaces.insert(id, surface);
        Ok(DepthSurfaceHandle(id))
    }

    fn create_program(&mut self, desc: &ProgramDescriptor) -> BackendResult<ProgramHandle> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label.as_str()),
                source: wgpu::ShaderSource::Wgsl(desc.source.as_str().into()),
            });

        let texture_layout = (!desc.texture_slots.is_empty()).then(|| {
            let mut entries = Vec::with_capacity(desc.texture_slots.len() * 2);
            for slot in &desc.texture_slots {
                let (filterable, view_dimension) = match slot.kind {
                    SlotKind::Filtered => (true, wgpu::TextureViewDimension::D2),
                    SlotKind::Unfiltered => (false, wgpu::TextureViewDimension::D2),
                    SlotKind::FilteredCube => (true, wgpu::TextureViewDimension::Cube),
                };
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding: slot.binding,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable },
                        view_dimension,
                        multisampled: false,
                    },
                    count: None,
                });
                if filterable {
                    entries.push(wgpu::BindGroupLayoutEntry {
                        binding: slot.binding + 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    });
                }
            }
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(desc.label.as_str()),
                    entries: &entries,
                })
        });

        let mut layouts = vec![&self.uniform_layout];
        layouts.extend(texture_layout.as_ref());
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label.as_str()),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        if let Some(error) = self.pop_validation() {
            return Err(BackendError::ShaderCreationFailed(format!(
                "{}: {}",
                desc.label, error
            )));
        }

        let id = self.allocate_id();
        self.programs.insert(
            id,
            GpuProgram {
                module,
                passes: desc.passes.clone(),
                slots: desc.texture_slots.clone(),
                texture_layout,
                pipeline_layout,
            },
        );
        Ok(ProgramHandle(id))
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture.0).is_some() {
            self.invalidate_bind_groups();
        }
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) {
        if self.render_targets.remove(&target.0).is_some() {
            self.invalidate_bind_groups();
        }
    }

    fn destroy_depth_surface(&mut self, depth: DepthSurfaceHandle) {
        self.depth_surfaces.remove(&depth.0);
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program.0).is_some() {
            self.render_pipelines.retain(|key, _| key.program != program.0);
            self.texture_bind_groups.retain(|key, _| key.program != program.0);
        }
    }
}

/// Clamp to device limits while maintaining aspect ratio
fn clamp_extent(max_size: u32, width: u32, height: u32) -> (u32, u32) {
    if width > max_size || height > max_size {
        let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).max(1);
        let new_height = ((height as f32 * scale) as u32).max(1);
        (new_width, new_height)
    } else {
        (width.max(1), height.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::clamp_extent;

    #[test]
    fn clamp_keeps_small_sizes() {
        assert_eq!(clamp_extent(8192, 800, 600), (800, 600));
        assert_eq!(clamp_extent(8192, 0, 0), (1, 1));
    }

    #[test]
    fn clamp_preserves_aspect() {
        assert_eq!(clamp_extent(2048, 4096, 2048), (2048, 1024));
    }
}
