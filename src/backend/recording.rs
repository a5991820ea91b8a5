//! Recording backend for tests and headless dry runs.
//!
//! This backend doesn't touch a GPU. It validates handles and target bindings
//! the same way the wgpu backend does and appends every call to a shared
//! [`CommandLog`] that outlives the backend itself.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::traits::*;
use crate::backend::types::*;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Resize { width: u32, height: u32 },
    CreateMesh { handle: MeshHandle, label: String, vertices: usize, indices: usize },
    CreateTexture { handle: TextureHandle, label: Option<String>, dimension: TextureDimension },
    CreateRenderTarget { handle: RenderTargetHandle, width: u32, height: u32, format: TextureFormat },
    CreateDepthSurface { handle: DepthSurfaceHandle, width: u32, height: u32 },
    CreateProgram { handle: ProgramHandle, label: String, passes: usize },
    DestroyMesh(MeshHandle),
    DestroyTexture(TextureHandle),
    DestroyRenderTarget(RenderTargetHandle),
    DestroyDepthSurface(DepthSurfaceHandle),
    DestroyProgram(ProgramHandle),
    /// Destroy of a handle that is not live: never created, or already destroyed
    DestroyUnknown(String),
    BeginFrame,
    Clear { binding: TargetBinding, color: [f32; 4], depth: f32 },
    SetRenderTarget(TargetBinding),
    SetRenderTargetFailed(TargetBinding),
    Draw { binding: TargetBinding, call: DrawCall },
    DrawText(TextOverlay),
    EndFrame,
    Present,
}

impl Command {
    pub fn is_destroy(&self) -> bool {
        matches!(
            self,
            Command::DestroyMesh(_)
                | Command::DestroyTexture(_)
                | Command::DestroyRenderTarget(_)
                | Command::DestroyDepthSurface(_)
                | Command::DestroyProgram(_)
        )
    }

    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Command::CreateMesh { .. }
                | Command::CreateTexture { .. }
                | Command::CreateRenderTarget { .. }
                | Command::CreateDepthSurface { .. }
                | Command::CreateProgram { .. }
        )
    }
}

/// Shared view of everything a [`RecordingBackend`] was asked to do
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Rc<RefCell<Vec<Command>>>);

impl CommandLog {
    fn push(&self, command: Command) {
        self.0.borrow_mut().push(command);
    }

    /// Copy of all recorded commands in call order
    pub fn commands(&self) -> Vec<Command> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Draws with the binding active when each was issued
    pub fn draws(&self) -> Vec<(TargetBinding, DrawCall)> {
        self.0
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Command::Draw { binding, call } => Some((*binding, call.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Command) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| predicate(c)).count()
    }

    /// Handles released twice or never acquired
    pub fn unknown_destroys(&self) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Command::DestroyUnknown(handle) => Some(handle.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Extent {
    width: u32,
    height: u32,
}

/// GPU-less backend that records calls into a [`CommandLog`]
#[derive(Debug)]
pub struct RecordingBackend {
    log: CommandLog,
    size: (u32, u32),
    next_id: u64,

    meshes: HashMap<u64, String>,
    textures: HashMap<u64, TextureDimension>,
    render_targets: HashMap<u64, Extent>,
    depth_surfaces: HashMap<u64, Extent>,
    programs: HashMap<u64, usize>,

    in_frame: bool,
    binding: TargetBinding,

    fail_offscreen_binds: bool,
    fail_acquire: bool,
    failing_programs: Vec<String>,
    max_texture_size: u32,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            log: CommandLog::default(),
            size: (width, height),
            next_id: 1,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            render_targets: HashMap::new(),
            depth_surfaces: HashMap::new(),
            programs: HashMap::new(),
            in_frame: false,
            binding: TargetBinding::BACKBUFFER,
            fail_offscreen_binds: false,
            fail_acquire: false,
            failing_programs: Vec::new(),
            max_texture_size: DEFAULT_MAX_TEXTURE_DIMENSION,
        }
    }

    /// Handle to the log; stays readable after the backend is dropped
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Make every bind of an offscreen color target fail
    pub fn set_fail_offscreen_binds(&mut self, fail: bool) {
        self.fail_offscreen_binds = fail;
    }

    /// Make `begin_frame` fail as if the surface were lost
    pub fn set_fail_acquire(&mut self, fail: bool) {
        self.fail_acquire = fail;
    }

    /// Make `create_program` fail for the given label
    pub fn fail_program(&mut self, label: &str) {
        self.failing_programs.push(label.to_string());
    }

    /// Largest texture width or height the backend accepts
    pub fn set_max_texture_size(&mut self, size: u32) {
        self.max_texture_size = size;
    }

    /// Number of live resources of every kind
    pub fn live_resources(&self) -> usize {
        self.meshes.len()
            + self.textures.len()
            + self.render_targets.len()
            + self.depth_surfaces.len()
            + self.programs.len()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record_destroy(&self, live: bool, command: Command) {
        if live {
            self.log.push(command);
        } else {
            log::warn!("RecordingBackend: {:?} of a handle that is not live", command);
            self.log.push(Command::DestroyUnknown(format!("{:?}", command)));
        }
    }

    fn require_frame(&self, op: &'static str) -> BackendResult<()> {
        if self.in_frame {
            Ok(())
        } else {
            Err(BackendError::NotInFrame(op))
        }
    }

    fn color_extent(&self, color: ColorTarget) -> BackendResult<Extent> {
        match color {
            ColorTarget::Backbuffer => Ok(Extent {
                width: self.size.0,
                height: self.size.1,
            }),
            ColorTarget::Offscreen(h) => {
                self.render_targets
                    .get(&h.0)
                    .copied()
                    .ok_or(BackendError::InvalidHandle {
                        kind: "render target",
                        id: h.0,
                    })
            }
        }
    }

    fn validate_binding(&self, binding: TargetBinding) -> BackendResult<()> {
        let color = self.color_extent(binding.color)?;
        let depth = match binding.depth {
            DepthTarget::Backbuffer => Some(Extent {
                width: self.size.0,
                height: self.size.1,
            }),
            DepthTarget::Offscreen(h) => Some(self.depth_surfaces.get(&h.0).copied().ok_or(
                BackendError::InvalidHandle {
                    kind: "depth surface",
                    id: h.0,
                },
            )?),
            DepthTarget::None => None,
        };
        if let Some(depth) = depth {
            if depth.width != color.width || depth.height != color.height {
                return Err(BackendError::TargetBindFailed(format!(
                    "depth {}x{} does not match color {}x{}",
                    depth.width, depth.height, color.width, color.height
                )));
            }
        }
        Ok(())
    }
}

impl GraphicsBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "Recording Backend"
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.size = (width, height);
            self.log.push(Command::Resize { width, height });
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        if self.in_frame {
            return Err(BackendError::FrameInProgress);
        }
        if self.fail_acquire {
            return Err(BackendError::SurfaceLost);
        }
        self.in_frame = true;
        self.binding = TargetBinding::BACKBUFFER;
        self.log.push(Command::BeginFrame);
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4], depth: f32) -> BackendResult<()> {
        self.require_frame("clear")?;
        self.log.push(Command::Clear {
            binding: self.binding,
            color,
            depth,
        });
        Ok(())
    }

    fn render_target(&self) -> TargetBinding {
        self.binding
    }

    fn set_render_target(&mut self, binding: TargetBinding) -> BackendResult<()> {
        let result = self.require_frame("set_render_target").and_then(|()| {
            if self.fail_offscreen_binds && matches!(binding.color, ColorTarget::Offscreen(_)) {
                return Err(BackendError::TargetBindFailed("injected failure".into()));
            }
            self.validate_binding(binding)
        });

        match result {
            Ok(()) => {
                log::trace!("RecordingBackend: binding {:?}", binding);
                self.binding = binding;
                self.log.push(Command::SetRenderTarget(binding));
                Ok(())
            }
            Err(e) => {
                self.log.push(Command::SetRenderTargetFailed(binding));
                Err(e)
            }
        }
    }

    fn draw(&mut self, call: &DrawCall) -> BackendResult<()> {
        self.require_frame("draw")?;
        if !self.meshes.contains_key(&call.mesh.0) {
            return Err(BackendError::InvalidHandle {
                kind: "mesh",
                id: call.mesh.0,
            });
        }
        let passes = self
            .programs
            .get(&call.program.0)
            .copied()
            .ok_or(BackendError::InvalidHandle {
                kind: "program",
                id: call.program.0,
            })?;
        if call.pass as usize >= passes {
            return Err(BackendError::PipelineCreationFailed(format!(
                "pass {} of {}",
                call.pass, passes
            )));
        }
        for (_, texture) in &call.textures {
            match texture {
                TextureRef::Texture(h) if !self.textures.contains_key(&h.0) => {
                    return Err(BackendError::InvalidHandle {
                        kind: "texture",
                        id: h.0,
                    })
                }
                TextureRef::Target(h) if !self.render_targets.contains_key(&h.0) => {
                    return Err(BackendError::InvalidHandle {
                        kind: "render target",
                        id: h.0,
                    })
                }
                _ => {}
            }
        }
        self.log.push(Command::Draw {
            binding: self.binding,
            call: call.clone(),
        });
        Ok(())
    }

    fn draw_text(&mut self, overlay: &TextOverlay) -> BackendResult<()> {
        self.require_frame("draw_text")?;
        self.log.push(Command::DrawText(overlay.clone()));
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.require_frame("end_frame")?;
        self.in_frame = false;
        self.log.push(Command::EndFrame);
        Ok(())
    }

    fn present(&mut self) -> BackendResult<()> {
        self.log.push(Command::Present);
        Ok(())
    }

    fn create_mesh(&mut self, mesh: &MeshDescriptor) -> BackendResult<MeshHandle> {
        log::trace!(
            "RecordingBackend: creating mesh {} ({} vertices)",
            mesh.label,
            mesh.vertices.len()
        );
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(BackendError::BufferCreationFailed(format!(
                "mesh {} has no geometry",
                mesh.label
            )));
        }
        let handle = MeshHandle(self.allocate_id());
        self.meshes.insert(handle.0, mesh.label.to_string());
        self.log.push(Command::CreateMesh {
            handle,
            label: mesh.label.to_string(),
            vertices: mesh.vertices.len(),
            indices: mesh.indices.len(),
        });
        Ok(handle)
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: &[u8],
    ) -> BackendResult<TextureHandle> {
        log::trace!(
            "RecordingBackend: creating texture {:?} ({}x{})",
            desc.label,
            desc.width,
            desc.height
        );
        if data.len() != desc.byte_size() {
            return Err(BackendError::TextureCreationFailed(format!(
                "expected {} bytes, got {}",
                desc.byte_size(),
                data.len()
            )));
        }
        check_texture_extent(
            self.max_texture_size,
            desc.label.as_deref().unwrap_or("texture"),
            desc.width,
            desc.height,
        )?;
        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(handle.0, desc.dimension);
        self.log.push(Command::CreateTexture {
            handle,
            label: desc.label.clone(),
            dimension: desc.dimension,
        });
        Ok(handle)
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
        check_texture_extent(
            self.max_texture_size,
            desc.label.as_deref().unwrap_or("render target"),
            desc.width,
            desc.height,
        )?;
        let handle = RenderTargetHandle(self.allocate_id());
        self.render_targets.insert(
            handle.0,
            Extent {
                width: desc.width,
                height: desc.height,
            },
        );
        self.log.push(Command::CreateRenderTarget {
            handle,
            width: desc.width,
            height: desc.height,
            format: desc.format,
        });
        Ok(handle)
    }

    fn create_depth_surface(
        &mut self,
        width: u32,
        height: u32,
    ) -> BackendResult<DepthSurfaceHandle> {
        check_texture_extent(self.max_texture_size, "depth surface", width, height)?;
        let handle = DepthSurfaceHandle(self.allocate_id());
        self.depth_surfaces.insert(handle.0, Extent { width, height });
        self.log.push(Command::CreateDepthSurface {
            handle,
            width,
            height,
        });
        Ok(handle)
    }

    fn create_program(&mut self, desc: &ProgramDescriptor) -> BackendResult<ProgramHandle> {
        if self.failing_programs.iter().any(|l| *l == desc.label) {
            return Err(BackendError::ShaderCreationFailed(format!(
                "{}: injected failure",
                desc.label
            )));
        }
        let handle = ProgramHandle(self.allocate_id());
        self.programs.insert(handle.0, desc.passes.len());
        self.log.push(Command::CreateProgram {
            handle,
            label: desc.label.clone(),
            passes: desc.passes.len(),
        });
        Ok(handle)
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        let live = self.meshes.remove(&mesh.0).is_some();
        self.record_destroy(live, Command::DestroyMesh(mesh));
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        let live = self.textures.remove(&texture.0).is_some();
        self.record_destroy(live, Command::DestroyTexture(texture));
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) {
        let live = self.render_targets.remove(&target.0).is_some();
        self.record_destroy(live, Command::DestroyRenderTarget(target));
    }

    fn destroy_depth_surface(&mut self, depth: DepthSurfaceHandle) {
        let live = self.depth_surfaces.remove(&depth.0).is_some();
        self.record_destroy(live, Command::DestroyDepthSurface(depth));
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        let live = self.programs.remove(&program.0).is_some();
        self.record_destroy(live, Command::DestroyProgram(program));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offscreen(backend: &mut RecordingBackend, w: u32, h: u32) -> TargetBinding {
        let color = backend
            .create_render_target(&RenderTargetDescriptor {
                label: None,
                width: w,
                height: h,
                format: TextureFormat::R32Float,
            })
            .unwrap();
        let depth = backend.create_depth_surface(w, h).unwrap();
        TargetBinding::offscreen(color, Some(depth))
    }

    #[test]
    fn binding_requires_frame() {
        let mut backend = RecordingBackend::new(800, 600);
        let binding = offscreen(&mut backend, 64, 64);
        assert!(matches!(
            backend.set_render_target(binding),
            Err(BackendError::NotInFrame(_))
        ));
        assert_eq!(backend.render_target(), TargetBinding::BACKBUFFER);
    }

    #[test]
    fn mismatched_depth_is_rejected() {
        let mut backend = RecordingBackend::new(800, 600);
        let color = offscreen(&mut backend, 64, 64).color;
        let small_depth = backend.create_depth_surface(32, 32).unwrap();
        backend.begin_frame().unwrap();

        let result = backend.set_render_target(TargetBinding {
            color,
            depth: DepthTarget::Offscreen(small_depth),
        });

        assert!(matches!(result, Err(BackendError::TargetBindFailed(_))));
        assert_eq!(backend.render_target(), TargetBinding::BACKBUFFER);
    }

    #[test]
    fn log_survives_backend() {
        let log = {
            let mut backend = RecordingBackend::new(8, 8);
            backend.begin_frame().unwrap();
            backend.end_frame().unwrap();
            backend.log()
        };
        assert_eq!(log.commands(), vec![Command::BeginFrame, Command::EndFrame]);
    }

    #[test]
    fn second_destroy_is_flagged() {
        let mut backend = RecordingBackend::new(8, 8);
        let depth = backend.create_depth_surface(8, 8).unwrap();
        backend.destroy_depth_surface(depth);
        assert!(backend.log().unknown_destroys().is_empty());

        backend.destroy_depth_surface(depth);
        assert_eq!(backend.log().count(Command::is_destroy), 1);
        assert_eq!(backend.log().unknown_destroys().len(), 1);
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn destroy_of_foreign_handle_is_flagged() {
        let mut backend = RecordingBackend::new(8, 8);
        backend.destroy_program(ProgramHandle(42));
        assert_eq!(backend.log().count(Command::is_destroy), 0);
        assert_eq!(
            backend.log().unknown_destroys(),
            vec!["DestroyProgram(ProgramHandle(42))".to_string()]
        );
    }

    #[test]
    fn oversized_textures_are_rejected() {
        let mut backend = RecordingBackend::new(8, 8);
        backend.set_max_texture_size(1024);
        assert!(matches!(
            backend.create_depth_surface(2048, 2048),
            Err(BackendError::TextureCreationFailed(_))
        ));
        assert!(backend
            .create_render_target(&RenderTargetDescriptor {
                label: None,
                width: 1024,
                height: 1024,
                format: TextureFormat::R32Float,
            })
            .is_ok());
        assert_eq!(backend.live_resources(), 1);
    }
}
