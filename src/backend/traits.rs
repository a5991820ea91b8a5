//! Core backend abstraction traits
//!
//! The frame pipeline only talks to the device through [`GraphicsBackend`], so the
//! same passes drive the wgpu backend and the recording backend used in tests.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to acquire next image: {0}")]
    AcquireImageFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Failed to create shader: {0}")]
    ShaderCreationFailed(String),
    #[error("Failed to bind render target: {0}")]
    TargetBindFailed(String),
    #[error("Unknown {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u64 },
    #[error("{0} called outside of a frame")]
    NotInFrame(&'static str),
    #[error("Frame already in progress")]
    FrameInProgress,
    #[error("Per-frame draw capacity of {0} exceeded")]
    FrameCapacityExceeded(u32),
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// `max_texture_dimension_2d` of wgpu's default limits
pub const DEFAULT_MAX_TEXTURE_DIMENSION: u32 = 8192;

/// Reject a texture extent the device cannot allocate.
pub fn check_texture_extent(max_size: u32, label: &str, width: u32, height: u32) -> BackendResult<()> {
    if width == 0 || height == 0 || width > max_size || height > max_size {
        return Err(BackendError::TextureCreationFailed(format!(
            "{label}: {width}x{height} is outside 1..={max_size}"
        )));
    }
    Ok(())
}

/// Handle to GPU geometry (vertex + index buffer pair)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) u64);

/// Handle to a sampled texture (2D or cube)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to an offscreen color target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetHandle(pub(crate) u64);

/// Handle to an offscreen depth surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthSurfaceHandle(pub(crate) u64);

/// Handle to a compiled effect program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// Color half of a target binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorTarget {
    Backbuffer,
    Offscreen(RenderTargetHandle),
}

/// Depth half of a target binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthTarget {
    Backbuffer,
    Offscreen(DepthSurfaceHandle),
    None,
}

/// The color/depth pair draws currently land in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetBinding {
    pub color: ColorTarget,
    pub depth: DepthTarget,
}

impl TargetBinding {
    pub const BACKBUFFER: Self = Self {
        color: ColorTarget::Backbuffer,
        depth: DepthTarget::Backbuffer,
    };

    pub fn offscreen(color: RenderTargetHandle, depth: Option<DepthSurfaceHandle>) -> Self {
        Self {
            color: ColorTarget::Offscreen(color),
            depth: depth.map_or(DepthTarget::None, DepthTarget::Offscreen),
        }
    }
}

impl Default for TargetBinding {
    fn default() -> Self {
        Self::BACKBUFFER
    }
}

/// A texture a shader slot can sample from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureRef {
    Texture(TextureHandle),
    Target(RenderTargetHandle),
}

/// Main graphics backend trait
///
/// Object safe: passes receive `&mut dyn GraphicsBackend`.
pub trait GraphicsBackend {
    /// Human readable backend name
    fn name(&self) -> &'static str;

    /// Resize the swapchain and the backbuffer depth surface
    fn resize(&mut self, width: u32, height: u32);

    /// Get the actual surface size (may be clamped by device limits)
    fn surface_size(&self) -> (u32, u32);

    // Frame

    /// Acquire the next backbuffer image and start recording
    fn begin_frame(&mut self) -> BackendResult<()>;

    /// Clear the currently bound color and depth targets
    fn clear(&mut self, color: [f32; 4], depth: f32) -> BackendResult<()>;

    /// The binding draws currently land in
    fn render_target(&self) -> TargetBinding;

    /// Rebind color and depth; fails without changing the binding
    fn set_render_target(&mut self, binding: TargetBinding) -> BackendResult<()>;

    /// Record one draw against the current binding
    fn draw(&mut self, call: &DrawCall) -> BackendResult<()>;

    /// Queue the debug text block for this frame
    fn draw_text(&mut self, overlay: &TextOverlay) -> BackendResult<()>;

    /// Flush and submit recorded work
    fn end_frame(&mut self) -> BackendResult<()>;

    /// Present the submitted frame
    fn present(&mut self) -> BackendResult<()>;

    // Resource creation

    fn create_mesh(&mut self, mesh: &MeshDescriptor) -> BackendResult<MeshHandle>;

    fn create_texture(&mut self, desc: &TextureDescriptor, data: &[u8])
        -> BackendResult<TextureHandle>;

    fn create_render_target(&mut self, desc: &RenderTargetDescriptor)
        -> BackendResult<RenderTargetHandle>;

    fn create_depth_surface(&mut self, width: u32, height: u32)
        -> BackendResult<DepthSurfaceHandle>;

    fn create_program(&mut self, desc: &ProgramDescriptor) -> BackendResult<ProgramHandle>;

    // Resource cleanup

    fn destroy_mesh(&mut self, mesh: MeshHandle);

    fn destroy_texture(&mut self, texture: TextureHandle);

    fn destroy_render_target(&mut self, target: RenderTargetHandle);

    fn destroy_depth_surface(&mut self, depth: DepthSurfaceHandle);

    fn destroy_program(&mut self, program: ProgramHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offscreen_binding_without_depth() {
        let binding = TargetBinding::offscreen(RenderTargetHandle(3), None);
        assert_eq!(binding.color, ColorTarget::Offscreen(RenderTargetHandle(3)));
        assert_eq!(binding.depth, DepthTarget::None);
        assert_ne!(binding, TargetBinding::BACKBUFFER);
    }

    #[test]
    fn extent_within_limits() {
        assert!(check_texture_extent(8192, "earth", 2048, 1024).is_ok());
        assert!(check_texture_extent(8192, "earth", 8192, 8192).is_ok());
    }

    #[test]
    fn extent_outside_limits() {
        assert!(matches!(
            check_texture_extent(8192, "earth", 16384, 16384),
            Err(BackendError::TextureCreationFailed(_))
        ));
        assert!(check_texture_extent(8192, "shadow", 8192, 8193).is_err());
        assert!(check_texture_extent(8192, "empty", 0, 64).is_err());
    }

    #[test]
    fn default_binding_is_backbuffer() {
        assert_eq!(TargetBinding::default(), TargetBinding::BACKBUFFER);
    }
}
