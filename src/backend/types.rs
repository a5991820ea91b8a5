//! Common types shared between backends

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::backend::traits::{MeshHandle, ProgramHandle, TextureRef};

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    R32Float,
    Depth32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::R32Float
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

/// Shape of a sampled texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    /// Six square faces in +X, -X, +Y, -Y, +Z, -Z order
    Cube,
}

impl TextureDimension {
    pub fn layers(&self) -> u32 {
        match self {
            TextureDimension::D2 => 1,
            TextureDimension::Cube => 6,
        }
    }
}

/// Texture descriptor
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub dimension: TextureDimension,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            dimension: TextureDimension::D2,
        }
    }
}

impl TextureDescriptor {
    /// Bytes expected for the full upload of every layer
    pub fn byte_size(&self) -> usize {
        (self.width * self.height * self.format.bytes_per_pixel() * self.dimension.layers())
            as usize
    }
}

/// Offscreen color target descriptor; always bindable as a shader input
#[derive(Debug, Clone)]
pub struct RenderTargetDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Geometry upload
#[derive(Debug, Clone, Copy)]
pub struct MeshDescriptor<'a> {
    pub label: &'a str,
    pub vertices: &'a [Vertex],
    pub indices: &'a [u32],
}

/// How a shader reads a texture slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// 2D texture with a sampler at `binding + 1`
    Filtered,
    /// 2D float texture read with `textureLoad`, no sampler
    Unfiltered,
    /// Cube texture with a sampler at `binding + 1`
    FilteredCube,
}

/// A texture slot in bind group 1 of an effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSlot {
    pub name: String,
    pub binding: u32,
    pub kind: SlotKind,
}

/// Vertex/fragment entry point pair forming one effect pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramPass {
    pub vertex_entry: String,
    pub fragment_entry: String,
}

/// A validated, reflected shader program
#[derive(Debug, Clone)]
pub struct ProgramDescriptor {
    pub label: String,
    pub source: String,
    pub passes: Vec<ProgramPass>,
    pub texture_slots: Vec<TextureSlot>,
}

/// One draw of one mesh with one effect pass
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub pass: u32,
    pub mesh: MeshHandle,
    pub uniforms: EffectUniforms,
    /// `(binding, texture)` for every slot of the program
    pub textures: Vec<(u32, TextureRef)>,
}

/// Debug text block
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub text: String,
    pub position: [f32; 2],
    pub size: f32,
    pub color: [f32; 4],
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

/// Vertex attribute description
#[derive(Debug, Clone)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

/// Vertex buffer layout
#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

/// Standard vertex with position, normal, UV, and tangent
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec4,
}

impl Vertex {
    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: VertexFormat::Float32x3,
                    offset: 0,
                },
                VertexAttribute {
                    location: 1,
                    format: VertexFormat::Float32x3,
                    offset: 12,
                },
                VertexAttribute {
                    location: 2,
                    format: VertexFormat::Float32x2,
                    offset: 24,
                },
                VertexAttribute {
                    location: 3,
                    format: VertexFormat::Float32x4,
                    offset: 32,
                },
            ],
        }
    }
}

/// Uniform block shared by every effect, bound at group 0 binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct EffectUniforms {
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub light_view: Mat4,
    pub light_projection: Mat4,
    pub world_light_position: Vec4,
    pub world_camera_position: Vec4,
    pub object_color: Vec4,
    pub light_color: Vec4,
}

impl Default for EffectUniforms {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            light_view: Mat4::IDENTITY,
            light_projection: Mat4::IDENTITY,
            world_light_position: Vec4::ZERO,
            world_camera_position: Vec4::ZERO,
            object_color: Vec4::ONE,
            light_color: Vec4::ONE,
        }
    }
}
