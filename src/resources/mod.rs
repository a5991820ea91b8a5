//! Resource management
//!
//! Loading of meshes, textures and effects, and the per-demo asset set.

mod assets;
mod effect;
mod loader;
mod mesh;
pub mod shader;
mod texture;

pub use assets::*;
pub use effect::*;
pub use loader::*;
pub use mesh::*;
pub use texture::*;
