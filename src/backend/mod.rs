//! Backend abstraction layer
//!
//! Provides the device trait, the shared types, the wgpu implementation and a
//! GPU-less recording implementation.

pub mod recording;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use recording::{Command, CommandLog, RecordingBackend};
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;
