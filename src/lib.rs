//! Shader demos - three classic effect demos on one frame pipeline
//!
//! - **Textured sphere**: a rotating, texture-mapped sphere
//! - **Shadow mapping**: a rotating torus casting a shadow onto a disc
//! - **Environment mapping**: a reflective teapot rendered offscreen, then
//!   composited through a post effect selected with keys 1, 2 and 3
//!
//! Each demo is a [`DemoDescriptor`](demos::DemoDescriptor): a list of passes
//! over shared effects, meshes and offscreen targets. [`DemoApp`] owns the
//! device and runs those passes once per idle tick.
//!
//! # Features
//! - wgpu backend plus a GPU-less recording backend for tests
//! - WGSL effects with reflected texture slots and committed parameters
//! - Scoped render target binding restored on every exit path

pub mod app;
pub mod backend;
pub mod demos;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod window;

use std::path::PathBuf;

pub use app::DemoApp;
pub use backend::{GraphicsBackend, RecordingBackend, WgpuBackend};
pub use demos::{DemoDescriptor, DemoKind};
pub use error::{AppError, FrameError, StartupError};
pub use scene::AnimationMode;
pub use window::run;

/// Compiled-in demo settings
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Window title; the demo name when `None`
    pub title: Option<String>,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Enable vsync
    pub vsync: bool,
    /// Backbuffer clear color
    pub clear_color: [f32; 4],
    /// Rotation per tick in degrees
    pub rotation_step: f64,
    /// Edge length of the square shadow map
    pub shadow_map_size: u32,
    /// Directory asset names are resolved against
    pub asset_root: PathBuf,
    pub animation: AnimationMode,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: None,
            width: 800,
            height: 600,
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 1.0,
            far: 10000.0,
            vsync: true,
            clear_color: [0.0, 0.0, 1.0, 1.0],
            rotation_step: 0.4,
            shadow_map_size: 2048,
            asset_root: PathBuf::from("assets"),
            animation: AnimationMode::PerTick,
        }
    }
}
