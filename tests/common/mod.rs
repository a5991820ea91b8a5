//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::collections::HashSet;

use shader_demos::backend::{Command, CommandLog, RecordingBackend};
use shader_demos::error::AssetError;
use shader_demos::resources::{AssetLoader, FileAssetLoader, MeshData, TextureData};
use shader_demos::{DemoApp, DemoConfig, DemoKind};

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 600;

/// Serves the shipped shaders and generated stand-ins for binary assets.
///
/// Textures are solid colors and file meshes are replaced by the builtin
/// sphere. Names added with [`MemoryAssetLoader::missing`] fail to load.
pub struct MemoryAssetLoader {
    shaders: FileAssetLoader,
    missing: HashSet<String>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self {
            shaders: FileAssetLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets")),
            missing: HashSet::new(),
        }
    }

    pub fn missing(mut self, name: &str) -> Self {
        self.missing.insert(name.to_string());
        self
    }

    fn check(&self, name: &str) -> Result<(), AssetError> {
        if self.missing.contains(name) {
            Err(AssetError::NotFound(name.to_string()))
        } else {
            Ok(())
        }
    }
}

impl AssetLoader for MemoryAssetLoader {
    fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError> {
        self.check(name)?;
        match name.strip_prefix("builtin:") {
            Some(builtin) => MeshData::builtin(builtin),
            None => MeshData::builtin("sphere"),
        }
    }

    fn load_texture(&self, name: &str) -> Result<TextureData, AssetError> {
        self.check(name)?;
        Ok(TextureData::solid_color([40, 90, 200, 255], name))
    }

    fn load_cube_texture(&self, name: &str) -> Result<TextureData, AssetError> {
        self.check(name)?;
        Ok(TextureData::solid_cube([200, 200, 255, 255], name))
    }

    fn load_shader(&self, name: &str) -> Result<String, AssetError> {
        self.check(name)?;
        self.shaders.load_shader(name)
    }
}

pub fn start(kind: DemoKind) -> DemoApp<RecordingBackend> {
    start_with(kind, RecordingBackend::new(WIDTH, HEIGHT))
}

pub fn start_with(kind: DemoKind, backend: RecordingBackend) -> DemoApp<RecordingBackend> {
    DemoApp::startup(backend, kind, &MemoryAssetLoader::new(), &DemoConfig::default())
        .expect("demo should start with all assets available")
}

/// Every created handle was destroyed exactly once and nothing else was.
pub fn assert_released_exactly_once(log: &CommandLog) {
    assert_eq!(log.unknown_destroys(), Vec::<String>::new());
    assert_eq!(log.count(Command::is_destroy), log.count(Command::is_create));
}
