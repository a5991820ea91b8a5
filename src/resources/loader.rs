//! Asset file access

use std::path::{Path, PathBuf};

use crate::error::AssetError;
use crate::resources::mesh::{MeshData, BUILTIN_PREFIX};
use crate::resources::texture::TextureData;

/// Source of decoded asset data, addressed by name
pub trait AssetLoader {
    fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError>;
    fn load_texture(&self, name: &str) -> Result<TextureData, AssetError>;
    fn load_cube_texture(&self, name: &str) -> Result<TextureData, AssetError>;
    /// WGSL source text
    fn load_shader(&self, name: &str) -> Result<String, AssetError>;
}

/// Loads assets from files under a root directory
#[derive(Debug, Clone)]
pub struct FileAssetLoader {
    root: PathBuf,
}

impl FileAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, AssetError> {
        let path = self.root.join(name);
        if path.exists() {
            Ok(path)
        } else {
            Err(AssetError::NotFound(path.display().to_string()))
        }
    }
}

impl Default for FileAssetLoader {
    fn default() -> Self {
        Self::new("assets")
    }
}

impl AssetLoader for FileAssetLoader {
    fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError> {
        if let Some(builtin) = name.strip_prefix(BUILTIN_PREFIX) {
            return MeshData::builtin(builtin);
        }
        MeshData::from_obj(&self.resolve(name)?)
    }

    fn load_texture(&self, name: &str) -> Result<TextureData, AssetError> {
        TextureData::from_file(self.resolve(name)?)
    }

    fn load_cube_texture(&self, name: &str) -> Result<TextureData, AssetError> {
        TextureData::cube_from_dir(self.resolve(name)?)
    }

    fn load_shader(&self, name: &str) -> Result<String, AssetError> {
        let path = self.resolve(name)?;
        std::fs::read_to_string(&path).map_err(|source| AssetError::Io { path, source })
    }
}
