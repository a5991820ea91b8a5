//! The set of named GPU assets a demo loads at startup

use crate::backend::traits::*;
use crate::error::{AssetError, AssetKind, StartupError};
use crate::resources::effect::Effect;
use crate::resources::loader::AssetLoader;
use crate::resources::mesh::MeshData;

/// Everything a demo needs loaded before its first frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetManifest {
    pub textures: Vec<String>,
    pub cube_textures: Vec<String>,
    pub effects: Vec<String>,
    pub meshes: Vec<String>,
}

/// Index of a loaded effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(pub(crate) usize);

/// Loaded meshes, textures and effects, each created exactly once
#[derive(Debug, Default)]
pub struct AssetSet {
    meshes: Vec<(String, MeshHandle)>,
    textures: Vec<(String, TextureHandle)>,
    effects: Vec<Effect>,
    fullscreen_quad: Option<MeshHandle>,
}

impl AssetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every manifest entry: textures, cube textures, effects, then
    /// meshes. Stops at the first failure.
    pub fn load_manifest(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        loader: &dyn AssetLoader,
        manifest: &AssetManifest,
    ) -> Result<(), StartupError> {
        for name in &manifest.textures {
            self.load_texture(backend, loader, name)?;
        }
        for name in &manifest.cube_textures {
            self.load_cube_texture(backend, loader, name)?;
        }
        for name in &manifest.effects {
            self.load_effect(backend, loader, name)?;
        }
        for name in &manifest.meshes {
            self.load_mesh(backend, loader, name)?;
        }

        log::info!(
            "Loaded {} texture(s), {} effect(s), {} mesh(es)",
            self.textures.len(),
            self.effects.len(),
            self.meshes.len()
        );
        Ok(())
    }

    pub fn load_mesh(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        loader: &dyn AssetLoader,
        name: &str,
    ) -> Result<MeshHandle, StartupError> {
        if let Some(handle) = self.mesh(name) {
            return Ok(handle);
        }
        let data = loader.load_mesh(name).map_err(|source| StartupError::Asset {
            kind: AssetKind::Mesh,
            name: name.to_string(),
            source,
        })?;
        let handle = create_mesh(backend, &data, name)?;
        log::debug!("Mesh '{}': {} triangles", name, data.triangle_count());
        self.meshes.push((name.to_string(), handle));
        Ok(handle)
    }

    pub fn load_texture(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        loader: &dyn AssetLoader,
        name: &str,
    ) -> Result<TextureHandle, StartupError> {
        self.load_texture_kind(backend, loader, name, AssetKind::Texture)
    }

    pub fn load_cube_texture(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        loader: &dyn AssetLoader,
        name: &str,
    ) -> Result<TextureHandle, StartupError> {
        self.load_texture_kind(backend, loader, name, AssetKind::CubeTexture)
    }

    fn load_texture_kind(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        loader: &dyn AssetLoader,
        name: &str,
        kind: AssetKind,
    ) -> Result<TextureHandle, StartupError> {
        if let Some(handle) = self.texture(name) {
            return Ok(handle);
        }
        let data = match kind {
            AssetKind::CubeTexture => loader.load_cube_texture(name),
            _ => loader.load_texture(name),
        }
        .map_err(|source| StartupError::Asset {
            kind,
            name: name.to_string(),
            source,
        })?;

        let handle = backend
            .create_texture(&data.descriptor(), &data.data)
            .map_err(|source| StartupError::Resource {
                what: format!("{kind} '{name}'"),
                source,
            })?;
        self.textures.push((name.to_string(), handle));
        Ok(handle)
    }

    pub fn load_effect(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        loader: &dyn AssetLoader,
        name: &str,
    ) -> Result<&Effect, StartupError> {
        let id = match self.effect_id(name) {
            Some(id) => id,
            None => {
                let asset_error = |source: AssetError| StartupError::Asset {
                    kind: AssetKind::Effect,
                    name: name.to_string(),
                    source,
                };
                let source = loader.load_shader(name).map_err(asset_error)?;
                let desc = Effect::compile(name, &source).map_err(asset_error)?;
                let program =
                    backend
                        .create_program(&desc)
                        .map_err(|source| StartupError::Resource {
                            what: format!("effect '{name}'"),
                            source,
                        })?;
                self.effects.push(Effect::new(name, program, &desc));
                EffectId(self.effects.len() - 1)
            }
        };
        Ok(&self.effects[id.0])
    }

    /// Create the clip-space quad used by fullscreen passes
    pub fn load_fullscreen_quad(
        &mut self,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<MeshHandle, StartupError> {
        if let Some(handle) = self.fullscreen_quad {
            return Ok(handle);
        }
        let handle = create_mesh(backend, &MeshData::fullscreen_quad(), "fullscreen quad")?;
        self.fullscreen_quad = Some(handle);
        Ok(handle)
    }

    pub fn mesh(&self, name: &str) -> Option<MeshHandle> {
        lookup(&self.meshes, name)
    }

    pub fn texture(&self, name: &str) -> Option<TextureHandle> {
        lookup(&self.textures, name)
    }

    pub fn effect_id(&self, name: &str) -> Option<EffectId> {
        self.effects
            .iter()
            .position(|effect| effect.name() == name)
            .map(EffectId)
    }

    pub fn effect(&self, id: EffectId) -> Option<&Effect> {
        self.effects.get(id.0)
    }

    pub fn effect_mut(&mut self, id: EffectId) -> Option<&mut Effect> {
        self.effects.get_mut(id.0)
    }

    pub fn fullscreen_quad(&self) -> Option<MeshHandle> {
        self.fullscreen_quad
    }

    /// Number of live GPU objects held
    pub fn len(&self) -> usize {
        self.meshes.len()
            + self.textures.len()
            + self.effects.len()
            + usize::from(self.fullscreen_quad.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy meshes, then effects, then textures. Safe to call repeatedly.
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if self.is_empty() {
            return;
        }
        log::debug!("Releasing {} asset(s)", self.len());

        for (_, mesh) in self.meshes.drain(..) {
            backend.destroy_mesh(mesh);
        }
        if let Some(quad) = self.fullscreen_quad.take() {
            backend.destroy_mesh(quad);
        }
        for effect in self.effects.drain(..) {
            backend.destroy_program(effect.program());
        }
        for (_, texture) in self.textures.drain(..) {
            backend.destroy_texture(texture);
        }
    }
}

fn lookup<H: Copy>(entries: &[(String, H)], name: &str) -> Option<H> {
    entries
        .iter()
        .find(|(entry, _)| entry == name)
        .map(|(_, handle)| *handle)
}

fn create_mesh(
    backend: &mut dyn GraphicsBackend,
    data: &MeshData,
    name: &str,
) -> Result<MeshHandle, StartupError> {
    backend
        .create_mesh(&data.descriptor())
        .map_err(|source| StartupError::Resource {
            what: format!("mesh '{name}'"),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, RecordingBackend};
    use crate::resources::texture::TextureData;

    struct BuiltinOnly;

    impl AssetLoader for BuiltinOnly {
        fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError> {
            MeshData::builtin(name.trim_start_matches("builtin:"))
        }
        fn load_texture(&self, name: &str) -> Result<TextureData, AssetError> {
            Ok(TextureData::solid_color([255; 4], name))
        }
        fn load_cube_texture(&self, name: &str) -> Result<TextureData, AssetError> {
            Ok(TextureData::solid_cube([255; 4], name))
        }
        fn load_shader(&self, name: &str) -> Result<String, AssetError> {
            Err(AssetError::NotFound(name.to_string()))
        }
    }

    #[test]
    fn loading_twice_returns_same_handle() {
        let mut backend = RecordingBackend::new(8, 8);
        let mut assets = AssetSet::new();
        let a = assets
            .load_texture(&mut backend, &BuiltinOnly, "earth.png")
            .unwrap();
        let b = assets
            .load_texture(&mut backend, &BuiltinOnly, "earth.png")
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(backend.live_resources(), 1);
    }

    #[test]
    fn release_is_idempotent_and_ordered() {
        let mut backend = RecordingBackend::new(8, 8);
        let log = backend.log();
        let mut assets = AssetSet::new();
        let manifest = AssetManifest {
            textures: vec!["earth.png".into()],
            meshes: vec!["builtin:sphere".into()],
            ..Default::default()
        };
        assets
            .load_manifest(&mut backend, &BuiltinOnly, &manifest)
            .unwrap();
        assets.load_fullscreen_quad(&mut backend).unwrap();
        assert_eq!(assets.len(), 3);

        assets.release(&mut backend);
        assets.release(&mut backend);
        assert_eq!(backend.live_resources(), 0);
        assert!(log.unknown_destroys().is_empty());

        let destroys: Vec<_> = log
            .commands()
            .into_iter()
            .filter(Command::is_destroy)
            .collect();
        assert_eq!(destroys.len(), 3);
        assert!(matches!(destroys[2], Command::DestroyTexture(_)));
    }

    #[test]
    fn shader_failure_names_the_effect() {
        let mut backend = RecordingBackend::new(8, 8);
        let mut assets = AssetSet::new();
        let err = assets
            .load_effect(&mut backend, &BuiltinOnly, "shaders/missing.wgsl")
            .unwrap_err();
        assert!(matches!(
            err,
            StartupError::Asset {
                kind: AssetKind::Effect,
                ..
            }
        ));
        assert!(assets.is_empty());
    }
}
