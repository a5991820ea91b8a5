//! Texture loading

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};

use crate::backend::types::*;
use crate::error::AssetError;

/// Cube face file stems in upload order
pub const CUBE_FACES: [&str; 6] = ["px", "nx", "py", "ny", "pz", "nz"];

/// Decoded texture pixels, one or six layers of RGBA8
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub dimension: TextureDimension,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Load texture from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = open_image(path)?;
        Ok(Self::from_image(img, &name))
    }

    /// Load texture from encoded bytes
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes).map_err(|source| AssetError::Image {
            path: PathBuf::from(name),
            source,
        })?;
        Ok(Self::from_image(img, name))
    }

    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();

        Self {
            width,
            height,
            format: TextureFormat::Rgba8UnormSrgb,
            dimension: TextureDimension::D2,
            data: img.to_rgba8().into_raw(),
            name: name.to_string(),
        }
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            dimension: TextureDimension::D2,
            data: color.to_vec(),
            name: name.to_string(),
        }
    }

    /// Solid color cube map, one texel per face
    pub fn solid_cube(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            dimension: TextureDimension::Cube,
            data: color.repeat(6),
            name: name.to_string(),
        }
    }

    /// Load a cube map from a directory holding `px`, `nx`, `py`, `ny`, `pz`
    /// and `nz` images, with any extension the image crate decodes
    pub fn cube_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, AssetError> {
        let dir = dir.as_ref();
        let name = dir.display().to_string();

        let entries = std::fs::read_dir(dir).map_err(|source| AssetError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();

        let mut faces = Vec::with_capacity(6);
        for face in CUBE_FACES {
            let path = files
                .iter()
                .find(|path| path.file_stem().and_then(|s| s.to_str()) == Some(face))
                .ok_or_else(|| AssetError::CubeMap {
                    name: name.clone(),
                    reason: format!("missing face '{face}'"),
                })?;
            faces.push(Self::from_image(open_image(path)?, face));
        }

        Self::cube_from_faces(&name, faces)
    }

    /// Stack six decoded faces into one cube texture
    pub fn cube_from_faces(name: &str, faces: Vec<TextureData>) -> Result<Self, AssetError> {
        let cube_error = |reason: String| AssetError::CubeMap {
            name: name.to_string(),
            reason,
        };

        if faces.len() != 6 {
            return Err(cube_error(format!("expected 6 faces, got {}", faces.len())));
        }
        let size = faces[0].width;
        for face in &faces {
            if face.width != face.height {
                return Err(cube_error(format!(
                    "face '{}' is {}x{}, faces must be square",
                    face.name, face.width, face.height
                )));
            }
            if face.width != size {
                return Err(cube_error(format!(
                    "face '{}' is {} pixels wide, expected {size}",
                    face.name, face.width
                )));
            }
        }

        let data = faces.into_iter().flat_map(|face| face.data).collect();

        Ok(Self {
            width: size,
            height: size,
            format: TextureFormat::Rgba8UnormSrgb,
            dimension: TextureDimension::Cube,
            data,
            name: name.to_string(),
        })
    }

    pub fn descriptor(&self) -> TextureDescriptor {
        TextureDescriptor {
            label: Some(self.name.clone()),
            width: self.width,
            height: self.height,
            format: self.format,
            dimension: self.dimension,
        }
    }
}

fn open_image(path: &Path) -> Result<DynamicImage, AssetError> {
    if !path.exists() {
        return Err(AssetError::NotFound(path.display().to_string()));
    }
    image::open(path).map_err(|source| AssetError::Image {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(name: &str, width: u32, height: u32) -> TextureData {
        TextureData {
            width,
            height,
            format: TextureFormat::Rgba8UnormSrgb,
            dimension: TextureDimension::D2,
            data: vec![0; (width * height * 4) as usize],
            name: name.to_string(),
        }
    }

    #[test]
    fn cube_stacks_faces_in_order() {
        let faces = CUBE_FACES.iter().map(|f| face(f, 2, 2)).collect();
        let cube = TextureData::cube_from_faces("sky", faces).unwrap();
        assert_eq!(cube.dimension, TextureDimension::Cube);
        assert_eq!(cube.data.len(), cube.descriptor().byte_size());
    }

    #[test]
    fn cube_rejects_mismatched_faces() {
        let mut faces: Vec<_> = CUBE_FACES.iter().map(|f| face(f, 4, 4)).collect();
        faces[3] = face("ny", 2, 2);
        let err = TextureData::cube_from_faces("sky", faces).unwrap_err();
        assert!(err.to_string().contains("'ny'"), "{err}");

        let faces = vec![face("px", 4, 2)];
        assert!(TextureData::cube_from_faces("sky", faces).is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = TextureData::from_file("does/not/exist.png").unwrap_err();
        assert!(matches!(err, AssetError::NotFound(_)));
    }

    #[test]
    fn solid_cube_has_six_texels() {
        let cube = TextureData::solid_cube([1, 2, 3, 4], "c");
        assert_eq!(cube.data.len(), 24);
        assert_eq!(cube.descriptor().byte_size(), 24);
    }
}
