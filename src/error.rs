//! Error types.
//!
//! Two tiers: [`StartupError`] is fatal and aborts the demo before the loop
//! starts, [`FrameError`] skips a pass or a frame and is logged.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;

/// Which kind of asset a load was for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Mesh,
    Texture,
    CubeTexture,
    Effect,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mesh => write!(f, "mesh"),
            Self::Texture => write!(f, "texture"),
            Self::CubeTexture => write!(f, "cube texture"),
            Self::Effect => write!(f, "effect"),
        }
    }
}

/// Failure reading or decoding an asset file
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("failed to load OBJ {}: {source}", path.display())]
    Obj {
        path: PathBuf,
        source: tobj::LoadError,
    },
    #[error("{} contains no geometry", path.display())]
    EmptyMesh { path: PathBuf },
    #[error("unknown builtin mesh '{0}'")]
    UnknownBuiltin(String),
    #[error("cube map {name}: {reason}")]
    CubeMap { name: String, reason: String },
    /// Compiler diagnostics, verbatim
    #[error("{0}")]
    Shader(String),
    #[error("invalid effect interface: {0}")]
    Reflection(String),
    #[error("asset not found: {0}")]
    NotFound(String),
}

/// Misuse of an [`Effect`](crate::resources::Effect) parameter bag
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    #[error("unknown effect parameter '{0}'")]
    UnknownParameter(String),
    #[error("effect '{effect}' has no texture slot '{slot}'")]
    UnknownTextureSlot { effect: String, slot: String },
    #[error("effect '{effect}' has no texture bound to slot '{slot}'")]
    MissingTexture { effect: String, slot: String },
    #[error("effect '{effect}' has {count} passes, pass {pass} requested")]
    InvalidPass {
        effect: String,
        pass: usize,
        count: usize,
    },
    #[error("effect '{0}' drawn outside of a pass")]
    NoActivePass(String),
}

/// Fatal error before the first frame
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("failed to create window: {0}")]
    Window(String),
    #[error("graphics device unavailable: {0}")]
    Device(#[source] BackendError),
    #[error("failed to load {kind} '{name}': {source}")]
    Asset {
        kind: AssetKind,
        name: String,
        source: AssetError,
    },
    #[error("failed to create {what}: {source}")]
    Resource {
        what: String,
        source: BackendError,
    },
    #[error("invalid pipeline: {0}")]
    Pipeline(String),
}

/// Recoverable error inside a frame
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("device already released")]
    DeviceReleased,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("pass '{pass}' skipped: {source}")]
    Pass {
        pass: String,
        source: BackendError,
    },
    #[error("pass '{pass}' skipped: {source}")]
    Effect {
        pass: String,
        source: EffectError,
    },
    #[error("failed to reconfigure targets: {0}")]
    Reconfigure(String),
}

/// Top-level error returned by [`run`](crate::run)
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StartupError::Asset {
            kind: AssetKind::Texture,
            name: "textures/earth.png".into(),
            source: AssetError::NotFound("textures/earth.png".into()),
        };
        assert_eq!(
            err.to_string(),
            "failed to load texture 'textures/earth.png': asset not found: textures/earth.png"
        );

        let err = EffectError::InvalidPass {
            effect: "post_sepia.wgsl".into(),
            pass: 2,
            count: 1,
        };
        assert_eq!(
            err.to_string(),
            "effect 'post_sepia.wgsl' has 1 passes, pass 2 requested"
        );
    }

    #[test]
    fn shader_errors_are_verbatim() {
        let text = "error: expected ';'\n  ┌─ shader.wgsl:3:5";
        assert_eq!(AssetError::Shader(text.into()).to_string(), text);
    }
}
