//! Offscreen render targets created at startup and reused every frame

use crate::backend::traits::*;
use crate::backend::types::{RenderTargetDescriptor, TextureFormat};
use crate::error::StartupError;

/// How a render target is sized
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureSize {
    /// Absolute size in pixels
    Absolute { width: u32, height: u32 },
    /// Relative to screen size (1.0 = full screen)
    Relative { width_scale: f32, height_scale: f32 },
}

impl Default for TextureSize {
    fn default() -> Self {
        TextureSize::Relative {
            width_scale: 1.0,
            height_scale: 1.0,
        }
    }
}

impl TextureSize {
    pub fn resolve(&self, screen_width: u32, screen_height: u32) -> (u32, u32) {
        match self {
            TextureSize::Absolute { width, height } => (*width, *height),
            TextureSize::Relative {
                width_scale,
                height_scale,
            } => (
                (((screen_width as f32) * width_scale) as u32).max(1),
                (((screen_height as f32) * height_scale) as u32).max(1),
            ),
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, TextureSize::Relative { .. })
    }
}

/// Named color target, optionally paired with a depth surface of equal size
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDescriptor {
    pub name: String,
    pub size: TextureSize,
    pub format: TextureFormat,
    pub depth: bool,
}

#[derive(Debug)]
struct Target {
    desc: TargetDescriptor,
    color: RenderTargetHandle,
    depth: Option<DepthSurfaceHandle>,
}

/// All offscreen targets of a demo
#[derive(Debug, Default)]
pub struct TargetSet {
    targets: Vec<Target>,
}

impl TargetSet {
    /// Create every target at the current surface size. On failure the
    /// targets created so far are destroyed again.
    pub fn create(
        backend: &mut dyn GraphicsBackend,
        descriptors: &[TargetDescriptor],
    ) -> Result<Self, StartupError> {
        let mut set = TargetSet::default();
        let (width, height) = backend.surface_size();

        for desc in descriptors {
            match create_target(backend, desc, width, height) {
                Ok(target) => set.targets.push(target),
                Err(e) => {
                    set.release(backend);
                    return Err(StartupError::Resource {
                        what: format!("render target '{}'", desc.name),
                        source: e,
                    });
                }
            }
        }

        Ok(set)
    }

    fn find(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.desc.name == name)
    }

    /// Binding that draws into the named target and its depth surface
    pub fn binding(&self, name: &str) -> Option<TargetBinding> {
        self.find(name)
            .map(|t| TargetBinding::offscreen(t.color, t.depth))
    }

    /// The named target as a shader input
    pub fn texture(&self, name: &str) -> Option<TextureRef> {
        self.find(name).map(|t| TextureRef::Target(t.color))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Recreate screen-relative targets at the new size.
    ///
    /// Returns the names of the recreated targets; handles change, so
    /// anything holding resolved bindings must resolve them again.
    pub fn resize(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
    ) -> BackendResult<Vec<String>> {
        let mut recreated = Vec::new();
        for target in &mut self.targets {
            if !target.desc.size.is_relative() {
                continue;
            }
            let replacement = create_target(backend, &target.desc, width, height)?;
            destroy_target(backend, target);
            *target = replacement;
            recreated.push(target.desc.name.clone());
        }
        Ok(recreated)
    }

    /// Destroy every target. Safe to call repeatedly.
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for target in self.targets.drain(..) {
            destroy_target(backend, &target);
        }
    }
}

fn create_target(
    backend: &mut dyn GraphicsBackend,
    desc: &TargetDescriptor,
    screen_width: u32,
    screen_height: u32,
) -> BackendResult<Target> {
    let (width, height) = desc.size.resolve(screen_width, screen_height);
    log::debug!(
        "Creating render target '{}' {}x{} {:?}",
        desc.name,
        width,
        height,
        desc.format
    );

    let color = backend.create_render_target(&RenderTargetDescriptor {
        label: Some(desc.name.clone()),
        width,
        height,
        format: desc.format,
    })?;

    let depth = if desc.depth {
        match backend.create_depth_surface(width, height) {
            Ok(depth) => Some(depth),
            Err(e) => {
                backend.destroy_render_target(color);
                return Err(e);
            }
        }
    } else {
        None
    };

    Ok(Target {
        desc: desc.clone(),
        color,
        depth,
    })
}

fn destroy_target(backend: &mut dyn GraphicsBackend, target: &Target) {
    if let Some(depth) = target.depth {
        backend.destroy_depth_surface(depth);
    }
    backend.destroy_render_target(target.color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;

    fn shadow_map() -> TargetDescriptor {
        TargetDescriptor {
            name: "shadow_map".into(),
            size: TextureSize::Absolute {
                width: 2048,
                height: 2048,
            },
            format: TextureFormat::R32Float,
            depth: true,
        }
    }

    fn scene_color() -> TargetDescriptor {
        TargetDescriptor {
            name: "scene_color".into(),
            size: TextureSize::default(),
            format: TextureFormat::Rgba16Float,
            depth: true,
        }
    }

    #[test]
    fn test_texture_size_resolve() {
        assert_eq!(TextureSize::default().resolve(800, 600), (800, 600));
        assert_eq!(
            TextureSize::Relative {
                width_scale: 0.5,
                height_scale: 0.5
            }
            .resolve(800, 600),
            (400, 300)
        );
        assert_eq!(shadow_map().size.resolve(800, 600), (2048, 2048));
        assert_eq!(TextureSize::default().resolve(0, 0), (1, 1));
    }

    #[test]
    fn create_and_release() {
        let mut backend = RecordingBackend::new(800, 600);
        let mut targets = TargetSet::create(&mut backend, &[shadow_map(), scene_color()]).unwrap();
        assert_eq!(backend.live_resources(), 4);
        assert!(targets.binding("shadow_map").is_some());
        assert!(targets.texture("scene_color").is_some());
        assert!(targets.binding("missing").is_none());
        assert!(targets.contains("shadow_map"));
        assert!(!targets.contains("missing"));

        targets.release(&mut backend);
        targets.release(&mut backend);
        assert_eq!(backend.live_resources(), 0);
        assert!(targets.is_empty());
        assert!(backend.log().unknown_destroys().is_empty());
    }

    #[test]
    fn resize_recreates_only_relative_targets() {
        let mut backend = RecordingBackend::new(800, 600);
        let mut targets = TargetSet::create(&mut backend, &[shadow_map(), scene_color()]).unwrap();
        let shadow = targets.binding("shadow_map");

        let recreated = targets.resize(&mut backend, 1024, 768).unwrap();
        assert_eq!(recreated, vec!["scene_color".to_string()]);
        assert_eq!(targets.binding("shadow_map"), shadow);
        assert_eq!(backend.live_resources(), 4);
    }
}
