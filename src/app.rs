//! Demo lifecycle: startup, per-frame driver and teardown

use crate::backend::traits::GraphicsBackend;
use crate::demos::{DemoDescriptor, DemoKind};
use crate::error::{FrameError, StartupError};
use crate::input::InputAction;
use crate::pipeline::{FrameParameters, FramePipeline, FrameStats, TargetSet};
use crate::resources::{AssetLoader, AssetSet};
use crate::scene::SceneState;
use crate::DemoConfig;

/// A running demo: owns the device and everything created on it
pub struct DemoApp<B: GraphicsBackend> {
    backend: Option<B>,
    descriptor: DemoDescriptor,
    assets: AssetSet,
    targets: TargetSet,
    pipeline: FramePipeline,
    scene: SceneState,
    clear_color: [f32; 4],
}

impl<B: GraphicsBackend> DemoApp<B> {
    /// Load every asset and target and compile the passes.
    ///
    /// All or nothing: on failure everything acquired so far is released,
    /// the backend is dropped and the error is logged once.
    pub fn startup(
        mut backend: B,
        kind: DemoKind,
        loader: &dyn AssetLoader,
        config: &DemoConfig,
    ) -> Result<Self, StartupError> {
        let descriptor = kind.descriptor(config);
        log::info!("Starting {} on {}", descriptor.title, backend.name());

        let mut assets = AssetSet::new();
        let mut targets = TargetSet::default();

        match load(&mut backend, loader, &descriptor, &mut assets, &mut targets) {
            Ok(pipeline) => Ok(Self {
                backend: Some(backend),
                descriptor,
                assets,
                targets,
                pipeline,
                scene: SceneState::new(config.rotation_step, config.animation),
                clear_color: config.clear_color,
            }),
            Err(e) => {
                log::error!("Startup failed: {}", e);
                targets.release(&mut backend);
                assets.release(&mut backend);
                Err(e)
            }
        }
    }

    /// Render one frame: tick, begin, clear, passes, overlay, end, present
    pub fn frame(&mut self) -> Result<FrameStats, FrameError> {
        let backend = self.backend.as_mut().ok_or(FrameError::DeviceReleased)?;

        self.scene.tick();
        backend.begin_frame()?;

        let params = FrameParameters::new(
            &self.descriptor.camera,
            &self.descriptor.light,
            &self.scene,
            backend.surface_size(),
        );

        // end_frame runs even when the body fails, so the next begin_frame works
        let rendered = match backend.clear(self.clear_color, 1.0) {
            Ok(()) => {
                let stats = self.pipeline.execute(
                    &mut *backend,
                    &mut self.assets,
                    &params,
                    self.scene.post_effect(),
                );
                backend.draw_text(&self.descriptor.overlay).map(|()| stats)
            }
            Err(e) => Err(e),
        };
        let ended = backend.end_frame();

        let stats = rendered?;
        ended?;
        backend.present()?;

        log::trace!(
            "Frame {}: {} pass(es), {} skipped, {} draw(s)",
            self.scene.ticks(),
            stats.passes_executed,
            stats.passes_skipped,
            stats.draw_calls
        );
        Ok(stats)
    }

    /// Apply a key action. Returns `false` once the demo should exit.
    pub fn handle_action(&mut self, action: InputAction) -> bool {
        match action {
            InputAction::Quit => {
                self.shutdown();
                false
            }
            InputAction::SelectPostEffect(index) => {
                let available = self.descriptor.post_effect_count();
                if self.scene.select_post_effect(index, available) {
                    log::info!("Post effect {} selected", index);
                }
                true
            }
        }
    }

    /// Resize the surface and any screen-sized targets
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), FrameError> {
        let backend = self.backend.as_mut().ok_or(FrameError::DeviceReleased)?;
        if width == 0 || height == 0 {
            return Ok(());
        }
        backend.resize(width, height);

        let recreated = self
            .targets
            .resize(backend, width, height)
            .map_err(|e| FrameError::Reconfigure(e.to_string()))?;
        if !recreated.is_empty() {
            self.pipeline =
                FramePipeline::compile(&self.descriptor.passes, &self.assets, &self.targets)
                    .map_err(|e| FrameError::Reconfigure(e.to_string()))?;
        }
        Ok(())
    }

    /// Release every resource, then hand back the device. Later calls
    /// release nothing and return `None`.
    pub fn shutdown(&mut self) -> Option<B> {
        let mut backend = self.backend.take()?;
        self.assets.release(&mut backend);
        self.targets.release(&mut backend);
        log::info!("{} shut down", self.descriptor.title);
        Some(backend)
    }

    pub fn is_running(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn descriptor(&self) -> &DemoDescriptor {
        &self.descriptor
    }

    pub fn assets(&self) -> &AssetSet {
        &self.assets
    }
}

impl<B: GraphicsBackend> Drop for DemoApp<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn load(
    backend: &mut dyn GraphicsBackend,
    loader: &dyn AssetLoader,
    descriptor: &DemoDescriptor,
    assets: &mut AssetSet,
    targets: &mut TargetSet,
) -> Result<FramePipeline, StartupError> {
    assets.load_manifest(backend, loader, &descriptor.manifest)?;
    if descriptor.passes.iter().any(|pass| pass.draws_fullscreen_quad()) {
        assets.load_fullscreen_quad(backend)?;
    }
    *targets = TargetSet::create(backend, &descriptor.targets)?;
    FramePipeline::compile(&descriptor.passes, assets, targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::error::AssetError;
    use crate::resources::{MeshData, TextureData};

    /// Every asset is present except shaders, which fail to load
    struct NoShaders;

    impl AssetLoader for NoShaders {
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
            Err(AssetError::NotFound(name.into()))
        }
    }

    #[test]
    fn failed_startup_releases_what_it_acquired() {
        let backend = RecordingBackend::new(800, 600);
        let log = backend.log();
        let result = DemoApp::startup(
            backend,
            DemoKind::TexturedSphere,
            &NoShaders,
            &DemoConfig::default(),
        );
        assert!(matches!(result, Err(StartupError::Asset { .. })));

        let commands = log.commands();
        let created = commands.iter().filter(|c| c.is_create()).count();
        let destroyed = commands.iter().filter(|c| c.is_destroy()).count();
        assert_eq!(created, 1);
        assert_eq!(destroyed, 1);
        assert!(log.unknown_destroys().is_empty());
        assert_eq!(log.count(|c| matches!(c, crate::backend::Command::BeginFrame)), 0);
    }
}
