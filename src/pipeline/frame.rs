//! Compiled, ordered pass list executed once per frame

use std::collections::HashSet;

use glam::{Mat4, Vec3, Vec4};

use crate::backend::traits::*;
use crate::error::{EffectError, FrameError, StartupError};
use crate::pipeline::descriptor::*;
use crate::pipeline::scope::TargetScope;
use crate::pipeline::target::TargetSet;
use crate::resources::*;
use crate::scene::{Camera, SceneState, ShadowLight};

/// Per-frame values shared by every pass
#[derive(Debug, Clone, PartialEq)]
pub struct FrameParameters {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub light_view: Mat4,
    pub light_projection: Mat4,
    pub light_position: Vec3,
    pub light_color: Vec4,
    /// Scene rotation applied to spinning draws
    pub rotation: Mat4,
}

impl FrameParameters {
    pub fn new(
        camera: &Camera,
        light: &ShadowLight,
        scene: &SceneState,
        (width, height): (u32, u32),
    ) -> Self {
        Self {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(width, height),
            camera_position: camera.position,
            light_view: light.view_matrix(),
            light_projection: light.projection_matrix(),
            light_position: light.position,
            light_color: light.color,
            rotation: scene.rotation_matrix(),
        }
    }
}

/// What happened during one [`FramePipeline::execute`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub passes_executed: usize,
    pub passes_skipped: usize,
    pub draw_calls: usize,
}

#[derive(Debug)]
struct CompiledDraw {
    mesh: MeshHandle,
    placement: Placement,
    color: Option<Vec4>,
}

#[derive(Debug)]
struct CompiledPass {
    name: String,
    /// `None` draws into whatever is bound
    binding: Option<TargetBinding>,
    clear: Option<ClearValue>,
    effects: Vec<EffectId>,
    inputs: Vec<(String, TextureRef)>,
    draws: Vec<CompiledDraw>,
}

impl CompiledPass {
    /// Effect for the selected post effect, falling back to the first
    fn effect(&self, post_effect: usize) -> Option<EffectId> {
        self.effects
            .get(post_effect)
            .or_else(|| self.effects.first())
            .copied()
    }
}

/// Pass list with every name resolved to a handle
#[derive(Debug, Default)]
pub struct FramePipeline {
    passes: Vec<CompiledPass>,
}

impl FramePipeline {
    /// Resolve `passes` against loaded assets and targets.
    ///
    /// A pass may only read a target that an earlier pass writes.
    pub fn compile(
        passes: &[PassDescriptor],
        assets: &AssetSet,
        targets: &TargetSet,
    ) -> Result<Self, StartupError> {
        let mut compiled = Vec::with_capacity(passes.len());
        let mut written: HashSet<&str> = HashSet::new();

        for pass in passes {
            let invalid =
                |reason: String| StartupError::Pipeline(format!("pass '{}': {}", pass.name, reason));

            let binding = match &pass.target {
                PassTarget::Current => None,
                PassTarget::Offscreen(name) => Some(
                    targets
                        .binding(name)
                        .ok_or_else(|| invalid(format!("unknown target '{name}'")))?,
                ),
            };

            if pass.effect.names().is_empty() {
                return Err(invalid("no effect".into()));
            }
            let mut effects = Vec::new();
            for name in pass.effect.names() {
                let id = assets
                    .effect_id(name)
                    .ok_or_else(|| invalid(format!("unknown effect '{name}'")))?;
                effects.push(id);
            }

            let mut inputs = Vec::new();
            for input in &pass.inputs {
                let texture = match &input.source {
                    InputSource::Texture(name) => assets
                        .texture(name)
                        .map(TextureRef::Texture)
                        .ok_or_else(|| invalid(format!("unknown texture '{name}'")))?,
                    InputSource::Target(name) => {
                        if pass.writes() == Some(name.as_str()) {
                            return Err(invalid(format!("reads target '{name}' it writes")));
                        }
                        if !written.contains(name.as_str()) {
                            return Err(invalid(format!(
                                "reads target '{name}' before any earlier pass writes it"
                            )));
                        }
                        targets
                            .texture(name)
                            .ok_or_else(|| invalid(format!("unknown target '{name}'")))?
                    }
                };
                inputs.push((input.slot.clone(), texture));
            }

            for &id in &effects {
                let Some(effect) = assets.effect(id) else {
                    continue;
                };
                for input in &pass.inputs {
                    if !effect.has_slot(&input.slot) {
                        return Err(invalid(format!(
                            "effect '{}' has no texture slot '{}'",
                            effect.name(),
                            input.slot
                        )));
                    }
                }
                for slot in effect.texture_slots() {
                    if !pass.inputs.iter().any(|input| input.slot == slot.name) {
                        return Err(invalid(format!(
                            "no input for slot '{}' of effect '{}'",
                            slot.name,
                            effect.name()
                        )));
                    }
                }
            }

            let mut draws = Vec::new();
            for draw in &pass.draws {
                let mesh = match &draw.geometry {
                    Geometry::Mesh(name) => assets
                        .mesh(name)
                        .ok_or_else(|| invalid(format!("unknown mesh '{name}'")))?,
                    Geometry::FullscreenQuad => assets
                        .fullscreen_quad()
                        .ok_or_else(|| invalid("fullscreen quad not loaded".into()))?,
                };
                draws.push(CompiledDraw {
                    mesh,
                    placement: draw.placement,
                    color: draw.color,
                });
            }

            if let Some(target) = pass.writes() {
                written.insert(target);
            }

            compiled.push(CompiledPass {
                name: pass.name.clone(),
                binding,
                clear: pass.clear,
                effects,
                inputs,
                draws,
            });
        }

        log::debug!("Compiled frame pipeline with {} pass(es)", compiled.len());
        Ok(Self { passes: compiled })
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|p| p.name.as_str())
    }

    /// Run every pass in order. A failing pass is logged and skipped, the
    /// remaining passes still run.
    pub fn execute(
        &self,
        backend: &mut dyn GraphicsBackend,
        assets: &mut AssetSet,
        params: &FrameParameters,
        post_effect: usize,
    ) -> FrameStats {
        let mut stats = FrameStats::default();

        for pass in &self.passes {
            match execute_pass(pass, backend, assets, params, post_effect) {
                Ok(draws) => {
                    stats.passes_executed += 1;
                    stats.draw_calls += draws;
                }
                Err(e) => {
                    log::warn!("{}", e);
                    stats.passes_skipped += 1;
                }
            }
        }

        stats
    }
}

fn execute_pass(
    pass: &CompiledPass,
    backend: &mut dyn GraphicsBackend,
    assets: &mut AssetSet,
    params: &FrameParameters,
    post_effect: usize,
) -> Result<usize, FrameError> {
    let backend_error = |source: BackendError| FrameError::Pass {
        pass: pass.name.clone(),
        source,
    };
    let effect_error = |source: EffectError| FrameError::Effect {
        pass: pass.name.clone(),
        source,
    };

    let mut scope = match pass.binding {
        Some(binding) => TargetScope::bind(backend, binding).map_err(backend_error)?,
        None => TargetScope::current(backend),
    };
    if let Some(clear) = pass.clear {
        scope.clear(clear.color, clear.depth).map_err(backend_error)?;
    }

    let effect = pass
        .effect(post_effect)
        .and_then(|id| assets.effect_mut(id))
        .ok_or_else(|| {
            backend_error(BackendError::InvalidHandle {
                kind: "effect",
                id: post_effect as u64,
            })
        })?;

    set_frame_parameters(effect, params).map_err(effect_error)?;
    for (slot, texture) in &pass.inputs {
        effect.set_texture(slot, *texture).map_err(effect_error)?;
    }

    let mut draws = 0;
    for index in 0..effect.pass_count() {
        effect.begin_pass(index).map_err(effect_error)?;
        for draw in &pass.draws {
            effect
                .set_matrix(WORLD_MATRIX, draw.placement.world_matrix(params.rotation))
                .map_err(effect_error)?;
            if let Some(color) = draw.color {
                effect.set_vector(OBJECT_COLOR, color).map_err(effect_error)?;
            }
            effect.commit_changes();

            let call = effect.draw_call(draw.mesh).map_err(effect_error)?;
            scope.draw(&call).map_err(backend_error)?;
            draws += 1;
        }
        effect.end_pass();
    }

    log::trace!("Pass '{}': {} draw(s)", pass.name, draws);
    Ok(draws)
}

fn set_frame_parameters(effect: &mut Effect, params: &FrameParameters) -> Result<(), EffectError> {
    effect.set_matrix(VIEW_MATRIX, params.view)?;
    effect.set_matrix(PROJECTION_MATRIX, params.projection)?;
    effect.set_matrix(LIGHT_VIEW_MATRIX, params.light_view)?;
    effect.set_matrix(LIGHT_PROJECTION_MATRIX, params.light_projection)?;
    effect.set_vector(WORLD_LIGHT_POSITION, params.light_position.extend(1.0))?;
    effect.set_vector(WORLD_CAMERA_POSITION, params.camera_position.extend(1.0))?;
    effect.set_vector(LIGHT_COLOR, params.light_color)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::TextureFormat;
    use crate::backend::RecordingBackend;
    use crate::error::AssetError;
    use crate::pipeline::target::{TargetDescriptor, TextureSize};

    const SHADER: &str = "
struct Uniforms { world: mat4x4<f32> }
@group(0) @binding(0) var<uniform> effect: Uniforms;
@vertex fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
    return effect.world * vec4<f32>(p, 1.0);
}
@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
";

    const SAMPLING_SHADER: &str = "
struct Uniforms { world: mat4x4<f32> }
@group(0) @binding(0) var<uniform> effect: Uniforms;
@group(1) @binding(0) var source: texture_2d<f32>;
@vertex fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
    return effect.world * vec4<f32>(p, 1.0);
}
@fragment fn fs_main() -> @location(0) vec4<f32> {
    return textureLoad(source, vec2<i32>(0, 0), 0);
}
";

    struct Sources;

    impl AssetLoader for Sources {
        fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError> {
            MeshData::builtin(name.trim_start_matches("builtin:"))
        }
        fn load_texture(&self, name: &str) -> Result<TextureData, AssetError> {
            Ok(TextureData::solid_color([0, 0, 0, 255], name))
        }
        fn load_cube_texture(&self, name: &str) -> Result<TextureData, AssetError> {
            Ok(TextureData::solid_cube([0, 0, 0, 255], name))
        }
        fn load_shader(&self, name: &str) -> Result<String, AssetError> {
            match name {
                "plain" => Ok(SHADER.into()),
                "sampling" => Ok(SAMPLING_SHADER.into()),
                _ => Err(AssetError::NotFound(name.into())),
            }
        }
    }

    fn setup() -> (RecordingBackend, AssetSet, TargetSet) {
        let mut backend = RecordingBackend::new(800, 600);
        let mut assets = AssetSet::new();
        let manifest = AssetManifest {
            effects: vec!["plain".into(), "sampling".into()],
            meshes: vec!["builtin:torus".into()],
            ..Default::default()
        };
        assets.load_manifest(&mut backend, &Sources, &manifest).unwrap();
        assets.load_fullscreen_quad(&mut backend).unwrap();
        let targets = TargetSet::create(
            &mut backend,
            &[TargetDescriptor {
                name: "offscreen".into(),
                size: TextureSize::default(),
                format: TextureFormat::R32Float,
                depth: true,
            }],
        )
        .unwrap();
        (backend, assets, targets)
    }

    fn write_pass() -> PassDescriptor {
        PassDescriptor::new(
            "write",
            PassTarget::Offscreen("offscreen".into()),
            EffectSelector::Fixed("plain".into()),
        )
        .with_clear(ClearValue::color([1.0; 4]))
        .with_draw(DrawItem::mesh("builtin:torus", Placement::spinning()))
    }

    fn read_pass() -> PassDescriptor {
        PassDescriptor::new(
            "read",
            PassTarget::Current,
            EffectSelector::Fixed("sampling".into()),
        )
        .with_input(TextureInput::target("source", "offscreen"))
        .with_draw(DrawItem::fullscreen_quad())
    }

    #[test]
    fn rejects_read_before_write() {
        let (_backend, assets, targets) = setup();
        let err = FramePipeline::compile(&[read_pass(), write_pass()], &assets, &targets)
            .unwrap_err();
        assert!(err.to_string().contains("before any earlier pass"), "{err}");

        assert!(FramePipeline::compile(&[write_pass(), read_pass()], &assets, &targets).is_ok());
    }

    #[test]
    fn rejects_unknown_names() {
        let (_backend, assets, targets) = setup();

        let pass = write_pass().with_draw(DrawItem::mesh("teapot.obj", Placement::default()));
        assert!(FramePipeline::compile(&[pass], &assets, &targets).is_err());

        let mut pass = write_pass();
        pass.effect = EffectSelector::Fixed("missing".into());
        assert!(FramePipeline::compile(&[pass], &assets, &targets).is_err());

        let pass = write_pass().with_input(TextureInput::texture("source", "earth.jpg"));
        assert!(FramePipeline::compile(&[pass], &assets, &targets).is_err());
    }

    #[test]
    fn rejects_missing_and_unknown_slots() {
        let (_backend, assets, targets) = setup();

        let mut pass = read_pass();
        pass.inputs.clear();
        let err = FramePipeline::compile(&[write_pass(), pass], &assets, &targets).unwrap_err();
        assert!(err.to_string().contains("no input for slot 'source'"), "{err}");

        let pass = write_pass().with_input(TextureInput::target("diffuse_map", "offscreen"));
        assert!(FramePipeline::compile(&[pass], &assets, &targets).is_err());
    }

    #[test]
    fn execute_restores_binding_between_passes() {
        let (mut backend, mut assets, targets) = setup();
        let log = backend.log();
        let pipeline =
            FramePipeline::compile(&[write_pass(), read_pass()], &assets, &targets).unwrap();
        assert_eq!(pipeline.pass_names().collect::<Vec<_>>(), vec!["write", "read"]);

        let params = FrameParameters::new(
            &Camera::default(),
            &ShadowLight::default(),
            &SceneState::default(),
            (800, 600),
        );
        backend.begin_frame().unwrap();
        let stats = pipeline.execute(&mut backend, &mut assets, &params, 0);
        assert_eq!(
            stats,
            FrameStats {
                passes_executed: 2,
                passes_skipped: 0,
                draw_calls: 2
            }
        );

        let draws = log.draws();
        assert_eq!(Some(draws[0].0), targets.binding("offscreen"));
        assert_eq!(draws[1].0, TargetBinding::BACKBUFFER);
        assert_eq!(backend.render_target(), TargetBinding::BACKBUFFER);
    }
}
