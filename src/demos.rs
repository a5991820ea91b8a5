//! The three demos, each a set of pass descriptors over one frame pipeline

use glam::{Vec3, Vec4};

use crate::backend::types::{TextOverlay, TextureFormat};
use crate::pipeline::*;
use crate::resources::AssetManifest;
use crate::scene::{Camera, Projection, ShadowLight};
use crate::DemoConfig;

pub const EARTH_TEXTURE: &str = "textures/earth.jpg";
pub const ENVIRONMENT_CUBE: &str = "textures/snow_env";
pub const TEAPOT_MESH: &str = "models/teapot.obj";
pub const SPHERE_MESH: &str = "builtin:sphere";
pub const TORUS_MESH: &str = "builtin:torus";
pub const DISC_MESH: &str = "builtin:disc";

pub const TEXTURED_SPHERE_EFFECT: &str = "shaders/textured_sphere.wgsl";
pub const CREATE_SHADOW_EFFECT: &str = "shaders/create_shadow.wgsl";
pub const APPLY_SHADOW_EFFECT: &str = "shaders/apply_shadow.wgsl";
pub const ENVIRONMENT_MAPPING_EFFECT: &str = "shaders/environment_mapping.wgsl";
/// Indexed by the post-effect selection: passthrough, grayscale, sepia
pub const POST_EFFECTS: [&str; 3] = [
    "shaders/post_passthrough.wgsl",
    "shaders/post_grayscale.wgsl",
    "shaders/post_sepia.wgsl",
];

pub const SHADOW_MAP_TARGET: &str = "shadow_map";
pub const SCENE_COLOR_TARGET: &str = "scene_color";

const TORUS_COLOR: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);
const DISC_COLOR: Vec4 = Vec4::new(0.7, 0.7, 0.7, 1.0);
const DISC_POSITION: Vec3 = Vec3::new(0.0, -60.0, 0.0);

/// Which demo to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemoKind {
    TexturedSphere,
    ShadowMapping,
    EnvironmentMapping,
}

impl DemoKind {
    pub const ALL: [DemoKind; 3] = [
        DemoKind::TexturedSphere,
        DemoKind::ShadowMapping,
        DemoKind::EnvironmentMapping,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DemoKind::TexturedSphere => "Textured Sphere",
            DemoKind::ShadowMapping => "Shadow Mapping",
            DemoKind::EnvironmentMapping => "Environment Mapping",
        }
    }

    pub fn descriptor(&self, config: &DemoConfig) -> DemoDescriptor {
        match self {
            DemoKind::TexturedSphere => textured_sphere(config),
            DemoKind::ShadowMapping => shadow_mapping(config),
            DemoKind::EnvironmentMapping => environment_mapping(config),
        }
    }
}

/// Everything that distinguishes one demo from another
#[derive(Debug, Clone, PartialEq)]
pub struct DemoDescriptor {
    pub kind: DemoKind,
    pub title: String,
    pub overlay: TextOverlay,
    pub manifest: AssetManifest,
    pub targets: Vec<TargetDescriptor>,
    pub passes: Vec<PassDescriptor>,
    pub camera: Camera,
    pub light: ShadowLight,
}

impl DemoDescriptor {
    /// Number of selectable post effects
    pub fn post_effect_count(&self) -> usize {
        self.passes
            .iter()
            .map(|pass| match &pass.effect {
                EffectSelector::PostProcess(names) => names.len(),
                EffectSelector::Fixed(_) => 0,
            })
            .max()
            .unwrap_or(0)
    }
}

fn overlay(text: &str) -> TextOverlay {
    TextOverlay {
        text: text.to_string(),
        position: [5.0, 5.0],
        size: 20.0,
        color: [1.0, 1.0, 1.0, 1.0],
    }
}

fn camera(config: &DemoConfig, position: Vec3) -> Camera {
    Camera::new(position, Vec3::ZERO).with_projection(Projection::new(
        config.fov_y,
        config.near,
        config.far,
    ))
}

fn textured_sphere(config: &DemoConfig) -> DemoDescriptor {
    DemoDescriptor {
        kind: DemoKind::TexturedSphere,
        title: DemoKind::TexturedSphere.name().to_string(),
        overlay: overlay("Demo Framework\n\nESC: Quit demo"),
        manifest: AssetManifest {
            textures: vec![EARTH_TEXTURE.into()],
            effects: vec![TEXTURED_SPHERE_EFFECT.into()],
            meshes: vec![SPHERE_MESH.into()],
            ..Default::default()
        },
        targets: Vec::new(),
        passes: vec![PassDescriptor::new(
            "sphere",
            PassTarget::Current,
            EffectSelector::Fixed(TEXTURED_SPHERE_EFFECT.into()),
        )
        .with_input(TextureInput::texture("diffuse_map", EARTH_TEXTURE))
        .with_draw(DrawItem::mesh(SPHERE_MESH, Placement::spinning()))],
        camera: camera(config, Vec3::new(0.0, 0.0, -200.0)),
        light: ShadowLight::default(),
    }
}

fn shadow_mapping(config: &DemoConfig) -> DemoDescriptor {
    let size = config.shadow_map_size;

    DemoDescriptor {
        kind: DemoKind::ShadowMapping,
        title: DemoKind::ShadowMapping.name().to_string(),
        overlay: overlay("Shadow Mapping\n\nESC: Quit demo"),
        manifest: AssetManifest {
            effects: vec![CREATE_SHADOW_EFFECT.into(), APPLY_SHADOW_EFFECT.into()],
            meshes: vec![TORUS_MESH.into(), DISC_MESH.into()],
            ..Default::default()
        },
        targets: vec![TargetDescriptor {
            name: SHADOW_MAP_TARGET.into(),
            size: TextureSize::Absolute {
                width: size,
                height: size,
            },
            format: TextureFormat::R32Float,
            depth: true,
        }],
        passes: vec![
            PassDescriptor::new(
                "create_shadow",
                PassTarget::Offscreen(SHADOW_MAP_TARGET.into()),
                EffectSelector::Fixed(CREATE_SHADOW_EFFECT.into()),
            )
            .with_clear(ClearValue::color([1.0, 1.0, 1.0, 1.0]))
            .with_draw(DrawItem::mesh(TORUS_MESH, Placement::spinning()))
            .with_draw(DrawItem::mesh(DISC_MESH, Placement::at(DISC_POSITION))),
            PassDescriptor::new(
                "apply_shadow",
                PassTarget::Current,
                EffectSelector::Fixed(APPLY_SHADOW_EFFECT.into()),
            )
            .with_input(TextureInput::target("shadow_map", SHADOW_MAP_TARGET))
            .with_draw(DrawItem::mesh(TORUS_MESH, Placement::spinning()).with_color(TORUS_COLOR))
            .with_draw(DrawItem::mesh(DISC_MESH, Placement::at(DISC_POSITION)).with_color(DISC_COLOR)),
        ],
        camera: camera(config, Vec3::new(0.0, 120.0, -250.0)),
        light: ShadowLight::new(Vec3::new(500.0, 500.0, -500.0), Vec4::ONE),
    }
}

fn environment_mapping(config: &DemoConfig) -> DemoDescriptor {
    DemoDescriptor {
        kind: DemoKind::EnvironmentMapping,
        title: DemoKind::EnvironmentMapping.name().to_string(),
        overlay: overlay(
            "Post-processing\n\n1: Color\n2: Grayscale\n3: Sepia\nESC: Quit demo",
        ),
        manifest: AssetManifest {
            cube_textures: vec![ENVIRONMENT_CUBE.into()],
            effects: std::iter::once(ENVIRONMENT_MAPPING_EFFECT)
                .chain(POST_EFFECTS)
                .map(String::from)
                .collect(),
            meshes: vec![TEAPOT_MESH.into()],
            ..Default::default()
        },
        targets: vec![TargetDescriptor {
            name: SCENE_COLOR_TARGET.into(),
            size: TextureSize::default(),
            format: TextureFormat::Rgba16Float,
            depth: true,
        }],
        passes: vec![
            PassDescriptor::new(
                "scene",
                PassTarget::Offscreen(SCENE_COLOR_TARGET.into()),
                EffectSelector::Fixed(ENVIRONMENT_MAPPING_EFFECT.into()),
            )
            .with_clear(ClearValue::color(config.clear_color))
            .with_input(TextureInput::texture("environment_map", ENVIRONMENT_CUBE))
            .with_draw(DrawItem::mesh(TEAPOT_MESH, Placement::spinning()).with_color(Vec4::ONE)),
            PassDescriptor::new(
                "post_process",
                PassTarget::Current,
                EffectSelector::PostProcess(POST_EFFECTS.iter().map(|s| s.to_string()).collect()),
            )
            .with_input(TextureInput::target("scene_texture", SCENE_COLOR_TARGET))
            .with_draw(DrawItem::fullscreen_quad()),
        ],
        camera: camera(config, Vec3::new(0.0, 0.0, -200.0)),
        light: ShadowLight::new(Vec3::new(500.0, 500.0, -500.0), Vec4::new(0.7, 0.7, 1.0, 1.0)),
    }
}
