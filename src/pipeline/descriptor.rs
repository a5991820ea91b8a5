//! Declarative pass descriptions, resolved by [`FramePipeline::compile`]
//!
//! [`FramePipeline::compile`]: super::FramePipeline::compile

use glam::{Mat4, Vec3, Vec4};

/// Where a pass draws
#[derive(Debug, Clone, PartialEq)]
pub enum PassTarget {
    /// Whatever is bound when the pass starts, normally the backbuffer
    Current,
    /// A named offscreen target, bound for the pass and restored afterwards
    Offscreen(String),
}

/// Clear applied to the pass target before drawing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValue {
    pub color: [f32; 4],
    pub depth: f32,
}

impl ClearValue {
    pub fn color(color: [f32; 4]) -> Self {
        Self { color, depth: 1.0 }
    }
}

/// Which effect a pass draws with
#[derive(Debug, Clone, PartialEq)]
pub enum EffectSelector {
    Fixed(String),
    /// One of several effects, picked each frame by the post-effect index
    PostProcess(Vec<String>),
}

impl EffectSelector {
    pub fn names(&self) -> &[String] {
        match self {
            EffectSelector::Fixed(name) => std::slice::from_ref(name),
            EffectSelector::PostProcess(names) => names,
        }
    }
}

/// Source of a texture input
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    /// A loaded texture or cube texture
    Texture(String),
    /// An offscreen target written by an earlier pass
    Target(String),
}

/// Binds `source` to the effect texture slot named `slot`
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInput {
    pub slot: String,
    pub source: InputSource,
}

impl TextureInput {
    pub fn texture(slot: &str, name: &str) -> Self {
        Self {
            slot: slot.to_string(),
            source: InputSource::Texture(name.to_string()),
        }
    }

    pub fn target(slot: &str, name: &str) -> Self {
        Self {
            slot: slot.to_string(),
            source: InputSource::Target(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Mesh(String),
    FullscreenQuad,
}

/// World transform of a draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Apply the scene rotation about Y
    pub spin: bool,
    pub translation: Vec3,
    pub scale: Vec3,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            spin: false,
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Placement {
    pub fn spinning() -> Self {
        Self {
            spin: true,
            ..Default::default()
        }
    }

    pub fn at(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// `translation * rotation * scale`
    pub fn world_matrix(&self, rotation: Mat4) -> Mat4 {
        let spin = if self.spin { rotation } else { Mat4::IDENTITY };
        Mat4::from_translation(self.translation) * spin * Mat4::from_scale(self.scale)
    }
}

/// One mesh drawn once per effect pass
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub geometry: Geometry,
    pub placement: Placement,
    /// Overrides `object_color` for this draw
    pub color: Option<Vec4>,
}

impl DrawItem {
    pub fn mesh(name: &str, placement: Placement) -> Self {
        Self {
            geometry: Geometry::Mesh(name.to_string()),
            placement,
            color: None,
        }
    }

    pub fn fullscreen_quad() -> Self {
        Self {
            geometry: Geometry::FullscreenQuad,
            placement: Placement::default(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = Some(color);
        self
    }
}

/// A render pass, described by name
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    pub name: String,
    pub target: PassTarget,
    pub clear: Option<ClearValue>,
    pub effect: EffectSelector,
    pub inputs: Vec<TextureInput>,
    pub draws: Vec<DrawItem>,
}

impl PassDescriptor {
    pub fn new(name: &str, target: PassTarget, effect: EffectSelector) -> Self {
        Self {
            name: name.to_string(),
            target,
            clear: None,
            effect,
            inputs: Vec::new(),
            draws: Vec::new(),
        }
    }

    pub fn with_clear(mut self, clear: ClearValue) -> Self {
        self.clear = Some(clear);
        self
    }

    pub fn with_input(mut self, input: TextureInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_draw(mut self, draw: DrawItem) -> Self {
        self.draws.push(draw);
        self
    }

    /// Name of the offscreen target this pass writes, if any
    pub fn writes(&self) -> Option<&str> {
        match &self.target {
            PassTarget::Offscreen(name) => Some(name),
            PassTarget::Current => None,
        }
    }

    pub fn draws_fullscreen_quad(&self) -> bool {
        self.draws
            .iter()
            .any(|draw| draw.geometry == Geometry::FullscreenQuad)
    }

    /// Names of the offscreen targets this pass reads
    pub fn reads(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().filter_map(|input| match &input.source {
            InputSource::Target(name) => Some(name.as_str()),
            InputSource::Texture(_) => None,
        })
    }
}
