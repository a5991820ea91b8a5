//! Effects: a compiled program plus a named parameter bag
//!
//! Parameter writes go to a pending copy of the uniform block. They become
//! visible to draws only once committed, either by [`Effect::begin_pass`] or
//! by [`Effect::commit_changes`]. Parameters that are never written keep
//! whatever value they last had.

use std::collections::HashMap;

use glam::{Mat4, Vec4};

use crate::backend::traits::{MeshHandle, ProgramHandle, TextureRef};
use crate::backend::types::{DrawCall, EffectUniforms, ProgramDescriptor, TextureSlot};
use crate::error::{AssetError, EffectError};

pub const WORLD_MATRIX: &str = "world_matrix";
pub const VIEW_MATRIX: &str = "view_matrix";
pub const PROJECTION_MATRIX: &str = "projection_matrix";
pub const LIGHT_VIEW_MATRIX: &str = "light_view_matrix";
pub const LIGHT_PROJECTION_MATRIX: &str = "light_projection_matrix";
pub const WORLD_LIGHT_POSITION: &str = "world_light_position";
pub const WORLD_CAMERA_POSITION: &str = "world_camera_position";
pub const OBJECT_COLOR: &str = "object_color";
pub const LIGHT_COLOR: &str = "light_color";

/// Named shader effect
#[derive(Debug)]
pub struct Effect {
    name: String,
    program: ProgramHandle,
    pass_count: usize,
    slots: Vec<TextureSlot>,

    pending: EffectUniforms,
    committed: EffectUniforms,
    pending_textures: HashMap<u32, TextureRef>,
    committed_textures: HashMap<u32, TextureRef>,

    active_pass: Option<usize>,
}

impl Effect {
    /// Parse, validate and reflect a WGSL effect source
    pub fn compile(name: &str, source: &str) -> Result<ProgramDescriptor, AssetError> {
        super::shader::compile_program(name, source)
    }

    /// Wrap a created program described by `desc`
    pub fn new(name: &str, program: ProgramHandle, desc: &ProgramDescriptor) -> Self {
        Self {
            name: name.to_string(),
            program,
            pass_count: desc.passes.len(),
            slots: desc.texture_slots.clone(),
            pending: EffectUniforms::default(),
            committed: EffectUniforms::default(),
            pending_textures: HashMap::new(),
            committed_textures: HashMap::new(),
            active_pass: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn pass_count(&self) -> usize {
        self.pass_count
    }

    pub fn texture_slots(&self) -> &[TextureSlot] {
        &self.slots
    }

    pub fn has_slot(&self, slot: &str) -> bool {
        self.slots.iter().any(|s| s.name == slot)
    }

    /// Uniform block draws will currently see
    pub fn committed(&self) -> &EffectUniforms {
        &self.committed
    }

    pub fn set_matrix(&mut self, name: &str, value: Mat4) -> Result<(), EffectError> {
        let field = match name {
            WORLD_MATRIX => &mut self.pending.world,
            VIEW_MATRIX => &mut self.pending.view,
            PROJECTION_MATRIX => &mut self.pending.projection,
            LIGHT_VIEW_MATRIX => &mut self.pending.light_view,
            LIGHT_PROJECTION_MATRIX => &mut self.pending.light_projection,
            _ => return Err(EffectError::UnknownParameter(name.to_string())),
        };
        *field = value;
        Ok(())
    }

    pub fn set_vector(&mut self, name: &str, value: Vec4) -> Result<(), EffectError> {
        let field = match name {
            WORLD_LIGHT_POSITION => &mut self.pending.world_light_position,
            WORLD_CAMERA_POSITION => &mut self.pending.world_camera_position,
            OBJECT_COLOR => &mut self.pending.object_color,
            LIGHT_COLOR => &mut self.pending.light_color,
            _ => return Err(EffectError::UnknownParameter(name.to_string())),
        };
        *field = value;
        Ok(())
    }

    pub fn set_texture(&mut self, slot: &str, texture: TextureRef) -> Result<(), EffectError> {
        let binding = self
            .slots
            .iter()
            .find(|s| s.name == slot)
            .map(|s| s.binding)
            .ok_or_else(|| EffectError::UnknownTextureSlot {
                effect: self.name.clone(),
                slot: slot.to_string(),
            })?;
        self.pending_textures.insert(binding, texture);
        Ok(())
    }

    /// Make pending parameter writes visible to subsequent draws
    pub fn commit_changes(&mut self) {
        self.committed = self.pending;
        self.committed_textures.clone_from(&self.pending_textures);
    }

    /// Select pass `pass` and commit pending writes
    pub fn begin_pass(&mut self, pass: usize) -> Result<(), EffectError> {
        if pass >= self.pass_count {
            return Err(EffectError::InvalidPass {
                effect: self.name.clone(),
                pass,
                count: self.pass_count,
            });
        }
        self.commit_changes();
        self.active_pass = Some(pass);
        Ok(())
    }

    pub fn end_pass(&mut self) {
        self.active_pass = None;
    }

    /// Draw of `mesh` with the active pass and committed parameters
    pub fn draw_call(&self, mesh: MeshHandle) -> Result<DrawCall, EffectError> {
        let pass = self
            .active_pass
            .ok_or_else(|| EffectError::NoActivePass(self.name.clone()))?;

        let textures = self
            .slots
            .iter()
            .map(|slot| {
                self.committed_textures
                    .get(&slot.binding)
                    .map(|texture| (slot.binding, *texture))
                    .ok_or_else(|| EffectError::MissingTexture {
                        effect: self.name.clone(),
                        slot: slot.name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DrawCall {
            program: self.program,
            pass: pass as u32,
            mesh,
            uniforms: self.committed,
            textures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::traits::TextureHandle;
    use crate::backend::types::{ProgramPass, SlotKind};

    fn effect(passes: usize) -> Effect {
        let desc = ProgramDescriptor {
            label: "test.wgsl".into(),
            source: String::new(),
            passes: (0..passes)
                .map(|i| ProgramPass {
                    vertex_entry: format!("vs_{i}"),
                    fragment_entry: format!("fs_{i}"),
                })
                .collect(),
            texture_slots: vec![TextureSlot {
                name: "diffuse_map".into(),
                binding: 0,
                kind: SlotKind::Filtered,
            }],
        };
        Effect::new("test.wgsl", ProgramHandle(7), &desc)
    }

    #[test]
    fn draws_see_only_committed_values() {
        let mut fx = effect(1);
        fx.set_texture("diffuse_map", TextureRef::Texture(TextureHandle(1)))
            .unwrap();
        fx.begin_pass(0).unwrap();

        fx.set_vector(OBJECT_COLOR, Vec4::new(0.0, 1.0, 0.0, 1.0))
            .unwrap();
        let call = fx.draw_call(MeshHandle(1)).unwrap();
        assert_eq!(call.uniforms.object_color, Vec4::ONE);
        assert_eq!(fx.committed().object_color, Vec4::ONE);

        fx.commit_changes();
        assert_eq!(fx.committed().object_color, Vec4::new(0.0, 1.0, 0.0, 1.0));
        let call = fx.draw_call(MeshHandle(1)).unwrap();
        assert_eq!(call.uniforms.object_color, Vec4::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn unwritten_parameters_stay_stale() {
        let mut fx = effect(1);
        fx.set_texture("diffuse_map", TextureRef::Texture(TextureHandle(1)))
            .unwrap();
        fx.set_matrix(VIEW_MATRIX, Mat4::from_translation(glam::Vec3::X))
            .unwrap();
        fx.begin_pass(0).unwrap();
        fx.end_pass();

        fx.set_matrix(WORLD_MATRIX, Mat4::from_rotation_y(1.0)).unwrap();
        fx.begin_pass(0).unwrap();
        let call = fx.draw_call(MeshHandle(1)).unwrap();
        assert_eq!(call.uniforms.view, Mat4::from_translation(glam::Vec3::X));
        assert_eq!(call.uniforms.world, Mat4::from_rotation_y(1.0));
    }

    #[test]
    fn rejects_unknown_names_and_passes() {
        let mut fx = effect(2);
        assert_eq!(
            fx.set_matrix("gWorldMatrix", Mat4::IDENTITY),
            Err(EffectError::UnknownParameter("gWorldMatrix".into()))
        );
        assert!(fx.set_vector(WORLD_MATRIX, Vec4::ONE).is_err());
        assert!(matches!(
            fx.set_texture("normal_map", TextureRef::Texture(TextureHandle(1))),
            Err(EffectError::UnknownTextureSlot { .. })
        ));
        assert!(matches!(
            fx.begin_pass(2),
            Err(EffectError::InvalidPass { pass: 2, count: 2, .. })
        ));
    }

    #[test]
    fn draw_requires_pass_and_textures() {
        let mut fx = effect(1);
        assert!(matches!(
            fx.draw_call(MeshHandle(1)),
            Err(EffectError::NoActivePass(_))
        ));
        fx.begin_pass(0).unwrap();
        assert!(matches!(
            fx.draw_call(MeshHandle(1)),
            Err(EffectError::MissingTexture { .. })
        ));
    }
}
