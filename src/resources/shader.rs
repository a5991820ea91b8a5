//! WGSL effect compilation and interface reflection
//!
//! An effect source is a single WGSL module. Its passes are the vertex entry
//! points paired with the fragment entry points, both sorted by name. Group 0
//! holds only the shared uniform block at binding 0; group 1 holds texture
//! slots, each optionally followed by its sampler at the next binding.

use std::collections::BTreeMap;

use naga::{ImageClass, ImageDimension, ResourceBinding, ShaderStage, TypeInner};

use crate::backend::types::{EffectUniforms, ProgramDescriptor, ProgramPass, SlotKind, TextureSlot};
use crate::error::AssetError;

/// Bind group holding the shared uniform block
pub const UNIFORM_GROUP: u32 = 0;
/// Bind group holding texture slots
pub const TEXTURE_GROUP: u32 = 1;

/// Parse, validate and reflect a WGSL effect
pub fn compile_program(label: &str, source: &str) -> Result<ProgramDescriptor, AssetError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| AssetError::Shader(e.emit_to_string(source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| AssetError::Shader(e.emit_to_string(source)))?;

    let passes = reflect_passes(&module)?;
    let texture_slots = reflect_texture_slots(&module)?;

    log::debug!(
        "Compiled effect '{}': {} pass(es), {} texture slot(s)",
        label,
        passes.len(),
        texture_slots.len()
    );

    Ok(ProgramDescriptor {
        label: label.to_string(),
        source: source.to_string(),
        passes,
        texture_slots,
    })
}

fn reflect_passes(module: &naga::Module) -> Result<Vec<ProgramPass>, AssetError> {
    let entries = |stage: ShaderStage| {
        let mut names: Vec<&str> = module
            .entry_points
            .iter()
            .filter(|ep| ep.stage == stage)
            .map(|ep| ep.name.as_str())
            .collect();
        names.sort_unstable();
        names
    };

    let vertex = entries(ShaderStage::Vertex);
    let fragment = entries(ShaderStage::Fragment);

    if vertex.is_empty() {
        return Err(AssetError::Reflection("no vertex entry point".into()));
    }
    if vertex.len() != fragment.len() {
        return Err(AssetError::Reflection(format!(
            "{} vertex entry point(s) but {} fragment entry point(s)",
            vertex.len(),
            fragment.len()
        )));
    }

    Ok(vertex
        .into_iter()
        .zip(fragment)
        .map(|(vs, fs)| ProgramPass {
            vertex_entry: vs.to_string(),
            fragment_entry: fs.to_string(),
        })
        .collect())
}

enum SlotResource<'a> {
    Image { name: &'a str, dim: ImageDimension },
    Sampler,
}

fn reflect_texture_slots(module: &naga::Module) -> Result<Vec<TextureSlot>, AssetError> {
    let mut resources = BTreeMap::new();

    for (_, var) in module.global_variables.iter() {
        let Some(ResourceBinding { group, binding }) = var.binding.clone() else {
            continue;
        };
        let name = var.name.as_deref().unwrap_or("<unnamed>");
        let inner = &module.types[var.ty].inner;

        match group {
            UNIFORM_GROUP => {
                if binding != 0 {
                    return Err(AssetError::Reflection(format!(
                        "'{name}' uses group 0 binding {binding}, only binding 0 is allowed"
                    )));
                }
                let size = inner.size(module.to_ctx()) as usize;
                if size > std::mem::size_of::<EffectUniforms>() {
                    return Err(AssetError::Reflection(format!(
                        "uniform block '{name}' is {size} bytes, larger than the shared block"
                    )));
                }
            }
            TEXTURE_GROUP => {
                let resource = match *inner {
                    TypeInner::Image {
                        dim,
                        arrayed: false,
                        class: ImageClass::Sampled { multi: false, .. },
                    } => SlotResource::Image { name, dim },
                    TypeInner::Sampler { comparison: false } => SlotResource::Sampler,
                    _ => {
                        return Err(AssetError::Reflection(format!(
                            "'{name}' at group 1 binding {binding} is not a sampled texture or sampler"
                        )))
                    }
                };
                resources.insert(binding, resource);
            }
            _ => {
                return Err(AssetError::Reflection(format!(
                    "'{name}' uses bind group {group}, only groups 0 and 1 are allowed"
                )))
            }
        }
    }

    let mut slots = Vec::new();
    for (&binding, resource) in &resources {
        let SlotResource::Image { name, dim } = *resource else {
            let owned = binding
                .checked_sub(1)
                .and_then(|b| resources.get(&b))
                .map_or(false, |r| matches!(r, SlotResource::Image { .. }));
            if !owned {
                return Err(AssetError::Reflection(format!(
                    "sampler at group 1 binding {binding} does not follow a texture"
                )));
            }
            continue;
        };

        let sampled = matches!(resources.get(&(binding + 1)), Some(SlotResource::Sampler));
        let kind = match (dim, sampled) {
            (ImageDimension::D2, true) => SlotKind::Filtered,
            (ImageDimension::D2, false) => SlotKind::Unfiltered,
            (ImageDimension::Cube, true) => SlotKind::FilteredCube,
            (ImageDimension::Cube, false) => {
                return Err(AssetError::Reflection(format!(
                    "cube texture '{name}' needs a sampler at binding {}",
                    binding + 1
                )))
            }
            (other, _) => {
                return Err(AssetError::Reflection(format!(
                    "texture '{name}' has unsupported dimension {other:?}"
                )))
            }
        };

        slots.push(TextureSlot {
            name: name.to_string(),
            binding,
            kind,
        });
    }

    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "
struct Uniforms { world: mat4x4<f32> }
@group(0) @binding(0) var<uniform> effect: Uniforms;
";

    fn effect(body: &str) -> String {
        format!("{HEADER}{body}")
    }

    const PASS: &str = "
@vertex fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
    return effect.world * vec4<f32>(p, 1.0);
}
@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
";

    #[test]
    fn single_pass_without_textures() {
        let program = compile_program("plain", &effect(PASS)).unwrap();
        assert_eq!(
            program.passes,
            vec![ProgramPass {
                vertex_entry: "vs_main".into(),
                fragment_entry: "fs_main".into()
            }]
        );
        assert!(program.texture_slots.is_empty());
    }

    #[test]
    fn reflects_slot_kinds() {
        let source = effect(&format!(
            "
@group(1) @binding(0) var diffuse: texture_2d<f32>;
@group(1) @binding(1) var diffuse_sampler: sampler;
@group(1) @binding(2) var shadow_map: texture_2d<f32>;
@group(1) @binding(4) var sky: texture_cube<f32>;
@group(1) @binding(5) var sky_sampler: sampler;
{PASS}"
        ));
        let program = compile_program("slots", &source).unwrap();
        let slots: Vec<_> = program
            .texture_slots
            .iter()
            .map(|s| (s.name.as_str(), s.binding, s.kind))
            .collect();
        assert_eq!(
            slots,
            vec![
                ("diffuse", 0, SlotKind::Filtered),
                ("shadow_map", 2, SlotKind::Unfiltered),
                ("sky", 4, SlotKind::FilteredCube),
            ]
        );
    }

    #[test]
    fn passes_pair_sorted_entry_points() {
        let source = effect(
            "
@vertex fn vs_b() -> @builtin(position) vec4<f32> { return effect.world[0]; }
@vertex fn vs_a() -> @builtin(position) vec4<f32> { return effect.world[1]; }
@fragment fn fs_b() -> @location(0) vec4<f32> { return vec4<f32>(0.0); }
@fragment fn fs_a() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
",
        );
        let program = compile_program("two", &source).unwrap();
        assert_eq!(program.passes.len(), 2);
        assert_eq!(program.passes[0].vertex_entry, "vs_a");
        assert_eq!(program.passes[1].fragment_entry, "fs_b");
    }

    #[test]
    fn syntax_error_is_reported_verbatim() {
        let source = "@vertex fn vs_main( -> {";
        let err = compile_program("broken", source).unwrap_err();
        let AssetError::Shader(text) = err else {
            panic!("expected shader error, got {err:?}");
        };
        assert!(text.contains("error"), "{text}");
    }

    #[test]
    fn rejects_extra_bind_groups() {
        let source = effect(&format!(
            "@group(2) @binding(0) var t: texture_2d<f32>;\n{PASS}"
        ));
        assert!(matches!(
            compile_program("g2", &source),
            Err(AssetError::Reflection(_))
        ));
    }

    #[test]
    fn rejects_cube_without_sampler() {
        let source = effect(&format!(
            "@group(1) @binding(0) var sky: texture_cube<f32>;\n{PASS}"
        ));
        assert!(matches!(
            compile_program("cube", &source),
            Err(AssetError::Reflection(_))
        ));
    }

    #[test]
    fn rejects_unbalanced_entry_points() {
        let source = effect(
            "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return effect.world[0]; }",
        );
        assert!(matches!(
            compile_program("half", &source),
            Err(AssetError::Reflection(_))
        ));
    }
}
