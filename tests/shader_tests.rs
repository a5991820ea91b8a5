//! The shipped effects compile and expose the slots the demos bind.

use rstest::rstest;

use shader_demos::backend::SlotKind;
use shader_demos::resources::shader::compile_program;
use shader_demos::resources::{AssetLoader, FileAssetLoader};

fn loader() -> FileAssetLoader {
    FileAssetLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"))
}

#[rstest]
#[case::textured_sphere("shaders/textured_sphere.wgsl", &[("diffuse_map", SlotKind::Filtered)])]
#[case::create_shadow("shaders/create_shadow.wgsl", &[])]
#[case::apply_shadow("shaders/apply_shadow.wgsl", &[("shadow_map", SlotKind::Unfiltered)])]
#[case::environment_mapping(
    "shaders/environment_mapping.wgsl",
    &[("environment_map", SlotKind::FilteredCube)]
)]
#[case::passthrough("shaders/post_passthrough.wgsl", &[("scene_texture", SlotKind::Filtered)])]
#[case::grayscale("shaders/post_grayscale.wgsl", &[("scene_texture", SlotKind::Filtered)])]
#[case::sepia("shaders/post_sepia.wgsl", &[("scene_texture", SlotKind::Filtered)])]
fn shipped_effect_reflects_slots(#[case] name: &str, #[case] slots: &[(&str, SlotKind)]) {
    let source = loader().load_shader(name).expect("shader ships with the crate");
    let program = compile_program(name, &source).expect("shader compiles");

    assert_eq!(program.label, name);
    assert_eq!(program.passes.len(), 1);
    assert_eq!(program.passes[0].vertex_entry, "vs_main");
    assert_eq!(program.passes[0].fragment_entry, "fs_main");

    let reflected: Vec<_> = program
        .texture_slots
        .iter()
        .map(|slot| (slot.name.as_str(), slot.kind))
        .collect();
    assert_eq!(reflected, slots);
    assert!(program.texture_slots.iter().all(|slot| slot.binding == 0));
}
