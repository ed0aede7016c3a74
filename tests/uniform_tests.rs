//! Tests du binding des uniforms et des blocs d'uniforms
//!
//! Vérifie le protocole de suffixes VS / PS / GS par relecture dans le
//! périphérique logiciel.

use bytemuck::{Pod, Zeroable};
use shader_effect::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Construit un effet lié à partir de sources par étage
fn linked_effect(
    device: &mut SoftwareDevice,
    vertex: &str,
    pixel: &str,
    geometry: Option<&str>,
) -> ShaderEffect<MemoryTranslator> {
    let mut translator = MemoryTranslator::new()
        .with("fx.vs", StageKind::Vertex, vertex)
        .with("fx.ps", StageKind::Fragment, pixel);
    if let Some(source) = geometry {
        translator.insert("fx.gs", StageKind::Geometry, source);
    }

    let mut effect = ShaderEffect::create(device, translator, EffectConfig::default()).unwrap();
    effect.load_vertex(device, "fx.vs").unwrap();
    effect.load_pixel(device, "fx.ps").unwrap();
    if geometry.is_some() {
        effect.load_geometry(device, "fx.gs").unwrap();
    }
    effect.enable(device).unwrap();
    effect
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Material {
    tint: [f32; 4],
    params: [f32; 4],
}

/// Test de SetVec4 limité à l'étage qui déclare l'uniform
#[test]
fn test_set_vec4_updates_only_declared_stage() {
    init_logging();
    let mut device = SoftwareDevice::new();
    let effect = linked_effect(
        &mut device,
        "uniform vec4 TintVS;\nvoid main() {}\n",
        "uniform vec4 OtherPS;\nvoid main() {}\n",
        Some("uniform vec4 OtherGS;\nvoid main() {}\n"),
    );
    let program = effect.program();

    let resolved = effect.set_vec4(&mut device, "Tint", &[[0.25, 0.5, 0.75, 1.0]]);
    assert_eq!(resolved, 1);

    assert_eq!(device.uniform_values(program, "TintVS"), Some(vec![[0.25, 0.5, 0.75, 1.0]]));
    // Les uniforms des autres étages ne sont pas touchés
    assert_eq!(device.uniform_values(program, "OtherPS"), Some(vec![[0.0; 4]]));
    assert_eq!(device.uniform_values(program, "OtherGS"), Some(vec![[0.0; 4]]));
    assert_eq!(device.uniform_values(program, "TintPS"), None);
    assert_eq!(device.uniform_values(program, "TintGS"), None);

    // Les trois envois sont émis, dont deux vers -1, sans erreur
    assert_eq!(device.stats().uniform_uploads, 3);
    assert_eq!(device.stats().errors, 0);
    effect.destroy(&mut device);
}

/// Test de SetVec4 sur les trois étages
#[test]
fn test_set_vec4_same_value_in_every_stage() {
    init_logging();
    let mut device = SoftwareDevice::new();
    let effect = linked_effect(
        &mut device,
        "uniform vec4 LightVS[2];\nvoid main() {}\n",
        "uniform vec4 LightPS[2];\nvoid main() {}\n",
        Some("uniform vec4 LightGS[2];\nvoid main() {}\n"),
    );
    let program = effect.program();

    let lights = [[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0]];
    assert_eq!(effect.set_vec4(&mut device, "Light", &lights), 3);

    for name in ["LightVS", "LightPS", "LightGS"] {
        assert_eq!(device.uniform_values(program, name), Some(lights.to_vec()), "{}", name);
    }
    effect.destroy(&mut device);
}

/// Test de SetVec4 sur un nom absent
#[test]
fn test_set_vec4_unknown_name_is_silent() {
    init_logging();
    let mut device = SoftwareDevice::new();
    let effect = linked_effect(&mut device, "void main() {}\n", "void main() {}\n", None);

    assert_eq!(effect.set_vec4(&mut device, "Nothing", &[[1.0; 4]]), 0);
    assert_eq!(device.stats().errors, 0);
    effect.destroy(&mut device);
}

/// Test du binding d'un bloc déclaré par le seul pixel shader
#[test]
fn test_set_uniform_block_binds_only_pixel_variant() {
    init_logging();
    let mut device = SoftwareDevice::new();
    let effect = linked_effect(
        &mut device,
        "void main() {}\n",
        "uniform FooPS { vec4 tint; };\nvoid main() {}\n",
        None,
    );
    let program = effect.program();

    let bound = effect.set_uniform_block(&mut device, "Foo", 3);

    assert_eq!(bound, 1);
    assert_eq!(device.block_binding(program, "FooPS"), Some(3));
    assert_eq!(device.block_binding(program, "FooVS"), None);
    // Les bindings vers l'index invalide sont émis mais ignorés sans erreur
    assert_eq!(device.stats().block_bindings, 3);
    assert_eq!(device.stats().errors, 0);
    effect.destroy(&mut device);
}

/// Test du binding d'un bloc avec son buffer
#[test]
fn test_set_uniform_block_buffer_binds_slot() {
    init_logging();
    let mut device = SoftwareDevice::new();
    let effect = linked_effect(
        &mut device,
        "uniform CameraVS { mat4 view; mat4 projection; };\nvoid main() {}\n",
        "void main() {}\n",
        Some("uniform CameraGS { mat4 view; mat4 projection; };\nvoid main() {}\n"),
    );
    let program = effect.program();

    let buffer = device.create_buffer().unwrap();
    let bound = effect.set_uniform_block_buffer(&mut device, "Camera", 1, buffer);

    assert_eq!(bound, 2);
    assert_eq!(device.uniform_buffer_binding(1), Some(buffer));
    assert_eq!(device.block_binding(program, "CameraVS"), Some(1));
    assert_eq!(device.block_binding(program, "CameraGS"), Some(1));

    device.delete_buffer(buffer);
    effect.destroy(&mut device);
}

/// Test de la taille du buffer créé pour un bloc
#[test]
fn test_create_uniform_block_matches_block_size() {
    init_logging();
    let mut device = SoftwareDevice::new();
    let effect = linked_effect(
        &mut device,
        "uniform Material { vec4 tint; float roughness; vec2 scale; };\nvoid main() {}\n",
        "void main() {}\n",
        None,
    );

    let size = effect.uniform_block_size(&device, "Material").unwrap();
    assert_eq!(size, 32);

    let buffer = effect.create_uniform_block(&mut device, "Material").unwrap();
    assert_eq!(device.buffer_contents(buffer).map(<[u8]>::len), Some(size));
    assert_eq!(device.buffer_usage(buffer), Some(BufferUsage::DynamicDraw));
    assert_eq!(device.bound_buffer(BufferTarget::Uniform), Some(buffer));

    // Le buffer est inscriptible jusqu'à sa taille exacte
    let material = Material {
        tint: [1.0, 0.5, 0.25, 1.0],
        params: [0.8, 2.0, 2.0, 0.0],
    };
    write_uniform_block(&mut device, buffer, 0, &material).unwrap();
    assert_eq!(device.buffer_contents(buffer).unwrap(), bytemuck::bytes_of(&material));

    // Un octet de plus déborde
    let overflow = write_uniform_block(&mut device, buffer, 1, &material);
    assert!(matches!(overflow, Err(GpuError::OutOfBounds { offset: 1, len: 32, size: 32 })));

    device.delete_buffer(buffer);
    effect.destroy(&mut device);
}

/// Test de la recherche par nom nu de CreateUniformBlock
#[test]
fn test_create_uniform_block_requires_bare_name() {
    init_logging();
    let mut device = SoftwareDevice::new();
    let effect = linked_effect(
        &mut device,
        "void main() {}\n",
        "uniform FooPS { vec4 tint; };\nvoid main() {}\n",
        None,
    );

    // Le nom logique n'est pas décoré pour cette recherche
    match effect.create_uniform_block(&mut device, "Foo") {
        Err(EffectError::UnknownUniformBlock { name }) => assert_eq!(name, "Foo"),
        other => panic!("UnknownUniformBlock attendu, obtenu {:?}", other),
    }

    // Le nom physique complet fonctionne
    let buffer = effect.create_uniform_block(&mut device, "FooPS").unwrap();
    assert_eq!(device.buffer_contents(buffer).map(<[u8]>::len), Some(16));

    device.delete_buffer(buffer);
    effect.destroy(&mut device);
}

/// Test du flux complet d'un bloc d'uniforms
#[test]
fn test_full_block_workflow() {
    init_logging();
    let mut device = SoftwareDevice::new();
    let effect = linked_effect(
        &mut device,
        "uniform MaterialVS { vec4 tint; vec4 params; };\nvoid main() {}\n",
        "uniform MaterialPS { vec4 tint; vec4 params; };\nvoid main() {}\n",
        None,
    );
    let program = effect.program();

    let buffer = effect.create_uniform_block(&mut device, "MaterialVS").unwrap();
    let material = Material {
        tint: [0.0, 0.0, 1.0, 1.0],
        params: [0.0; 4],
    };
    write_uniform_block(&mut device, buffer, 0, &material).unwrap();

    assert_eq!(effect.set_uniform_block_buffer(&mut device, "Material", 2, buffer), 2);
    assert_eq!(device.block_binding(program, "MaterialVS"), Some(2));
    assert_eq!(device.block_binding(program, "MaterialPS"), Some(2));
    assert_eq!(device.uniform_buffer_binding(2), Some(buffer));

    device.delete_buffer(buffer);
    assert_eq!(device.uniform_buffer_binding(2), None);
    effect.destroy(&mut device);
    assert!(device.live_objects().is_empty());
}
