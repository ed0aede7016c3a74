use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shader_effect::{
    CompileFlags, Dialect, EffectConfig, ShaderEffect, SoftwareDevice, StageKind, TranslatedShader, Translator,
};
use std::path::Path;

const VERTEX: &str = "uniform vec4 TintVS;\n\
                      uniform CameraVS { mat4 view; mat4 projection; vec4 eye; };\n\
                      void main() {}\n";
const PIXEL: &str = "uniform vec4 TintPS;\n\
                     uniform MaterialPS { vec4 albedo; float roughness; vec3 emissive; };\n\
                     void main() {}\n";

/// Traducteur sans historique, pour ne pas accumuler de requêtes
struct StaticTranslator;

impl Translator for StaticTranslator {
    fn translate(&self, path: &Path, _flags: CompileFlags, _dialect: Dialect) -> anyhow::Result<TranslatedShader> {
        let (stage, source) = match path.extension().and_then(|e| e.to_str()) {
            Some("vs") => (StageKind::Vertex, VERTEX),
            _ => (StageKind::Fragment, PIXEL),
        };
        Ok(TranslatedShader {
            stage,
            source: source.to_string(),
        })
    }
}

fn benchmark_effect_lifecycle(c: &mut Criterion) {
    let translator = StaticTranslator;
    let mut device = SoftwareDevice::new();

    c.bench_function("effect_create_load_enable_destroy", |b| {
        b.iter(|| {
            let mut effect = ShaderEffect::create(&mut device, &translator, EffectConfig::default()).unwrap();
            effect.load_vertex(&mut device, black_box("fx.vs")).unwrap();
            effect.load_pixel(&mut device, black_box("fx.ps")).unwrap();
            effect.enable(&mut device).unwrap();
            effect.destroy(&mut device);
        })
    });
}

fn benchmark_relink(c: &mut Criterion) {
    let translator = StaticTranslator;
    let mut device = SoftwareDevice::new();

    let mut effect = ShaderEffect::create(&mut device, &translator, EffectConfig::default()).unwrap();
    effect.load_vertex(&mut device, "fx.vs").unwrap();
    effect.load_pixel(&mut device, "fx.ps").unwrap();

    c.bench_function("effect_enable", |b| b.iter(|| effect.enable(&mut device).unwrap()));

    effect.destroy(&mut device);
}

criterion_group!(benches, benchmark_effect_lifecycle, benchmark_relink);
criterion_main!(benches);
