//! Benchmark for a small mixed scene: poly synth with a shared effect, an
//! oscillator and a gain stage summed on one bus.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_render::{
    voices, AutomationCurve, EngineConfig, GraphDescription, Note, RenderEngine, TimeUnit,
};

use crate::BLOCK_SIZES;

pub fn bench_scene(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/scene");
    group.sample_size(20);

    for &size in BLOCK_SIZES {
        let config = EngineConfig::default()
            .with_sample_rate(48_000.0)
            .with_block_size(size);
        let mut engine = RenderEngine::new(config).unwrap();
        voices::register_builtins(engine.registry_mut());

        engine.make_poly("keys", voices::SINE, 8).unwrap();
        engine.set_poly_effect("keys", voices::DRIVE).unwrap();
        for (i, pitch) in [60u8, 64, 67, 72].into_iter().enumerate() {
            let note = Note::new(pitch, 90, i as f64 * 0.5, 1.0);
            engine.add_note("keys", note, TimeUnit::Beats).unwrap();
        }
        engine.make_oscillator("drone", 55.0, 2).unwrap();
        engine
            .set_automation(
                "drone",
                "gain",
                AutomationCurve::Ticks {
                    ppqn: 4,
                    values: vec![0.0, 0.2, 0.4, 0.2, 0.0, 0.2, 0.4, 0.2],
                },
            )
            .unwrap();
        engine.make_add("bus", 2).unwrap();
        engine.make_gain("master", 0.7).unwrap();
        engine
            .load_graph(
                GraphDescription::new()
                    .node("keys", &[])
                    .node("drone", &[])
                    .node("bus", &["keys", "drone"])
                    .node("master", &["bus"]),
            )
            .unwrap();

        group.bench_with_input(BenchmarkId::new("mixed", size), &size, |b, _| {
            b.iter(|| engine.render(black_box(1.0), TimeUnit::Seconds).unwrap())
        });
    }

    group.finish();
}
