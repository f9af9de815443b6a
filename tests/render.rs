//! Whole-engine rendering properties: output length, block-size invariance,
//! pass-through fidelity and recorded automation.

use std::sync::Arc;

use saavy_render::{
    voices, AutomationCurve, EngineConfig, GraphDescription, Note, RenderEngine, SourceBuffer,
    TempoInterpolation, TimeUnit,
};

/// Deterministic noise in [-1, 1).
fn noise(len: usize, seed: u32) -> Vec<f32> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}

/// A scene touching every node kind, automation, a tempo curve and notes.
fn scene(block_size: usize) -> RenderEngine {
    let config = EngineConfig::default()
        .with_sample_rate(22_050.0)
        .with_block_size(block_size)
        .with_tempo_interpolation(TempoInterpolation::Linear);
    let mut engine = RenderEngine::new(config).unwrap();
    voices::register_builtins(engine.registry_mut());
    engine
        .set_bpm_curve(vec![100.0, 140.0, 90.0, 130.0], 1)
        .unwrap();

    engine.make_poly("keys", voices::SINE, 3).unwrap();
    engine.set_poly_effect("keys", voices::DRIVE).unwrap();
    for (i, pitch) in [60u8, 64, 67, 71, 74].into_iter().enumerate() {
        let note = Note::new(pitch, 80 + i as u8, i as f64 * 0.3, 0.45);
        engine.add_note("keys", note, TimeUnit::Beats).unwrap();
    }
    engine
        .set_automation(
            "keys",
            "voice/level",
            AutomationCurve::Ticks {
                ppqn: 4,
                values: vec![0.1, 0.5, 0.2, 0.4],
            },
        )
        .unwrap();

    let source = Arc::new(SourceBuffer::new(vec![noise(9_000, 1), noise(9_000, 2)], 16_000.0).unwrap());
    let warp = engine.make_warp("loop", source).unwrap();
    warp.set_markers_from_bpm(110.0).unwrap();
    warp.set_loop(500.0, 6_000.0).unwrap();
    engine
        .set_automation(
            "loop",
            "transpose",
            AutomationCurve::PerSample(vec![0.0, 0.0, 0.0, 3.0]),
        )
        .unwrap();

    engine.make_oscillator("lfo", 3.0, 2).unwrap();
    engine
        .set_automation(
            "lfo",
            "freq",
            AutomationCurve::Ticks {
                ppqn: 2,
                values: vec![30.0, 300.0, 80.0],
            },
        )
        .unwrap();

    engine.make_add("bus", 2).unwrap();
    engine.make_gain("master", 0.5).unwrap();
    engine
        .load_graph(
            GraphDescription::new()
                .node("keys", &[])
                .node("loop", &[])
                .node("lfo", &[])
                .node("bus", &["keys", "loop", "lfo"])
                .node("master", &["bus"]),
        )
        .unwrap();
    engine
}

#[test]
fn output_is_independent_of_block_size() {
    let mut reference = scene(1);
    reference.render(1.0, TimeUnit::Seconds).unwrap();
    let expected = reference.get_audio(None).unwrap().to_vec();
    assert_eq!(expected.len(), 2);
    assert_eq!(expected[0].len(), 22_050);
    assert!(expected[0].iter().any(|s| s.abs() > 0.01));

    for block_size in [3, 64, 511, 2048] {
        let mut engine = scene(block_size);
        engine.render(1.0, TimeUnit::Seconds).unwrap();
        assert_eq!(
            engine.get_audio(None).unwrap(),
            expected.as_slice(),
            "block size {block_size} changed the output"
        );
    }
}

#[test]
fn rendering_twice_gives_the_same_audio() {
    let mut engine = scene(128);
    engine.render(0.5, TimeUnit::Seconds).unwrap();
    let first = engine.get_audio(None).unwrap().to_vec();
    engine.render(0.5, TimeUnit::Seconds).unwrap();
    assert_eq!(engine.get_audio(None).unwrap(), first.as_slice());
}

#[test]
fn pass_through_is_bit_exact_for_fractional_durations() {
    let sr = 44_100.0;
    let left = noise(30_000, 7);
    let right = noise(30_000, 8);
    let source = Arc::new(SourceBuffer::new(vec![left.clone(), right.clone()], sr).unwrap());

    for block_size in [1, 100, 512] {
        let config = EngineConfig::default()
            .with_sample_rate(sr)
            .with_block_size(block_size);
        let mut engine = RenderEngine::new(config).unwrap();
        engine.make_playback("src", source.clone()).unwrap();
        engine.make_gain("unity", 1.0).unwrap();
        engine.make_add("sum", 2).unwrap();
        engine
            .load_graph(
                GraphDescription::new()
                    .node("src", &[])
                    .node("unity", &["src"])
                    .node("sum", &["unity"]),
            )
            .unwrap();

        // 0.3401 s * 44100 = 14998.41 samples
        engine.render(0.3401, TimeUnit::Seconds).unwrap();
        let out = engine.get_audio(None).unwrap();
        assert_eq!(out[0].len(), 14_998);
        assert_eq!(out[0], left[..14_998]);
        assert_eq!(out[1], right[..14_998]);

        // Longer than the source: exact copy, then silence
        engine.render(0.75, TimeUnit::Seconds).unwrap();
        let out = engine.get_audio(None).unwrap();
        assert_eq!(out[0].len(), 33_075);
        assert_eq!(out[0][..30_000], left[..]);
        assert!(out[0][30_000..].iter().all(|&s| s == 0.0));
    }
}

#[test]
fn render_length_follows_the_tempo_in_beats() {
    let mut engine = RenderEngine::new(EngineConfig::default().with_sample_rate(1_000.0)).unwrap();
    engine.make_oscillator("osc", 10.0, 1).unwrap();
    engine
        .load_graph(GraphDescription::new().node("osc", &[]))
        .unwrap();

    engine.render(3.0, TimeUnit::Beats).unwrap();
    assert_eq!(engine.get_audio(None).unwrap()[0].len(), 1_500);

    engine.set_bpm(60.0).unwrap();
    engine.render(3.0, TimeUnit::Beats).unwrap();
    assert_eq!(engine.get_audio(None).unwrap()[0].len(), 3_000);
}

#[test]
fn recorded_automation_matches_audio_length() {
    let config = EngineConfig::default()
        .with_sample_rate(1_000.0)
        .with_block_size(64);
    let mut engine = RenderEngine::new(config).unwrap();
    engine.make_oscillator("osc", 10.0, 1).unwrap();
    engine
        .set_automation(
            "osc",
            "gain",
            AutomationCurve::Ticks {
                ppqn: 1,
                values: vec![0.0, 1.0],
            },
        )
        .unwrap();
    engine.set_record_automation("osc", true).unwrap();
    engine
        .load_graph(GraphDescription::new().node("osc", &[]))
        .unwrap();

    engine.render(0.3337, TimeUnit::Seconds).unwrap();
    let samples = engine.get_audio(None).unwrap()[0].len();
    assert_eq!(samples, 334);

    let automation = engine.get_automation("osc").unwrap();
    assert_eq!(automation.len(), 2);
    for values in automation.values() {
        assert_eq!(values.len(), samples);
    }

    // 120 BPM: beat 0.5 falls on sample 250
    let gain = &automation["gain"];
    assert!((gain[250] - 0.5).abs() < 1e-4);
    assert!(automation["freq"].iter().all(|&f| f == 10.0));
}

#[test]
fn tempo_changes_move_queued_notes() {
    let config = EngineConfig::default().with_sample_rate(8_000.0);
    let mut engine = RenderEngine::new(config).unwrap();
    voices::register_builtins(engine.registry_mut());
    engine.make_poly("keys", voices::SINE, 2).unwrap();
    engine
        .add_note("keys", Note::new(69, 127, 2.0, 1.0), TimeUnit::Beats)
        .unwrap();
    engine
        .load_graph(GraphDescription::new().node("keys", &[]))
        .unwrap();

    // 120 BPM puts beat 2 at one second; at 60 BPM it moves to two
    engine.set_bpm(60.0).unwrap();
    engine.render(2.5, TimeUnit::Seconds).unwrap();
    let out = &engine.get_audio(None).unwrap()[0];

    assert!(out[..16_000].iter().all(|&s| s == 0.0));
    assert!(out[16_000..16_800].iter().any(|s| s.abs() > 0.01));
}
