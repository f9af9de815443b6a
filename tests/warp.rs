//! Warp node behaviour through the full engine.

use std::f64::consts::TAU;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use saavy_render::graph::warp::{ClipPlacement, WarpMarker};
use saavy_render::{
    AutomationCurve, EngineConfig, GraphDescription, RenderEngine, SourceBuffer,
    TempoInterpolation, TimeUnit,
};

fn sine(freq: f64, sample_rate: f64, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (TAU * freq * i as f64 / sample_rate).sin() as f32)
        .collect()
}

fn engine(sample_rate: f64, block_size: usize) -> RenderEngine {
    let config = EngineConfig::default()
        .with_sample_rate(sample_rate)
        .with_block_size(block_size)
        .with_tempo_interpolation(TempoInterpolation::Linear);
    RenderEngine::new(config).unwrap()
}

/// Frequency of the strongest bin in `signal`.
fn peak_frequency(signal: &[f32], sample_rate: f64) -> f64 {
    let mut buffer: Vec<Complex<f32>> = signal.iter().map(|&s| Complex::new(s, 0.0)).collect();
    let fft = FftPlanner::new().plan_fft_forward(buffer.len());
    fft.process(&mut buffer);

    let half = buffer.len() / 2;
    let (bin, _) = buffer[1..half]
        .iter()
        .enumerate()
        .map(|(i, c)| (i + 1, c.norm()))
        .fold((0, 0.0f32), |best, x| if x.1 > best.1 { x } else { best });
    bin as f64 * sample_rate / signal.len() as f64
}

#[test]
fn unwarped_playback_is_exact_under_any_tempo() {
    let sr = 44_100.0;
    let data: Vec<f32> = (0..20_000).map(|i| ((i * 37 % 101) as f32 / 50.0) - 1.0).collect();
    let source = Arc::new(SourceBuffer::mono(data.clone(), sr).unwrap());

    for bpms in [vec![120.0], vec![60.0, 200.0, 91.0, 150.0]] {
        let mut engine = engine(sr, 256);
        engine.set_bpm_curve(bpms, 2).unwrap();
        engine.make_warp("clip", source.clone()).unwrap();
        engine
            .load_graph(GraphDescription::new().node("clip", &[]))
            .unwrap();
        engine.render(0.5, TimeUnit::Seconds).unwrap();

        let out = &engine.get_audio(None).unwrap()[0];
        assert_eq!(out.len(), 22_050);
        assert_eq!(out[..20_000], data[..]);
        assert!(out[20_000..].iter().all(|&s| s == 0.0));
    }
}

#[test]
fn loop_wrap_keeps_phase() {
    // 441 Hz at 22.05 kHz has a 50-sample period; the 2000-sample loop
    // holds exactly 40 of them.
    let source_rate = 22_050.0;
    let source = Arc::new(SourceBuffer::mono(sine(441.0, source_rate, 4_000), source_rate).unwrap());

    let mut engine = engine(44_100.0, 512);
    let warp = engine.make_warp("loop", source).unwrap();
    warp.set_region(100.0, None).unwrap();
    warp.set_loop(100.0, 2_100.0).unwrap();
    engine
        .load_graph(GraphDescription::new().node("loop", &[]))
        .unwrap();
    engine.render(1.0, TimeUnit::Seconds).unwrap();
    let out = &engine.get_audio(None).unwrap()[0];

    // One output step of a 441 Hz sine at 44.1 kHz moves at most 2π/100
    let max_step = out
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .fold(0.0f32, f32::max);
    assert!(max_step < 0.07, "discontinuity of {max_step}");

    // Still playing long after the source region would have run out
    let tail_peak = out[40_000..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(tail_peak > 0.9);
}

#[test]
fn markers_follow_the_engine_tempo() {
    let sr = 44_100.0;
    let data = sine(50.0, sr, 44_100);
    let source = Arc::new(SourceBuffer::mono(data.clone(), sr).unwrap());

    // Source recorded at 120 BPM, engine at 60: half speed
    let mut engine = engine(sr, 300);
    engine.set_bpm(60.0).unwrap();
    engine
        .make_warp("clip", source)
        .unwrap()
        .set_markers_from_bpm(120.0)
        .unwrap();
    engine
        .load_graph(GraphDescription::new().node("clip", &[]))
        .unwrap();
    engine.render(1.0, TimeUnit::Seconds).unwrap();
    let out = &engine.get_audio(None).unwrap()[0];

    for k in (0..22_000).step_by(97) {
        assert!(
            (out[2 * k] - data[k]).abs() < 1e-3,
            "sample {}: {} vs {}",
            2 * k,
            out[2 * k],
            data[k]
        );
    }
}

#[test]
fn explicit_markers_and_clips_gate_playback() {
    let sr = 1_000.0;
    let source = Arc::new(SourceBuffer::mono(vec![1.0; 4_000], sr).unwrap());

    let mut engine = engine(sr, 64);
    let warp = engine.make_warp("clip", source).unwrap();
    warp.set_warp_markers(vec![WarpMarker::new(0.0, 0.0), WarpMarker::new(500.0, 1.0)])
        .unwrap();
    warp.set_clips(vec![
        ClipPlacement::new(1.0, 2.0, 0.0),
        ClipPlacement::new(3.0, 4.0, 0.0),
    ])
    .unwrap();
    engine
        .load_graph(GraphDescription::new().node("clip", &[]))
        .unwrap();

    // 120 BPM at 1 kHz: one beat is 500 samples
    engine.render(2.5, TimeUnit::Seconds).unwrap();
    let out = &engine.get_audio(None).unwrap()[0];
    let playing = |s: &f32| (s - 1.0).abs() < 1e-5;
    assert!(out[..490].iter().all(|&s| s == 0.0));
    assert!(out[510..990].iter().all(playing));
    assert!(out[1_010..1_490].iter().all(|&s| s == 0.0));
    assert!(out[1_510..1_990].iter().all(playing));
    assert!(out[2_010..].iter().all(|&s| s == 0.0));
}

#[test]
fn transpose_shifts_pitch() {
    let sr = 44_100.0;
    let source = Arc::new(SourceBuffer::mono(sine(440.0, sr, 88_200), sr).unwrap());

    let mut engine = engine(sr, 512);
    engine.make_warp("clip", source).unwrap();
    engine.set_parameter("clip", "transpose", 12.0).unwrap();
    engine
        .load_graph(GraphDescription::new().node("clip", &[]))
        .unwrap();
    engine.render(1.5, TimeUnit::Seconds).unwrap();
    let out = &engine.get_audio(None).unwrap()[0];

    let peak = peak_frequency(&out[8_192..8_192 + 32_768], sr);
    assert!((peak - 880.0).abs() < 5.0, "peak at {peak} Hz");

    engine.set_parameter("clip", "transpose", 0.0).unwrap();
    engine.render(1.5, TimeUnit::Seconds).unwrap();
    let out = &engine.get_audio(None).unwrap()[0];
    let peak = peak_frequency(&out[8_192..8_192 + 32_768], sr);
    assert!((peak - 440.0).abs() < 5.0, "peak at {peak} Hz");
}

fn render_transposed(source: &Arc<SourceBuffer>, transpose: AutomationCurve, seconds: f64) -> Vec<f32> {
    let mut engine = engine(source.sample_rate(), 512);
    engine.make_warp("clip", source.clone()).unwrap();
    engine.set_automation("clip", "transpose", transpose).unwrap();
    engine
        .load_graph(GraphDescription::new().node("clip", &[]))
        .unwrap();
    engine.render(seconds, TimeUnit::Seconds).unwrap();
    engine.get_audio(None).unwrap()[0].clone()
}

#[test]
fn tiny_transpose_stays_on_the_grid() {
    let sr = 44_100.0;
    let data = sine(440.0, sr, 44_100);
    let source = Arc::new(SourceBuffer::mono(data.clone(), sr).unwrap());

    let untouched = render_transposed(&source, AutomationCurve::PerSample(vec![0.0]), 0.5);
    assert_eq!(untouched[..], data[..22_050]);

    let nudged = render_transposed(&source, AutomationCurve::PerSample(vec![0.001]), 0.5);
    for n in 0..2_205 {
        assert!(
            (nudged[n] - data[n]).abs() < 0.02,
            "sample {n}: {} vs {}",
            nudged[n],
            data[n]
        );
    }
}

#[test]
fn transpose_automation_through_zero_is_continuous() {
    let sr = 44_100.0;
    let source = Arc::new(SourceBuffer::mono(sine(440.0, sr, 88_200), sr).unwrap());

    // -1 to +1 semitone over the render, passing through 0 half way
    let ramp: Vec<f32> = (0..44_100).map(|n| -1.0 + 2.0 * n as f32 / 44_099.0).collect();
    let out = render_transposed(&source, AutomationCurve::PerSample(ramp), 1.0);

    // A 440 Hz sine a semitone up moves at most ~0.067 per sample at 44.1 kHz
    let (worst, at) = out
        .windows(2)
        .enumerate()
        .map(|(n, w)| ((w[1] - w[0]).abs(), n))
        .fold((0.0f32, 0), |best, x| if x.0 > best.0 { x } else { best });
    assert!(worst < 0.07, "step of {worst} at sample {at}");
}
