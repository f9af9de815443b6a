//! saavy-render - render a demo scene to a WAV file
//!
//! Run with: cargo run --bin saavy-render -- --output demo.wav

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use hound::{SampleFormat, WavSpec, WavWriter};
use saavy_render::timing::Duration;
use saavy_render::{
    voices, AutomationCurve, EngineConfig, GraphDescription, Note, RenderEngine, SourceBuffer,
    TempoInterpolation, TimeUnit,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "saavy-render")]
#[command(about = "Render a tempo-synced demo scene offline", long_about = None)]
struct Cli {
    /// Output WAV file path
    #[arg(short, long, default_value = "saavy-render.wav")]
    output: PathBuf,

    /// Length of the render in beats
    #[arg(short, long, default_value = "16.0")]
    beats: f64,

    /// Sample rate in Hz
    #[arg(short, long, default_value = "44100")]
    sample_rate: u32,

    /// Frames per processing block (does not change the output)
    #[arg(long, default_value = "512")]
    block_size: usize,

    /// Tempo at the first beat
    #[arg(long, default_value = "120.0")]
    bpm: f64,

    /// Ramp linearly to this tempo by the last beat
    #[arg(long)]
    bpm_end: Option<f64>,

    /// Polyphony of the synth part
    #[arg(long, default_value = "8")]
    voices: usize,

    /// Transpose the drum loop, in semitones
    #[arg(long, default_value = "0.0")]
    transpose: f32,

    /// Also write an engine snapshot to this path
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

/// Tempo of the generated drum loop.
const LOOP_BPM: f64 = 100.0;
const LOOP_RATE: f64 = 22_050.0;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt().init();

    let cli = Cli::parse();
    let config = EngineConfig::default()
        .with_sample_rate(f64::from(cli.sample_rate))
        .with_block_size(cli.block_size)
        .with_bpm(cli.bpm)
        .with_tempo_interpolation(TempoInterpolation::Linear);

    let mut engine = RenderEngine::new(config)?;
    voices::register_builtins(engine.registry_mut());

    if let Some(end) = cli.bpm_end {
        let ticks = cli.beats.ceil().max(1.0) as usize;
        let bpms = (0..=ticks)
            .map(|i| cli.bpm + (end - cli.bpm) * i as f64 / ticks as f64)
            .collect();
        engine.set_bpm_curve(bpms, 1)?;
    }

    build_scene(&mut engine, &cli)?;
    engine.render(cli.beats, TimeUnit::Beats)?;

    let audio = engine.get_audio(None)?;
    write_wav(&cli.output, audio, cli.sample_rate)?;
    info!(
        path = %cli.output.display(),
        samples = audio.first().map_or(0, Vec::len),
        "wrote render"
    );

    if let Some(path) = &cli.snapshot {
        std::fs::write(path, engine.save()?)?;
        info!(path = %path.display(), "wrote snapshot");
    }
    Ok(())
}

fn build_scene(engine: &mut RenderEngine, cli: &Cli) -> color_eyre::Result<()> {
    // Chords: one per bar, held for a dotted half
    let progression: [[u8; 3]; 4] = [[60, 64, 67], [57, 60, 64], [53, 57, 60], [55, 59, 62]];

    engine.make_poly("keys", voices::SINE, cli.voices)?;
    engine.set_poly_effect("keys", voices::DRIVE)?;
    engine.set_parameter("keys", "voice/release", 0.4)?;
    engine.set_parameter("keys", "effect/drive", 2.5)?;
    engine.set_automation(
        "keys",
        "effect/mix",
        AutomationCurve::Ticks {
            ppqn: 1,
            values: vec![0.0, 0.25, 0.5, 0.75, 1.0],
        },
    )?;

    let bars = (cli.beats / 4.0).ceil() as usize;
    for bar in 0..bars {
        let chord = progression[bar % progression.len()];
        for pitch in chord {
            let start = bar as f64 * Duration::WHOLE.beats();
            let note = Note::new(pitch, 90, start, Duration::HALF.dotted().beats());
            engine.add_note("keys", note, TimeUnit::Beats)?;
        }
    }

    let source = Arc::new(drum_loop()?);
    let frames = source.num_frames() as f64;
    let drums = engine.make_warp("drums", source)?;
    drums.set_markers_from_bpm(LOOP_BPM)?;
    drums.set_loop(0.0, frames)?;
    engine.set_parameter("drums", "transpose", cli.transpose)?;

    engine.make_add("mix", 2)?;
    engine.make_gain("master", 0.8)?;
    engine.set_record_automation("keys", true)?;

    let graph = GraphDescription::new()
        .node("keys", &[])
        .node("drums", &[])
        .node("mix", &["keys", "drums"])
        .node("master", &["mix"]);
    engine.load_graph(graph)?;

    // Per-input gains exist once the mix knows its producers
    engine.set_parameter("mix", "input1/gain", 0.6)?;
    Ok(())
}

/// Two beats of kick and hat at `LOOP_BPM`, stereo.
fn drum_loop() -> color_eyre::Result<SourceBuffer> {
    let beat = (LOOP_RATE * 60.0 / LOOP_BPM) as usize;
    let mut samples = vec![0.0f32; beat * 2];

    for hit in 0..4 {
        let start = hit * beat / 2;
        let kick = hit % 2 == 0;
        let len = if kick { beat / 2 } else { beat / 8 };
        for (i, sample) in samples[start..start + len].iter_mut().enumerate() {
            let t = i as f64 / LOOP_RATE;
            let value = if kick {
                (std::f64::consts::TAU * 60.0 * t).sin() * (-t * 18.0).exp()
            } else {
                // cheap noise from a hashed index
                let n = ((i as u32).wrapping_mul(2_654_435_761) >> 16) as f64 / 32_768.0 - 1.0;
                n * 0.3 * (-t * 80.0).exp()
            };
            *sample = value as f32;
        }
    }

    Ok(SourceBuffer::new(vec![samples.clone(), samples], LOOP_RATE)?)
}

fn write_wav(path: &Path, audio: &[Vec<f32>], sample_rate: u32) -> color_eyre::Result<()> {
    let spec = WavSpec {
        channels: audio.len() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    let frames = audio.first().map_or(0, Vec::len);
    for frame in 0..frames {
        for channel in audio {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;
    Ok(())
}
