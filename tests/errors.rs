//! Every failure is reported before audio is produced, with the right kind.

use std::sync::Arc;

use saavy_render::graph::warp::{ClipPlacement, WarpMarker};
use saavy_render::{
    voices, AutomationCurve, EngineConfig, EngineError, EngineState, ErrorKind, GraphDescription,
    Note, OscillatorNode, RenderEngine, SourceBuffer, TimeUnit,
};

fn engine() -> RenderEngine {
    let mut engine = RenderEngine::new(EngineConfig::default()).unwrap();
    voices::register_builtins(engine.registry_mut());
    engine.make_oscillator("a", 100.0, 2).unwrap();
    engine.make_gain("b", 1.0).unwrap();
    engine.make_add("c", 2).unwrap();
    engine
}

fn source() -> Arc<SourceBuffer> {
    Arc::new(SourceBuffer::mono(vec![0.5; 100], 44_100.0).unwrap())
}

#[test]
fn configuration_errors() {
    let mut engine = engine();

    let cycle = GraphDescription::new()
        .node("a", &[])
        .node("b", &["c"])
        .node("c", &["b"]);
    assert_eq!(engine.load_graph(cycle).unwrap_err().kind(), ErrorKind::Configuration);

    let duplicate = GraphDescription::new().node("a", &[]).node("a", &[]);
    assert_eq!(
        engine.load_graph(duplicate).unwrap_err().kind(),
        ErrorKind::Configuration
    );

    assert_eq!(engine.set_bpm(0.0).unwrap_err().kind(), ErrorKind::Configuration);
    assert_eq!(
        engine.set_bpm_curve(vec![120.0, f64::NAN], 4).unwrap_err().kind(),
        ErrorKind::Configuration
    );
    assert_eq!(
        engine.set_bpm_curve(vec![120.0], 0).unwrap_err().kind(),
        ErrorKind::Configuration
    );
    assert_eq!(
        engine.set_bpm_curve(Vec::new(), 4).unwrap_err().kind(),
        ErrorKind::Configuration
    );

    assert_eq!(
        engine
            .set_automation("a", "freq", AutomationCurve::PerSample(Vec::new()))
            .unwrap_err()
            .kind(),
        ErrorKind::Configuration
    );
    assert_eq!(
        engine
            .add_note("a", Note::new(128, 1, 0.0, 1.0), TimeUnit::Beats)
            .unwrap_err()
            .kind(),
        ErrorKind::Configuration
    );

    let warp = engine.make_warp("w", source()).unwrap();
    let markers = vec![WarpMarker::new(0.0, 0.0), WarpMarker::new(0.0, 1.0)];
    assert_eq!(warp.set_warp_markers(markers).unwrap_err().kind(), ErrorKind::Configuration);
    assert!(matches!(
        warp.set_warp_markers(vec![WarpMarker::new(0.0, 0.0)]).unwrap_err(),
        EngineError::TooFewWarpMarkers { count: 1 }
    ));
    let overlapping = vec![ClipPlacement::new(0.0, 2.0, 0.0), ClipPlacement::new(1.0, 3.0, 0.0)];
    assert_eq!(warp.set_clips(overlapping).unwrap_err().kind(), ErrorKind::Configuration);
    assert_eq!(warp.set_loop(10.0, 5.0).unwrap_err().kind(), ErrorKind::Configuration);
    assert_eq!(
        warp.set_interpolation_order(8).unwrap_err().kind(),
        ErrorKind::Configuration
    );

    assert!(RenderEngine::new(EngineConfig::default().with_block_size(0)).is_err());
}

#[test]
fn resource_errors() {
    let mut engine = engine();

    let unknown = GraphDescription::new().node("a", &[]).node("b", &["ghost"]);
    assert_eq!(
        engine.load_graph(unknown).unwrap_err(),
        EngineError::UnknownProducer {
            consumer: "b".into(),
            producer: "ghost".into()
        }
    );
    assert_eq!(
        engine.make_poly("p", "theremin", 4).unwrap_err(),
        EngineError::MissingInstrument {
            key: "theremin".into()
        }
    );
    assert_eq!(
        engine.set_parameter("a", "cutoff", 1.0).unwrap_err().kind(),
        ErrorKind::Resource
    );
    assert_eq!(
        engine.processor::<OscillatorNode>("b").unwrap_err().kind(),
        ErrorKind::Resource
    );
    assert_eq!(
        engine.remove_processor("ghost").unwrap_err().kind(),
        ErrorKind::Resource
    );
}

#[test]
fn render_errors_leave_no_output() {
    let mut engine = engine();
    assert_eq!(
        engine.render(1.0, TimeUnit::Seconds).unwrap_err().kind(),
        ErrorKind::Render
    );

    engine
        .load_graph(GraphDescription::new().node("a", &[]).node("b", &["a"]))
        .unwrap();
    engine.render(0.01, TimeUnit::Seconds).unwrap();
    assert!(engine.get_audio(None).is_ok());

    // Bad durations fail without touching the previous render
    assert_eq!(
        engine.render(-1.0, TimeUnit::Seconds).unwrap_err().kind(),
        ErrorKind::Configuration
    );
    assert_eq!(engine.state(), EngineState::Rendered);

    engine.remove_processor("c").unwrap();
    assert_eq!(engine.state(), EngineState::Unloaded);
    assert_eq!(
        engine.render(0.01, TimeUnit::Seconds).unwrap_err(),
        EngineError::GraphNotLoaded
    );
}

#[test]
fn channel_mismatches_are_caught_at_load() {
    let mut engine = engine();
    engine.make_oscillator("mono", 100.0, 1).unwrap();
    let graph = GraphDescription::new()
        .node("a", &[])
        .node("mono", &[])
        .node("c", &["a", "mono"]);
    assert_eq!(
        engine.load_graph(graph).unwrap_err(),
        EngineError::ChannelMismatch {
            node: "c".into(),
            expected: 2,
            actual: 3
        }
    );
}

#[test]
fn zero_channel_nodes_are_rejected() {
    let mut engine = engine();
    assert_eq!(
        engine.make_add("bus", 0).unwrap_err(),
        EngineError::InvalidChannelCount { channels: 0 }
    );
    assert_eq!(
        engine.make_oscillator("tone", 440.0, 0).unwrap_err().kind(),
        ErrorKind::Configuration
    );
    assert!(!engine.has_node("bus"));
    assert!(!engine.has_node("tone"));

    let warp = engine.make_warp("clip", source()).unwrap();
    assert_eq!(
        warp.set_time_ratio(0.0).unwrap_err(),
        EngineError::InvalidTimeRatio { ratio: 0.0 }
    );
}

#[test]
fn errors_display_and_convert() {
    let err = EngineError::UnknownNode { name: "x".into() };
    assert!(err.to_string().contains('x'));
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
    assert!(!boxed.to_string().is_empty());
}
