use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use zoomcast_audio_capture::SyntheticBackend;
use zoomcast_audio_capture::AudioSettings;
use zoomcast_capture_engine::{
    MemorySink, RecordingSession, SessionConfig, SessionState, SyntheticFrameSource,
};
use zoomcast_input_tracker::backends::ScriptedBackend;
use zoomcast_input_tracker::{PointerButton, PointerSample};
use zoomcast_session_model::{
    load_events, AudioMode, EffectPass, EventKind, SessionManifest, VideoTimeline,
};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("zoomcast-session-it-{}-{name}", std::process::id()))
}

fn config(name: &str) -> SessionConfig {
    SessionConfig {
        name: name.to_string(),
        output_dir: temp_dir(name),
        fps: 30,
        audio: AudioSettings::new(AudioMode::System, 48000, 2, 1.0, 1.0).unwrap(),
        effect_pass: EffectPass::Offline,
        join_timeout: Duration::from_secs(2),
        ..SessionConfig::default()
    }
}

fn system_only_backend() -> SyntheticBackend {
    let mut backend = SyntheticBackend::standard();
    backend.microphone = None;
    backend
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recording_with_pause_writes_every_artifact() {
    let sink = MemorySink::new();
    let frames = sink.frames();
    let finished = sink.finished_flag();
    let script = vec![
        (
            Duration::from_millis(150),
            PointerSample::Move { x: 40.0, y: 30.0 },
        ),
        (
            Duration::from_millis(200),
            PointerSample::Click {
                x: 40.0,
                y: 30.0,
                button: PointerButton::Left,
            },
        ),
    ];

    let mut session = RecordingSession::new(config("pause"))
        .with_frame_source(Box::new(SyntheticFrameSource::new(160, 90, 30)))
        .with_frame_sink(Box::new(sink))
        .with_audio_backend(Arc::new(system_only_backend()))
        .with_input_backend(Box::new(ScriptedBackend::new(script)));

    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Recording);
    assert_eq!(session.audio_mode(), AudioMode::System);

    tokio::time::sleep(Duration::from_millis(500)).await;
    session.pause().unwrap();
    assert_eq!(session.state(), SessionState::Paused);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(session.toggle_pause().unwrap(), SessionState::Recording);
    tokio::time::sleep(Duration::from_millis(400)).await;

    let manifest = session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Stopped);

    assert_eq!(manifest.timeline, VideoTimeline::ActiveOnly);
    assert_eq!((manifest.width, manifest.height), (160, 90));
    assert!(*finished.lock());
    assert_eq!(frames.lock().len() as u64, manifest.frames_written);
    assert!(
        (manifest.active_secs - 0.9).abs() < 0.25,
        "active {}",
        manifest.active_secs
    );
    assert!(
        (manifest.paused_secs - 0.4).abs() < 0.15,
        "paused {}",
        manifest.paused_secs
    );
    let expected_frames = manifest.active_secs * 30.0;
    assert!((manifest.frames_written as f64 - expected_frames).abs() <= 4.0);

    let events = load_events(&manifest.events).unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, EventKind::Click { .. })));
    assert!(events.iter().any(|e| e.kind == EventKind::PauseStart));
    assert!(events.iter().any(|e| e.kind == EventKind::PauseEnd));

    let audio = manifest.audio.clone().expect("system audio should be written");
    assert!(audio.exists());

    let reloaded = SessionManifest::load(&SessionManifest::path_for(
        &temp_dir("pause"),
        "pause",
    ))
    .unwrap();
    assert_eq!(reloaded.frames_written, manifest.frames_written);

    let _ = std::fs::remove_dir_all(temp_dir("pause"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unavailable_audio_degrades_to_video_only() {
    let mut session = RecordingSession::new(config("noaudio"))
        .with_frame_source(Box::new(SyntheticFrameSource::new(64, 48, 30)))
        .with_frame_sink(Box::new(MemorySink::new()))
        .with_audio_backend(Arc::new(SyntheticBackend::unavailable()))
        .with_input_backend(Box::new(ScriptedBackend::empty()));

    session.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let manifest = session.stop().await.unwrap();

    assert_eq!(manifest.audio_mode, AudioMode::None);
    assert!(manifest.audio.is_none());
    assert!(manifest.frames_written > 0);

    let _ = std::fs::remove_dir_all(temp_dir("noaudio"));
}

#[tokio::test]
async fn pause_before_start_is_rejected() {
    let mut session = RecordingSession::new(config("idle"));
    assert!(session.pause().is_err());
    assert!(session.stop().await.is_err());
}
