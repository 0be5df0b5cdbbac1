//! Check system capabilities.

use zoomcast_audio_capture::{AudioBackend, CpalBackend};
use zoomcast_capture_engine::probe_screen_size;
use zoomcast_common::config::config_file_path;
use zoomcast_common::ffmpeg::{command_exists, ffmpeg_binary, ffprobe_binary};
use zoomcast_common::AppConfig;
use zoomcast_input_tracker::backends::detect_best_backend;
use zoomcast_input_tracker::InputBackend;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("zoomcast System Check");
    println!("{}", "=".repeat(50));

    let ffmpeg = ffmpeg_binary();
    let ffmpeg_ok = command_exists(&ffmpeg);
    if ffmpeg_ok {
        println!("[OK] Encoder: {ffmpeg}");
    } else {
        println!("[FAIL] Encoder not found: {ffmpeg} (set ZOOMCAST_FFMPEG or install ffmpeg)");
    }

    let ffprobe = ffprobe_binary();
    if command_exists(&ffprobe) {
        println!("[OK] ffprobe: {ffprobe}");
    } else {
        println!("[WARN] ffprobe not found: {ffprobe}; screen size falls back to 1920x1080");
    }

    let (width, height) = probe_screen_size();
    println!("[OK] Screen: {width}x{height}");

    let audio = CpalBackend::new();
    if audio.is_available() {
        let devices = audio.input_devices().map(|d| d.len()).unwrap_or(0);
        println!("[OK] Audio host: {} ({devices} input devices)", audio.name());
    } else {
        println!("[WARN] Audio host unavailable; recordings will be silent");
    }

    let input = detect_best_backend((width, height));
    if input.is_available() {
        println!("[OK] Pointer input: {}", input.name());
    } else {
        println!("[WARN] Pointer input unavailable; no zoom events will be recorded");
    }

    println!();
    println!("Config: {}", config_file_path().display());
    println!("  Output dir: {}", config.output_dir.display());
    println!(
        "  Defaults: {} fps, audio {}, quality {}",
        config.recording.fps, config.recording.audio_mode, config.recording.quality
    );

    println!();
    if ffmpeg_ok {
        println!("zoomcast is ready.");
    } else {
        println!("ffmpeg is required for recording. See above for fixes.");
    }
    Ok(())
}
