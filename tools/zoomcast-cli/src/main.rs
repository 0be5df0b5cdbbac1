//! zoomcast CLI: record the screen and render the smart-zoom effect.
//!
//! Usage:
//!   zoomcast record [OPTIONS]          Record a session, then post-process it
//!   zoomcast process <MANIFEST>        Post-process a recorded session
//!   zoomcast process --video <FILE>    Post-process a continuous recording
//!   zoomcast mux <VIDEO> -o <OUTPUT>   Mux a video with optional audio
//!   zoomcast devices                   List audio input devices
//!   zoomcast check                     Check system capabilities

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "zoomcast",
    about = "Screen recording with click-driven smart zoom",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Effect overrides shared by `record` and `process`.
#[derive(Args, Debug, Clone, Default)]
pub struct EffectArgs {
    /// Maximum zoom factor while a click is active
    #[arg(long)]
    zoom_max: Option<f64>,

    /// Smoothing factor per frame (0, 1]
    #[arg(long)]
    smoothing: Option<f64>,

    /// Seconds the zoom stays on a click
    #[arg(long)]
    zoom_duration: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a session; `p`+Enter toggles pause, `q`+Enter or Ctrl+C stops
    Record {
        /// Session name (default: Record_<timestamp>)
        #[arg(short, long)]
        name: Option<String>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target FPS
        #[arg(long)]
        fps: Option<u32>,

        /// Region as left,top,width,height or WxH+X+Y (default: full screen)
        #[arg(long)]
        region: Option<String>,

        /// Audio mode: none|system|microphone|both
        #[arg(long)]
        audio: Option<String>,

        /// System audio gain [0.0, 3.0]
        #[arg(long)]
        system_gain: Option<f32>,

        /// Microphone gain [0.0, 3.0]
        #[arg(long)]
        mic_gain: Option<f32>,

        /// Output quality: low|medium|high
        #[arg(long)]
        quality: Option<String>,

        /// Apply the zoom while recording instead of afterwards
        #[arg(long)]
        live: bool,

        /// Keep the raw files only; skip post-processing
        #[arg(long)]
        no_process: bool,

        #[command(flatten)]
        effects: EffectArgs,
    },

    /// Post-process a recorded session, or any continuous recording plus its event log
    Process {
        /// Path to <name>_session.json
        #[arg(required_unless_present = "video", conflicts_with = "video")]
        manifest: Option<PathBuf>,

        /// Continuous recording to process instead of a session; paused spans are cut
        #[arg(long)]
        video: Option<PathBuf>,

        /// Event log for --video (default: <name>_events.json beside it)
        #[arg(long, requires = "video")]
        events: Option<PathBuf>,

        /// Audio to mux with --video
        #[arg(long, requires = "video")]
        audio: Option<PathBuf>,

        /// Output file path (default: <dir>/<name>.mp4, or <stem>_zoomed.mp4 with --video)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output quality: low|medium|high
        #[arg(long)]
        quality: Option<String>,

        /// Keep the silent processed video and any repaired container
        #[arg(long)]
        keep_intermediates: bool,

        /// Write the per-frame effect report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        effects: EffectArgs,
    },

    /// Mux a video with optional audio into the final container
    Mux {
        /// Input video
        video: PathBuf,

        /// Input audio (WAV)
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Output quality: low|medium|high
        #[arg(long)]
        quality: Option<String>,
    },

    /// List audio input devices
    Devices,

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = zoomcast_common::AppConfig::load();
    zoomcast_common::logging::init_cli_logging(&config.logging, cli.verbose);

    match cli.command {
        Commands::Record {
            name,
            output,
            fps,
            region,
            audio,
            system_gain,
            mic_gain,
            quality,
            live,
            no_process,
            effects,
        } => {
            commands::record::run(
                config,
                commands::record::RecordArgs {
                    name,
                    output,
                    fps,
                    region,
                    audio,
                    system_gain,
                    mic_gain,
                    quality,
                    live,
                    no_process,
                    effects,
                },
            )
            .await
        }
        Commands::Process {
            manifest,
            video,
            events,
            audio,
            output,
            quality,
            keep_intermediates,
            report,
            effects,
        } => {
            let source = match (manifest, video) {
                (Some(manifest), _) => commands::process::Source::Session(manifest),
                (None, Some(video)) => commands::process::Source::Files {
                    video,
                    events,
                    audio,
                },
                (None, None) => anyhow::bail!("either a session manifest or --video is required"),
            };
            commands::process::run(
                &config,
                source,
                output,
                quality,
                keep_intermediates,
                report,
                &effects,
            )
            .await
        }
        Commands::Mux {
            video,
            audio,
            output,
            quality,
        } => commands::mux::run(&config, video, audio, output, quality),
        Commands::Devices => commands::devices::run(),
        Commands::Check => commands::check::run(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_accepts_a_continuous_recording() {
        let cli = Cli::try_parse_from([
            "zoomcast",
            "process",
            "--video",
            "clip.mp4",
            "--events",
            "clip_events.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Process {
                manifest,
                video,
                events,
                audio,
                ..
            } => {
                assert!(manifest.is_none());
                assert_eq!(video, Some(PathBuf::from("clip.mp4")));
                assert_eq!(events, Some(PathBuf::from("clip_events.json")));
                assert!(audio.is_none());
            }
            _ => panic!("expected process"),
        }
    }

    #[test]
    fn test_process_needs_a_manifest_or_video() {
        assert!(Cli::try_parse_from(["zoomcast", "process"]).is_err());
        assert!(Cli::try_parse_from(["zoomcast", "process", "--events", "e.json"]).is_err());
        assert!(Cli::try_parse_from(["zoomcast", "process", "s.json"]).is_ok());
    }
}
