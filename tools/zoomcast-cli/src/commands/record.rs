//! Record a session, then post-process it.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use zoomcast_capture_engine::{RecordingSession, SessionConfig, SessionState};
use zoomcast_common::AppConfig;
use zoomcast_effect_core::EffectParams;
use zoomcast_render_engine::{process_session, EncoderGateway, PostProcessJob, PostProcessor};
use zoomcast_session_model::{CaptureRegion, EffectPass, QualityTier, SessionManifest};

use super::{effect_params, print_artifact, quality_tier};
use crate::EffectArgs;

pub struct RecordArgs {
    pub name: Option<String>,
    pub output: Option<PathBuf>,
    pub fps: Option<u32>,
    pub region: Option<String>,
    pub audio: Option<String>,
    pub system_gain: Option<f32>,
    pub mic_gain: Option<f32>,
    pub quality: Option<String>,
    pub live: bool,
    pub no_process: bool,
    pub effects: EffectArgs,
}

pub async fn run(mut config: AppConfig, args: RecordArgs) -> anyhow::Result<()> {
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(fps) = args.fps {
        config.recording.fps = fps;
    }
    if let Some(audio) = &args.audio {
        config.recording.audio_mode = audio.clone();
    }
    if let Some(gain) = args.system_gain {
        config.recording.system_gain = gain;
    }
    if let Some(gain) = args.mic_gain {
        config.recording.mic_gain = gain;
    }
    if args.live {
        config.recording.live_effects = true;
    }
    let quality = quality_tier(&config, args.quality.as_deref())?;
    let params = effect_params(&config, &args.effects);

    let mut session_config = SessionConfig::from_app_config(&config)?;
    session_config.effects = params;
    if let Some(name) = args.name {
        session_config.name = name;
    }
    if let Some(region) = &args.region {
        let region: CaptureRegion = region.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        session_config.region = Some(region);
    }

    println!("Starting recording session: {}", session_config.name);
    println!("  Output: {}", session_config.output_dir.display());
    println!("  FPS: {}", session_config.fps);
    println!("  Audio: {}", session_config.audio.mode);
    match &session_config.region {
        Some(r) => println!("  Region: {}x{} at ({}, {})", r.width, r.height, r.left, r.top),
        None => println!("  Region: full screen"),
    }
    println!("  Effect: {:?}", session_config.effect_pass);
    println!();

    let mut session = RecordingSession::new(session_config);
    session.start().await?;

    println!("Recording. Type p + Enter to pause/resume, q + Enter or Ctrl+C to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => match line.trim() {
                        "p" => match session.toggle_pause() {
                            Ok(SessionState::Paused) => println!("Paused."),
                            Ok(_) => println!("Resumed."),
                            Err(e) => println!("Cannot pause yet: {e}"),
                        },
                        "q" => break,
                        "" => {}
                        other => println!("Unknown command '{other}' (p = pause/resume, q = stop)"),
                    },
                    // stdin closed: keep recording until Ctrl+C
                    Ok(None) => {
                        tokio::signal::ctrl_c().await?;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed reading stdin");
                        tokio::signal::ctrl_c().await?;
                        break;
                    }
                }
            }
        }
    }

    println!();
    let manifest = session.stop().await?;
    println!(
        "Recorded {:.1}s ({} frames, {:.1}s paused)",
        manifest.active_secs, manifest.frames_written, manifest.paused_secs
    );
    println!(
        "Session manifest: {}",
        SessionManifest::path_for(&config.output_dir, &manifest.name).display()
    );

    if args.no_process {
        println!("Skipping post-processing. Run `zoomcast process` on the manifest later.");
        return Ok(());
    }

    let output = config.output_dir.join(format!("{}.mp4", manifest.name));
    finish(&manifest, output, quality, params).await
}

async fn finish(
    manifest: &SessionManifest,
    output: PathBuf,
    quality: QualityTier,
    params: EffectParams,
) -> anyhow::Result<()> {
    match manifest.effect_pass {
        // The raw video already carries the effect; only mux it.
        EffectPass::Live => {
            let video = manifest.raw_video.clone();
            let audio = manifest.audio.clone();
            let artifact = tokio::task::spawn_blocking(move || {
                EncoderGateway::new().mux(&video, audio.as_deref(), quality, &output)
            })
            .await??;
            print_artifact(&artifact);
        }
        EffectPass::Offline => {
            println!("Post-processing...");
            let job = PostProcessJob::from_manifest(manifest, output, quality);
            let outcome = process_session(PostProcessor::new(params), job, None).await?;
            println!(
                "Rendered {} frames ({} cut by pauses)",
                outcome.report.frames_written, outcome.report.frames_cut
            );
            print_artifact(&outcome.artifact);
        }
    }
    Ok(())
}
