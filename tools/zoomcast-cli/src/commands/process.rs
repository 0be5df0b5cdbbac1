//! Post-process a recorded session.

use std::io::Write;
use std::path::{Path, PathBuf};

use zoomcast_common::AppConfig;
use zoomcast_render_engine::{process_session, PostProcessJob, PostProcessor, ProcessProgress};
use zoomcast_session_model::{EffectPass, QualityTier, SessionManifest};

use super::{effect_params, print_artifact, quality_tier};
use crate::EffectArgs;

fn session_job(
    manifest_path: &Path,
    output: Option<PathBuf>,
    quality: QualityTier,
) -> anyhow::Result<(String, PostProcessJob)> {
    let manifest = SessionManifest::load(manifest_path)
        .map_err(|e| anyhow::anyhow!("Failed to load session manifest: {e}"))?;
    if manifest.effect_pass == EffectPass::Live {
        anyhow::bail!(
            "session '{}' was recorded with the live effect; use `zoomcast mux` instead",
            manifest.name
        );
    }
    let output = output.unwrap_or_else(|| {
        manifest
            .raw_video
            .with_file_name(format!("{}.mp4", manifest.name))
    });
    let job = PostProcessJob::from_manifest(&manifest, output, quality);
    Ok((format!("session {}", manifest.name), job))
}

/// What to post-process.
pub enum Source {
    /// A session written by `zoomcast record`.
    Session(PathBuf),
    /// A continuous recording with its event log.
    Files {
        video: PathBuf,
        events: Option<PathBuf>,
        audio: Option<PathBuf>,
    },
}

pub async fn run(
    config: &AppConfig,
    source: Source,
    output: Option<PathBuf>,
    quality: Option<String>,
    keep_intermediates: bool,
    report: Option<PathBuf>,
    effects: &EffectArgs,
) -> anyhow::Result<()> {
    let quality = quality_tier(config, quality.as_deref())?;
    let params = effect_params(config, effects);

    let (label, mut job) = match source {
        Source::Session(manifest_path) => session_job(&manifest_path, output, quality)?,
        Source::Files {
            video,
            events,
            audio,
        } => {
            let output = output.unwrap_or_else(|| {
                let stem = video
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "recording".to_string());
                video.with_file_name(format!("{stem}_zoomed.mp4"))
            });
            let label = video.display().to_string();
            let job = PostProcessJob::from_files(video, events, audio, output, quality);
            (label, job)
        }
    };
    job.keep_intermediates = keep_intermediates;

    println!("Processing: {label}");
    println!("  Video: {}", job.video.display());
    println!("  Events: {}", job.events.display());
    match &job.audio {
        Some(audio) => println!("  Audio: {}", audio.display()),
        None => println!("  Audio: none"),
    }
    println!("  Output: {}", job.output.display());
    println!("  Timeline: {:?}", job.timeline);
    println!("  Quality: {quality}");
    println!(
        "  Zoom: max {:.2}, smoothing {:.2}, duration {:.2}s",
        params.zoom_max, params.smoothing, params.zoom_duration
    );

    let progress_cb: Box<dyn Fn(ProcessProgress) + Send> = Box::new(|p| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames, {} cut, ETA: {:.0}s)  ",
            p.progress * 100.0,
            p.frames_read,
            p.total_frames,
            p.frames_cut,
            p.eta_secs,
        );
        let _ = std::io::stdout().flush();
    });

    let outcome = process_session(PostProcessor::new(params), job, Some(progress_cb)).await;
    println!();
    let outcome = outcome?;

    println!(
        "Rendered {} of {} frames ({} cut by pauses, {:.1}s){}",
        outcome.report.frames_written,
        outcome.report.frames_read,
        outcome.report.frames_cut,
        outcome.report.output_secs(),
        if outcome.report.repaired {
            ", container repaired"
        } else {
            ""
        }
    );
    print_artifact(&outcome.artifact);

    if let Some(path) = report {
        outcome.report.save(&path)?;
        println!("Effect report: {}", path.display());
    }
    Ok(())
}
