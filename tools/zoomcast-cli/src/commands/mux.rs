//! Mux a video with optional audio.

use std::path::PathBuf;

use zoomcast_common::AppConfig;
use zoomcast_render_engine::EncoderGateway;

use super::{print_artifact, quality_tier};

pub fn run(
    config: &AppConfig,
    video: PathBuf,
    audio: Option<PathBuf>,
    output: PathBuf,
    quality: Option<String>,
) -> anyhow::Result<()> {
    let quality = quality_tier(config, quality.as_deref())?;
    println!("Muxing {} -> {}", video.display(), output.display());

    let gateway = EncoderGateway::new();
    if !gateway.is_available() {
        println!("  [WARN] {} not found; the video will be moved into place as-is", gateway.binary());
    }
    let artifact = gateway.mux(&video, audio.as_deref(), quality, &output)?;
    print_artifact(&artifact);
    Ok(())
}
