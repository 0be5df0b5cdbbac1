pub mod check;
pub mod devices;
pub mod mux;
pub mod process;
pub mod record;

use zoomcast_common::AppConfig;
use zoomcast_effect_core::EffectParams;
use zoomcast_session_model::QualityTier;

use crate::EffectArgs;

/// Effect parameters from the config file with command-line overrides.
pub fn effect_params(config: &AppConfig, args: &EffectArgs) -> EffectParams {
    EffectParams {
        zoom_max: args.zoom_max.unwrap_or(config.effects.zoom_max),
        smoothing: args.smoothing.unwrap_or(config.effects.smoothing),
        zoom_duration: args.zoom_duration.unwrap_or(config.effects.zoom_duration),
    }
    .sanitized()
}

/// Quality tier from the flag, else the config file.
pub fn quality_tier(config: &AppConfig, flag: Option<&str>) -> anyhow::Result<QualityTier> {
    flag.unwrap_or(&config.recording.quality)
        .parse::<QualityTier>()
        .map_err(|e| anyhow::anyhow!(e))
}

pub fn print_artifact(artifact: &zoomcast_render_engine::RenderedArtifact) {
    println!("Output: {}", artifact.path.display());
    if artifact.degraded {
        println!("  [WARN] Encoder unavailable or failed; video saved without re-encoding or audio");
    } else if !artifact.audio_included {
        println!("  (no audio track)");
    }
}
