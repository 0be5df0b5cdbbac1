//! Tracing setup for the recorder and its tools.
//!
//! Log lines go to stderr so that progress output printed on stdout by the
//! command-line front end stays readable while a session is recording.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Directive used when `--verbose` is passed and `RUST_LOG` is unset.
const VERBOSE_DIRECTIVE: &str = "zoomcast=debug,info";

/// Pick the filter directive: `RUST_LOG` wins, then verbosity, then config.
fn filter_directive(config: &LoggingConfig, verbose: bool, env: Option<String>) -> String {
    match env {
        Some(directive) if !directive.trim().is_empty() => directive,
        _ if verbose => VERBOSE_DIRECTIVE.to_string(),
        _ => config.level.clone(),
    }
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("invalid log filter '{directive}' ({e}), falling back to info");
        EnvFilter::new("info")
    })
}

/// Install the global subscriber for a command-line run. A second call is
/// ignored.
pub fn init_cli_logging(config: &LoggingConfig, verbose: bool) {
    let directive = filter_directive(config, verbose, std::env::var("RUST_LOG").ok());
    let filter = build_filter(&directive);
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        let subscriber = builder.json().with_current_span(false).finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = builder
            .with_target(verbose)
            .with_thread_names(verbose)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            json: false,
        }
    }

    #[test]
    fn test_env_overrides_everything() {
        let directive = filter_directive(&config("warn"), true, Some("trace".into()));
        assert_eq!(directive, "trace");
    }

    #[test]
    fn test_blank_env_is_ignored() {
        assert_eq!(filter_directive(&config("warn"), false, Some("  ".into())), "warn");
    }

    #[test]
    fn test_verbose_beats_config() {
        assert_eq!(filter_directive(&config("warn"), true, None), VERBOSE_DIRECTIVE);
    }

    #[test]
    fn test_config_level_is_default() {
        assert_eq!(filter_directive(&config("error"), false, None), "error");
    }
}
