//! Logging initialization for the `proflight` binary.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `HarnessConfig`. `RUST_LOG` takes precedence over the configured level.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use proflight_core::config::GeneralConfig;

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any scenario is spawned. Scenario
/// tasks log inside a `scenario` span, which the JSON format attaches to
/// every event so that interleaved output of parallel scenarios can be
/// split again.
///
/// # Arguments
///
/// * `config` - `[general]` section after env and CLI overrides
///   (`log_level`, `log_format`)
///
/// # Formats
///
/// * `"json"` - JSON lines, one object per event (CI log collectors)
/// * `"pretty"` - Human-readable multi-line output (local runs)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        other => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            ));
        }
    }

    Ok(())
}
