//! Tracing subscriber setup shared by the server and the CLI.

use anyhow::anyhow;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dbinit_kernel::settings::{LogFormat, TelemetrySettings};

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
///
/// Output goes to stderr so stdout stays free for result documents.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = resolve_filter(settings)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match settings.log_format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true),
            )
            .try_init(),
    };

    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

fn resolve_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.log_filter)
            .map_err(|e| anyhow!("invalid log filter '{}': {e}", settings.log_filter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_filter() {
        let settings = TelemetrySettings {
            log_format: LogFormat::Json,
            log_filter: "dbinit=loud".to_string(),
        };
        if std::env::var("RUST_LOG").is_err() {
            assert!(resolve_filter(&settings).is_err());
        }
    }

    #[test]
    fn accepts_directive_filter() {
        let settings = TelemetrySettings {
            log_format: LogFormat::Pretty,
            log_filter: "info,dbinit_db=debug,sqlx=warn".to_string(),
        };
        assert!(resolve_filter(&settings).is_ok());
    }
}
