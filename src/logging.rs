//! Tracing subscriber setup

use std::str::FromStr;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// A bare level gets quieter defaults for the transport crates; directive
/// strings (containing `,` or `=`) are used as given.
pub fn filter_spec(level: &str) -> String {
    let level = level.trim();
    if level.contains(',') || level.contains('=') {
        level.to_string()
    } else {
        format!("{level},hyper=info,rustls=info,tungstenite=info,ethers_providers=warn")
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    let spec = filter_spec(&config.level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&spec))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_output {
        registry
            .with(fmt::layer().json().with_target(false).with_current_span(false))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(true).compact())
            .try_init()?;
    }

    tracing::debug!(filter = %spec, json = config.json_output, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_level_gets_defaults() {
        let spec = filter_spec(" debug ");
        assert!(spec.starts_with("debug,"));
        assert!(spec.contains("hyper=info"));
    }

    #[test]
    fn test_directives_kept_verbatim() {
        assert_eq!(filter_spec("mev_sentinel=trace,info"), "mev_sentinel=trace,info");
    }
}
