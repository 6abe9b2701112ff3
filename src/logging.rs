//! Logging setup
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` built from the
//! configured level and a plain fmt layer.

use dingilink_core::LoggingConfig;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Filter for `level`, falling back to `warn` when it does not parse
pub fn filter_for(level: &str) -> EnvFilter {
    match EnvFilter::try_new(level) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("It looks like your log level is invalid, falling back to warn: {e}");
            EnvFilter::new("warn")
        }
    }
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let fmt_layer = tracing_subscriber::fmt::layer();
    tracing_subscriber::registry()
        .with(filter_for(&config.level))
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back_to_warn() {
        assert_eq!(
            filter_for("dingilink=notalevel").to_string(),
            EnvFilter::new("warn").to_string()
        );
        assert_eq!(
            filter_for("dingilink=debug").to_string(),
            EnvFilter::new("dingilink=debug").to_string()
        );
    }

    #[test]
    fn test_second_init_is_refused() {
        let config = LoggingConfig::default();
        init(&config);
        assert!(!init(&config));
    }
}
