//! Subscriber installation for binaries and tests embedding clientflow.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Formatter settings for `init_tracing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. `clientflow=debug`.
    #[serde(default = "default_filter")]
    pub default_filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json_format: bool,
    /// Include span enter/exit timings.
    #[serde(default)]
    pub with_span_events: bool,
}

fn default_filter() -> String {
    "clientflow=info".to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_filter: default_filter(),
            json_format: false,
            with_span_events: false,
        }
    }
}

impl TracingConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback filter.
    #[must_use]
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    /// Switches to JSON output.
    #[must_use]
    pub fn with_json_format(mut self, json: bool) -> Self {
        self.json_format = json;
        self
    }

    /// Builds the filter: `RUST_LOG` wins over the configured default.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Installs a global `fmt` subscriber.
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(config: &TracingConfig) -> bool {
    use tracing_subscriber::fmt::format::FmtSpan;

    let span_events = if config.with_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_span_events(span_events)
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: TracingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TracingConfig::default());
        assert_eq!(config.default_filter, "clientflow=info");
    }

    #[test]
    fn test_init_is_reentrant() {
        let config = TracingConfig::new().with_default_filter("clientflow=debug");
        init_tracing(&config);

        assert!(!init_tracing(&config));
    }
}
