///! Logging setup
///!
///! Everything goes to stderr: stdout is reserved for command output such as
///! the kubeconfig path printed by `ks select`.

use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_json(mut self, json_format: bool) -> Self {
        self.json_format = json_format;
        self
    }

    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    }

    pub fn init(&self) -> anyhow::Result<()> {
        let layer = if self.json_format {
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(io::stderr)
                .boxed()
        } else {
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_ansi(true)
                .with_writer(io::stderr)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(self.filter())
            .with(layer)
            .try_init()?;

        tracing::debug!(level = %self.level, "logging initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_level_falls_back() {
        let config = LoggingConfig::new("not a [valid filter");
        // Must not panic
        let _ = config.filter();
    }

    #[test]
    fn test_default_is_quiet() {
        assert_eq!(LoggingConfig::default().level, "warn");
        assert!(!LoggingConfig::default().json_format);
    }

    #[test]
    fn test_json_switch() {
        let config = LoggingConfig::new("debug").with_json(true);
        assert!(config.json_format);
        assert_eq!(config.level, "debug");
    }
}
