use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            ansi: true,
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> tracing::Level {
        self.level
            .trim()
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO)
    }
}

/// Installs the global subscriber. `RUST_LOG` directives are honoured on top of
/// the configured level. Returns false when a subscriber was already set.
pub fn setup_logging(cfg: &LoggingConfig) -> bool {
    let env_filter = EnvFilter::from_default_env().add_directive(cfg.level().into());

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(cfg.ansi)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_with_fallback() {
        let debug = LoggingConfig {
            level: " debug ".to_string(),
            ..LoggingConfig::default()
        };
        let bogus = LoggingConfig {
            level: "chatty".to_string(),
            ..LoggingConfig::default()
        };

        assert_eq!(debug.level(), tracing::Level::DEBUG);
        assert_eq!(bogus.level(), tracing::Level::INFO);
    }

    #[test]
    fn second_initialization_is_tolerated() {
        let cfg = LoggingConfig {
            ansi: false,
            ..LoggingConfig::default()
        };

        setup_logging(&cfg);
        assert!(!setup_logging(&cfg));
    }
}
