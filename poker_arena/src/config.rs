//! Engine configuration.
//!
//! Consolidates the environment variable reads for table and competition
//! timing and provides validated configuration.

use crate::table::TableEngineOptions;
use std::time::Duration;

/// Timing knobs of a competition engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitionEngineOptions {
    /// Delay between a table settling and applying its settlement
    pub settle_delay: Duration,
}

impl Default for CompetitionEngineOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Options handed to every table created for a competition
    pub table: TableEngineOptions,
    pub competition: CompetitionEngineOptions,
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to the defaults.
    ///
    /// # Returns
    ///
    /// * `Result<EngineConfig, ConfigError>` - Loaded and validated configuration
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let table = TableEngineOptions {
            interval: parse_env_millis_or("TABLE_CONTINUE_INTERVAL_MS", defaults.table.interval),
            open_game_retries: parse_env_or(
                "TABLE_OPEN_GAME_RETRIES",
                defaults.table.open_game_retries,
            ),
            open_game_retry_delay: parse_env_millis_or(
                "TABLE_OPEN_GAME_RETRY_DELAY_MS",
                defaults.table.open_game_retry_delay,
            ),
            join_timeout: parse_env_millis_or(
                "TABLE_JOIN_TIMEOUT_MS",
                defaults.table.join_timeout,
            ),
        };

        let competition = CompetitionEngineOptions {
            settle_delay: parse_env_millis_or(
                "COMPETITION_SETTLE_DELAY_MS",
                defaults.competition.settle_delay,
            ),
        };

        let config = Self { table, competition };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.join_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "TABLE_JOIN_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.table.open_game_retries > 0 && self.table.open_game_retry_delay.is_zero() {
            return Err(ConfigError::Invalid {
                var: "TABLE_OPEN_GAME_RETRY_DELAY_MS".to_string(),
                reason: format!(
                    "Must be greater than 0 when retries are enabled ({})",
                    self.table.open_game_retries
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_millis_or(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
