//! Engine configuration.

use std::env;
use std::str::FromStr;

/// Scoring configuration for the result engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether the higher score wins a matchup (false: lower score wins,
    /// e.g. golf or race times)
    pub higher_score_wins: bool,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Expected environment variables:
    /// - `HIGHER_SCORE_WINS`: "true" or "false" (default: true)
    pub fn from_env() -> Self {
        Self {
            higher_score_wins: parse_env_or("HIGHER_SCORE_WINS", true),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            higher_score_wins: true,
        }
    }
}

/// Helper to parse an environment variable with a default fallback
fn parse_env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
