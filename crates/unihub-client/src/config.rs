//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client starts with zero configuration.

use std::path::PathBuf;
use std::time::Duration;

use unihub_shared::constants::{DEFAULT_PORT, JOIN_TIMEOUT_MS, PROMOTION_SETTLE_MS};
use unihub_store::Database;

use crate::error::SessionError;

/// Delays the room controller arms its timers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// A join attempt with no verdict by then is abandoned.
    pub join_timeout: Duration,
    /// Pause between accepting a secondary-host offer and telling the gateway.
    pub promotion_settle: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_millis(JOIN_TIMEOUT_MS),
            promotion_settle: Duration::from_millis(PROMOTION_SETTLE_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory holding `unihub.db`.
    /// Env: `UNIHUB_DATA_DIR`
    /// Default: the platform data directory.
    pub data_dir: Option<PathBuf>,

    /// Env: `UNIHUB_JOIN_TIMEOUT_MS`, `UNIHUB_PROMOTION_SETTLE_MS`
    pub timings: SessionTimings,

    /// Port used by host and join intents that name none.
    /// Env: `UNIHUB_DEFAULT_PORT`
    /// Default: `25565`
    pub default_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            timings: SessionTimings::default(),
            default_port: DEFAULT_PORT,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("UNIHUB_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(val) = lookup("UNIHUB_JOIN_TIMEOUT_MS") {
            match parse_millis(&val) {
                Some(delay) => config.timings.join_timeout = delay,
                None => tracing::warn!(value = %val, "Invalid UNIHUB_JOIN_TIMEOUT_MS, using default"),
            }
        }

        if let Some(val) = lookup("UNIHUB_PROMOTION_SETTLE_MS") {
            match parse_millis(&val) {
                Some(delay) => config.timings.promotion_settle = delay,
                None => {
                    tracing::warn!(value = %val, "Invalid UNIHUB_PROMOTION_SETTLE_MS, using default")
                }
            }
        }

        if let Some(val) = lookup("UNIHUB_DEFAULT_PORT") {
            match unihub_shared::types::parse_port(&val) {
                Ok(port) => config.default_port = port,
                Err(e) => tracing::warn!(error = %e, "Invalid UNIHUB_DEFAULT_PORT, using default"),
            }
        }

        // RUST_LOG is read by the tracing filter directly.

        config
    }

    /// Open the identity database this configuration points at.
    pub fn open_database(&self) -> Result<Database, SessionError> {
        let db = match &self.data_dir {
            Some(dir) => Database::open_in_dir(dir)?,
            None => Database::new()?,
        };
        Ok(db)
    }
}

fn parse_millis(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> ClientConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);
        assert_eq!(config.data_dir, None);
        assert_eq!(config.timings.join_timeout, Duration::from_millis(5_000));
        assert_eq!(config.timings.promotion_settle, Duration::from_millis(1_500));
        assert_eq!(config.default_port, 25_565);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("UNIHUB_DATA_DIR", "/tmp/hub"),
            ("UNIHUB_JOIN_TIMEOUT_MS", "250"),
            ("UNIHUB_PROMOTION_SETTLE_MS", "10"),
            ("UNIHUB_DEFAULT_PORT", "4000"),
        ]);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/hub")));
        assert_eq!(config.timings.join_timeout, Duration::from_millis(250));
        assert_eq!(config.timings.promotion_settle, Duration::from_millis(10));
        assert_eq!(config.default_port, 4000);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("UNIHUB_JOIN_TIMEOUT_MS", "soon"),
            ("UNIHUB_PROMOTION_SETTLE_MS", "0"),
            ("UNIHUB_DEFAULT_PORT", "99999"),
        ]);
        assert_eq!(config.timings, SessionTimings::default());
        assert_eq!(config.default_port, DEFAULT_PORT);
    }
}
