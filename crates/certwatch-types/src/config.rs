//! Environment-derived runtime configuration.

use std::env;
use std::path::PathBuf;

use tracing::warn;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct CertwatchConfig {
    /// HTTP listen port (`PORT`).
    pub port: u16,
    /// Log raw webhook payloads (`DEBUG=true`).
    pub debug: bool,
    /// Drop partitions strictly older than today minus this many days
    /// (`PARTITION_RETENTION_DAYS`).
    pub retention_days: u32,
    /// Retention sweeper period in hours (`CLEANUP_INTERVAL_HOURS`).
    pub cleanup_interval_hours: u64,
    /// SQLite database path (`DB_PATH`).
    pub db_path: PathBuf,
    /// Rule file path (`RULES_FILE`).
    pub rules_path: PathBuf,
}

impl Default for CertwatchConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            debug: false,
            retention_days: 30,
            cleanup_interval_hours: 24,
            db_path: PathBuf::from("data/matches.db"),
            rules_path: PathBuf::from("rules.yaml"),
        }
    }
}

impl CertwatchConfig {
    /// Read configuration from the environment, falling back to defaults
    /// (with a warning) for unset or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parse_var("PORT", defaults.port),
            debug: env::var("DEBUG").map(|v| v == "true").unwrap_or(false),
            retention_days: parse_var("PARTITION_RETENTION_DAYS", defaults.retention_days),
            cleanup_interval_hours: parse_var(
                "CLEANUP_INTERVAL_HOURS",
                defaults.cleanup_interval_hours,
            ),
            db_path: env::var("DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            rules_path: env::var("RULES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.rules_path),
        }
    }
}

fn parse_var<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "unparseable environment value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CertwatchConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.cleanup_interval_hours, 24);
        assert!(!config.debug);
    }
}
