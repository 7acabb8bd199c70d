//! Configuration management
//!
//! Everything is read from the environment once at startup (after `.env` is
//! loaded) and handed to the components that need it.

use crate::dashboard::{AuthConfig, DashboardConfig};
use crate::scanner::ScannerConfig;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path
    pub db_path: PathBuf,

    /// HTTP server settings
    pub dashboard: DashboardConfig,

    /// Login credentials and token secrets
    pub auth: AuthConfig,

    /// Scan agent settings
    pub scanner: ScannerConfig,

    /// Run the scan agent inside the server process
    pub scan_agent_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let db_path = std::env::var("PORTNOTE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());

        Self {
            db_path,
            dashboard: DashboardConfig::from_env(),
            auth: AuthConfig::from_env(),
            scanner: ScannerConfig::from_env(),
            scan_agent_enabled: env_flag("PORTNOTE_SCAN_AGENT").unwrap_or(false),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portnote")
        .join("portnote.db")
}

/// Non-empty environment variable
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Boolean flag, `true`/`1` enable it
pub(crate) fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|v| parse_flag(&v))
}

/// Parsed environment variable; invalid values are ignored with a warning
pub(crate) fn env_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Invalid {} value {:?}: {}, using default", key, raw, e);
            None
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(parse_flag(" TRUE "));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag("0"));
    }

    #[test]
    fn test_default_db_path() {
        let path = default_db_path();
        assert!(path.ends_with("portnote/portnote.db"));
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("PORTNOTE_TEST_ENV_PARSE", "not-a-number");
        assert_eq!(env_parse::<u16>("PORTNOTE_TEST_ENV_PARSE"), None);

        std::env::set_var("PORTNOTE_TEST_ENV_PARSE", " 8080 ");
        assert_eq!(env_parse::<u16>("PORTNOTE_TEST_ENV_PARSE"), Some(8080));
        std::env::remove_var("PORTNOTE_TEST_ENV_PARSE");
    }
}
