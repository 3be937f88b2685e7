use anyhow::{anyhow, Result};
use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

const LOG_PATH_KEY: &str = "COOKIE_VOTE_LOG";
const DEFAULT_LOG_PATH: &str = "cookie-vote.log";

pub struct Config {
    /// Shared competitors database (ignored when `remote_url` is set)
    pub store_path: PathBuf,
    /// Device-local database holding the submission flag
    pub device_path: PathBuf,
    /// Base URL of a vote server, e.g. `http://10.0.0.5:3000`
    pub remote_url: Option<String>,
    pub port: u16,
    pub title: String,
    pub log_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Where the client writes its log. Read before the subscriber exists, so nothing is logged.
    pub fn log_path() -> PathBuf {
        log_path_from(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `load` uses the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            store_path: try_load(&lookup, "COOKIE_VOTE_DB", "competitors.db")?,
            device_path: try_load(&lookup, "COOKIE_VOTE_DEVICE_DB", "device.db")?,
            remote_url: lookup("COOKIE_VOTE_REMOTE")
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            port: try_load(&lookup, "COOKIE_VOTE_PORT", "3000")?,
            title: try_load(&lookup, "COOKIE_VOTE_TITLE", "Cookie Competition 2024")?,
            log_path: try_load(&lookup, LOG_PATH_KEY, DEFAULT_LOG_PATH)?,
        })
    }
}

fn log_path_from(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup(LOG_PATH_KEY)
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH))
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow!("Environment misconfigured: invalid {key} ({e})")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.store_path, PathBuf::from("competitors.db"));
        assert_eq!(config.device_path, PathBuf::from("device.db"));
        assert_eq!(config.remote_url, None);
        assert_eq!(config.port, 3000);
        assert_eq!(config.title, "Cookie Competition 2024");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("COOKIE_VOTE_PORT", "8080"),
            ("COOKIE_VOTE_REMOTE", " http://votes.local:3000 "),
            ("COOKIE_VOTE_TITLE", "Bake Off"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.remote_url.as_deref(), Some("http://votes.local:3000"));
        assert_eq!(config.title, "Bake Off");
    }

    #[test]
    fn test_log_path_matches_loaded_config() {
        let default = lookup_from(&[]);
        assert_eq!(log_path_from(&default), Config::from_lookup(&default).unwrap().log_path);

        let custom = lookup_from(&[("COOKIE_VOTE_LOG", "/tmp/votes.log")]);
        assert_eq!(log_path_from(&custom), PathBuf::from("/tmp/votes.log"));
        assert_eq!(Config::from_lookup(&custom).unwrap().log_path, PathBuf::from("/tmp/votes.log"));
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let result = Config::from_lookup(lookup_from(&[("COOKIE_VOTE_PORT", "not-a-port")]));

        assert!(result.is_err());
    }
}
