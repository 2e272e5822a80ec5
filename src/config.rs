use std::{
    env,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use directories::ProjectDirs;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{NotesError, Result};

pub const ENV_PORT: &str = "NOTABLY_PORT";
pub const ENV_DATA_DIR: &str = "NOTABLY_DATA_DIR";
pub const ENV_SESSION_TTL_HOURS: &str = "NOTABLY_SESSION_TTL_HOURS";
pub const ENV_SERVER: &str = "NOTABLY_SERVER";

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

/// Longest accepted session lifetime, one hundred years.
pub const MAX_SESSION_TTL_HOURS: u64 = 100 * 365 * 24;

/// Server configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Interface the HTTP server binds to
    pub bind_address: String,

    /// TCP port of the HTTP server
    pub port: u16,

    /// Directory holding the note and user collections
    pub data_dir: PathBuf,

    /// Session lifetime in hours, 0 disables expiry
    pub session_ttl_hours: u64,

    /// Shortest password accepted at registration
    pub min_password_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: project_dirs()
                .map(|dirs| dirs.data_dir().join("server"))
                .unwrap_or_else(|| PathBuf::from("notably-data")),
            session_ttl_hours: 24,
            min_password_length: 6,
        }
    }
}

impl Config {
    /// Defaults, then the JSON file at `path` if given, then environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| NotesError::ConfigError {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| NotesError::ConfigError {
            message: format!("invalid config {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides looked up by environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = parse_override(&lookup, ENV_PORT)? {
            self.port = port;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            debug!("{} set, using data dir {}", ENV_DATA_DIR, dir);
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(hours) = parse_override(&lookup, ENV_SESSION_TTL_HOURS)? {
            self.session_ttl_hours = hours;
        }
        self.validate()
    }

    /// Checks values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.session_ttl_hours > MAX_SESSION_TTL_HOURS {
            return Err(NotesError::ConfigError {
                message: format!(
                    "session_ttl_hours {} exceeds the maximum of {}",
                    self.session_ttl_hours, MAX_SESSION_TTL_HOURS
                ),
            });
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn parse_override<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            warn!("Invalid {key} value: {e}");
            NotesError::ConfigError {
                message: format!("invalid {key} value {raw:?}: {e}"),
            }
        }),
    }
}

/// Where the command-line client finds the server and keeps its session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub session_file: PathBuf,
}

impl ClientConfig {
    pub fn new(server_url: Option<String>, session_file: Option<PathBuf>) -> Self {
        Self {
            server_url: server_url
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            session_file: session_file.unwrap_or_else(default_session_file),
        }
    }
}

pub fn default_session_file() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("session.json"))
        .unwrap_or_else(|| PathBuf::from(".notably-session.json"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "notably")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn overrides_take_precedence() {
        let vars: HashMap<&str, &str> = [
            (ENV_PORT, "9090"),
            (ENV_DATA_DIR, "/tmp/notes"),
            (ENV_SESSION_TTL_HOURS, "0"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/notes"));
        assert_eq!(config.session_ttl_hours, 0);
    }

    #[test]
    fn invalid_override_is_a_config_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == ENV_PORT).then(|| "many".to_string()));
        assert!(matches!(result, Err(NotesError::ConfigError { .. })));
    }

    #[test]
    fn oversized_session_lifetime_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == ENV_SESSION_TTL_HOURS).then(|| u64::MAX.to_string())
        });
        assert!(matches!(result, Err(NotesError::ConfigError { .. })));

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "session_ttl_hours": 100000000000 }"#).unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(NotesError::ConfigError { .. })
        ));

        config.session_ttl_hours = MAX_SESSION_TTL_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "port": 3000 }"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.min_password_length, 6);
        assert_eq!(config.socket_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn client_url_loses_trailing_slash() {
        let config = ClientConfig::new(Some("http://localhost:1234/".into()), None);
        assert_eq!(config.server_url, "http://localhost:1234");
    }
}
