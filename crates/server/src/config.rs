use concilia_engine::MatchConfig;
use concilia_import::StatementProfile;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "CONCILIA_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    /// Bunyan-style JSON lines.
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub log_format: LogFormat,
    pub body_limit_bytes: usize,
    pub cors_permissive: bool,
    pub matching: MatchConfig,
    pub statement: StatementProfile,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: PathBuf::from("concilia.db"),
            log_format: LogFormat::Pretty,
            body_limit_bytes: 5 * 1024 * 1024,
            cors_permissive: false,
            matching: MatchConfig::default(),
            statement: StatementProfile::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// File named by `CONCILIA_CONFIG` (if any), then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => {
                let path = PathBuf::from(path);
                let content = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Io { path, source })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        base.with_env(|var| std::env::var(var).ok())
    }

    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(host) = lookup("CONCILIA_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("CONCILIA_PORT") {
            self.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "CONCILIA_PORT",
                value: port,
            })?;
        }
        if let Some(path) = lookup("DATABASE_URL") {
            // Accept both a bare path and a `sqlite:` URL.
            let path = path
                .strip_prefix("sqlite://")
                .or_else(|| path.strip_prefix("sqlite:"))
                .unwrap_or(path.as_str());
            self.database_path = PathBuf::from(path);
        }
        Ok(self)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
