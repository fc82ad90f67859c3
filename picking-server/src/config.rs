use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use picking_store::{GitSettings, ServiceSettings};

/// How requests to the backup endpoints are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// `Authorization: Bearer <secret>` is required.
    Bearer(String),
    /// Development mode: every request is accepted.
    Disabled,
}

impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            AuthMode::Disabled => f.write_str("Disabled"),
        }
    }
}

/// CORS origins accepted by the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// `*`: any origin, without credentials.
    Any,
    /// Explicit list, credentials allowed.
    List(Vec<String>),
}

impl AllowedOrigins {
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(origins)
        }
    }
}

/// Server configuration loaded from environment variables
#[derive(Clone)]
pub struct Config {
    /// Git work tree holding the snapshot (default: current directory)
    pub repo_path: PathBuf,
    /// Branch pushed after each commit (default: main)
    pub branch: String,
    /// Remote pushed to (default: origin)
    pub remote: String,
    /// Snapshot file, relative to `repo_path` unless absolute (default: backup.json)
    pub backup_file: PathBuf,
    /// Bearer secret for the backup endpoints
    pub api_token: Option<String>,
    /// Explicit opt-out of authentication (default: false)
    pub auth_disabled: bool,
    pub allowed_origins: AllowedOrigins,
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 8000)
    pub port: u16,
    /// Give up waiting for a push after this long (default: 30s)
    pub push_timeout: Duration,
    /// Commit signature used when the repository has no user configured
    pub author_name: String,
    pub author_email: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let repo_path = match var("REPO_PATH").filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path.trim()),
            None => env::current_dir().map_err(ConfigError::CurrentDir)?,
        };

        let port_raw = get("PORT", "8000");
        let port = port_raw
            .parse()
            .map_err(|_| ConfigError::InvalidNumber {
                key: "PORT",
                value: port_raw.clone(),
            })?;

        let timeout_raw = get("PUSH_TIMEOUT_SECS", "30");
        let push_timeout = timeout_raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::InvalidNumber {
                key: "PUSH_TIMEOUT_SECS",
                value: timeout_raw.clone(),
            })?;

        let api_token = var("API_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let auth_disabled = get("AUTH_DISABLED", "false").eq_ignore_ascii_case("true");

        Ok(Config {
            repo_path,
            branch: get("REPO_BRANCH", "main"),
            remote: get("REPO_REMOTE", "origin"),
            backup_file: PathBuf::from(get("BACKUP_FILE", "backup.json")),
            api_token,
            auth_disabled,
            allowed_origins: AllowedOrigins::parse(&get("ALLOWED_ORIGINS", "*")),
            host: get("HOST", "0.0.0.0"),
            port,
            push_timeout,
            author_name: get("COMMIT_AUTHOR_NAME", "picking-backup"),
            author_email: get("COMMIT_AUTHOR_EMAIL", "picking-backup@localhost"),
        })
    }

    /// Resolve the authentication mode the server must run with.
    ///
    /// A configured token always wins; without one, `AUTH_DISABLED=true` is
    /// required.
    pub fn auth_mode(&self) -> Result<AuthMode, ConfigError> {
        match (&self.api_token, self.auth_disabled) {
            (Some(token), _) => Ok(AuthMode::Bearer(token.clone())),
            (None, true) => Ok(AuthMode::Disabled),
            (None, false) => Err(ConfigError::MissingApiToken),
        }
    }

    /// Absolute location of the snapshot file.
    pub fn backup_path(&self) -> PathBuf {
        self.repo_path.join(&self.backup_file)
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn git_settings(&self) -> GitSettings {
        GitSettings {
            remote: self.remote.clone(),
            author_name: self.author_name.clone(),
            author_email: self.author_email.clone(),
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            branch: self.branch.clone(),
            push_timeout: self.push_timeout,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("repo_path", &self.repo_path)
            .field("branch", &self.branch)
            .field("remote", &self.remote)
            .field("backup_file", &self.backup_file)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("auth_disabled", &self.auth_disabled)
            .field("allowed_origins", &self.allowed_origins)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("push_timeout", &self.push_timeout)
            .field("author_name", &self.author_name)
            .field("author_email", &self.author_email)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API_TOKEN is not set; set it, or set AUTH_DISABLED=true for local development")]
    MissingApiToken,

    #[error("invalid {key} value {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("cannot determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}
