// ABOUTME: Configuration loading for rbox: server address, credentials and session tunables
//
// Configuration is stored in TOML at `<config dir>/rbox/config.toml`:
//
// ```toml
// [server]
// address = "login.example.edu"
// port = 22
// username = "z5555555"
//
// [auth]
// type = "key"
// private_key_path = "~/.ssh/id_ed25519"
//
// [session]
// auto_confirm = ["give"]
// ```

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_REMOTE_ROOT: &str = ".rbox";
pub const DEFAULT_PORT: u16 = 22;
const CONFIG_FILE_NAME: &str = "config.toml";

const TEMPLATE: &str = r#"# rbox configuration
# Do not put quotes around numbers; strings need quotes.

[server]
address = "login.example.edu"
port = 22
username = "z5555555"

# Password authentication. Leave the password empty to be asked on every run.
[auth]
type = "password"
password = ""

# Key authentication (replace the [auth] table above with this one):
# [auth]
# type = "key"
# private_key_path = "~/.ssh/id_ed25519"
# passphrase = ""        # only if the key has one
# password = ""          # fallback if the key is rejected

[session]
# Persistent remote directory that holds one scratch directory per run
remote_root = ".rbox"
# Commands that ask for confirmation remotely get `yes |` piped in
auto_confirm = ["give"]
"#;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
}

/// The `[auth]` table, discriminated by its `type` key.
#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    Key {
        private_key_path: String,
        #[serde(default)]
        passphrase: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    Password {
        #[serde(default)]
        password: Option<String>,
    },
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::Key {
                private_key_path, ..
            } => f
                .debug_struct("Key")
                .field("private_key_path", private_key_path)
                .finish_non_exhaustive(),
            AuthConfig::Password { .. } => f.debug_struct("Password").finish_non_exhaustive(),
        }
    }
}

/// Optional `[session]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub remote_root: String,
    pub auto_confirm: Vec<String>,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub connect_timeout_secs: u64,
    pub clear_retry_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            remote_root: DEFAULT_REMOTE_ROOT.to_string(),
            auto_confirm: Vec::new(),
            poll_interval_ms: 30,
            poll_timeout_ms: 100,
            connect_timeout_secs: 15,
            clear_retry_delay_ms: 500,
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn clear_retry_delay(&self) -> Duration {
        Duration::from_millis(self.clear_retry_delay_ms)
    }

    pub fn wants_auto_confirm(&self, program: &str) -> bool {
        self.auto_confirm.iter().any(|name| name == program)
    }
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Validated, typed connection parameters for one session.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
    pub connect_timeout: Duration,
}

#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Key {
        key_path: PathBuf,
        passphrase: Option<String>,
        password: Option<String>,
    },
    /// `None` means ask on the terminal at connect time
    Password { password: Option<String> },
}

impl AuthMethod {
    pub fn mode(&self) -> &'static str {
        match self {
            AuthMethod::Key { .. } => "key",
            AuthMethod::Password { .. } => "password",
        }
    }

    /// The stored password, if any, for either mode.
    pub fn password(&self) -> Option<&str> {
        match self {
            AuthMethod::Key { password, .. } | AuthMethod::Password { password } => {
                password.as_deref()
            }
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Key { key_path, .. } => f
                .debug_struct("Key")
                .field("key_path", key_path)
                .finish_non_exhaustive(),
            AuthMethod::Password { password } => f
                .debug_struct("Password")
                .field("stored", &password.is_some())
                .finish(),
        }
    }
}

impl AppConfig {
    /// Default location of the config file.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        directories::ProjectDirs::from("", "", "rbox")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.address.trim().is_empty() {
            return Err(ConfigError::Validation("server.address cannot be empty".into()));
        }
        if self.server.username.trim().is_empty() {
            return Err(ConfigError::Validation("server.username cannot be empty".into()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".into()));
        }
        if let AuthConfig::Key {
            private_key_path, ..
        } = &self.auth
        {
            if private_key_path.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "auth.private_key_path is required for key auth".into(),
                ));
            }
        }
        if self.session.remote_root.trim().is_empty() {
            return Err(ConfigError::Validation("session.remote_root cannot be empty".into()));
        }
        Ok(())
    }

    pub fn connection_params(&self) -> ConnectionParams {
        let auth = match &self.auth {
            AuthConfig::Key {
                private_key_path,
                passphrase,
                password,
            } => AuthMethod::Key {
                key_path: expand_home(private_key_path.trim()),
                passphrase: non_empty(passphrase.as_deref()),
                password: non_empty(password.as_deref()),
            },
            AuthConfig::Password { password } => AuthMethod::Password {
                password: non_empty(password.as_deref()),
            },
        };

        ConnectionParams {
            address: self.server.address.trim().to_string(),
            port: self.server.port,
            username: self.server.username.trim().to_string(),
            auth,
            connect_timeout: self.session.connect_timeout(),
        }
    }

    /// Write the commented template to `path`, creating parent directories.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, TEMPLATE).map_err(write_err)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
