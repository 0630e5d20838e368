// ABOUTME: Session-level error taxonomy and its mapping onto process exit codes

use crate::config::ConfigError;
use crate::remote::RemoteError;
use crate::sync::SyncError;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for connection, authentication, configuration and sync failures.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code after a local interrupt (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot connect to {address}: {reason}")]
    Connection { address: String, reason: String },

    #[error("Authentication failed for {username}: {reason}")]
    Authentication { username: String, reason: String },

    #[error("Configuration error: {source}")]
    Configuration {
        /// Config file the user should review
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error(transparent)]
    RemoteIo(#[from] RemoteError),

    #[error("Local I/O error on {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot delete remote directory {path}: {reason}")]
    Removal { path: String, reason: String },

    #[error("Interrupted by user")]
    Interrupted,
}

impl SessionError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }

    /// Where the user should look to fix the problem, if anywhere.
    pub fn hint(&self, config_path: &std::path::Path) -> Option<String> {
        match self {
            SessionError::Connection { .. } | SessionError::Authentication { .. } => Some(format!(
                "Review config file @ {}",
                config_path.display()
            )),
            SessionError::Configuration { path, .. } => {
                Some(format!("Review config file @ {}", path.display()))
            }
            SessionError::Removal { .. } => Some("Please review remote file permissions.".into()),
            _ => None,
        }
    }
}

impl From<SyncError> for SessionError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Remote(remote) => SessionError::RemoteIo(remote),
            SyncError::Local { path, source } => SessionError::LocalIo { path, source },
            SyncError::Interrupted => SessionError::Interrupted,
        }
    }
}
