// ABOUTME: Error types for remote filesystem and remote process operations
// Separates the expected "not found" case from genuine remote I/O failures

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote path not found: {0}")]
    NotFound(String),

    #[error("Remote I/O error on {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote command failed to start: {0}")]
    Exec(String),
}

impl RemoteError {
    pub fn io(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            target: target.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
