// ABOUTME: Filter-aware tree synchronization between the local filesystem and a remote host
// Upload pushes a local tree into the scratch directory; download pulls it back

pub mod download;
pub mod filter;
pub mod prompt;
pub mod upload;

pub use filter::{should_ignore, PathFilter};
pub use prompt::{FixedAnswer, OverwritePrompt, TerminalPrompt};

use crate::cancel::CancelToken;
use crate::models::SyncOptions;
use crate::remote::RemoteError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Local I/O error on {path}: {source}")]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sync interrupted by user")]
    Interrupted,
}

impl SyncError {
    pub(crate) fn local(path: &Path, source: std::io::Error) -> Self {
        Self::Local {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Walks trees in either direction using explicit work stacks, checking the
/// cancel token between entries.
pub struct TreeSync<'a> {
    options: &'a SyncOptions,
    cancel: CancelToken,
    prompt: Box<dyn OverwritePrompt + Send + 'a>,
}

impl<'a> TreeSync<'a> {
    pub fn new(options: &'a SyncOptions, cancel: CancelToken) -> Self {
        Self {
            options,
            prompt: Box::new(TerminalPrompt::new(cancel.clone())),
            cancel,
        }
    }

    /// Replace the terminal overwrite prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: Box<dyn OverwritePrompt + Send + 'a>) -> Self {
        self.prompt = prompt;
        self
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Interrupted);
        }
        Ok(())
    }
}
