// ABOUTME: Remote scratch workspace lifecycle: persistent root, per-session scratch directory, cleanup
// Also builds the remote command line that runs inside the scratch directory

use crate::cancel::CancelToken;
use crate::error::SessionError;
use crate::models::WorkspacePath;
use crate::remote::{RemoteError, RemoteFs, RemoteShell};
use std::io;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Owner-only permissions for the persistent root and every scratch directory.
pub const PRIVATE_DIR_MODE: i32 = 0o700;
const TOKEN_LEN: usize = 16;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Fresh random hex token for a scratch directory name.
pub fn scratch_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(TOKEN_LEN);
    token
}

pub struct WorkspaceManager {
    root: String,
    cancel: CancelToken,
    retry_delay: Duration,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<String>, cancel: CancelToken) -> Self {
        Self {
            root: root.into(),
            cancel,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Create the persistent root with owner-only permissions unless it exists.
    pub fn ensure_persistent_root<F: RemoteFs + ?Sized>(&self, fs: &mut F) -> Result<(), SessionError> {
        match fs.stat(&self.root) {
            Ok(entry) if entry.is_dir() => {
                debug!("Persistent root {} already exists", self.root);
                Ok(())
            }
            Ok(_) => Err(RemoteError::io(
                self.root.clone(),
                io::Error::new(io::ErrorKind::AlreadyExists, "exists and is not a directory"),
            )
            .into()),
            Err(e) if e.is_not_found() => {
                fs.mkdir(&self.root, PRIVATE_DIR_MODE)?;
                info!("Directory '{}' created with permissions {:o}", self.root, PRIVATE_DIR_MODE);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Recursively remove the persistent root, retrying on a non-zero exit
    /// status until it succeeds or the session is interrupted. Returns the
    /// number of attempts made.
    pub fn clear_persistent_root<S: RemoteShell + ?Sized>(
        &self,
        shell: &mut S,
    ) -> Result<u32, SessionError> {
        self.guard_root()?;
        let command = format!("rm -rf {}", shell_words::quote(&self.root));
        info!("Clearing remote directory {}", self.root);

        let mut attempts = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(SessionError::Removal {
                    path: self.root.clone(),
                    reason: "interrupted while clearing".into(),
                });
            }

            attempts += 1;
            let status = shell.run(&command)?;
            if status == 0 {
                return Ok(attempts);
            }

            warn!("Command failed with exit code {}. Retrying...", status);
            if !self.retry_delay.is_zero() {
                std::thread::sleep(self.retry_delay);
            }
        }
    }

    /// Create a uniquely named scratch directory under the persistent root.
    pub fn allocate_scratch<F: RemoteFs + ?Sized>(&self, fs: &mut F) -> Result<WorkspacePath, SessionError> {
        let scratch = WorkspacePath::new(self.root.clone(), scratch_token());
        fs.mkdir(&scratch.path(), PRIVATE_DIR_MODE)?;
        info!("Files will be uploaded to: {}", scratch);
        Ok(scratch)
    }

    /// Shell command that enters `scratch` and runs `user_command` verbatim,
    /// optionally with `yes` piped into it.
    pub fn build_command(scratch: &WorkspacePath, user_command: &str, auto_confirm: bool) -> String {
        let command = if auto_confirm {
            format!("yes | {user_command}")
        } else {
            user_command.to_string()
        };
        format!("cd {} && {}", shell_words::quote(&scratch.path()), command)
    }

    /// Best-effort removal of the scratch directory. Never fails the session.
    pub fn release<S: RemoteShell + ?Sized>(&self, shell: &mut S, scratch: &WorkspacePath) -> bool {
        let command = format!("rm -rf {}", shell_words::quote(&scratch.path()));
        match shell.run(&command) {
            Ok(0) => {
                info!("Cleared remote directory {}", scratch);
                true
            }
            Ok(status) => {
                warn!("Removing {} exited with status {}", scratch, status);
                false
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", scratch, e);
                false
            }
        }
    }

    fn guard_root(&self) -> Result<(), SessionError> {
        let trimmed = self.root.trim().trim_end_matches('/');
        if matches!(trimmed, "" | "." | ".." | "~" | "/") {
            return Err(SessionError::Removal {
                path: self.root.clone(),
                reason: "refusing to clear this directory".into(),
            });
        }
        Ok(())
    }
}
