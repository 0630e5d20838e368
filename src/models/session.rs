// ABOUTME: Session data models: what the user asked to run and how the remote process ended

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Push the local source tree, then run the command
    Upload { source: PathBuf },
    /// Run the command in an empty workspace, then pull the workspace into `destination`
    Download { destination: PathBuf },
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Upload {
            source: PathBuf::from("./"),
        }
    }
}

impl RunMode {
    /// Number of numbered status steps printed before the command output.
    pub fn total_steps(&self) -> usize {
        match self {
            RunMode::Upload { .. } => 5,
            RunMode::Download { .. } => 4,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Command tokens as typed, joined with spaces before execution
    pub command: Vec<String>,
    pub mode: RunMode,
    /// Hand the terminal to a real `ssh -t` session instead of relaying
    pub interactive: bool,
    /// Pipe `yes` into the command to answer remote confirmation prompts
    pub auto_confirm: bool,
}

impl RunRequest {
    pub fn new(command: Vec<String>, mode: RunMode) -> Self {
        Self {
            command,
            mode,
            interactive: false,
            auto_confirm: false,
        }
    }

    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    /// First word of the command, used to match the auto-confirm list.
    pub fn program(&self) -> Option<&str> {
        self.command
            .first()
            .and_then(|token| token.split_whitespace().next())
    }
}

/// How the relayed remote process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessResult {
    pub exit_status: i32,
    /// Every buffered stdout/stderr byte was forwarded before the status was read
    pub drained: bool,
    /// The relay loop stopped because of a local interrupt
    pub interrupted: bool,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}
