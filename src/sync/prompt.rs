// ABOUTME: Yes/no overwrite confirmation used by the download walk

use crate::cancel::CancelToken;
use std::path::Path;
use tracing::warn;

pub trait OverwritePrompt {
    /// Ask whether `path` may be replaced. Anything but an explicit yes is a no.
    fn confirm_overwrite(&mut self, path: &Path) -> bool;
}

/// Asks on the controlling terminal via dialoguer.
pub struct TerminalPrompt {
    cancel: CancelToken,
}

impl TerminalPrompt {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }
}

impl OverwritePrompt for TerminalPrompt {
    fn confirm_overwrite(&mut self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        match dialoguer::Confirm::new()
            .with_prompt(format!("{name} already exists. Replace it?"))
            .default(false)
            .interact()
        {
            Ok(answer) => answer,
            Err(e) => {
                // Ctrl-C inside the prompt arrives here rather than as a signal.
                warn!("Overwrite prompt aborted: {}", e);
                self.cancel.cancel();
                false
            }
        }
    }
}

/// Gives the same answer every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl OverwritePrompt for FixedAnswer {
    fn confirm_overwrite(&mut self, _path: &Path) -> bool {
        self.0
    }
}
