// ABOUTME: Scratch workspace identifier living under the persistent remote root

use std::fmt;

/// A per-session remote working directory, e.g. `.rbox/3f9a0c1d7e2b4a65`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspacePath {
    root: String,
    token: String,
}

impl WorkspacePath {
    pub fn new(root: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            token: token.into(),
        }
    }

    /// Full remote path of the scratch directory.
    pub fn path(&self) -> String {
        crate::remote::join_remote(&self.root, &self.token)
    }
}

impl fmt::Display for WorkspacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
