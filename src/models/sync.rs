// ABOUTME: Tree sync data models: options, remote listing entries and transfer reports

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub mode: Option<u32>,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size: Some(size),
            mode: None,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: None,
            mode: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Immutable sync configuration shared by the upload and download walks.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Overwrite existing local files on download without asking
    pub force: bool,
    /// Pre-clear the persistent root, and delete remote entries once downloaded
    pub clear: bool,
    /// Raw user exclusion list, comma or whitespace separated
    pub exclude: Option<String>,
    pub local_root: PathBuf,
    /// Persistent remote directory holding every scratch workspace
    pub remote_root: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            clear: false,
            exclude: None,
            local_root: PathBuf::from("./"),
            remote_root: crate::config::DEFAULT_REMOTE_ROOT.to_string(),
        }
    }
}

/// Counters accumulated by one sync walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub directories: usize,
    pub files: usize,
    pub skipped: usize,
    pub ignored: usize,
    pub bytes: u64,
}

impl SyncReport {
    pub fn format(&self) -> String {
        format!(
            "{} files ({} bytes) in {} directories, {} skipped, {} ignored",
            self.files, self.bytes, self.directories, self.skipped, self.ignored
        )
    }
}
