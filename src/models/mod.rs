// ABOUTME: Core data models for rbox sessions, scratch workspaces and tree sync

pub mod session;
pub mod sync;
pub mod workspace;

pub use session::{ProcessResult, RunMode, RunRequest};
pub use sync::{EntryKind, RemoteEntry, SyncOptions, SyncReport};
pub use workspace::WorkspacePath;
