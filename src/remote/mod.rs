// ABOUTME: Remote host capabilities consumed by tree sync, workspace management and the stream relay
// The ssh submodule implements them over libssh2; tests substitute in-memory fakes

pub mod error;
pub mod ssh;

pub use error::RemoteError;
pub use ssh::{SshChannel, SshConnector, SshHost};

use crate::config::ConnectionParams;
use crate::error::SessionError;
use crate::models::RemoteEntry;
use std::io::{self, Read, Write};
use std::time::Duration;

/// File operations on the remote side. Paths are `/`-separated and may be
/// relative to the login directory.
pub trait RemoteFs {
    fn stat(&mut self, path: &str) -> Result<RemoteEntry, RemoteError>;

    fn mkdir(&mut self, path: &str, mode: i32) -> Result<(), RemoteError>;

    /// Stream `source` into `path`, truncating any existing file. Returns bytes written.
    fn put(&mut self, source: &mut dyn Read, path: &str) -> Result<u64, RemoteError>;

    /// Stream the remote file at `path` into `sink`. Returns bytes read.
    fn get(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, RemoteError>;

    fn remove(&mut self, path: &str) -> Result<(), RemoteError>;

    fn rmdir(&mut self, path: &str) -> Result<(), RemoteError>;

    /// Entries directly under `path`, without `.` and `..`.
    fn listdir(&mut self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;
}

/// A started remote process.
///
/// Readiness checks never block longer than the poll timeout; reads after a
/// positive readiness check return at least one byte.
pub trait RemoteChannel {
    fn set_poll_timeout(&mut self, timeout: Duration);

    fn stdout_ready(&mut self) -> io::Result<bool>;

    fn stderr_ready(&mut self) -> io::Result<bool>;

    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn exit_status_ready(&mut self) -> bool;

    /// Write raw bytes to the process input (control characters included).
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Block until the process has exited and return its status.
    fn wait_exit_status(&mut self) -> io::Result<i32>;
}

/// Command execution on the remote side.
pub trait RemoteShell {
    type Channel: RemoteChannel;

    fn exec(&mut self, command: &str, allocate_pty: bool) -> Result<Self::Channel, RemoteError>;

    /// Run a housekeeping command to completion and return its exit status.
    fn run(&mut self, command: &str) -> Result<i32, RemoteError> {
        let mut channel = self.exec(command, false)?;
        channel
            .wait_exit_status()
            .map_err(|source| RemoteError::io(command, source))
    }
}

/// Everything a session needs from one connected host.
pub trait RemoteHost: RemoteFs + RemoteShell {}

impl<T: RemoteFs + RemoteShell> RemoteHost for T {}

/// Opens and authenticates a connection. Split in two so the orchestrator can
/// report connection and authentication failures separately.
pub trait Connector {
    type Transport;
    type Host: RemoteHost;

    fn connect(&self, params: &ConnectionParams) -> Result<Self::Transport, SessionError>;

    fn authenticate(
        &self,
        transport: Self::Transport,
        params: &ConnectionParams,
    ) -> Result<Self::Host, SessionError>;
}

/// Join a remote directory and a child name with `/`, whatever the local separator.
pub fn join_remote(parent: &str, name: &str) -> String {
    let name = name.replace('\\', "/");
    if parent.is_empty() {
        name
    } else if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}
