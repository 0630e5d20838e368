// ABOUTME: libssh2-backed implementation of the remote capabilities
// Opens the TCP connection, authenticates, and exposes SFTP plus exec channels

use super::{Connector, RemoteChannel, RemoteError, RemoteFs, RemoteShell};
use crate::config::{AuthMethod, ConnectionParams};
use crate::error::SessionError;
use crate::models::{EntryKind, RemoteEntry};
use ssh2::{Channel, ErrorCode, Session, Sftp};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const LIBSSH2_FX_NO_SUCH_FILE: i32 = 2;
const LIBSSH2_FX_NO_SUCH_PATH: i32 = 10;
const PTY_TERM: &str = "xterm-256color";
const READ_CHUNK: usize = 4096;

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

fn map_sftp_error(path: &str, err: ssh2::Error) -> RemoteError {
    if matches!(
        err.code(),
        ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_FILE | LIBSSH2_FX_NO_SUCH_PATH)
    ) {
        return RemoteError::NotFound(path.to_string());
    }
    RemoteError::io(path, io::Error::from(err))
}

/// Opens SSH sessions; host keys are accepted without verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

impl SshConnector {
    fn connection_error(params: &ConnectionParams, reason: impl ToString) -> SessionError {
        SessionError::Connection {
            address: format!("{}:{}", params.address, params.port),
            reason: reason.to_string(),
        }
    }

    fn auth_error(params: &ConnectionParams, reason: impl ToString) -> SessionError {
        SessionError::Authentication {
            username: params.username.clone(),
            reason: reason.to_string(),
        }
    }

    fn prompt_password(params: &ConnectionParams) -> Result<String, SessionError> {
        dialoguer::Password::new()
            .with_prompt(format!("Password for {}@{}", params.username, params.address))
            .allow_empty_password(true)
            .interact()
            .map_err(|e| Self::auth_error(params, e))
    }
}

impl Connector for SshConnector {
    type Transport = Session;
    type Host = SshHost;

    fn connect(&self, params: &ConnectionParams) -> Result<Session, SessionError> {
        let addr = (params.address.as_str(), params.port)
            .to_socket_addrs()
            .map_err(|e| Self::connection_error(params, e))?
            .next()
            .ok_or_else(|| Self::connection_error(params, "address did not resolve"))?;

        let tcp = TcpStream::connect_timeout(&addr, params.connect_timeout)
            .map_err(|e| Self::connection_error(params, e))?;

        let mut session = Session::new().map_err(|e| Self::connection_error(params, e))?;
        session.set_tcp_stream(tcp);
        // Bounds every blocking call until authentication completes.
        session.set_timeout(timeout_millis(params.connect_timeout));
        session
            .handshake()
            .map_err(|e| Self::connection_error(params, e))?;

        if let Some(hash) = session.host_key_hash(ssh2::HashType::Sha256) {
            let fingerprint: String = hash.iter().map(|b| format!("{b:02x}")).collect();
            debug!("Host key SHA256 fingerprint for {}: {}", params.address, fingerprint);
        }

        info!("Connected to {}:{}", params.address, params.port);
        Ok(session)
    }

    fn authenticate(
        &self,
        session: Session,
        params: &ConnectionParams,
    ) -> Result<SshHost, SessionError> {
        match &params.auth {
            AuthMethod::Key {
                key_path,
                passphrase,
                password,
            } => {
                let key_result = session.userauth_pubkey_file(
                    &params.username,
                    None,
                    key_path,
                    passphrase.as_deref(),
                );
                if let Err(key_err) = key_result {
                    let Some(password) = password else {
                        return Err(Self::auth_error(params, key_err));
                    };
                    warn!("Key authentication failed ({}), falling back to password", key_err);
                    session
                        .userauth_password(&params.username, password)
                        .map_err(|e| Self::auth_error(params, e))?;
                }
            }
            AuthMethod::Password { password } => {
                let password = match password {
                    Some(password) => password.clone(),
                    None => Self::prompt_password(params)?,
                };
                session
                    .userauth_password(&params.username, &password)
                    .map_err(|e| Self::auth_error(params, e))?;
            }
        }

        if !session.authenticated() {
            return Err(Self::auth_error(params, "server rejected credentials"));
        }
        info!("Authenticated as {} ({} auth)", params.username, params.auth.mode());

        let sftp = session
            .sftp()
            .map_err(|e| Self::connection_error(params, format!("SFTP subsystem: {e}")))?;
        session.set_timeout(0);

        Ok(SshHost { session, sftp })
    }
}

/// One authenticated SSH session with its SFTP subsystem.
pub struct SshHost {
    session: Session,
    sftp: Sftp,
}

impl RemoteFs for SshHost {
    fn stat(&mut self, path: &str) -> Result<RemoteEntry, RemoteError> {
        let stat = self
            .sftp
            .stat(Path::new(path))
            .map_err(|e| map_sftp_error(path, e))?;
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Ok(RemoteEntry {
            name,
            kind: if stat.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            size: stat.size,
            mode: stat.perm,
        })
    }

    fn mkdir(&mut self, path: &str, mode: i32) -> Result<(), RemoteError> {
        self.sftp
            .mkdir(Path::new(path), mode)
            .map_err(|e| map_sftp_error(path, e))
    }

    fn put(&mut self, source: &mut dyn Read, path: &str) -> Result<u64, RemoteError> {
        let mut file = self
            .sftp
            .create(Path::new(path))
            .map_err(|e| map_sftp_error(path, e))?;
        io::copy(source, &mut file).map_err(|e| RemoteError::io(path, e))
    }

    fn get(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, RemoteError> {
        let mut file = self
            .sftp
            .open(Path::new(path))
            .map_err(|e| map_sftp_error(path, e))?;
        io::copy(&mut file, sink).map_err(|e| RemoteError::io(path, e))
    }

    fn remove(&mut self, path: &str) -> Result<(), RemoteError> {
        self.sftp
            .unlink(Path::new(path))
            .map_err(|e| map_sftp_error(path, e))
    }

    fn rmdir(&mut self, path: &str) -> Result<(), RemoteError> {
        self.sftp
            .rmdir(Path::new(path))
            .map_err(|e| map_sftp_error(path, e))
    }

    fn listdir(&mut self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let listing = self
            .sftp
            .readdir(Path::new(path))
            .map_err(|e| map_sftp_error(path, e))?;

        Ok(listing
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path.file_name()?.to_string_lossy().into_owned();
                if name == "." || name == ".." {
                    return None;
                }
                Some(RemoteEntry {
                    name,
                    kind: if stat.is_dir() {
                        EntryKind::Directory
                    } else {
                        EntryKind::File
                    },
                    size: stat.size,
                    mode: stat.perm,
                })
            })
            .collect())
    }
}

impl RemoteShell for SshHost {
    type Channel = SshChannel;

    fn exec(&mut self, command: &str, allocate_pty: bool) -> Result<SshChannel, RemoteError> {
        self.session.set_blocking(true);
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| RemoteError::Exec(e.to_string()))?;
        if allocate_pty {
            channel
                .request_pty(PTY_TERM, None, None)
                .map_err(|e| RemoteError::Exec(format!("pty request: {e}")))?;
        }
        channel
            .exec(command)
            .map_err(|e| RemoteError::Exec(e.to_string()))?;
        debug!("Started remote command: {}", command);

        Ok(SshChannel {
            session: self.session.clone(),
            channel,
            pending_stdout: Vec::new(),
            pending_stderr: Vec::new(),
        })
    }
}

#[derive(Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// Exec channel polled in non-blocking mode. Readiness checks read ahead into
/// a pending buffer, so a positive check guarantees the next read has data.
pub struct SshChannel {
    session: Session,
    channel: Channel,
    pending_stdout: Vec<u8>,
    pending_stderr: Vec<u8>,
}

impl SshChannel {
    fn pending(&mut self, kind: StreamKind) -> &mut Vec<u8> {
        match kind {
            StreamKind::Stdout => &mut self.pending_stdout,
            StreamKind::Stderr => &mut self.pending_stderr,
        }
    }

    fn fill(&mut self, kind: StreamKind) -> io::Result<bool> {
        if !self.pending(kind).is_empty() {
            return Ok(true);
        }
        self.session.set_blocking(false);
        let mut buf = [0u8; READ_CHUNK];
        let result = match kind {
            StreamKind::Stdout => self.channel.read(&mut buf),
            StreamKind::Stderr => self.channel.stderr().read(&mut buf),
        };
        match result {
            Ok(0) => Ok(false),
            Ok(n) => {
                self.pending(kind).extend_from_slice(&buf[..n]);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn take(&mut self, kind: StreamKind, buf: &mut [u8]) -> io::Result<usize> {
        self.fill(kind)?;
        let pending = self.pending(kind);
        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        pending.drain(..n);
        Ok(n)
    }
}

impl RemoteChannel for SshChannel {
    fn set_poll_timeout(&mut self, timeout: Duration) {
        self.session.set_timeout(timeout_millis(timeout));
    }

    fn stdout_ready(&mut self) -> io::Result<bool> {
        self.fill(StreamKind::Stdout)
    }

    fn stderr_ready(&mut self) -> io::Result<bool> {
        self.fill(StreamKind::Stderr)
    }

    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.take(StreamKind::Stdout, buf)
    }

    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.take(StreamKind::Stderr, buf)
    }

    fn exit_status_ready(&mut self) -> bool {
        self.channel.eof()
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.session.set_blocking(true);
        self.session.set_timeout(0);
        self.channel.write_all(data)?;
        self.channel.flush()
    }

    fn wait_exit_status(&mut self) -> io::Result<i32> {
        self.session.set_blocking(true);
        self.session.set_timeout(0);
        // Closing our side first lets a process blocked on input finish.
        let _ = self.channel.send_eof();
        self.channel.wait_close().map_err(io::Error::from)?;
        self.channel.exit_status().map_err(io::Error::from)
    }
}

impl Drop for SshChannel {
    fn drop(&mut self) {
        self.session.set_blocking(true);
        self.session.set_timeout(0);
    }
}
