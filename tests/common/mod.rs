// ABOUTME: In-memory remote host, scripted channel and connectors shared by the integration tests
#![allow(dead_code)]

use rbox::cancel::CancelToken;
use rbox::config::{AppConfig, ConnectionParams};
use rbox::error::SessionError;
use rbox::models::RemoteEntry;
use rbox::remote::{Connector, RemoteChannel, RemoteError, RemoteFs, RemoteShell};
use rbox::session::{Console, ProgressReporter, RelayConfig};
use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INTERRUPT: u8 = 0x03;
pub const END_OF_INPUT: u8 = 0x04;

pub const PASSWORD_CONFIG: &str = r#"
[server]
address = "fake.example.edu"
port = 2222
username = "tester"

[auth]
type = "password"
password = "secret"

[session]
remote_root = ".rbox"
auto_confirm = ["give"]
clear_retry_delay_ms = 0
"#;

pub fn test_config() -> AppConfig {
    AppConfig::parse(PASSWORD_CONFIG, Path::new("config.toml")).unwrap()
}

/// Relay timings with no idle sleeps.
pub fn fast_relay() -> RelayConfig {
    RelayConfig {
        poll_timeout: Duration::ZERO,
        poll_interval: Duration::ZERO,
        chunk_size: 4096,
    }
}

#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captured stdout, stderr and status output for one session.
#[derive(Clone, Default)]
pub struct Captured {
    pub stdout: SharedBuf,
    pub stderr: SharedBuf,
    pub status: SharedBuf,
}

impl Captured {
    pub fn console(&self) -> Console {
        Console::new(Box::new(self.stdout.clone()), Box::new(self.stderr.clone()))
    }

    pub fn progress(&self) -> ProgressReporter {
        ProgressReporter::new(Box::new(self.status.clone()), 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Dir { mode: i32 },
    File(Vec<u8>),
}

#[derive(Default)]
pub struct HostState {
    pub nodes: BTreeMap<String, Node>,
    /// Every command passed to exec, in order
    pub commands: Vec<String>,
    /// Normalized targets of every `rm -rf`
    pub removals: Vec<String>,
    pub puts: usize,
    /// Fail this many `rm -rf` invocations with status 1 before succeeding
    pub failing_removals: usize,
    /// Cancel the token once this many files have been uploaded
    pub cancel_after_puts: Option<(usize, CancelToken)>,
    /// Uploading a file with this base name fails
    pub fail_put_named: Option<String>,
    /// Cancel the token when a `hang` command is first polled
    pub cancel_on_hang: Option<CancelToken>,
}

fn norm(path: &str) -> String {
    let mut path = path;
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.trim_end_matches('/').to_string()
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

fn io_err(kind: io::ErrorKind, path: &str) -> RemoteError {
    RemoteError::io(path, io::Error::new(kind, format!("fake host: {path}")))
}

impl HostState {
    fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || matches!(self.nodes.get(path), Some(Node::Dir { .. }))
    }

    fn children(&self, dir: &str) -> Vec<(String, Node)> {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        self.nodes
            .iter()
            .filter_map(|(key, node)| {
                let rest = key.strip_prefix(&prefix)?;
                (!rest.is_empty() && !rest.contains('/')).then(|| (rest.to_string(), node.clone()))
            })
            .collect()
    }

    fn remove_tree(&mut self, path: &str) {
        let prefix = format!("{path}/");
        self.nodes
            .retain(|key, _| key != path && !key.starts_with(&prefix));
    }
}

/// In-memory remote filesystem plus a tiny shell understanding the commands
/// the session issues.
#[derive(Clone, Default)]
pub struct FakeHost {
    pub state: Arc<Mutex<HostState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F: FnOnce(&mut HostState)>(self, f: F) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn add_dir(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(norm(path), Node::Dir { mode: 0o755 });
    }

    pub fn add_file(&self, path: &str, content: &str) {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(norm(path), Node::File(content.as_bytes().to_vec()));
    }

    pub fn file(&self, path: &str) -> Option<String> {
        match self.state.lock().unwrap().nodes.get(&norm(path)) {
            Some(Node::File(data)) => Some(String::from_utf8_lossy(data).into_owned()),
            _ => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().nodes.contains_key(&norm(path))
    }

    pub fn paths(&self) -> Vec<String> {
        self.state.lock().unwrap().nodes.keys().cloned().collect()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn removals_of(&self, path: &str) -> usize {
        let path = norm(path);
        self.state
            .lock()
            .unwrap()
            .removals
            .iter()
            .filter(|p| **p == path)
            .count()
    }

    /// Directories directly under `root`.
    pub fn subdirs(&self, root: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .children(&norm(root))
            .into_iter()
            .filter(|(_, node)| matches!(node, Node::Dir { .. }))
            .map(|(name, _)| name)
            .collect()
    }

    fn shell(&self, command: &str) -> FakeChannel {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_string());

        let (cwd, body) = match command.split_once(" && ") {
            Some((cd, rest)) if cd.starts_with("cd ") => {
                let words = shell_words::split(cd).unwrap_or_default();
                let dir = norm(words.get(1).map_or("", String::as_str));
                if !state.is_dir(&dir) {
                    return FakeChannel::finished(
                        vec![],
                        vec![format!("cd: {dir}: No such file or directory\n").into_bytes()],
                        1,
                    );
                }
                (dir, rest.to_string())
            }
            _ => (String::new(), command.to_string()),
        };
        let body = body.strip_prefix("yes | ").unwrap_or(&body).to_string();
        let words = shell_words::split(&body).unwrap_or_default();
        let resolve = |name: &str| {
            if cwd.is_empty() {
                norm(name)
            } else {
                norm(&format!("{cwd}/{name}"))
            }
        };

        match words.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
            &["rm", "-rf", target] => {
                let target = resolve(target);
                state.removals.push(target.clone());
                if state.failing_removals > 0 {
                    state.failing_removals -= 1;
                    return FakeChannel::finished(vec![], vec![b"rm: busy\n".to_vec()], 1);
                }
                state.remove_tree(&target);
                FakeChannel::finished(vec![], vec![], 0)
            }
            &["cat", name] => match state.nodes.get(&resolve(name)) {
                Some(Node::File(data)) => FakeChannel::finished(vec![data.clone()], vec![], 0),
                _ => FakeChannel::finished(
                    vec![],
                    vec![format!("cat: {name}: No such file or directory\n").into_bytes()],
                    1,
                ),
            },
            &["exit", code] => FakeChannel::finished(vec![], vec![], code.parse().unwrap_or(2)),
            &["echo", text, ">", name] => {
                let path = resolve(name);
                state
                    .nodes
                    .insert(path, Node::File(format!("{text}\n").into_bytes()));
                FakeChannel::finished(vec![], vec![], 0)
            }
            &["mkdir", name] => {
                let path = resolve(name);
                state.nodes.insert(path, Node::Dir { mode: 0o755 });
                FakeChannel::finished(vec![], vec![], 0)
            }
            &["hang"] => {
                let mut channel = FakeChannel::finished(vec![b"working...\n".to_vec()], vec![], 130);
                channel.hang = true;
                channel.trigger = state.cancel_on_hang.clone();
                channel
            }
            _ => FakeChannel::finished(
                vec![],
                vec![format!("{body}: command not found\n").into_bytes()],
                127,
            ),
        }
    }
}

impl RemoteFs for FakeHost {
    fn stat(&mut self, path: &str) -> Result<RemoteEntry, RemoteError> {
        let path = norm(path);
        let state = self.state.lock().unwrap();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        match state.nodes.get(&path) {
            Some(Node::Dir { .. }) => Ok(RemoteEntry::directory(name)),
            Some(Node::File(data)) => Ok(RemoteEntry::file(name, data.len() as u64)),
            None if path.is_empty() => Ok(RemoteEntry::directory(name)),
            None => Err(RemoteError::NotFound(path)),
        }
    }

    fn mkdir(&mut self, path: &str, mode: i32) -> Result<(), RemoteError> {
        let path = norm(path);
        let mut state = self.state.lock().unwrap();
        if state.nodes.contains_key(&path) {
            return Err(io_err(io::ErrorKind::AlreadyExists, &path));
        }
        if !state.is_dir(parent_of(&path)) {
            return Err(RemoteError::NotFound(path));
        }
        state.nodes.insert(path, Node::Dir { mode });
        Ok(())
    }

    fn put(&mut self, source: &mut dyn Read, path: &str) -> Result<u64, RemoteError> {
        let path = norm(path);
        let mut state = self.state.lock().unwrap();
        if !state.is_dir(parent_of(&path)) {
            return Err(RemoteError::NotFound(path));
        }
        if let Some(name) = &state.fail_put_named {
            if path.rsplit('/').next() == Some(name.as_str()) {
                return Err(io_err(io::ErrorKind::PermissionDenied, &path));
            }
        }

        let mut data = Vec::new();
        source
            .read_to_end(&mut data)
            .map_err(|e| RemoteError::io(path.clone(), e))?;
        let written = data.len() as u64;
        state.nodes.insert(path, Node::File(data));
        state.puts += 1;

        if let Some((limit, token)) = &state.cancel_after_puts {
            if state.puts >= *limit {
                token.cancel();
            }
        }
        Ok(written)
    }

    fn get(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, RemoteError> {
        let path = norm(path);
        let state = self.state.lock().unwrap();
        match state.nodes.get(&path) {
            Some(Node::File(data)) => {
                sink.write_all(data).map_err(|e| RemoteError::io(path.clone(), e))?;
                Ok(data.len() as u64)
            }
            _ => Err(RemoteError::NotFound(path)),
        }
    }

    fn remove(&mut self, path: &str) -> Result<(), RemoteError> {
        let path = norm(path);
        let mut state = self.state.lock().unwrap();
        match state.nodes.get(&path) {
            Some(Node::File(_)) => {
                state.nodes.remove(&path);
                Ok(())
            }
            _ => Err(RemoteError::NotFound(path)),
        }
    }

    fn rmdir(&mut self, path: &str) -> Result<(), RemoteError> {
        let path = norm(path);
        let mut state = self.state.lock().unwrap();
        if !matches!(state.nodes.get(&path), Some(Node::Dir { .. })) {
            return Err(RemoteError::NotFound(path));
        }
        if !state.children(&path).is_empty() {
            return Err(io_err(io::ErrorKind::Other, &path));
        }
        state.nodes.remove(&path);
        Ok(())
    }

    fn listdir(&mut self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let path = norm(path);
        let state = self.state.lock().unwrap();
        if !state.is_dir(&path) {
            return Err(RemoteError::NotFound(path));
        }
        Ok(state
            .children(&path)
            .into_iter()
            .map(|(name, node)| match node {
                Node::Dir { .. } => RemoteEntry::directory(name),
                Node::File(data) => RemoteEntry::file(name, data.len() as u64),
            })
            .collect())
    }
}

impl RemoteShell for FakeHost {
    type Channel = FakeChannel;

    fn exec(&mut self, command: &str, _allocate_pty: bool) -> Result<FakeChannel, RemoteError> {
        Ok(self.shell(command))
    }
}

/// Scripted remote process.
pub struct FakeChannel {
    stdout: VecDeque<Vec<u8>>,
    stderr: VecDeque<Vec<u8>>,
    exit_status: i32,
    /// Exit status is reported ready before any output has been read
    pub early_exit: bool,
    /// Every n-th readiness check reports nothing pending (0 disables)
    pub stall_every: usize,
    polls: usize,
    hang: bool,
    trigger: Option<CancelToken>,
    interrupted: bool,
    pub sent: Arc<Mutex<Vec<u8>>>,
    pub poll_timeout: Option<Duration>,
}

impl FakeChannel {
    pub fn finished(stdout: Vec<Vec<u8>>, stderr: Vec<Vec<u8>>, exit_status: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status,
            early_exit: false,
            stall_every: 0,
            polls: 0,
            hang: false,
            trigger: None,
            interrupted: false,
            sent: Arc::new(Mutex::new(Vec::new())),
            poll_timeout: None,
        }
    }

    /// A process that never exits until it receives an interrupt byte, and
    /// cancels `token` the first time it is polled.
    pub fn hanging(token: CancelToken) -> Self {
        let mut channel = Self::finished(vec![], vec![], 130);
        channel.hang = true;
        channel.trigger = Some(token);
        channel
    }

    fn drained(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    fn stalled(&mut self) -> bool {
        self.polls += 1;
        if let Some(token) = &self.trigger {
            token.cancel();
        }
        !self.early_exit && self.stall_every > 0 && self.polls % self.stall_every == 0
    }
}

fn read_chunk(queue: &mut VecDeque<Vec<u8>>, buf: &mut [u8]) -> usize {
    let Some(mut chunk) = queue.pop_front() else {
        return 0;
    };
    let n = chunk.len().min(buf.len());
    buf[..n].copy_from_slice(&chunk[..n]);
    if n < chunk.len() {
        queue.push_front(chunk.split_off(n));
    }
    n
}

impl RemoteChannel for FakeChannel {
    fn set_poll_timeout(&mut self, timeout: Duration) {
        self.poll_timeout = Some(timeout);
    }

    fn stdout_ready(&mut self) -> io::Result<bool> {
        Ok(!self.stalled() && !self.stdout.is_empty())
    }

    fn stderr_ready(&mut self) -> io::Result<bool> {
        Ok(!self.stalled() && !self.stderr.is_empty())
    }

    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(read_chunk(&mut self.stdout, buf))
    }

    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(read_chunk(&mut self.stderr, buf))
    }

    fn exit_status_ready(&mut self) -> bool {
        if self.hang {
            return self.interrupted;
        }
        self.early_exit || self.drained()
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.sent.lock().unwrap().extend_from_slice(data);
        if data.contains(&INTERRUPT) {
            self.interrupted = true;
        }
        Ok(())
    }

    fn wait_exit_status(&mut self) -> io::Result<i32> {
        if self.hang && !self.interrupted {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "process never exits without an interrupt",
            ));
        }
        Ok(self.exit_status)
    }
}

/// Hands out clones of one fake host and counts calls.
#[derive(Clone, Default)]
pub struct FakeConnector {
    pub host: FakeHost,
    pub connects: Arc<AtomicUsize>,
    pub refuse_connection: bool,
    pub reject_credentials: bool,
}

impl FakeConnector {
    pub fn new(host: FakeHost) -> Self {
        Self {
            host,
            ..Self::default()
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    type Transport = ();
    type Host = FakeHost;

    fn connect(&self, params: &ConnectionParams) -> Result<(), SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse_connection {
            return Err(SessionError::Connection {
                address: format!("{}:{}", params.address, params.port),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    fn authenticate(&self, _transport: (), params: &ConnectionParams) -> Result<FakeHost, SessionError> {
        if self.reject_credentials {
            return Err(SessionError::Authentication {
                username: params.username.clone(),
                reason: "permission denied".into(),
            });
        }
        Ok(self.host.clone())
    }
}

/// Write a local tree from `(relative path, content)` pairs.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }
}
