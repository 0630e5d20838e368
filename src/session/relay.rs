// ABOUTME: Relays a running remote process's stdout/stderr to the local console until it exits
// Stops early on local interrupt and always finalizes the channel the same way

use crate::cancel::CancelToken;
use crate::config::SessionConfig;
use crate::models::ProcessResult;
use crate::remote::{RemoteChannel, RemoteError};
use crate::session::progress::{ProgressReporter, Status};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Ctrl-C, sent to the remote pty when the relay stops.
pub const INTERRUPT: u8 = 0x03;
/// Ctrl-D, sent after the interrupt to close remote input.
pub const END_OF_INPUT: u8 = 0x04;

pub const DEFAULT_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Upper bound on each readiness check
    pub poll_timeout: Duration,
    /// Pause between idle iterations
    pub poll_interval: Duration,
    pub chunk_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from_session(&SessionConfig::default())
    }
}

impl RelayConfig {
    pub fn from_session(session: &SessionConfig) -> Self {
        Self {
            poll_timeout: session.poll_timeout(),
            poll_interval: session.poll_interval(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Local destinations for remote output.
pub struct Console {
    pub stdout: Box<dyn Write + Send>,
    pub stderr: Box<dyn Write + Send>,
}

impl Console {
    pub fn new(stdout: Box<dyn Write + Send>, stderr: Box<dyn Write + Send>) -> Self {
        Self { stdout, stderr }
    }

    pub fn terminal() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()))
    }
}

enum LoopExit {
    Completed,
    Interrupted,
    Failed(io::Error),
}

pub struct StreamRelay {
    config: RelayConfig,
    cancel: CancelToken,
}

impl StreamRelay {
    pub fn new(config: RelayConfig, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    /// Forward output until the process exits or the cancel token fires, then
    /// send interrupt and end-of-input and collect the exit status.
    pub fn drive<C: RemoteChannel + ?Sized>(
        &self,
        channel: &mut C,
        console: &mut Console,
        progress: &mut ProgressReporter,
    ) -> Result<ProcessResult, RemoteError> {
        channel.set_poll_timeout(self.config.poll_timeout);

        let (drained, interrupted) = match self.pump(channel, console) {
            LoopExit::Completed => (true, false),
            LoopExit::Interrupted => (false, true),
            LoopExit::Failed(e) => {
                warn!("Output relay stopped: {}", e);
                (false, false)
            }
        };

        if interrupted {
            progress.report(&Status::Interrupted);
        }
        progress.report(&Status::OutputEnd);

        for byte in [INTERRUPT, END_OF_INPUT] {
            if let Err(e) = channel.send(&[byte]) {
                debug!("Ignoring failed control write {:#04x}: {}", byte, e);
            }
        }

        let exit_status = channel
            .wait_exit_status()
            .map_err(|source| RemoteError::io("exit status", source))?;
        progress.report(&Status::ExitReported { code: exit_status });

        Ok(ProcessResult {
            exit_status,
            drained,
            interrupted,
        })
    }

    fn pump<C: RemoteChannel + ?Sized>(&self, channel: &mut C, console: &mut Console) -> LoopExit {
        let mut buf = vec![0u8; self.config.chunk_size.max(1)];

        loop {
            if self.cancel.is_cancelled() {
                return LoopExit::Interrupted;
            }

            let progressed = match forward_ready(channel, console, &mut buf) {
                Ok(progressed) => progressed,
                Err(e) => return LoopExit::Failed(e),
            };

            if channel.exit_status_ready() {
                // Output can still be buffered after the exit notice.
                loop {
                    match forward_ready(channel, console, &mut buf) {
                        Ok(true) => {}
                        Ok(false) => return LoopExit::Completed,
                        Err(e) => return LoopExit::Failed(e),
                    }
                }
            }

            if !progressed && !self.config.poll_interval.is_zero() {
                thread::sleep(self.config.poll_interval);
            }
        }
    }
}

/// Forward at most one chunk from each ready stream. Returns whether any bytes moved.
fn forward_ready<C: RemoteChannel + ?Sized>(
    channel: &mut C,
    console: &mut Console,
    buf: &mut [u8],
) -> io::Result<bool> {
    let mut progressed = false;

    if channel.stdout_ready()? {
        let n = channel.read_stdout(buf)?;
        console.stdout.write_all(&buf[..n])?;
        console.stdout.flush()?;
        progressed |= n > 0;
    }

    if channel.stderr_ready()? {
        let n = channel.read_stderr(buf)?;
        console.stderr.write_all(&buf[..n])?;
        console.stderr.flush()?;
        progressed |= n > 0;
    }

    Ok(progressed)
}
