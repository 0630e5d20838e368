// ABOUTME: Runs one end-to-end session: connect, prepare the workspace, sync, execute, clean up
// Owns the scratch directory lifecycle and turns every outcome into a process exit code

use crate::cancel::CancelToken;
use crate::config::{AppConfig, ConnectionParams};
use crate::error::{SessionError, EXIT_INTERRUPTED};
use crate::models::{ProcessResult, RunMode, RunRequest, SyncOptions, WorkspacePath};
use crate::remote::{Connector, RemoteShell};
use crate::session::interactive::{
    build_ssh_command, sshpass_available, InteractiveLauncher, SystemLauncher,
};
use crate::session::progress::{ProgressReporter, Status};
use crate::session::relay::{Console, RelayConfig, StreamRelay};
use crate::session::workspace::WorkspaceManager;
use crate::sync::{OverwritePrompt, TreeSync};
use crossterm::style::Stylize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    LoadingConfig,
    Connecting,
    Authenticating,
    PreparingWorkspace,
    Uploading,
    Running,
    Downloading,
    HandedOff,
    Cleanup,
    Finished,
}

impl Phase {
    /// Whether the work done in this phase checks the cancel token. A Ctrl-C
    /// during any other phase ends the process directly.
    pub fn polls_cancel(self) -> bool {
        match self {
            Phase::PreparingWorkspace
            | Phase::Uploading
            | Phase::Running
            | Phase::Downloading
            | Phase::HandedOff
            | Phase::Cleanup => true,
            Phase::Idle
            | Phase::LoadingConfig
            | Phase::Connecting
            | Phase::Authenticating
            | Phase::Finished => false,
        }
    }
}

enum Outcome {
    Finished(ProcessResult),
    /// Exit code of the interactive ssh client; the remote shell owns cleanup
    HandedOff(i32),
}

/// Per-run values shared by the mode-specific steps.
struct Job<'a> {
    params: &'a ConnectionParams,
    scratch: &'a WorkspacePath,
    options: &'a SyncOptions,
    relay: RelayConfig,
    auto_confirm: bool,
}

pub struct SessionOrchestrator<C: Connector> {
    connector: C,
    cancel: CancelToken,
    progress: ProgressReporter,
    console: Console,
    prompt: Option<Box<dyn OverwritePrompt + Send>>,
    launcher: Box<dyn InteractiveLauncher + Send>,
    relay_config: Option<RelayConfig>,
    phase: Phase,
}

impl<C: Connector> SessionOrchestrator<C> {
    pub fn new(connector: C, cancel: CancelToken) -> Self {
        Self {
            connector,
            cancel,
            progress: ProgressReporter::stdout(0),
            console: Console::terminal(),
            prompt: None,
            launcher: Box::new(SystemLauncher),
            relay_config: None,
            phase: Phase::Idle,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Replace the terminal overwrite prompt used when downloading.
    #[must_use]
    pub fn with_prompt(mut self, prompt: Box<dyn OverwritePrompt + Send>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    #[must_use]
    pub fn with_launcher(mut self, launcher: Box<dyn InteractiveLauncher + Send>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Override the relay timings that would otherwise come from the config file.
    #[must_use]
    pub fn with_relay_config(mut self, relay_config: RelayConfig) -> Self {
        self.relay_config = Some(relay_config);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Load the config at `config_path` and run the session. Returns the
    /// process exit code.
    pub fn run(&mut self, config_path: &Path, request: &RunRequest, options: SyncOptions) -> i32 {
        self.enter(Phase::LoadingConfig);
        match AppConfig::load_from(config_path) {
            Ok(config) => self.execute(&config, config_path, request, options),
            Err(source) => {
                let err = SessionError::Configuration {
                    path: config_path.to_path_buf(),
                    source,
                };
                let code = self.fail(&err, config_path);
                self.enter(Phase::Finished);
                code
            }
        }
    }

    /// Run the session with an already loaded config. `options.remote_root`
    /// is replaced by the config's persistent root.
    pub fn execute(
        &mut self,
        config: &AppConfig,
        config_path: &Path,
        request: &RunRequest,
        options: SyncOptions,
    ) -> i32 {
        let code = match self.try_execute(config, request, options) {
            Ok(code) => code,
            Err(err) => self.fail(&err, config_path),
        };
        self.enter(Phase::Finished);
        code
    }

    fn try_execute(
        &mut self,
        config: &AppConfig,
        request: &RunRequest,
        mut options: SyncOptions,
    ) -> Result<i32, SessionError> {
        options.remote_root.clone_from(&config.session.remote_root);
        let params = config.connection_params();
        let relay = self
            .relay_config
            .unwrap_or_else(|| RelayConfig::from_session(&config.session));
        self.progress.set_total(request.mode.total_steps());

        self.enter(Phase::Connecting);
        self.progress.report(&Status::Connecting {
            address: params.address.clone(),
            port: params.port,
        });
        let transport = self.connector.connect(&params)?;

        self.enter(Phase::Authenticating);
        let mut host = self.connector.authenticate(transport, &params)?;
        self.progress.report(&Status::Authenticated {
            username: params.username.clone(),
        });

        self.enter(Phase::PreparingWorkspace);
        let workspace = WorkspaceManager::new(options.remote_root.clone(), self.cancel.clone())
            .with_retry_delay(config.session.clear_retry_delay());
        if options.clear {
            let attempts = workspace.clear_persistent_root(&mut host)?;
            debug!("Cleared {} after {} attempt(s)", workspace.root(), attempts);
        }
        workspace.ensure_persistent_root(&mut host)?;
        self.progress.report(&Status::SftpReady);
        let scratch = workspace.allocate_scratch(&mut host)?;

        let auto_confirm = request.auto_confirm
            || request
                .program()
                .is_some_and(|program| config.session.wants_auto_confirm(program));
        let job = Job {
            params: &params,
            scratch: &scratch,
            options: &options,
            relay,
            auto_confirm,
        };

        let outcome = match &request.mode {
            RunMode::Upload { source } => self.upload_and_run(&mut host, &job, request, source),
            RunMode::Download { destination } => {
                if request.interactive {
                    warn!("Interactive mode is not available when downloading; relaying output instead");
                }
                self.run_and_download(&mut host, &job, request, destination)
            }
        };

        if let Ok(Outcome::HandedOff(code)) = outcome {
            info!("Interactive session ended with status {}", code);
            return Ok(code);
        }

        self.enter(Phase::Cleanup);
        workspace.release(&mut host, &scratch);

        outcome.map(|outcome| match outcome {
            Outcome::Finished(result) => exit_code(&result),
            Outcome::HandedOff(code) => code,
        })
    }

    fn upload_and_run(
        &mut self,
        host: &mut C::Host,
        job: &Job<'_>,
        request: &RunRequest,
        source: &Path,
    ) -> Result<Outcome, SessionError> {
        self.enter(Phase::Uploading);
        let tree = TreeSync::new(job.options, self.cancel.clone());
        let report = tree.sync_up(host, source, &job.scratch.path(), &mut self.progress)?;
        self.progress.report(&Status::Synced { report });

        let command_line = request.command_line();
        if request.interactive {
            return self.hand_off(job, &command_line);
        }
        self.run_command(host, job, &command_line).map(Outcome::Finished)
    }

    fn run_and_download(
        &mut self,
        host: &mut C::Host,
        job: &Job<'_>,
        request: &RunRequest,
        destination: &Path,
    ) -> Result<Outcome, SessionError> {
        let result = self.run_command(host, job, &request.command_line())?;
        if result.interrupted {
            info!("Skipping download after interrupt");
            return Ok(Outcome::Finished(result));
        }

        self.enter(Phase::Downloading);
        let mut tree = TreeSync::new(job.options, self.cancel.clone());
        if let Some(prompt) = self.prompt.take() {
            tree = tree.with_prompt(prompt);
        }
        let report = tree.sync_down(
            host,
            &job.scratch.path(),
            destination,
            job.options.clear,
            &mut self.progress,
        )?;
        self.progress.report(&Status::Downloaded { report });
        Ok(Outcome::Finished(result))
    }

    fn run_command(
        &mut self,
        host: &mut C::Host,
        job: &Job<'_>,
        command_line: &str,
    ) -> Result<ProcessResult, SessionError> {
        self.enter(Phase::Running);
        let command = WorkspaceManager::build_command(job.scratch, command_line, job.auto_confirm);
        debug!("Remote command: {}", command);
        self.progress.report(&Status::CommandSent {
            command: command_line.to_string(),
        });
        self.progress.report(&Status::OutputStart);

        let mut channel = host.exec(&command, true)?;
        let relay = StreamRelay::new(job.relay, self.cancel.clone());
        let result = relay.drive(&mut channel, &mut self.console, &mut self.progress)?;
        info!(
            "Remote command exited with status {} (interrupted: {})",
            result.exit_status, result.interrupted
        );
        Ok(result)
    }

    fn hand_off(&mut self, job: &Job<'_>, command_line: &str) -> Result<Outcome, SessionError> {
        self.enter(Phase::HandedOff);
        let command = build_ssh_command(job.params, job.scratch, command_line, sshpass_available());
        self.progress.report(&Status::CommandSent {
            command: command_line.to_string(),
        });
        self.progress.report(&Status::OutputStart);

        let code = self
            .launcher
            .launch(&command)
            .map_err(|source| SessionError::LocalIo {
                path: PathBuf::from(&command.program),
                source,
            })?;
        self.progress.report(&Status::OutputEnd);
        self.progress.report(&Status::ExitReported { code });
        Ok(Outcome::HandedOff(code))
    }

    fn fail(&mut self, err: &SessionError, config_path: &Path) -> i32 {
        if matches!(err, SessionError::Interrupted) {
            warn!("Session interrupted during {:?}", self.phase);
            self.progress.report(&Status::Interrupted);
            return err.exit_code();
        }

        error!("Session failed during {:?}: {}", self.phase, err);
        let _ = writeln!(self.console.stderr, "{}", format!("Error: {err}").red());
        if let Some(hint) = err.hint(config_path) {
            let _ = writeln!(self.console.stderr, "{}", hint.dark_grey());
        }
        let _ = self.console.stderr.flush();
        err.exit_code()
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Session phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.cancel.set_watched(phase.polls_cancel());
    }
}

/// The remote status, except that an interrupted run never reports success.
fn exit_code(result: &ProcessResult) -> i32 {
    if result.interrupted && result.success() {
        EXIT_INTERRUPTED
    } else {
        result.exit_status
    }
}
