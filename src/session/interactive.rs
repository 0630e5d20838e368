// ABOUTME: Hands the terminal to a real `ssh -t` session running inside the scratch directory
// The remote shell removes the scratch directory itself once the user leaves

use crate::config::{AuthMethod, ConnectionParams};
use crate::error::EXIT_FAILURE;
use crate::models::WorkspacePath;
use std::io;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Program plus arguments for a local child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Runs a child process attached to the user's terminal.
pub trait InteractiveLauncher {
    fn launch(&self, command: &LaunchCommand) -> io::Result<i32>;
}

pub struct SystemLauncher;

impl InteractiveLauncher for SystemLauncher {
    fn launch(&self, command: &LaunchCommand) -> io::Result<i32> {
        info!("Launching interactive session via {}", command.program);
        let status = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(status.code().unwrap_or(EXIT_FAILURE))
    }
}

/// Remote script: run the command in the scratch directory, leave the user in
/// a shell there, then delete the directory when that shell exits.
pub fn remote_script(scratch: &WorkspacePath, user_command: &str) -> String {
    let path = scratch.path();
    let quoted = if path.starts_with('/') {
        shell_words::quote(&path).into_owned()
    } else {
        format!("~/{}", shell_words::quote(&path))
    };
    let mut script = format!("cd {quoted}");
    if !user_command.trim().is_empty() {
        script.push_str(" && ");
        script.push_str(user_command);
    }
    script.push_str("; bash; rm -rf ");
    script.push_str(&quoted);
    script
}

/// Build the `ssh -t` invocation. A stored password is passed through
/// `sshpass` when it is installed; otherwise ssh asks for it itself.
pub fn build_ssh_command(
    params: &ConnectionParams,
    scratch: &WorkspacePath,
    user_command: &str,
    sshpass_available: bool,
) -> LaunchCommand {
    let mut ssh_args = vec!["-t".to_string(), "-p".to_string(), params.port.to_string()];
    if let AuthMethod::Key { key_path, .. } = &params.auth {
        ssh_args.push("-i".into());
        ssh_args.push(key_path.display().to_string());
    }
    ssh_args.push(format!("{}@{}", params.username, params.address));
    ssh_args.push(remote_script(scratch, user_command));

    match params.auth.password() {
        Some(password) if sshpass_available => {
            let mut args = vec!["-p".to_string(), password.to_string(), "ssh".to_string()];
            args.extend(ssh_args);
            LaunchCommand {
                program: "sshpass".into(),
                args,
            }
        }
        _ => LaunchCommand {
            program: "ssh".into(),
            args: ssh_args,
        },
    }
}

pub fn sshpass_available() -> bool {
    let found = which::which("sshpass").is_ok();
    debug!("sshpass available: {}", found);
    found
}
