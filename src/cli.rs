// ABOUTME: Command-line arguments and their conversion into a run request and sync options

use crate::models::{RunMode, RunRequest, SyncOptions};
use clap::Parser;
use std::path::PathBuf;

/// Run a command on a remote host inside a fresh copy of a local directory.
#[derive(Parser, Debug)]
#[command(name = "rbox")]
#[command(version)]
pub struct Cli {
    /// The command to execute remotely; tokens are joined with spaces
    #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
    pub command: Vec<String>,

    /// Local directory to upload before running the command
    #[arg(short = 'd', long = "dir", value_name = "DIR", default_value = "./")]
    pub dir: PathBuf,

    /// Run the command in an empty workspace and download the results into DIR
    #[arg(short = 'l', long = "local", value_name = "DIR", conflicts_with = "dir")]
    pub local: Option<PathBuf>,

    /// Clear the remote directory before running; when downloading, delete remote files after fetching them
    #[arg(short, long)]
    pub clear: bool,

    /// Overwrite existing local files without asking
    #[arg(short, long)]
    pub force: bool,

    /// Comma or space separated names and globs to leave out of the upload
    #[arg(
        short,
        long,
        value_name = "LIST",
        num_args = 0..=1,
        default_missing_value = "./"
    )]
    pub exclude: Option<String>,

    /// Print debug logging to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Open an interactive ssh session in the uploaded directory
    #[arg(short, long)]
    pub interactive: bool,

    /// Pipe `yes` into the command to answer remote confirmations
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Use this config file instead of the default location
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn run_request(&self) -> RunRequest {
        let mode = match &self.local {
            Some(destination) => RunMode::Download {
                destination: destination.clone(),
            },
            None => RunMode::Upload {
                source: self.dir.clone(),
            },
        };

        RunRequest {
            command: self.command.clone(),
            mode,
            interactive: self.interactive,
            auto_confirm: self.yes,
        }
    }

    /// Sync options for this invocation. The remote root is filled in from
    /// the config once it is loaded.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            force: self.force,
            clear: self.clear,
            exclude: self.exclude.clone(),
            local_root: self.local.clone().unwrap_or_else(|| self.dir.clone()),
            ..SyncOptions::default()
        }
    }
}
