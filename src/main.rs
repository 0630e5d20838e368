// ABOUTME: Main entry point for rbox: parses arguments and runs one remote session

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use rbox::cancel::{CancelToken, InterruptAction};
use rbox::cli::Cli;
use rbox::config::AppConfig;
use rbox::error::EXIT_INTERRUPTED;
use rbox::remote::SshConnector;
use rbox::session::SessionOrchestrator;
use std::path::PathBuf;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    setup_panic_handler();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => {
            let path = AppConfig::default_path()?;
            if !path.exists() {
                AppConfig::write_template(&path)
                    .with_context(|| format!("creating {}", path.display()))?;
                info!("Wrote config template to {}", path.display());
                println!("Config file created @ {}", path.display().to_string().cyan());
                println!("Fill in your server and credentials, then run rbox again.");
                return Ok(());
            }
            path
        }
    };

    let cancel = CancelToken::new();
    let listener = cancel.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match listener.interrupt() {
                InterruptAction::Cancel => warn!("Interrupt received"),
                InterruptAction::Exit => {
                    warn!("Interrupt received while the session cannot stop on its own");
                    let _ = crossterm::terminal::disable_raw_mode();
                    eprintln!();
                    eprintln!("{}", "Connection closed by user.".red());
                    std::process::exit(EXIT_INTERRUPTED);
                }
            }
        }
    });

    let request = cli.run_request();
    let options = cli.sync_options();
    let code = tokio::task::spawn_blocking(move || {
        let mut orchestrator = SessionOrchestrator::new(SshConnector, cancel);
        orchestrator.run(&config_path, &request, options)
    })
    .await
    .context("session thread panicked")?;

    info!("Exiting with status {}", code);
    std::process::exit(code);
}

fn setup_logging(verbose: bool) {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let log_dir = directories::ProjectDirs::from("", "", "rbox")
        .map(|dirs| dirs.data_local_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from(".rbox-logs"));
    let _ = std::fs::create_dir_all(&log_dir);

    let log_file = log_dir.join(format!(
        "rbox-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));
    let file_layer = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .ok()
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false)
        });

    let stderr_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let default_filter = if verbose { "rbox=debug" } else { "rbox=info" };
    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

fn setup_panic_handler() {
    use tracing::error;

    std::panic::set_hook(Box::new(|panic_info| {
        let _ = crossterm::terminal::disable_raw_mode();
        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs for more details.");
    }));
}
