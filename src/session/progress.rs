// ABOUTME: Caller-owned progress reporter printing numbered session steps and output separators
// Each status kind is its own variant carrying only the fields it prints

use crate::models::SyncReport;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use std::io::{self, Write};
use tracing::debug;

const SEPARATOR_WIDTH: usize = 38;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Connecting { address: String, port: u16 },
    Authenticated { username: String },
    SftpReady,
    Synced { report: SyncReport },
    CommandSent { command: String },
    Transferring { from: String, to: String },
    Downloaded { report: SyncReport },
    OutputStart,
    OutputEnd,
    ExitReported { code: i32 },
    Interrupted,
}

impl Status {
    /// Whether this status marks a numbered step boundary.
    pub fn advances_step(&self) -> bool {
        match self {
            Status::Connecting { .. }
            | Status::Authenticated { .. }
            | Status::SftpReady
            | Status::Synced { .. }
            | Status::CommandSent { .. } => true,
            Status::Transferring { .. }
            | Status::Downloaded { .. }
            | Status::OutputStart
            | Status::OutputEnd
            | Status::ExitReported { .. }
            | Status::Interrupted => false,
        }
    }
}

pub struct ProgressReporter {
    out: Box<dyn Write + Send>,
    step: usize,
    total: usize,
}

impl ProgressReporter {
    pub fn new(out: Box<dyn Write + Send>, total: usize) -> Self {
        Self { out, step: 0, total }
    }

    pub fn stdout(total: usize) -> Self {
        Self::new(Box::new(io::stdout()), total)
    }

    pub fn set_total(&mut self, total: usize) {
        self.total = total;
    }

    pub fn report(&mut self, status: &Status) {
        if let Err(e) = self.write_status(status) {
            debug!("Failed to write status line: {}", e);
        }
    }

    fn write_status(&mut self, status: &Status) -> io::Result<()> {
        if status.advances_step() {
            self.step += 1;
            self.clear_line()?;
            write!(
                self.out,
                "{}\t",
                format!("[{}/{}]", self.step, self.total).dark_grey().bold()
            )?;
        }

        match status {
            Status::Connecting { address, port } => writeln!(
                self.out,
                "Connecting to: {}:{}",
                address.as_str().cyan().italic(),
                port.to_string().magenta().italic()
            )?,
            Status::Authenticated { username } => writeln!(
                self.out,
                "Authenticated as: {}",
                username.as_str().green().italic()
            )?,
            Status::SftpReady => writeln!(self.out, "Established SFTP connection")?,
            Status::Synced { report } => writeln!(
                self.out,
                "Synced local files to remote {}",
                format!("({})", report.format()).dark_grey()
            )?,
            Status::CommandSent { command } => {
                writeln!(self.out, "Command sent: {}", command.as_str().yellow())?;
            }
            Status::Transferring { from, to } => {
                self.clear_line()?;
                let line = fit_to_terminal(&format!("Transferring file: {from} -> {to}"));
                write!(self.out, "{line}")?;
            }
            Status::Downloaded { report } => {
                self.clear_line()?;
                writeln!(self.out, "Downloaded remote files ({})", report.format())?;
            }
            Status::OutputStart => writeln!(
                self.out,
                "{}",
                "=============== Output ===============".magenta().bold()
            )?,
            Status::OutputEnd => {
                writeln!(self.out, "{}", "=".repeat(SEPARATOR_WIDTH).magenta().bold())?;
            }
            Status::ExitReported { code } => {
                let label = format!("Exit status: {code}");
                if *code == 0 {
                    writeln!(self.out, "{}", label.green().bold())?;
                } else {
                    writeln!(self.out, "{}", label.red().bold())?;
                }
            }
            Status::Interrupted => {
                writeln!(self.out)?;
                writeln!(self.out, "{}", "Connection closed by user.".red())?;
            }
        }
        self.out.flush()
    }

    fn clear_line(&mut self) -> io::Result<()> {
        self.out.write_all(b"\r")?;
        self.out.queue(Clear(ClearType::CurrentLine))?;
        Ok(())
    }
}

fn fit_to_terminal(line: &str) -> String {
    match crossterm::terminal::size() {
        Ok((cols, _)) if cols > 0 => line.chars().take(usize::from(cols)).collect(),
        _ => line.to_string(),
    }
}
