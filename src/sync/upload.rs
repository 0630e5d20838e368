// ABOUTME: Upload direction of tree sync: mirrors a local directory onto a remote one
// One-way push into a fresh scratch directory, so files are overwritten unconditionally

use super::{PathFilter, SyncError, TreeSync};
use crate::models::SyncReport;
use crate::remote::{join_remote, RemoteError, RemoteFs};
use crate::session::progress::{ProgressReporter, Status};
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const REMOTE_DIR_MODE: i32 = 0o755;

impl TreeSync<'_> {
    /// Push `local_root` into `remote_root` depth-first. The root itself is
    /// never filtered; everything beneath it is.
    pub fn sync_up<F: RemoteFs + ?Sized>(
        &self,
        host: &mut F,
        local_root: &Path,
        remote_root: &str,
        progress: &mut ProgressReporter,
    ) -> Result<SyncReport, SyncError> {
        let filter = PathFilter::new(local_root, self.options.exclude.as_deref());
        let mut report = SyncReport::default();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut pending: Vec<(PathBuf, String)> =
            vec![(local_root.to_path_buf(), remote_root.to_string())];

        while let Some((local, remote)) = pending.pop() {
            self.check_cancelled()?;

            let metadata = fs::metadata(&local).map_err(|e| SyncError::local(&local, e))?;
            if metadata.is_dir() {
                let canonical = fs::canonicalize(&local).map_err(|e| SyncError::local(&local, e))?;
                if !visited.insert(canonical) {
                    warn!("Skipping directory already visited through a link: {}", local.display());
                    continue;
                }

                ensure_remote_dir(host, &remote, &mut report)?;

                let mut children = Vec::new();
                for entry in fs::read_dir(&local).map_err(|e| SyncError::local(&local, e))? {
                    let entry = entry.map_err(|e| SyncError::local(&local, e))?;
                    children.push(entry.path());
                }
                children.sort();

                // Reverse so the stack pops children in name order.
                for child in children.into_iter().rev() {
                    if filter.should_ignore(&child) {
                        debug!("Ignoring: {}", child.display());
                        report.ignored += 1;
                        continue;
                    }
                    let name = child
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let child_remote = join_remote(&remote, &name);
                    pending.push((child, child_remote));
                }
            } else {
                progress.report(&Status::Transferring {
                    from: local.display().to_string(),
                    to: remote.clone(),
                });
                let mut file = File::open(&local).map_err(|e| SyncError::local(&local, e))?;
                let bytes = host.put(&mut file, &remote)?;
                debug!("Uploaded {} -> {} ({} bytes)", local.display(), remote, bytes);
                report.files += 1;
                report.bytes += bytes;
            }
        }

        info!("Upload finished: {}", report.format());
        Ok(report)
    }
}

/// Stat `path` and create it when the server says it does not exist. Any other
/// stat failure is fatal.
fn ensure_remote_dir<F: RemoteFs + ?Sized>(
    host: &mut F,
    path: &str,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    match host.stat(path) {
        Ok(entry) if entry.is_dir() => Ok(()),
        Ok(_) => Err(RemoteError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists and is not a directory"),
        )
        .into()),
        Err(e) if e.is_not_found() => {
            debug!("Creating remote directory: {}", path);
            host.mkdir(path, REMOTE_DIR_MODE)?;
            report.directories += 1;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
