// ABOUTME: Download direction of tree sync: mirrors a remote directory onto local storage
// Conflicting local files are confirmed per file; clear mode deletes what was fetched

use super::{SyncError, TreeSync};
use crate::models::{RemoteEntry, SyncReport};
use crate::remote::{join_remote, RemoteFs};
use crate::session::progress::{ProgressReporter, Status};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

enum Task {
    Visit { remote: String, local: PathBuf },
    /// Queued beneath a directory's children so it runs once they are done
    RemoveDir(String),
}

impl TreeSync<'_> {
    /// Pull `remote_root` into `local_root` depth-first. With `clear`, each
    /// fetched file and every emptied subdirectory is removed remotely.
    pub fn sync_down<F: RemoteFs + ?Sized>(
        &mut self,
        host: &mut F,
        remote_root: &str,
        local_root: &Path,
        clear: bool,
        progress: &mut ProgressReporter,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        let mut pending = vec![Task::Visit {
            remote: remote_root.to_string(),
            local: local_root.to_path_buf(),
        }];

        while let Some(task) = pending.pop() {
            self.check_cancelled()?;

            match task {
                Task::Visit { remote, local } => {
                    debug!("Entering directory: {}", remote);
                    fs::create_dir_all(&local).map_err(|e| SyncError::local(&local, e))?;

                    let mut entries = host.listdir(&remote)?;
                    entries.sort_by(|a, b| b.name.cmp(&a.name));

                    let mut files = Vec::new();
                    for entry in entries {
                        let child_remote = join_remote(&remote, &entry.name);
                        let child_local = local.join(&entry.name);
                        if entry.is_dir() {
                            if clear {
                                pending.push(Task::RemoveDir(child_remote.clone()));
                            }
                            pending.push(Task::Visit {
                                remote: child_remote,
                                local: child_local,
                            });
                            report.directories += 1;
                        } else {
                            files.push((entry, child_remote, child_local));
                        }
                    }

                    for (entry, child_remote, child_local) in files.into_iter().rev() {
                        self.check_cancelled()?;
                        self.download_file(
                            host,
                            &entry,
                            &child_remote,
                            &child_local,
                            clear,
                            &mut report,
                            progress,
                        )?;
                    }
                }
                Task::RemoveDir(remote) => {
                    // Declined overwrites leave their remote file behind.
                    let leftovers = host.listdir(&remote)?.len();
                    if leftovers > 0 {
                        debug!("Keeping remote directory {} ({} entries left)", remote, leftovers);
                        continue;
                    }
                    host.rmdir(&remote)?;
                    debug!("Deleted remote directory: {}", remote);
                }
            }
        }

        info!("Download finished: {}", report.format());
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn download_file<F: RemoteFs + ?Sized>(
        &mut self,
        host: &mut F,
        entry: &RemoteEntry,
        remote: &str,
        local: &Path,
        clear: bool,
        report: &mut SyncReport,
        progress: &mut ProgressReporter,
    ) -> Result<(), SyncError> {
        debug!("Processing file: {}", remote);

        if local.is_file() && !self.options.force && !self.prompt.confirm_overwrite(local) {
            debug!("Skipped: {}", remote);
            report.skipped += 1;
            return Ok(());
        }

        progress.report(&Status::Transferring {
            from: remote.to_string(),
            to: local.display().to_string(),
        });
        let mut file = File::create(local).map_err(|e| SyncError::local(local, e))?;
        let bytes = host.get(remote, &mut file)?;
        debug!("Downloaded: {} to {} ({} of {:?} bytes)", remote, local.display(), bytes, entry.size);
        report.files += 1;
        report.bytes += bytes;

        if clear {
            host.remove(remote)?;
            debug!("Deleted remote file: {}", remote);
        }
        Ok(())
    }
}
