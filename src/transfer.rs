//! Invocation of the external transfer and removal tools.
//!
//! Every operation is a direct, awaited subprocess call. One invocation is
//! in flight at a time, each is wall-clock measured, and a failure is
//! logged but never retried: the next flush or the next full resync is the
//! recovery path.

use std::collections::BTreeSet;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use tokio::process::Command;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::plan::{classify, plan, SyncStep};
use crate::session::SshCommand;

pub struct SyncExecutor {
    config: Arc<SyncConfig>,
    ssh: SshCommand,
}

impl SyncExecutor {
    pub fn new(config: Arc<SyncConfig>) -> Self {
        let ssh = SshCommand::new(&config);
        Self { config, ssh }
    }

    /// Classify a flushed pending set and execute the resulting steps.
    pub async fn sync_batch(&self, pending: BTreeSet<String>) {
        let batch = classify(&self.config.local_dir, pending);
        for path in &batch.updated {
            info!("  * UPL: {}", path);
        }
        for path in &batch.deleted {
            info!("  * DEL: {}", path);
        }

        for step in plan(batch) {
            self.run(&step).await;
        }
    }

    pub async fn run(&self, step: &SyncStep) {
        match step {
            SyncStep::Transfer(paths) => {
                info!("uploading {} file(s)", paths.len());
                self.transfer(paths).await;
            }
            SyncStep::RemoveRemote(paths) => {
                info!("deleting {} remote file(s)", paths.len());
                self.remove_remote(paths).await;
            }
            SyncStep::FullResync => {
                self.full_resync().await;
            }
        }
    }

    /// Transfer the entire local tree.
    pub async fn full_resync(&self) {
        self.transfer(&["./".to_string()]).await;
    }

    /// Incremental transfer of the given relative paths, rooted at the
    /// local directory so the remote tree keeps the same layout.
    pub async fn transfer(&self, paths: &[String]) {
        // rsync output passes through to the console.
        let mut command = Command::new("rsync");
        command
            .args(rsync_args(&self.config, &self.ssh, paths))
            .current_dir(&self.config.local_dir)
            .stdin(Stdio::null());

        run_timed("rsync", command).await;
    }

    /// Remove the given relative paths on the remote host, over the active
    /// master connection's control socket.
    pub async fn remove_remote(&self, paths: &[String]) {
        let mut command = Command::new("ssh");
        command
            .args(self.ssh.base_args())
            .arg(&self.config.remote_address)
            .arg(remote_remove_command(&self.config.remote_dir, paths))
            .stdin(Stdio::null());

        run_timed("remote rm", command).await;
    }
}

/// Run one collaborator invocation, reporting outcome and elapsed time.
async fn run_timed(what: &str, mut command: Command) -> bool {
    let started = Instant::now();
    match command.status().await {
        Ok(status) if status.success() => {
            info!(
                "{} completed in {:.3} s",
                what,
                started.elapsed().as_secs_f64()
            );
            true
        }
        Ok(status) => {
            warn!(
                "{} failed after {:.3} s ({})",
                what,
                started.elapsed().as_secs_f64(),
                status
            );
            false
        }
        Err(err) => {
            warn!("{} could not be started: {}", what, err);
            false
        }
    }
}

/// Full rsync argument list for one transfer.
fn rsync_args(config: &SyncConfig, ssh: &SshCommand, paths: &[String]) -> Vec<String> {
    let mut args = vec![
        "-azER".to_string(),
        "-e".to_string(),
        ssh.command_line(),
    ];
    args.extend(config.rsync_args.iter().cloned());
    for pattern in config.exclude.patterns() {
        args.push(format!("--exclude={}", pattern));
    }
    args.extend(paths.iter().cloned());
    args.push(config.remote_path());
    args
}

/// Shell command executed on the remote side for a targeted removal.
fn remote_remove_command(remote_dir: &str, paths: &[String]) -> String {
    let quoted: Vec<String> = paths.iter().map(|p| shell_quote(p)).collect();
    format!(
        "cd {} && rm -rf {}",
        shell_quote(remote_dir),
        quoted.join(" ")
    )
}

/// Single-quote a string for the remote shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
