//! Persistent SSH master connection lifecycle.
//!
//! One master connection is held open per watch cycle; rsync transfers and
//! remote commands multiplex over its control socket instead of paying a
//! fresh handshake each time.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::SyncConfig;

/// Control socket path template, keyed by local host, user, host and port.
pub const CONTROL_PATH: &str = "/tmp/sshsync-%L-%r@%h:%p";

/// The ssh option set shared by the master connection, rsync's transport
/// and remote commands. All three must agree on the control path for
/// multiplexing to work.
#[derive(Debug, Clone)]
pub struct SshCommand {
    identity: Option<PathBuf>,
    connect_timeout: u64,
}

impl SshCommand {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            identity: config.identity.clone(),
            connect_timeout: config.connect_timeout,
        }
    }

    /// Options common to every ssh invocation.
    pub fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "ControlMaster=auto".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", CONTROL_PATH),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout),
            "-o".to_string(),
            "ConnectionAttempts=1".to_string(),
        ];
        if let Some(identity) = &self.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args
    }

    /// Single-string form for rsync's `-e` option. Safe to join with
    /// spaces: none of the option values contain whitespace.
    pub fn command_line(&self) -> String {
        let mut parts = vec!["ssh".to_string()];
        parts.extend(self.base_args());
        parts.join(" ")
    }
}

/// One live master connection and its state machine:
/// Closed -> Opening -> Alive -> Closed.
pub struct SshSession {
    ssh: SshCommand,
    remote_address: String,
    connect_timeout: u64,
    child: Option<Child>,
    /// Kept so the master's stdout pipe stays open for its lifetime.
    _stdout: Option<BufReader<ChildStdout>>,
    closed: bool,
}

impl SshSession {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            ssh: SshCommand::new(config),
            remote_address: config.remote_address.clone(),
            connect_timeout: config.connect_timeout,
            child: None,
            _stdout: None,
            closed: false,
        }
    }

    /// Open the master connection.
    ///
    /// Any stale control socket left by a crashed predecessor is
    /// force-closed first, then a long-lived master is started with
    /// keepalives. Readiness means the remote echoed its banner line
    /// within the connect timeout and the process is still running.
    ///
    /// Returns `Ok(false)` on an ordinary open failure (timeout, auth,
    /// unreachable host); `Err` only when ssh could not be spawned at all.
    pub async fn open(&mut self) -> Result<bool> {
        self.exit_master().await;

        info!("opening master connection ...");
        let mut child = Command::new("ssh")
            .args(self.ssh.base_args())
            .arg("-M")
            .arg("-t")
            .arg("-o")
            .arg(format!("ServerAliveInterval={}", self.connect_timeout))
            .arg("-o")
            .arg("ServerAliveCountMax=1")
            .arg("-o")
            .arg("ControlPersist=1s")
            .arg(&self.remote_address)
            .arg("echo done && sleep infinity")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn ssh")?;

        let stdout = child.stdout.take().context("ssh spawned without stdout")?;
        let mut reader = BufReader::new(stdout);

        let mut banner = String::new();
        let ready = timeout(
            Duration::from_secs(self.connect_timeout),
            reader.read_line(&mut banner),
        )
        .await;

        let alive = matches!(child.try_wait(), Ok(None));
        match ready {
            Ok(Ok(n)) if n > 0 && alive => {
                info!("master connection ready: {}", banner.trim());
                self.child = Some(child);
                self._stdout = Some(reader);
                Ok(true)
            }
            Ok(Ok(_)) => {
                warn!("master connection failed");
                let _ = child.kill().await;
                Ok(false)
            }
            Ok(Err(err)) => {
                warn!("master connection failed: {}", err);
                let _ = child.kill().await;
                Ok(false)
            }
            Err(_) => {
                warn!(
                    "master connection not ready after {}s",
                    self.connect_timeout
                );
                let _ = child.kill().await;
                Ok(false)
            }
        }
    }

    /// Non-blocking check of whether the master process is still running.
    pub fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Tear the session down. Idempotent: only the first call performs the
    /// explicit exit; later calls are no-ops. Returns whether teardown ran.
    pub async fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;

        if self.child.is_some() {
            self.exit_master().await;
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        self._stdout = None;
        true
    }

    /// Ask any master bound to our control path to exit. Failure is
    /// expected when none is running and is ignored.
    async fn exit_master(&self) {
        let _ = Command::new("ssh")
            .args(self.ssh.base_args())
            .arg("-O")
            .arg("exit")
            .arg(&self.remote_address)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
    }
}
