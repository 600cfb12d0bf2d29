//! Runtime configuration, validated once at startup.

use std::path::PathBuf;

use anyhow::{ensure, Result};

use crate::cli::Cli;
use crate::exclude::ExcludePatterns;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Watched local directory, trailing separator trimmed.
    pub local_dir: PathBuf,
    /// Remote address in ssh form, e.g. `user@host`.
    pub remote_address: String,
    /// Target directory on the remote host, trailing separator trimmed.
    pub remote_dir: String,
    /// Optional ssh identity file.
    pub identity: Option<PathBuf>,
    /// Extra arguments for every rsync invocation.
    pub rsync_args: Vec<String>,
    /// Compiled exclude set.
    pub exclude: ExcludePatterns,
    /// SSH connect timeout in seconds, doubling as the keepalive interval.
    pub connect_timeout: u64,
}

impl SyncConfig {
    /// Validate and normalize the parsed command line. Any error here is
    /// fatal to the process.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let local_dir = PathBuf::from(cli.local_dir.trim_end_matches('/'));
        ensure!(
            local_dir.is_dir(),
            "local directory {} does not exist",
            local_dir.display()
        );
        ensure!(!cli.remote_address.is_empty(), "remote address is empty");

        let remote_dir = cli.remote_dir.trim_end_matches('/').to_string();
        ensure!(!remote_dir.is_empty(), "remote directory is empty");

        let exclude = match &cli.exclude {
            Some(spec) => ExcludePatterns::parse(spec)?,
            None => ExcludePatterns::default(),
        };

        let rsync_args = cli
            .rsync_args
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(Self {
            local_dir,
            remote_address: cli.remote_address,
            remote_dir,
            identity: cli.identity.map(PathBuf::from),
            rsync_args,
            exclude,
            connect_timeout: cli.timeout,
        })
    }

    /// Transfer destination in `user@host:/remote/dir/` form.
    pub fn remote_path(&self) -> String {
        format!("{}:{}/", self.remote_address, self.remote_dir)
    }
}
