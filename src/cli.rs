//! Command-line surface.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "sshsync",
    version,
    about = "Mirror a local directory to a remote host over a persistent SSH session"
)]
pub struct Cli {
    /// SSH identity file, passed to every ssh and rsync invocation
    #[arg(short = 'i', long = "identity", value_name = "FILE")]
    pub identity: Option<String>,

    /// Extra arguments appended to every rsync invocation (whitespace-split)
    #[arg(short = 'r', long = "rsync-args", value_name = "ARGS")]
    pub rsync_args: Option<String>,

    /// Pipe-separated glob patterns excluded from sync, e.g. 'target/**|*.swp'
    #[arg(short = 'e', long = "exclude", value_name = "PATTERNS")]
    pub exclude: Option<String>,

    /// SSH connect timeout in seconds, also used as the keepalive interval
    #[arg(short = 't', long = "timeout", value_name = "SECS", default_value_t = 5)]
    pub timeout: u64,

    /// Local directory to mirror
    pub local_dir: String,

    /// Remote address, e.g. user@host
    pub remote_address: String,

    /// Directory on the remote host to mirror into
    pub remote_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_invocation() {
        let cli = Cli::parse_from([
            "sshsync",
            "-i",
            "/home/me/.ssh/id_ed25519",
            "-e",
            "target/**|*.swp",
            "-t",
            "10",
            "/local/project",
            "me@build-host",
            "/srv/project",
        ]);

        assert_eq!(cli.identity.as_deref(), Some("/home/me/.ssh/id_ed25519"));
        assert_eq!(cli.exclude.as_deref(), Some("target/**|*.swp"));
        assert_eq!(cli.timeout, 10);
        assert_eq!(cli.local_dir, "/local/project");
        assert_eq!(cli.remote_address, "me@build-host");
        assert_eq!(cli.remote_dir, "/srv/project");
    }

    #[test]
    fn test_missing_positionals_rejected() {
        assert!(Cli::try_parse_from(["sshsync", "/local/project"]).is_err());
    }
}
