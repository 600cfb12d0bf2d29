//! External filesystem monitor.
//!
//! Change notifications come from a long-running `inotifywait` process, one
//! line per event, read with a bounded poll so the caller can interleave
//! health checks and flushes without a dedicated reader thread.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;

/// Bounded wait for the next event line. Doubles as the debounce window:
/// a flush is only considered once this much time passes without an event.
pub const POLL_WINDOW: Duration = Duration::from_millis(300);

/// Marker kind the event source attaches to directory-only events.
const DIRECTORY_MARKER: &str = "ISDIR";

/// One parsed change notification: `<comma-separated-kinds> <path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Raw event kinds as emitted by the monitor (e.g. `CREATE`, `MODIFY`).
    pub kinds: Vec<String>,
    /// Absolute path the event refers to. May contain spaces.
    pub path: String,
}

impl WatchEvent {
    /// Parse one monitor output line. Returns `None` for anything that does
    /// not split into a kind list and a path; such lines are simply dropped.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (kinds, path) = line.split_once(' ')?;
        if kinds.is_empty() || path.is_empty() {
            return None;
        }

        Some(Self {
            kinds: kinds.split(',').map(str::to_string).collect(),
            path: path.to_string(),
        })
    }

    /// Whether this is a pure directory event (no file-level change).
    pub fn is_directory_event(&self) -> bool {
        self.kinds.iter().any(|k| k == DIRECTORY_MARKER)
    }
}

/// Outcome of one bounded poll of the monitor's output stream.
#[derive(Debug)]
pub enum WatchPoll {
    /// A raw line arrived within the window.
    Line(String),
    /// The window elapsed with no event.
    Idle,
    /// The monitor's output ended or failed; the watch cycle cannot continue.
    Closed,
}

/// Handle on the spawned monitor process and its output stream.
pub struct EventWatcher {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl EventWatcher {
    /// Start recursive monitoring of `root`.
    pub fn spawn(root: &Path) -> Result<Self> {
        let mut child = Command::new("inotifywait")
            .arg("-m")
            .arg("-r")
            .arg("--format")
            .arg("%e %w%f")
            .arg(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("failed to start inotifywait")?;

        let stdout = child
            .stdout
            .take()
            .context("inotifywait spawned without stdout")?;

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
        })
    }

    /// Wait up to `window` for the next event line.
    pub async fn poll(&mut self, window: Duration) -> WatchPoll {
        match timeout(window, self.lines.next_line()).await {
            Err(_) => WatchPoll::Idle,
            Ok(Ok(Some(line))) => WatchPoll::Line(line),
            Ok(Ok(None)) | Ok(Err(_)) => WatchPoll::Closed,
        }
    }

    /// Kill the monitor process and reap it.
    pub async fn shutdown(mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_kind() {
        let event = WatchEvent::parse("MODIFY /local/dir/a.txt").unwrap();

        assert_eq!(event.kinds, vec!["MODIFY"]);
        assert_eq!(event.path, "/local/dir/a.txt");
        assert!(!event.is_directory_event());
    }

    #[test]
    fn test_parse_kind_list() {
        let event = WatchEvent::parse("CREATE,ISDIR /local/dir/new").unwrap();

        assert_eq!(event.kinds, vec!["CREATE", "ISDIR"]);
        assert!(event.is_directory_event());
    }

    #[test]
    fn test_parse_path_with_spaces() {
        let event = WatchEvent::parse("CLOSE_WRITE,CLOSE /local/dir/a b.txt").unwrap();

        assert_eq!(event.path, "/local/dir/a b.txt");
    }

    #[test]
    fn test_parse_malformed_lines() {
        assert!(WatchEvent::parse("").is_none());
        assert!(WatchEvent::parse("MODIFY").is_none());
        assert!(WatchEvent::parse("MODIFY ").is_none());
    }
}
