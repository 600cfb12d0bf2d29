//! Aggregation of raw change notifications into a pending set.
//!
//! Events are deduplicated by normalized relative path. The event kind is
//! deliberately not tracked: whether a path needs an upload or a remote
//! removal is decided at flush time from its current existence, so a
//! modify-then-delete burst still resolves correctly.

use std::collections::BTreeSet;
use std::path::Path;

use crate::exclude::ExcludePatterns;
use crate::watcher::WatchEvent;

/// Accumulates changed paths between flushes.
///
/// Keyed by the normalized relative path itself; inserting a path that is
/// already pending is a no-op, which collapses rapid repeated events on one
/// file into a single entry.
#[derive(Debug)]
pub struct ChangePool {
    /// `<root>/`, precomputed for prefix stripping.
    root_prefix: String,
    exclude: ExcludePatterns,
    pending: BTreeSet<String>,
}

impl ChangePool {
    /// `root` is the watched local directory, without a trailing separator.
    pub fn new(root: &Path, exclude: ExcludePatterns) -> Self {
        Self {
            root_prefix: format!("{}/", root.display()),
            exclude,
            pending: BTreeSet::new(),
        }
    }

    /// Feed one event into the pool. Returns whether it was accepted.
    ///
    /// Directory-only events are always discarded: leaf-path changes inside
    /// a directory arrive as their own events, and directory creation or
    /// removal is reconciled by the resync that follows.
    pub fn accept(&mut self, event: &WatchEvent) -> bool {
        if event.is_directory_event() {
            return false;
        }

        let mut full_path = event.path.clone();
        // Directory paths must always carry a trailing separator so
        // directory-level excludes match regardless of how the event
        // source spelled the path.
        if !full_path.ends_with('/') && Path::new(&full_path).is_dir() {
            full_path.push('/');
        }

        let relative = full_path
            .strip_prefix(&self.root_prefix)
            .unwrap_or(&full_path)
            .to_string();

        if self.exclude.is_excluded(&relative) {
            return false;
        }

        self.pending.insert(relative);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Flush: hand over the accumulated set and clear it.
    pub fn take(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_at(root: &Path) -> ChangePool {
        ChangePool::new(root, ExcludePatterns::default())
    }

    fn event(kinds: &str, path: String) -> WatchEvent {
        WatchEvent::parse(&format!("{} {}", kinds, path)).unwrap()
    }

    #[test]
    fn test_duplicate_events_coalesce() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = pool_at(dir.path());
        let path = format!("{}/a.txt", dir.path().display());

        assert!(pool.accept(&event("MODIFY", path.clone())));
        assert!(pool.accept(&event("CLOSE_WRITE,CLOSE", path)));

        assert_eq!(pool.len(), 1);
        assert!(pool.take().contains("a.txt"));
    }

    #[test]
    fn test_directory_events_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = pool_at(dir.path());

        let ev = event("CREATE,ISDIR", format!("{}/sub", dir.path().display()));
        assert!(!pool.accept(&ev));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_excluded_paths_never_pending() {
        let dir = tempfile::tempdir().unwrap();
        let exclude = ExcludePatterns::from_patterns(&["*.swp"]).unwrap();
        let mut pool = ChangePool::new(dir.path(), exclude);

        let skipped = event("MODIFY", format!("{}/.main.rs.swp", dir.path().display()));
        let kept = event("MODIFY", format!("{}/main.rs", dir.path().display()));

        assert!(!pool.accept(&skipped));
        assert!(pool.accept(&kept));

        let pending = pool.take();
        assert_eq!(pending.len(), 1);
        assert!(pending.contains("main.rs"));
    }

    #[test]
    fn test_directory_path_normalized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut pool = pool_at(dir.path());

        // A non-ISDIR event on a path that currently is a directory, with
        // no trailing separator in the raw line.
        let ev = event("MOVED_TO", format!("{}/sub", dir.path().display()));
        assert!(pool.accept(&ev));

        assert!(pool.take().contains("sub/"));
    }

    #[test]
    fn test_take_clears_pool() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = pool_at(dir.path());

        pool.accept(&event("MODIFY", format!("{}/a.txt", dir.path().display())));
        assert!(!pool.is_empty());

        let taken = pool.take();
        assert_eq!(taken.len(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_path_outside_root_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = pool_at(dir.path());

        pool.accept(&event("MODIFY", "/elsewhere/b.txt".to_string()));
        assert!(pool.take().contains("/elsewhere/b.txt"));
    }
}
