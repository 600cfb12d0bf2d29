//! Classification of a flushed batch and the incremental-vs-full decision.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::info;

/// Above this many paths in a partition, an explicit path list is abandoned
/// in favor of one full-tree resync.
pub const FULL_RESYNC_THRESHOLD: usize = 200;

/// A flushed batch partitioned by current local existence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedBatch {
    /// Paths that exist locally right now.
    pub updated: Vec<String>,
    /// Paths that no longer exist locally.
    pub deleted: Vec<String>,
}

/// One sync operation to hand to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStep {
    /// Incremental transfer of exactly these relative paths.
    Transfer(Vec<String>),
    /// Targeted removal of exactly these relative paths on the remote.
    RemoveRemote(Vec<String>),
    /// Transfer of the entire local tree.
    FullResync,
}

/// Partition pending paths by a fresh existence check under `root`.
///
/// Existence is authoritative here, not the originating event kind: several
/// events may have landed on a path before the flush, and only the final
/// state matters. Each path ends up in exactly one partition.
pub fn classify(root: &Path, paths: BTreeSet<String>) -> ClassifiedBatch {
    let mut batch = ClassifiedBatch::default();

    for path in paths {
        if root.join(&path).exists() {
            batch.updated.push(path);
        } else {
            batch.deleted.push(path);
        }
    }

    batch
}

/// Decide the sync operations for one classified batch.
///
/// Both partitions are acted on independently whenever non-empty, updates
/// first. A batch that is huge on both sides yields two full resyncs; the
/// second is redundant but harmless and not deduplicated.
pub fn plan(batch: ClassifiedBatch) -> Vec<SyncStep> {
    let mut steps = Vec::new();

    if !batch.updated.is_empty() {
        if batch.updated.len() < FULL_RESYNC_THRESHOLD {
            steps.push(SyncStep::Transfer(batch.updated));
        } else {
            info!(
                "too many files to upload ({}), doing full rsync",
                batch.updated.len()
            );
            steps.push(SyncStep::FullResync);
        }
    }

    if !batch.deleted.is_empty() {
        if batch.deleted.len() < FULL_RESYNC_THRESHOLD {
            steps.push(SyncStep::RemoveRemote(batch.deleted));
        } else {
            info!(
                "too many files to delete ({}), doing full rsync",
                batch.deleted.len()
            );
            steps.push(SyncStep::FullResync);
        }
    }

    steps
}
