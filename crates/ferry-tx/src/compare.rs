//! The sync comparator: diffs a source enumeration against the destination
//! index and emits copy and delete decisions.
//!
//! Copy decisions flow out during the compare phase, in source order; delete
//! decisions only ever flow out of the reconcile phase, after the source is
//! exhausted. Given the same two enumerations and configuration the
//! comparator is deterministic.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, warn};

use ferry_core::{
    lifecycle::PromptReply, CompareHash, DeleteDestination, FerryError, LifecycleManager,
    ObjectProcessor, RelativePath, StoredObject,
};

use crate::index::DestinationIndex;

/// Tolerance absorbed by the freshness comparison, part of the public sync
/// contract: a source object is newer only if its LMT beats the destination
/// twin by more than this many seconds. Mirror mode bypasses it.
pub const CLOCK_SKEW_SECS: i64 = 3;

/// Computes a source-side content hash on demand for `--compare-hash=MD5`
/// when the enumeration did not carry one.
pub trait SourceHasher: Send + Sync {
    fn md5(&self, rel: &RelativePath) -> anyhow::Result<[u8; 16]>;
}

/// Hashes local files under a root directory.
pub struct LocalMd5Hasher {
    root: PathBuf,
}

impl LocalMd5Hasher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceHasher for LocalMd5Hasher {
    fn md5(&self, rel: &RelativePath) -> anyhow::Result<[u8; 16]> {
        let path = if rel.is_root() {
            self.root.clone()
        } else {
            self.root.join(rel.as_str())
        };
        let bytes = std::fs::read(&path)?;
        Ok(md5::compute(&bytes).0)
    }
}

/// Comparator configuration.
#[derive(Clone, Default)]
pub struct SyncOptions {
    pub delete_destination: DeleteDestination,
    pub compare_hash: CompareHash,
    /// Copy on any LMT inequality instead of the skew-tolerant "newer" rule.
    pub mirror_mode: bool,
    pub hasher: Option<Arc<dyn SourceHasher>>,
}

/// Counters for one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub source_objects: u64,
    pub copies: u64,
    pub no_ops: u64,
    pub deletes: u64,
    pub extras_kept: u64,
}

/// Drives the compare phase as an [`ObjectProcessor`] over the source
/// enumeration, then [`SyncComparator::reconcile`] settles the extras.
pub struct SyncComparator {
    index: DestinationIndex,
    opts: SyncOptions,
    copy: Box<dyn ObjectProcessor>,
    stats: SyncStats,
}

impl SyncComparator {
    pub fn new(index: DestinationIndex, opts: SyncOptions, copy: Box<dyn ObjectProcessor>) -> Self {
        Self {
            index,
            opts,
            copy,
            stats: SyncStats::default(),
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    fn needs_copy(&self, source: &StoredObject, dest: &crate::index::DestMeta) -> bool {
        // A file replacing a folder (or the reverse) always transfers.
        if source.is_folder() != (dest.entity == ferry_core::EntityType::Folder) {
            return true;
        }
        if source.is_folder() {
            return false;
        }
        if self.opts.compare_hash == CompareHash::Md5 {
            let source_md5 = source.content.md5.or_else(|| {
                self.opts.hasher.as_ref().and_then(|h| {
                    h.md5(&source.relative_path)
                        .map_err(|err| {
                            warn!(path = %source.relative_path, error = %err, "source hash unavailable");
                            err
                        })
                        .ok()
                })
            });
            if let (Some(src), Some(dst)) = (source_md5, dest.md5) {
                return src != dst;
            }
            // One side has no hash to offer; fall back to the time rule.
            debug!(path = %source.relative_path, "hash comparison unavailable, using LMT");
        }
        match (source.lmt, dest.lmt) {
            (Some(src), Some(dst)) => {
                if self.opts.mirror_mode {
                    src != dst
                } else {
                    src > dst + Duration::seconds(CLOCK_SKEW_SECS)
                }
            }
            // Unknown destination state: transfer to be safe.
            (_, None) => true,
            // Unknown source LMT cannot prove staleness.
            (None, Some(_)) => false,
        }
    }

    /// Settle the remaining index entries: the destination-only extras.
    /// Deletes are emitted files-first, folders deepest-first.
    pub async fn reconcile(
        self,
        delete: &mut dyn ObjectProcessor,
        lifecycle: &LifecycleManager,
    ) -> Result<SyncStats, FerryError> {
        let SyncComparator {
            index,
            opts,
            mut stats,
            ..
        } = self;
        for meta in index.into_remaining() {
            match opts.delete_destination {
                DeleteDestination::False => {
                    warn!(path = %meta.relative_path, "destination-only object kept");
                    stats.extras_kept += 1;
                }
                DeleteDestination::True => {
                    stats.deletes += 1;
                    delete.process(meta.into_object()).await?;
                }
                DeleteDestination::Prompt => {
                    let question = format!(
                        "Delete destination-only object '{}'?",
                        meta.relative_path
                    );
                    if lifecycle.prompt(&question) == PromptReply::Yes {
                        stats.deletes += 1;
                        delete.process(meta.into_object()).await?;
                    } else {
                        stats.extras_kept += 1;
                    }
                }
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl ObjectProcessor for SyncComparator {
    async fn process(&mut self, object: StoredObject) -> Result<(), FerryError> {
        self.stats.source_objects += 1;
        let copy = match self.index.take(&object.relative_path) {
            None => true,
            Some(dest) => self.needs_copy(&object, &dest),
        };
        if copy {
            self.stats.copies += 1;
            self.copy.process(object).await
        } else {
            self.stats.no_ops += 1;
            Ok(())
        }
    }
}
