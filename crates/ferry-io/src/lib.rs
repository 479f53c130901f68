//! # Ferry I/O - Traverser Implementations
//!
//! This crate provides the concrete object traversers for ferry pipelines,
//! one per endpoint kind: the local filesystem, blob containers, file shares,
//! hierarchical blob filesystems, S3 and GCS buckets, account roots, pipes,
//! and list-file driven enumerations.
//!
//! Traversers share one contract: lazily enumerate [`StoredObject`]s under a
//! root, feed each one to the processor only after every filter in the chain
//! accepts it, honour the cancellation token at pagination boundaries, and
//! deliver objects in a deterministic order per traverser instance. The
//! closed [`Traverser`] enum dispatches over the backends; adding one is a
//! closed-set change.

use tokio_util::sync::CancellationToken;

use ferry_core::{FerryError, FilterChain, ObjectProcessor, StoredObject};

pub mod account;
pub mod blob;
pub mod blobfs;
pub mod files;
pub mod gcp;
pub mod list_file;
pub mod local;
pub mod pipe;
pub mod remote;
pub mod s3;

pub use account::AccountTraverser;
pub use blob::BlobTraverser;
pub use blobfs::BlobFsTraverser;
pub use files::FileShareTraverser;
pub use gcp::GcpTraverser;
pub use list_file::{ListFileTraverser, VersionListTraverser};
pub use local::LocalTraverser;
pub use pipe::PipeTraverser;
pub use remote::{MemoryLister, ObjectStoreLister, FOLDER_STUB_KEY};
pub use s3::S3Traverser;

/// Counters reported by a completed traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalSummary {
    /// Objects the backend yielded.
    pub seen: u64,
    /// Objects that passed the filter chain and reached the processor.
    pub emitted: u64,
    /// Objects skipped because their properties could not be read.
    pub skipped_properties: u64,
}

impl TraversalSummary {
    pub fn absorb(&mut self, other: TraversalSummary) {
        self.seen += other.seen;
        self.emitted += other.emitted;
        self.skipped_properties += other.skipped_properties;
    }
}

/// Run the filter chain and hand the survivor to the processor.
pub(crate) async fn feed(
    processor: &mut dyn ObjectProcessor,
    filters: &FilterChain,
    object: StoredObject,
    summary: &mut TraversalSummary,
) -> Result<(), FerryError> {
    if filters.admits(&object) {
        summary.emitted += 1;
        processor.process(object).await
    } else {
        Ok(())
    }
}

/// The closed set of traverser backends.
pub enum Traverser {
    Local(LocalTraverser),
    Blob(BlobTraverser),
    Files(FileShareTraverser),
    BlobFs(BlobFsTraverser),
    S3(S3Traverser),
    Gcp(GcpTraverser),
    Pipe(PipeTraverser),
    Account(AccountTraverser),
    ListFile(ListFileTraverser),
    Versions(VersionListTraverser),
}

impl Traverser {
    /// Enumerate the endpoint, feeding each object that survives `filters`
    /// into `processor`.
    pub async fn traverse(
        &self,
        processor: &mut dyn ObjectProcessor,
        filters: &FilterChain,
        cancel: &CancellationToken,
    ) -> Result<TraversalSummary, FerryError> {
        match self {
            Traverser::Local(t) => t.traverse(processor, filters, cancel).await,
            Traverser::Blob(t) => t.traverse(processor, filters, cancel).await,
            Traverser::Files(t) => t.traverse(processor, filters, cancel).await,
            Traverser::BlobFs(t) => t.traverse(processor, filters, cancel).await,
            Traverser::S3(t) => t.traverse(processor, filters, cancel).await,
            Traverser::Gcp(t) => t.traverse(processor, filters, cancel).await,
            Traverser::Pipe(t) => t.traverse(processor, filters, cancel).await,
            Traverser::Account(t) => t.traverse(processor, filters, cancel).await,
            Traverser::ListFile(t) => t.traverse(processor, filters, cancel).await,
            Traverser::Versions(t) => t.traverse(processor, filters, cancel).await,
        }
    }

    /// Whether the root addresses a single object rather than a container or
    /// directory. Drives the single-object shortcut and destination naming.
    pub async fn is_single_object(&self) -> Result<bool, FerryError> {
        match self {
            Traverser::Local(t) => t.is_single_object().await,
            Traverser::Blob(t) => t.is_single_object().await,
            Traverser::Files(t) => t.is_single_object().await,
            Traverser::BlobFs(t) => t.is_single_object().await,
            Traverser::S3(t) => t.is_single_object().await,
            Traverser::Gcp(t) => t.is_single_object().await,
            Traverser::Pipe(_) => Ok(true),
            Traverser::Account(_) => Ok(false),
            Traverser::ListFile(_) => Ok(false),
            Traverser::Versions(_) => Ok(true),
        }
    }
}
