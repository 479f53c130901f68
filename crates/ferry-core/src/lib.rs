//! # Ferry Core - Transfer Pipeline Foundations
//!
//! This crate provides the foundational types, traits, and abstractions shared by
//! every stage of a ferry transfer pipeline. A pipeline is a chain of operator
//! tasks (a traverser enumerating objects at an endpoint, a filter chain, an
//! optional sync comparator, and a part batcher) connected by bounded channels
//! and cancelled through a single cancellation token per job.
//!
//! ## Key Components
//!
//! - **Data model**: [`StoredObject`], [`RelativePath`], [`Location`], [`FromTo`]
//! - **Work units**: [`TransferOrder`], [`JobPart`], [`JobId`]
//! - **Operator traits**: [`ObjectProcessor`], [`ObjectFilter`], [`DispatchPart`]
//! - **Collaborator seams**: [`RemoteLister`] and [`AttributeProbe`], where
//!   the wire transport and platform probing plug in; the core itself
//!   performs no network I/O
//! - **Error handling**: the [`FerryError`] taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use ferry_core::{ChannelProcessor, StoredObject};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), ferry_core::FerryError> {
//! let (tx, mut rx) = mpsc::channel(100);
//! let mut processor = ChannelProcessor::new(tx);
//! // A traverser would feed accepted objects into the processor; the next
//! // pipeline stage consumes them from `rx`.
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

pub mod concurrency;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod location;
pub mod object;
pub mod options;
pub mod order;
pub mod path;
pub mod status;
pub mod units;

pub use error::{FerryError, Side};
pub use filter::{FilterChain, FilterKind, FilterScope, ObjectFilter, Polarity, ScanCost};
pub use lifecycle::{ExitKind, LifecycleManager, PromptReply, Prompter};
pub use location::{FromTo, Location, LocationKind, SasToken, WildcardSpec};
pub use object::{ContentProps, EntityType, PlatformAttrs, StoredObject};
pub use options::{
    AccessTier, BlobKind, CompareHash, DeleteDestination, DeleteSnapshotsOption,
    HardlinkHandling, HashValidationOption, LocalHashStorageMode, OutputLevel, OutputType,
    OverwriteOption, PermanentDeleteOption, PreservePermissions, RehydratePriority,
    SymlinkHandling, TrailingDot,
};
pub use order::{
    CpkInfo, CredentialKind, JobId, JobPart, JobPartFlags, PartNum, PreserveFlags,
    TransferAction, TransferOrder,
};
pub use path::RelativePath;
pub use status::{JobDetails, JobSnapshot, JobStatus, TransferStatus};

/// Sender side of the bounded object channel between pipeline stages.
pub type ObjectTx = mpsc::Sender<StoredObject>;

/// Receiver side of the bounded object channel between pipeline stages.
pub type ObjectRx = mpsc::Receiver<StoredObject>;

/// Consumer of enumerated objects.
///
/// Traversers feed every object that survives the filter chain into a
/// processor. The direct copy/remove path batches the object into a job part;
/// the sync path routes it through the comparator first.
#[async_trait]
pub trait ObjectProcessor: Send {
    async fn process(&mut self, object: StoredObject) -> Result<(), FerryError>;
}

/// Processor that forwards objects into a bounded channel, bridging a
/// traverser task to whichever stage owns the receiver.
pub struct ChannelProcessor {
    tx: ObjectTx,
}

impl ChannelProcessor {
    pub fn new(tx: ObjectTx) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ObjectProcessor for ChannelProcessor {
    async fn process(&mut self, object: StoredObject) -> Result<(), FerryError> {
        self.tx
            .send(object)
            .await
            .map_err(|_| FerryError::ChannelClosed("object stream"))
    }
}

/// Processor that buffers objects in memory. Used by the `list` verb and by
/// tests that assert on an exact enumeration.
#[derive(Default)]
pub struct CollectProcessor {
    pub objects: Vec<StoredObject>,
}

#[async_trait]
impl ObjectProcessor for CollectProcessor {
    async fn process(&mut self, object: StoredObject) -> Result<(), FerryError> {
        self.objects.push(object);
        Ok(())
    }
}

/// One raw listing record returned by a [`RemoteLister`] page. Traversers turn
/// these into [`StoredObject`]s.
#[derive(Debug, Clone)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
    pub lmt: Option<DateTime<Utc>>,
    pub content: ContentProps,
    pub metadata: BTreeMap<String, String>,
    pub blob_kind: BlobKind,
    pub access_tier: Option<AccessTier>,
    pub version_id: Option<String>,
    pub snapshot_id: Option<String>,
}

impl RemoteObject {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            lmt: None,
            content: ContentProps::default(),
            metadata: BTreeMap::new(),
            blob_kind: BlobKind::BlockBlob,
            access_tier: None,
            version_id: None,
            snapshot_id: None,
        }
    }

    pub fn with_lmt(mut self, lmt: DateTime<Utc>) -> Self {
        self.lmt = Some(lmt);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version_id = Some(version.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One page of object listing results.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<RemoteObject>,
    pub continuation: Option<String>,
}

/// One page of container (bucket, share) names at an account root.
#[derive(Debug, Clone, Default)]
pub struct ContainerPage {
    pub names: Vec<String>,
    pub continuation: Option<String>,
}

/// Page-based listing client for a remote backend.
///
/// This is the seam between the planning core and the wire transport: the
/// binary plugs in an adapter backed by a real store client, tests plug in
/// in-memory fakes. Transient errors at a pagination boundary are the
/// implementation's concern (retried below this trait); anything returned as
/// an error here is treated as non-retryable by the traverser.
#[async_trait]
pub trait RemoteLister: Send + Sync {
    /// List container names at the account root.
    async fn list_containers(&self, continuation: Option<String>) -> anyhow::Result<ContainerPage>;

    /// List one page of objects under `prefix` within `container`.
    async fn list_page(
        &self,
        container: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> anyhow::Result<ObjectPage>;

    /// Probe a single object. `Ok(None)` means the key does not resolve to an
    /// individual object at this endpoint.
    async fn head(&self, container: &str, key: &str) -> anyhow::Result<Option<RemoteObject>>;

    /// Enumerate all versions of a single object, newest first.
    async fn list_versions(&self, container: &str, key: &str) -> anyhow::Result<Vec<RemoteObject>>;
}

/// Platform attribute probing for local filesystem entries.
///
/// Attribute semantics are OS-specific; the core treats the result as an
/// opaque bitset and only ever intersects it with filter masks.
pub trait AttributeProbe: Send + Sync {
    fn attributes(&self, path: &Path) -> std::io::Result<PlatformAttrs>;
}

/// Probe that reports no attributes. The default on platforms without a
/// native attribute model.
pub struct NoopAttributeProbe;

impl AttributeProbe for NoopAttributeProbe {
    fn attributes(&self, _path: &Path) -> std::io::Result<PlatformAttrs> {
        Ok(PlatformAttrs::empty())
    }
}

/// The narrow interface through which the part batcher hands completed job
/// parts to the execution layer. Swapped for fakes at construction time in
/// tests, for a dry-run printer under `--dry-run`, and for the plan-writing
/// dispatcher in a real job.
#[async_trait]
pub trait DispatchPart: Send {
    async fn dispatch(&mut self, part: JobPart) -> Result<(), FerryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::RelativePath;

    #[tokio::test]
    async fn channel_processor_forwards_objects() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut processor = ChannelProcessor::new(tx);
        let obj = StoredObject::file(RelativePath::parse("a/b.txt").unwrap(), 3, None);
        processor.process(obj.clone()).await.unwrap();
        let got = rx.recv().await.unwrap();
        assert_eq!(got.relative_path, obj.relative_path);
    }

    #[tokio::test]
    async fn channel_processor_reports_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut processor = ChannelProcessor::new(tx);
        let obj = StoredObject::file(RelativePath::parse("x").unwrap(), 0, None);
        let err = processor.process(obj).await.unwrap_err();
        assert!(matches!(err, FerryError::ChannelClosed(_)));
    }
}
