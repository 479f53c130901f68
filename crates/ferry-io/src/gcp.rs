//! GCS bucket traverser. Same flat-keyspace shape as S3.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ferry_core::{BlobKind, FerryError, FilterChain, ObjectProcessor, RemoteLister, Side};

use crate::remote::RemoteWalk;
use crate::TraversalSummary;

pub struct GcpTraverser {
    walk: RemoteWalk,
}

impl GcpTraverser {
    pub fn new(
        lister: Arc<dyn RemoteLister>,
        side: Side,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        recursive: bool,
    ) -> Self {
        Self {
            walk: RemoteWalk {
                lister,
                side,
                container: bucket.into(),
                prefix: prefix.into(),
                recursive,
                include_directory_stubs: false,
                stub_metadata_key: None,
                rel_prefix: None,
                default_blob_kind: BlobKind::None,
                strip_trailing_dots: false,
            },
        }
    }

    pub async fn is_single_object(&self) -> Result<bool, FerryError> {
        self.walk.is_single_object().await
    }

    pub async fn traverse(
        &self,
        processor: &mut dyn ObjectProcessor,
        filters: &FilterChain,
        cancel: &CancellationToken,
    ) -> Result<TraversalSummary, FerryError> {
        self.walk.run(processor, filters, cancel).await
    }
}
