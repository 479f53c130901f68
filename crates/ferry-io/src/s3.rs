//! S3 bucket traverser.
//!
//! Buckets are flat keyspaces: no folder entities, no directory stubs. Keys
//! keep their blob-kind tag empty so the execution layer treats them as raw
//! objects.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ferry_core::{BlobKind, FerryError, FilterChain, ObjectProcessor, RemoteLister, Side};

use crate::remote::RemoteWalk;
use crate::TraversalSummary;

pub struct S3Traverser {
    walk: RemoteWalk,
}

impl S3Traverser {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLister;
    use ferry_core::{CollectProcessor, RemoteObject};

    #[tokio::test]
    async fn keys_enumerate_without_blob_kind() {
        let mut lister = MemoryLister::new();
        lister.insert("bucket", RemoteObject::new("logs/2024/app.log", 64));
        lister.insert("bucket", RemoteObject::new("readme.md", 8));
        let traverser = S3Traverser::new(Arc::new(lister), Side::Source, "bucket", "", true);
        let mut sink = CollectProcessor::default();
        traverser
            .traverse(&mut sink, &FilterChain::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sink.objects.len(), 2);
        assert!(sink.objects.iter().all(|o| o.blob_kind == BlobKind::None));
    }
}
