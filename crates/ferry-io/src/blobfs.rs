//! Hierarchical-namespace blob filesystem traverser (ADLS Gen2).
//!
//! The namespace has real directories, but listings arrive through the blob
//! surface, so directory entries still carry the `hdi_isfolder` stub marker.
//! Objects keep their blob kind for the execution layer.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ferry_core::{BlobKind, FerryError, FilterChain, ObjectProcessor, RemoteLister, Side};

use crate::remote::{RemoteWalk, FOLDER_STUB_KEY};
use crate::TraversalSummary;

pub struct BlobFsTraverser {
    walk: RemoteWalk,
}

impl BlobFsTraverser {
    pub fn new(
        lister: Arc<dyn RemoteLister>,
        side: Side,
        filesystem: impl Into<String>,
        prefix: impl Into<String>,
        recursive: bool,
        include_folders: bool,
    ) -> Self {
        Self {
            walk: RemoteWalk {
                lister,
                side,
                container: filesystem.into(),
                prefix: prefix.into(),
                recursive,
                include_directory_stubs: include_folders,
                stub_metadata_key: Some(FOLDER_STUB_KEY),
                rel_prefix: None,
                default_blob_kind: BlobKind::BlockBlob,
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
    async fn directories_and_files_enumerate() {
        let mut lister = MemoryLister::new();
        lister.insert(
            "fs",
            RemoteObject::new("data", 0).with_metadata(FOLDER_STUB_KEY, "true"),
        );
        lister.insert("fs", RemoteObject::new("data/part-0000.csv", 128));
        let traverser =
            BlobFsTraverser::new(Arc::new(lister), Side::Source, "fs", "", true, true);
        let mut sink = CollectProcessor::default();
        traverser
            .traverse(&mut sink, &FilterChain::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sink.objects.len(), 2);
        assert!(sink.objects.iter().any(|o| o.is_folder()));
        assert!(sink
            .objects
            .iter()
            .any(|o| o.relative_path.as_str() == "data/part-0000.csv"));
    }
}
