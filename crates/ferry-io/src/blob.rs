//! Blob container traverser.
//!
//! Folders exist here only as zero-byte stubs carrying `hdi_isfolder=true`
//! metadata; they surface as Folder objects when directory stubs are
//! requested and are dropped otherwise.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ferry_core::{
    BlobKind, FerryError, FilterChain, ObjectProcessor, RemoteLister, Side,
};

use crate::remote::{RemoteWalk, FOLDER_STUB_KEY};
use crate::TraversalSummary;

pub struct BlobTraverser {
    walk: RemoteWalk,
}

impl BlobTraverser {
    pub fn new(
        lister: Arc<dyn RemoteLister>,
        side: Side,
        container: impl Into<String>,
        prefix: impl Into<String>,
        recursive: bool,
        include_directory_stubs: bool,
    ) -> Self {
        Self {
            walk: RemoteWalk {
                lister,
                side,
                container: container.into(),
                prefix: prefix.into(),
                recursive,
                include_directory_stubs,
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
    use ferry_core::{CollectProcessor, RemoteObject, StoredObject};

    fn container_fixture() -> Arc<MemoryLister> {
        // The container from the wildcard scenarios: a blob literally named
        // `*`, two plain blobs, and one nested under a starred directory.
        let mut lister = MemoryLister::new();
        lister.insert("c", RemoteObject::new("*", 1));
        lister.insert("c", RemoteObject::new("testFile", 2));
        lister.insert("c", RemoteObject::new("DoYouPronounceItDataOrData", 3));
        lister.insert(
            "c",
            RemoteObject::new("sub*dir/Help I cannot so much into computer", 4),
        );
        Arc::new(lister)
    }

    async fn collect(traverser: &BlobTraverser) -> Vec<StoredObject> {
        let mut sink = CollectProcessor::default();
        traverser
            .traverse(&mut sink, &FilterChain::new(), &CancellationToken::new())
            .await
            .unwrap();
        sink.objects
    }

    #[tokio::test]
    async fn exact_key_match_is_a_single_object() {
        let traverser =
            BlobTraverser::new(container_fixture(), Side::Source, "c", "*", false, false);
        assert!(traverser.is_single_object().await.unwrap());
        let objects = collect(&traverser).await;
        assert_eq!(objects.len(), 1);
        assert!(objects[0].relative_path.is_root());
        assert_eq!(objects[0].name, "*");
    }

    #[tokio::test]
    async fn container_listing_respects_recursive_flag() {
        let flat = BlobTraverser::new(container_fixture(), Side::Source, "c", "", false, false);
        let objects = collect(&flat).await;
        let names: Vec<&str> = objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["*", "DoYouPronounceItDataOrData", "testFile"]);

        let deep = BlobTraverser::new(container_fixture(), Side::Source, "c", "", true, false);
        assert_eq!(collect(&deep).await.len(), 4);
    }

    #[tokio::test]
    async fn directory_stubs_follow_the_flag() {
        let mut lister = MemoryLister::new();
        lister.insert(
            "c",
            RemoteObject::new("folder", 0).with_metadata(FOLDER_STUB_KEY, "true"),
        );
        lister.insert("c", RemoteObject::new("folder/file.txt", 5));
        let lister = Arc::new(lister);

        let without =
            BlobTraverser::new(lister.clone(), Side::Source, "c", "", true, false);
        let objects = collect(&without).await;
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].relative_path.as_str(), "folder/file.txt");

        let with = BlobTraverser::new(lister, Side::Source, "c", "", true, true);
        let objects = collect(&with).await;
        assert_eq!(objects.len(), 2);
        let stub = objects.iter().find(|o| o.is_folder()).unwrap();
        assert_eq!(stub.relative_path.as_str(), "folder");
        assert_eq!(stub.size, 0);
    }

    #[tokio::test]
    async fn prefix_enumeration_strips_the_prefix() {
        let traverser = BlobTraverser::new(
            container_fixture(),
            Side::Source,
            "c",
            "sub*dir",
            true,
            false,
        );
        assert!(!traverser.is_single_object().await.unwrap());
        let objects = collect(&traverser).await;
        assert_eq!(objects.len(), 1);
        assert_eq!(
            objects[0].relative_path.as_str(),
            "Help I cannot so much into computer"
        );
        assert_eq!(objects[0].container, "c");
    }

    #[tokio::test]
    async fn cancellation_stops_at_pagination_boundary() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let traverser =
            BlobTraverser::new(container_fixture(), Side::Source, "c", "", true, false);
        let err = traverser
            .traverse(&mut CollectProcessor::default(), &FilterChain::new(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn listing_error_carries_partial_count() {
        let lister = Arc::new(MemoryLister::new());
        let traverser = BlobTraverser::new(lister, Side::Destination, "missing", "", true, false);
        let err = traverser
            .traverse(
                &mut CollectProcessor::default(),
                &FilterChain::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        match err {
            FerryError::EnumerationFailed { side, partial, .. } => {
                assert_eq!(side, Side::Destination);
                assert_eq!(partial, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
