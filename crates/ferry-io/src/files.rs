//! File-share traverser (SMB semantics).
//!
//! Shares have real directories, marked by the lister with a trailing `/`
//! on the key, and names compare case-insensitively; the comparator applies
//! the case folding, this traverser just reports the endpoint faithfully.
//! Trailing dots in entry names are legal on shares but not on most local
//! filesystems, so they can be trimmed via [`TrailingDot::Disable`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ferry_core::{
    BlobKind, FerryError, FilterChain, ObjectProcessor, RemoteLister, Side, TrailingDot,
};

use crate::remote::RemoteWalk;
use crate::TraversalSummary;

pub struct FileShareTraverser {
    walk: RemoteWalk,
}

impl FileShareTraverser {
    pub fn new(
        lister: Arc<dyn RemoteLister>,
        side: Side,
        share: impl Into<String>,
        prefix: impl Into<String>,
        recursive: bool,
        include_folders: bool,
        trailing_dot: TrailingDot,
    ) -> Self {
        Self {
            walk: RemoteWalk {
                lister,
                side,
                container: share.into(),
                prefix: prefix.into(),
                recursive,
                include_directory_stubs: include_folders,
                stub_metadata_key: None,
                rel_prefix: None,
                default_blob_kind: BlobKind::None,
                strip_trailing_dots: trailing_dot == TrailingDot::Disable,
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
    async fn directories_surface_as_folders() {
        let mut lister = MemoryLister::new();
        lister.insert("share", RemoteObject::new("docs/", 0));
        lister.insert("share", RemoteObject::new("docs/a.txt", 3));
        let traverser = FileShareTraverser::new(
            Arc::new(lister),
            Side::Source,
            "share",
            "",
            true,
            true,
            TrailingDot::Enable,
        );
        let mut sink = CollectProcessor::default();
        traverser
            .traverse(&mut sink, &FilterChain::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sink.objects.len(), 2);
        let folder = sink.objects.iter().find(|o| o.is_folder()).unwrap();
        assert_eq!(folder.relative_path.as_str(), "docs");
        assert_eq!(folder.blob_kind, BlobKind::None);
    }

    #[tokio::test]
    async fn trailing_dots_trimmed_when_disabled() {
        let mut lister = MemoryLister::new();
        lister.insert("share", RemoteObject::new("report.", 1));
        let traverser = FileShareTraverser::new(
            Arc::new(lister),
            Side::Source,
            "share",
            "",
            true,
            false,
            TrailingDot::Disable,
        );
        let mut sink = CollectProcessor::default();
        traverser
            .traverse(&mut sink, &FilterChain::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sink.objects[0].relative_path.as_str(), "report");
    }
}
