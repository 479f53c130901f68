//! Account-root traverser: fans out over containers.
//!
//! Containers are visited in listing order, each one traversed to completion
//! before the next begins, so a container's objects always appear
//! contiguously in the emitted stream. Relative paths are prefixed with the
//! container name to stay unique across the account.

use std::sync::Arc;

use glob::Pattern;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ferry_core::{
    BlobKind, FerryError, FilterChain, ObjectProcessor, RemoteLister, Side,
};

use crate::remote::{RemoteWalk, FOLDER_STUB_KEY};
use crate::TraversalSummary;

pub struct AccountTraverser {
    lister: Arc<dyn RemoteLister>,
    side: Side,
    pattern: Option<Pattern>,
    recursive: bool,
    include_directory_stubs: bool,
    blob_semantics: bool,
}

impl std::fmt::Debug for AccountTraverser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountTraverser")
            .field("side", &self.side)
            .field("pattern", &self.pattern.as_ref().map(|p| p.as_str()))
            .field("recursive", &self.recursive)
            .field("include_directory_stubs", &self.include_directory_stubs)
            .field("blob_semantics", &self.blob_semantics)
            .finish()
    }
}

impl AccountTraverser {
    /// `pattern` is an optional shell glob on the container name.
    pub fn new(
        lister: Arc<dyn RemoteLister>,
        side: Side,
        pattern: Option<&str>,
        recursive: bool,
    ) -> Result<Self, FerryError> {
        let pattern = match pattern {
            Some(p) => Some(Pattern::new(p).map_err(|e| {
                FerryError::InvalidArgument(format!("bad container pattern '{p}': {e}"))
            })?),
            None => None,
        };
        Ok(Self {
            lister,
            side,
            pattern,
            recursive,
            include_directory_stubs: false,
            blob_semantics: true,
        })
    }

    pub fn with_directory_stubs(mut self, include: bool) -> Self {
        self.include_directory_stubs = include;
        self
    }

    /// Disable blob-stub interpretation for non-blob accounts.
    pub fn with_blob_semantics(mut self, blob_semantics: bool) -> Self {
        self.blob_semantics = blob_semantics;
        self
    }

    pub async fn traverse(
        &self,
        processor: &mut dyn ObjectProcessor,
        filters: &FilterChain,
        cancel: &CancellationToken,
    ) -> Result<TraversalSummary, FerryError> {
        let mut summary = TraversalSummary::default();
        let mut continuation: Option<String> = None;
        loop {
            if cancel.is_cancelled() {
                return Err(FerryError::Cancelled);
            }
            let page = self
                .lister
                .list_containers(continuation.take())
                .await
                .map_err(|e| FerryError::EnumerationFailed {
                    side: self.side,
                    partial: summary.seen,
                    reason: e.to_string(),
                })?;

            for name in page.names {
                if let Some(pattern) = &self.pattern {
                    if !pattern.matches(&name) {
                        debug!(container = %name, "container does not match pattern");
                        continue;
                    }
                }
                info!(container = %name, "traversing container");
                let walk = RemoteWalk {
                    lister: self.lister.clone(),
                    side: self.side,
                    container: name.clone(),
                    prefix: String::new(),
                    recursive: self.recursive,
                    include_directory_stubs: self.include_directory_stubs,
                    stub_metadata_key: self.blob_semantics.then_some(FOLDER_STUB_KEY),
                    rel_prefix: Some(name),
                    default_blob_kind: if self.blob_semantics {
                        BlobKind::BlockBlob
                    } else {
                        BlobKind::None
                    },
                    strip_trailing_dots: false,
                };
                summary.absorb(walk.run(processor, filters, cancel).await?);
            }

            continuation = page.continuation;
            if continuation.is_none() {
                break;
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLister;
    use ferry_core::{CollectProcessor, RemoteObject};

    fn account() -> Arc<MemoryLister> {
        let mut lister = MemoryLister::new();
        lister.insert("alpha", RemoteObject::new("a.txt", 1));
        lister.insert("alpha", RemoteObject::new("deep/b.txt", 1));
        lister.insert("beta", RemoteObject::new("c.txt", 1));
        lister.insert("gamma", RemoteObject::new("d.txt", 1));
        Arc::new(lister)
    }

    #[tokio::test]
    async fn containers_enumerate_contiguously_with_prefixed_paths() {
        let traverser = AccountTraverser::new(account(), Side::Source, None, true).unwrap();
        let mut sink = CollectProcessor::default();
        traverser
            .traverse(&mut sink, &FilterChain::new(), &CancellationToken::new())
            .await
            .unwrap();
        let paths: Vec<&str> = sink
            .objects
            .iter()
            .map(|o| o.relative_path.as_str())
            .collect();
        assert_eq!(
            paths,
            vec!["alpha/a.txt", "alpha/deep/b.txt", "beta/c.txt", "gamma/d.txt"]
        );
        assert_eq!(sink.objects[0].container, "alpha");
    }

    #[tokio::test]
    async fn container_glob_limits_the_fanout() {
        let traverser =
            AccountTraverser::new(account(), Side::Source, Some("*a"), true).unwrap();
        let mut sink = CollectProcessor::default();
        traverser
            .traverse(&mut sink, &FilterChain::new(), &CancellationToken::new())
            .await
            .unwrap();
        // "*a" matches alpha, beta and gamma; "a*" narrows to alpha.
        assert_eq!(sink.objects.len(), 4);

        let narrowed = AccountTraverser::new(account(), Side::Source, Some("a*"), true).unwrap();
        let mut sink = CollectProcessor::default();
        narrowed
            .traverse(&mut sink, &FilterChain::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sink.objects.len(), 2);
    }

    #[tokio::test]
    async fn bad_pattern_is_an_invalid_argument() {
        let err = AccountTraverser::new(account(), Side::Source, Some("[bad"), true).unwrap_err();
        assert!(matches!(err, FerryError::InvalidArgument(_)));
    }
}
