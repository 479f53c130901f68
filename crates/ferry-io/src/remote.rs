//! Paged listing transport and the shared remote enumeration engine.
//!
//! Backend traversers are thin configurations of [`RemoteWalk`]; the walk
//! drives a [`RemoteLister`] page by page, turns raw records into
//! [`StoredObject`]s, and feeds the filter chain. Two listers ship here: an
//! adapter over an [`object_store::ObjectStore`] for real endpoints, and an
//! in-memory lister for tests and the bench verb.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use object_store::path::Path as StorePath;
use object_store::ObjectStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ferry_core::{
    BlobKind, ContainerPage, ContentProps, FerryError, FilterChain, ObjectPage,
    ObjectProcessor, RemoteLister, RemoteObject, RelativePath, Side, StoredObject,
};

use crate::TraversalSummary;

/// Metadata key marking a zero-byte blob as a directory stub.
pub const FOLDER_STUB_KEY: &str = "hdi_isfolder";

/// Listing records per page requested from the adapter.
const PAGE_SIZE: usize = 1000;

/// Shared engine for enumerating one container (or a prefix within it).
pub(crate) struct RemoteWalk {
    pub lister: Arc<dyn RemoteLister>,
    pub side: Side,
    pub container: String,
    pub prefix: String,
    pub recursive: bool,
    pub include_directory_stubs: bool,
    /// Metadata key whose `true` value marks a folder stub, for backends
    /// that model folders as zero-byte blobs.
    pub stub_metadata_key: Option<&'static str>,
    /// Prepended to every relative path; the account traverser sets this to
    /// the container name so paths stay unique across containers.
    pub rel_prefix: Option<String>,
    /// Blob-kind assigned when the record itself carries none.
    pub default_blob_kind: BlobKind,
    /// Trailing-dot handling on share endpoints: when set, trailing dots are
    /// trimmed from leaf names.
    pub strip_trailing_dots: bool,
}

impl RemoteWalk {
    /// Whether the configured prefix resolves to exactly one object.
    pub async fn is_single_object(&self) -> Result<bool, FerryError> {
        if self.prefix.is_empty() || self.prefix.ends_with('/') {
            return Ok(false);
        }
        let found = self
            .lister
            .head(&self.container, &self.prefix)
            .await
            .map_err(|e| FerryError::EnumerationFailed {
                side: self.side,
                partial: 0,
                reason: e.to_string(),
            })?;
        Ok(found.is_some())
    }

    pub async fn run(
        &self,
        processor: &mut dyn ObjectProcessor,
        filters: &FilterChain,
        cancel: &CancellationToken,
    ) -> Result<TraversalSummary, FerryError> {
        let mut summary = TraversalSummary::default();

        // Single-object shortcut: an exact key match is the whole
        // enumeration, addressed by an empty relative path.
        if !self.prefix.is_empty() && !self.prefix.ends_with('/') {
            let head = self
                .lister
                .head(&self.container, &self.prefix)
                .await
                .map_err(|e| FerryError::EnumerationFailed {
                    side: self.side,
                    partial: 0,
                    reason: e.to_string(),
                })?;
            if let Some(remote) = head {
                summary.seen += 1;
                let object = self.object_from(&remote, RelativePath::root(), false);
                crate::feed(processor, filters, object, &mut summary).await?;
                return Ok(summary);
            }
        }

        let list_prefix = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        };

        let mut continuation: Option<String> = None;
        loop {
            if cancel.is_cancelled() {
                debug!(container = %self.container, "traversal cancelled at pagination boundary");
                return Err(FerryError::Cancelled);
            }
            let page = self
                .lister
                .list_page(&self.container, &list_prefix, continuation.take())
                .await
                .map_err(|e| FerryError::EnumerationFailed {
                    side: self.side,
                    partial: summary.seen,
                    reason: e.to_string(),
                })?;

            for remote in page.objects {
                summary.seen += 1;
                let Some(key) = remote.key.strip_prefix(&list_prefix) else {
                    continue;
                };

                let is_stub = self.is_folder_stub(&remote, key);
                let mut rel_str = key.trim_end_matches('/').to_string();
                if self.strip_trailing_dots {
                    rel_str = trim_trailing_dots(&rel_str);
                }
                let rel = match RelativePath::normalise(&rel_str) {
                    Ok(rel) => rel,
                    Err(err) => {
                        warn!(key = %remote.key, error = %err, "skipping object with unusable key");
                        summary.skipped_properties += 1;
                        continue;
                    }
                };
                if rel.is_root() {
                    // The prefix marker itself.
                    continue;
                }
                if !self.recursive && !rel.is_top_level() {
                    continue;
                }
                let rel = match &self.rel_prefix {
                    Some(container) => match RelativePath::normalise(&format!("{container}/{rel}"))
                    {
                        Ok(rel) => rel,
                        Err(_) => {
                            summary.skipped_properties += 1;
                            continue;
                        }
                    },
                    None => rel,
                };

                if is_stub && !self.include_directory_stubs {
                    continue;
                }
                let object = self.object_from(&remote, rel, is_stub);
                crate::feed(processor, filters, object, &mut summary).await?;
            }

            continuation = page.continuation;
            if continuation.is_none() {
                break;
            }
        }
        Ok(summary)
    }

    fn is_folder_stub(&self, remote: &RemoteObject, key: &str) -> bool {
        if key.ends_with('/') {
            return true;
        }
        match self.stub_metadata_key {
            Some(meta_key) => remote
                .metadata
                .get(meta_key)
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            None => false,
        }
    }

    fn object_from(&self, remote: &RemoteObject, rel: RelativePath, is_folder: bool) -> StoredObject {
        let mut object = if is_folder {
            StoredObject::folder(rel, remote.lmt)
        } else {
            StoredObject::file(rel, remote.size, remote.lmt)
        };
        if object.name.is_empty() {
            // Single-object shortcut: the root carries the address, the name
            // still reflects the leaf of the key.
            object.name = remote
                .key
                .rsplit('/')
                .next()
                .unwrap_or(&remote.key)
                .to_string();
        }
        object.container = self.container.clone();
        object.content = remote.content.clone();
        object.metadata = remote.metadata.clone();
        object.access_tier = remote.access_tier;
        object.version_id = remote.version_id.clone();
        object.snapshot_id = remote.snapshot_id.clone();
        object.blob_kind = if is_folder {
            BlobKind::None
        } else if remote.blob_kind == BlobKind::BlockBlob
            && self.default_blob_kind != BlobKind::BlockBlob
        {
            self.default_blob_kind
        } else {
            remote.blob_kind
        };
        object
    }
}

fn trim_trailing_dots(path: &str) -> String {
    path.split('/')
        .map(|seg| seg.trim_end_matches('.'))
        .collect::<Vec<_>>()
        .join("/")
}

/// Adapter over a single-container [`ObjectStore`] instance.
///
/// The store is rooted at one bucket/container, which is how the concrete
/// `object_store` builders are configured; account-level enumeration needs a
/// lister wired per account and is not available through this adapter.
pub struct ObjectStoreLister {
    store: Arc<dyn ObjectStore>,
    container: String,
}

impl ObjectStoreLister {
    pub fn new(store: Arc<dyn ObjectStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }
}

#[async_trait::async_trait]
impl RemoteLister for ObjectStoreLister {
    async fn list_containers(&self, _continuation: Option<String>) -> anyhow::Result<ContainerPage> {
        Ok(ContainerPage {
            names: vec![self.container.clone()],
            continuation: None,
        })
    }

    async fn list_page(
        &self,
        _container: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> anyhow::Result<ObjectPage> {
        let prefix_path = if prefix.is_empty() {
            None
        } else {
            Some(StorePath::from(prefix.trim_end_matches('/')))
        };
        let offset_path = continuation.as_deref().map(StorePath::from);
        let mut stream = match &offset_path {
            Some(offset) => self.store.list_with_offset(prefix_path.as_ref(), offset),
            None => self.store.list(prefix_path.as_ref()),
        };
        let mut objects = Vec::with_capacity(PAGE_SIZE);
        let mut last_key = None;
        while objects.len() < PAGE_SIZE {
            match stream.next().await {
                Some(meta) => {
                    let meta = meta?;
                    let key = meta.location.to_string();
                    last_key = Some(key.clone());
                    let mut remote = RemoteObject::new(key, meta.size as u64);
                    remote.lmt = Some(meta.last_modified);
                    remote.version_id = meta.version;
                    remote.content = ContentProps::default();
                    objects.push(remote);
                }
                None => {
                    return Ok(ObjectPage {
                        objects,
                        continuation: None,
                    })
                }
            }
        }
        Ok(ObjectPage {
            objects,
            continuation: last_key,
        })
    }

    async fn head(&self, _container: &str, key: &str) -> anyhow::Result<Option<RemoteObject>> {
        match self.store.head(&StorePath::from(key)).await {
            Ok(meta) => {
                let mut remote = RemoteObject::new(meta.location.to_string(), meta.size as u64);
                remote.lmt = Some(meta.last_modified);
                remote.version_id = meta.version;
                Ok(Some(remote))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_versions(&self, _container: &str, _key: &str) -> anyhow::Result<Vec<RemoteObject>> {
        anyhow::bail!("object versions are not exposed by this listing transport")
    }
}

/// Deterministic in-memory lister for tests and the bench verb.
#[derive(Default)]
pub struct MemoryLister {
    containers: BTreeMap<String, BTreeMap<String, RemoteObject>>,
    versions: BTreeMap<(String, String), Vec<RemoteObject>>,
    page_size: usize,
}

impl MemoryLister {
    pub fn new() -> Self {
        Self {
            containers: BTreeMap::new(),
            versions: BTreeMap::new(),
            page_size: PAGE_SIZE,
        }
    }

    /// Force small pages so pagination paths are exercised.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn insert(&mut self, container: &str, object: RemoteObject) {
        self.containers
            .entry(container.to_string())
            .or_default()
            .insert(object.key.clone(), object);
    }

    pub fn insert_version(&mut self, container: &str, key: &str, object: RemoteObject) {
        self.versions
            .entry((container.to_string(), key.to_string()))
            .or_default()
            .push(object);
    }
}

#[async_trait::async_trait]
impl RemoteLister for MemoryLister {
    async fn list_containers(&self, _continuation: Option<String>) -> anyhow::Result<ContainerPage> {
        Ok(ContainerPage {
            names: self.containers.keys().cloned().collect(),
            continuation: None,
        })
    }

    async fn list_page(
        &self,
        container: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> anyhow::Result<ObjectPage> {
        let Some(objects) = self.containers.get(container) else {
            anyhow::bail!("container '{container}' does not exist");
        };
        let matching: Vec<&RemoteObject> = objects
            .values()
            .filter(|o| o.key.starts_with(prefix))
            .collect();
        let start = continuation
            .as_deref()
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0);
        let page: Vec<RemoteObject> = matching
            .iter()
            .skip(start)
            .take(self.page_size)
            .map(|o| (*o).clone())
            .collect();
        let next = start + page.len();
        let continuation = if next < matching.len() {
            Some(next.to_string())
        } else {
            None
        };
        Ok(ObjectPage {
            objects: page,
            continuation,
        })
    }

    async fn head(&self, container: &str, key: &str) -> anyhow::Result<Option<RemoteObject>> {
        Ok(self
            .containers
            .get(container)
            .and_then(|objects| objects.get(key))
            .cloned())
    }

    async fn list_versions(&self, container: &str, key: &str) -> anyhow::Result<Vec<RemoteObject>> {
        Ok(self
            .versions
            .get(&(container.to_string(), key.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_lister_paginates() {
        let mut lister = MemoryLister::new().with_page_size(2);
        for i in 0..5 {
            lister.insert("c", RemoteObject::new(format!("k{i}"), 1));
        }
        let mut seen = 0;
        let mut continuation = None;
        loop {
            let page = lister.list_page("c", "", continuation).await.unwrap();
            seen += page.objects.len();
            continuation = page.continuation;
            if continuation.is_none() {
                break;
            }
        }
        assert_eq!(seen, 5);
    }

    #[test]
    fn trailing_dots_are_trimmed_per_segment() {
        assert_eq!(trim_trailing_dots("a./b.."), "a/b");
        assert_eq!(trim_trailing_dots("plain/path"), "plain/path");
    }
}
