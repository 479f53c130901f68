//! Destination index for the sync comparator.
//!
//! Built once by draining the destination traverser, then read-only through
//! the compare phase. Keys fold case on case-insensitive endpoints.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ferry_core::{EntityType, FerryError, ObjectProcessor, RelativePath, StoredObject};

/// The slice of destination state the comparator needs per object: a few
/// tens of bytes, so whole-container indexes stay cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct DestMeta {
    pub relative_path: RelativePath,
    pub lmt: Option<DateTime<Utc>>,
    pub size: u64,
    pub md5: Option<[u8; 16]>,
    pub entity: EntityType,
}

impl DestMeta {
    fn from_object(object: &StoredObject) -> Self {
        Self {
            relative_path: object.relative_path.clone(),
            lmt: object.lmt,
            size: object.size,
            md5: object.content.md5,
            entity: object.entity,
        }
    }

    /// Rebuild an object for a delete order at the reconcile phase.
    pub fn into_object(self) -> StoredObject {
        match self.entity {
            EntityType::Folder => StoredObject::folder(self.relative_path, self.lmt),
            _ => StoredObject::file(self.relative_path, self.size, self.lmt),
        }
    }
}

/// Map from relative path to destination metadata.
pub struct DestinationIndex {
    map: HashMap<String, DestMeta>,
    fold_case: bool,
}

impl DestinationIndex {
    /// `fold_case` follows the destination endpoint: true for file shares
    /// and local paths on Windows, false everywhere else.
    pub fn new(fold_case: bool) -> Self {
        Self {
            map: HashMap::new(),
            fold_case,
        }
    }

    fn key(&self, rel: &RelativePath) -> String {
        if self.fold_case {
            rel.as_str().to_lowercase()
        } else {
            rel.as_str().to_string()
        }
    }

    pub fn insert(&mut self, object: &StoredObject) {
        self.map
            .insert(self.key(&object.relative_path), DestMeta::from_object(object));
    }

    /// Remove and return the entry for a source path; removal marks the
    /// destination twin as seen.
    pub fn take(&mut self, rel: &RelativePath) -> Option<DestMeta> {
        let key = self.key(rel);
        self.map.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drain whatever the compare phase did not claim: the destination-only
    /// extras. Files first in path order, then folders deepest-first so
    /// non-empty-folder deletions cannot occur.
    pub fn into_remaining(self) -> Vec<DestMeta> {
        let mut files: Vec<DestMeta> = Vec::new();
        let mut folders: Vec<DestMeta> = Vec::new();
        for meta in self.map.into_values() {
            if meta.entity == EntityType::Folder {
                folders.push(meta);
            } else {
                files.push(meta);
            }
        }
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        folders.sort_by(|a, b| {
            b.relative_path
                .depth()
                .cmp(&a.relative_path.depth())
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });
        files.extend(folders);
        files
    }
}

/// Processor that feeds a destination traversal into the index.
pub struct IndexBuilder {
    index: DestinationIndex,
}

impl IndexBuilder {
    pub fn new(fold_case: bool) -> Self {
        Self {
            index: DestinationIndex::new(fold_case),
        }
    }

    pub fn into_index(self) -> DestinationIndex {
        self.index
    }
}

#[async_trait]
impl ObjectProcessor for IndexBuilder {
    async fn process(&mut self, object: StoredObject) -> Result<(), FerryError> {
        self.index.insert(&object);
        Ok(())
    }
}
