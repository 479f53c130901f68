//! The canonical object record emitted by traversers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FerryError;
use crate::options::{AccessTier, BlobKind};
use crate::path::RelativePath;

/// What kind of entity an enumerated object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    File,
    Folder,
    Symlink,
    Hardlink,
    Other,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityType::File => "File",
            EntityType::Folder => "Folder",
            EntityType::Symlink => "Symlink",
            EntityType::Hardlink => "Hardlink",
            EntityType::Other => "Other",
        };
        f.write_str(s)
    }
}

/// Standard content properties carried alongside an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentProps {
    pub md5: Option<[u8; 16]>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
}

/// Opaque platform attribute bitset.
///
/// The bit layout follows the Windows file-attribute constants; on other
/// platforms the probe reports an empty set. Filters only ever intersect two
/// sets, so the core never interprets individual bits.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlatformAttrs(u32);

impl PlatformAttrs {
    pub const READ_ONLY: PlatformAttrs = PlatformAttrs(0x0001);
    pub const HIDDEN: PlatformAttrs = PlatformAttrs(0x0002);
    pub const SYSTEM: PlatformAttrs = PlatformAttrs(0x0004);
    pub const ARCHIVE: PlatformAttrs = PlatformAttrs(0x0020);
    pub const NORMAL: PlatformAttrs = PlatformAttrs(0x0080);
    pub const TEMPORARY: PlatformAttrs = PlatformAttrs(0x0100);
    pub const COMPRESSED: PlatformAttrs = PlatformAttrs(0x0800);
    pub const OFFLINE: PlatformAttrs = PlatformAttrs(0x1000);
    pub const NOT_CONTENT_INDEXED: PlatformAttrs = PlatformAttrs(0x2000);
    pub const ENCRYPTED: PlatformAttrs = PlatformAttrs(0x4000);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn union(&self, other: PlatformAttrs) -> PlatformAttrs {
        PlatformAttrs(self.0 | other.0)
    }

    pub fn intersects(&self, other: PlatformAttrs) -> bool {
        self.0 & other.0 != 0
    }

    /// Parse an attribute-letter list as accepted by the attribute filters,
    /// e.g. `"RHS"`.
    pub fn from_letters(letters: &str) -> Result<Self, FerryError> {
        let mut attrs = Self::empty();
        for letter in letters.chars() {
            let bit = match letter.to_ascii_uppercase() {
                'R' => Self::READ_ONLY,
                'H' => Self::HIDDEN,
                'S' => Self::SYSTEM,
                'A' => Self::ARCHIVE,
                'N' => Self::NORMAL,
                'T' => Self::TEMPORARY,
                'C' => Self::COMPRESSED,
                'O' => Self::OFFLINE,
                'I' => Self::NOT_CONTENT_INDEXED,
                'E' => Self::ENCRYPTED,
                other => {
                    return Err(FerryError::InvalidArgument(format!(
                        "unknown file attribute letter '{other}'"
                    )))
                }
            };
            attrs = attrs.union(bit);
        }
        Ok(attrs)
    }
}

/// One discovered item (file, folder or link) with everything a processor
/// might need to act on it.
///
/// Objects are never mutated in flight: a stage that needs to adjust one
/// produces a replacement value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Leaf name.
    pub name: String,
    /// Path from the enumeration root, `/`-separated regardless of host OS.
    pub relative_path: RelativePath,
    /// Containing bucket/share/container; empty when the root itself is the
    /// container.
    pub container: String,
    pub entity: EntityType,
    pub lmt: Option<DateTime<Utc>>,
    pub size: u64,
    pub content: ContentProps,
    pub metadata: BTreeMap<String, String>,
    pub attrs: PlatformAttrs,
    pub blob_kind: BlobKind,
    pub version_id: Option<String>,
    pub snapshot_id: Option<String>,
    pub access_tier: Option<AccessTier>,
    /// Target string for a preserved symlink.
    pub link_target: Option<String>,
}

impl StoredObject {
    pub fn file(relative_path: RelativePath, size: u64, lmt: Option<DateTime<Utc>>) -> Self {
        Self {
            name: relative_path.leaf().to_string(),
            relative_path,
            container: String::new(),
            entity: EntityType::File,
            lmt,
            size,
            content: ContentProps::default(),
            metadata: BTreeMap::new(),
            attrs: PlatformAttrs::empty(),
            blob_kind: BlobKind::BlockBlob,
            version_id: None,
            snapshot_id: None,
            access_tier: None,
            link_target: None,
        }
    }

    /// A folder object: size 0, no MD5.
    pub fn folder(relative_path: RelativePath, lmt: Option<DateTime<Utc>>) -> Self {
        let mut obj = Self::file(relative_path, 0, lmt);
        obj.entity = EntityType::Folder;
        obj.blob_kind = BlobKind::None;
        obj
    }

    pub fn symlink(relative_path: RelativePath, target: String, lmt: Option<DateTime<Utc>>) -> Self {
        let mut obj = Self::file(relative_path, 0, lmt);
        obj.entity = EntityType::Symlink;
        obj.link_target = Some(target);
        obj
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn with_content(mut self, content: ContentProps) -> Self {
        self.content = content;
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_attrs(mut self, attrs: PlatformAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_blob_kind(mut self, kind: BlobKind) -> Self {
        self.blob_kind = kind;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version_id = Some(version.into());
        self
    }

    pub fn with_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.snapshot_id = Some(snapshot.into());
        self
    }

    pub fn with_tier(mut self, tier: AccessTier) -> Self {
        self.access_tier = Some(tier);
        self
    }

    pub fn with_entity(mut self, entity: EntityType) -> Self {
        self.entity = entity;
        self
    }

    pub fn is_folder(&self) -> bool {
        self.entity == EntityType::Folder
    }

    /// An object carrying a version identifier is immutable from the
    /// producer's perspective.
    pub fn is_immutable(&self) -> bool {
        self.version_id.is_some()
    }
}
