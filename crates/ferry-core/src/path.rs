//! Relative-path newtype shared by every stage of the pipeline.
//!
//! All object addressing below an enumeration root flows through
//! [`RelativePath`] rather than raw strings, so the invariants (forward
//! slashes only, no leading or trailing separator, no `..` segment) hold by
//! construction everywhere a path is consumed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FerryError;

/// A normalised path relative to an enumeration root.
///
/// The empty path addresses the root itself (the single-object shortcut emits
/// orders with empty relative paths; the roots carry the full addresses).
/// Normalisation is idempotent: `normalise(normalise(x)) == normalise(x)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// The empty path, addressing the enumeration root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Strict parse: accepts only an already-normalised path.
    pub fn parse(s: &str) -> Result<Self, FerryError> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        if s.starts_with('/') || s.ends_with('/') {
            return Err(FerryError::InvalidArgument(format!(
                "relative path '{s}' must not start or end with '/'"
            )));
        }
        if s.contains('\\') {
            return Err(FerryError::InvalidArgument(format!(
                "relative path '{s}' must use '/' as separator"
            )));
        }
        for segment in s.split('/') {
            if segment.is_empty() {
                return Err(FerryError::InvalidArgument(format!(
                    "relative path '{s}' contains an empty segment"
                )));
            }
            if segment == ".." {
                return Err(FerryError::InvalidArgument(format!(
                    "relative path '{s}' must not contain '..'"
                )));
            }
        }
        Ok(Self(s.to_string()))
    }

    /// Lossy cleanup of a raw path: host-OS separators become `/`, duplicate
    /// and boundary separators and `.` segments are dropped. A `..` segment
    /// is still rejected; nothing may escape the enumeration root.
    pub fn normalise(raw: &str) -> Result<Self, FerryError> {
        let forward = raw.replace('\\', "/");
        let mut segments = Vec::new();
        for segment in forward.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            }
            if segment == ".." {
                return Err(FerryError::InvalidArgument(format!(
                    "path '{raw}' escapes the enumeration root"
                )));
            }
            segments.push(segment);
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The final path segment; empty for the root.
    pub fn leaf(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// The parent path, or `None` at the root.
    pub fn parent(&self) -> Option<RelativePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Append a child path, normalising the result.
    pub fn join(&self, child: &str) -> Result<RelativePath, FerryError> {
        if self.is_root() {
            Self::normalise(child)
        } else {
            Self::normalise(&format!("{}/{}", self.0, child))
        }
    }

    /// Number of segments; 0 for the root.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.split('/').count()
        }
    }

    /// Whether the path sits directly under the root (no separator). Used by
    /// non-recursive traversal.
    pub fn is_top_level(&self) -> bool {
        !self.0.contains('/')
    }

    /// Prefix match with directory-boundary semantics: equal to `prefix`, or
    /// beginning with `prefix` followed by `/`.
    pub fn starts_with_dir(&self, prefix: &RelativePath) -> bool {
        if prefix.is_root() {
            return true;
        }
        self.0 == prefix.0
            || (self.0.len() > prefix.0.len()
                && self.0.starts_with(&prefix.0)
                && self.0.as_bytes()[prefix.0.len()] == b'/')
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = FerryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RelativePath> for String {
    fn from(value: RelativePath) -> Self {
        value.0
    }
}
