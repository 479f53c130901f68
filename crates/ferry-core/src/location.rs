//! Endpoint locations, transfer-pair resolution, and wildcard cooking.
//!
//! A raw source or destination string becomes a [`Location`]: a tagged kind, a
//! credential-free path, and an optional shared-access signature held apart
//! from the path so it can never leak into logs or error text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FerryError;

/// Which backend a location addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationKind {
    Local,
    Blob,
    File,
    BlobFs,
    S3,
    Gcp,
    Pipe,
    Unknown,
}

impl LocationKind {
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            LocationKind::Blob
                | LocationKind::File
                | LocationKind::BlobFs
                | LocationKind::S3
                | LocationKind::Gcp
        )
    }

    /// Whether object paths at this endpoint compare case-insensitively.
    pub fn case_insensitive(&self) -> bool {
        match self {
            LocationKind::File => true,
            LocationKind::Local => cfg!(windows),
            _ => false,
        }
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LocationKind::Local => "Local",
            LocationKind::Blob => "Blob",
            LocationKind::File => "File",
            LocationKind::BlobFs => "BlobFS",
            LocationKind::S3 => "S3",
            LocationKind::Gcp => "GCP",
            LocationKind::Pipe => "Pipe",
            LocationKind::Unknown => "Unknown",
        })
    }
}

/// A shared-access signature, stored apart from the URL path.
///
/// `Debug` and `Display` redact the secret; only [`SasToken::secret`] exposes
/// it, at the dispatch boundary where addresses are reassembled.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SasToken(String);

impl SasToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SasToken(***)")
    }
}

impl fmt::Display for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Result of wildcard analysis on a source path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WildcardSpec {
    /// The final segment was a pattern: enumeration roots at its parent and
    /// matches land at the root of the transfer rather than under the
    /// pattern segment.
    pub strip_top_dir: bool,
    /// The decoded pattern segment, when one was stripped.
    pub pattern: Option<String>,
}

/// A resolved endpoint: kind, credential-free path, optional SAS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    kind: LocationKind,
    path: String,
    sas: Option<SasToken>,
}

impl Location {
    pub fn new(kind: LocationKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            sas: None,
        }
    }

    /// Infer the kind from the raw string and split off any query string so
    /// the credential never travels with the path.
    pub fn parse(raw: &str) -> Self {
        let kind = Self::infer_kind(raw);
        if kind.is_remote() {
            match raw.split_once('?') {
                Some((path, query)) if !query.is_empty() => Self {
                    kind,
                    path: path.to_string(),
                    sas: Some(SasToken::new(query)),
                },
                Some((path, _)) => Self::new(kind, path),
                None => Self::new(kind, raw),
            }
        } else {
            Self::new(kind, raw)
        }
    }

    /// Host/scheme pattern matching per the supported-endpoint table.
    pub fn infer_kind(raw: &str) -> LocationKind {
        let lower = raw.to_ascii_lowercase();
        let rest = match lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"))
        {
            Some(rest) => rest,
            // Anything that is not a URL is taken as a filesystem path.
            None => return LocationKind::Local,
        };
        let host = rest.split(['/', '?']).next().unwrap_or("");
        if host.ends_with(".blob.core.windows.net") {
            LocationKind::Blob
        } else if host.ends_with(".file.core.windows.net") {
            LocationKind::File
        } else if host.ends_with(".dfs.core.windows.net") {
            LocationKind::BlobFs
        } else if host.starts_with("s3") && host.ends_with(".amazonaws.com") {
            LocationKind::S3
        } else if host == "storage.cloud.google.com" {
            LocationKind::Gcp
        } else {
            LocationKind::Unknown
        }
    }

    pub fn kind(&self) -> LocationKind {
        self.kind
    }

    /// Force the kind, used when an explicit `--from-to` override is present.
    pub fn with_kind(mut self, kind: LocationKind) -> Self {
        self.kind = kind;
        self
    }

    /// The credential-free path or URL. Safe for logs.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn sas(&self) -> Option<&SasToken> {
        self.sas.as_ref()
    }

    pub fn with_sas(mut self, sas: Option<SasToken>) -> Self {
        self.sas = sas;
        self
    }

    fn with_path(&self, path: String) -> Self {
        Self {
            kind: self.kind,
            path,
            sas: self.sas.clone(),
        }
    }

    /// Split a remote URL into `scheme://host` and the object path after it.
    /// For local paths the endpoint part is empty.
    fn split_endpoint(&self) -> (&str, &str) {
        if let Some(scheme_end) = self.path.find("://") {
            let after_scheme = scheme_end + 3;
            match self.path[after_scheme..].find('/') {
                Some(slash) => {
                    let host_end = after_scheme + slash;
                    (&self.path[..host_end], &self.path[host_end + 1..])
                }
                None => (&self.path[..], ""),
            }
        } else {
            ("", &self.path[..])
        }
    }

    /// The first object-path segment (container, share, bucket) and the key
    /// prefix below it. Both empty at an account root.
    pub fn split_container(&self) -> (String, String) {
        let (_, object_path) = self.split_endpoint();
        match object_path.split_once('/') {
            Some((container, key)) => (container.to_string(), key.to_string()),
            None => (object_path.to_string(), String::new()),
        }
    }

    /// Whether the path stops at the account root (no container segment).
    pub fn is_account_root(&self) -> bool {
        let (container, key) = self.split_container();
        container.is_empty() && key.is_empty()
    }

    /// Analyse wildcard use and return the cooked location plus the spec.
    ///
    /// An unescaped `*` may only appear in the final path segment; there it
    /// strips the top directory and becomes a match pattern. A percent-escaped
    /// `%2A` is a literal `*` in the object name. Remote segments are
    /// percent-decoded in the cooked path.
    pub fn cook_wildcards(&self) -> Result<(Location, WildcardSpec), FerryError> {
        let (endpoint, object_path) = self.split_endpoint();
        let normalised = object_path.replace('\\', "/");
        let segments: Vec<&str> = if normalised.is_empty() {
            Vec::new()
        } else {
            normalised.split('/').collect()
        };

        let last = segments.len().saturating_sub(1);
        for (i, segment) in segments.iter().enumerate() {
            if segment.contains('*') && i != last {
                return Err(FerryError::InvalidArgument(format!(
                    "cannot use wildcards in the middle of a path; '{segment}' is not the final segment"
                )));
            }
        }

        let decode = self.kind.is_remote();
        let cook = |seg: &str| -> String {
            if decode {
                percent_decode(seg)
            } else {
                seg.to_string()
            }
        };

        let (kept, spec) = match segments.last() {
            Some(tail) if tail.contains('*') => (
                &segments[..last],
                WildcardSpec {
                    strip_top_dir: true,
                    pattern: Some(cook(tail)),
                },
            ),
            _ => (&segments[..], WildcardSpec::default()),
        };

        let cooked_path = kept.iter().map(|s| cook(s)).collect::<Vec<_>>().join("/");
        let full = if endpoint.is_empty() {
            cooked_path
        } else if cooked_path.is_empty() {
            endpoint.to_string()
        } else {
            format!("{endpoint}/{cooked_path}")
        };
        Ok((self.with_path(full), spec))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Decode `%XX` escapes; malformed escapes pass through unchanged.
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// The closed set of supported transfer pairs, including the trash variants
/// used by remove and the properties-only variants used by set-properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FromTo {
    LocalBlob,
    LocalFile,
    LocalBlobFs,
    BlobLocal,
    FileLocal,
    BlobFsLocal,
    BlobBlob,
    BlobFile,
    FileBlob,
    FileFile,
    BlobFsBlobFs,
    S3Blob,
    GcpBlob,
    PipeBlob,
    BlobPipe,
    BlobTrash,
    FileTrash,
    BlobFsTrash,
    BlobNone,
    FileNone,
    BlobFsNone,
}

impl FromTo {
    /// Infer the pair for a copy/sync from the two resolved kinds.
    pub fn infer(src: LocationKind, dst: LocationKind) -> Result<FromTo, FerryError> {
        use LocationKind::*;
        let pair = match (src, dst) {
            (Local, Blob) => FromTo::LocalBlob,
            (Local, File) => FromTo::LocalFile,
            (Local, BlobFs) => FromTo::LocalBlobFs,
            (Blob, Local) => FromTo::BlobLocal,
            (File, Local) => FromTo::FileLocal,
            (BlobFs, Local) => FromTo::BlobFsLocal,
            (Blob, Blob) => FromTo::BlobBlob,
            (Blob, File) => FromTo::BlobFile,
            (File, Blob) => FromTo::FileBlob,
            (File, File) => FromTo::FileFile,
            (BlobFs, BlobFs) => FromTo::BlobFsBlobFs,
            (S3, Blob) => FromTo::S3Blob,
            (Gcp, Blob) => FromTo::GcpBlob,
            (Pipe, Blob) => FromTo::PipeBlob,
            (Blob, Pipe) => FromTo::BlobPipe,
            (s, d) => {
                return Err(FerryError::UnsupportedEndpoint(format!(
                    "{s} -> {d} is not a supported transfer pair"
                )))
            }
        };
        Ok(pair)
    }

    /// Infer the trash pair for a remove.
    pub fn infer_remove(src: LocationKind) -> Result<FromTo, FerryError> {
        match src {
            LocationKind::Blob => Ok(FromTo::BlobTrash),
            LocationKind::File => Ok(FromTo::FileTrash),
            LocationKind::BlobFs => Ok(FromTo::BlobFsTrash),
            other => Err(FerryError::UnsupportedEndpoint(format!(
                "remove is not supported for {other} endpoints"
            ))),
        }
    }

    pub fn source_kind(&self) -> LocationKind {
        use FromTo::*;
        match self {
            LocalBlob | LocalFile | LocalBlobFs => LocationKind::Local,
            BlobLocal | BlobBlob | BlobFile | BlobPipe | BlobTrash | BlobNone => {
                LocationKind::Blob
            }
            FileLocal | FileBlob | FileFile | FileTrash | FileNone => LocationKind::File,
            BlobFsLocal | BlobFsBlobFs | BlobFsTrash | BlobFsNone => LocationKind::BlobFs,
            S3Blob => LocationKind::S3,
            GcpBlob => LocationKind::Gcp,
            PipeBlob => LocationKind::Pipe,
        }
    }

    /// The destination kind; `None` for the trash and properties-only
    /// variants, which have no second endpoint.
    pub fn dest_kind(&self) -> Option<LocationKind> {
        use FromTo::*;
        match self {
            LocalBlob | FileBlob | S3Blob | GcpBlob | PipeBlob | BlobBlob => {
                Some(LocationKind::Blob)
            }
            LocalFile | BlobFile | FileFile => Some(LocationKind::File),
            LocalBlobFs | BlobFsBlobFs => Some(LocationKind::BlobFs),
            BlobLocal | FileLocal | BlobFsLocal => Some(LocationKind::Local),
            BlobPipe => Some(LocationKind::Pipe),
            BlobTrash | FileTrash | BlobFsTrash | BlobNone | FileNone | BlobFsNone => None,
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, FromTo::BlobTrash | FromTo::FileTrash | FromTo::BlobFsTrash)
    }

    pub fn is_properties_only(&self) -> bool {
        matches!(self, FromTo::BlobNone | FromTo::FileNone | FromTo::BlobFsNone)
    }

    pub fn is_upload(&self) -> bool {
        self.source_kind() == LocationKind::Local
    }

    pub fn is_download(&self) -> bool {
        self.dest_kind() == Some(LocationKind::Local)
    }

    pub fn is_s2s(&self) -> bool {
        self.source_kind().is_remote()
            && self.dest_kind().map(|k| k.is_remote()).unwrap_or(false)
    }
}

impl fmt::Display for FromTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FromTo::LocalBlob => "LocalBlob",
            FromTo::LocalFile => "LocalFile",
            FromTo::LocalBlobFs => "LocalBlobFS",
            FromTo::BlobLocal => "BlobLocal",
            FromTo::FileLocal => "FileLocal",
            FromTo::BlobFsLocal => "BlobFSLocal",
            FromTo::BlobBlob => "BlobBlob",
            FromTo::BlobFile => "BlobFile",
            FromTo::FileBlob => "FileBlob",
            FromTo::FileFile => "FileFile",
            FromTo::BlobFsBlobFs => "BlobFSBlobFS",
            FromTo::S3Blob => "S3Blob",
            FromTo::GcpBlob => "GCPBlob",
            FromTo::PipeBlob => "PipeBlob",
            FromTo::BlobPipe => "BlobPipe",
            FromTo::BlobTrash => "BlobTrash",
            FromTo::FileTrash => "FileTrash",
            FromTo::BlobFsTrash => "BlobFSTrash",
            FromTo::BlobNone => "BlobNone",
            FromTo::FileNone => "FileNone",
            FromTo::BlobFsNone => "BlobFSNone",
        })
    }
}

impl FromStr for FromTo {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "localblob" => Ok(FromTo::LocalBlob),
            "localfile" => Ok(FromTo::LocalFile),
            "localblobfs" => Ok(FromTo::LocalBlobFs),
            "bloblocal" => Ok(FromTo::BlobLocal),
            "filelocal" => Ok(FromTo::FileLocal),
            "blobfslocal" => Ok(FromTo::BlobFsLocal),
            "blobblob" => Ok(FromTo::BlobBlob),
            "blobfile" => Ok(FromTo::BlobFile),
            "fileblob" => Ok(FromTo::FileBlob),
            "filefile" => Ok(FromTo::FileFile),
            "blobfsblobfs" => Ok(FromTo::BlobFsBlobFs),
            "s3blob" => Ok(FromTo::S3Blob),
            "gcpblob" => Ok(FromTo::GcpBlob),
            "pipeblob" => Ok(FromTo::PipeBlob),
            "blobpipe" => Ok(FromTo::BlobPipe),
            "blobtrash" => Ok(FromTo::BlobTrash),
            "filetrash" => Ok(FromTo::FileTrash),
            "blobfstrash" => Ok(FromTo::BlobFsTrash),
            "blobnone" => Ok(FromTo::BlobNone),
            "filenone" => Ok(FromTo::FileNone),
            "blobfsnone" => Ok(FromTo::BlobFsNone),
            _ => Err(FerryError::InvalidArgument(format!(
                "unknown from-to value '{s}'"
            ))),
        }
    }
}
