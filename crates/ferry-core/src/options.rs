//! Closed option sets shared by the CLI and the plan file.
//!
//! Every set has a canonical string form; the string, never the ordinal, is
//! the wire format. Parsing is case-insensitive, display is canonical.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FerryError;

fn unknown(what: &str, value: &str) -> FerryError {
    FerryError::InvalidArgument(format!("unknown {what} '{value}'"))
}

/// Policy for a destination object that already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverwriteOption {
    #[default]
    True,
    False,
    Prompt,
    IfSourceNewer,
}

impl fmt::Display for OverwriteOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverwriteOption::True => "true",
            OverwriteOption::False => "false",
            OverwriteOption::Prompt => "prompt",
            OverwriteOption::IfSourceNewer => "ifSourceNewer",
        })
    }
}

impl FromStr for OverwriteOption {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "true" => Ok(OverwriteOption::True),
            "false" => Ok(OverwriteOption::False),
            "prompt" => Ok(OverwriteOption::Prompt),
            "ifsourcenewer" => Ok(OverwriteOption::IfSourceNewer),
            _ => Err(unknown("overwrite option", s)),
        }
    }
}

/// How strictly transferred content is validated against an expected MD5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashValidationOption {
    NoCheck,
    LogOnly,
    #[default]
    FailIfDifferent,
    FailIfDifferentOrMissing,
}

impl fmt::Display for HashValidationOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashValidationOption::NoCheck => "NoCheck",
            HashValidationOption::LogOnly => "LogOnly",
            HashValidationOption::FailIfDifferent => "FailIfDifferent",
            HashValidationOption::FailIfDifferentOrMissing => "FailIfDifferentOrMissing",
        })
    }
}

impl FromStr for HashValidationOption {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nocheck" => Ok(HashValidationOption::NoCheck),
            "logonly" => Ok(HashValidationOption::LogOnly),
            "failifdifferent" => Ok(HashValidationOption::FailIfDifferent),
            "failifdifferentormissing" => Ok(HashValidationOption::FailIfDifferentOrMissing),
            _ => Err(unknown("MD5 validation option", s)),
        }
    }
}

/// How symbolic links at the source are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymlinkHandling {
    #[default]
    Skip,
    Follow,
    Preserve,
}

impl fmt::Display for SymlinkHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SymlinkHandling::Skip => "skip",
            SymlinkHandling::Follow => "follow",
            SymlinkHandling::Preserve => "preserve",
        })
    }
}

impl FromStr for SymlinkHandling {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(SymlinkHandling::Skip),
            "follow" => Ok(SymlinkHandling::Follow),
            "preserve" => Ok(SymlinkHandling::Preserve),
            _ => Err(unknown("symlink handling", s)),
        }
    }
}

/// How hard links at the source are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardlinkHandling {
    #[default]
    Follow,
    Skip,
}

impl fmt::Display for HardlinkHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HardlinkHandling::Follow => "follow",
            HardlinkHandling::Skip => "skip",
        })
    }
}

impl FromStr for HardlinkHandling {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "follow" => Ok(HardlinkHandling::Follow),
            "skip" => Ok(HardlinkHandling::Skip),
            _ => Err(unknown("hardlink handling", s)),
        }
    }
}

/// Permanent-delete scope for soft-deleted snapshots and versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermanentDeleteOption {
    #[default]
    None,
    Snapshots,
    Versions,
    SnapshotsAndVersions,
}

impl fmt::Display for PermanentDeleteOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PermanentDeleteOption::None => "none",
            PermanentDeleteOption::Snapshots => "snapshots",
            PermanentDeleteOption::Versions => "versions",
            PermanentDeleteOption::SnapshotsAndVersions => "snapshotsandversions",
        })
    }
}

impl FromStr for PermanentDeleteOption {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(PermanentDeleteOption::None),
            "snapshots" => Ok(PermanentDeleteOption::Snapshots),
            "versions" => Ok(PermanentDeleteOption::Versions),
            "snapshotsandversions" => Ok(PermanentDeleteOption::SnapshotsAndVersions),
            _ => Err(unknown("permanent-delete option", s)),
        }
    }
}

/// Priority for rehydrating an archived object before transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RehydratePriority {
    #[default]
    Standard,
    High,
}

impl fmt::Display for RehydratePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RehydratePriority::Standard => "Standard",
            RehydratePriority::High => "High",
        })
    }
}

impl FromStr for RehydratePriority {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(RehydratePriority::Standard),
            "high" => Ok(RehydratePriority::High),
            _ => Err(unknown("rehydrate priority", s)),
        }
    }
}

/// Trailing-dot handling on file-share endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrailingDot {
    #[default]
    Enable,
    Disable,
}

impl fmt::Display for TrailingDot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrailingDot::Enable => "Enable",
            TrailingDot::Disable => "Disable",
        })
    }
}

impl FromStr for TrailingDot {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enable" => Ok(TrailingDot::Enable),
            "disable" => Ok(TrailingDot::Disable),
            _ => Err(unknown("trailing-dot option", s)),
        }
    }
}

/// Whether destination-only objects are deleted during sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteDestination {
    #[default]
    False,
    True,
    Prompt,
}

impl fmt::Display for DeleteDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeleteDestination::False => "false",
            DeleteDestination::True => "true",
            DeleteDestination::Prompt => "prompt",
        })
    }
}

impl FromStr for DeleteDestination {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "false" => Ok(DeleteDestination::False),
            "true" => Ok(DeleteDestination::True),
            "prompt" => Ok(DeleteDestination::Prompt),
            _ => Err(unknown("delete-destination option", s)),
        }
    }
}

/// Whether permissions are carried along with transferred objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreservePermissions {
    #[default]
    False,
    True,
}

impl fmt::Display for PreservePermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PreservePermissions::False => "false",
            PreservePermissions::True => "true",
        })
    }
}

impl FromStr for PreservePermissions {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "false" => Ok(PreservePermissions::False),
            "true" => Ok(PreservePermissions::True),
            _ => Err(unknown("preserve-permissions option", s)),
        }
    }
}

impl PreservePermissions {
    pub fn is_enabled(&self) -> bool {
        matches!(self, PreservePermissions::True)
    }
}

/// Content comparison strategy used by the sync comparator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareHash {
    #[default]
    None,
    Md5,
}

impl fmt::Display for CompareHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareHash::None => "None",
            CompareHash::Md5 => "MD5",
        })
    }
}

impl FromStr for CompareHash {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompareHash::None),
            "md5" => Ok(CompareHash::Md5),
            _ => Err(unknown("compare-hash option", s)),
        }
    }
}

/// Where locally computed hashes are cached between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalHashStorageMode {
    #[default]
    HiddenFiles,
    XAttr,
}

impl fmt::Display for LocalHashStorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LocalHashStorageMode::HiddenFiles => "HiddenFiles",
            LocalHashStorageMode::XAttr => "XAttr",
        })
    }
}

impl FromStr for LocalHashStorageMode {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hiddenfiles" => Ok(LocalHashStorageMode::HiddenFiles),
            "xattr" => Ok(LocalHashStorageMode::XAttr),
            _ => Err(unknown("hash storage mode", s)),
        }
    }
}

/// Blob-type tag on an object; `None` for non-blob backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobKind {
    #[default]
    BlockBlob,
    PageBlob,
    AppendBlob,
    None,
}

impl fmt::Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlobKind::BlockBlob => "BlockBlob",
            BlobKind::PageBlob => "PageBlob",
            BlobKind::AppendBlob => "AppendBlob",
            BlobKind::None => "None",
        })
    }
}

impl FromStr for BlobKind {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blockblob" => Ok(BlobKind::BlockBlob),
            "pageblob" => Ok(BlobKind::PageBlob),
            "appendblob" => Ok(BlobKind::AppendBlob),
            "none" => Ok(BlobKind::None),
            _ => Err(unknown("blob type", s)),
        }
    }
}

/// Storage access tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessTier {
    Hot,
    Cool,
    Cold,
    Archive,
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessTier::Hot => "Hot",
            AccessTier::Cool => "Cool",
            AccessTier::Cold => "Cold",
            AccessTier::Archive => "Archive",
        })
    }
}

impl FromStr for AccessTier {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hot" => Ok(AccessTier::Hot),
            "cool" => Ok(AccessTier::Cool),
            "cold" => Ok(AccessTier::Cold),
            "archive" => Ok(AccessTier::Archive),
            _ => Err(unknown("access tier", s)),
        }
    }
}

/// Snapshot handling for remove operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteSnapshotsOption {
    #[default]
    None,
    Include,
    Only,
}

impl fmt::Display for DeleteSnapshotsOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeleteSnapshotsOption::None => "none",
            DeleteSnapshotsOption::Include => "include",
            DeleteSnapshotsOption::Only => "only",
        })
    }
}

impl FromStr for DeleteSnapshotsOption {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(DeleteSnapshotsOption::None),
            "include" => Ok(DeleteSnapshotsOption::Include),
            "only" => Ok(DeleteSnapshotsOption::Only),
            _ => Err(unknown("delete-snapshots option", s)),
        }
    }
}

/// Console output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputType {
    #[default]
    Text,
    Json,
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputType::Text => "text",
            OutputType::Json => "json",
        })
    }
}

impl FromStr for OutputType {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputType::Text),
            "json" => Ok(OutputType::Json),
            _ => Err(unknown("output type", s)),
        }
    }
}

/// Console verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputLevel {
    #[default]
    Default,
    Essential,
    Quiet,
}

impl fmt::Display for OutputLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputLevel::Default => "default",
            OutputLevel::Essential => "essential",
            OutputLevel::Quiet => "quiet",
        })
    }
}

impl FromStr for OutputLevel {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(OutputLevel::Default),
            "essential" => Ok(OutputLevel::Essential),
            "quiet" => Ok(OutputLevel::Quiet),
            _ => Err(unknown("output level", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_strings_round_trip() {
        assert_eq!(
            "ifSourceNewer".parse::<OverwriteOption>().unwrap(),
            OverwriteOption::IfSourceNewer
        );
        assert_eq!(OverwriteOption::IfSourceNewer.to_string(), "ifSourceNewer");
        assert_eq!(
            "FailIfDifferentOrMissing"
                .parse::<HashValidationOption>()
                .unwrap()
                .to_string(),
            "FailIfDifferentOrMissing"
        );
        assert_eq!("MD5".parse::<CompareHash>().unwrap(), CompareHash::Md5);
        assert_eq!(
            "snapshotsandversions"
                .parse::<PermanentDeleteOption>()
                .unwrap(),
            PermanentDeleteOption::SnapshotsAndVersions
        );
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(
            "PRESERVE".parse::<SymlinkHandling>().unwrap(),
            SymlinkHandling::Preserve
        );
        assert_eq!("Prompt".parse::<DeleteDestination>().unwrap(), DeleteDestination::Prompt);
        assert_eq!("pageblob".parse::<BlobKind>().unwrap(), BlobKind::PageBlob);
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!("sometimes".parse::<OverwriteOption>().is_err());
        assert!("".parse::<AccessTier>().is_err());
        assert!("maybe".parse::<DeleteDestination>().is_err());
    }

    #[test]
    fn defaults_match_contract() {
        assert_eq!(OverwriteOption::default(), OverwriteOption::True);
        assert_eq!(DeleteDestination::default(), DeleteDestination::False);
        assert_eq!(SymlinkHandling::default(), SymlinkHandling::Skip);
        assert_eq!(HardlinkHandling::default(), HardlinkHandling::Follow);
        assert_eq!(CompareHash::default(), CompareHash::None);
    }
}
