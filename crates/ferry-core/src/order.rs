//! Transfer orders, job parts, and job identity.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FerryError;
use crate::location::{FromTo, SasToken};
use crate::object::{ContentProps, EntityType, StoredObject};
use crate::options::{
    AccessTier, BlobKind, DeleteDestination, DeleteSnapshotsOption, HardlinkHandling,
    HashValidationOption, OverwriteOption, PermanentDeleteOption, PreservePermissions,
    SymlinkHandling, TrailingDot,
};
use crate::path::RelativePath;
use crate::status::TransferStatus;

/// 128-bit job identity, formatted as a UUID. Comparable for equality;
/// ordering across jobs is by observed start time, never by the id value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| FerryError::InvalidArgument(format!("'{s}' is not a valid job ID")))
    }
}

/// Part number within a job. Dense, starting at 0.
pub type PartNum = u32;

/// What the execution layer should do with an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferAction {
    #[default]
    Copy,
    Remove,
}

impl fmt::Display for TransferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransferAction::Copy => "copy",
            TransferAction::Remove => "remove",
        })
    }
}

/// Per-order preservation flags, defaulted from the job flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreserveFlags {
    pub info: bool,
    pub permissions: bool,
    pub posix: bool,
}

/// One unit of work for the execution layer.
///
/// Orders carry paths relative to the roots on their [`JobPart`]; the part
/// reassembles full addresses (including any SAS) at dispatch time. The
/// single-object shortcut emits one order whose relative paths are both
/// empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOrder {
    pub action: TransferAction,
    pub source_rel: RelativePath,
    pub dest_rel: RelativePath,
    pub entity: EntityType,
    pub size: u64,
    pub lmt: Option<DateTime<Utc>>,
    pub content: ContentProps,
    pub metadata: BTreeMap<String, String>,
    pub blob_kind: BlobKind,
    pub access_tier: Option<AccessTier>,
    pub version_id: Option<String>,
    pub snapshot_id: Option<String>,
    pub preserve: PreserveFlags,
    pub status: TransferStatus,
}

impl TransferOrder {
    /// Build an order from an enumerated object, mapping its relative path
    /// onto both sides.
    pub fn from_object(action: TransferAction, object: &StoredObject) -> Self {
        Self {
            action,
            source_rel: object.relative_path.clone(),
            dest_rel: object.relative_path.clone(),
            entity: object.entity,
            size: object.size,
            lmt: object.lmt,
            content: object.content.clone(),
            metadata: object.metadata.clone(),
            blob_kind: object.blob_kind,
            access_tier: object.access_tier,
            version_id: object.version_id.clone(),
            snapshot_id: object.snapshot_id.clone(),
            preserve: PreserveFlags::default(),
            status: TransferStatus::NotStarted,
        }
    }

    pub fn with_preserve(mut self, preserve: PreserveFlags) -> Self {
        self.preserve = preserve;
        self
    }

    pub fn with_dest_rel(mut self, dest_rel: RelativePath) -> Self {
        self.dest_rel = dest_rel;
        self
    }
}

/// Customer-provided-key reference. Only the key *names* travel in the plan;
/// key material stays in the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpkInfo {
    pub by_name: Option<String>,
    pub by_value: bool,
}

/// How the execution layer should authenticate when it reassembles
/// addresses. The plan records the kind only; tokens are re-acquired on
/// resume because they may have expired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialKind {
    #[default]
    Anonymous,
    Sas,
    OAuth,
    AccessKey,
}

/// Per-job flags stamped onto every part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPartFlags {
    pub recursive: bool,
    pub preserve_info: bool,
    pub preserve_permissions: PreservePermissions,
    pub preserve_posix: bool,
    pub overwrite: OverwriteOption,
    pub md5_validation: HashValidationOption,
    pub put_md5: bool,
    pub cpk: Option<CpkInfo>,
    pub symlinks: SymlinkHandling,
    pub hardlinks: HardlinkHandling,
    pub include_directory_stubs: bool,
    pub delete_destination: DeleteDestination,
    pub trailing_dot: TrailingDot,
    pub permanent_delete: PermanentDeleteOption,
    pub delete_snapshots: DeleteSnapshotsOption,
    pub block_size_mb: Option<f64>,
    pub cap_mbps: Option<f64>,
    pub force_if_read_only: bool,
}

impl Default for JobPartFlags {
    fn default() -> Self {
        Self {
            recursive: false,
            preserve_info: true,
            preserve_permissions: PreservePermissions::default(),
            preserve_posix: false,
            overwrite: OverwriteOption::default(),
            md5_validation: HashValidationOption::default(),
            put_md5: false,
            cpk: None,
            symlinks: SymlinkHandling::default(),
            hardlinks: HardlinkHandling::default(),
            include_directory_stubs: false,
            delete_destination: DeleteDestination::default(),
            trailing_dot: TrailingDot::default(),
            permanent_delete: PermanentDeleteOption::default(),
            delete_snapshots: DeleteSnapshotsOption::default(),
            block_size_mb: None,
            cap_mbps: None,
            force_if_read_only: false,
        }
    }
}

/// A bounded, numbered batch of transfer orders belonging to one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPart {
    pub job_id: JobId,
    pub part_num: PartNum,
    pub from_to: FromTo,
    /// The command line that created the job, kept for `jobs list`.
    pub command: String,
    pub created: DateTime<Utc>,
    pub source_root: String,
    pub dest_root: String,
    pub source_sas: Option<SasToken>,
    pub dest_sas: Option<SasToken>,
    pub credential: CredentialKind,
    pub flags: JobPartFlags,
    pub is_final: bool,
    pub orders: Vec<TransferOrder>,
}

impl JobPart {
    /// Full source address for an order: root joined with the relative path,
    /// SAS reattached. Only called at the dispatch boundary.
    pub fn source_address(&self, order: &TransferOrder) -> String {
        join_address(&self.source_root, &order.source_rel, self.source_sas.as_ref())
    }

    /// Full destination address for an order.
    pub fn dest_address(&self, order: &TransferOrder) -> String {
        join_address(&self.dest_root, &order.dest_rel, self.dest_sas.as_ref())
    }

    /// Credential-free source address, safe for logs and console output.
    pub fn source_display(&self, order: &TransferOrder) -> String {
        join_address(&self.source_root, &order.source_rel, None)
    }

    /// Credential-free destination address.
    pub fn dest_display(&self, order: &TransferOrder) -> String {
        join_address(&self.dest_root, &order.dest_rel, None)
    }
}

fn join_address(root: &str, rel: &RelativePath, sas: Option<&SasToken>) -> String {
    let mut address = if rel.is_root() {
        root.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), rel)
    };
    if let Some(sas) = sas {
        address.push('?');
        address.push_str(sas.secret());
    }
    address
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part_with(orders: Vec<TransferOrder>) -> JobPart {
        JobPart {
            job_id: JobId::new(),
            part_num: 0,
            from_to: FromTo::BlobLocal,
            command: "copy src dst".into(),
            created: Utc::now(),
            source_root: "https://acct.blob.core.windows.net/c".into(),
            dest_root: "/tmp/out".into(),
            source_sas: Some(SasToken::new("sig=S")),
            dest_sas: None,
            credential: CredentialKind::Sas,
            flags: JobPartFlags::default(),
            is_final: true,
            orders,
        }
    }

    #[test]
    fn job_id_text_round_trip() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn addresses_reassemble_root_rel_and_sas() {
        let obj = StoredObject::file(RelativePath::parse("a/b.txt").unwrap(), 9, None);
        let order = TransferOrder::from_object(TransferAction::Copy, &obj);
        let part = part_with(vec![order.clone()]);
        assert_eq!(
            part.source_address(&order),
            "https://acct.blob.core.windows.net/c/a/b.txt?sig=S"
        );
        assert_eq!(part.dest_address(&order), "/tmp/out/a/b.txt");
        // The display forms never carry the token.
        assert_eq!(
            part.source_display(&order),
            "https://acct.blob.core.windows.net/c/a/b.txt"
        );
        assert!(!part.source_display(&order).contains("sig="));
    }

    #[test]
    fn empty_relative_path_addresses_the_root() {
        let obj = StoredObject::file(RelativePath::root(), 9, None);
        let order = TransferOrder::from_object(TransferAction::Copy, &obj);
        let part = part_with(vec![order.clone()]);
        assert_eq!(
            part.source_address(&order),
            "https://acct.blob.core.windows.net/c?sig=S"
        );
    }

    #[test]
    fn order_inherits_object_properties() {
        let obj = StoredObject::file(RelativePath::parse("v.txt").unwrap(), 5, None)
            .with_version("v1")
            .with_tier(AccessTier::Cool);
        let order = TransferOrder::from_object(TransferAction::Remove, &obj);
        assert_eq!(order.action, TransferAction::Remove);
        assert_eq!(order.version_id.as_deref(), Some("v1"));
        assert_eq!(order.access_tier, Some(AccessTier::Cool));
        assert_eq!(order.status, TransferStatus::NotStarted);
    }
}
