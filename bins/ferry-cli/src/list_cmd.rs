//! The list, bench, and env verbs.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use ferry_core::{
    units, CredentialKind, DispatchPart, ExitKind, FerryError, FilterChain, JobId, JobPart,
    JobPartFlags, LifecycleManager, Location, LocationKind, ObjectProcessor, PreserveFlags,
    RemoteObject, Side, StoredObject, TransferAction,
};
use ferry_io::{BlobTraverser, MemoryLister};
use ferry_jobs::{JobHeader, PartBatcher, SharedBatcher};

use crate::args::{BenchArgs, ListArgs};
use crate::cook::build_filters;
use crate::run::{build_traverser, TraverserSpec};

/// Optional columns for `list --properties`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListProp {
    VersionId,
    BlobType,
    ContentType,
    LastModifiedTime,
    AccessTier,
}

impl FromStr for ListProp {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "versionid" => Ok(ListProp::VersionId),
            "blobtype" => Ok(ListProp::BlobType),
            "contenttype" => Ok(ListProp::ContentType),
            "lastmodifiedtime" => Ok(ListProp::LastModifiedTime),
            "accesstier" => Ok(ListProp::AccessTier),
            other => Err(FerryError::InvalidArgument(format!(
                "unknown list property '{other}'"
            ))),
        }
    }
}

/// Prints one line per object and keeps the tally for the final summary.
struct ListPrinter {
    lifecycle: Arc<LifecycleManager>,
    props: Vec<ListProp>,
    machine_readable: bool,
    running_tally: bool,
    count: u64,
    bytes: u64,
}

impl ListPrinter {
    fn size_text(&self, bytes: u64) -> String {
        if self.machine_readable {
            units::to_machine_size(bytes)
        } else {
            units::to_display_size(bytes)
        }
    }
}

#[async_trait]
impl ObjectProcessor for ListPrinter {
    async fn process(&mut self, object: StoredObject) -> Result<(), FerryError> {
        let path = if object.relative_path.is_root() {
            object.name.clone()
        } else {
            object.relative_path.to_string()
        };
        let mut text = format!("{path}; Content Length: {}", self.size_text(object.size));
        let mut record = serde_json::json!({
            "Path": path,
            "ContentLength": object.size,
        });
        for prop in &self.props {
            let (label, value) = match prop {
                ListProp::VersionId => (
                    "VersionId",
                    object.version_id.clone().unwrap_or_default(),
                ),
                ListProp::BlobType => ("BlobType", object.blob_kind.to_string()),
                ListProp::ContentType => (
                    "ContentType",
                    object.content.content_type.clone().unwrap_or_default(),
                ),
                ListProp::LastModifiedTime => (
                    "LastModifiedTime",
                    object.lmt.map(|t| t.to_rfc3339()).unwrap_or_default(),
                ),
                ListProp::AccessTier => (
                    "AccessTier",
                    object
                        .access_tier
                        .map(|t| t.to_string())
                        .unwrap_or_default(),
                ),
            };
            text.push_str(&format!("; {label}: {value}"));
            record[label] = serde_json::Value::String(value);
        }
        self.lifecycle.item(&text, &record);
        self.count += 1;
        self.bytes += object.size;
        if self.running_tally && self.count % 1000 == 0 {
            self.lifecycle.info(&format!(
                "... {} objects so far, {}",
                self.count,
                self.size_text(self.bytes)
            ));
        }
        Ok(())
    }
}

pub async fn run_list(
    args: &ListArgs,
    lifecycle: Arc<LifecycleManager>,
    cancel: &CancellationToken,
) -> Result<ExitKind, FerryError> {
    let mut location = Location::parse(&args.endpoint);
    if let Some(text) = &args.from_to {
        let from_to: ferry_core::FromTo = text.parse()?;
        location = location.with_kind(from_to.source_kind());
    } else if location.kind() == LocationKind::Unknown {
        return Err(FerryError::UnsupportedEndpoint(format!(
            "cannot infer the endpoint kind of '{location}'; pass --from-to"
        )));
    }
    let (location, wildcard) = location.cook_wildcards()?;
    let filters = if location.is_account_root() {
        FilterChain::new()
    } else {
        build_filters(&Default::default(), &wildcard)?
    };

    let props = match &args.properties {
        Some(arg) => arg
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let flags = JobPartFlags {
        recursive: true,
        ..Default::default()
    };
    let container_pattern = if location.is_account_root() {
        wildcard.pattern.clone()
    } else {
        None
    };
    let traverser = build_traverser(TraverserSpec {
        location: &location,
        side: Side::Source,
        recursive: true,
        flags: &flags,
        container_pattern,
        list_entries: None,
        version_entries: None,
    })?;

    let mut printer = ListPrinter {
        lifecycle: lifecycle.clone(),
        props,
        machine_readable: args.machine_readable,
        running_tally: args.running_tally,
        count: 0,
        bytes: 0,
    };
    traverser.traverse(&mut printer, &filters, cancel).await?;

    let size_text = printer.size_text(printer.bytes);
    lifecycle.item(
        &format!(
            "\nFile count: {}\nTotal file size: {}",
            printer.count, size_text
        ),
        &serde_json::json!({
            "FileCount": printer.count,
            "TotalFileSize": printer.bytes,
        }),
    );
    Ok(ExitKind::Success)
}

/// Counts parts and orders without persisting anything.
#[derive(Default, Clone)]
struct CountingDispatch {
    parts: Arc<std::sync::Mutex<(u64, u64)>>,
}

#[async_trait]
impl DispatchPart for CountingDispatch {
    async fn dispatch(&mut self, part: JobPart) -> Result<(), FerryError> {
        let mut counts = self.parts.lock().unwrap_or_else(|e| e.into_inner());
        counts.0 += 1;
        counts.1 += part.orders.len() as u64;
        Ok(())
    }
}

/// Push a synthetic enumeration through the real filter/batcher pipeline and
/// report the planning rate.
pub async fn run_bench(
    args: &BenchArgs,
    lifecycle: Arc<LifecycleManager>,
    cancel: &CancellationToken,
) -> Result<ExitKind, FerryError> {
    let mut lister = MemoryLister::new();
    for i in 0..args.count {
        lister.insert(
            "bench",
            RemoteObject::new(format!("data/obj{i:08}.dat"), args.size_per_object),
        );
    }
    let traverser = BlobTraverser::new(
        Arc::new(lister),
        Side::Source,
        "bench",
        "",
        true,
        false,
    );

    let sink = CountingDispatch::default();
    let header = JobHeader {
        job_id: JobId::new(),
        from_to: ferry_core::FromTo::BlobLocal,
        command: "bench".into(),
        created: Utc::now(),
        source_root: "bench://synthetic".into(),
        dest_root: String::new(),
        source_sas: None,
        dest_sas: None,
        credential: CredentialKind::Anonymous,
        flags: JobPartFlags::default(),
    };
    let batcher = SharedBatcher::new(PartBatcher::new(
        header,
        args.transfers_per_part,
        Box::new(sink.clone()),
    ));
    let mut processor = batcher.processor(TransferAction::Copy, PreserveFlags::default());

    let started = std::time::Instant::now();
    traverser
        .traverse(&mut processor, &FilterChain::new(), cancel)
        .await?;
    batcher.dispatch_final_part().await?;
    let elapsed = started.elapsed();

    let (parts, orders) = *sink.parts.lock().unwrap_or_else(|e| e.into_inner());
    let rate = orders as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    lifecycle.essential(&format!(
        "Planned {orders} orders in {parts} part(s) over {elapsed:.2?} ({rate:.0} orders/s)"
    ));
    Ok(ExitKind::Success)
}

/// Environment variables ferry reads, with secrets elided.
pub fn run_env(lifecycle: &LifecycleManager) {
    const VARS: &[(&str, bool)] = &[
        ("FERRY_LOG_LOCATION", false),
        ("FERRY_JOB_PLAN_LOCATION", false),
        ("FERRY_CONCURRENCY_VALUE", false),
        ("FERRY_BUFFER_GB", false),
        ("CPK_ENCRYPTION_KEY", true),
        ("CPK_ENCRYPTION_KEY_SHA256", true),
        ("GOOGLE_CLOUD_PROJECT", false),
    ];
    for (name, secret) in VARS {
        let value = match std::env::var(name) {
            Ok(_) if *secret => "(set, hidden)".to_string(),
            Ok(value) => value,
            Err(_) => "(unset)".to_string(),
        };
        lifecycle.essential(&format!("{name}={value}"));
    }
}
