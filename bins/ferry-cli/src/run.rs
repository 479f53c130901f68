//! Pipeline wiring for the transfer verbs.
//!
//! One job is a set of tasks joined by the shared cancellation token: a
//! traverser feeding the filter chain, optionally the sync comparator in the
//! middle, and the part batcher dispatching into the plan store (or the
//! dry-run printer). The byte-moving execution layer consumes the persisted
//! plan from there.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::ObjectStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ferry_core::{
    concurrency::ConcurrencySettings, ChannelProcessor, CompareHash, CredentialKind,
    DispatchPart, ExitKind, FerryError, JobId, JobPart, JobPartFlags, JobStatus,
    LifecycleManager, Location, LocationKind, ObjectProcessor, Side, TransferAction,
};
use ferry_io::{
    AccountTraverser, BlobFsTraverser, BlobTraverser, FileShareTraverser, GcpTraverser,
    ListFileTraverser, LocalTraverser, ObjectStoreLister, PipeTraverser, S3Traverser, Traverser,
    VersionListTraverser,
};
use ferry_jobs::{
    JobHeader, JobTracker, PartBatcher, PlanDispatcher, PlanStore, SharedBatcher,
    DEFAULT_TRANSFERS_PER_PART,
};
use ferry_tx::{IndexBuilder, LocalMd5Hasher, SourceHasher, SyncComparator, SyncOptions};

use crate::cook::Cooked;

/// Shared collaborators for one invocation.
pub struct JobContext {
    pub lifecycle: Arc<LifecycleManager>,
    pub store: Arc<dyn PlanStore>,
    pub cancel: CancellationToken,
}

/// Sync knobs that live outside the job-part flags.
pub struct SyncConfig {
    pub compare_hash: CompareHash,
    pub mirror_mode: bool,
}

/// Prints the orders a part carries instead of persisting it.
pub struct DryRunDispatcher {
    lifecycle: Arc<LifecycleManager>,
}

impl DryRunDispatcher {
    pub fn new(lifecycle: Arc<LifecycleManager>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl DispatchPart for DryRunDispatcher {
    async fn dispatch(&mut self, part: JobPart) -> Result<(), FerryError> {
        for order in &part.orders {
            let source = part.source_display(order);
            match order.action {
                TransferAction::Copy => {
                    let dest = part.dest_display(order);
                    self.lifecycle.item(
                        &format!("DRYRUN: copy {source} -> {dest}"),
                        &serde_json::json!({
                            "DryRun": {
                                "Action": "copy",
                                "Source": source,
                                "Destination": dest,
                                "EntityType": order.entity.to_string(),
                                "Size": order.size,
                            }
                        }),
                    );
                }
                TransferAction::Remove => {
                    self.lifecycle.item(
                        &format!("DRYRUN: remove {source}"),
                        &serde_json::json!({
                            "DryRun": {
                                "Action": "remove",
                                "Source": source,
                                "VersionId": order.version_id,
                            }
                        }),
                    );
                }
            }
        }
        Ok(())
    }
}

/// Build the page-listing transport for a remote endpoint. Tests and bench
/// substitute an in-memory lister; this is the production seam.
fn make_lister(location: &Location) -> Result<Arc<dyn ferry_core::RemoteLister>, FerryError> {
    let (container, _) = location.split_container();
    let store: Arc<dyn ObjectStore> = match location.kind() {
        LocationKind::Blob | LocationKind::BlobFs => Arc::new(
            MicrosoftAzureBuilder::from_env()
                .with_url(location.path())
                .build()
                .map_err(|e| FerryError::AuthenticationFailed(e.to_string()))?,
        ),
        LocationKind::S3 => Arc::new(
            AmazonS3Builder::from_env()
                .with_url(location.path())
                .build()
                .map_err(|e| FerryError::AuthenticationFailed(e.to_string()))?,
        ),
        LocationKind::Gcp => Arc::new(
            GoogleCloudStorageBuilder::from_env()
                .with_url(location.path())
                .build()
                .map_err(|e| FerryError::AuthenticationFailed(e.to_string()))?,
        ),
        LocationKind::File => {
            return Err(FerryError::UnsupportedEndpoint(
                "file-share listing needs an SMB-capable transport, which this build does not carry"
                    .to_string(),
            ))
        }
        other => {
            return Err(FerryError::UnsupportedEndpoint(format!(
                "no listing transport for {other} endpoints"
            )))
        }
    };
    Ok(Arc::new(ObjectStoreLister::new(store, container)))
}

/// Inputs for traverser construction.
pub struct TraverserSpec<'a> {
    pub location: &'a Location,
    pub side: Side,
    pub recursive: bool,
    pub flags: &'a JobPartFlags,
    /// Shell glob on container names, for account-root enumerations.
    pub container_pattern: Option<String>,
    /// Relative paths from `--list-of-files`.
    pub list_entries: Option<Vec<String>>,
    /// Version ids from `--list-of-versions`.
    pub version_entries: Option<Vec<String>>,
}

pub fn build_traverser(spec: TraverserSpec<'_>) -> Result<Traverser, FerryError> {
    let location = spec.location;
    let include_folders =
        spec.flags.include_directory_stubs || spec.flags.preserve_permissions.is_enabled();
    match location.kind() {
        LocationKind::Local => {
            if let Some(entries) = spec.list_entries {
                return Ok(Traverser::ListFile(ListFileTraverser::local(
                    location.path(),
                    entries,
                    spec.side,
                )));
            }
            Ok(Traverser::Local(
                LocalTraverser::new(location.path(), spec.side, spec.recursive)
                    .with_symlinks(spec.flags.symlinks)
                    .with_hardlinks(spec.flags.hardlinks)
                    .with_folders(include_folders),
            ))
        }
        LocationKind::Pipe => Ok(Traverser::Pipe(PipeTraverser::new(location.path()))),
        LocationKind::Unknown => Err(FerryError::UnsupportedEndpoint(format!(
            "cannot traverse '{location}'"
        ))),
        _ => {
            let lister = make_lister(location)?;
            let (container, prefix) = location.split_container();
            if let Some(versions) = spec.version_entries {
                return Ok(Traverser::Versions(VersionListTraverser::new(
                    lister, container, prefix, versions, spec.side,
                )));
            }
            if let Some(entries) = spec.list_entries {
                return Ok(Traverser::ListFile(ListFileTraverser::remote(
                    lister, container, prefix, entries, spec.side,
                )));
            }
            if container.is_empty() {
                let blob_semantics = matches!(
                    location.kind(),
                    LocationKind::Blob | LocationKind::BlobFs
                );
                return Ok(Traverser::Account(
                    AccountTraverser::new(
                        lister,
                        spec.side,
                        spec.container_pattern.as_deref(),
                        spec.recursive,
                    )?
                    .with_directory_stubs(spec.flags.include_directory_stubs)
                    .with_blob_semantics(blob_semantics),
                ));
            }
            Ok(match location.kind() {
                LocationKind::Blob => Traverser::Blob(BlobTraverser::new(
                    lister,
                    spec.side,
                    container,
                    prefix,
                    spec.recursive,
                    spec.flags.include_directory_stubs,
                )),
                LocationKind::BlobFs => Traverser::BlobFs(BlobFsTraverser::new(
                    lister,
                    spec.side,
                    container,
                    prefix,
                    spec.recursive,
                    include_folders,
                )),
                LocationKind::File => Traverser::Files(FileShareTraverser::new(
                    lister,
                    spec.side,
                    container,
                    prefix,
                    spec.recursive,
                    include_folders,
                    spec.flags.trailing_dot,
                )),
                LocationKind::S3 => Traverser::S3(S3Traverser::new(
                    lister,
                    spec.side,
                    container,
                    prefix,
                    spec.recursive,
                )),
                LocationKind::Gcp => Traverser::Gcp(GcpTraverser::new(
                    lister,
                    spec.side,
                    container,
                    prefix,
                    spec.recursive,
                )),
                _ => unreachable!("remote kinds handled above"),
            })
        }
    }
}

pub fn job_header(cooked: &Cooked, command: String) -> JobHeader {
    let dest = cooked.dest.as_ref();
    let credential = if cooked.source.sas().is_some() || dest.and_then(|d| d.sas()).is_some() {
        CredentialKind::Sas
    } else {
        CredentialKind::Anonymous
    };
    JobHeader {
        job_id: JobId::new(),
        from_to: cooked.from_to,
        command,
        created: Utc::now(),
        source_root: cooked.source.path().to_string(),
        dest_root: dest.map(|d| d.path().to_string()).unwrap_or_default(),
        source_sas: cooked.source.sas().cloned(),
        dest_sas: dest.and_then(|d| d.sas().cloned()),
        credential,
        flags: cooked.flags.clone(),
    }
}

fn make_batcher(
    header: JobHeader,
    cooked: &Cooked,
    ctx: &JobContext,
    tracker: &Arc<JobTracker>,
) -> Result<SharedBatcher, FerryError> {
    let job_id = header.job_id;
    let dispatch: Box<dyn DispatchPart> = if cooked.dry_run {
        Box::new(DryRunDispatcher::new(ctx.lifecycle.clone()))
    } else {
        ctx.store.record_status(job_id, JobStatus::InProgress)?;
        Box::new(PlanDispatcher::new(ctx.store.clone(), tracker.clone()))
    };
    Ok(SharedBatcher::new(PartBatcher::new(
        header,
        DEFAULT_TRANSFERS_PER_PART,
        dispatch,
    )))
}

/// On cancellation: dispatch the buffered orders as the final part only if
/// at least one part already went out; otherwise drop them.
async fn settle_cancelled(
    batcher: &SharedBatcher,
    tracker: &JobTracker,
    cooked: &Cooked,
    ctx: &JobContext,
    job_id: JobId,
) -> Result<ExitKind, FerryError> {
    if batcher.parts_dispatched().await > 0 {
        if let Err(err) = batcher.dispatch_final_part().await {
            warn!(error = %err, "final part not dispatched during cancellation");
        }
    } else {
        batcher.discard_buffered().await;
    }
    tracker.cancel();
    if !cooked.dry_run {
        ctx.store.record_status(job_id, JobStatus::Cancelled)?;
    }
    ctx.lifecycle
        .essential(&format!("Job {job_id} cancelled."));
    Ok(ExitKind::Cancelled)
}

/// Copy and remove share one shape: traverse, filter, batch.
pub async fn run_copy_or_remove(
    cooked: Cooked,
    action: TransferAction,
    list_entries: Option<Vec<String>>,
    version_entries: Option<Vec<String>>,
    ctx: &JobContext,
    command: String,
) -> Result<ExitKind, FerryError> {
    let header = job_header(&cooked, command);
    let job_id = header.job_id;
    let preserve = header.preserve_flags();
    let tracker = Arc::new(JobTracker::new());
    tracker.start()?;
    let batcher = make_batcher(header, &cooked, ctx, &tracker)?;

    let container_pattern = if cooked.source.is_account_root() {
        cooked.wildcard.pattern.clone()
    } else {
        None
    };
    let traverser = build_traverser(TraverserSpec {
        location: &cooked.source,
        side: Side::Source,
        recursive: cooked.flags.recursive,
        flags: &cooked.flags,
        container_pattern,
        list_entries,
        version_entries,
    })?;

    ctx.lifecycle.info(&format!("Job {job_id} has started"));
    let filters = cooked.filters.scoped(Side::Source);
    let mut processor = batcher.processor(action, preserve);
    match traverser
        .traverse(&mut processor, &filters, &ctx.cancel)
        .await
    {
        Ok(summary) => {
            let initiated = batcher.dispatch_final_part().await?;
            let parts = batcher.parts_dispatched().await;
            info!(
                job = %job_id,
                seen = summary.seen,
                emitted = summary.emitted,
                skipped = summary.skipped_properties,
                "enumeration finished"
            );
            if !initiated {
                ctx.lifecycle
                    .essential(&format!("Job {job_id}: no transfers were scheduled."));
                return Ok(ExitKind::NoTransfers);
            }
            ctx.lifecycle.essential(&format!(
                "Job {job_id} planned {} transfer(s) in {parts} part(s).",
                summary.emitted
            ));
            Ok(ExitKind::Success)
        }
        Err(err) if err.is_cancellation() => {
            settle_cancelled(&batcher, &tracker, &cooked, ctx, job_id).await
        }
        Err(err) => {
            tracker.fail(&err.to_string());
            if !cooked.dry_run {
                let _ = ctx.store.record_status(job_id, JobStatus::Failed);
            }
            ctx.lifecycle.error_line(&format!(
                "Job {job_id} failed; log: {}",
                ctx.store.log_path(job_id).display()
            ));
            Err(err)
        }
    }
}

pub async fn run_sync(
    cooked: Cooked,
    sync: SyncConfig,
    ctx: &JobContext,
    command: String,
) -> Result<ExitKind, FerryError> {
    let dest = cooked
        .dest
        .clone()
        .ok_or_else(|| FerryError::InvalidArgument("sync needs a destination".to_string()))?;
    let header = job_header(&cooked, command);
    let job_id = header.job_id;
    let preserve = header.preserve_flags();
    let tracker = Arc::new(JobTracker::new());
    tracker.start()?;
    let batcher = make_batcher(header, &cooked, ctx, &tracker)?;

    // Index phase: the destination enumeration runs to completion first. A
    // partial index would make deletion decisions unsafe, so any failure
    // here aborts the sync before a single order is emitted. The traverser
    // and the index builder run as separate tasks over a bounded channel so
    // the builder can keep up with a paginating backend.
    let dest_traverser = build_traverser(TraverserSpec {
        location: &dest,
        side: Side::Destination,
        recursive: cooked.flags.recursive,
        flags: &cooked.flags,
        container_pattern: None,
        list_entries: None,
        version_entries: None,
    })?;
    // The soft handle budget would come from a platform probe; the fixed
    // default matches common ulimits.
    let settings = ConcurrencySettings::detect(4096);
    let capacity = settings.connections.max(16);
    ctx.lifecycle.info("Indexing the destination...");
    let (tx, mut rx) = tokio::sync::mpsc::channel(capacity);
    let fold_case = dest.kind().case_insensitive();
    let index_task = tokio::spawn(async move {
        let mut builder = IndexBuilder::new(fold_case);
        while let Some(object) = rx.recv().await {
            builder.process(object).await?;
        }
        Ok::<_, FerryError>(builder.into_index())
    });
    let mut feeder = ChannelProcessor::new(tx);
    let walk = dest_traverser
        .traverse(&mut feeder, &cooked.filters.scoped(Side::Destination), &ctx.cancel)
        .await;
    drop(feeder);
    let index = match walk {
        Ok(_) => match index_task.await {
            Ok(Ok(index)) => index,
            Ok(Err(err)) => return Err(FerryError::SyncIndexBuildFailed(err.to_string())),
            Err(err) => return Err(FerryError::SyncIndexBuildFailed(err.to_string())),
        },
        Err(err) if err.is_cancellation() => {
            index_task.abort();
            return settle_cancelled(&batcher, &tracker, &cooked, ctx, job_id).await;
        }
        Err(err) => {
            index_task.abort();
            tracker.fail(&err.to_string());
            if !cooked.dry_run {
                let _ = ctx.store.record_status(job_id, JobStatus::Failed);
            }
            return Err(FerryError::SyncIndexBuildFailed(err.to_string()));
        }
    };
    info!(entries = index.len(), "destination indexed");

    let hasher: Option<Arc<dyn SourceHasher>> =
        if sync.compare_hash == CompareHash::Md5 && cooked.source.kind() == LocationKind::Local {
            Some(Arc::new(LocalMd5Hasher::new(cooked.source.path())))
        } else {
            None
        };
    let opts = SyncOptions {
        delete_destination: cooked.flags.delete_destination,
        compare_hash: sync.compare_hash,
        mirror_mode: sync.mirror_mode,
        hasher,
    };
    let mut comparator = SyncComparator::new(
        index,
        opts,
        Box::new(batcher.processor(TransferAction::Copy, preserve)),
    );

    // Compare phase.
    let source_traverser = build_traverser(TraverserSpec {
        location: &cooked.source,
        side: Side::Source,
        recursive: cooked.flags.recursive,
        flags: &cooked.flags,
        container_pattern: None,
        list_entries: None,
        version_entries: None,
    })?;
    match source_traverser
        .traverse(&mut comparator, &cooked.filters.scoped(Side::Source), &ctx.cancel)
        .await
    {
        Ok(_) => {}
        Err(err) if err.is_cancellation() => {
            return settle_cancelled(&batcher, &tracker, &cooked, ctx, job_id).await;
        }
        Err(err) => {
            tracker.fail(&err.to_string());
            if !cooked.dry_run {
                let _ = ctx.store.record_status(job_id, JobStatus::Failed);
            }
            return Err(err);
        }
    }

    // Reconcile phase: deletes come strictly after every copy.
    let mut deletes = batcher.processor(TransferAction::Remove, preserve);
    let stats = comparator.reconcile(&mut deletes, &ctx.lifecycle).await?;
    let initiated = batcher.dispatch_final_part().await?;
    ctx.lifecycle.essential(&format!(
        "Sync {job_id}: {} to copy, {} to delete, {} up to date, {} extra(s) kept.",
        stats.copies, stats.deletes, stats.no_ops, stats.extras_kept
    ));
    if !initiated {
        return Ok(ExitKind::NoTransfers);
    }
    Ok(ExitKind::Success)
}
