//! Whole-pipeline sync scenarios: real traversers on both sides, the
//! comparator in the middle, the part batcher at the end.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use ferry_core::{
    lifecycle::PromptReply, CredentialKind, DeleteDestination, DispatchPart, FerryError,
    FilterChain, FromTo, JobId, JobPart, JobPartFlags, LifecycleManager, PreserveFlags,
    RemoteObject, Side, TransferAction,
};
use ferry_io::{BlobTraverser, LocalTraverser, MemoryLister};
use ferry_jobs::{JobHeader, PartBatcher, SharedBatcher};
use ferry_tx::{IndexBuilder, PatternFilter, SyncComparator, SyncOptions};

#[derive(Clone, Default)]
struct RecordingDispatch {
    parts: Arc<Mutex<Vec<JobPart>>>,
}

impl RecordingDispatch {
    fn orders(&self) -> Vec<(TransferAction, String)> {
        self.parts
            .lock()
            .unwrap()
            .iter()
            .flat_map(|p| p.orders.iter())
            .map(|o| (o.action, o.source_rel.to_string()))
            .collect()
    }
}

#[async_trait]
impl DispatchPart for RecordingDispatch {
    async fn dispatch(&mut self, part: JobPart) -> Result<(), FerryError> {
        self.parts.lock().unwrap().push(part);
        Ok(())
    }
}

fn header() -> JobHeader {
    JobHeader {
        job_id: JobId::new(),
        from_to: FromTo::LocalBlob,
        command: "sync".into(),
        created: Utc::now(),
        source_root: "/src".into(),
        dest_root: "https://acct.blob.core.windows.net/c".into(),
        source_sas: None,
        dest_sas: None,
        credential: CredentialKind::Anonymous,
        flags: JobPartFlags::default(),
    }
}

/// Local source {a, b, c}; blob destination {a, c, extra1.pdf, extra2.txt},
/// all destination LMTs later than the source's. Expect one copy for `b`
/// and deletes for the two extras, deletes after copies.
#[tokio::test]
async fn sync_emits_copies_then_deletes() {
    let src_dir = tempfile::tempdir().unwrap();
    for name in ["a", "b", "c"] {
        std::fs::write(src_dir.path().join(name), b"data").unwrap();
    }

    let later = Utc::now() + Duration::hours(1);
    let mut dest = MemoryLister::new();
    for name in ["a", "c", "extra1.pdf", "extra2.txt"] {
        dest.insert("c", RemoteObject::new(name, 4).with_lmt(later));
    }

    let cancel = CancellationToken::new();
    let dest_traverser =
        BlobTraverser::new(Arc::new(dest), Side::Destination, "c", "", true, false);
    let mut index = IndexBuilder::new(false);
    dest_traverser
        .traverse(&mut index, &FilterChain::new(), &cancel)
        .await
        .unwrap();

    let sink = RecordingDispatch::default();
    let batcher = SharedBatcher::new(PartBatcher::new(header(), 100, Box::new(sink.clone())));
    let mut comparator = SyncComparator::new(
        index.into_index(),
        SyncOptions {
            delete_destination: DeleteDestination::True,
            ..Default::default()
        },
        Box::new(batcher.processor(TransferAction::Copy, PreserveFlags::default())),
    );

    let source_traverser = LocalTraverser::new(src_dir.path(), Side::Source, true);
    source_traverser
        .traverse(&mut comparator, &FilterChain::new(), &cancel)
        .await
        .unwrap();

    let mut deletes = batcher.processor(TransferAction::Remove, PreserveFlags::default());
    let lifecycle = LifecycleManager::silent(PromptReply::No);
    let stats = comparator.reconcile(&mut deletes, &lifecycle).await.unwrap();
    assert!(batcher.dispatch_final_part().await.unwrap());

    let orders = sink.orders();
    assert_eq!(
        orders,
        vec![
            (TransferAction::Copy, "b".to_string()),
            (TransferAction::Remove, "extra1.pdf".to_string()),
            (TransferAction::Remove, "extra2.txt".to_string()),
        ]
    );
    assert_eq!(stats.copies + stats.no_ops, stats.source_objects);
}

/// Running the same sync twice over stable trees schedules nothing the
/// second time.
#[tokio::test]
async fn stable_sync_schedules_nothing() {
    let stamp = Utc::now();
    let mut dest = MemoryLister::new();
    let mut source = MemoryLister::new();
    for name in ["one.txt", "two.txt"] {
        dest.insert("c", RemoteObject::new(name, 9).with_lmt(stamp));
        source.insert("s", RemoteObject::new(name, 9).with_lmt(stamp));
    }

    let cancel = CancellationToken::new();
    let mut index = IndexBuilder::new(false);
    BlobTraverser::new(Arc::new(dest), Side::Destination, "c", "", true, false)
        .traverse(&mut index, &FilterChain::new(), &cancel)
        .await
        .unwrap();

    let sink = RecordingDispatch::default();
    let batcher = SharedBatcher::new(PartBatcher::new(header(), 100, Box::new(sink.clone())));
    let mut comparator = SyncComparator::new(
        index.into_index(),
        SyncOptions {
            delete_destination: DeleteDestination::True,
            ..Default::default()
        },
        Box::new(batcher.processor(TransferAction::Copy, PreserveFlags::default())),
    );
    BlobTraverser::new(Arc::new(source), Side::Source, "s", "", true, false)
        .traverse(&mut comparator, &FilterChain::new(), &cancel)
        .await
        .unwrap();

    let mut deletes = batcher.processor(TransferAction::Remove, PreserveFlags::default());
    let lifecycle = LifecycleManager::silent(PromptReply::No);
    let stats = comparator.reconcile(&mut deletes, &lifecycle).await.unwrap();
    let initiated = batcher.dispatch_final_part().await.unwrap();

    assert!(!initiated);
    assert_eq!(stats.copies, 0);
    assert_eq!(stats.deletes, 0);
    assert!(sink.orders().is_empty());
}

/// Include/exclude patterns gate what the comparator ever sees.
#[tokio::test]
async fn filters_apply_before_comparison() {
    let src_dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(src_dir.path().join("includeSub")).unwrap();
    for name in ["important.pdf", "sorry.pdf", "exactName"] {
        std::fs::write(src_dir.path().join(name), b"x").unwrap();
    }
    std::fs::write(src_dir.path().join("includeSub/amazing.jpeg"), b"x").unwrap();
    std::fs::write(src_dir.path().join("includeSub/exactName"), b"x").unwrap();

    let filters = FilterChain::new()
        .with(Arc::new(
            PatternFilter::include("*.pdf;*.jpeg;exactName").unwrap(),
        ))
        .with(Arc::new(PatternFilter::exclude("so*;not*;exactName").unwrap()));

    let sink = RecordingDispatch::default();
    let batcher = SharedBatcher::new(PartBatcher::new(header(), 100, Box::new(sink.clone())));
    let mut comparator = SyncComparator::new(
        IndexBuilder::new(false).into_index(),
        SyncOptions::default(),
        Box::new(batcher.processor(TransferAction::Copy, PreserveFlags::default())),
    );

    LocalTraverser::new(src_dir.path(), Side::Source, true)
        .traverse(&mut comparator, &filters, &CancellationToken::new())
        .await
        .unwrap();
    let lifecycle = LifecycleManager::silent(PromptReply::No);
    let mut deletes = batcher.processor(TransferAction::Remove, PreserveFlags::default());
    comparator.reconcile(&mut deletes, &lifecycle).await.unwrap();
    batcher.dispatch_final_part().await.unwrap();

    let mut copied: Vec<String> = sink.orders().into_iter().map(|(_, p)| p).collect();
    copied.sort();
    let mut expected = vec![
        "important.pdf".to_string(),
        "includeSub/amazing.jpeg".to_string(),
    ];
    expected.sort();
    assert_eq!(copied, expected);
}
