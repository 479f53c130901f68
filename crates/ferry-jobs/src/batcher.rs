//! The transfer processor: batches orders into numbered job parts.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use ferry_core::{
    DispatchPart, FerryError, JobPart, ObjectProcessor, PartNum, PreserveFlags, StoredObject,
    TransferAction, TransferOrder,
};

/// Default order capacity of one part.
pub const DEFAULT_TRANSFERS_PER_PART: usize = 10_000;

/// Everything a job stamps onto each of its parts: identity, endpoints,
/// credential reference, and per-job flags. The batcher combines this with
/// the buffered orders to mint parts.
#[derive(Debug, Clone)]
pub struct JobHeader {
    pub job_id: ferry_core::JobId,
    pub from_to: ferry_core::FromTo,
    pub command: String,
    pub created: chrono::DateTime<chrono::Utc>,
    pub source_root: String,
    pub dest_root: String,
    pub source_sas: Option<ferry_core::SasToken>,
    pub dest_sas: Option<ferry_core::SasToken>,
    pub credential: ferry_core::CredentialKind,
    pub flags: ferry_core::JobPartFlags,
}

impl JobHeader {
    fn part(&self, part_num: PartNum, orders: Vec<TransferOrder>, is_final: bool) -> JobPart {
        JobPart {
            job_id: self.job_id,
            part_num,
            from_to: self.from_to,
            command: self.command.clone(),
            created: self.created,
            source_root: self.source_root.clone(),
            dest_root: self.dest_root.clone(),
            source_sas: self.source_sas.clone(),
            dest_sas: self.dest_sas.clone(),
            credential: self.credential,
            flags: self.flags.clone(),
            is_final,
            orders,
        }
    }

    /// Per-order preservation flags implied by the job flags.
    pub fn preserve_flags(&self) -> PreserveFlags {
        PreserveFlags {
            info: self.flags.preserve_info,
            permissions: self.flags.preserve_permissions.is_enabled(),
            posix: self.flags.preserve_posix,
        }
    }
}

/// Accumulates transfer orders and dispatches a part whenever the buffer
/// fills. Part numbers are dense, start at 0, and are handed to the
/// dispatcher strictly in order. After a dispatch error the batcher stops
/// accepting orders; after `dispatch_final_part` it only ever errors.
pub struct PartBatcher {
    header: JobHeader,
    per_part: usize,
    next_part: PartNum,
    buffer: Vec<TransferOrder>,
    dispatch: Box<dyn DispatchPart>,
    finalized: bool,
    wedged: bool,
    any_scheduled: bool,
}

impl PartBatcher {
    pub fn new(header: JobHeader, per_part: usize, dispatch: Box<dyn DispatchPart>) -> Self {
        Self {
            header,
            per_part: per_part.max(1),
            next_part: 0,
            buffer: Vec::new(),
            dispatch,
            finalized: false,
            wedged: false,
            any_scheduled: false,
        }
    }

    pub fn header(&self) -> &JobHeader {
        &self.header
    }

    /// Parts handed to the dispatcher so far.
    pub fn parts_dispatched(&self) -> PartNum {
        self.next_part
    }

    pub async fn schedule(&mut self, order: TransferOrder) -> Result<(), FerryError> {
        if self.finalized {
            return Err(FerryError::PartsAlreadyFinalized);
        }
        if self.wedged {
            return Err(FerryError::PlanPersistFailed(
                "a previous part failed to dispatch".to_string(),
            ));
        }
        self.buffer.push(order);
        self.any_scheduled = true;
        if self.buffer.len() >= self.per_part {
            self.flush(false).await?;
        }
        Ok(())
    }

    async fn flush(&mut self, is_final: bool) -> Result<(), FerryError> {
        let orders = std::mem::take(&mut self.buffer);
        let part = self.header.part(self.next_part, orders, is_final);
        debug!(
            job = %part.job_id,
            part = part.part_num,
            orders = part.orders.len(),
            is_final,
            "dispatching job part"
        );
        match self.dispatch.dispatch(part).await {
            Ok(()) => {
                self.next_part += 1;
                Ok(())
            }
            Err(err) => {
                self.wedged = true;
                Err(err)
            }
        }
    }

    /// Stamp and dispatch the buffered orders (possibly none) as the final
    /// part. Returns whether any transfer was scheduled over the whole job.
    /// Callable exactly once.
    pub async fn dispatch_final_part(&mut self) -> Result<bool, FerryError> {
        if self.finalized {
            return Err(FerryError::PartsAlreadyFinalized);
        }
        if self.wedged {
            return Err(FerryError::PlanPersistFailed(
                "a previous part failed to dispatch".to_string(),
            ));
        }
        self.finalized = true;
        self.flush(true).await?;
        info!(
            job = %self.header.job_id,
            parts = self.next_part,
            "enumeration complete, final part dispatched"
        );
        Ok(self.any_scheduled)
    }
}

/// A batcher that can be handed to more than one sequential pipeline stage
/// (the sync comparator's copy sink and its delete sink).
#[derive(Clone)]
pub struct SharedBatcher(Arc<Mutex<PartBatcher>>);

impl SharedBatcher {
    pub fn new(batcher: PartBatcher) -> Self {
        Self(Arc::new(Mutex::new(batcher)))
    }

    /// A processor that turns accepted objects into orders with the given
    /// action and schedules them here.
    pub fn processor(&self, action: TransferAction, preserve: PreserveFlags) -> ScheduleProcessor {
        ScheduleProcessor {
            batcher: self.clone(),
            action,
            preserve,
        }
    }

    pub async fn dispatch_final_part(&self) -> Result<bool, FerryError> {
        self.0.lock().await.dispatch_final_part().await
    }

    pub async fn parts_dispatched(&self) -> PartNum {
        self.0.lock().await.parts_dispatched()
    }

    /// Drop the buffered orders without dispatching them. Used on
    /// cancellation when no part has been dispatched yet.
    pub async fn discard_buffered(&self) {
        let mut batcher = self.0.lock().await;
        let dropped = batcher.buffer.len();
        if dropped > 0 {
            debug!(dropped, "discarding buffered orders on cancellation");
        }
        batcher.buffer.clear();
        batcher.finalized = true;
    }
}

/// [`ObjectProcessor`] adapter: object in, scheduled order out.
pub struct ScheduleProcessor {
    batcher: SharedBatcher,
    action: TransferAction,
    preserve: PreserveFlags,
}

#[async_trait]
impl ObjectProcessor for ScheduleProcessor {
    async fn process(&mut self, object: StoredObject) -> Result<(), FerryError> {
        let order = TransferOrder::from_object(self.action, &object).with_preserve(self.preserve);
        self.batcher.0.lock().await.schedule(order).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ferry_core::{
        CredentialKind, FromTo, JobId, JobPartFlags, RelativePath,
    };
    use std::sync::Mutex as StdMutex;

    fn header() -> JobHeader {
        JobHeader {
            job_id: JobId::new(),
            from_to: FromTo::LocalBlob,
            command: "copy /src https://acct.blob.core.windows.net/c".into(),
            created: Utc::now(),
            source_root: "/src".into(),
            dest_root: "https://acct.blob.core.windows.net/c".into(),
            source_sas: None,
            dest_sas: None,
            credential: CredentialKind::Sas,
            flags: JobPartFlags::default(),
        }
    }

    fn order(path: &str) -> TransferOrder {
        let obj = StoredObject::file(RelativePath::parse(path).unwrap(), 1, None);
        TransferOrder::from_object(TransferAction::Copy, &obj)
    }

    /// Records every dispatched part; optionally fails on a given part
    /// number.
    #[derive(Clone, Default)]
    struct RecordingDispatch {
        parts: Arc<StdMutex<Vec<JobPart>>>,
        fail_on: Option<PartNum>,
    }

    #[async_trait]
    impl DispatchPart for RecordingDispatch {
        async fn dispatch(&mut self, part: JobPart) -> Result<(), FerryError> {
            if self.fail_on == Some(part.part_num) {
                return Err(FerryError::PlanPersistFailed("disk full".into()));
            }
            self.parts.lock().unwrap().push(part);
            Ok(())
        }
    }

    #[tokio::test]
    async fn parts_are_dense_and_ascending() {
        let sink = RecordingDispatch::default();
        let mut batcher = PartBatcher::new(header(), 2, Box::new(sink.clone()));
        for i in 0..5 {
            batcher.schedule(order(&format!("f{i}"))).await.unwrap();
        }
        let initiated = batcher.dispatch_final_part().await.unwrap();
        assert!(initiated);

        let parts = sink.parts.lock().unwrap();
        let nums: Vec<PartNum> = parts.iter().map(|p| p.part_num).collect();
        assert_eq!(nums, vec![0, 1, 2]);
        assert_eq!(parts[0].orders.len(), 2);
        assert_eq!(parts[2].orders.len(), 1);
        assert!(parts[2].is_final);
        assert!(!parts[0].is_final);
    }

    #[tokio::test]
    async fn empty_job_dispatches_one_final_empty_part() {
        let sink = RecordingDispatch::default();
        let mut batcher = PartBatcher::new(header(), 100, Box::new(sink.clone()));
        let initiated = batcher.dispatch_final_part().await.unwrap();
        assert!(!initiated);
        let parts = sink.parts.lock().unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].is_final);
        assert!(parts[0].orders.is_empty());
    }

    #[tokio::test]
    async fn finalize_twice_is_an_error() {
        let sink = RecordingDispatch::default();
        let mut batcher = PartBatcher::new(header(), 100, Box::new(sink));
        batcher.dispatch_final_part().await.unwrap();
        let err = batcher.dispatch_final_part().await.unwrap_err();
        assert!(matches!(err, FerryError::PartsAlreadyFinalized));
        let err = batcher.schedule(order("late")).await.unwrap_err();
        assert!(matches!(err, FerryError::PartsAlreadyFinalized));
    }

    #[tokio::test]
    async fn dispatch_error_wedges_the_batcher() {
        let sink = RecordingDispatch {
            fail_on: Some(1),
            ..Default::default()
        };
        let mut batcher = PartBatcher::new(header(), 1, Box::new(sink.clone()));
        batcher.schedule(order("a")).await.unwrap();
        let err = batcher.schedule(order("b")).await.unwrap_err();
        assert!(matches!(err, FerryError::PlanPersistFailed(_)));
        // Part 0 stays with the execution layer; nothing further is accepted.
        assert_eq!(sink.parts.lock().unwrap().len(), 1);
        let err = batcher.schedule(order("c")).await.unwrap_err();
        assert!(matches!(err, FerryError::PlanPersistFailed(_)));
    }

    #[tokio::test]
    async fn shared_batcher_feeds_from_processors() {
        let sink = RecordingDispatch::default();
        let shared = SharedBatcher::new(PartBatcher::new(header(), 100, Box::new(sink.clone())));
        let mut copies = shared.processor(TransferAction::Copy, PreserveFlags::default());
        let mut removes = shared.processor(TransferAction::Remove, PreserveFlags::default());

        copies
            .process(StoredObject::file(RelativePath::parse("a").unwrap(), 1, None))
            .await
            .unwrap();
        removes
            .process(StoredObject::file(RelativePath::parse("b").unwrap(), 1, None))
            .await
            .unwrap();
        assert!(shared.dispatch_final_part().await.unwrap());

        let parts = sink.parts.lock().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].orders[0].action, TransferAction::Copy);
        assert_eq!(parts[0].orders[1].action, TransferAction::Remove);
    }

    #[tokio::test]
    async fn discard_buffered_drops_orders_without_dispatch() {
        let sink = RecordingDispatch::default();
        let shared = SharedBatcher::new(PartBatcher::new(header(), 100, Box::new(sink.clone())));
        let mut copies = shared.processor(TransferAction::Copy, PreserveFlags::default());
        copies
            .process(StoredObject::file(RelativePath::parse("a").unwrap(), 1, None))
            .await
            .unwrap();
        shared.discard_buffered().await;
        assert!(sink.parts.lock().unwrap().is_empty());
    }
}
