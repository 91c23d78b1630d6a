//! Quicksave Engine - Autosave Runtime
//!
//! The runtime behind the autosave surface: the checkpoint writer
//! (validate, hash, deduplicate, encode, persist), the retention manager
//! (keep-set pruning and the expiry sweep), the recovery selector, the
//! concurrent-editing detector, and the merge engine, plus the blob codec,
//! the clock seam, and runtime configuration.
//!
//! Host applications construct one [`AutosaveEngine`] with their storage
//! backends and call it from whatever transport they expose. Every
//! component takes its collaborators at construction; nothing here reads
//! ambient time or global state.

pub mod checkpoint;
pub mod clock;
pub mod codec;
pub mod config;
pub mod conflict;
pub mod merge;
pub mod recovery;
pub mod retention;

pub use checkpoint::{crossed_milestone, CheckpointReceipt, CheckpointWriter};
pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::BlobCodec;
pub use config::{AutosaveConfig, AutosavePolicy};
pub use conflict::{ConflictDescriptor, ConflictDetector};
pub use merge::{conflicted_fields, merge_states, MergeEngine, MergeOutcome, NOTES_MERGE_MARKER};
pub use recovery::{RecoveredCheckpoint, RecoverySelector};
pub use retention::RetentionManager;

use quicksave_core::{
    AutosaveResult, AutosaveStats, CheckpointId, CheckpointSummary, MergeStrategy, ReportId,
    ReportState, SaveContext, UserId,
};
use quicksave_storage::{AuditSink, CheckpointStore, ReportDirectory};
use std::sync::Arc;

/// The composed autosave runtime.
///
/// One instance serves many concurrent callers; all state lives behind the
/// storage traits. Construction validates the configuration and wires the
/// components to shared collaborators.
pub struct AutosaveEngine {
    writer: CheckpointWriter,
    retention: Arc<RetentionManager>,
    recovery: RecoverySelector,
    detector: ConflictDetector,
    merger: MergeEngine,
    clock: Arc<dyn Clock>,
    policy: AutosavePolicy,
}

impl AutosaveEngine {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        reports: Arc<dyn ReportDirectory>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: AutosaveConfig,
    ) -> AutosaveResult<Self> {
        config.validate()?;

        let retention = Arc::new(RetentionManager::new(
            store.clone(),
            config.max_checkpoints,
        ));
        let writer = CheckpointWriter::new(
            store.clone(),
            reports.clone(),
            audit.clone(),
            retention.clone(),
            clock.clone(),
            config.clone(),
        );
        let recovery = RecoverySelector::new(store.clone(), audit.clone(), clock.clone(), config.codec);
        let detector = ConflictDetector::new(store, reports, clock.clone(), config.conflict_window);
        let merger = MergeEngine::new(audit, clock.clone());
        let policy = AutosavePolicy::from_config(&config);

        Ok(Self {
            writer,
            retention,
            recovery,
            detector,
            merger,
            clock,
            policy,
        })
    }

    /// Construct with the real wall clock.
    pub fn with_system_clock(
        store: Arc<dyn CheckpointStore>,
        reports: Arc<dyn ReportDirectory>,
        audit: Arc<dyn AuditSink>,
        config: AutosaveConfig,
    ) -> AutosaveResult<Self> {
        Self::new(store, reports, audit, Arc::new(SystemClock), config)
    }

    /// Store a checkpoint, or return the existing one when nothing changed.
    pub fn create_checkpoint(
        &self,
        report_id: ReportId,
        user_id: UserId,
        state: serde_json::Value,
        context: SaveContext,
    ) -> AutosaveResult<CheckpointReceipt> {
        self.writer
            .create_checkpoint(report_id, user_id, state, context)
    }

    /// Recover a checkpoint into an editing session. Without an explicit
    /// `checkpoint_id` the selector picks deterministically; see
    /// [`RecoverySelector::recover`].
    pub fn recover(
        &self,
        report_id: ReportId,
        user_id: UserId,
        checkpoint_id: Option<CheckpointId>,
        device_id: Option<&str>,
    ) -> AutosaveResult<RecoveredCheckpoint> {
        self.recovery
            .recover(report_id, user_id, checkpoint_id, device_id)
    }

    /// Checkpoint metadata for the report, newest first.
    pub fn list_checkpoints(
        &self,
        report_id: ReportId,
        limit: usize,
    ) -> AutosaveResult<Vec<CheckpointSummary>> {
        self.writer.list_checkpoints(report_id, limit)
    }

    /// Has another editing context written recently? Advisory; `Ok(None)`
    /// means no.
    pub fn detect_conflicts(
        &self,
        report_id: ReportId,
        device_id: Option<&str>,
        session_id: Option<&str>,
    ) -> AutosaveResult<Option<ConflictDescriptor>> {
        self.detector
            .detect_conflicts(report_id, device_id, session_id)
    }

    /// Reconcile two divergent states under the given strategy.
    pub fn resolve(
        &self,
        report_id: ReportId,
        local: &ReportState,
        remote: &ReportState,
        strategy: MergeStrategy,
    ) -> AutosaveResult<MergeOutcome> {
        self.merger.resolve(report_id, local, remote, strategy)
    }

    /// Scheduler entry point: delete checkpoints past their expiry horizon,
    /// sparing each report's most recent one.
    pub fn sweep_expired(&self) -> AutosaveResult<usize> {
        self.retention.sweep_expired(self.clock.now())
    }

    /// Per-report autosave summary.
    pub fn stats(&self, report_id: ReportId) -> AutosaveResult<AutosaveStats> {
        self.writer.stats(report_id)
    }

    /// The cadence settings clients should honor, for bootstrap payloads.
    pub fn policy(&self) -> AutosavePolicy {
        self.policy
    }
}

// =============================================================================
// TESTS
// =============================================================================
