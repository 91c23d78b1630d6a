//! Quicksave Storage - Storage Traits and In-Memory Backend
//!
//! Defines the storage abstraction the autosave engine writes through. The
//! engine only ever needs three narrow collaborators: a checkpoint store, a
//! read/pointer-write view of the report directory, and an append-only audit
//! sink. `MemoryStore` implements all three over in-process maps and doubles
//! as the reference for backend semantics (ordering, idempotent deletes,
//! point-write behavior).

pub mod memory;

pub use memory::MemoryStore;

use quicksave_core::{
    AuditEntry, AutosaveResult, Checkpoint, CheckpointId, ReportId, ReportRef, Timestamp, UserId,
};

// ============================================================================
// CHECKPOINT STORE
// ============================================================================

/// Durable persistence for checkpoints.
///
/// Implementations must be safe to call from many threads and processes at
/// once; every method is a single-row read or write with no cross-row
/// transaction. Calls must not block indefinitely: a networked backend
/// returns `StorageError::Timeout` once its configured bound elapses.
pub trait CheckpointStore: Send + Sync {
    /// Insert a new checkpoint. Fails if the id already exists.
    fn checkpoint_insert(&self, checkpoint: &Checkpoint) -> AutosaveResult<()>;

    /// Point read by id.
    fn checkpoint_get(&self, id: CheckpointId) -> AutosaveResult<Option<Checkpoint>>;

    /// The most recent checkpoint for a report, by `created_at` with the
    /// checkpoint id breaking ties (ids are timestamp-sortable).
    fn checkpoint_latest(&self, report_id: ReportId) -> AutosaveResult<Option<Checkpoint>>;

    /// All checkpoints for a report, newest first. Same ordering contract as
    /// `checkpoint_latest`.
    fn checkpoint_list_for_report(&self, report_id: ReportId) -> AutosaveResult<Vec<Checkpoint>>;

    /// Flip the `recovered_from` audit flag and stamp `recovered_at`.
    /// Idempotent point write; re-marking an already-recovered checkpoint
    /// overwrites the timestamp.
    fn checkpoint_mark_recovered(&self, id: CheckpointId, at: Timestamp) -> AutosaveResult<()>;

    /// Delete by id. Deleting an absent checkpoint is a no-op so that
    /// overlapping retention sweeps stay idempotent.
    fn checkpoint_delete(&self, id: CheckpointId) -> AutosaveResult<()>;

    /// Every checkpoint across all reports with `expires_at < now`.
    fn checkpoint_list_expired(&self, now: Timestamp) -> AutosaveResult<Vec<Checkpoint>>;
}

// ============================================================================
// REPORT DIRECTORY
// ============================================================================

/// The engine's window onto reports, which are owned by the surrounding
/// reporting subsystem. The engine reads identity and status, and writes
/// exactly one thing: the autosave pointer.
pub trait ReportDirectory: Send + Sync {
    /// Look up a report. `Ok(None)` when it does not exist.
    fn report_get(&self, report_id: ReportId) -> AutosaveResult<Option<ReportRef>>;

    /// Record the most recent checkpoint on the report (idempotent point
    /// write). A `Draft` report becomes `InProgress` on its first autosave.
    fn report_record_autosave(
        &self,
        report_id: ReportId,
        checkpoint_id: CheckpointId,
        at: Timestamp,
    ) -> AutosaveResult<()>;

    /// Display identity for conflict descriptors. Best effort; `Ok(None)`
    /// when the user is unknown.
    fn user_display_name(&self, user_id: UserId) -> AutosaveResult<Option<String>>;
}

// ============================================================================
// AUDIT SINK
// ============================================================================

/// Append-only history log. The engine treats appends as fire-and-forget:
/// failures are logged by the caller and never fail the originating
/// operation.
pub trait AuditSink: Send + Sync {
    fn audit_append(&self, entry: AuditEntry) -> AutosaveResult<()>;
}
