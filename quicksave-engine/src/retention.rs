//! Retention manager
//!
//! Two cleanup paths keep checkpoint growth bounded without ever leaving a
//! report unrecoverable. Per-report pruning runs after every stored write
//! and enforces the rolling keep-set; the expiry sweep runs on a schedule
//! across all reports and drops rows past their `expires_at` horizon. Both
//! always spare the most recent checkpoint of a report.

use quicksave_core::{AutosaveResult, CheckpointId, ReportId, Timestamp};
use quicksave_storage::CheckpointStore;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

/// Applies the keep-set after writes and the expiry sweep on a schedule.
pub struct RetentionManager {
    store: Arc<dyn CheckpointStore>,
    max_checkpoints: usize,
}

impl RetentionManager {
    pub fn new(store: Arc<dyn CheckpointStore>, max_checkpoints: usize) -> Self {
        Self {
            store,
            max_checkpoints,
        }
    }

    /// Delete everything outside the report's keep-set; returns how many
    /// rows were removed.
    ///
    /// Keep-set: the `max_checkpoints` most recent non-milestone
    /// checkpoints, every milestone checkpoint, and unconditionally the
    /// single most recent checkpoint. Individual delete failures are logged
    /// and skipped; the next prune picks them up.
    pub fn prune_report(&self, report_id: ReportId) -> AutosaveResult<usize> {
        let rows = self.store.checkpoint_list_for_report(report_id)?;

        let mut non_milestones_seen = 0usize;
        let mut deleted = 0usize;
        for (index, checkpoint) in rows.iter().enumerate() {
            if checkpoint.is_milestone {
                continue;
            }
            non_milestones_seen += 1;
            if index == 0 {
                // The most recent checkpoint holds a quota slot but is
                // never deleted.
                continue;
            }
            if non_milestones_seen <= self.max_checkpoints {
                continue;
            }
            match self.store.checkpoint_delete(checkpoint.checkpoint_id) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        checkpoint_id = %checkpoint.checkpoint_id,
                        "Failed to prune checkpoint"
                    );
                }
            }
        }

        if deleted > 0 {
            tracing::debug!(report_id = %report_id, deleted, "Pruned checkpoints past keep-set");
        }
        Ok(deleted)
    }

    /// Delete every checkpoint past its expiry horizon, sparing the most
    /// recent checkpoint of each report so a report with writes always has
    /// at least one recoverable point.
    ///
    /// Idempotent and safe under concurrent self-overlap: deletion is keyed
    /// by the expiry predicate and deleting an already-deleted row is a
    /// no-op at the store.
    pub fn sweep_expired(&self, now: Timestamp) -> AutosaveResult<usize> {
        let expired = self.store.checkpoint_list_expired(now)?;

        let mut latest_by_report: HashMap<ReportId, Option<CheckpointId>> = HashMap::new();
        let mut deleted = 0usize;
        for checkpoint in &expired {
            let latest = match latest_by_report.entry(checkpoint.report_id) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    let id = self
                        .store
                        .checkpoint_latest(checkpoint.report_id)?
                        .map(|c| c.checkpoint_id);
                    *entry.insert(id)
                }
            };
            if latest == Some(checkpoint.checkpoint_id) {
                continue;
            }
            match self.store.checkpoint_delete(checkpoint.checkpoint_id) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        checkpoint_id = %checkpoint.checkpoint_id,
                        "Failed to delete expired checkpoint"
                    );
                }
            }
        }

        tracing::info!(deleted, "Expired checkpoint sweep complete");
        Ok(deleted)
    }
}

// =============================================================================
// TESTS
// =============================================================================


// =============================================================================
// PROPERTY TESTS
// =============================================================================
