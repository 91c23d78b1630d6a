//! Checkpoint writer
//!
//! The hot path: every few seconds each active editing session hands a
//! serialized form state to `create_checkpoint`. The writer validates,
//! hashes, deduplicates against the report's most recent checkpoint,
//! derives progress, encodes, persists, updates the report's autosave
//! pointer, and kicks off pruning. Audit and prune failures never fail a
//! save; losing the inspector's work to a logging problem is the one
//! outcome this module exists to prevent.

use crate::clock::Clock;
use crate::config::{chrono_duration, AutosaveConfig};
use crate::retention::RetentionManager;
use quicksave_core::{
    compute_content_hash, encode_hash, new_checkpoint_id, AuditEntry, AutosaveError,
    AutosaveResult, AutosaveStats, Checkpoint, CheckpointId, CheckpointSummary, NotFoundError,
    ReportId, ReportState, SaveContext, StorageError, UserId,
};
use quicksave_storage::{AuditSink, CheckpointStore, ReportDirectory};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Completion boundaries that make a checkpoint a milestone when crossed.
const MILESTONE_BOUNDARIES: [f64; 4] = [25.0, 50.0, 75.0, 100.0];

/// What the client gets back from a save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointReceipt {
    pub checkpoint_id: CheckpointId,
    /// Hex form of the canonical-bytes hash.
    pub content_hash: String,
    pub completion_percentage: f64,
    pub items_completed: u32,
    pub is_milestone: bool,
    /// True when the state matched the report's most recent checkpoint and
    /// no new row was written.
    pub deduplicated: bool,
}

/// True when moving from `previous` to `current` completion crossed a
/// milestone boundary. Reaching a boundary exactly counts; re-saving while
/// already past it does not.
pub fn crossed_milestone(previous: f64, current: f64) -> bool {
    MILESTONE_BOUNDARIES
        .iter()
        .any(|boundary| previous < *boundary && current >= *boundary)
}

/// Validates, persists, and accounts for autosave checkpoints.
pub struct CheckpointWriter {
    store: Arc<dyn CheckpointStore>,
    reports: Arc<dyn ReportDirectory>,
    audit: Arc<dyn AuditSink>,
    retention: Arc<RetentionManager>,
    clock: Arc<dyn Clock>,
    config: AutosaveConfig,
}

impl CheckpointWriter {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        reports: Arc<dyn ReportDirectory>,
        audit: Arc<dyn AuditSink>,
        retention: Arc<RetentionManager>,
        clock: Arc<dyn Clock>,
        config: AutosaveConfig,
    ) -> Self {
        Self {
            store,
            reports,
            audit,
            retention,
            clock,
            config,
        }
    }

    /// Store a checkpoint for the report, or return the existing one when
    /// the state has not changed since the last save.
    ///
    /// Validation failures reject the whole save before anything is
    /// persisted. A retried save after a storage failure deduplicates
    /// against whatever the first attempt managed to write, so client
    /// retries never stack duplicate rows.
    pub fn create_checkpoint(
        &self,
        report_id: ReportId,
        user_id: UserId,
        state: serde_json::Value,
        context: SaveContext,
    ) -> AutosaveResult<CheckpointReceipt> {
        let report = self
            .reports
            .report_get(report_id)?
            .ok_or(AutosaveError::NotFound(NotFoundError::Report { report_id }))?;
        if report.status.is_terminal() {
            // A completed or archived report no longer accepts autosaves;
            // to the caller it is indistinguishable from an absent one.
            return Err(AutosaveError::NotFound(NotFoundError::Report { report_id }));
        }

        let state = ReportState::from_value(state)?;
        let canonical = state.canonical_bytes()?;
        let content_hash = compute_content_hash(&canonical);

        let previous = self.store.checkpoint_latest(report_id)?;
        if self.config.dedup_enabled {
            if let Some(prev) = &previous {
                if prev.content_hash == content_hash {
                    tracing::debug!(
                        report_id = %report_id,
                        checkpoint_id = %prev.checkpoint_id,
                        "State unchanged since last checkpoint, skipping write"
                    );
                    return Ok(CheckpointReceipt {
                        checkpoint_id: prev.checkpoint_id,
                        content_hash: encode_hash(&content_hash),
                        completion_percentage: prev.completion_percentage,
                        items_completed: prev.items_completed,
                        is_milestone: prev.is_milestone,
                        deduplicated: true,
                    });
                }
            }
        }

        let completion_percentage = state.completion();
        let items_completed = state.answered_items();
        let previous_completion = previous
            .as_ref()
            .map(|c| c.completion_percentage)
            .unwrap_or(0.0);
        let is_milestone = crossed_milestone(previous_completion, completion_percentage);

        let blob = self.config.codec.encode(&canonical).map_err(|reason| {
            AutosaveError::Storage(StorageError::Backend {
                operation: "encode_state".to_string(),
                reason,
            })
        })?;

        let now = self.clock.now();
        let checkpoint = Checkpoint::new(
            new_checkpoint_id(),
            report_id,
            user_id,
            context,
            blob,
            content_hash,
            now,
            now + chrono_duration(self.config.retention),
        )
        .with_completion(completion_percentage, items_completed)
        .with_milestone(is_milestone);

        self.store.checkpoint_insert(&checkpoint)?;
        self.reports
            .report_record_autosave(report_id, checkpoint.checkpoint_id, now)?;

        tracing::debug!(
            report_id = %report_id,
            checkpoint_id = %checkpoint.checkpoint_id,
            completion = completion_percentage,
            milestone = is_milestone,
            "Checkpoint stored"
        );

        let entry = AuditEntry::autosaved(
            report_id,
            user_id,
            checkpoint.checkpoint_id,
            completion_percentage,
            now,
        );
        if let Err(e) = self.audit.audit_append(entry) {
            tracing::warn!(
                error = %e,
                report_id = %report_id,
                "Failed to record autosave in audit log"
            );
        }

        if let Err(e) = self.retention.prune_report(report_id) {
            tracing::warn!(
                error = %e,
                report_id = %report_id,
                "Failed to prune after checkpoint write"
            );
        }

        Ok(CheckpointReceipt {
            checkpoint_id: checkpoint.checkpoint_id,
            content_hash: encode_hash(&content_hash),
            completion_percentage,
            items_completed,
            is_milestone,
            deduplicated: false,
        })
    }

    /// Metadata listing, newest first, capped at `limit`. A report with no
    /// checkpoints lists empty.
    pub fn list_checkpoints(
        &self,
        report_id: ReportId,
        limit: usize,
    ) -> AutosaveResult<Vec<CheckpointSummary>> {
        let rows = self.store.checkpoint_list_for_report(report_id)?;
        Ok(rows.iter().take(limit).map(Checkpoint::summary).collect())
    }

    /// Aggregate the report's checkpoint rows into a stats summary.
    pub fn stats(&self, report_id: ReportId) -> AutosaveResult<AutosaveStats> {
        let rows = self.store.checkpoint_list_for_report(report_id)?;
        let distinct_devices: HashSet<&str> = rows
            .iter()
            .filter_map(|c| c.context.device_id.as_deref())
            .collect();
        Ok(AutosaveStats {
            total_checkpoints: rows.len(),
            milestone_checkpoints: rows.iter().filter(|c| c.is_milestone).count(),
            recovered_checkpoints: rows.iter().filter(|c| c.recovered_from).count(),
            distinct_devices: distinct_devices.len(),
            last_autosave_at: rows.first().map(|c| c.created_at),
            max_completion_percentage: rows
                .iter()
                .map(|c| c.completion_percentage)
                .fold(0.0, f64::max),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================


// =============================================================================
// PROPERTY TESTS
// =============================================================================
