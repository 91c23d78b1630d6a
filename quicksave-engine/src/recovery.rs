//! Crash-recovery selector
//!
//! Picks the checkpoint an editing session should resume from, decodes it
//! back into the typed document, and leaves an audit trail. Selection order:
//! an explicitly requested checkpoint, else a clean milestone written after
//! a suspected device hand-off, else the caller's most recent save.

use crate::clock::Clock;
use crate::codec::BlobCodec;
use quicksave_core::{
    AuditEntry, AutosaveError, AutosaveResult, Checkpoint, CheckpointId, NotFoundError, ReportId,
    ReportState, StorageError, Timestamp, UserId,
};
use quicksave_storage::{AuditSink, CheckpointStore};
use serde::Serialize;
use std::sync::Arc;

/// A checkpoint decoded and handed back to an editing session, with the UI
/// resume hints its writer stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveredCheckpoint {
    pub checkpoint_id: CheckpointId,
    pub state: ReportState,
    pub created_at: Timestamp,
    pub completion_percentage: f64,
    pub is_milestone: bool,
    pub session_id: Option<String>,
    pub device_id: Option<String>,
    pub page_url: Option<String>,
    pub scroll_position: Option<i32>,
}

/// Selects and decodes the checkpoint to resume from.
pub struct RecoverySelector {
    store: Arc<dyn CheckpointStore>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    codec: BlobCodec,
}

impl RecoverySelector {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        codec: BlobCodec,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
            codec,
        }
    }

    /// Recover a checkpoint into an editing session.
    ///
    /// With `checkpoint_id` this is a point read, failing `NotFound` when the
    /// id is absent or belongs to another report. Without it the selection is
    /// deterministic over the stored set: same arguments, same checkpoint.
    /// The `recovered_from` flip and the audit append are best-effort; the
    /// recovered state is returned even when they fail.
    pub fn recover(
        &self,
        report_id: ReportId,
        user_id: UserId,
        checkpoint_id: Option<CheckpointId>,
        device_id: Option<&str>,
    ) -> AutosaveResult<RecoveredCheckpoint> {
        let checkpoint = match checkpoint_id {
            Some(id) => match self.store.checkpoint_get(id)? {
                Some(c) if c.report_id == report_id => c,
                _ => {
                    return Err(AutosaveError::NotFound(NotFoundError::Checkpoint {
                        report_id,
                        checkpoint_id: id,
                    }))
                }
            },
            None => self.select_resume_point(report_id, user_id, device_id)?,
        };

        let state = self.decode_state(&checkpoint)?;

        let now = self.clock.now();
        if let Err(e) = self
            .store
            .checkpoint_mark_recovered(checkpoint.checkpoint_id, now)
        {
            tracing::warn!(
                error = %e,
                checkpoint_id = %checkpoint.checkpoint_id,
                "Failed to mark checkpoint as recovered"
            );
        }
        let entry = AuditEntry::recovered(report_id, user_id, checkpoint.checkpoint_id, now);
        if let Err(e) = self.audit.audit_append(entry) {
            tracing::warn!(
                error = %e,
                report_id = %report_id,
                "Failed to record recovery in audit log"
            );
        }

        Ok(RecoveredCheckpoint {
            checkpoint_id: checkpoint.checkpoint_id,
            state,
            created_at: checkpoint.created_at,
            completion_percentage: checkpoint.completion_percentage,
            is_milestone: checkpoint.is_milestone,
            session_id: checkpoint.context.session_id,
            device_id: checkpoint.context.device_id,
            page_url: checkpoint.context.page_url,
            scroll_position: checkpoint.context.scroll_position,
        })
    }

    /// Automatic selection when no explicit checkpoint was requested.
    ///
    /// If the caller names its device and some checkpoint on the report came
    /// from a different device, a hand-off is suspected; resuming from the
    /// caller's most recent milestone written after that foreign save beats
    /// resuming from a partial micro-save. Otherwise the caller's most
    /// recent checkpoint wins.
    fn select_resume_point(
        &self,
        report_id: ReportId,
        user_id: UserId,
        device_id: Option<&str>,
    ) -> AutosaveResult<Checkpoint> {
        let rows = self.store.checkpoint_list_for_report(report_id)?;

        if let Some(device) = device_id {
            let foreign = rows
                .iter()
                .find(|c| c.context.device_id.as_deref() != Some(device));
            if let Some(foreign) = foreign {
                let milestone = rows.iter().find(|c| {
                    c.user_id == user_id && c.is_milestone && c.created_at > foreign.created_at
                });
                if let Some(milestone) = milestone {
                    return Ok(milestone.clone());
                }
            }
        }

        rows.into_iter()
            .find(|c| c.user_id == user_id)
            .ok_or(AutosaveError::NotFound(NotFoundError::NoCheckpoints {
                report_id,
            }))
    }

    /// Decode the stored blob back into the typed document. Failure here
    /// means the stored row is bad, not the caller's input.
    fn decode_state(&self, checkpoint: &Checkpoint) -> AutosaveResult<ReportState> {
        let raw = self.codec.decode(&checkpoint.state_blob).map_err(|reason| {
            AutosaveError::Storage(StorageError::Corrupted {
                checkpoint_id: checkpoint.checkpoint_id,
                reason,
            })
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            AutosaveError::Storage(StorageError::Corrupted {
                checkpoint_id: checkpoint.checkpoint_id,
                reason: format!("state deserialize failed: {}", e),
            })
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
