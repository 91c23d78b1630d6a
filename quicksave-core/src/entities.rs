//! Entity types for Quicksave
//!
//! `Checkpoint` is the one entity this engine owns. Everything else here is
//! either a view of an external entity (`ReportRef`), a projection for
//! callers (`CheckpointSummary`, `AutosaveStats`), or the audit-trail record.

use crate::enums::{AuditAction, MergeStrategy, ReportStatus};
use crate::identity::{CheckpointId, ContentHash, RawContent, ReportId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

// ============================================================================
// SAVE CONTEXT
// ============================================================================

/// Caller-supplied identifiers distinguishing concurrent editing contexts,
/// plus UI resume hints stored verbatim.
///
/// Both identifiers are optional; a context with neither is the single
/// anonymous context, equal only to itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SaveContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_position: Option<i32>,
}

impl SaveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_device(mut self, device_id: &str) -> Self {
        self.device_id = Some(device_id.to_string());
        self
    }

    pub fn with_page_url(mut self, page_url: &str) -> Self {
        self.page_url = Some(page_url.to_string());
        self
    }

    pub fn with_scroll_position(mut self, scroll_position: i32) -> Self {
        self.scroll_position = Some(scroll_position);
        self
    }

    /// True when this context and the given identifiers belong to the same
    /// editing actor: both the device and the session compare equal as
    /// options. A checkpoint conflicts with a caller when either differs.
    pub fn same_actor(&self, device_id: Option<&str>, session_id: Option<&str>) -> bool {
        self.device_id.as_deref() == device_id && self.session_id.as_deref() == session_id
    }
}

// ============================================================================
// CHECKPOINT
// ============================================================================

/// An immutable snapshot of a report's in-progress form state.
///
/// Checkpoints belong to exactly one report and never move. Once written,
/// the only mutation ever applied is the `recovered_from`/`recovered_at`
/// audit flip, which is an idempotent point write, not a lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: CheckpointId,
    pub report_id: ReportId,
    pub user_id: UserId,
    pub context: SaveContext,

    /// Codec-encoded canonical serialization of the report state.
    pub state_blob: RawContent,

    /// SHA-256 of the canonical (pre-codec) bytes. Dedup key per report.
    pub content_hash: ContentHash,

    /// Stored blob length, for listings.
    pub size_bytes: usize,

    pub completion_percentage: f64,
    pub items_completed: u32,

    /// Set when this write crossed a 25% completion boundary; milestone
    /// checkpoints survive normal pruning.
    pub is_milestone: bool,

    pub recovered_from: bool,
    pub recovered_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Checkpoint {
    pub fn new(
        checkpoint_id: CheckpointId,
        report_id: ReportId,
        user_id: UserId,
        context: SaveContext,
        state_blob: RawContent,
        content_hash: ContentHash,
        created_at: Timestamp,
        expires_at: Timestamp,
    ) -> Self {
        let size_bytes = state_blob.len();
        Self {
            checkpoint_id,
            report_id,
            user_id,
            context,
            state_blob,
            content_hash,
            size_bytes,
            completion_percentage: 0.0,
            items_completed: 0,
            is_milestone: false,
            recovered_from: false,
            recovered_at: None,
            created_at,
            expires_at,
        }
    }

    pub fn with_completion(mut self, percentage: f64, items_completed: u32) -> Self {
        self.completion_percentage = percentage;
        self.items_completed = items_completed;
        self
    }

    pub fn with_milestone(mut self, is_milestone: bool) -> Self {
        self.is_milestone = is_milestone;
        self
    }

    /// Listing projection; drops the blob, keeps the metadata.
    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary {
            checkpoint_id: self.checkpoint_id,
            user_id: self.user_id,
            created_at: self.created_at,
            device_id: self.context.device_id.clone(),
            session_id: self.context.session_id.clone(),
            size_bytes: self.size_bytes,
            completion_percentage: self.completion_percentage,
            items_completed: self.items_completed,
            is_milestone: self.is_milestone,
            recovered_from: self.recovered_from,
        }
    }
}

/// Metadata-only view of a checkpoint, returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub checkpoint_id: CheckpointId,
    pub user_id: UserId,
    pub created_at: Timestamp,
    pub device_id: Option<String>,
    pub session_id: Option<String>,
    pub size_bytes: usize,
    pub completion_percentage: f64,
    pub items_completed: u32,
    pub is_milestone: bool,
    pub recovered_from: bool,
}

// ============================================================================
// REPORT REFERENCE
// ============================================================================

/// The engine's view of a report owned by the reporting subsystem: identity,
/// status, and the autosave pointer this engine maintains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRef {
    pub report_id: ReportId,
    pub status: ReportStatus,
    pub last_autosave: Option<CheckpointId>,
    pub last_autosave_at: Option<Timestamp>,
}

impl ReportRef {
    pub fn new(report_id: ReportId, status: ReportStatus) -> Self {
        Self {
            report_id,
            status,
            last_autosave: None,
            last_autosave_at: None,
        }
    }
}

// ============================================================================
// STATS
// ============================================================================

/// Per-report autosave summary, derived from one range read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AutosaveStats {
    pub total_checkpoints: usize,
    pub milestone_checkpoints: usize,
    pub recovered_checkpoints: usize,
    pub distinct_devices: usize,
    pub last_autosave_at: Option<Timestamp>,
    pub max_completion_percentage: f64,
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// One record appended to the report's external history log.
/// Appends are fire-and-forget from the engine's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub report_id: ReportId,
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub checkpoint_id: Option<CheckpointId>,
    pub detail: String,
    pub created_at: Timestamp,
}

impl AuditEntry {
    pub fn autosaved(
        report_id: ReportId,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        completion_percentage: f64,
        at: Timestamp,
    ) -> Self {
        Self {
            report_id,
            user_id: Some(user_id),
            action: AuditAction::Autosaved,
            checkpoint_id: Some(checkpoint_id),
            detail: format!(
                "Autosave checkpoint stored ({:.2}% complete)",
                completion_percentage
            ),
            created_at: at,
        }
    }

    pub fn recovered(
        report_id: ReportId,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        at: Timestamp,
    ) -> Self {
        Self {
            report_id,
            user_id: Some(user_id),
            action: AuditAction::Recovered,
            checkpoint_id: Some(checkpoint_id),
            detail: "Checkpoint recovered into an editing session".to_string(),
            created_at: at,
        }
    }

    pub fn conflict_resolved(
        report_id: ReportId,
        user_id: Option<UserId>,
        strategy: MergeStrategy,
        conflicted_fields: &[String],
        at: Timestamp,
    ) -> Self {
        let detail = if conflicted_fields.is_empty() {
            format!("Conflict resolved using strategy: {}", strategy)
        } else {
            format!(
                "Conflict resolved using strategy: {} (diverging fields: {})",
                strategy,
                conflicted_fields.join(", ")
            )
        };
        Self {
            report_id,
            user_id,
            action: AuditAction::ConflictResolved,
            checkpoint_id: None,
            detail,
            created_at: at,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
