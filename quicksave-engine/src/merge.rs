//! Conflict resolver / merge engine
//!
//! Reconciles two divergent report states into one. The merge path is
//! field-aware: checklist answers take per-key latest-wins, attachments are
//! unioned and never dropped, diverging notes are concatenated under a
//! visible marker, and completion never regresses. The functions here are
//! pure; the only side effect in `resolve` is the audit append.

use crate::clock::Clock;
use quicksave_core::{
    AttachmentRef, AuditEntry, AutosaveResult, ChecklistAnswer, MergeStrategy, ReportId,
    ReportState, Timestamp,
};
use quicksave_storage::AuditSink;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Marker line inserted between the two sides of a notes merge. Visible to
/// the inspector so neither side's text silently disappears.
pub const NOTES_MERGE_MARKER: &str = "[Merged from other device]";

/// Result of a conflict resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub merged: ReportState,
    pub strategy: MergeStrategy,
    /// Top-level fields where both sides carried a value and the values
    /// differed. Audit information, never blocking; empty means the two
    /// sides were consistent.
    pub conflicted_fields: Vec<String>,
}

/// Resolves divergent states and records the resolution in the audit trail.
pub struct MergeEngine {
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl MergeEngine {
    pub fn new(audit: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self { audit, clock }
    }

    /// Apply a resolution strategy to two divergent states. Pure given its
    /// inputs apart from the audit append, which is best-effort.
    pub fn resolve(
        &self,
        report_id: ReportId,
        local: &ReportState,
        remote: &ReportState,
        strategy: MergeStrategy,
    ) -> AutosaveResult<MergeOutcome> {
        let conflicted_fields = conflicted_fields(local, remote);

        let merged = match strategy {
            MergeStrategy::LocalWins => local.clone(),
            MergeStrategy::RemoteWins => remote.clone(),
            MergeStrategy::Merge => merge_states(local, remote),
        };

        let entry = AuditEntry::conflict_resolved(
            report_id,
            None,
            strategy,
            &conflicted_fields,
            self.clock.now(),
        );
        if let Err(e) = self.audit.audit_append(entry) {
            tracing::warn!(
                error = %e,
                report_id = %report_id,
                "Failed to record conflict resolution in audit log"
            );
        }

        Ok(MergeOutcome {
            merged,
            strategy,
            conflicted_fields,
        })
    }
}

// ============================================================================
// PURE MERGE RULES
// ============================================================================

/// Field-aware merge of two states, remote as the base.
pub fn merge_states(local: &ReportState, remote: &ReportState) -> ReportState {
    let mut merged = remote.clone();

    // Checklist answers: union of keys, later answered_at wins per key.
    // A missing timestamp counts as epoch, so it loses to any present one,
    // and exact ties keep the remote (base) answer.
    for (key, local_answer) in &local.items {
        let take_local = match merged.items.get(key) {
            Some(remote_answer) => answered_time(local_answer) > answered_time(remote_answer),
            None => true,
        };
        if take_local {
            merged.items.insert(key.clone(), local_answer.clone());
        }
    }

    // Attachments are append-only evidence; union, never drop.
    merged.images = union_attachments(&remote.images, &local.images);
    merged.voice_memos = union_attachments(&remote.voice_memos, &local.voice_memos);

    merged.staff_notes = merge_notes(local.staff_notes.as_deref(), remote.staff_notes.as_deref());

    merged.completion_percentage =
        max_completion(local.completion_percentage, remote.completion_percentage);

    // Extra fields: remote wins contested keys, one-sided keys are kept.
    for (key, value) in &local.extra {
        if !merged.extra.contains_key(key) {
            merged.extra.insert(key.clone(), value.clone());
        }
    }

    merged
}

/// Top-level fields where both sides carry a value and the values differ.
pub fn conflicted_fields(local: &ReportState, remote: &ReportState) -> Vec<String> {
    let mut fields = Vec::new();

    if !local.items.is_empty() && !remote.items.is_empty() && local.items != remote.items {
        fields.push("items".to_string());
    }
    if !local.images.is_empty() && !remote.images.is_empty() && local.images != remote.images {
        fields.push("images".to_string());
    }
    if !local.voice_memos.is_empty()
        && !remote.voice_memos.is_empty()
        && local.voice_memos != remote.voice_memos
    {
        fields.push("voice_memos".to_string());
    }
    if let (Some(local_notes), Some(remote_notes)) =
        (local.staff_notes.as_deref(), remote.staff_notes.as_deref())
    {
        if local_notes != remote_notes {
            fields.push("staff_notes".to_string());
        }
    }
    if let (Some(local_pct), Some(remote_pct)) =
        (local.completion_percentage, remote.completion_percentage)
    {
        if local_pct != remote_pct {
            fields.push("completion_percentage".to_string());
        }
    }
    for (key, local_value) in &local.extra {
        if remote
            .extra
            .get(key)
            .map_or(false, |remote_value| remote_value != local_value)
        {
            fields.push(key.clone());
        }
    }

    fields
}

fn answered_time(answer: &ChecklistAnswer) -> Timestamp {
    answer
        .answered_at
        .unwrap_or(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH)
}

fn union_attachments(base: &[AttachmentRef], additions: &[AttachmentRef]) -> Vec<AttachmentRef> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = Vec::with_capacity(base.len() + additions.len());
    for attachment in base.iter().chain(additions.iter()) {
        if seen.insert(attachment.uri.as_str()) {
            merged.push(attachment.clone());
        }
    }
    merged
}

fn merge_notes(local: Option<&str>, remote: Option<&str>) -> Option<String> {
    let local = local.filter(|s| !s.is_empty());
    let remote = remote.filter(|s| !s.is_empty());
    match (local, remote) {
        (None, None) => None,
        (Some(l), None) => Some(l.to_string()),
        (None, Some(r)) => Some(r.to_string()),
        (Some(l), Some(r)) if l == r => Some(r.to_string()),
        (Some(l), Some(r)) => Some(format!("{}\n\n{}\n{}", r, NOTES_MERGE_MARKER, l)),
    }
}

fn max_completion(local: Option<f64>, remote: Option<f64>) -> Option<f64> {
    match (local, remote) {
        (Some(l), Some(r)) => Some(l.max(r)),
        (Some(l), None) => Some(l),
        (None, remote) => remote,
    }
}

// =============================================================================
// TESTS
// =============================================================================


// =============================================================================
// PROPERTY TESTS
// =============================================================================
