//! Concurrent-editing detector
//!
//! Answers one question: has another editing context written a checkpoint
//! for this report recently? "Another context" means the device or session
//! identifier differs from the caller's; "recently" is the configured
//! trailing window. The answer is advisory. It never blocks a write and a
//! clean scan is the overwhelmingly common outcome.

use crate::clock::Clock;
use crate::config::chrono_duration;
use quicksave_core::{AutosaveResult, ReportId, Timestamp, UserId};
use quicksave_storage::{CheckpointStore, ReportDirectory};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Evidence of a concurrent editing context, surfaced to the caller so a
/// human can decide what to do about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictDescriptor {
    /// Author of the most recent foreign checkpoint.
    pub user_id: UserId,
    /// Display identity for UI copy, when the directory knows it.
    pub user_display_name: Option<String>,
    pub device_id: Option<String>,
    pub session_id: Option<String>,
    pub completion_percentage: f64,
    /// When the foreign context last wrote.
    pub last_activity_at: Timestamp,
}

/// Scans recent checkpoints for writes from a different editing context.
pub struct ConflictDetector {
    store: Arc<dyn CheckpointStore>,
    reports: Arc<dyn ReportDirectory>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl ConflictDetector {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        reports: Arc<dyn ReportDirectory>,
        clock: Arc<dyn Clock>,
        window: Duration,
    ) -> Self {
        Self {
            store,
            reports,
            clock,
            window,
        }
    }

    /// The most recent checkpoint inside the trailing window written by a
    /// different actor, or `Ok(None)` when every recent write is the
    /// caller's own. A report with no checkpoints scans clean.
    pub fn detect_conflicts(
        &self,
        report_id: ReportId,
        device_id: Option<&str>,
        session_id: Option<&str>,
    ) -> AutosaveResult<Option<ConflictDescriptor>> {
        let horizon = self.clock.now() - chrono_duration(self.window);
        let rows = self.store.checkpoint_list_for_report(report_id)?;

        // Newest first, so the first qualifying row is the most recent
        // foreign write; everything at or past the horizon is out of scope.
        let found = rows
            .iter()
            .take_while(|c| c.created_at > horizon)
            .find(|c| !c.context.same_actor(device_id, session_id));

        let Some(checkpoint) = found else {
            return Ok(None);
        };

        let user_display_name = match self.reports.user_display_name(checkpoint.user_id) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    user_id = %checkpoint.user_id,
                    "Failed to resolve display name for conflict descriptor"
                );
                None
            }
        };

        Ok(Some(ConflictDescriptor {
            user_id: checkpoint.user_id,
            user_display_name,
            device_id: checkpoint.context.device_id.clone(),
            session_id: checkpoint.context.session_id.clone(),
            completion_percentage: checkpoint.completion_percentage,
            last_activity_at: checkpoint.created_at,
        }))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use quicksave_core::{compute_content_hash, new_checkpoint_id, Checkpoint, SaveContext};
    use quicksave_storage::MemoryStore;
    use uuid::Uuid;

    const WINDOW: Duration = Duration::from_secs(300);

    fn base_time() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn make_detector(store: &Arc<MemoryStore>, now: Timestamp) -> ConflictDetector {
        ConflictDetector::new(
            store.clone(),
            store.clone(),
            Arc::new(FixedClock::at(now)),
            WINDOW,
        )
    }

    fn make_checkpoint(
        report_id: ReportId,
        user_id: UserId,
        context: SaveContext,
        minutes_before_base: i64,
    ) -> Checkpoint {
        let created_at = base_time() - chrono::Duration::minutes(minutes_before_base);
        let blob = format!("blob-{}", minutes_before_base).into_bytes();
        let hash = compute_content_hash(&blob);
        Checkpoint::new(
            new_checkpoint_id(),
            report_id,
            user_id,
            context,
            blob,
            hash,
            created_at,
            created_at + chrono::Duration::days(7),
        )
        .with_completion(37.5, 9)
    }

    #[test]
    fn test_no_checkpoints_scans_clean() {
        let store = Arc::new(MemoryStore::new());
        let detector = make_detector(&store, base_time());

        let found = detector
            .detect_conflicts(Uuid::now_v7(), Some("phone"), Some("s1"))
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_own_writes_are_not_conflicts() {
        let store = Arc::new(MemoryStore::new());
        let report_id = Uuid::now_v7();
        let context = SaveContext::new().with_device("phone").with_session("s1");
        store
            .checkpoint_insert(&make_checkpoint(report_id, Uuid::now_v7(), context, 1))
            .unwrap();

        let detector = make_detector(&store, base_time());
        let found = detector
            .detect_conflicts(report_id, Some("phone"), Some("s1"))
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_foreign_device_within_window_is_a_conflict() {
        let store = Arc::new(MemoryStore::new());
        let report_id = Uuid::now_v7();
        let other_user = Uuid::now_v7();
        let context = SaveContext::new().with_device("tablet").with_session("s2");
        let checkpoint = make_checkpoint(report_id, other_user, context, 2);
        store.checkpoint_insert(&checkpoint).unwrap();

        let detector = make_detector(&store, base_time());
        let found = detector
            .detect_conflicts(report_id, Some("phone"), Some("s1"))
            .unwrap()
            .unwrap();
        assert_eq!(found.user_id, other_user);
        assert_eq!(found.device_id.as_deref(), Some("tablet"));
        assert_eq!(found.session_id.as_deref(), Some("s2"));
        assert_eq!(found.completion_percentage, 37.5);
        assert_eq!(found.last_activity_at, checkpoint.created_at);
    }

    #[test]
    fn test_session_difference_alone_is_a_conflict() {
        let store = Arc::new(MemoryStore::new());
        let report_id = Uuid::now_v7();
        // Same device id, different browser session (a recovered tab).
        let context = SaveContext::new().with_device("phone").with_session("s2");
        store
            .checkpoint_insert(&make_checkpoint(report_id, Uuid::now_v7(), context, 1))
            .unwrap();

        let detector = make_detector(&store, base_time());
        let found = detector
            .detect_conflicts(report_id, Some("phone"), Some("s1"))
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn test_writes_outside_window_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let report_id = Uuid::now_v7();
        let context = SaveContext::new().with_device("tablet").with_session("s2");
        store
            .checkpoint_insert(&make_checkpoint(report_id, Uuid::now_v7(), context, 10))
            .unwrap();

        let detector = make_detector(&store, base_time());
        let found = detector
            .detect_conflicts(report_id, Some("phone"), Some("s1"))
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_write_exactly_at_horizon_is_out_of_window() {
        let store = Arc::new(MemoryStore::new());
        let report_id = Uuid::now_v7();
        let context = SaveContext::new().with_device("tablet").with_session("s2");
        store
            .checkpoint_insert(&make_checkpoint(report_id, Uuid::now_v7(), context, 5))
            .unwrap();

        let detector = make_detector(&store, base_time());
        let found = detector
            .detect_conflicts(report_id, Some("phone"), Some("s1"))
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_most_recent_foreign_write_wins() {
        let store = Arc::new(MemoryStore::new());
        let report_id = Uuid::now_v7();
        let older_user = Uuid::now_v7();
        let newer_user = Uuid::now_v7();
        store
            .checkpoint_insert(&make_checkpoint(
                report_id,
                older_user,
                SaveContext::new().with_device("tablet").with_session("s2"),
                3,
            ))
            .unwrap();
        store
            .checkpoint_insert(&make_checkpoint(
                report_id,
                newer_user,
                SaveContext::new().with_device("laptop").with_session("s3"),
                1,
            ))
            .unwrap();

        let detector = make_detector(&store, base_time());
        let found = detector
            .detect_conflicts(report_id, Some("phone"), Some("s1"))
            .unwrap()
            .unwrap();
        assert_eq!(found.user_id, newer_user);
        assert_eq!(found.device_id.as_deref(), Some("laptop"));
    }

    #[test]
    fn test_anonymous_contexts_match_each_other_only() {
        let store = Arc::new(MemoryStore::new());
        let report_id = Uuid::now_v7();
        store
            .checkpoint_insert(&make_checkpoint(
                report_id,
                Uuid::now_v7(),
                SaveContext::new(),
                1,
            ))
            .unwrap();

        let detector = make_detector(&store, base_time());
        // Anonymous probe against the anonymous checkpoint: one actor.
        assert_eq!(detector.detect_conflicts(report_id, None, None).unwrap(), None);
        // An identified probe differs from the anonymous writer.
        assert!(detector
            .detect_conflicts(report_id, Some("phone"), Some("s1"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_display_name_resolved_from_directory() {
        let store = Arc::new(MemoryStore::new());
        let report_id = Uuid::now_v7();
        let other_user = Uuid::now_v7();
        store.user_insert(other_user, "Sarah Chen").unwrap();
        store
            .checkpoint_insert(&make_checkpoint(
                report_id,
                other_user,
                SaveContext::new().with_device("tablet").with_session("s2"),
                1,
            ))
            .unwrap();

        let detector = make_detector(&store, base_time());
        let found = detector
            .detect_conflicts(report_id, Some("phone"), Some("s1"))
            .unwrap()
            .unwrap();
        assert_eq!(found.user_display_name.as_deref(), Some("Sarah Chen"));
    }

    #[test]
    fn test_unknown_user_yields_no_display_name() {
        let store = Arc::new(MemoryStore::new());
        let report_id = Uuid::now_v7();
        store
            .checkpoint_insert(&make_checkpoint(
                report_id,
                Uuid::now_v7(),
                SaveContext::new().with_device("tablet").with_session("s2"),
                1,
            ))
            .unwrap();

        let detector = make_detector(&store, base_time());
        let found = detector
            .detect_conflicts(report_id, Some("phone"), Some("s1"))
            .unwrap()
            .unwrap();
        assert_eq!(found.user_display_name, None);
    }
}
