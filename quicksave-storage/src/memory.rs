//! In-memory storage backend
//!
//! Thread-safe maps behind `RwLock`s. Serves two purposes: the storage double
//! for engine tests, and the executable reference for what a real backend
//! must do (ordering, idempotent deletes, point-write semantics).

use crate::{AuditSink, CheckpointStore, ReportDirectory};
use quicksave_core::{
    AuditEntry, AutosaveError, AutosaveResult, Checkpoint, CheckpointId, ReportId, ReportRef,
    ReportStatus, StorageError, Timestamp, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory implementation of all three storage traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    checkpoints: Arc<RwLock<HashMap<CheckpointId, Checkpoint>>>,
    reports: Arc<RwLock<HashMap<ReportId, ReportRef>>>,
    users: Arc<RwLock<HashMap<UserId, String>>>,
    audit: Arc<RwLock<Vec<AuditEntry>>>,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        if let Ok(mut checkpoints) = self.checkpoints.write() {
            checkpoints.clear();
        }
        if let Ok(mut reports) = self.reports.write() {
            reports.clear();
        }
        if let Ok(mut users) = self.users.write() {
            users.clear();
        }
        if let Ok(mut audit) = self.audit.write() {
            audit.clear();
        }
    }

    /// Seed a report row.
    pub fn report_insert(&self, report: &ReportRef) -> AutosaveResult<()> {
        let mut reports = self
            .reports
            .write()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        reports.insert(report.report_id, report.clone());
        Ok(())
    }

    /// Seed a user display name.
    pub fn user_insert(&self, user_id: UserId, display_name: &str) -> AutosaveResult<()> {
        let mut users = self
            .users
            .write()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        users.insert(user_id, display_name.to_string());
        Ok(())
    }

    /// Count of stored checkpoints across all reports.
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Snapshot of the audit log, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.read().map(|a| a.clone()).unwrap_or_default()
    }
}

// Newest first: created_at descending, checkpoint id (timestamp-sortable)
// breaking ties so the order is total even under a fixed test clock.
fn sort_newest_first(checkpoints: &mut [Checkpoint]) {
    checkpoints.sort_by(|a, b| {
        (b.created_at, b.checkpoint_id).cmp(&(a.created_at, a.checkpoint_id))
    });
}

impl CheckpointStore for MemoryStore {
    fn checkpoint_insert(&self, checkpoint: &Checkpoint) -> AutosaveResult<()> {
        let mut checkpoints = self
            .checkpoints
            .write()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        if checkpoints.contains_key(&checkpoint.checkpoint_id) {
            return Err(AutosaveError::Storage(StorageError::Backend {
                operation: "checkpoint_insert".to_string(),
                reason: "already exists".to_string(),
            }));
        }
        checkpoints.insert(checkpoint.checkpoint_id, checkpoint.clone());
        Ok(())
    }

    fn checkpoint_get(&self, id: CheckpointId) -> AutosaveResult<Option<Checkpoint>> {
        let checkpoints = self
            .checkpoints
            .read()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        Ok(checkpoints.get(&id).cloned())
    }

    fn checkpoint_latest(&self, report_id: ReportId) -> AutosaveResult<Option<Checkpoint>> {
        let checkpoints = self
            .checkpoints
            .read()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        Ok(checkpoints
            .values()
            .filter(|c| c.report_id == report_id)
            .max_by_key(|c| (c.created_at, c.checkpoint_id))
            .cloned())
    }

    fn checkpoint_list_for_report(&self, report_id: ReportId) -> AutosaveResult<Vec<Checkpoint>> {
        let checkpoints = self
            .checkpoints
            .read()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        let mut rows: Vec<Checkpoint> = checkpoints
            .values()
            .filter(|c| c.report_id == report_id)
            .cloned()
            .collect();
        sort_newest_first(&mut rows);
        Ok(rows)
    }

    fn checkpoint_mark_recovered(&self, id: CheckpointId, at: Timestamp) -> AutosaveResult<()> {
        let mut checkpoints = self
            .checkpoints
            .write()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        let checkpoint =
            checkpoints
                .get_mut(&id)
                .ok_or(AutosaveError::Storage(StorageError::Backend {
                    operation: "checkpoint_mark_recovered".to_string(),
                    reason: format!("no such checkpoint: {}", id),
                }))?;
        checkpoint.recovered_from = true;
        checkpoint.recovered_at = Some(at);
        Ok(())
    }

    fn checkpoint_delete(&self, id: CheckpointId) -> AutosaveResult<()> {
        let mut checkpoints = self
            .checkpoints
            .write()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        checkpoints.remove(&id);
        Ok(())
    }

    fn checkpoint_list_expired(&self, now: Timestamp) -> AutosaveResult<Vec<Checkpoint>> {
        let checkpoints = self
            .checkpoints
            .read()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        let mut rows: Vec<Checkpoint> = checkpoints
            .values()
            .filter(|c| c.expires_at < now)
            .cloned()
            .collect();
        // Oldest first so sweeps drop the stalest rows before any cutoff.
        rows.sort_by_key(|c| (c.created_at, c.checkpoint_id));
        Ok(rows)
    }
}

impl ReportDirectory for MemoryStore {
    fn report_get(&self, report_id: ReportId) -> AutosaveResult<Option<ReportRef>> {
        let reports = self
            .reports
            .read()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        Ok(reports.get(&report_id).cloned())
    }

    fn report_record_autosave(
        &self,
        report_id: ReportId,
        checkpoint_id: CheckpointId,
        at: Timestamp,
    ) -> AutosaveResult<()> {
        let mut reports = self
            .reports
            .write()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        let report =
            reports
                .get_mut(&report_id)
                .ok_or(AutosaveError::Storage(StorageError::Backend {
                    operation: "report_record_autosave".to_string(),
                    reason: format!("no such report: {}", report_id),
                }))?;
        report.last_autosave = Some(checkpoint_id);
        report.last_autosave_at = Some(at);
        if report.status == ReportStatus::Draft {
            report.status = ReportStatus::InProgress;
        }
        Ok(())
    }

    fn user_display_name(&self, user_id: UserId) -> AutosaveResult<Option<String>> {
        let users = self
            .users
            .read()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        Ok(users.get(&user_id).cloned())
    }
}

impl AuditSink for MemoryStore {
    fn audit_append(&self, entry: AuditEntry) -> AutosaveResult<()> {
        let mut audit = self
            .audit
            .write()
            .map_err(|_| AutosaveError::Storage(StorageError::LockPoisoned))?;
        audit.push(entry);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use quicksave_core::{compute_content_hash, new_checkpoint_id, SaveContext};
    use uuid::Uuid;

    fn base_time() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn make_test_checkpoint(report_id: ReportId, minutes: i64) -> Checkpoint {
        let created_at = base_time() + Duration::minutes(minutes);
        let blob = format!("blob-{}", minutes).into_bytes();
        let hash = compute_content_hash(&blob);
        Checkpoint::new(
            new_checkpoint_id(),
            report_id,
            Uuid::now_v7(),
            SaveContext::new().with_device("phone").with_session("s1"),
            blob,
            hash,
            created_at,
            created_at + Duration::days(7),
        )
    }

    #[test]
    fn test_insert_then_get_roundtrip() {
        let store = MemoryStore::new();
        let checkpoint = make_test_checkpoint(Uuid::now_v7(), 0);

        store.checkpoint_insert(&checkpoint).unwrap();
        let retrieved = store.checkpoint_get(checkpoint.checkpoint_id).unwrap();

        assert_eq!(retrieved, Some(checkpoint));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = MemoryStore::new();
        assert_eq!(store.checkpoint_get(Uuid::now_v7()).unwrap(), None);
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let store = MemoryStore::new();
        let checkpoint = make_test_checkpoint(Uuid::now_v7(), 0);

        store.checkpoint_insert(&checkpoint).unwrap();
        let err = store.checkpoint_insert(&checkpoint).unwrap_err();
        assert!(matches!(
            err,
            AutosaveError::Storage(StorageError::Backend { .. })
        ));
    }

    #[test]
    fn test_latest_picks_newest_for_report() {
        let store = MemoryStore::new();
        let report_id = Uuid::now_v7();
        let other_report = Uuid::now_v7();

        store
            .checkpoint_insert(&make_test_checkpoint(report_id, 0))
            .unwrap();
        let newest = make_test_checkpoint(report_id, 10);
        store.checkpoint_insert(&newest).unwrap();
        store
            .checkpoint_insert(&make_test_checkpoint(report_id, 5))
            .unwrap();
        store
            .checkpoint_insert(&make_test_checkpoint(other_report, 60))
            .unwrap();

        let latest = store.checkpoint_latest(report_id).unwrap().unwrap();
        assert_eq!(latest.checkpoint_id, newest.checkpoint_id);
    }

    #[test]
    fn test_latest_breaks_created_at_ties_by_id() {
        let store = MemoryStore::new();
        let report_id = Uuid::now_v7();

        // Same timestamp; UUIDv7 ids still order the two writes.
        let first = make_test_checkpoint(report_id, 0);
        let second = make_test_checkpoint(report_id, 0);
        store.checkpoint_insert(&first).unwrap();
        store.checkpoint_insert(&second).unwrap();

        let latest = store.checkpoint_latest(report_id).unwrap().unwrap();
        let expected = first.checkpoint_id.max(second.checkpoint_id);
        assert_eq!(latest.checkpoint_id, expected);
    }

    #[test]
    fn test_list_for_report_is_newest_first() {
        let store = MemoryStore::new();
        let report_id = Uuid::now_v7();
        for minutes in [3, 0, 8, 5] {
            store
                .checkpoint_insert(&make_test_checkpoint(report_id, minutes))
                .unwrap();
        }

        let rows = store.checkpoint_list_for_report(report_id).unwrap();
        assert_eq!(rows.len(), 4);
        for pair in rows.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[test]
    fn test_mark_recovered_flips_flag_and_stamps_time() {
        let store = MemoryStore::new();
        let checkpoint = make_test_checkpoint(Uuid::now_v7(), 0);
        store.checkpoint_insert(&checkpoint).unwrap();

        let first_at = base_time() + Duration::hours(1);
        store
            .checkpoint_mark_recovered(checkpoint.checkpoint_id, first_at)
            .unwrap();
        let row = store
            .checkpoint_get(checkpoint.checkpoint_id)
            .unwrap()
            .unwrap();
        assert!(row.recovered_from);
        assert_eq!(row.recovered_at, Some(first_at));

        // Idempotent; a later recovery just refreshes the timestamp.
        let second_at = first_at + Duration::hours(2);
        store
            .checkpoint_mark_recovered(checkpoint.checkpoint_id, second_at)
            .unwrap();
        let row = store
            .checkpoint_get(checkpoint.checkpoint_id)
            .unwrap()
            .unwrap();
        assert!(row.recovered_from);
        assert_eq!(row.recovered_at, Some(second_at));
    }

    #[test]
    fn test_mark_recovered_missing_is_storage_error() {
        let store = MemoryStore::new();
        let err = store
            .checkpoint_mark_recovered(Uuid::now_v7(), base_time())
            .unwrap_err();
        assert!(matches!(
            err,
            AutosaveError::Storage(StorageError::Backend { .. })
        ));
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let store = MemoryStore::new();
        store.checkpoint_delete(Uuid::now_v7()).unwrap();
    }

    #[test]
    fn test_delete_removes_row() {
        let store = MemoryStore::new();
        let checkpoint = make_test_checkpoint(Uuid::now_v7(), 0);
        store.checkpoint_insert(&checkpoint).unwrap();

        store.checkpoint_delete(checkpoint.checkpoint_id).unwrap();
        assert_eq!(
            store.checkpoint_get(checkpoint.checkpoint_id).unwrap(),
            None
        );
        assert_eq!(store.checkpoint_count(), 0);
    }

    #[test]
    fn test_list_expired_filters_by_deadline() {
        let store = MemoryStore::new();
        let report_id = Uuid::now_v7();

        let mut stale = make_test_checkpoint(report_id, 0);
        stale.expires_at = base_time() + Duration::days(1);
        store.checkpoint_insert(&stale).unwrap();

        let mut fresh = make_test_checkpoint(report_id, 10);
        fresh.expires_at = base_time() + Duration::days(14);
        store.checkpoint_insert(&fresh).unwrap();

        let expired = store
            .checkpoint_list_expired(base_time() + Duration::days(7))
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].checkpoint_id, stale.checkpoint_id);
    }

    #[test]
    fn test_record_autosave_sets_pointer_and_bumps_draft() {
        let store = MemoryStore::new();
        let report_id = Uuid::now_v7();
        store
            .report_insert(&ReportRef::new(report_id, ReportStatus::Draft))
            .unwrap();

        let checkpoint_id = new_checkpoint_id();
        let at = base_time();
        store
            .report_record_autosave(report_id, checkpoint_id, at)
            .unwrap();

        let report = store.report_get(report_id).unwrap().unwrap();
        assert_eq!(report.last_autosave, Some(checkpoint_id));
        assert_eq!(report.last_autosave_at, Some(at));
        assert_eq!(report.status, ReportStatus::InProgress);
    }

    #[test]
    fn test_record_autosave_leaves_non_draft_status_alone() {
        let store = MemoryStore::new();
        let report_id = Uuid::now_v7();
        store
            .report_insert(&ReportRef::new(report_id, ReportStatus::InProgress))
            .unwrap();

        store
            .report_record_autosave(report_id, new_checkpoint_id(), base_time())
            .unwrap();
        let report = store.report_get(report_id).unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::InProgress);
    }

    #[test]
    fn test_record_autosave_missing_report_is_storage_error() {
        let store = MemoryStore::new();
        let err = store
            .report_record_autosave(Uuid::now_v7(), new_checkpoint_id(), base_time())
            .unwrap_err();
        assert!(matches!(
            err,
            AutosaveError::Storage(StorageError::Backend { .. })
        ));
    }

    #[test]
    fn test_user_display_name_lookup() {
        let store = MemoryStore::new();
        let user_id = Uuid::now_v7();
        store.user_insert(user_id, "Dana Okafor").unwrap();

        assert_eq!(
            store.user_display_name(user_id).unwrap().as_deref(),
            Some("Dana Okafor")
        );
        assert_eq!(store.user_display_name(Uuid::now_v7()).unwrap(), None);
    }

    #[test]
    fn test_audit_append_collects_in_order() {
        let store = MemoryStore::new();
        let report_id = Uuid::now_v7();
        let user_id = Uuid::now_v7();

        store
            .audit_append(AuditEntry::autosaved(
                report_id,
                user_id,
                new_checkpoint_id(),
                10.0,
                base_time(),
            ))
            .unwrap();
        store
            .audit_append(AuditEntry::recovered(
                report_id,
                user_id,
                new_checkpoint_id(),
                base_time() + Duration::minutes(1),
            ))
            .unwrap();

        let entries = store.audit_entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].created_at <= entries[1].created_at);
    }

    #[test]
    fn test_clear_empties_every_table() {
        let store = MemoryStore::new();
        let report_id = Uuid::now_v7();
        store
            .report_insert(&ReportRef::new(report_id, ReportStatus::Draft))
            .unwrap();
        store
            .checkpoint_insert(&make_test_checkpoint(report_id, 0))
            .unwrap();

        store.clear();
        assert_eq!(store.checkpoint_count(), 0);
        assert_eq!(store.report_get(report_id).unwrap(), None);
    }
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================
