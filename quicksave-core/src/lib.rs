//! Quicksave Core - Entity Types
//!
//! Pure data structures with no behavior beyond derivation helpers. All other
//! crates depend on this. This crate contains the typed report-state document,
//! the checkpoint entity, and the error taxonomy - no storage, no I/O.

pub mod document;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;

pub use document::{AttachmentRef, ChecklistAnswer, ReportState};
pub use entities::{
    AuditEntry, AutosaveStats, Checkpoint, CheckpointSummary, ReportRef, SaveContext,
};
pub use enums::{AuditAction, MergeStrategy, ReportStatus};
pub use error::{
    AutosaveError, AutosaveResult, ConfigError, NotFoundError, StorageError, ValidationError,
};
pub use identity::{
    compute_content_hash, encode_hash, new_checkpoint_id, CheckpointId, ContentHash, RawContent,
    ReportId, Timestamp, UserId,
};
