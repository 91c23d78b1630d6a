//! Enum types for Quicksave entities

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CORE ENUMS
// ============================================================================

/// Lifecycle status of a report, as seen through the report directory.
/// The engine never advances a report past `InProgress`; completing and
/// archiving belong to the reporting subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Draft,
    InProgress,
    Completed,
    Archived,
}

impl ReportStatus {
    /// Terminal reports no longer accept autosaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::Archived)
    }
}

/// How two divergent report states are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// The caller's state wins verbatim.
    LocalWins,
    /// The other side's state wins verbatim.
    RemoteWins,
    /// Field-aware merge that never drops either side's work.
    #[default]
    Merge,
}

/// Action recorded in a report's external history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Autosaved,
    Recovered,
    ConflictResolved,
}

// ============================================================================
// DISPLAY / FROMSTR
// ============================================================================

/// Normalize a token for case- and separator-insensitive parsing.
fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ReportStatus::Draft => "draft",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Completed => "completed",
            ReportStatus::Archived => "archived",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_token(s);
        match normalized.as_str() {
            "draft" => Ok(ReportStatus::Draft),
            "inprogress" => Ok(ReportStatus::InProgress),
            "completed" => Ok(ReportStatus::Completed),
            "archived" => Ok(ReportStatus::Archived),
            _ => Err(format!("Invalid ReportStatus: {}", s)),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            MergeStrategy::LocalWins => "local_wins",
            MergeStrategy::RemoteWins => "remote_wins",
            MergeStrategy::Merge => "merge",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for MergeStrategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_token(s);
        match normalized.as_str() {
            "localwins" | "local" => Ok(MergeStrategy::LocalWins),
            "remotewins" | "remote" => Ok(MergeStrategy::RemoteWins),
            "merge" => Ok(MergeStrategy::Merge),
            _ => Err(ValidationError::UnknownStrategy {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AuditAction::Autosaved => "autosaved",
            AuditAction::Recovered => "recovered",
            AuditAction::ConflictResolved => "conflict_resolved",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_token(s);
        match normalized.as_str() {
            "autosaved" => Ok(AuditAction::Autosaved),
            "recovered" => Ok(AuditAction::Recovered),
            "conflictresolved" => Ok(AuditAction::ConflictResolved),
            _ => Err(format!("Invalid AuditAction: {}", s)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
