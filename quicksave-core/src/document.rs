//! Typed report-state document
//!
//! The state blob a client autosaves is a structured document. The engine
//! models the five top-level keys it must inspect (`items`, `images`,
//! `voice_memos`, `staff_notes`, `completion_percentage`) as real types and
//! preserves every other top-level field verbatim in an extras bag, so merge
//! logic operates on types while callers stay free to add fields.

use crate::error::ValidationError;
use crate::identity::{RawContent, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One checklist entry as serialized by the client form.
///
/// An entry is *answered* when it has a non-empty response value, a non-empty
/// free-text answer, or an explicit not-applicable flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChecklistAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,

    #[serde(default)]
    pub is_na: bool,

    /// When the inspector answered this entry. Used by the merge engine for
    /// per-item latest-wins; a missing timestamp loses against any present one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<Timestamp>,
}

impl ChecklistAnswer {
    pub fn is_answered(&self) -> bool {
        self.is_na
            || self
                .response_value
                .as_deref()
                .map_or(false, |v| !v.is_empty())
            || self
                .response_text
                .as_deref()
                .map_or(false, |v| !v.is_empty())
    }
}

/// Reference to an attached media file (image or voice memo).
/// Identity for merge deduplication is the `uri`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<Timestamp>,
}

impl AttachmentRef {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            label: None,
            captured_at: None,
        }
    }
}

/// The full form state of a report at one instant.
///
/// `BTreeMap` keys and fixed field order make serialization canonical: equal
/// documents always produce equal bytes, which is what content-hash
/// deduplication relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReportState {
    /// Checklist answers keyed by checklist item id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub items: BTreeMap<String, ChecklistAnswer>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<AttachmentRef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub voice_memos: Vec<AttachmentRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_notes: Option<String>,

    /// Client-claimed progress. The checkpoint writer recomputes from `items`
    /// and its value is the authoritative one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_percentage: Option<f64>,

    /// Every other top-level field, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ReportState {
    /// Parse and validate a caller-supplied document. Rejects anything that
    /// is not a JSON object or whose known keys are structurally malformed,
    /// before any hashing or persistence happens.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        if !value.is_object() {
            return Err(ValidationError::MalformedState {
                reason: "state must be a JSON object".to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| ValidationError::MalformedState {
            reason: e.to_string(),
        })
    }

    /// Stable serialization of the document. Two equal documents always
    /// canonicalize to identical bytes regardless of the key order the
    /// caller sent.
    pub fn canonical_bytes(&self) -> Result<RawContent, ValidationError> {
        serde_json::to_vec(self).map_err(|e| ValidationError::MalformedState {
            reason: e.to_string(),
        })
    }

    /// Count of answered checklist entries.
    pub fn answered_items(&self) -> u32 {
        self.items.values().filter(|a| a.is_answered()).count() as u32
    }

    /// Progress as a percentage of the checklist entries the caller's form
    /// serialized, rounded to two decimals. A document with no checklist
    /// entries is 0% complete.
    pub fn completion(&self) -> f64 {
        if self.items.is_empty() {
            return 0.0;
        }
        let pct = (self.answered_items() as f64 / self.items.len() as f64) * 100.0;
        (pct * 100.0).round() / 100.0
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_answer(value: &str) -> ChecklistAnswer {
        ChecklistAnswer {
            response_value: Some(value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_from_value_parses_known_keys() {
        let state = ReportState::from_value(json!({
            "items": {
                "12": {"response_value": "pass", "answered_at": "2026-03-01T10:00:00Z"},
                "13": {"response_text": "cracked tile near entrance"}
            },
            "images": [{"uri": "uploads/a.jpg", "label": "entrance"}],
            "voice_memos": [],
            "staff_notes": "needs follow-up",
            "completion_percentage": 40.0
        }))
        .unwrap();

        assert_eq!(state.items.len(), 2);
        assert_eq!(state.images.len(), 1);
        assert!(state.voice_memos.is_empty());
        assert_eq!(state.staff_notes.as_deref(), Some("needs follow-up"));
        assert_eq!(state.completion_percentage, Some(40.0));
    }

    #[test]
    fn test_from_value_preserves_extra_fields() {
        let state = ReportState::from_value(json!({
            "items": {},
            "inspector_signature": "J. Alvarez",
            "weather": {"temp_c": 11, "rain": true}
        }))
        .unwrap();

        assert_eq!(
            state.extra.get("inspector_signature"),
            Some(&json!("J. Alvarez"))
        );
        assert_eq!(state.extra.get("weather"), Some(&json!({"temp_c": 11, "rain": true})));
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        let err = ReportState::from_value(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedState { .. }));

        let err = ReportState::from_value(json!("just a string")).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedState { .. }));
    }

    #[test]
    fn test_from_value_rejects_malformed_items() {
        // Items must be keyed by checklist item id, not a bare list.
        let err = ReportState::from_value(json!({"items": [1, 2]})).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedState { .. }));
    }

    #[test]
    fn test_canonical_bytes_ignore_caller_key_order() {
        let a = ReportState::from_value(json!({
            "staff_notes": "n",
            "items": {"2": {"response_value": "x"}, "1": {"response_value": "y"}}
        }))
        .unwrap();
        let b = ReportState::from_value(json!({
            "items": {"1": {"response_value": "y"}, "2": {"response_value": "x"}},
            "staff_notes": "n"
        }))
        .unwrap();

        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    }

    #[test]
    fn test_canonical_bytes_treat_absent_and_empty_alike() {
        let explicit = ReportState::from_value(json!({"items": {}, "images": []})).unwrap();
        let implicit = ReportState::from_value(json!({})).unwrap();
        assert_eq!(
            explicit.canonical_bytes().unwrap(),
            implicit.canonical_bytes().unwrap()
        );
    }

    #[test]
    fn test_answered_requires_content_or_na_flag() {
        assert!(make_answer("pass").is_answered());
        assert!(!make_answer("").is_answered());

        let text_only = ChecklistAnswer {
            response_text: Some("notes".to_string()),
            ..Default::default()
        };
        assert!(text_only.is_answered());

        let na_only = ChecklistAnswer {
            is_na: true,
            ..Default::default()
        };
        assert!(na_only.is_answered());

        assert!(!ChecklistAnswer::default().is_answered());
    }

    #[test]
    fn test_completion_of_empty_checklist_is_zero() {
        assert_eq!(ReportState::default().completion(), 0.0);
    }

    #[test]
    fn test_completion_counts_answered_entries() {
        let mut state = ReportState::default();
        state.items.insert("1".to_string(), make_answer("pass"));
        state.items.insert("2".to_string(), make_answer(""));
        state.items.insert("3".to_string(), make_answer("fail"));
        state.items.insert("4".to_string(), ChecklistAnswer::default());

        assert_eq!(state.answered_items(), 2);
        assert_eq!(state.completion(), 50.0);
    }

    #[test]
    fn test_completion_rounds_to_two_decimals() {
        let mut state = ReportState::default();
        state.items.insert("1".to_string(), make_answer("pass"));
        state.items.insert("2".to_string(), ChecklistAnswer::default());
        state.items.insert("3".to_string(), ChecklistAnswer::default());

        // 1/3 of the checklist answered.
        assert_eq!(state.completion(), 33.33);
    }

    #[test]
    fn test_roundtrip_through_canonical_bytes() {
        let state = ReportState::from_value(json!({
            "items": {"7": {"is_na": true}},
            "voice_memos": [{"uri": "memos/m1.ogg"}],
            "site_code": "B-110"
        }))
        .unwrap();

        let bytes = state.canonical_bytes().unwrap();
        let back: ReportState = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, state);
    }
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================
