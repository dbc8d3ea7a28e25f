//! Monitored resource records and the change log entries attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tracked URL and its persisted tracking state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoredResource {
    /// Opaque, stable identifier used as the update key
    pub id: String,

    /// Target address
    pub url: String,

    /// Case-folded keywords not yet observed in the page
    #[serde(default)]
    pub pending_keywords: Vec<String>,

    /// Keywords already observed, in the order they were found
    #[serde(default)]
    pub found_keywords: Vec<FoundKeyword>,

    /// Last observed normalized page text (empty means no baseline yet)
    #[serde(default)]
    pub reference_text: String,

    /// Append-only log of detected changes
    #[serde(default)]
    pub update_log: Vec<Change>,

    /// Notification target; `None` suppresses delivery but not detection
    #[serde(default)]
    pub recipient_id: Option<String>,

    /// Send full change listings instead of a short notice
    #[serde(default)]
    pub send_detailed_updates: bool,

    /// Run sentence/word diffing for this resource
    #[serde(default)]
    pub check_updates: bool,

    /// Keep monitoring after every keyword was found
    #[serde(default = "default_true")]
    pub continue_after_all_found: bool,

    /// Whether a content change was diffed at least once
    #[serde(default)]
    pub is_updated: bool,

    /// Terminal flag; completed resources are skipped by every cycle
    #[serde(default)]
    pub completed: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MonitoredResource {
    fn default() -> Self {
        Self {
            id: String::new(),
            url: String::new(),
            pending_keywords: Vec::new(),
            found_keywords: Vec::new(),
            reference_text: String::new(),
            update_log: Vec::new(),
            recipient_id: None,
            send_detailed_updates: false,
            check_updates: false,
            continue_after_all_found: default_true(),
            is_updated: false,
            completed: false,
        }
    }
}

impl MonitoredResource {
    /// Create a resource with no keywords, no baseline and default flags.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            ..Self::default()
        }
    }
}

/// A keyword together with the time it was first observed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FoundKeyword {
    pub keyword: String,
    pub found_at: DateTime<Utc>,
}

/// Kind of textual change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Added,
    Removed,
}

impl ChangeAction {
    /// Lower-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Added => "added",
            ChangeAction::Removed => "removed",
        }
    }

    /// Capitalized label used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeAction::Added => "Added",
            ChangeAction::Removed => "Removed",
        }
    }
}

/// One detected textual change within one sentence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Change {
    /// Changed words, space-joined in sentence order
    pub changed_text: String,

    pub action: ChangeAction,

    /// Surrounding words with the changed ones marked
    pub context: String,

    pub observed_at: DateTime<Utc>,
}

/// Whole-record update proposal.
///
/// Every field is optional: `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ResourceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_keywords: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_keywords: Option<Vec<FoundKeyword>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_log: Option<Vec<Change>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_updated: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl ResourceUpdate {
    /// True when no field was staged.
    pub fn is_empty(&self) -> bool {
        self.reference_text.is_none()
            && self.pending_keywords.is_none()
            && self.found_keywords.is_none()
            && self.update_log.is_none()
            && self.is_updated.is_none()
            && self.completed.is_none()
    }

    /// Apply staged fields to a full record.
    ///
    /// `completed` never reverts from `true`.
    pub fn apply_to(&self, resource: &mut MonitoredResource) {
        if let Some(text) = &self.reference_text {
            resource.reference_text = text.clone();
        }
        if let Some(pending) = &self.pending_keywords {
            resource.pending_keywords = pending.clone();
        }
        if let Some(found) = &self.found_keywords {
            resource.found_keywords = found.clone();
        }
        if let Some(log) = &self.update_log {
            resource.update_log = log.clone();
        }
        if let Some(updated) = self.is_updated {
            resource.is_updated = updated;
        }
        if let Some(completed) = self.completed {
            resource.completed |= completed;
        }
    }
}
