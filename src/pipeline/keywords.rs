//! Keyword tracking.
//!
//! Pending keywords are matched against the normalized page text by plain
//! substring containment. A keyword moves from the pending list to the found
//! log exactly once.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::FoundKeyword;

/// Result of matching the pending keywords against one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordScan {
    /// Keywords still pending after this scan, in original order
    pub pending: Vec<String>,

    /// Keywords found during this scan, in match order
    pub newly_found: Vec<String>,

    /// The full found log: previous entries followed by the new ones
    pub found_log: Vec<FoundKeyword>,

    /// Whether the pending list changed (keywords found or stale ones dropped)
    pub changed: bool,

    /// Whether monitoring should stop for this resource
    pub completed: bool,
}

/// Matches pending keywords and decides completion.
#[derive(Debug, Clone, Copy)]
pub struct KeywordTracker {
    continue_after_all_found: bool,
}

impl KeywordTracker {
    pub fn new(continue_after_all_found: bool) -> Self {
        Self {
            continue_after_all_found,
        }
    }

    /// Match `pending` against `text`.
    ///
    /// `pending` is expected case-folded; `text` normalized. Every keyword found
    /// in this scan shares the same `found_at`.
    pub fn track(
        &self,
        pending: &[String],
        found: &[FoundKeyword],
        text: &str,
        found_at: DateTime<Utc>,
    ) -> KeywordScan {
        let mut already_found: HashSet<&str> = found.iter().map(|f| f.keyword.as_str()).collect();
        let mut remaining = Vec::with_capacity(pending.len());
        let mut newly_found = Vec::new();
        let mut changed = false;

        for keyword in pending {
            if already_found.contains(keyword.as_str()) {
                // Found earlier (or listed twice); never log it again.
                log::debug!("Dropping already-found keyword '{}'", keyword);
                changed = true;
                continue;
            }
            if text.contains(keyword.as_str()) {
                already_found.insert(keyword.as_str());
                newly_found.push(keyword.clone());
                changed = true;
            } else {
                remaining.push(keyword.clone());
            }
        }

        let mut found_log = found.to_vec();
        found_log.extend(newly_found.iter().map(|keyword| FoundKeyword {
            keyword: keyword.clone(),
            found_at,
        }));

        let completed = !pending.is_empty() && remaining.is_empty() && !self.continue_after_all_found;

        KeywordScan {
            pending: remaining,
            newly_found,
            found_log,
            changed,
            completed,
        }
    }
}
