// src/pipeline/process.rs

//! One monitoring cycle for one resource.
//!
//! ```text
//! Skipped(Completed) / Skipped(NoWorkNeeded)
//!   or
//! Fetched -> KeywordsEvaluated -> DiffEvaluated -> Persisted
//! ```
//!
//! Keyword evaluation always precedes diffing, and the single store write is
//! the last step. Every per-resource failure is contained here.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::{MonitoredResource, ResourceUpdate, SentenceAlignment};
use crate::pipeline::diff::ChangeAggregator;
use crate::pipeline::format;
use crate::pipeline::keywords::KeywordTracker;
use crate::pipeline::text;
use crate::services::{Channel, Notifier, PageFetcher};
use crate::storage::ResourceStore;

/// Why a resource was not fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The resource reached its terminal state in an earlier cycle
    Completed,
    /// No pending keywords and diffing disabled
    NoWorkNeeded,
}

/// Furthest state a resource reached in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Skipped(SkipReason),
    Fetched,
    KeywordsEvaluated,
    DiffEvaluated,
    Persisted,
}

/// Outcome of processing one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub state: ResourceState,
    /// Keywords newly found this cycle
    pub keywords_found: Vec<String>,
    /// Number of change records appended this cycle
    pub changes: usize,
    /// Whether the resource was marked completed this cycle
    pub completed: bool,
    /// Whether a staged update failed to persist
    pub write_failed: bool,
}

impl ProcessReport {
    fn new(state: ResourceState) -> Self {
        Self {
            state,
            keywords_found: Vec::new(),
            changes: 0,
            completed: false,
            write_failed: false,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.state, ResourceState::Skipped(_))
    }
}

/// Runs the per-resource state machine against injected capabilities.
pub struct ResourceProcessor {
    fetcher: Arc<dyn PageFetcher>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn ResourceStore>,
    aggregator: ChangeAggregator,
}

impl ResourceProcessor {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn ResourceStore>,
        alignment: SentenceAlignment,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            store,
            aggregator: ChangeAggregator::new(alignment),
        }
    }

    /// Process one resource. Never fails; problems are logged and reported.
    pub async fn process(&self, resource: &MonitoredResource) -> ProcessReport {
        if resource.completed {
            log::info!("Skipping completed check for URL: {}", resource.url);
            return ProcessReport::new(ResourceState::Skipped(SkipReason::Completed));
        }

        let pending = text::normalize_keywords(&resource.pending_keywords);
        if pending.is_empty() && !resource.check_updates {
            log::info!(
                "Skipping {} - no keywords and change checks disabled",
                resource.url
            );
            return ProcessReport::new(ResourceState::Skipped(SkipReason::NoWorkNeeded));
        }

        let new_text = text::normalize(&self.fetcher.fetch_rendered_text(&resource.url).await);
        let now = Utc::now();
        let mut report = ProcessReport::new(ResourceState::Fetched);
        let mut update = ResourceUpdate::default();

        if !pending.is_empty() {
            self.evaluate_keywords(resource, &pending, &new_text, now, &mut update, &mut report)
                .await;
        }

        if resource.check_updates {
            self.evaluate_changes(resource, &new_text, now, &mut update, &mut report)
                .await;
        }

        if new_text != resource.reference_text {
            update.reference_text = Some(new_text);
        }

        if update.is_empty() {
            log::debug!("Nothing to persist for {}", resource.url);
            return report;
        }

        match self.store.update_resource(&resource.id, &update).await {
            Ok(()) => {
                log::info!("Updated record for URL: {}", resource.url);
                report.state = ResourceState::Persisted;
            }
            Err(e) => {
                log::error!("Failed to persist resource {} ({}): {}", resource.id, resource.url, e);
                report.write_failed = true;
            }
        }

        report
    }

    async fn evaluate_keywords(
        &self,
        resource: &MonitoredResource,
        pending: &[String],
        new_text: &str,
        now: DateTime<Utc>,
        update: &mut ResourceUpdate,
        report: &mut ProcessReport,
    ) {
        let tracker = KeywordTracker::new(resource.continue_after_all_found);
        let scan = tracker.track(pending, &resource.found_keywords, new_text, now);
        report.state = ResourceState::KeywordsEvaluated;

        if !scan.newly_found.is_empty() {
            log::info!("Keywords found on {}: {:?}", resource.url, scan.newly_found);
            let message = format::keyword_found_message(&resource.url, &scan.newly_found, now);
            self.notify(resource, &message, Channel::Primary).await;
        }

        if scan.changed {
            update.pending_keywords = Some(scan.pending);
            update.found_keywords = Some(scan.found_log);
        }

        if scan.completed {
            log::info!(
                "All keywords found for {} and continued checks are off. Marking as completed.",
                resource.url
            );
            update.completed = Some(true);
            report.completed = true;
        }

        report.keywords_found = scan.newly_found;
    }

    async fn evaluate_changes(
        &self,
        resource: &MonitoredResource,
        new_text: &str,
        now: DateTime<Utc>,
        update: &mut ResourceUpdate,
        report: &mut ProcessReport,
    ) {
        let previous = &resource.reference_text;
        if previous.trim().is_empty() || new_text == previous {
            log::debug!(
                "No change detected or no reference to compare against for {}",
                resource.url
            );
            return;
        }

        log::info!("Change detected on {}, comparing sentences", resource.url);
        let changes = self.aggregator.aggregate(previous, new_text, now);
        for change in &changes {
            log::debug!(
                " - [{}] {} at {}",
                change.action.as_str(),
                change.changed_text,
                change.observed_at
            );
        }

        let mut update_log = resource.update_log.clone();
        update_log.extend(changes.iter().cloned());

        let message = if resource.send_detailed_updates {
            format::detailed_update_message(&resource.url, &changes, &update_log)
        } else {
            format::summary_update_message(&resource.url, now)
        };
        self.notify(resource, &message, Channel::Secondary).await;

        report.changes = changes.len();
        report.state = ResourceState::DiffEvaluated;
        update.update_log = Some(update_log);
        update.is_updated = Some(true);
    }

    /// Best-effort delivery; failures are logged and swallowed.
    async fn notify(&self, resource: &MonitoredResource, message: &str, channel: Channel) {
        let Some(recipient) = resource.recipient_id.as_deref() else {
            log::debug!("No recipient for {}, {} notification skipped", resource.url, channel.as_str());
            return;
        };

        if let Err(e) = self.notifier.send_message(recipient, message, channel).await {
            log::warn!(
                "Failed to send {} notification for {}: {}",
                channel.as_str(),
                resource.url,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeAction, FoundKeyword};
    use crate::testing::{MemoryStore, RecordingNotifier, StaticFetcher};

    const URL: &str = "https://example.com/shop";

    struct Harness {
        fetcher: Arc<StaticFetcher>,
        notifier: Arc<RecordingNotifier>,
        store: Arc<MemoryStore>,
        processor: ResourceProcessor,
    }

    fn harness(resource: &MonitoredResource, page: &str) -> Harness {
        harness_with(resource, page, RecordingNotifier::default(), None)
    }

    fn harness_with(
        resource: &MonitoredResource,
        page: &str,
        notifier: RecordingNotifier,
        failing_id: Option<&str>,
    ) -> Harness {
        let fetcher = Arc::new(StaticFetcher::default().with_page(URL, page));
        let notifier = Arc::new(notifier);
        let mut store = MemoryStore::new(vec![resource.clone()]);
        if let Some(id) = failing_id {
            store = store.failing_updates_for(id);
        }
        let store = Arc::new(store);
        let processor = ResourceProcessor::new(
            fetcher.clone(),
            notifier.clone(),
            store.clone(),
            SentenceAlignment::Positional,
        );
        Harness {
            fetcher,
            notifier,
            store,
            processor,
        }
    }

    fn resource() -> MonitoredResource {
        let mut resource = MonitoredResource::new("r1", URL);
        resource.recipient_id = Some("42".into());
        resource
    }

    #[tokio::test]
    async fn test_completed_resource_is_not_fetched() {
        let mut r = resource();
        r.completed = true;
        r.pending_keywords = vec!["sale".into()];
        let h = harness(&r, "big sale today");

        let report = h.processor.process(&r).await;
        assert_eq!(report.state, ResourceState::Skipped(SkipReason::Completed));
        assert!(h.fetcher.requests().is_empty());
        assert!(h.store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_no_work_needed_is_not_fetched() {
        let r = resource();
        let h = harness(&r, "anything");

        let report = h.processor.process(&r).await;
        assert_eq!(report.state, ResourceState::Skipped(SkipReason::NoWorkNeeded));
        assert!(h.fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_sale_found_completes_resource() {
        let mut r = resource();
        r.pending_keywords = vec!["Sale".into()];
        r.continue_after_all_found = false;
        let h = harness(&r, "Big SALE today");

        let report = h.processor.process(&r).await;
        assert_eq!(report.state, ResourceState::Persisted);
        assert_eq!(report.keywords_found, vec!["sale"]);
        assert!(report.completed);

        let stored = h.store.resource("r1").unwrap();
        assert!(stored.pending_keywords.is_empty());
        assert_eq!(stored.found_keywords.len(), 1);
        assert_eq!(stored.found_keywords[0].keyword, "sale");
        assert!(stored.completed);
        assert_eq!(stored.reference_text, "big sale today");

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, Channel::Primary);
        assert_eq!(sent[0].recipient, "42");
        assert!(sent[0].text.contains("<b>Keyword:</b> sale"));
    }

    #[tokio::test]
    async fn test_unmatched_keywords_stay_pending() {
        let mut r = resource();
        r.pending_keywords = vec!["sale".into(), "promo".into()];
        r.reference_text = "nothing here".into();
        let h = harness(&r, "nothing here");

        let report = h.processor.process(&r).await;
        assert_eq!(report.state, ResourceState::KeywordsEvaluated);
        assert!(report.keywords_found.is_empty());
        assert!(h.store.updates().is_empty());
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_found_keyword_is_never_duplicated() {
        let mut r = resource();
        r.pending_keywords = vec!["sale".into(), "promo".into()];
        r.continue_after_all_found = true;
        let h = harness(&r, "sale now on");

        h.processor.process(&r).await;
        let after_first = h.store.resource("r1").unwrap();
        assert_eq!(after_first.pending_keywords, vec!["promo"]);

        // second cycle sees the same page
        let report = h.processor.process(&after_first).await;
        assert!(report.keywords_found.is_empty());

        let after_second = h.store.resource("r1").unwrap();
        let sale_entries = after_second
            .found_keywords
            .iter()
            .filter(|f| f.keyword == "sale")
            .count();
        assert_eq!(sale_entries, 1);
        assert!(!after_second.pending_keywords.contains(&"sale".to_string()));
        assert!(!after_second.completed);
    }

    #[tokio::test]
    async fn test_no_baseline_produces_no_changes() {
        let mut r = resource();
        r.check_updates = true;
        let h = harness(&r, "First version. Of the page.");

        let report = h.processor.process(&r).await;
        assert_eq!(report.changes, 0);
        assert_eq!(report.state, ResourceState::Persisted);

        let stored = h.store.resource("r1").unwrap();
        assert!(stored.update_log.is_empty());
        assert!(!stored.is_updated);
        assert_eq!(stored.reference_text, "first version. of the page.");
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_changed_page_appends_to_update_log() {
        let mut r = resource();
        r.check_updates = true;
        r.send_detailed_updates = true;
        r.reference_text = "the price is 10 dollars. shipping is free.".into();
        r.update_log = vec![crate::models::Change {
            changed_text: "earlier".into(),
            action: ChangeAction::Added,
            context: "<b>earlier</b>".into(),
            observed_at: Utc::now(),
        }];
        let h = harness(&r, "The price is 15 dollars now. Shipping is free.");

        let report = h.processor.process(&r).await;
        assert_eq!(report.state, ResourceState::Persisted);
        assert_eq!(report.changes, 1);

        let stored = h.store.resource("r1").unwrap();
        assert_eq!(stored.update_log.len(), 2);
        assert_eq!(stored.update_log[0].changed_text, "earlier");
        assert!(stored.update_log[1].context.contains("<b>15</b>"));
        assert!(stored.is_updated);
        assert_eq!(stored.reference_text, "the price is 15 dollars now. shipping is free.");

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, Channel::Secondary);
        assert!(sent[0].text.contains("<b>New Changes:</b>"));
        assert!(sent[0].text.contains("<b>Previous Changes:</b>"));
    }

    #[tokio::test]
    async fn test_summary_message_when_details_disabled() {
        let mut r = resource();
        r.check_updates = true;
        r.reference_text = "old text.".into();
        let h = harness(&r, "new text.");

        h.processor.process(&r).await;
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("Detailed updates are available but not shown"));
    }

    #[tokio::test]
    async fn test_keywords_notified_before_changes() {
        let mut r = resource();
        r.check_updates = true;
        r.pending_keywords = vec!["sale".into()];
        r.reference_text = "regular prices.".into();
        let h = harness(&r, "sale prices.");

        h.processor.process(&r).await;
        let channels: Vec<Channel> = h.notifier.sent().iter().map(|m| m.channel).collect();
        assert_eq!(channels, vec![Channel::Primary, Channel::Secondary]);
    }

    #[tokio::test]
    async fn test_unchanged_page_is_not_written() {
        let mut r = resource();
        r.check_updates = true;
        r.reference_text = "same text.".into();
        let h = harness(&r, "Same text.");

        let report = h.processor.process(&r).await;
        assert_eq!(report.state, ResourceState::Fetched);
        assert!(h.store.updates().is_empty());
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_counts_as_empty_content() {
        let mut r = resource();
        r.check_updates = true;
        r.reference_text = "previous content.".into();
        let h = harness(&r, "");

        let report = h.processor.process(&r).await;
        assert_eq!(report.state, ResourceState::Persisted);

        let stored = h.store.resource("r1").unwrap();
        assert_eq!(stored.reference_text, "");
        assert!(stored.is_updated);
    }

    #[tokio::test]
    async fn test_missing_recipient_still_detects() {
        let mut r = resource();
        r.recipient_id = None;
        r.pending_keywords = vec!["sale".into()];
        let h = harness(&r, "sale");

        let report = h.processor.process(&r).await;
        assert_eq!(report.keywords_found, vec!["sale"]);
        assert!(h.notifier.sent().is_empty());
        assert_eq!(h.store.resource("r1").unwrap().found_keywords.len(), 1);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_abort() {
        let mut r = resource();
        r.pending_keywords = vec!["sale".into()];
        let h = harness_with(&r, "sale", RecordingNotifier::failing(), None);

        let report = h.processor.process(&r).await;
        assert_eq!(report.state, ResourceState::Persisted);
        assert!(h.store.resource("r1").unwrap().pending_keywords.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let mut r = resource();
        r.pending_keywords = vec!["sale".into()];
        let h = harness_with(&r, "sale", RecordingNotifier::default(), Some("r1"));

        let report = h.processor.process(&r).await;
        assert!(report.write_failed);
        assert_eq!(report.state, ResourceState::KeywordsEvaluated);
    }

    #[tokio::test]
    async fn test_stale_pending_keyword_is_dropped_quietly() {
        let mut r = resource();
        r.pending_keywords = vec!["sale".into()];
        r.found_keywords = vec![FoundKeyword {
            keyword: "sale".into(),
            found_at: Utc::now(),
        }];
        r.reference_text = "no match".into();
        let h = harness(&r, "no match");

        let report = h.processor.process(&r).await;
        assert!(report.keywords_found.is_empty());
        assert!(h.notifier.sent().is_empty());

        let stored = h.store.resource("r1").unwrap();
        assert!(stored.pending_keywords.is_empty());
        assert_eq!(stored.found_keywords.len(), 1);
    }
}
