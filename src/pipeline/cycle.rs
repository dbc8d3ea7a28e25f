// src/pipeline/cycle.rs

//! Batch cycle over every listed resource.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::models::CycleConfig;
use crate::pipeline::process::{ResourceProcessor, ResourceState};
use crate::services::{Notifier, PageFetcher};
use crate::storage::ResourceStore;

// granularity of the shutdown check while idling between cycles
const IDLE_TICK: Duration = Duration::from_millis(500);

/// Counters for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub listed: usize,
    pub processed: usize,
    pub skipped: usize,
    pub persisted: usize,
    pub write_failures: usize,
    pub keywords_found: usize,
    pub changes_detected: usize,
    pub cancelled: bool,
}

/// Lists resources and processes them one at a time in store order.
pub struct CycleRunner {
    store: Arc<dyn ResourceStore>,
    processor: ResourceProcessor,
    resource_delay: Duration,
    shutdown: Arc<AtomicBool>,
}

impl CycleRunner {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn ResourceStore>,
        config: &CycleConfig,
    ) -> Self {
        let processor =
            ResourceProcessor::new(fetcher, notifier, store.clone(), config.alignment);
        Self {
            store,
            processor,
            resource_delay: Duration::from_millis(config.resource_delay_ms),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the runner before the next resource once set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run a single cycle.
    ///
    /// Only a listing failure is returned as an error; per-resource problems
    /// are contained by the processor.
    pub async fn run_once(&self) -> Result<CycleSummary> {
        let start_time = Utc::now();
        log::info!("Starting check cycle at {}", start_time);

        let resources = self.store.list_active_resources().await?;
        let mut summary = CycleSummary {
            listed: resources.len(),
            ..CycleSummary::default()
        };
        log::info!("Fetched {} URLs to check", resources.len());

        for (idx, resource) in resources.iter().enumerate() {
            if self.is_shutdown() {
                log::warn!(
                    "Shutdown requested, {} resources left unprocessed",
                    resources.len() - idx
                );
                summary.cancelled = true;
                break;
            }

            log::info!("Checking URL: {}", resource.url);
            let report = self.processor.process(resource).await;

            if report.is_skipped() {
                summary.skipped += 1;
            } else {
                summary.processed += 1;
            }
            if report.state == ResourceState::Persisted {
                summary.persisted += 1;
            }
            if report.write_failed {
                summary.write_failures += 1;
            }
            summary.keywords_found += report.keywords_found.len();
            summary.changes_detected += report.changes;

            if idx + 1 < resources.len() && !self.resource_delay.is_zero() {
                tokio::time::sleep(self.resource_delay).await;
            }
        }

        let elapsed = Utc::now() - start_time;
        log::info!(
            "Cycle finished in {}ms: {} processed, {} skipped, {} persisted, {} write failures",
            elapsed.num_milliseconds(),
            summary.processed,
            summary.skipped,
            summary.persisted,
            summary.write_failures
        );

        Ok(summary)
    }

    /// Repeat cycles every `interval` until shutdown.
    ///
    /// Listing failures are logged and the next cycle is attempted as usual.
    pub async fn run_forever(&self, interval: Duration) -> Vec<CycleSummary> {
        let mut summaries = Vec::new();

        while !self.is_shutdown() {
            match self.run_once().await {
                Ok(summary) => summaries.push(summary),
                Err(e) => log::error!("Check cycle failed: {}", e),
            }

            if self.is_shutdown() {
                break;
            }
            log::info!("Next check in {}s", interval.as_secs());
            self.idle(interval).await;
        }

        log::info!("Watcher stopped after {} cycles", summaries.len());
        summaries
    }

    async fn idle(&self, interval: Duration) {
        let mut remaining = interval;
        while !remaining.is_zero() && !self.is_shutdown() {
            let tick = remaining.min(IDLE_TICK);
            tokio::time::sleep(tick).await;
            remaining -= tick;
        }
    }
}
