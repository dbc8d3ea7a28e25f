//! Service layer for the watcher.
//!
//! External capabilities consumed by the pipeline:
//! - Page fetching (`PageFetcher`, `HttpFetcher`)
//! - Notification delivery (`Notifier`, `TelegramNotifier`)

mod fetcher;
mod notifier;

pub use fetcher::{HttpFetcher, PageFetcher, visible_text};
pub use notifier::{Channel, Notifier, TelegramNotifier};
