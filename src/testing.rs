//! In-memory fakes for the external capabilities.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{MonitoredResource, ResourceUpdate};
use crate::services::{Channel, Notifier, PageFetcher};
use crate::storage::ResourceStore;

/// Fetcher returning canned text per URL; unknown URLs fetch as empty text.
#[derive(Default)]
pub struct StaticFetcher {
    pages: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn with_page(self, url: &str, text: &str) -> Self {
        self.set_page(url, text);
        self
    }

    pub fn set_page(&self, url: &str, text: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), text.to_string());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch_rendered_text(&self, url: &str) -> String {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages.lock().unwrap().get(url).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub recipient: String,
    pub text: String,
    pub channel: Channel,
}

/// Notifier that records messages, optionally failing every send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, recipient: &str, text: &str, channel: Channel) -> Result<()> {
        if self.fail {
            return Err(AppError::notify("transport down"));
        }
        self.sent.lock().unwrap().push(SentMessage {
            recipient: recipient.to_string(),
            text: text.to_string(),
            channel,
        });
        Ok(())
    }
}

/// Store keeping records in memory, with switchable failures.
#[derive(Default)]
pub struct MemoryStore {
    resources: Mutex<Vec<MonitoredResource>>,
    updates: Mutex<Vec<(String, ResourceUpdate)>>,
    fail_list: bool,
    fail_update_ids: Vec<String>,
}

impl MemoryStore {
    pub fn new(resources: Vec<MonitoredResource>) -> Self {
        Self {
            resources: Mutex::new(resources),
            ..Self::default()
        }
    }

    pub fn failing_list() -> Self {
        Self {
            fail_list: true,
            ..Self::default()
        }
    }

    pub fn failing_updates_for(mut self, id: &str) -> Self {
        self.fail_update_ids.push(id.to_string());
        self
    }

    pub fn resource(&self, id: &str) -> Option<MonitoredResource> {
        self.resources
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn updates(&self) -> Vec<(String, ResourceUpdate)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list_active_resources(&self) -> Result<Vec<MonitoredResource>> {
        if self.fail_list {
            return Err(AppError::store("list_active_resources", "connection refused"));
        }
        Ok(self.resources.lock().unwrap().clone())
    }

    async fn update_resource(&self, id: &str, update: &ResourceUpdate) -> Result<()> {
        if self.fail_update_ids.iter().any(|f| f == id) {
            return Err(AppError::store("update_resource", "write rejected"));
        }

        let mut resources = self.resources.lock().unwrap();
        let resource = resources
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::store("update_resource", format!("{id} not found")))?;
        update.apply_to(resource);
        self.updates
            .lock()
            .unwrap()
            .push((id.to_string(), update.clone()));
        Ok(())
    }
}
