//! Local filesystem storage implementation.
//!
//! Keeps every resource record in a single JSON array for development and
//! testing. Production deployments should use `SupabaseStore`.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Watcher Configuration
//! └── resources.json        # Monitored resources, one object per URL
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{MonitoredResource, ResourceUpdate};
use crate::storage::ResourceStore;

const RESOURCES_FILE: &str = "resources.json";

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    // serializes read-modify-write of resources.json
    write_lock: Mutex<()>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the resources file.
    pub fn resources_path(&self) -> PathBuf {
        self.root_dir.join(RESOURCES_FILE)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &PathBuf, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read every record; a missing file means no resources.
    pub async fn load_all(&self) -> Result<Vec<MonitoredResource>> {
        match tokio::fs::read(self.resources_path()).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("No {} found in {}", RESOURCES_FILE, self.root_dir.display());
                Ok(Vec::new())
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Replace every record.
    pub async fn save_all(&self, resources: &[MonitoredResource]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(resources)?;
        self.write_bytes(&self.resources_path(), &bytes).await
    }
}

#[async_trait]
impl ResourceStore for LocalStorage {
    async fn list_active_resources(&self) -> Result<Vec<MonitoredResource>> {
        self.load_all().await
    }

    async fn update_resource(&self, id: &str, update: &ResourceUpdate) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut resources = self.load_all().await?;
        let resource = resources
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::store("update_resource", format!("resource {id} not found")))?;

        update.apply_to(resource);
        self.save_all(&resources).await?;

        log::debug!("Updated resource {} in {}", id, RESOURCES_FILE);
        Ok(())
    }
}
