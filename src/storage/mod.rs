//! Storage abstractions for monitored resources.
//!
//! A store lists resource records and applies partial updates to them:
//! only the fields staged in a [`ResourceUpdate`] are written.
//!
//! ## Backends
//!
//! ```text
//! local     {storage_dir}/resources.json     (development, tests)
//! supabase  {SUPABASE_URL}/rest/v1/{table}   (production)
//! ```

pub mod local;
pub mod supabase;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Config, MonitoredResource, ResourceUpdate, StoreBackend};

// Re-export for convenience
pub use local::LocalStorage;
pub use supabase::SupabaseStore;

/// Trait for resource record backends.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// List the resources to process this cycle, in processing order.
    async fn list_active_resources(&self) -> Result<Vec<MonitoredResource>>;

    /// Write the staged fields of `update` to the record `id`.
    async fn update_resource(&self, id: &str, update: &ResourceUpdate) -> Result<()>;
}

/// Build the store selected by configuration.
pub fn from_config(config: &Config) -> Result<Box<dyn ResourceStore>> {
    match config.store.backend {
        StoreBackend::Local => Ok(Box::new(LocalStorage::new(&config.store.local_dir))),
        StoreBackend::Supabase => Ok(Box::new(SupabaseStore::from_config(&config.store)?)),
    }
}
