// src/models/mod.rs

//! Domain models for the watcher.
//!
//! Configuration structures and the persisted resource records live here.

mod config;
mod resource;

// Re-export all public types
pub use config::{
    Config, CycleConfig, FetcherConfig, LoggingConfig, NotifierConfig, SentenceAlignment,
    StoreBackend, StoreConfig,
};
pub use resource::{
    Change, ChangeAction, FoundKeyword, MonitoredResource, ResourceUpdate,
};
