// src/handler.rs

//! AWS Lambda handler: one check cycle per scheduled invocation.

use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::models::{Config, StoreBackend};
use crate::pipeline::{CycleRunner, CycleSummary};
use crate::services::{HttpFetcher, TelegramNotifier};
use crate::storage::SupabaseStore;

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(event: LambdaEvent<Value>) -> std::result::Result<Value, LambdaError> {
    info!("Handling event: {:?}", event.payload);

    match run_lambda_cycle().await {
        Ok(summary) => {
            info!(
                processed = summary.processed,
                persisted = summary.persisted,
                "Lambda execution successful"
            );
            let mut body = serde_json::to_value(&summary)?;
            body["status"] = Value::from("success");
            Ok(body)
        }
        Err(e) => {
            error!("Lambda execution failed: {}", e);
            Ok(serde_json::json!({ "status": "error", "message": e.to_string() }))
        }
    }
}

/// Configuration for the Lambda environment: optional TOML file named by
/// `CONFIG_PATH`, environment overlay, and always the Supabase backend.
fn lambda_config() -> Result<Config> {
    let mut config = match std::env::var("CONFIG_PATH") {
        Ok(path) if !path.trim().is_empty() => Config::load(path.trim())?,
        _ => Config::default(),
    };
    config.apply_env();
    config.store.backend = StoreBackend::Supabase;
    config.validate()?;
    Ok(config)
}

async fn run_lambda_cycle() -> Result<CycleSummary> {
    let config = lambda_config()?;

    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
    let notifier = Arc::new(TelegramNotifier::new(&config.notifier)?);
    let store = Arc::new(SupabaseStore::from_config(&config.store)?);

    let runner = CycleRunner::new(fetcher, notifier, store, &config.cycle);
    runner.run_once().await
}
