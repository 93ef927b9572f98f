use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::core::app::App;
use crate::core::config::Config;
use crate::stores::storage::{FileStorage, MemoryStorage, Storage};

/// Open the configured storage. No path means nothing survives a restart.
pub fn open_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    match &config.storage.path {
        Some(path) => {
            let storage = FileStorage::open(path.clone())
                .context(format!("Failed to open storage at {}", path.display()))?;
            // replayed logs only grow; rewrite once per start
            storage.compact().context("Failed to compact storage")?;
            info!(path = %path.display(), entries = storage.len(), "Storage opened");
            Ok(Arc::new(storage))
        }
        None => {
            info!("Using in-memory storage");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}

pub fn build_app(config: Config) -> Result<App> {
    let storage = open_storage(&config)?;
    App::new(config, storage).context("Failed to create client")
}
