use crate::config::{Environment, StorageConfig};
use crate::ports::RecordStore;

mod memory;
pub mod sheets;

pub use memory::MemoryStore;
pub use sheets::{SheetsError, SheetsStore};

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sheets(#[from] SheetsError),
}

/// Opens the configured backend. Storage initialization failures are logged
/// and never abort startup; the sheets backend retries on the next request.
pub async fn open(storage: &StorageConfig, environment: Environment) -> Arc<dyn RecordStore> {
    match storage {
        StorageConfig::Memory => {
            info!("using in-memory record store");
            Arc::new(MemoryStore::default())
        }
        StorageConfig::Sheets(config) => {
            info!(sheet_id = %config.sheet_id, %environment, "initializing Google Sheets store");
            let store = SheetsStore::new(config.clone());
            match store.init().await {
                Ok(title) => info!(%title, "Google Sheets store ready"),
                Err(err) => {
                    warn!(error = %err, "Google Sheets initialization failed; continuing without it");
                    if environment == Environment::Development {
                        debug!(error = ?err, "full initialization error");
                    }
                }
            }
            Arc::new(store)
        }
    }
}
