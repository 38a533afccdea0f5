use crate::adapters::TokioTimeProvider;
use crate::config::AppConfig;
use crate::places::PlacesProxy;
use crate::ports::RecordStore;

use std::sync::Arc;

/// Shared handler state. `time` stamps every server-side timestamp.
#[derive(Clone)]
pub struct AppState<T = TokioTimeProvider> {
    pub config: AppConfig,
    pub store: Arc<dyn RecordStore>,
    pub places: PlacesProxy,
    pub time: T,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn RecordStore>) -> Self {
        Self::with_time(config, store, TokioTimeProvider)
    }
}

impl<T> AppState<T> {
    pub fn with_time(config: AppConfig, store: Arc<dyn RecordStore>, time: T) -> Self {
        let places = PlacesProxy::new(&config.places);
        Self {
            config,
            store,
            places,
            time,
        }
    }
}
