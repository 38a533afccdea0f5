//! Client side of the service: typed API access, the alert poller, the
//! safe-places lookup and the observable state they write into.

pub mod actions;
pub mod api;
pub mod places;
pub mod poller;
pub mod store;

pub use actions::{SAVE_FAILURE_MESSAGE, SOS_FAILURE_MESSAGE, UserActions};
pub use api::{ApiClient, ClientError};
pub use places::PlacesLookup;
pub use poller::AlertPoller;
pub use store::{ClientState, ClientStore, Slice};

use crate::adapters::{LogNotifier, TokioTimeProvider};

use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Polls one phone against a running server until Ctrl+C, logging every
/// change the poller makes to client state.
pub async fn watch(api_url: &str, phone: &str, interval: Duration) -> Result<(), ClientError> {
    let client = ApiClient::new(api_url)?;
    match client.alert_status(phone).await {
        Ok(Some(status)) => info!(%phone, alert_status = %status.alert_status, "current alert status"),
        Ok(None) => warn!(%phone, "phone is not registered yet; polling anyway"),
        Err(err) => warn!(%phone, error = %err, "server not reachable yet; polling anyway"),
    }

    let store = ClientStore::new();
    store.subscribe(log_change);
    let poller = AlertPoller::with_interval(
        TokioTimeProvider,
        client,
        LogNotifier::default(),
        store,
        interval,
    );
    poller.start(phone);

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for Ctrl+C");
    }
    poller.stop();
    Ok(())
}

fn log_change(slice: Slice, state: &ClientState) {
    match slice {
        Slice::Notifications => {
            if let Some(latest) = state.notifications.first() {
                warn!(
                    title = %latest.title,
                    message = %latest.message,
                    unread = state.unread_count,
                    "notification"
                );
            }
        }
        Slice::Toasts => {
            if let Some(toast) = state.toasts.last() {
                warn!(title = %toast.title, description = %toast.description, "toast");
            }
        }
        Slice::AlertStatus => {
            if let Some(status) = &state.alert_status {
                debug!(phone = %status.phone, alert_status = %status.alert_status, "alert status");
            }
        }
        Slice::DangerActive if state.danger_active => warn!("danger is active"),
        _ => {}
    }
}
