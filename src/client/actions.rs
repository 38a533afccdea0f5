//! User-initiated writes. A failed write leaves a destructive toast in the
//! client store and still hands the error back to the caller.

use crate::client::api::{ApiClient, ClientError};
use crate::client::store::{ClientStore, Toast, ToastVariant};
use crate::types::api::{AlertUpdated, SosRequest, SosSaved, UserRequest, UserSaved};
use crate::types::records::AlertLevel;

use std::time::Duration;
use tracing::error;

pub const SOS_FAILURE_TITLE: &str = "Alert Failed";
pub const SOS_FAILURE_MESSAGE: &str =
    "Failed to send SOS alert. Please try again or contact emergency services directly.";
pub const SAVE_FAILURE_TITLE: &str = "Error";
pub const SAVE_FAILURE_MESSAGE: &str = "Could not save your details. Please try again.";
pub const STATUS_FAILURE_TITLE: &str = "Update Failed";
pub const STATUS_FAILURE_MESSAGE: &str = "Could not update the alert status. Please try again.";
pub const FAILURE_TOAST_DURATION: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct UserActions {
    api: ApiClient,
    store: ClientStore,
}

impl UserActions {
    pub fn new(api: ApiClient, store: ClientStore) -> Self {
        Self { api, store }
    }

    pub async fn send_sos(&self, request: &SosRequest) -> Result<SosSaved, ClientError> {
        let result = self.api.send_sos(request).await;
        self.report(&result, "SOS", SOS_FAILURE_TITLE, SOS_FAILURE_MESSAGE);
        result
    }

    pub async fn save_profile(&self, user: &UserRequest) -> Result<UserSaved, ClientError> {
        let result = self.api.save_user(user).await;
        self.report(&result, "profile save", SAVE_FAILURE_TITLE, SAVE_FAILURE_MESSAGE);
        result
    }

    pub async fn set_alert_status(
        &self,
        phone: &str,
        level: AlertLevel,
    ) -> Result<AlertUpdated, ClientError> {
        let result = self.api.set_alert_status(phone, level).await;
        self.report(&result, "alert update", STATUS_FAILURE_TITLE, STATUS_FAILURE_MESSAGE);
        result
    }

    fn report<T>(
        &self,
        result: &Result<T, ClientError>,
        action: &str,
        title: &str,
        description: &str,
    ) {
        let Err(err) = result else {
            return;
        };
        error!(%action, error = %err, "client write failed");
        self.store.push_toast(Toast {
            title: title.to_string(),
            description: description.to_string(),
            variant: ToastVariant::Destructive,
            duration: FAILURE_TOAST_DURATION,
        });
    }
}
