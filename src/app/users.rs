use crate::error::ApiError;
use crate::ports::TimeProvider;
use crate::state::AppState;
use crate::types::api::{AlertUpdated, UserSaved};
use crate::types::records::{AlertLevel, AlertStatusView, UpsertOutcome, UserUpsert};
use crate::types::rfc3339;

use axum::Json;
use axum::extract::Path as AxumPath;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;

const MISSING_FIELDS: &str = "Missing required fields";
const PHONE_REQUIRED: &str = "Phone number is required";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserPayload {
    #[serde(default)]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    pub(crate) email: Option<String>,
    #[serde(default)]
    pub(crate) city: Option<String>,
    #[serde(default)]
    pub(crate) locality: Option<String>,
    #[serde(default)]
    pub(crate) full_address: Option<String>,
    #[serde(default)]
    pub(crate) timestamp: Option<String>,
}

impl UserPayload {
    fn into_upsert(self, now: OffsetDateTime) -> Result<UserUpsert, ApiError> {
        let required = |value: Option<String>| {
            value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ApiError::validation(MISSING_FIELDS))
        };
        Ok(UserUpsert {
            phone: required(self.phone)?,
            email: required(self.email)?,
            city: required(self.city)?,
            locality: required(self.locality)?,
            full_address: required(self.full_address)?,
            timestamp: self
                .timestamp
                .filter(|timestamp| !timestamp.trim().is_empty())
                .unwrap_or_else(|| rfc3339(now)),
        })
    }
}

pub(crate) async fn user_upsert<T: TimeProvider>(
    State(state): State<AppState<T>>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Result<Json<UserSaved>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
    let user = payload.into_upsert(state.time.now())?;
    let phone = user.phone.clone();

    let outcome = state
        .store
        .upsert_user(user)
        .await
        .map_err(ApiError::internal("Failed to save user data"))?;

    info!(%phone, ?outcome, "saved user");
    let saved = match outcome {
        UpsertOutcome::Created => UserSaved {
            message: "User created".to_string(),
            phone,
            created: Some(true),
            updated: None,
        },
        UpsertOutcome::Updated => UserSaved {
            message: "User updated".to_string(),
            phone,
            created: None,
            updated: Some(true),
        },
    };
    Ok(Json(saved))
}

pub(crate) async fn alert_status<T: TimeProvider>(
    State(state): State<AppState<T>>,
    AxumPath(phone): AxumPath<String>,
) -> Result<Json<AlertStatusView>, ApiError> {
    let phone = required_phone(&phone)?;
    let user = state
        .store
        .find_user(phone)
        .await
        .map_err(ApiError::internal("Failed to fetch alert status"))?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(AlertStatusView {
        phone: user.phone,
        alert_status: user.alert_status,
        timestamp: rfc3339(state.time.now()),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AlertPayload {
    #[serde(default)]
    pub(crate) alert_status: Option<String>,
}

pub(crate) async fn alert_update<T: TimeProvider>(
    State(state): State<AppState<T>>,
    AxumPath(phone): AxumPath<String>,
    payload: Result<Json<AlertPayload>, JsonRejection>,
) -> Result<Json<AlertUpdated>, ApiError> {
    let phone = required_phone(&phone)?;
    let Json(payload) = payload.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
    let level: AlertLevel = payload
        .alert_status
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|err| ApiError::validation(format!("{err}")))?;

    let found = state
        .store
        .set_alert_status(phone, level)
        .await
        .map_err(ApiError::internal("Failed to update alert status"))?;
    if !found {
        return Err(ApiError::NotFound("User not found"));
    }

    info!(%phone, alert_status = %level, "alert status updated");
    Ok(Json(AlertUpdated {
        message: "Alert status updated".to_string(),
        phone: phone.to_string(),
        alert_status: level,
        timestamp: rfc3339(state.time.now()),
    }))
}

fn required_phone(phone: &str) -> Result<&str, ApiError> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(ApiError::validation(PHONE_REQUIRED));
    }
    Ok(phone)
}
