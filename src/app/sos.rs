use crate::error::ApiError;
use crate::ports::TimeProvider;
use crate::state::AppState;
use crate::types::api::SosSaved;
use crate::types::records::{Coordinates, CoordinatesError, SosEvent};
use crate::types::rfc3339;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SosPayload {
    #[serde(default)]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    pub(crate) coordinates: Option<JsonValue>,
    #[serde(default)]
    pub(crate) accuracy: Option<JsonValue>,
    #[serde(default)]
    pub(crate) timestamp: Option<String>,
}

impl SosPayload {
    fn into_event(self, now: OffsetDateTime) -> Result<SosEvent, ApiError> {
        let shape_error = || ApiError::validation(CoordinatesError::Shape.to_string());
        let phone = self
            .phone
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty())
            .ok_or_else(shape_error)?;
        let coordinates = self.coordinates.ok_or_else(shape_error)?;
        let coordinates = Coordinates::from_json(&coordinates)
            .map_err(|err| ApiError::validation(err.to_string()))?;
        let timestamp = self
            .timestamp
            .filter(|timestamp| !timestamp.trim().is_empty())
            .unwrap_or_else(|| rfc3339(now));

        Ok(SosEvent::active(
            phone,
            coordinates,
            self.accuracy.and_then(accuracy_text),
            timestamp,
        ))
    }
}

fn accuracy_text(accuracy: JsonValue) -> Option<String> {
    match accuracy {
        JsonValue::Number(meters) => Some(meters.to_string()),
        JsonValue::String(text) if !text.trim().is_empty() => Some(text),
        _ => None,
    }
}

pub(crate) async fn sos_create<T: TimeProvider>(
    State(state): State<AppState<T>>,
    payload: Result<Json<SosPayload>, JsonRejection>,
) -> Result<Json<SosSaved>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
    let now = state.time.now();
    let event = payload.into_event(now)?;
    // The row keeps the client's capture time; the reply carries the server's.
    let saved = SosSaved {
        message: "SOS Alert saved successfully".to_string(),
        phone: event.phone.clone(),
        coordinates: event.coordinates.to_string(),
        timestamp: rfc3339(now),
    };

    warn!(phone = %saved.phone, coordinates = %saved.coordinates, accuracy = %event.accuracy, "SOS alert received");
    state
        .store
        .append_sos(event)
        .await
        .map_err(ApiError::internal("Failed to save SOS alert"))?;
    Ok(Json(saved))
}
