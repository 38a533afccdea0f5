use crate::error::ApiError;
use crate::places::{DEFAULT_RADIUS_METERS, NearbyQuery};
use crate::ports::TimeProvider;
use crate::state::AppState;
use crate::types::places::NearbyResponse;

use axum::Json;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::rejection::QueryRejection;
use serde::Deserialize;

const MISSING_PARAMS: &str = "Missing required parameters: lat, lng, and type are required";
const INVALID_PARAMS: &str = "lat, lng and radius must be valid numbers";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NearbyParams {
    #[serde(default)]
    lat: Option<String>,
    #[serde(default)]
    lng: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    radius: Option<String>,
}

struct ParsedParams {
    lat: f64,
    lng: f64,
    kind: String,
    radius: f64,
}

impl NearbyParams {
    fn parse(self) -> Result<ParsedParams, ApiError> {
        let present = |value: Option<String>| {
            value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let (Some(lat), Some(lng), Some(kind)) =
            (present(self.lat), present(self.lng), present(self.kind))
        else {
            return Err(ApiError::validation(MISSING_PARAMS));
        };

        let number = |text: &str| {
            text.parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| ApiError::validation(INVALID_PARAMS))
        };
        let radius = match present(self.radius) {
            Some(radius) => number(&radius).and_then(|radius| {
                if radius > 0.0 {
                    Ok(radius)
                } else {
                    Err(ApiError::validation(INVALID_PARAMS))
                }
            })?,
            None => DEFAULT_RADIUS_METERS,
        };

        Ok(ParsedParams {
            lat: number(&lat)?,
            lng: number(&lng)?,
            kind,
            radius,
        })
    }
}

pub(crate) async fn places_nearby<T: TimeProvider>(
    State(state): State<AppState<T>>,
    params: Result<Query<NearbyParams>, QueryRejection>,
) -> Result<Json<NearbyResponse>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
    let params = params.parse()?;
    let response = state
        .places
        .search(NearbyQuery {
            lat: params.lat,
            lng: params.lng,
            kind: &params.kind,
            radius: params.radius,
        })
        .await
        .map_err(ApiError::internal("Failed to fetch places"))?;
    Ok(Json(response))
}
