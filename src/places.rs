//! Nearby-places proxy. Queries the Places API (New) text search and
//! normalizes the answer into the legacy nearby-search shape clients expect.

use crate::config::PlacesConfig;
use crate::types::places::{
    Geometry, LatLng, NearbyResponse, OpeningHours, PlaceResult, STATUS_OK,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_SEARCH_TEXT_URL: &str = "https://places.googleapis.com/v1/places:searchText";
pub const DEFAULT_RADIUS_METERS: f64 = 5000.0;
const MAX_RESULT_COUNT: u32 = 20;
const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,places.location,places.rating,places.regularOpeningHours,places.iconMaskBaseUri";

#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("places provider API key is not configured")]
    MissingApiKey,
    #[error("places provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery<'a> {
    pub lat: f64,
    pub lng: f64,
    pub kind: &'a str,
    pub radius: f64,
}

#[derive(Clone)]
pub struct PlacesProxy {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl PlacesProxy {
    pub fn new(config: &PlacesConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
        }
    }

    pub async fn search(&self, query: NearbyQuery<'_>) -> Result<NearbyResponse, PlacesError> {
        let api_key = self.api_key.as_deref().ok_or(PlacesError::MissingApiKey)?;
        let body = search_request(query);
        debug!(text_query = %body.text_query, radius = query.radius, "searching places");

        let response: SearchTextResponse = self
            .http
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(normalize(response))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchTextRequest {
    text_query: String,
    location_bias: LocationBias,
    max_result_count: u32,
}

#[derive(Debug, Serialize)]
struct LocationBias {
    circle: Circle,
}

#[derive(Debug, Serialize)]
struct Circle {
    center: Point,
    radius: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Point {
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
}

#[derive(Debug, Default, Deserialize)]
struct SearchTextResponse {
    #[serde(default)]
    places: Option<Vec<UpstreamPlace>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamPlace {
    id: String,
    #[serde(default)]
    display_name: Option<LocalizedText>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    location: Option<Point>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    regular_opening_hours: Option<UpstreamOpeningHours>,
    #[serde(default)]
    icon_mask_base_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamOpeningHours {
    #[serde(default)]
    open_now: Option<bool>,
}

fn search_request(query: NearbyQuery<'_>) -> SearchTextRequest {
    SearchTextRequest {
        text_query: format!("{} near {},{}", query.kind, query.lat, query.lng),
        location_bias: LocationBias {
            circle: Circle {
                center: Point {
                    latitude: query.lat,
                    longitude: query.lng,
                },
                radius: query.radius,
            },
        },
        max_result_count: MAX_RESULT_COUNT,
    }
}

fn normalize(response: SearchTextResponse) -> NearbyResponse {
    let Some(places) = response.places else {
        return NearbyResponse::zero_results();
    };
    let results = places
        .into_iter()
        .map(|place| {
            let address = place.formatted_address.unwrap_or_default();
            let location = place.location.unwrap_or_default();
            PlaceResult {
                place_id: place.id,
                name: place
                    .display_name
                    .map(|name| name.text)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
                vicinity: address.clone(),
                formatted_address: address,
                geometry: Geometry {
                    location: LatLng {
                        lat: location.latitude,
                        lng: location.longitude,
                    },
                },
                rating: place.rating.unwrap_or_default(),
                opening_hours: place.regular_opening_hours.map(|hours| OpeningHours {
                    open_now: hours.open_now.unwrap_or(false),
                }),
                icon: place.icon_mask_base_uri.unwrap_or_default(),
            }
        })
        .collect();
    NearbyResponse {
        results,
        status: STATUS_OK.to_string(),
    }
}
