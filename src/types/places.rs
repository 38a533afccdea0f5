use serde::{Deserialize, Serialize};

pub const STATUS_OK: &str = "OK";
pub const STATUS_ZERO_RESULTS: &str = "ZERO_RESULTS";

/// Nearby-search response in the legacy Places shape the proxy normalizes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyResponse {
    pub results: Vec<PlaceResult>,
    pub status: String,
}

impl NearbyResponse {
    pub fn zero_results() -> Self {
        Self {
            results: Vec::new(),
            status: STATUS_ZERO_RESULTS.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceResult {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub vicinity: String,
    #[serde(default)]
    pub formatted_address: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub opening_hours: Option<OpeningHours>,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub open_now: bool,
}

/// A category-tagged point of interest shown on the safe-places map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafePlace {
    pub id: String,
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_now: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}

impl SafePlace {
    pub fn from_result(result: PlaceResult, kind: &str) -> Self {
        let address = if result.vicinity.is_empty() {
            result.formatted_address
        } else {
            result.vicinity
        };
        Self {
            id: result.place_id,
            name: result.name,
            address,
            lat: result.geometry.location.lat,
            lng: result.geometry.location.lng,
            kind: kind.to_string(),
            rating: Some(result.rating),
            open_now: result.opening_hours.map(|hours| hours.open_now),
            icon: Some(result.icon).filter(|icon| !icon.is_empty()),
            distance_meters: None,
        }
    }
}
