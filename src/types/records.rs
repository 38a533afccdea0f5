use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

pub const SOS_STATUS_ACTIVE: &str = "Active";
pub const UNKNOWN_ACCURACY: &str = "Unknown";

/// Per-user emergency flag. Anything outside these two values is rejected at
/// the write boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    Green,
    Red,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Alert status must be 'green' or 'red'")]
pub struct InvalidAlertLevel;

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Green => "green",
            AlertLevel::Red => "red",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = InvalidAlertLevel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "green" => Ok(AlertLevel::Green),
            "red" => Ok(AlertLevel::Red),
            _ => Err(InvalidAlertLevel),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub phone: String,
    pub email: String,
    pub city: String,
    pub locality: String,
    pub full_address: String,
    pub alert_status: AlertLevel,
    pub timestamp: String,
}

/// Profile fields accepted by the create-or-update operation. The alert flag
/// is deliberately absent: it is only ever set by the alert write.
#[derive(Debug, Clone, PartialEq)]
pub struct UserUpsert {
    pub phone: String,
    pub email: String,
    pub city: String,
    pub locality: String,
    pub full_address: String,
    pub timestamp: String,
}

impl UserUpsert {
    pub fn into_record(self) -> UserRecord {
        UserRecord {
            phone: self.phone,
            email: self.email,
            city: self.city,
            locality: self.locality,
            full_address: self.full_address,
            alert_status: AlertLevel::Green,
            timestamp: self.timestamp,
        }
    }

    pub fn apply_to(self, record: &mut UserRecord) {
        record.email = self.email;
        record.city = self.city;
        record.locality = self.locality;
        record.full_address = self.full_address;
        record.timestamp = self.timestamp;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinatesError {
    #[error("Missing required fields: phone and coordinates [lat, lng] are required")]
    Shape,
    #[error("Coordinates must be valid numbers [latitude, longitude]")]
    NotNumeric,
}

impl Coordinates {
    /// Accepts exactly a two-element array of JSON numbers; nothing is coerced.
    pub fn from_json(value: &JsonValue) -> Result<Self, CoordinatesError> {
        let pair = match value.as_array() {
            Some(pair) if pair.len() == 2 => pair,
            _ => return Err(CoordinatesError::Shape),
        };
        match (pair[0].as_f64(), pair[1].as_f64()) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
                Ok(Coordinates { lat, lng })
            }
            _ => Err(CoordinatesError::NotNumeric),
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SosEvent {
    pub phone: String,
    pub coordinates: Coordinates,
    pub accuracy: String,
    pub timestamp: String,
    pub status: String,
}

impl SosEvent {
    pub fn active(
        phone: String,
        coordinates: Coordinates,
        accuracy: Option<String>,
        timestamp: String,
    ) -> Self {
        Self {
            phone,
            coordinates,
            accuracy: accuracy.unwrap_or_else(|| UNKNOWN_ACCURACY.to_string()),
            timestamp,
            status: SOS_STATUS_ACTIVE.to_string(),
        }
    }
}

/// Wire view of a user's alert flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatusView {
    pub phone: String,
    pub alert_status: AlertLevel,
    pub timestamp: String,
}
