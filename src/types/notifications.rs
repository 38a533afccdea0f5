use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationItem {
    pub id: u64,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: String,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<(f64, f64)>,
}

/// A notification before the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: String,
    pub read: bool,
    pub location: Option<(f64, f64)>,
}

impl NewNotification {
    pub(crate) fn with_id(self, id: u64) -> NotificationItem {
        NotificationItem {
            id,
            title: self.title,
            message: self.message,
            severity: self.severity,
            timestamp: self.timestamp,
            read: self.read,
            location: self.location,
        }
    }
}

/// Payload handed to the platform notification surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformNotification {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub require_interaction: bool,
}
