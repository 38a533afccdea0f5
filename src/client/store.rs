//! Observable client-side state. Every mutation notifies subscribers with the
//! slice that changed and a snapshot taken right after the change.
//!
//! Notifications are delivered one at a time, in mutation order, even when
//! several threads mutate the store. A mutation made while a delivery is in
//! progress (including one made from inside a callback) is queued and handed
//! to subscribers by the thread that is already delivering, so the mutating
//! call may return before its own notification has been seen.

use crate::ports::Permission;
use crate::types::notifications::{NewNotification, NotificationItem};
use crate::types::places::SafePlace;
use crate::types::records::AlertStatusView;

use serde::{Deserialize, Serialize};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type SubscriptionId = u64;

type Subscriber = Arc<dyn Fn(Slice, &ClientState) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slice {
    Location,
    LocationPermission,
    DisasterZones,
    SafeZones,
    DangerZones,
    EmergencyContacts,
    Notifications,
    Profile,
    AlertStatus,
    DangerActive,
    Offline,
    Toasts,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisasterKind {
    Flood,
    Earthquake,
    Wildfire,
    Hurricane,
    Tornado,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisasterSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterZone {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DisasterKind,
    pub severity: DisasterSeverity,
    pub coordinates: Vec<(f64, f64)>,
    pub title: String,
    pub description: String,
    pub last_updated: String,
}

/// Pulsing overlay drawn around a location while danger is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DangerZone {
    pub id: u64,
    pub center: Option<(f64, f64)>,
    pub radius: f64,
    /// 0..=1, drives the overlay animation.
    pub intensity: f64,
    pub color: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDangerZone {
    pub center: Option<(f64, f64)>,
    pub radius: f64,
    pub intensity: f64,
    pub color: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Emergency,
    Family,
    Medical,
    Authority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(rename = "type")]
    pub kind: ContactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub emergency_contact: String,
    pub medical_info: String,
    pub last_updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_info: Option<String>,
    pub last_updated: Option<String>,
}

impl ProfilePatch {
    fn apply(self, profile: &mut UserProfile) {
        let fields = [
            (self.name, &mut profile.name),
            (self.email, &mut profile.email),
            (self.phone, &mut profile.phone),
            (self.address, &mut profile.address),
            (self.emergency_contact, &mut profile.emergency_contact),
            (self.medical_info, &mut profile.medical_info),
            (self.last_updated, &mut profile.last_updated),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastVariant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub variant: ToastVariant,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientState {
    pub location: Option<UserLocation>,
    pub location_permission: Permission,
    pub disaster_zones: Vec<DisasterZone>,
    pub safe_zones: Vec<SafePlace>,
    pub danger_zones: Vec<DangerZone>,
    pub emergency_contacts: Vec<EmergencyContact>,
    /// Newest first.
    pub notifications: Vec<NotificationItem>,
    pub unread_count: usize,
    pub profile: Option<UserProfile>,
    pub alert_status: Option<AlertStatusView>,
    pub danger_active: bool,
    pub offline: bool,
    pub toasts: Vec<Toast>,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            location: None,
            location_permission: Permission::Default,
            disaster_zones: Vec::new(),
            safe_zones: Vec::new(),
            danger_zones: Vec::new(),
            emergency_contacts: default_emergency_contacts(),
            notifications: Vec::new(),
            unread_count: 0,
            profile: None,
            alert_status: None,
            danger_active: false,
            offline: false,
            toasts: Vec::new(),
        }
    }
}

pub fn default_emergency_contacts() -> Vec<EmergencyContact> {
    let contact = |id: &str, name: &str, phone: &str, kind, icon: &str| EmergencyContact {
        id: id.to_string(),
        name: name.to_string(),
        phone: phone.to_string(),
        kind,
        icon: Some(icon.to_string()),
    };
    vec![
        contact("1", "Emergency Services", "911", ContactKind::Emergency, "🚨"),
        contact("2", "Fire Department", "911", ContactKind::Emergency, "🚒"),
        contact("3", "Police", "911", ContactKind::Emergency, "👮‍♂️"),
        contact("4", "Poison Control", "1-800-222-1222", ContactKind::Medical, "☠️"),
    ]
}

#[derive(Default)]
struct Inner {
    state: ClientState,
    next_notification_id: u64,
    next_zone_id: u64,
    pending: VecDeque<(Slice, ClientState)>,
    delivering: bool,
}

#[derive(Default)]
struct Shared {
    inner: Mutex<Inner>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
}

/// Cheap to clone; clones share the same state and subscribers.
#[derive(Clone, Default)]
pub struct ClientStore {
    shared: Arc<Shared>,
}

impl ClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ClientState {
        self.shared.inner.lock().expect("client state lock").state.clone()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Slice, &ClientState) + Send + Sync + 'static,
    {
        let id = self.shared.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.shared
            .subscribers
            .lock()
            .expect("subscribers lock")
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` when the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.shared.subscribers.lock().expect("subscribers lock");
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn set_location(&self, location: Option<UserLocation>) {
        self.update(Slice::Location, |inner| inner.state.location = location);
    }

    pub fn set_location_permission(&self, permission: Permission) {
        self.update(Slice::LocationPermission, |inner| {
            inner.state.location_permission = permission;
        });
    }

    pub fn set_disaster_zones(&self, zones: Vec<DisasterZone>) {
        self.update(Slice::DisasterZones, |inner| inner.state.disaster_zones = zones);
    }

    pub fn set_safe_zones(&self, places: Vec<SafePlace>) {
        self.update(Slice::SafeZones, |inner| inner.state.safe_zones = places);
    }

    pub fn add_notification(&self, notification: NewNotification) -> u64 {
        self.update(Slice::Notifications, |inner| {
            inner.next_notification_id += 1;
            let id = inner.next_notification_id;
            if !notification.read {
                inner.state.unread_count += 1;
            }
            inner.state.notifications.insert(0, notification.with_id(id));
            id
        })
    }

    /// Only an unread to read transition touches the unread counter.
    pub fn mark_notification_read(&self, id: u64) {
        self.update(Slice::Notifications, |inner| {
            let state = &mut inner.state;
            if let Some(item) = state.notifications.iter_mut().find(|item| item.id == id)
                && !item.read
            {
                item.read = true;
                state.unread_count = state.unread_count.saturating_sub(1);
            }
        });
    }

    pub fn set_offline(&self, offline: bool) {
        self.update(Slice::Offline, |inner| inner.state.offline = offline);
    }

    pub fn set_profile(&self, profile: Option<UserProfile>) {
        self.update(Slice::Profile, |inner| inner.state.profile = profile);
    }

    /// Patches the current profile; without one there is nothing to patch.
    pub fn update_profile(&self, patch: ProfilePatch) {
        self.update(Slice::Profile, |inner| {
            if let Some(profile) = inner.state.profile.as_mut() {
                patch.apply(profile);
            }
        });
    }

    pub fn set_alert_status(&self, status: Option<AlertStatusView>) {
        self.update(Slice::AlertStatus, |inner| inner.state.alert_status = status);
    }

    pub fn set_danger_active(&self, active: bool) {
        self.update(Slice::DangerActive, |inner| inner.state.danger_active = active);
    }

    pub fn add_danger_zone(&self, zone: NewDangerZone) -> u64 {
        self.update(Slice::DangerZones, |inner| {
            inner.next_zone_id += 1;
            let id = inner.next_zone_id;
            inner.state.danger_zones.push(DangerZone {
                id,
                center: zone.center,
                radius: zone.radius,
                intensity: zone.intensity.clamp(0.0, 1.0),
                color: zone.color,
                timestamp: zone.timestamp,
            });
            id
        })
    }

    pub fn remove_danger_zone(&self, id: u64) {
        self.update(Slice::DangerZones, |inner| {
            inner.state.danger_zones.retain(|zone| zone.id != id);
        });
    }

    pub fn clear_danger_zones(&self) {
        self.update(Slice::DangerZones, |inner| inner.state.danger_zones.clear());
    }

    pub fn push_toast(&self, toast: Toast) {
        self.update(Slice::Toasts, |inner| inner.state.toasts.push(toast));
    }

    /// Hands queued toasts to whoever renders them.
    pub fn drain_toasts(&self) -> Vec<Toast> {
        self.update(Slice::Toasts, |inner| std::mem::take(&mut inner.state.toasts))
    }

    fn update<R>(&self, slice: Slice, mutate: impl FnOnce(&mut Inner) -> R) -> R {
        let (result, deliver) = {
            let mut inner = self.shared.inner.lock().expect("client state lock");
            let result = mutate(&mut inner);
            let snapshot = inner.state.clone();
            inner.pending.push_back((slice, snapshot));
            let deliver = !inner.delivering;
            inner.delivering = true;
            (result, deliver)
        };
        if deliver {
            self.deliver_pending();
        }
        result
    }

    /// Drains the queue until it is empty. Only one thread runs this at a time.
    fn deliver_pending(&self) {
        let guard = DeliveryGuard(&self.shared);
        loop {
            let (slice, snapshot) = {
                let mut inner = self.shared.inner.lock().expect("client state lock");
                match inner.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        inner.delivering = false;
                        break;
                    }
                }
            };
            let subscribers: Vec<Subscriber> = self
                .shared
                .subscribers
                .lock()
                .expect("subscribers lock")
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect();
            for callback in subscribers {
                callback(slice, &snapshot);
            }
        }
        std::mem::forget(guard);
    }
}

/// Hands the delivery role back if a subscriber panics.
struct DeliveryGuard<'a>(&'a Shared);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.0.inner.lock() {
            inner.delivering = false;
        }
    }
}
