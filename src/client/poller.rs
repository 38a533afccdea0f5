//! Alert poller: watches one user's alert flag and raises the red-alert
//! side effects on a green to red edge only.

use crate::client::store::{ClientStore, NewDangerZone, Toast, ToastVariant};
use crate::ports;
use crate::ports::Permission;
use crate::types::notifications::{NewNotification, PlatformNotification, Severity};
use crate::types::records::{AlertLevel, AlertStatusView};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub const DANGER_TOAST_TITLE: &str = "🚨 DANGER ALERT";
pub const DANGER_TOAST_DESCRIPTION: &str =
    "Emergency situation detected in your area! Please check notifications for details.";
pub const DANGER_TOAST_DURATION: Duration = Duration::from_secs(10);
pub const EMERGENCY_TITLE: &str = "🚨 Emergency Alert";
pub const EMERGENCY_MESSAGE: &str =
    "Danger has been detected in your area. Please stay alert and follow emergency procedures.";
const PLATFORM_BODY: &str = "Danger detected in your area! Check the app for details.";
const PLATFORM_TAG: &str = "emergency-alert";
const DANGER_ZONE_RADIUS_METERS: f64 = 500.0;
const DANGER_ZONE_INTENSITY: f64 = 0.8;
const DANGER_ZONE_COLOR: &str = "#ef4444";

struct SessionState {
    last: AlertLevel,
    active: bool,
}

struct Session {
    phone: String,
    state: Arc<Mutex<SessionState>>,
    handle: JoinHandle<()>,
}

impl Session {
    fn cancel(self) {
        self.state.lock().expect("poller session lock").active = false;
        self.handle.abort();
    }
}

struct PollContext<T, A, N> {
    time: T,
    source: A,
    notifier: N,
    store: ClientStore,
    interval: Duration,
    permission_requested: AtomicBool,
}

pub struct AlertPoller<T, A, N> {
    context: Arc<PollContext<T, A, N>>,
    session: Mutex<Option<Session>>,
}

impl<T, A, N> AlertPoller<T, A, N>
where
    T: ports::TimeProvider,
    A: ports::AlertSource,
    N: ports::PlatformNotifier,
{
    pub fn new(time: T, source: A, notifier: N, store: ClientStore) -> Self {
        Self::with_interval(time, source, notifier, store, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(
        time: T,
        source: A,
        notifier: N,
        store: ClientStore,
        interval: Duration,
    ) -> Self {
        Self {
            context: Arc::new(PollContext {
                time,
                source,
                notifier,
                store,
                interval,
                permission_requested: AtomicBool::new(false),
            }),
            session: Mutex::new(None),
        }
    }

    /// Replaces any running session. The baseline resets to green and the
    /// first check runs right away. Store subscribers run while the session
    /// lock is held and must not call back into the poller.
    pub fn start(&self, phone: impl Into<String>) {
        let phone = phone.into();
        let mut slot = self.session.lock().expect("poller lock");
        if let Some(previous) = slot.take() {
            debug!(phone = %previous.phone, "replacing alert monitoring session");
            previous.cancel();
        }

        let state = Arc::new(Mutex::new(SessionState {
            last: AlertLevel::Green,
            active: true,
        }));
        info!(%phone, interval = ?self.context.interval, "alert monitoring started");
        let handle = tokio::spawn(run_session(
            Arc::clone(&self.context),
            phone.clone(),
            Arc::clone(&state),
        ));
        *slot = Some(Session {
            phone,
            state,
            handle,
        });
    }

    /// Idempotent. Once this returns no further reads are issued and no
    /// in-flight read is applied.
    pub fn stop(&self) {
        if let Some(session) = self.session.lock().expect("poller lock").take() {
            info!(phone = %session.phone, "alert monitoring stopped");
            session.cancel();
        }
    }

    pub fn monitored_phone(&self) -> Option<String> {
        let slot = self.session.lock().expect("poller lock");
        slot.as_ref().map(|session| session.phone.clone())
    }

    pub fn last_known_status(&self) -> Option<AlertLevel> {
        let slot = self.session.lock().expect("poller lock");
        slot.as_ref()
            .map(|session| session.state.lock().expect("poller session lock").last)
    }
}

impl<T, A, N> Drop for AlertPoller<T, A, N> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.session.lock()
            && let Some(session) = slot.take()
        {
            session.cancel();
        }
    }
}

/// Ticks on schedule whether or not the previous read finished. Aborting
/// this task drops the join set, which aborts the reads still in flight.
async fn run_session<T, A, N>(
    context: Arc<PollContext<T, A, N>>,
    phone: String,
    state: Arc<Mutex<SessionState>>,
) where
    T: ports::TimeProvider,
    A: ports::AlertSource,
    N: ports::PlatformNotifier,
{
    let mut checks = JoinSet::new();
    loop {
        checks.spawn(check_once(
            Arc::clone(&context),
            phone.clone(),
            Arc::clone(&state),
        ));
        while checks.try_join_next().is_some() {}
        context.time.sleep(context.interval).await;
    }
}

async fn check_once<T, A, N>(
    context: Arc<PollContext<T, A, N>>,
    phone: String,
    state: Arc<Mutex<SessionState>>,
) where
    T: ports::TimeProvider,
    A: ports::AlertSource,
    N: ports::PlatformNotifier,
{
    let status = match context.source.fetch_status(&phone).await {
        Ok(status) => status,
        Err(err) => {
            warn!(%phone, error = %err, "alert status check failed");
            return;
        }
    };

    let mut session = state.lock().expect("poller session lock");
    if !session.active {
        return;
    }
    let red_edge = session.last == AlertLevel::Green && status.alert_status == AlertLevel::Red;
    session.last = status.alert_status;
    debug!(%phone, alert_status = %status.alert_status, "alert status checked");

    context.store.set_alert_status(Some(status.clone()));
    if red_edge {
        raise_red_alert(&context, &status);
    }
}

fn raise_red_alert<T, A, N>(context: &Arc<PollContext<T, A, N>>, status: &AlertStatusView)
where
    T: ports::TimeProvider,
    A: ports::AlertSource,
    N: ports::PlatformNotifier,
{
    warn!(phone = %status.phone, "red alert raised");
    let store = &context.store;
    let location = store
        .snapshot()
        .location
        .map(|location| (location.lat, location.lng));

    store.push_toast(Toast {
        title: DANGER_TOAST_TITLE.to_string(),
        description: DANGER_TOAST_DESCRIPTION.to_string(),
        variant: ToastVariant::Destructive,
        duration: DANGER_TOAST_DURATION,
    });
    store.add_notification(NewNotification {
        title: EMERGENCY_TITLE.to_string(),
        message: EMERGENCY_MESSAGE.to_string(),
        severity: Severity::Critical,
        timestamp: status.timestamp.clone(),
        read: false,
        location,
    });
    store.set_danger_active(true);
    store.add_danger_zone(NewDangerZone {
        center: location,
        radius: DANGER_ZONE_RADIUS_METERS,
        intensity: DANGER_ZONE_INTENSITY,
        color: DANGER_ZONE_COLOR.to_string(),
        timestamp: status.timestamp.clone(),
    });

    let context = Arc::clone(context);
    tokio::spawn(async move { notify_platform(&*context).await });
}

async fn notify_platform<T, A, N>(context: &PollContext<T, A, N>)
where
    N: ports::PlatformNotifier,
{
    let notifier = &context.notifier;
    let permission = match notifier.permission() {
        Permission::Default if !context.permission_requested.swap(true, Ordering::SeqCst) => {
            notifier.request_permission().await
        }
        permission => permission,
    };
    if permission != Permission::Granted {
        debug!(?permission, "platform notification skipped");
        return;
    }
    notifier.show(&PlatformNotification {
        title: EMERGENCY_TITLE.to_string(),
        body: PLATFORM_BODY.to_string(),
        tag: PLATFORM_TAG.to_string(),
        require_interaction: true,
    });
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use crate::client::store::UserLocation;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::AtomicUsize;
    use std::task::{Context, Poll};
    use time::OffsetDateTime;
    use tokio::sync::oneshot;

    #[derive(Clone)]
    pub(crate) struct TestTime {
        sleeps: Arc<Mutex<Vec<oneshot::Sender<()>>>>,
        durations: Arc<Mutex<Vec<Duration>>>,
    }

    impl TestTime {
        pub(crate) fn new() -> Self {
            Self {
                sleeps: Arc::new(Mutex::new(Vec::new())),
                durations: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn sleep_durations(&self) -> Vec<Duration> {
            self.durations.lock().expect("durations lock").clone()
        }

        pub(crate) fn trigger_all(&self) {
            let mut sends = self.sleeps.lock().expect("sleeps lock");
            for sender in sends.drain(..) {
                let _ = sender.send(());
            }
        }
    }

    pub(crate) struct ManualSleep {
        receiver: oneshot::Receiver<()>,
    }

    impl Future for ManualSleep {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            match Pin::new(&mut self.receiver).poll(cx) {
                Poll::Ready(_) => Poll::Ready(()),
                Poll::Pending => Poll::Pending,
            }
        }
    }

    impl ports::TimeProvider for TestTime {
        type Sleep<'a>
            = ManualSleep
        where
            Self: 'a;

        fn now(&self) -> OffsetDateTime {
            OffsetDateTime::UNIX_EPOCH
        }

        fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
            let (sender, receiver) = oneshot::channel();
            self.durations
                .lock()
                .expect("durations lock")
                .push(duration);
            self.sleeps.lock().expect("sleeps lock").push(sender);
            ManualSleep { receiver }
        }
    }

    #[derive(Debug)]
    struct TestFetchError;

    impl std::fmt::Display for TestFetchError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("test fetch error")
        }
    }

    /// Answers with the scripted levels in order, then keeps repeating the
    /// last one. `None` entries fail the read.
    #[derive(Clone, Default)]
    struct ScriptedSource {
        script: Arc<Mutex<VecDeque<Option<AlertLevel>>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(script: impl IntoIterator<Item = Option<AlertLevel>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into_iter().collect())),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ports::AlertSource for ScriptedSource {
        type Error = TestFetchError;
        type Fut<'a>
            = std::future::Ready<Result<AlertStatusView, Self::Error>>
        where
            Self: 'a;

        fn fetch_status<'a>(&'a self, phone: &'a str) -> Self::Fut<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().expect("script lock");
            let next = if script.len() > 1 {
                script.pop_front().flatten()
            } else {
                script.front().copied().flatten()
            };
            std::future::ready(
                next.map(|alert_status| AlertStatusView {
                    phone: phone.to_string(),
                    alert_status,
                    timestamp: "2025-01-12T09:30:00Z".to_string(),
                })
                .ok_or(TestFetchError),
            )
        }
    }

    #[derive(Clone)]
    pub(crate) struct TestNotifier {
        permission: Arc<Mutex<Permission>>,
        answer: Permission,
        requests: Arc<AtomicUsize>,
        shown: Arc<Mutex<Vec<PlatformNotification>>>,
    }

    impl TestNotifier {
        pub(crate) fn new(permission: Permission, answer: Permission) -> Self {
            Self {
                permission: Arc::new(Mutex::new(permission)),
                answer,
                requests: Arc::new(AtomicUsize::new(0)),
                shown: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn shown(&self) -> Vec<PlatformNotification> {
            self.shown.lock().expect("shown lock").clone()
        }
    }

    impl ports::PlatformNotifier for TestNotifier {
        type Fut<'a>
            = std::future::Ready<Permission>
        where
            Self: 'a;

        fn permission(&self) -> Permission {
            *self.permission.lock().expect("permission lock")
        }

        fn request_permission<'a>(&'a self) -> Self::Fut<'a> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            *self.permission.lock().expect("permission lock") = self.answer;
            std::future::ready(self.answer)
        }

        fn show(&self, notification: &PlatformNotification) {
            self.shown
                .lock()
                .expect("shown lock")
                .push(notification.clone());
        }
    }

    pub(crate) async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn critical_count(store: &ClientStore) -> usize {
        store
            .snapshot()
            .notifications
            .iter()
            .filter(|item| item.severity == Severity::Critical)
            .count()
    }

    #[tokio::test]
    async fn poller__should_fire_once_per_green_to_red_edge() {
        // Given
        let time = TestTime::new();
        let source = ScriptedSource::new([
            Some(AlertLevel::Green),
            Some(AlertLevel::Green),
            Some(AlertLevel::Red),
            Some(AlertLevel::Red),
            Some(AlertLevel::Green),
        ]);
        let notifier = TestNotifier::new(Permission::Granted, Permission::Granted);
        let store = ClientStore::new();
        let poller =
            AlertPoller::new(time.clone(), source.clone(), notifier.clone(), store.clone());

        // When
        poller.start("111");
        settle().await;
        for _ in 0..4 {
            time.trigger_all();
            settle().await;
        }

        // Then
        assert_eq!(source.calls(), 5);
        assert_eq!(critical_count(&store), 1);
        assert_eq!(notifier.shown().len(), 1);
        assert_eq!(poller.last_known_status(), Some(AlertLevel::Green));
        let state = store.snapshot();
        assert_eq!(state.toasts.len(), 1);
        assert_eq!(state.toasts[0].variant, ToastVariant::Destructive);
        assert_eq!(state.toasts[0].duration, DANGER_TOAST_DURATION);
        assert!(state.danger_active);
        assert_eq!(state.danger_zones.len(), 1);
        assert_eq!(
            state.alert_status.map(|status| status.alert_status),
            Some(AlertLevel::Green)
        );
        assert!(time.sleep_durations().iter().all(|d| *d == DEFAULT_POLL_INTERVAL));

        poller.stop();
    }

    #[tokio::test]
    async fn poller__should_fire_again_after_returning_to_green() {
        // Given
        let time = TestTime::new();
        let source = ScriptedSource::new([
            Some(AlertLevel::Red),
            Some(AlertLevel::Green),
            Some(AlertLevel::Red),
        ]);
        let notifier = TestNotifier::new(Permission::Denied, Permission::Denied);
        let store = ClientStore::new();
        store.set_location(Some(UserLocation {
            lat: 31.63,
            lng: 74.87,
            accuracy: None,
        }));
        let poller = AlertPoller::new(time.clone(), source, notifier.clone(), store.clone());

        // When
        poller.start("222");
        settle().await;
        time.trigger_all();
        settle().await;
        time.trigger_all();
        settle().await;

        // Then
        let state = store.snapshot();
        assert_eq!(critical_count(&store), 2);
        assert_eq!(state.notifications[0].timestamp, "2025-01-12T09:30:00Z");
        assert_eq!(state.notifications[0].location, Some((31.63, 74.87)));
        assert_eq!(state.danger_zones[0].center, Some((31.63, 74.87)));
        assert!(notifier.shown().is_empty());

        poller.stop();
    }

    #[tokio::test]
    async fn poller__should_ignore_failed_reads() {
        // Given
        let time = TestTime::new();
        let source = ScriptedSource::new([None, Some(AlertLevel::Red), None, Some(AlertLevel::Red)]);
        let notifier = TestNotifier::new(Permission::Granted, Permission::Granted);
        let store = ClientStore::new();
        let poller = AlertPoller::new(time.clone(), source.clone(), notifier, store.clone());

        // When
        poller.start("333");
        settle().await;
        for _ in 0..3 {
            time.trigger_all();
            settle().await;
        }

        // Then
        assert_eq!(source.calls(), 4);
        assert_eq!(critical_count(&store), 1);
        assert_eq!(poller.last_known_status(), Some(AlertLevel::Red));

        poller.stop();
    }

    #[tokio::test]
    async fn stop__should_prevent_further_reads() {
        // Given
        let time = TestTime::new();
        let source = ScriptedSource::new([Some(AlertLevel::Green)]);
        let notifier = TestNotifier::new(Permission::Granted, Permission::Granted);
        let poller = AlertPoller::new(time.clone(), source.clone(), notifier, ClientStore::new());
        poller.start("444");
        settle().await;
        assert_eq!(source.calls(), 1);

        // When
        poller.stop();
        poller.stop();
        time.trigger_all();
        settle().await;

        // Then
        assert_eq!(source.calls(), 1);
        assert_eq!(poller.monitored_phone(), None);
        assert_eq!(poller.last_known_status(), None);
    }

    #[tokio::test]
    async fn start__should_replace_session_and_reset_baseline() {
        // Given
        let time = TestTime::new();
        let source = ScriptedSource::new([Some(AlertLevel::Red)]);
        let notifier = TestNotifier::new(Permission::Granted, Permission::Granted);
        let store = ClientStore::new();
        let poller = AlertPoller::new(time.clone(), source.clone(), notifier, store.clone());
        poller.start("555");
        settle().await;

        // When
        poller.start("666");
        settle().await;

        // Then
        assert_eq!(poller.monitored_phone().as_deref(), Some("666"));
        assert_eq!(source.calls(), 2);
        assert_eq!(critical_count(&store), 2);

        poller.stop();
    }

    #[tokio::test]
    async fn notify_platform__should_request_permission_at_most_once() {
        // Given
        let time = TestTime::new();
        let source = ScriptedSource::new([
            Some(AlertLevel::Red),
            Some(AlertLevel::Green),
            Some(AlertLevel::Red),
        ]);
        let notifier = TestNotifier::new(Permission::Default, Permission::Default);
        let poller = AlertPoller::new(time.clone(), source, notifier.clone(), ClientStore::new());

        // When
        poller.start("777");
        settle().await;
        time.trigger_all();
        settle().await;
        time.trigger_all();
        settle().await;

        // Then
        assert_eq!(notifier.requests.load(Ordering::SeqCst), 1);
        assert!(notifier.shown().is_empty());

        poller.stop();
    }

    #[tokio::test]
    async fn notify_platform__should_show_once_permission_is_granted() {
        // Given
        let time = TestTime::new();
        let source = ScriptedSource::new([Some(AlertLevel::Red)]);
        let notifier = TestNotifier::new(Permission::Default, Permission::Granted);
        let poller = AlertPoller::new(time, source, notifier.clone(), ClientStore::new());

        // When
        poller.start("888");
        settle().await;

        // Then
        let shown = notifier.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].tag, "emergency-alert");
        assert!(shown[0].require_interaction);

        poller.stop();
    }
}
