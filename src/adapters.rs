use std::time::Duration;

use time::OffsetDateTime;
use tracing::warn;

use crate::ports;
use crate::ports::Permission;
use crate::types::notifications::PlatformNotification;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimeProvider;

impl ports::TimeProvider for TokioTimeProvider {
    type Sleep<'a>
        = tokio::time::Sleep
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        tokio::time::sleep(duration)
    }
}

/// Platform notifications for headless runs: shown notifications go to the
/// log. The permission is fixed at construction and a request just reports it.
#[derive(Debug, Clone, Copy)]
pub struct LogNotifier {
    permission: Permission,
}

impl LogNotifier {
    pub fn new(permission: Permission) -> Self {
        Self { permission }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(Permission::Granted)
    }
}

impl ports::PlatformNotifier for LogNotifier {
    type Fut<'a>
        = std::future::Ready<Permission>
    where
        Self: 'a;

    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission<'a>(&'a self) -> Self::Fut<'a> {
        std::future::ready(self.permission)
    }

    fn show(&self, notification: &PlatformNotification) {
        warn!(
            title = %notification.title,
            body = %notification.body,
            tag = %notification.tag,
            "platform notification"
        );
    }
}
