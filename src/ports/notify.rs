use crate::types::notifications::PlatformNotification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not asked yet, or dismissed without an answer.
    Default,
}

pub trait PlatformNotifier: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Permission> + Send + 'a
    where
        Self: 'a;

    fn permission(&self) -> Permission;
    fn request_permission<'a>(&'a self) -> Self::Fut<'a>;
    fn show(&self, notification: &PlatformNotification);
}
