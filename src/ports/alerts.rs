use crate::types::records::AlertStatusView;

/// Reads one user's alert flag, as the poller sees it.
pub trait AlertSource: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<AlertStatusView, Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn fetch_status<'a>(&'a self, phone: &'a str) -> Self::Fut<'a>;
}
