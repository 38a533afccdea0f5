use crate::store::StoreError;
use crate::types::records::{AlertLevel, SosEvent, UpsertOutcome, UserRecord, UserUpsert};

use futures::future::BoxFuture;

/// Persistence for user profiles and SOS events.
///
/// Handlers hold the store as `Arc<dyn RecordStore>`, so the futures are boxed.
/// Every write is last-write-wins; implementations keep the lookup and the
/// write for one phone inside a single critical section.
pub trait RecordStore: Send + Sync + 'static {
    fn backend(&self) -> &'static str;

    fn upsert_user(&self, user: UserUpsert) -> BoxFuture<'_, Result<UpsertOutcome, StoreError>>;

    fn find_user<'a>(
        &'a self,
        phone: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, StoreError>>;

    /// Returns `false` when no user with that phone exists.
    fn set_alert_status<'a>(
        &'a self,
        phone: &'a str,
        level: AlertLevel,
    ) -> BoxFuture<'a, Result<bool, StoreError>>;

    fn append_sos(&self, event: SosEvent) -> BoxFuture<'_, Result<(), StoreError>>;
}
