use crate::ports::RecordStore;
use crate::store::StoreError;
use crate::types::records::{AlertLevel, SosEvent, UpsertOutcome, UserRecord, UserUpsert};

use futures::future::{BoxFuture, FutureExt, ready};

use std::collections::HashMap;
use std::sync::Mutex;

/// Process-wide tables kept in memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    sos_events: Vec<SosEvent>,
}

impl MemoryStore {
    pub fn user_count(&self) -> usize {
        self.tables.lock().expect("record tables lock").users.len()
    }

    pub fn sos_events(&self) -> Vec<SosEvent> {
        self.tables
            .lock()
            .expect("record tables lock")
            .sos_events
            .clone()
    }

    fn upsert(&self, user: UserUpsert) -> UpsertOutcome {
        let mut tables = self.tables.lock().expect("record tables lock");
        match tables.users.get_mut(&user.phone) {
            Some(existing) => {
                user.apply_to(existing);
                UpsertOutcome::Updated
            }
            None => {
                tables.users.insert(user.phone.clone(), user.into_record());
                UpsertOutcome::Created
            }
        }
    }
}

impl RecordStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn upsert_user(&self, user: UserUpsert) -> BoxFuture<'_, Result<UpsertOutcome, StoreError>> {
        ready(Ok(self.upsert(user))).boxed()
    }

    fn find_user<'a>(
        &'a self,
        phone: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, StoreError>> {
        let tables = self.tables.lock().expect("record tables lock");
        ready(Ok(tables.users.get(phone).cloned())).boxed()
    }

    fn set_alert_status<'a>(
        &'a self,
        phone: &'a str,
        level: AlertLevel,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        let mut tables = self.tables.lock().expect("record tables lock");
        let found = match tables.users.get_mut(phone) {
            Some(user) => {
                user.alert_status = level;
                true
            }
            None => false,
        };
        ready(Ok(found)).boxed()
    }

    fn append_sos(&self, event: SosEvent) -> BoxFuture<'_, Result<(), StoreError>> {
        self.tables
            .lock()
            .expect("record tables lock")
            .sos_events
            .push(event);
        ready(Ok(())).boxed()
    }
}
