pub mod alerts;
pub mod notify;
pub mod places;
pub mod store;
pub mod time;

pub use alerts::AlertSource;
pub use notify::{Permission, PlatformNotifier};
pub use places::PlacesSearch;
pub use store::RecordStore;
pub use time::TimeProvider;
