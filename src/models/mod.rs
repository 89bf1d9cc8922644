pub mod credential;
pub mod event;
pub mod subscription;
pub mod sync;

pub use credential::Credential;
pub use event::{CalendarMetadata, RemoteEvent};
pub use subscription::Subscription;
pub use sync::{BatchResult, ReconcileStats, SyncResult};
