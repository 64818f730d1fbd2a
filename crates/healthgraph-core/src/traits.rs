use crate::{BusinessService, Result, Status};

/// Lookup of the currently known severity for a reduction key. Consulted
/// only while priming a freshly built graph, for keys the previous graph
/// did not carry.
pub trait AlarmProvider: Send + Sync {
    /// `Ok(None)` when no alarm is known for the key.
    fn lookup(&self, reduction_key: &str) -> Result<Option<Status>>;
}

/// Callback invoked when the externally visible status of a business
/// service changes. Called synchronously while the engine holds its write
/// lock; implementations must be fast and must not re-enter the engine.
pub trait StatusChangeHandler: Send + Sync {
    fn status_changed(&self, service: &BusinessService, new_status: Status, previous: Status);
}
