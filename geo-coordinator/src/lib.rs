pub mod event;
pub mod registry;
pub mod state;
pub mod store;

pub use event::{Event, EventBus, Subscriber};
pub use registry::{RegionState, RegionStatus, WorkerState, WorkerStatus, WorkerUpdate, KNOWN_REGIONS};
pub use state::{Coordinator, StatusSnapshot};
pub use store::Store;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
