pub mod clock;
pub mod deals;
pub mod domain;
mod error;
pub mod http;
pub mod leads;
pub mod memory;
pub mod notifications;
pub mod pagination;
pub mod repository;
mod router;
pub mod transitions;
mod validation;
mod views;
pub mod visits;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConflictReason, PipelineError};
pub use memory::InMemoryPipelineStore;
pub use notifications::{
    InMemoryNotificationOutbox, Notification, NotificationError, NotificationPublisher,
};
pub use pagination::{Page, PageRequest};
pub use repository::{PipelineStore, PipelineTransaction, RepositoryError};
pub use router::{pipeline_router, PipelineServices};
