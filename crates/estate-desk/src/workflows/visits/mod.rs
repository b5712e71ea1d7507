//! Visit Scheduler: viewings booked against a lead, with time-gated completion and cancellation.

pub mod router;
pub mod service;

pub use router::visit_router;
pub use service::{
    CreateVisitRequest, ReassignVisitRequest, RescheduleVisitRequest, SetVisitStatusRequest,
    VisitListQuery, VisitScheduler,
};
