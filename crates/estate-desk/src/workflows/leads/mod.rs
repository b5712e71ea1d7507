//! Lead Registry: buyer interest in a listing, routed to an agent and tracked through a
//! forward-only status pipeline.

pub mod router;
pub mod service;

pub use router::lead_router;
pub use service::{
    AddLeadNoteRequest, CreateLeadRequest, LeadListQuery, LeadRegistry, ReassignLeadRequest,
    SubmitOfferRequest, UpdateLeadStatusRequest,
};
