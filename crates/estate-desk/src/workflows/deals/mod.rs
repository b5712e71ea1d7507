//! Deal Engine and the lead-to-deal conversion coordinator.

pub mod conversion;
pub mod ledger;
pub mod router;
pub mod service;

pub use conversion::ConvertLeadRequest;
pub use ledger::{AddDealDocumentRequest, AddDealNoteRequest};
pub use router::deal_router;
pub use service::{
    DealEngine, DealListQuery, ReassignDealRequest, UpdateDealOfferRequest,
    UpdateDealStatusRequest,
};
