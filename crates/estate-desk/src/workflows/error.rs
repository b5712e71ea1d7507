use super::repository::RepositoryError;

/// Failure raised by the lead, visit, and deal services.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    Conflict(#[from] ConflictReason),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PipelineError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Machine-readable conflict code, if this is a conflict.
    pub fn conflict_code(&self) -> Option<&'static str> {
        match self {
            Self::Conflict(reason) => Some(reason.code()),
            Self::Repository(RepositoryError::Conflict) => Some("conflict"),
            _ => None,
        }
    }
}

/// State-machine and invariant violations. Every variant maps to a stable code callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ConflictReason {
    #[error("the inquiry has no assigned agent")]
    NoAssignedAgent,
    #[error("the property is already sold")]
    PropertySold,
    #[error("the property is inactive")]
    PropertyInactive,
    #[error("an active deal already exists for this inquiry")]
    DealExists,
    #[error("the inquiry is closed or dropped")]
    LeadClosedOrDropped,
    #[error("the inquiry must be in visit_scheduled or negotiation")]
    LeadInvalidStatus,
    #[error("a completed visit is required before creating a deal")]
    VisitRequired,
    #[error("the latest visit does not belong to the inquiry property")]
    VisitMismatch,
    #[error("the latest visit is not completed")]
    LatestVisitNotCompleted,
    #[error("the latest visit is marked completed but scheduled in the future")]
    VisitCompletedInFuture,
    #[error("an inquiry for this property already exists")]
    DuplicateLead,
    #[error("status transition is not allowed")]
    InvalidStatusTransition,
    #[error("visits can only be booked once the inquiry is contacted")]
    LeadNotContacted,
    #[error("the visit has no scheduled time")]
    VisitNotScheduled,
    #[error("the visit cannot be completed before its scheduled time")]
    VisitNotDue,
    #[error("the visit is already completed")]
    VisitCompleted,
    #[error("the visit time has already passed")]
    VisitTimePassed,
    #[error("the deal is already closed")]
    DealClosed,
    #[error("the offer can only change while the deal is open or in negotiation")]
    OfferLocked,
    #[error("the deal can only be cancelled while open or in negotiation")]
    CancellationLocked,
    #[error("final price cannot be below the offer price")]
    FinalPriceBelowOffer,
    #[error("documents can only change during negotiation or agreement_pending")]
    DocumentsLocked,
    #[error("notes cannot be added to a closed deal")]
    DealNotesLocked,
}

impl ConflictReason {
    pub const fn code(self) -> &'static str {
        match self {
            Self::NoAssignedAgent => "no_assigned_agent",
            Self::PropertySold => "property_sold",
            Self::PropertyInactive => "property_inactive",
            Self::DealExists => "deal_exists",
            Self::LeadClosedOrDropped => "lead_closed_or_dropped",
            Self::LeadInvalidStatus => "lead_invalid_status",
            Self::VisitRequired => "visit_required",
            Self::VisitMismatch => "visit_mismatch",
            Self::LatestVisitNotCompleted => "latest_visit_not_completed",
            Self::VisitCompletedInFuture => "visit_completed_in_future",
            Self::DuplicateLead => "duplicate_lead",
            Self::InvalidStatusTransition => "invalid_status_transition",
            Self::LeadNotContacted => "lead_not_contacted",
            Self::VisitNotScheduled => "visit_not_scheduled",
            Self::VisitNotDue => "visit_not_due",
            Self::VisitCompleted => "visit_completed",
            Self::VisitTimePassed => "visit_time_passed",
            Self::DealClosed => "deal_closed",
            Self::OfferLocked => "offer_locked",
            Self::CancellationLocked => "cancellation_locked",
            Self::FinalPriceBelowOffer => "final_price_below_offer",
            Self::DocumentsLocked => "documents_locked",
            Self::DealNotesLocked => "deal_notes_locked",
        }
    }
}
