use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Marketplace account identifier supplied by the identity provider.
    UserId
);
record_id!(PropertyId);
record_id!(
    /// Identifier of a lead, persisted as a property inquiry.
    LeadId
);
record_id!(LeadNoteId);
record_id!(VisitId);
record_id!(DealId);
record_id!(DealNoteId);
record_id!(DealDocumentId);
record_id!(AuditEntryId);

/// Marketplace roles. Every request carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Seller,
    Agent,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buyer" => Some(Self::Buyer),
            "seller" => Some(Self::Seller),
            "agent" => Some(Self::Agent),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::Agent => "agent",
            Self::Admin => "admin",
        }
    }
}

/// Authenticated caller as asserted by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub const fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// True when the actor has `role` and is the user referenced by `owner`.
    pub fn is(&self, role: Role, owner: Option<UserId>) -> bool {
        self.role == role && owner == Some(self.id)
    }
}

/// Account record provided by the identity directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn is_active_agent(&self) -> bool {
        self.is_active && self.role == Role::Agent
    }
}

/// Listing lifecycle owned by the property directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Sold,
    Inactive,
}

impl PropertyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Sold => "sold",
            Self::Inactive => "inactive",
        }
    }
}

/// Property fields the pipeline reads from the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: PropertyId,
    pub title: String,
    pub location: Option<String>,
    pub price: Option<f64>,
    pub status: PropertyStatus,
    pub seller_id: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    VisitScheduled,
    Negotiation,
    Closed,
    Dropped,
}

impl LeadStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::New,
            Self::Contacted,
            Self::VisitScheduled,
            Self::Negotiation,
            Self::Closed,
            Self::Dropped,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::VisitScheduled => "visit_scheduled",
            Self::Negotiation => "negotiation",
            Self::Closed => "closed",
            Self::Dropped => "dropped",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Dropped)
    }

    /// Statuses from which a visit may be booked.
    pub const fn accepts_visits(self) -> bool {
        matches!(
            self,
            Self::Contacted | Self::VisitScheduled | Self::Negotiation
        )
    }
}

/// Buyer interest in a property, assigned to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    pub property_id: PropertyId,
    pub buyer_id: UserId,
    pub agent_id: Option<UserId>,
    pub status: LeadStatus,
    pub message: Option<String>,
    pub offer_price: Option<f64>,
    pub offer_message: Option<String>,
    pub offer_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub property_id: PropertyId,
    pub buyer_id: UserId,
    pub agent_id: Option<UserId>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadNote {
    pub id: LeadNoteId,
    pub lead_id: LeadId,
    pub agent_id: UserId,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLeadNote {
    pub lead_id: LeadId,
    pub agent_id: UserId,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
    NoShow,
}

impl VisitStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Rescheduled => "rescheduled",
            Self::NoShow => "no_show",
        }
    }
}

/// A property viewing booked against a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: VisitId,
    pub lead_id: LeadId,
    pub property_id: PropertyId,
    pub buyer_id: UserId,
    pub agent_id: Option<UserId>,
    pub visit_date: Option<NaiveDate>,
    pub visit_time: Option<NaiveTime>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// Scheduled time has been reached (inclusive of `now`).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at.is_some_and(|at| at <= now)
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at.is_some_and(|at| at < now)
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at.map_or(true, |at| at > now)
    }
}

/// Pick the visit that gates conversion: latest `scheduled_at` (unscheduled visits rank last),
/// then latest creation.
pub fn latest_visit<'a, I>(visits: I) -> Option<&'a Visit>
where
    I: IntoIterator<Item = &'a Visit>,
{
    visits.into_iter().max_by(|a, b| {
        let by_schedule = match (a.scheduled_at, b.scheduled_at) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => std::cmp::Ordering::Greater,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (None, None) => std::cmp::Ordering::Equal,
        };
        by_schedule
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVisit {
    pub lead_id: LeadId,
    pub property_id: PropertyId,
    pub buyer_id: UserId,
    pub agent_id: Option<UserId>,
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    pub scheduled_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Open,
    Negotiation,
    AgreementPending,
    ClosedWon,
    ClosedLost,
    Cancelled,
}

impl DealStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Open,
            Self::Negotiation,
            Self::AgreementPending,
            Self::ClosedWon,
            Self::ClosedLost,
            Self::Cancelled,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Negotiation => "negotiation",
            Self::AgreementPending => "agreement_pending",
            Self::ClosedWon => "closed_won",
            Self::ClosedLost => "closed_lost",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ClosedWon | Self::ClosedLost | Self::Cancelled)
    }

    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Offer price and cancellation are only open early in the negotiation.
    pub const fn allows_offer_changes(self) -> bool {
        matches!(self, Self::Open | Self::Negotiation)
    }

    pub const fn allows_document_changes(self) -> bool {
        matches!(self, Self::Negotiation | Self::AgreementPending)
    }
}

/// Binding negotiation record created from a qualifying lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: DealId,
    pub lead_id: Option<LeadId>,
    pub property_id: PropertyId,
    pub buyer_id: UserId,
    pub seller_id: Option<UserId>,
    pub agent_id: Option<UserId>,
    pub offer_price: Option<f64>,
    pub final_price: Option<f64>,
    pub status: DealStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// Admins, plus the buyer, seller, or assigned agent acting in that role.
    pub fn involves(&self, actor: &Actor) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Buyer => self.buyer_id == actor.id,
            Role::Seller => self.seller_id == Some(actor.id),
            Role::Agent => self.agent_id == Some(actor.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDeal {
    pub lead_id: LeadId,
    pub property_id: PropertyId,
    pub buyer_id: UserId,
    pub seller_id: Option<UserId>,
    pub agent_id: Option<UserId>,
    pub offer_price: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealNote {
    pub id: DealNoteId,
    pub deal_id: DealId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDealNote {
    pub deal_id: DealId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealDocumentType {
    IdProof,
    Agreement,
    PaymentProof,
    Invoice,
}

/// Metadata for a file attached to a deal. The bytes live in external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealDocument {
    pub id: DealDocumentId,
    pub deal_id: DealId,
    pub uploaded_by: UserId,
    pub doc_type: Option<DealDocumentType>,
    pub filename: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDealDocument {
    pub deal_id: DealId,
    pub uploaded_by: UserId,
    pub doc_type: Option<DealDocumentType>,
    pub filename: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DealCreated,
    StatusChanged,
    DealClosedWon,
    DealClosedLost,
    OfferUpdated,
    DealCancelled,
    AgentChanged,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::DealCreated => "deal_created",
            Self::StatusChanged => "status_changed",
            Self::DealClosedWon => "deal_closed_won",
            Self::DealClosedLost => "deal_closed_lost",
            Self::OfferUpdated => "offer_updated",
            Self::DealCancelled => "deal_cancelled",
            Self::AgentChanged => "agent_changed",
        }
    }
}

/// Immutable trace of a deal mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealAuditEntry {
    pub id: AuditEntryId,
    pub deal_id: DealId,
    pub actor_id: Option<UserId>,
    pub action: AuditAction,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub deal_id: DealId,
    pub actor_id: Option<UserId>,
    pub action: AuditAction,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Display fields for a user joined into read models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl From<&UserAccount> for PartySummary {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
        }
    }
}

/// Display fields for a property joined into read models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySummary {
    pub id: PropertyId,
    pub title: String,
    pub location: Option<String>,
    pub price: Option<f64>,
    pub status: PropertyStatus,
    pub seller_id: Option<UserId>,
}

impl From<&PropertyRecord> for PropertySummary {
    fn from(record: &PropertyRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            location: record.location.clone(),
            price: record.price,
            status: record.status,
            seller_id: record.seller_id,
        }
    }
}

/// Lead joined with display fields and the derived pipeline flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadView {
    #[serde(flatten)]
    pub lead: Lead,
    pub has_active_deal: bool,
    pub has_completed_visit: bool,
    pub latest_visit_id: Option<VisitId>,
    pub latest_visit_status: Option<VisitStatus>,
    pub latest_visit_scheduled_at: Option<DateTime<Utc>>,
    pub latest_visit_completed: bool,
    pub property: Option<PropertySummary>,
    pub buyer: Option<PartySummary>,
    pub agent: Option<PartySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitView {
    #[serde(flatten)]
    pub visit: Visit,
    pub property: Option<PropertySummary>,
    pub buyer: Option<PartySummary>,
    pub agent: Option<PartySummary>,
}

/// Lead fields echoed on a deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub id: LeadId,
    pub status: LeadStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealView {
    #[serde(flatten)]
    pub deal: Deal,
    pub property: Option<PropertySummary>,
    pub buyer: Option<PartySummary>,
    pub agent: Option<PartySummary>,
    pub lead: Option<LeadSummary>,
}
