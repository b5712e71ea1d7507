use chrono::NaiveDate;

use super::domain::{
    Deal, DealAuditEntry, DealDocument, DealDocumentId, DealId, DealNote, DealStatus, Lead,
    LeadId, LeadNote, LeadStatus, NewAuditEntry, NewDeal, NewDealDocument, NewDealNote, NewLead,
    NewLeadNote, NewVisit, PropertyId, PropertyRecord, PropertyStatus, UserAccount, UserId, Visit,
    VisitId, VisitStatus,
};
use super::pagination::PageRequest;

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFilter {
    pub buyer_id: Option<UserId>,
    pub agent_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
    pub status: Option<LeadStatus>,
    /// Case-insensitive match on property title, buyer name or email, and agent name.
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitFilter {
    pub buyer_id: Option<UserId>,
    pub agent_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
    pub seller_id: Option<UserId>,
    pub status: Option<VisitStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealFilter {
    pub buyer_id: Option<UserId>,
    pub agent_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
    pub seller_id: Option<UserId>,
    pub status: Option<DealStatus>,
    /// Inclusive bounds on the creation date.
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
}

/// Lead storage. Listings are newest first.
pub trait LeadRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] when the (property, buyer) pair already has a lead.
    fn insert_lead(&self, lead: NewLead) -> Result<Lead, RepositoryError>;
    fn fetch_lead(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError>;
    fn list_leads(
        &self,
        filter: &LeadFilter,
        page: PageRequest,
    ) -> Result<Vec<Lead>, RepositoryError>;
    /// Leads assigned to `agent` that are not closed or dropped.
    fn open_lead_count(&self, agent: UserId) -> Result<usize, RepositoryError>;
    fn insert_lead_note(&self, note: NewLeadNote) -> Result<LeadNote, RepositoryError>;
    fn lead_notes(&self, lead: LeadId) -> Result<Vec<LeadNote>, RepositoryError>;
}

/// Visit storage. Listings are ordered by visit date, then time, then creation, newest first.
pub trait VisitRepository: Send + Sync {
    fn fetch_visit(&self, id: VisitId) -> Result<Option<Visit>, RepositoryError>;
    fn visits_for_lead(&self, lead: LeadId) -> Result<Vec<Visit>, RepositoryError>;
    fn list_visits(
        &self,
        filter: &VisitFilter,
        page: PageRequest,
    ) -> Result<Vec<Visit>, RepositoryError>;
}

/// Deal storage plus the append-only note, document, and audit records keyed by deal.
pub trait DealRepository: Send + Sync {
    fn fetch_deal(&self, id: DealId) -> Result<Option<Deal>, RepositoryError>;
    fn active_deal_for_lead(&self, lead: LeadId) -> Result<Option<Deal>, RepositoryError>;
    fn list_deals(
        &self,
        filter: &DealFilter,
        page: PageRequest,
    ) -> Result<Vec<Deal>, RepositoryError>;
    fn insert_deal_note(&self, note: NewDealNote) -> Result<DealNote, RepositoryError>;
    fn deal_notes(&self, deal: DealId) -> Result<Vec<DealNote>, RepositoryError>;
    fn insert_document(&self, document: NewDealDocument) -> Result<DealDocument, RepositoryError>;
    fn fetch_document(
        &self,
        deal: DealId,
        document: DealDocumentId,
    ) -> Result<Option<DealDocument>, RepositoryError>;
    fn delete_document(
        &self,
        deal: DealId,
        document: DealDocumentId,
    ) -> Result<(), RepositoryError>;
    fn deal_documents(&self, deal: DealId) -> Result<Vec<DealDocument>, RepositoryError>;
    fn append_audit(&self, entry: NewAuditEntry) -> Result<DealAuditEntry, RepositoryError>;
    /// Newest entry first.
    fn audit_trail(&self, deal: DealId) -> Result<Vec<DealAuditEntry>, RepositoryError>;
}

/// Property collaborator: read ownership and status, receive status mutations.
pub trait PropertyDirectory: Send + Sync {
    fn property(&self, id: PropertyId) -> Result<Option<PropertyRecord>, RepositoryError>;
    fn set_property_status(
        &self,
        id: PropertyId,
        status: PropertyStatus,
    ) -> Result<(), RepositoryError>;
}

/// Identity collaborator: account lookups for joins and agent assignment.
pub trait UserDirectory: Send + Sync {
    fn user(&self, id: UserId) -> Result<Option<UserAccount>, RepositoryError>;
    fn active_agents(&self) -> Result<Vec<UserAccount>, RepositoryError>;
}

/// Unit of work over the pipeline tables.
///
/// `lock_*` calls take an exclusive row lock held until the transaction ends, waiting for other
/// holders first. `update_*` calls lock the row implicitly. Writes stay invisible to other readers
/// until [`PipelineTransaction::commit`]; dropping an uncommitted transaction discards them.
pub trait PipelineTransaction {
    fn lock_lead(&mut self, id: LeadId) -> Result<Option<Lead>, RepositoryError>;
    fn lock_property(&mut self, id: PropertyId) -> Result<Option<PropertyRecord>, RepositoryError>;
    fn lock_visit(&mut self, id: VisitId) -> Result<Option<Visit>, RepositoryError>;
    /// Lock the visit that currently ranks latest for `lead`.
    fn lock_latest_visit(&mut self, lead: LeadId) -> Result<Option<Visit>, RepositoryError>;
    fn lock_deal(&mut self, id: DealId) -> Result<Option<Deal>, RepositoryError>;
    fn active_deal_for_lead(&mut self, lead: LeadId) -> Result<Option<Deal>, RepositoryError>;
    fn insert_visit(&mut self, visit: NewVisit) -> Result<Visit, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] if the lead already has an active deal.
    fn insert_deal(&mut self, deal: NewDeal) -> Result<Deal, RepositoryError>;
    fn update_lead(&mut self, lead: Lead) -> Result<(), RepositoryError>;
    fn update_visit(&mut self, visit: Visit) -> Result<(), RepositoryError>;
    fn update_deal(&mut self, deal: Deal) -> Result<(), RepositoryError>;
    fn set_property_status(
        &mut self,
        id: PropertyId,
        status: PropertyStatus,
    ) -> Result<(), RepositoryError>;
    /// Publish staged writes atomically. Re-checks the one-active-deal-per-lead index.
    fn commit(self) -> Result<(), RepositoryError>
    where
        Self: Sized;
}

/// Everything the services need from storage.
pub trait PipelineStore:
    LeadRepository + VisitRepository + DealRepository + PropertyDirectory + UserDirectory + 'static
{
    type Transaction<'a>: PipelineTransaction
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Transaction<'_>, RepositoryError>;
}

