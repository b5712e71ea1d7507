//! Transactional in-memory store backing the service binary and the test suite.
//!
//! Committed rows live in [`Tables`] behind a single mutex. Transactions stage their writes
//! privately and publish them in one step on commit. Row locks live in a separate lock table so a
//! transaction can wait on a contended row without holding the table mutex; every path takes a row
//! lock before the table mutex, never the other way round.

mod locks;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::config::StoreConfig;

use super::domain::{
    latest_visit, Deal, DealAuditEntry, DealDocument, DealDocumentId, DealId, DealNote,
    DealNoteId, DealStatus, Lead, LeadId, LeadNote, LeadNoteId, LeadStatus, NewAuditEntry,
    NewDeal, NewDealDocument, NewDealNote, NewLead, NewLeadNote, NewVisit, PropertyId,
    PropertyRecord, PropertyStatus, UserAccount, UserId, Visit, VisitId, VisitStatus,
    AuditEntryId,
};
use super::pagination::PageRequest;
use super::repository::{
    DealFilter, DealRepository, LeadFilter, LeadRepository, PipelineStore, PipelineTransaction,
    PropertyDirectory, RepositoryError, UserDirectory, VisitFilter, VisitRepository,
};
use locks::{RowKey, RowLockGuard, RowLocks};

#[derive(Debug, Default)]
struct Sequences {
    lead: u64,
    lead_note: u64,
    visit: u64,
    deal: u64,
    deal_note: u64,
    document: u64,
    audit: u64,
}

fn next(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, UserAccount>,
    properties: HashMap<PropertyId, PropertyRecord>,
    leads: BTreeMap<LeadId, Lead>,
    lead_notes: Vec<LeadNote>,
    visits: BTreeMap<VisitId, Visit>,
    deals: BTreeMap<DealId, Deal>,
    deal_notes: Vec<DealNote>,
    documents: BTreeMap<DealDocumentId, DealDocument>,
    audit: Vec<DealAuditEntry>,
    sequences: Sequences,
}

impl Tables {
    fn lead_matches(&self, lead: &Lead, filter: &LeadFilter) -> bool {
        filter.buyer_id.map_or(true, |id| lead.buyer_id == id)
            && filter.agent_id.map_or(true, |id| lead.agent_id == Some(id))
            && filter.property_id.map_or(true, |id| lead.property_id == id)
            && filter.status.map_or(true, |status| lead.status == status)
            && filter
                .query
                .as_deref()
                .map(str::trim)
                .filter(|query| !query.is_empty())
                .map_or(true, |query| self.lead_matches_query(lead, &query.to_lowercase()))
    }

    fn lead_matches_query(&self, lead: &Lead, needle: &str) -> bool {
        let contains = |text: &str| text.to_lowercase().contains(needle);

        let property = self
            .properties
            .get(&lead.property_id)
            .is_some_and(|property| contains(&property.title));
        let buyer = self
            .users
            .get(&lead.buyer_id)
            .is_some_and(|buyer| contains(&buyer.name) || contains(&buyer.email));
        let agent = lead
            .agent_id
            .and_then(|id| self.users.get(&id))
            .is_some_and(|agent| contains(&agent.name));

        property || buyer || agent
    }

    fn seller_of(&self, property: PropertyId) -> Option<UserId> {
        self.properties
            .get(&property)
            .and_then(|record| record.seller_id)
    }

    fn visit_matches(&self, visit: &Visit, filter: &VisitFilter) -> bool {
        let date = visit.visit_date;
        let after_from = filter
            .from
            .map_or(true, |from| date.is_some_and(|date| date >= from));
        let before_to = filter
            .to
            .map_or(true, |to| date.is_some_and(|date| date <= to));

        filter.buyer_id.map_or(true, |id| visit.buyer_id == id)
            && filter.agent_id.map_or(true, |id| visit.agent_id == Some(id))
            && filter.property_id.map_or(true, |id| visit.property_id == id)
            && filter
                .seller_id
                .map_or(true, |id| self.seller_of(visit.property_id) == Some(id))
            && filter.status.map_or(true, |status| visit.status == status)
            && after_from
            && before_to
    }

    fn deal_matches(&self, deal: &Deal, filter: &DealFilter) -> bool {
        let created = deal.created_at.date_naive();
        filter.buyer_id.map_or(true, |id| deal.buyer_id == id)
            && filter.agent_id.map_or(true, |id| deal.agent_id == Some(id))
            && filter.property_id.map_or(true, |id| deal.property_id == id)
            && filter
                .seller_id
                .map_or(true, |id| deal.seller_id == Some(id))
            && filter.status.map_or(true, |status| deal.status == status)
            && filter.created_from.map_or(true, |from| created >= from)
            && filter.created_to.map_or(true, |to| created <= to)
    }
}

/// Pipeline store with row-level locking over in-process tables.
#[derive(Debug)]
pub struct InMemoryPipelineStore {
    tables: Mutex<Tables>,
    locks: RowLocks,
    lock_timeout: Duration,
}

impl Default for InMemoryPipelineStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl InMemoryPipelineStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            locks: RowLocks::default(),
            lock_timeout: config.lock_timeout,
        }
    }

    /// Register or replace an account in the identity directory.
    pub fn upsert_user(&self, account: UserAccount) -> Result<(), RepositoryError> {
        self.tables()?.users.insert(account.id, account);
        Ok(())
    }

    /// Register or replace a listing in the property directory.
    pub fn upsert_property(&self, record: PropertyRecord) -> Result<(), RepositoryError> {
        let _row = self
            .locks
            .acquire(RowKey::Property(record.id), self.lock_timeout)?;
        self.tables()?.properties.insert(record.id, record);
        Ok(())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("pipeline tables poisoned".to_string()))
    }
}

fn newest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

impl LeadRepository for InMemoryPipelineStore {
    fn insert_lead(&self, lead: NewLead) -> Result<Lead, RepositoryError> {
        let mut tables = self.tables()?;
        let duplicate = tables
            .leads
            .values()
            .any(|existing| {
                existing.property_id == lead.property_id && existing.buyer_id == lead.buyer_id
            });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        let id = LeadId(next(&mut tables.sequences.lead));
        let record = Lead {
            id,
            property_id: lead.property_id,
            buyer_id: lead.buyer_id,
            agent_id: lead.agent_id,
            status: LeadStatus::New,
            message: lead.message,
            offer_price: None,
            offer_message: None,
            offer_updated_at: None,
            created_at: lead.created_at,
            updated_at: lead.created_at,
        };
        tables.leads.insert(id, record.clone());
        Ok(record)
    }

    fn fetch_lead(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.tables()?.leads.get(&id).cloned())
    }

    fn list_leads(
        &self,
        filter: &LeadFilter,
        page: PageRequest,
    ) -> Result<Vec<Lead>, RepositoryError> {
        let tables = self.tables()?;
        let mut leads: Vec<Lead> = tables
            .leads
            .values()
            .filter(|lead| tables.lead_matches(lead, filter))
            .cloned()
            .collect();
        newest_first(&mut leads, |lead| (lead.created_at, lead.id));
        Ok(page.apply(leads))
    }

    fn open_lead_count(&self, agent: UserId) -> Result<usize, RepositoryError> {
        Ok(self
            .tables()?
            .leads
            .values()
            .filter(|lead| lead.agent_id == Some(agent) && !lead.status.is_terminal())
            .count())
    }

    fn insert_lead_note(&self, note: NewLeadNote) -> Result<LeadNote, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.leads.contains_key(&note.lead_id) {
            return Err(RepositoryError::NotFound);
        }
        let record = LeadNote {
            id: LeadNoteId(next(&mut tables.sequences.lead_note)),
            lead_id: note.lead_id,
            agent_id: note.agent_id,
            note: note.note,
            created_at: note.created_at,
        };
        tables.lead_notes.push(record.clone());
        Ok(record)
    }

    fn lead_notes(&self, lead: LeadId) -> Result<Vec<LeadNote>, RepositoryError> {
        let tables = self.tables()?;
        let mut notes: Vec<LeadNote> = tables
            .lead_notes
            .iter()
            .filter(|note| note.lead_id == lead)
            .cloned()
            .collect();
        newest_first(&mut notes, |note| (note.created_at, note.id));
        Ok(notes)
    }
}

impl VisitRepository for InMemoryPipelineStore {
    fn fetch_visit(&self, id: VisitId) -> Result<Option<Visit>, RepositoryError> {
        Ok(self.tables()?.visits.get(&id).cloned())
    }

    fn visits_for_lead(&self, lead: LeadId) -> Result<Vec<Visit>, RepositoryError> {
        Ok(self
            .tables()?
            .visits
            .values()
            .filter(|visit| visit.lead_id == lead)
            .cloned()
            .collect())
    }

    fn list_visits(
        &self,
        filter: &VisitFilter,
        page: PageRequest,
    ) -> Result<Vec<Visit>, RepositoryError> {
        let tables = self.tables()?;
        let mut visits: Vec<Visit> = tables
            .visits
            .values()
            .filter(|visit| tables.visit_matches(visit, filter))
            .cloned()
            .collect();
        newest_first(&mut visits, |visit| {
            (visit.visit_date, visit.visit_time, visit.created_at, visit.id)
        });
        Ok(page.apply(visits))
    }
}

impl DealRepository for InMemoryPipelineStore {
    fn fetch_deal(&self, id: DealId) -> Result<Option<Deal>, RepositoryError> {
        Ok(self.tables()?.deals.get(&id).cloned())
    }

    fn active_deal_for_lead(&self, lead: LeadId) -> Result<Option<Deal>, RepositoryError> {
        Ok(self
            .tables()?
            .deals
            .values()
            .find(|deal| deal.lead_id == Some(lead) && deal.status.is_active())
            .cloned())
    }

    fn list_deals(
        &self,
        filter: &DealFilter,
        page: PageRequest,
    ) -> Result<Vec<Deal>, RepositoryError> {
        let tables = self.tables()?;
        let mut deals: Vec<Deal> = tables
            .deals
            .values()
            .filter(|deal| tables.deal_matches(deal, filter))
            .cloned()
            .collect();
        newest_first(&mut deals, |deal| (deal.created_at, deal.id));
        Ok(page.apply(deals))
    }

    fn insert_deal_note(&self, note: NewDealNote) -> Result<DealNote, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.deals.contains_key(&note.deal_id) {
            return Err(RepositoryError::NotFound);
        }
        let record = DealNote {
            id: DealNoteId(next(&mut tables.sequences.deal_note)),
            deal_id: note.deal_id,
            author_id: note.author_id,
            content: note.content,
            created_at: note.created_at,
        };
        tables.deal_notes.push(record.clone());
        Ok(record)
    }

    fn deal_notes(&self, deal: DealId) -> Result<Vec<DealNote>, RepositoryError> {
        let tables = self.tables()?;
        let mut notes: Vec<DealNote> = tables
            .deal_notes
            .iter()
            .filter(|note| note.deal_id == deal)
            .cloned()
            .collect();
        newest_first(&mut notes, |note| (note.created_at, note.id));
        Ok(notes)
    }

    fn insert_document(&self, document: NewDealDocument) -> Result<DealDocument, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.deals.contains_key(&document.deal_id) {
            return Err(RepositoryError::NotFound);
        }
        let id = DealDocumentId(next(&mut tables.sequences.document));
        let record = DealDocument {
            id,
            deal_id: document.deal_id,
            uploaded_by: document.uploaded_by,
            doc_type: document.doc_type,
            filename: document.filename,
            url: document.url,
            created_at: document.created_at,
        };
        tables.documents.insert(id, record.clone());
        Ok(record)
    }

    fn fetch_document(
        &self,
        deal: DealId,
        document: DealDocumentId,
    ) -> Result<Option<DealDocument>, RepositoryError> {
        Ok(self
            .tables()?
            .documents
            .get(&document)
            .filter(|record| record.deal_id == deal)
            .cloned())
    }

    fn delete_document(
        &self,
        deal: DealId,
        document: DealDocumentId,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        match tables.documents.get(&document) {
            Some(record) if record.deal_id == deal => {
                tables.documents.remove(&document);
                Ok(())
            }
            _ => Err(RepositoryError::NotFound),
        }
    }

    fn deal_documents(&self, deal: DealId) -> Result<Vec<DealDocument>, RepositoryError> {
        let tables = self.tables()?;
        let mut documents: Vec<DealDocument> = tables
            .documents
            .values()
            .filter(|document| document.deal_id == deal)
            .cloned()
            .collect();
        newest_first(&mut documents, |document| (document.created_at, document.id));
        Ok(documents)
    }

    fn append_audit(&self, entry: NewAuditEntry) -> Result<DealAuditEntry, RepositoryError> {
        let mut tables = self.tables()?;
        let record = DealAuditEntry {
            id: AuditEntryId(next(&mut tables.sequences.audit)),
            deal_id: entry.deal_id,
            actor_id: entry.actor_id,
            action: entry.action,
            metadata: entry.metadata,
            created_at: entry.created_at,
        };
        tables.audit.push(record.clone());
        Ok(record)
    }

    fn audit_trail(&self, deal: DealId) -> Result<Vec<DealAuditEntry>, RepositoryError> {
        let tables = self.tables()?;
        let mut entries: Vec<DealAuditEntry> = tables
            .audit
            .iter()
            .filter(|entry| entry.deal_id == deal)
            .cloned()
            .collect();
        newest_first(&mut entries, |entry| (entry.created_at, entry.id));
        Ok(entries)
    }
}

impl PropertyDirectory for InMemoryPipelineStore {
    fn property(&self, id: PropertyId) -> Result<Option<PropertyRecord>, RepositoryError> {
        Ok(self.tables()?.properties.get(&id).cloned())
    }

    fn set_property_status(
        &self,
        id: PropertyId,
        status: PropertyStatus,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.begin()?;
        tx.set_property_status(id, status)?;
        tx.commit()
    }
}

impl UserDirectory for InMemoryPipelineStore {
    fn user(&self, id: UserId) -> Result<Option<UserAccount>, RepositoryError> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    fn active_agents(&self) -> Result<Vec<UserAccount>, RepositoryError> {
        let mut agents: Vec<UserAccount> = self
            .tables()?
            .users
            .values()
            .filter(|account| account.is_active_agent())
            .cloned()
            .collect();
        agents.sort_by_key(|account| (account.created_at, account.id));
        Ok(agents)
    }
}

impl PipelineStore for InMemoryPipelineStore {
    type Transaction<'a> = MemoryTransaction<'a>;

    fn begin(&self) -> Result<Self::Transaction<'_>, RepositoryError> {
        Ok(MemoryTransaction {
            store: self,
            staged: Staged::default(),
            held: HashSet::new(),
            guards: Vec::new(),
        })
    }
}

#[derive(Debug, Default)]
struct Staged {
    leads: BTreeMap<LeadId, Lead>,
    visits: BTreeMap<VisitId, Visit>,
    deals: BTreeMap<DealId, Deal>,
    property_status: BTreeMap<PropertyId, PropertyStatus>,
}

/// Open transaction against [`InMemoryPipelineStore`]. Dropping it rolls back.
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    store: &'a InMemoryPipelineStore,
    staged: Staged,
    held: HashSet<RowKey>,
    guards: Vec<RowLockGuard<'a>>,
}

impl<'a> MemoryTransaction<'a> {
    fn lock(&mut self, key: RowKey) -> Result<(), RepositoryError> {
        if self.held.contains(&key) {
            return Ok(());
        }
        let guard = self.store.locks.acquire(key, self.store.lock_timeout)?;
        self.held.insert(key);
        self.guards.push(guard);
        Ok(())
    }

    fn current_lead(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        if let Some(lead) = self.staged.leads.get(&id) {
            return Ok(Some(lead.clone()));
        }
        Ok(self.store.tables()?.leads.get(&id).cloned())
    }

    fn current_visit(&self, id: VisitId) -> Result<Option<Visit>, RepositoryError> {
        if let Some(visit) = self.staged.visits.get(&id) {
            return Ok(Some(visit.clone()));
        }
        Ok(self.store.tables()?.visits.get(&id).cloned())
    }

    fn current_deal(&self, id: DealId) -> Result<Option<Deal>, RepositoryError> {
        if let Some(deal) = self.staged.deals.get(&id) {
            return Ok(Some(deal.clone()));
        }
        Ok(self.store.tables()?.deals.get(&id).cloned())
    }

    fn current_property(&self, id: PropertyId) -> Result<Option<PropertyRecord>, RepositoryError> {
        let record = self.store.tables()?.properties.get(&id).cloned();
        Ok(record.map(|mut record| {
            if let Some(status) = self.staged.property_status.get(&id) {
                record.status = *status;
            }
            record
        }))
    }

    fn lead_visits(&self, lead: LeadId) -> Result<Vec<Visit>, RepositoryError> {
        let mut visits: BTreeMap<VisitId, Visit> = self
            .store
            .tables()?
            .visits
            .values()
            .filter(|visit| visit.lead_id == lead)
            .map(|visit| (visit.id, visit.clone()))
            .collect();
        for visit in self.staged.visits.values().filter(|visit| visit.lead_id == lead) {
            visits.insert(visit.id, visit.clone());
        }
        Ok(visits.into_values().collect())
    }

    fn latest_visit_id(&self, lead: LeadId) -> Result<Option<VisitId>, RepositoryError> {
        let visits = self.lead_visits(lead)?;
        Ok(latest_visit(&visits).map(|visit| visit.id))
    }
}

impl PipelineTransaction for MemoryTransaction<'_> {
    fn lock_lead(&mut self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        self.lock(RowKey::Lead(id))?;
        self.current_lead(id)
    }

    fn lock_property(&mut self, id: PropertyId) -> Result<Option<PropertyRecord>, RepositoryError> {
        self.lock(RowKey::Property(id))?;
        self.current_property(id)
    }

    fn lock_visit(&mut self, id: VisitId) -> Result<Option<Visit>, RepositoryError> {
        self.lock(RowKey::Visit(id))?;
        self.current_visit(id)
    }

    fn lock_latest_visit(&mut self, lead: LeadId) -> Result<Option<Visit>, RepositoryError> {
        // A reschedule may reorder the visits while we wait, so confirm the ranking once locked.
        loop {
            let Some(candidate) = self.latest_visit_id(lead)? else {
                return Ok(None);
            };
            self.lock(RowKey::Visit(candidate))?;
            if self.latest_visit_id(lead)? == Some(candidate) {
                return self.current_visit(candidate);
            }
        }
    }

    fn lock_deal(&mut self, id: DealId) -> Result<Option<Deal>, RepositoryError> {
        self.lock(RowKey::Deal(id))?;
        self.current_deal(id)
    }

    fn active_deal_for_lead(&mut self, lead: LeadId) -> Result<Option<Deal>, RepositoryError> {
        let committed: Vec<Deal> = self
            .store
            .tables()?
            .deals
            .values()
            .filter(|deal| deal.lead_id == Some(lead))
            .cloned()
            .collect();

        let staged_active = self
            .staged
            .deals
            .values()
            .find(|deal| deal.lead_id == Some(lead) && deal.status.is_active())
            .cloned();
        if staged_active.is_some() {
            return Ok(staged_active);
        }

        Ok(committed.into_iter().find(|deal| {
            let status = self
                .staged
                .deals
                .get(&deal.id)
                .map_or(deal.status, |staged| staged.status);
            status.is_active()
        }))
    }

    fn insert_visit(&mut self, visit: NewVisit) -> Result<Visit, RepositoryError> {
        let id = VisitId(next(&mut self.store.tables()?.sequences.visit));
        self.lock(RowKey::Visit(id))?;
        let record = Visit {
            id,
            lead_id: visit.lead_id,
            property_id: visit.property_id,
            buyer_id: visit.buyer_id,
            agent_id: visit.agent_id,
            visit_date: Some(visit.visit_date),
            visit_time: Some(visit.visit_time),
            scheduled_at: Some(visit.scheduled_at),
            status: VisitStatus::Scheduled,
            notes: visit.notes,
            created_by: visit.created_by,
            created_at: visit.created_at,
            updated_at: visit.created_at,
        };
        self.staged.visits.insert(id, record.clone());
        Ok(record)
    }

    fn insert_deal(&mut self, deal: NewDeal) -> Result<Deal, RepositoryError> {
        if self.active_deal_for_lead(deal.lead_id)?.is_some() {
            return Err(RepositoryError::Conflict);
        }

        let id = DealId(next(&mut self.store.tables()?.sequences.deal));
        self.lock(RowKey::Deal(id))?;
        let record = Deal {
            id,
            lead_id: Some(deal.lead_id),
            property_id: deal.property_id,
            buyer_id: deal.buyer_id,
            seller_id: deal.seller_id,
            agent_id: deal.agent_id,
            offer_price: Some(deal.offer_price),
            final_price: None,
            status: DealStatus::Open,
            notes: deal.notes,
            created_at: deal.created_at,
            updated_at: deal.created_at,
        };
        self.staged.deals.insert(id, record.clone());
        Ok(record)
    }

    fn update_lead(&mut self, lead: Lead) -> Result<(), RepositoryError> {
        self.lock(RowKey::Lead(lead.id))?;
        if self.current_lead(lead.id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.staged.leads.insert(lead.id, lead);
        Ok(())
    }

    fn update_visit(&mut self, visit: Visit) -> Result<(), RepositoryError> {
        self.lock(RowKey::Visit(visit.id))?;
        if self.current_visit(visit.id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.staged.visits.insert(visit.id, visit);
        Ok(())
    }

    fn update_deal(&mut self, deal: Deal) -> Result<(), RepositoryError> {
        self.lock(RowKey::Deal(deal.id))?;
        if self.current_deal(deal.id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.staged.deals.insert(deal.id, deal);
        Ok(())
    }

    fn set_property_status(
        &mut self,
        id: PropertyId,
        status: PropertyStatus,
    ) -> Result<(), RepositoryError> {
        self.lock(RowKey::Property(id))?;
        if self.current_property(id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.staged.property_status.insert(id, status);
        Ok(())
    }

    fn commit(self) -> Result<(), RepositoryError> {
        let MemoryTransaction {
            store,
            staged,
            guards,
            ..
        } = self;

        {
            let mut tables = store.tables()?;

            // Partial unique index: one active deal per lead after this commit.
            for deal in staged.deals.values().filter(|deal| deal.status.is_active()) {
                let Some(lead) = deal.lead_id else { continue };
                let clash = tables.deals.values().any(|existing| {
                    existing.id != deal.id
                        && existing.lead_id == Some(lead)
                        && staged
                            .deals
                            .get(&existing.id)
                            .map_or(existing.status, |next| next.status)
                            .is_active()
                });
                if clash {
                    tracing::warn!(lead_id = %lead, deal_id = %deal.id, "active deal index violated on commit");
                    return Err(RepositoryError::Conflict);
                }
            }

            tracing::debug!(
                leads = staged.leads.len(),
                visits = staged.visits.len(),
                deals = staged.deals.len(),
                properties = staged.property_status.len(),
                "transaction committed"
            );

            tables.leads.extend(staged.leads);
            tables.visits.extend(staged.visits);
            tables.deals.extend(staged.deals);
            for (id, status) in staged.property_status {
                if let Some(record) = tables.properties.get_mut(&id) {
                    record.status = status;
                }
            }
        }

        drop(guards);
        Ok(())
    }
}
