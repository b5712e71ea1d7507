use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::workflows::clock::Clock;
use crate::workflows::domain::{
    Actor, AuditAction, DealId, LeadId, LeadNote, LeadStatus, LeadView, NewAuditEntry, NewLead,
    NewLeadNote, PropertyId, PropertyRecord, PropertyStatus, Role, UserAccount, UserId,
};
use crate::workflows::error::{ConflictReason, PipelineError};
use crate::workflows::pagination::{Page, PageLimits, PageRequest};
use crate::workflows::repository::{
    LeadFilter, PipelineStore, PipelineTransaction, RepositoryError,
};
use crate::workflows::transitions::lead_transition_allowed;
use crate::workflows::validation::{
    assignable_agent, optional_text, positive_price, require_role, required_text,
    LEAD_NOTE_MAX_CHARS, MESSAGE_MAX_CHARS,
};
use crate::workflows::views::lead_view;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub property_id: PropertyId,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLeadStatusRequest {
    pub status: LeadStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOfferRequest {
    pub offer_price: f64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddLeadNoteRequest {
    pub note: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignLeadRequest {
    pub agent_id: Option<UserId>,
}

/// Listing filters accepted by the lead reads. Each role honors a subset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<LeadStatus>,
    pub q: Option<String>,
    pub agent_id: Option<UserId>,
    pub buyer_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
}

/// Owns leads: intake, agent assignment, the status pipeline, buyer offers, and agent notes.
pub struct LeadRegistry<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for LeadRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: PipelineStore> LeadRegistry<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn create_lead(
        &self,
        actor: &Actor,
        request: CreateLeadRequest,
    ) -> Result<LeadView, PipelineError> {
        require_role(actor, &[Role::Buyer])?;
        let message = optional_text("message", request.message, MESSAGE_MAX_CHARS)?;

        let property = self
            .store
            .property(request.property_id)?
            .ok_or(PipelineError::NotFound("property"))?;
        match property.status {
            PropertyStatus::Approved => {}
            PropertyStatus::Sold => return Err(ConflictReason::PropertySold.into()),
            _ => return Err(PipelineError::NotFound("property")),
        }

        let agent = self.select_agent(&property)?;
        let lead = self
            .store
            .insert_lead(NewLead {
                property_id: property.id,
                buyer_id: actor.id,
                agent_id: agent.as_ref().map(|agent| agent.id),
                message,
                created_at: self.clock.now(),
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => PipelineError::from(ConflictReason::DuplicateLead),
                other => PipelineError::from(other),
            })?;

        tracing::info!(
            lead_id = %lead.id,
            property_id = %lead.property_id,
            buyer_id = %lead.buyer_id,
            agent_id = ?lead.agent_id,
            "lead created"
        );
        Ok(lead_view(self.store.as_ref(), lead)?)
    }

    /// Seller who is an active agent handles their own listing; otherwise the least-loaded agent.
    fn select_agent(&self, property: &PropertyRecord) -> Result<Option<UserAccount>, PipelineError> {
        if let Some(seller_id) = property.seller_id {
            if let Some(seller) = self.store.user(seller_id)? {
                if seller.is_active_agent() {
                    return Ok(Some(seller));
                }
            }
        }

        let mut best: Option<(usize, UserAccount)> = None;
        for agent in self.store.active_agents()? {
            let load = self.store.open_lead_count(agent.id)?;
            let better = match &best {
                None => true,
                Some((best_load, best_agent)) => {
                    (load, agent.created_at, agent.id)
                        < (*best_load, best_agent.created_at, best_agent.id)
                }
            };
            if better {
                best = Some((load, agent));
            }
        }
        Ok(best.map(|(_, agent)| agent))
    }

    /// Visible to the buyer, the assigned agent, the property's seller, and admins.
    pub fn get_lead(&self, actor: &Actor, id: LeadId) -> Result<LeadView, PipelineError> {
        let lead = self
            .store
            .fetch_lead(id)?
            .ok_or(PipelineError::NotFound("inquiry"))?;

        let allowed = match actor.role {
            Role::Admin => true,
            Role::Buyer => lead.buyer_id == actor.id,
            Role::Agent => lead.agent_id == Some(actor.id),
            Role::Seller => self
                .store
                .property(lead.property_id)?
                .is_some_and(|property| property.seller_id == Some(actor.id)),
        };
        if !allowed {
            return Err(PipelineError::NotFound("inquiry"));
        }

        Ok(lead_view(self.store.as_ref(), lead)?)
    }

    pub fn list_buyer_leads(
        &self,
        actor: &Actor,
        query: LeadListQuery,
    ) -> Result<Page<LeadView>, PipelineError> {
        require_role(actor, &[Role::Buyer])?;
        let page = PageRequest::resolve(query.page, query.limit, PageLimits::BUYER_LEADS)?;
        let filter = LeadFilter {
            buyer_id: Some(actor.id),
            status: query.status,
            ..LeadFilter::default()
        };
        self.list(&filter, page)
    }

    pub fn list_agent_leads(
        &self,
        actor: &Actor,
        query: LeadListQuery,
    ) -> Result<Page<LeadView>, PipelineError> {
        require_role(actor, &[Role::Agent])?;
        let page = PageRequest::resolve(query.page, query.limit, PageLimits::AGENT_LEADS)?;
        let filter = LeadFilter {
            agent_id: Some(actor.id),
            status: query.status,
            query: query.q,
            ..LeadFilter::default()
        };
        self.list(&filter, page)
    }

    pub fn list_admin_leads(
        &self,
        actor: &Actor,
        query: LeadListQuery,
    ) -> Result<Page<LeadView>, PipelineError> {
        require_role(actor, &[Role::Admin])?;
        let page = PageRequest::resolve(query.page, query.limit, PageLimits::ADMIN_LEADS)?;
        let filter = LeadFilter {
            buyer_id: query.buyer_id,
            agent_id: query.agent_id,
            property_id: query.property_id,
            status: query.status,
            query: query.q,
        };
        self.list(&filter, page)
    }

    fn list(&self, filter: &LeadFilter, page: PageRequest) -> Result<Page<LeadView>, PipelineError> {
        let leads = self.store.list_leads(filter, page)?;
        let store = self.store.as_ref();
        Ok(Page::new(leads, page).try_map(|lead| lead_view(store, lead))?)
    }

    /// Assigned agent moves the lead one edge along the pipeline.
    pub fn update_status(
        &self,
        actor: &Actor,
        id: LeadId,
        request: UpdateLeadStatusRequest,
    ) -> Result<LeadView, PipelineError> {
        require_role(actor, &[Role::Agent])?;

        let mut tx = self.store.begin()?;
        let mut lead = tx.lock_lead(id)?.ok_or(PipelineError::NotFound("inquiry"))?;
        if lead.agent_id != Some(actor.id) {
            return Err(PipelineError::Forbidden);
        }
        self.ensure_property_not_sold(lead.property_id)?;
        if lead.status.is_terminal() {
            return Err(ConflictReason::LeadClosedOrDropped.into());
        }
        if !lead_transition_allowed(lead.status, request.status) {
            return Err(ConflictReason::InvalidStatusTransition.into());
        }

        let from = lead.status;
        lead.status = request.status;
        lead.updated_at = self.clock.now();
        tx.update_lead(lead.clone())?;
        tx.commit()?;

        tracing::info!(
            lead_id = %lead.id,
            from = from.label(),
            to = lead.status.label(),
            "lead status updated"
        );
        Ok(lead_view(self.store.as_ref(), lead)?)
    }

    /// Buyer records a price offer that seeds the deal created later.
    pub fn submit_offer(
        &self,
        actor: &Actor,
        id: LeadId,
        request: SubmitOfferRequest,
    ) -> Result<LeadView, PipelineError> {
        require_role(actor, &[Role::Buyer])?;
        let offer_price = positive_price("offerPrice", request.offer_price)?;
        let message = optional_text("message", request.message, MESSAGE_MAX_CHARS)?;

        let mut tx = self.store.begin()?;
        let mut lead = tx.lock_lead(id)?.ok_or(PipelineError::NotFound("inquiry"))?;
        if lead.buyer_id != actor.id {
            return Err(PipelineError::NotFound("inquiry"));
        }
        if lead.status.is_terminal() {
            return Err(ConflictReason::LeadClosedOrDropped.into());
        }
        if tx.active_deal_for_lead(lead.id)?.is_some() {
            return Err(ConflictReason::DealExists.into());
        }
        self.ensure_property_not_sold(lead.property_id)?;

        let now = self.clock.now();
        lead.offer_price = Some(offer_price);
        lead.offer_message = message;
        lead.offer_updated_at = Some(now);
        lead.updated_at = now;
        tx.update_lead(lead.clone())?;
        tx.commit()?;

        tracing::info!(lead_id = %lead.id, offer_price, "buyer offer recorded");
        Ok(lead_view(self.store.as_ref(), lead)?)
    }

    pub fn add_note(
        &self,
        actor: &Actor,
        id: LeadId,
        request: AddLeadNoteRequest,
    ) -> Result<LeadNote, PipelineError> {
        require_role(actor, &[Role::Agent])?;
        let note = required_text("note", &request.note, LEAD_NOTE_MAX_CHARS)?;

        let mut tx = self.store.begin()?;
        let lead = tx.lock_lead(id)?.ok_or(PipelineError::NotFound("inquiry"))?;
        if lead.agent_id != Some(actor.id) {
            return Err(PipelineError::Forbidden);
        }
        if lead.status.is_terminal() {
            return Err(ConflictReason::LeadClosedOrDropped.into());
        }
        self.ensure_property_not_sold(lead.property_id)?;

        let note = self.store.insert_lead_note(NewLeadNote {
            lead_id: lead.id,
            agent_id: actor.id,
            note,
            created_at: self.clock.now(),
        })?;
        tx.commit()?;

        tracing::info!(lead_id = %lead.id, note_id = %note.id, "lead note added");
        Ok(note)
    }

    pub fn list_notes(&self, actor: &Actor, id: LeadId) -> Result<Vec<LeadNote>, PipelineError> {
        require_role(actor, &[Role::Agent, Role::Admin])?;
        let lead = self
            .store
            .fetch_lead(id)?
            .ok_or(PipelineError::NotFound("inquiry"))?;
        if actor.role == Role::Agent && lead.agent_id != Some(actor.id) {
            return Err(PipelineError::Forbidden);
        }
        Ok(self.store.lead_notes(lead.id)?)
    }

    /// Admin reassignment. The active deal, if any, follows the lead in the same transaction.
    pub fn reassign(
        &self,
        actor: &Actor,
        id: LeadId,
        request: ReassignLeadRequest,
    ) -> Result<LeadView, PipelineError> {
        require_role(actor, &[Role::Admin])?;
        let agent_id = match request.agent_id {
            Some(agent_id) => Some(assignable_agent(self.store.as_ref(), agent_id)?.id),
            None => None,
        };

        let mut tx = self.store.begin()?;
        let mut lead = tx.lock_lead(id)?.ok_or(PipelineError::NotFound("inquiry"))?;
        let now = self.clock.now();
        let previous = lead.agent_id;
        lead.agent_id = agent_id;
        lead.updated_at = now;
        tx.update_lead(lead.clone())?;

        let mut cascaded = None;
        if let Some(active) = tx.active_deal_for_lead(lead.id)? {
            let mut deal = tx
                .lock_deal(active.id)?
                .ok_or(PipelineError::NotFound("deal"))?;
            // A close may have committed while we waited on the row.
            if deal.status.is_active() {
                let from = deal.agent_id;
                deal.agent_id = agent_id;
                deal.updated_at = now;
                cascaded = Some((deal.id, from));
                tx.update_deal(deal)?;
            }
        }
        tx.commit()?;

        tracing::info!(
            lead_id = %lead.id,
            from = ?previous,
            to = ?agent_id,
            deal_id = ?cascaded.map(|(deal_id, _)| deal_id),
            "lead reassigned"
        );
        if let Some((deal_id, from)) = cascaded {
            self.audit_agent_change(actor, lead.id, deal_id, from, agent_id, now);
        }
        Ok(lead_view(self.store.as_ref(), lead)?)
    }

    /// Best-effort audit entry for a deal that followed its lead to a new agent.
    fn audit_agent_change(
        &self,
        actor: &Actor,
        lead_id: LeadId,
        deal_id: DealId,
        from: Option<UserId>,
        to: Option<UserId>,
        at: DateTime<Utc>,
    ) {
        let entry = NewAuditEntry {
            deal_id,
            actor_id: Some(actor.id),
            action: AuditAction::AgentChanged,
            metadata: json!({ "from": from, "to": to, "inquiryId": lead_id }),
            created_at: at,
        };
        if let Err(err) = self.store.append_audit(entry) {
            tracing::warn!(
                deal_id = %deal_id,
                lead_id = %lead_id,
                error = %err,
                "deal audit write failed after lead reassignment"
            );
        }
    }

    fn ensure_property_not_sold(&self, property: PropertyId) -> Result<(), PipelineError> {
        let sold = self
            .store
            .property(property)?
            .is_some_and(|record| record.status == PropertyStatus::Sold);
        if sold {
            Err(ConflictReason::PropertySold.into())
        } else {
            Ok(())
        }
    }
}

