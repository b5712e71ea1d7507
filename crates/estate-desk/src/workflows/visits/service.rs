use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::workflows::clock::Clock;
use crate::workflows::domain::{
    Actor, LeadId, NewVisit, PropertyId, PropertyStatus, Role, UserId, Visit, VisitId, VisitStatus,
    VisitView,
};
use crate::workflows::error::{ConflictReason, PipelineError};
use crate::workflows::pagination::{Page, PageLimits, PageRequest};
use crate::workflows::repository::{PipelineStore, PipelineTransaction, VisitFilter};
use crate::workflows::validation::{
    assignable_agent, optional_text, parse_visit_date, parse_visit_time, require_role,
    scheduled_at, MESSAGE_MAX_CHARS,
};
use crate::workflows::views::visit_view;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisitRequest {
    pub inquiry_id: LeadId,
    pub visit_date: String,
    pub visit_time: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetVisitStatusRequest {
    pub status: VisitStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleVisitRequest {
    pub visit_date: String,
    pub visit_time: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignVisitRequest {
    pub agent_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<VisitStatus>,
    pub agent_id: Option<UserId>,
    pub buyer_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Owns visits: booking against a lead, status changes, and rescheduling.
pub struct VisitScheduler<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for VisitScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// Buyer owns the visit, agent is assigned to it, or the actor is an admin.
fn may_change(actor: &Actor, visit: &Visit) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Buyer => visit.buyer_id == actor.id,
        Role::Agent => visit.agent_id == Some(actor.id),
        Role::Seller => false,
    }
}

impl<S: PipelineStore> VisitScheduler<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn create_visit(
        &self,
        actor: &Actor,
        request: CreateVisitRequest,
    ) -> Result<VisitView, PipelineError> {
        require_role(actor, &[Role::Buyer, Role::Agent, Role::Admin])?;
        let visit_date = parse_visit_date(&request.visit_date)?;
        let visit_time = parse_visit_time(&request.visit_time)?;
        let notes = optional_text("notes", request.notes, MESSAGE_MAX_CHARS)?;

        let mut tx = self.store.begin()?;
        let lead = tx
            .lock_lead(request.inquiry_id)?
            .ok_or(PipelineError::NotFound("inquiry"))?;
        if !lead.status.accepts_visits() {
            return Err(ConflictReason::LeadNotContacted.into());
        }
        let property = self
            .store
            .property(lead.property_id)?
            .ok_or(PipelineError::NotFound("property"))?;
        if property.status == PropertyStatus::Sold {
            return Err(ConflictReason::PropertySold.into());
        }

        match actor.role {
            Role::Buyer if lead.buyer_id != actor.id => return Err(PipelineError::Forbidden),
            Role::Agent if lead.agent_id.is_some_and(|agent| agent != actor.id) => {
                return Err(PipelineError::Forbidden)
            }
            _ => {}
        }
        let Some(agent_id) = lead.agent_id else {
            return Err(ConflictReason::NoAssignedAgent.into());
        };

        let visit = tx.insert_visit(NewVisit {
            lead_id: lead.id,
            property_id: lead.property_id,
            buyer_id: lead.buyer_id,
            agent_id: Some(agent_id),
            visit_date,
            visit_time,
            scheduled_at: scheduled_at(visit_date, visit_time),
            notes,
            created_by: actor.id,
            created_at: self.clock.now(),
        })?;
        tx.commit()?;

        tracing::info!(
            visit_id = %visit.id,
            lead_id = %visit.lead_id,
            scheduled_at = ?visit.scheduled_at,
            "visit scheduled"
        );
        Ok(visit_view(self.store.as_ref(), visit)?)
    }

    pub fn set_status(
        &self,
        actor: &Actor,
        id: VisitId,
        request: SetVisitStatusRequest,
    ) -> Result<VisitView, PipelineError> {
        let notes = optional_text("notes", request.notes, MESSAGE_MAX_CHARS)?;
        let next = request.status;

        let mut tx = self.store.begin()?;
        let mut visit = tx.lock_visit(id)?.ok_or(PipelineError::NotFound("visit"))?;
        if !may_change(actor, &visit) {
            return Err(PipelineError::Forbidden);
        }
        let buyer = actor.role == Role::Buyer;
        if buyer && !matches!(next, VisitStatus::Confirmed | VisitStatus::Cancelled) {
            return Err(PipelineError::Forbidden);
        }

        let now = self.clock.now();
        match next {
            VisitStatus::Completed => match visit.scheduled_at {
                None => return Err(ConflictReason::VisitNotScheduled.into()),
                Some(at) if at > now => return Err(ConflictReason::VisitNotDue.into()),
                Some(_) => {}
            },
            VisitStatus::Cancelled => {
                if visit.status == VisitStatus::Completed {
                    return Err(ConflictReason::VisitCompleted.into());
                }
                if buyer && !visit.is_upcoming(now) {
                    return Err(ConflictReason::VisitTimePassed.into());
                }
            }
            _ => {}
        }

        let from = visit.status;
        visit.status = next;
        visit.notes = notes.or(visit.notes);
        visit.updated_at = now;
        tx.update_visit(visit.clone())?;
        tx.commit()?;

        tracing::info!(
            visit_id = %visit.id,
            from = from.label(),
            to = next.label(),
            "visit status updated"
        );
        Ok(visit_view(self.store.as_ref(), visit)?)
    }

    pub fn cancel(&self, actor: &Actor, id: VisitId) -> Result<VisitView, PipelineError> {
        self.set_status(
            actor,
            id,
            SetVisitStatusRequest {
                status: VisitStatus::Cancelled,
                notes: None,
            },
        )
    }

    /// Move the visit to a new slot. Not allowed once completed or once the current slot has passed.
    pub fn reschedule(
        &self,
        actor: &Actor,
        id: VisitId,
        request: RescheduleVisitRequest,
    ) -> Result<VisitView, PipelineError> {
        let visit_date = parse_visit_date(&request.visit_date)?;
        let visit_time = parse_visit_time(&request.visit_time)?;
        let notes = optional_text("notes", request.notes, MESSAGE_MAX_CHARS)?;

        let mut tx = self.store.begin()?;
        let mut visit = tx.lock_visit(id)?.ok_or(PipelineError::NotFound("visit"))?;
        if !may_change(actor, &visit) {
            return Err(PipelineError::Forbidden);
        }
        if visit.status == VisitStatus::Completed {
            return Err(ConflictReason::VisitCompleted.into());
        }
        let now = self.clock.now();
        let passed = if actor.role == Role::Buyer {
            !visit.is_upcoming(now)
        } else {
            visit.is_past(now)
        };
        if passed {
            return Err(ConflictReason::VisitTimePassed.into());
        }

        visit.visit_date = Some(visit_date);
        visit.visit_time = Some(visit_time);
        visit.scheduled_at = Some(scheduled_at(visit_date, visit_time));
        visit.status = VisitStatus::Rescheduled;
        visit.notes = notes.or(visit.notes);
        visit.updated_at = now;
        tx.update_visit(visit.clone())?;
        tx.commit()?;

        tracing::info!(
            visit_id = %visit.id,
            scheduled_at = ?visit.scheduled_at,
            "visit rescheduled"
        );
        Ok(visit_view(self.store.as_ref(), visit)?)
    }

    pub fn reassign_agent(
        &self,
        actor: &Actor,
        id: VisitId,
        request: ReassignVisitRequest,
    ) -> Result<VisitView, PipelineError> {
        require_role(actor, &[Role::Admin])?;
        let agent_id = match request.agent_id {
            Some(agent_id) => Some(assignable_agent(self.store.as_ref(), agent_id)?.id),
            None => None,
        };

        let mut tx = self.store.begin()?;
        let mut visit = tx.lock_visit(id)?.ok_or(PipelineError::NotFound("visit"))?;
        let previous = visit.agent_id;
        visit.agent_id = agent_id;
        visit.updated_at = self.clock.now();
        tx.update_visit(visit.clone())?;
        tx.commit()?;

        tracing::info!(visit_id = %visit.id, from = ?previous, to = ?agent_id, "visit reassigned");
        Ok(visit_view(self.store.as_ref(), visit)?)
    }

    /// Visible to its buyer, its agent, the property's seller, and admins.
    pub fn get_visit(&self, actor: &Actor, id: VisitId) -> Result<VisitView, PipelineError> {
        let visit = self
            .store
            .fetch_visit(id)?
            .ok_or(PipelineError::NotFound("visit"))?;
        let visible = match actor.role {
            Role::Seller => self
                .store
                .property(visit.property_id)?
                .is_some_and(|property| property.seller_id == Some(actor.id)),
            _ => may_change(actor, &visit),
        };
        if !visible {
            return Err(PipelineError::NotFound("visit"));
        }
        Ok(visit_view(self.store.as_ref(), visit)?)
    }

    pub fn list_buyer_visits(
        &self,
        actor: &Actor,
        query: VisitListQuery,
    ) -> Result<Page<VisitView>, PipelineError> {
        require_role(actor, &[Role::Buyer])?;
        let filter = VisitFilter {
            buyer_id: Some(actor.id),
            status: query.status,
            ..VisitFilter::default()
        };
        self.list(&filter, &query)
    }

    /// Agents see their own visits; admins may narrow to one agent.
    pub fn list_agent_visits(
        &self,
        actor: &Actor,
        query: VisitListQuery,
    ) -> Result<Page<VisitView>, PipelineError> {
        require_role(actor, &[Role::Agent, Role::Admin])?;
        let agent_id = match actor.role {
            Role::Agent => Some(actor.id),
            _ => query.agent_id,
        };
        let filter = VisitFilter {
            agent_id,
            status: query.status,
            from: query.start_date,
            to: query.end_date,
            ..VisitFilter::default()
        };
        self.list(&filter, &query)
    }

    /// Admins filter freely; sellers see visits to their own listings.
    pub fn list_visits(
        &self,
        actor: &Actor,
        query: VisitListQuery,
    ) -> Result<Page<VisitView>, PipelineError> {
        let filter = match actor.role {
            Role::Admin => VisitFilter {
                buyer_id: query.buyer_id,
                agent_id: query.agent_id,
                property_id: query.property_id,
                status: query.status,
                from: query.start_date,
                to: query.end_date,
                ..VisitFilter::default()
            },
            Role::Seller => VisitFilter {
                seller_id: Some(actor.id),
                property_id: query.property_id,
                status: query.status,
                from: query.start_date,
                to: query.end_date,
                ..VisitFilter::default()
            },
            _ => return Err(PipelineError::Forbidden),
        };
        self.list(&filter, &query)
    }

    fn list(
        &self,
        filter: &VisitFilter,
        query: &VisitListQuery,
    ) -> Result<Page<VisitView>, PipelineError> {
        let page = PageRequest::resolve(query.page, query.limit, PageLimits::VISITS)?;
        let visits = self.store.list_visits(filter, page)?;
        let store = self.store.as_ref();
        Ok(Page::new(visits, page).try_map(|visit| visit_view(store, visit))?)
    }
}
