use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::workflows::clock::Clock;
use crate::workflows::domain::{
    Actor, AuditAction, DealId, DealStatus, DealView, LeadId, LeadStatus, PropertyId,
    PropertyStatus, Role, UserId, Visit, VisitStatus,
};
use crate::workflows::error::{ConflictReason, PipelineError};
use crate::workflows::notifications::NotificationPublisher;
use crate::workflows::pagination::{Page, PageLimits, PageRequest};
use crate::workflows::repository::{DealFilter, PipelineStore, PipelineTransaction};
use crate::workflows::transitions::deal_transition_allowed;
use crate::workflows::validation::{
    assignable_agent, optional_text, positive_price, require_role, DEAL_NOTE_MAX_CHARS,
    MESSAGE_MAX_CHARS,
};
use crate::workflows::views::deal_view;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDealStatusRequest {
    pub status: DealStatus,
    #[serde(default)]
    pub final_price: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDealOfferRequest {
    pub offer_price: f64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignDealRequest {
    pub agent_id: UserId,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<DealStatus>,
    pub agent_id: Option<UserId>,
    pub buyer_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Owns deals: conversion from a lead, the negotiation state machine, and the closing cascades.
pub struct DealEngine<S, N> {
    pub(super) store: Arc<S>,
    pub(super) notifications: Arc<N>,
    pub(super) clock: Arc<dyn Clock>,
}

impl<S, N> Clone for DealEngine<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifications: Arc::clone(&self.notifications),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// Visits the close-won cascade marks completed: not cancelled, and due or never scheduled.
fn completes_on_close(visit: &Visit, now: chrono::DateTime<chrono::Utc>) -> bool {
    !matches!(visit.status, VisitStatus::Cancelled | VisitStatus::Completed)
        && visit.scheduled_at.map_or(true, |at| at <= now)
}

impl<S, N> DealEngine<S, N>
where
    S: PipelineStore,
    N: NotificationPublisher,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifications,
            clock,
        }
    }

    /// Move the deal one edge along its graph. Closing cascades into the property, lead, and visits.
    pub fn update_status(
        &self,
        actor: &Actor,
        id: DealId,
        request: UpdateDealStatusRequest,
    ) -> Result<DealView, PipelineError> {
        let next = request.status;
        let notes = optional_text("notes", request.notes, DEAL_NOTE_MAX_CHARS)?;
        if let Some(price) = request.final_price {
            if next != DealStatus::ClosedWon {
                return Err(PipelineError::validation(
                    "finalPrice",
                    "finalPrice is only accepted when closing as closed_won",
                ));
            }
            positive_price("finalPrice", price)?;
        }

        let mut tx = self.store.begin()?;
        let mut deal = tx.lock_deal(id)?.ok_or(PipelineError::NotFound("deal"))?;
        if !matches!(actor.role, Role::Admin | Role::Agent) || !deal.involves(actor) {
            return Err(PipelineError::Forbidden);
        }
        if deal.status.is_terminal() {
            return Err(ConflictReason::DealClosed.into());
        }
        if !deal_transition_allowed(deal.status, next) {
            return Err(ConflictReason::InvalidStatusTransition.into());
        }

        let from = deal.status;
        let now = self.clock.now();
        deal.status = next;
        deal.notes = notes.or(deal.notes);
        deal.updated_at = now;

        match next {
            DealStatus::ClosedWon => {
                let property = tx
                    .lock_property(deal.property_id)?
                    .ok_or(PipelineError::NotFound("property"))?;
                if property.status == PropertyStatus::Sold {
                    return Err(ConflictReason::PropertySold.into());
                }
                let final_price = request
                    .final_price
                    .or(deal.final_price)
                    .or(deal.offer_price)
                    .ok_or_else(|| {
                        PipelineError::validation("finalPrice", "finalPrice is required")
                    })?;
                let final_price = positive_price("finalPrice", final_price)?;
                if deal.offer_price.is_some_and(|offer| final_price < offer) {
                    return Err(ConflictReason::FinalPriceBelowOffer.into());
                }

                deal.final_price = Some(final_price);
                tx.update_deal(deal.clone())?;
                tx.set_property_status(deal.property_id, PropertyStatus::Sold)?;
                tx.commit()?;

                tracing::info!(
                    deal_id = %deal.id,
                    property_id = %deal.property_id,
                    final_price,
                    "deal closed won"
                );
                self.cascade_lead_status(deal.lead_id, LeadStatus::Closed);
                self.complete_elapsed_visits(deal.lead_id);
                self.record_audit(
                    deal.id,
                    actor,
                    AuditAction::DealClosedWon,
                    json!({ "from": from, "to": next, "finalPrice": final_price }),
                );
            }
            DealStatus::ClosedLost => {
                deal.final_price = None;
                tx.update_deal(deal.clone())?;
                tx.commit()?;

                tracing::info!(deal_id = %deal.id, "deal closed lost");
                self.cascade_lead_status(deal.lead_id, LeadStatus::Dropped);
                self.record_audit(
                    deal.id,
                    actor,
                    AuditAction::DealClosedLost,
                    json!({ "from": from, "to": next }),
                );
            }
            _ => {
                tx.update_deal(deal.clone())?;
                tx.commit()?;

                tracing::info!(
                    deal_id = %deal.id,
                    from = from.label(),
                    to = next.label(),
                    "deal status updated"
                );
                let action = if next == DealStatus::Cancelled {
                    AuditAction::DealCancelled
                } else {
                    AuditAction::StatusChanged
                };
                self.record_audit(deal.id, actor, action, json!({ "from": from, "to": next }));
            }
        }

        Ok(deal_view(self.store.as_ref(), deal)?)
    }

    /// Buyer, assigned agent, or admin revises the offer while the deal is still early.
    pub fn update_offer(
        &self,
        actor: &Actor,
        id: DealId,
        request: UpdateDealOfferRequest,
    ) -> Result<DealView, PipelineError> {
        let offer_price = positive_price("offerPrice", request.offer_price)?;
        let message = optional_text("message", request.message, MESSAGE_MAX_CHARS)?;

        let mut tx = self.store.begin()?;
        let mut deal = tx.lock_deal(id)?.ok_or(PipelineError::NotFound("deal"))?;
        if actor.role == Role::Seller || !deal.involves(actor) {
            return Err(PipelineError::Forbidden);
        }
        if deal.status.is_terminal() {
            return Err(ConflictReason::DealClosed.into());
        }
        if !deal.status.allows_offer_changes() {
            return Err(ConflictReason::OfferLocked.into());
        }

        let previous = deal.offer_price;
        deal.offer_price = Some(offer_price);
        deal.notes = message.or(deal.notes);
        deal.updated_at = self.clock.now();
        tx.update_deal(deal.clone())?;
        tx.commit()?;

        tracing::info!(deal_id = %deal.id, offer_price, "deal offer updated");
        self.record_audit(
            deal.id,
            actor,
            AuditAction::OfferUpdated,
            json!({ "from": previous, "to": offer_price }),
        );
        Ok(deal_view(self.store.as_ref(), deal)?)
    }

    pub fn cancel(&self, actor: &Actor, id: DealId) -> Result<DealView, PipelineError> {
        let mut tx = self.store.begin()?;
        let mut deal = tx.lock_deal(id)?.ok_or(PipelineError::NotFound("deal"))?;
        if actor.role == Role::Seller || !deal.involves(actor) {
            return Err(PipelineError::Forbidden);
        }
        if deal.status.is_terminal() {
            return Err(ConflictReason::DealClosed.into());
        }
        if !deal.status.allows_offer_changes() {
            return Err(ConflictReason::CancellationLocked.into());
        }

        let from = deal.status;
        deal.status = DealStatus::Cancelled;
        deal.updated_at = self.clock.now();
        tx.update_deal(deal.clone())?;
        tx.commit()?;

        tracing::info!(deal_id = %deal.id, "deal cancelled");
        self.record_audit(
            deal.id,
            actor,
            AuditAction::DealCancelled,
            json!({ "from": from, "to": DealStatus::Cancelled }),
        );
        Ok(deal_view(self.store.as_ref(), deal)?)
    }

    pub fn reassign(
        &self,
        actor: &Actor,
        id: DealId,
        request: ReassignDealRequest,
    ) -> Result<DealView, PipelineError> {
        require_role(actor, &[Role::Admin])?;
        let agent = assignable_agent(self.store.as_ref(), request.agent_id)?;

        let mut tx = self.store.begin()?;
        let mut deal = tx.lock_deal(id)?.ok_or(PipelineError::NotFound("deal"))?;
        if deal.status.is_terminal() {
            return Err(ConflictReason::DealClosed.into());
        }
        let previous = deal.agent_id;
        deal.agent_id = Some(agent.id);
        deal.updated_at = self.clock.now();
        tx.update_deal(deal.clone())?;
        tx.commit()?;

        tracing::info!(deal_id = %deal.id, from = ?previous, to = %agent.id, "deal reassigned");
        self.record_audit(
            deal.id,
            actor,
            AuditAction::AgentChanged,
            json!({ "from": previous, "to": agent.id }),
        );
        Ok(deal_view(self.store.as_ref(), deal)?)
    }

    pub fn get_deal(&self, actor: &Actor, id: DealId) -> Result<DealView, PipelineError> {
        let deal = self
            .store
            .fetch_deal(id)?
            .filter(|deal| deal.involves(actor))
            .ok_or(PipelineError::NotFound("deal"))?;
        Ok(deal_view(self.store.as_ref(), deal)?)
    }

    pub fn list_buyer_deals(
        &self,
        actor: &Actor,
        query: DealListQuery,
    ) -> Result<Page<DealView>, PipelineError> {
        require_role(actor, &[Role::Buyer])?;
        let filter = DealFilter {
            buyer_id: Some(actor.id),
            status: query.status,
            ..DealFilter::default()
        };
        self.list(&filter, &query)
    }

    /// Agents see deals assigned to them; admins may narrow to one agent.
    pub fn list_agent_deals(
        &self,
        actor: &Actor,
        query: DealListQuery,
    ) -> Result<Page<DealView>, PipelineError> {
        require_role(actor, &[Role::Agent, Role::Admin])?;
        let agent_id = match actor.role {
            Role::Agent => Some(actor.id),
            _ => query.agent_id,
        };
        let filter = DealFilter {
            agent_id,
            status: query.status,
            ..DealFilter::default()
        };
        self.list(&filter, &query)
    }

    /// Admins filter freely; sellers see deals on their own listings.
    pub fn list_deals(
        &self,
        actor: &Actor,
        query: DealListQuery,
    ) -> Result<Page<DealView>, PipelineError> {
        let filter = match actor.role {
            Role::Admin => DealFilter {
                buyer_id: query.buyer_id,
                agent_id: query.agent_id,
                property_id: query.property_id,
                status: query.status,
                created_from: query.start_date,
                created_to: query.end_date,
                ..DealFilter::default()
            },
            Role::Seller => DealFilter {
                seller_id: Some(actor.id),
                property_id: query.property_id,
                status: query.status,
                ..DealFilter::default()
            },
            _ => return Err(PipelineError::Forbidden),
        };
        self.list(&filter, &query)
    }

    fn list(
        &self,
        filter: &DealFilter,
        query: &DealListQuery,
    ) -> Result<Page<DealView>, PipelineError> {
        let page = PageRequest::resolve(query.page, query.limit, PageLimits::DEALS)?;
        let deals = self.store.list_deals(filter, page)?;
        let store = self.store.as_ref();
        Ok(Page::new(deals, page).try_map(|deal| deal_view(store, deal))?)
    }

    /// Best-effort lead cascade after a committed deal change. Terminal leads are left alone.
    pub(super) fn cascade_lead_status(&self, lead_id: Option<LeadId>, status: LeadStatus) {
        let Some(lead_id) = lead_id else { return };
        if let Err(err) = self.try_cascade_lead_status(lead_id, status) {
            tracing::warn!(
                lead_id = %lead_id,
                to = status.label(),
                error = %err,
                "lead status cascade failed"
            );
        }
    }

    fn try_cascade_lead_status(&self, lead_id: LeadId, status: LeadStatus) -> Result<(), PipelineError> {
        let mut tx = self.store.begin()?;
        let Some(mut lead) = tx.lock_lead(lead_id)? else {
            tracing::warn!(lead_id = %lead_id, "lead missing during cascade");
            return Ok(());
        };
        if lead.status == status {
            return Ok(());
        }
        if lead.status.is_terminal() {
            tracing::warn!(
                lead_id = %lead_id,
                current = lead.status.label(),
                to = status.label(),
                "lead already terminal; cascade skipped"
            );
            return Ok(());
        }

        let from = lead.status;
        lead.status = status;
        lead.updated_at = self.clock.now();
        tx.update_lead(lead)?;
        tx.commit()?;
        tracing::info!(lead_id = %lead_id, from = from.label(), to = status.label(), "lead status cascaded");
        Ok(())
    }

    /// Best-effort: mark the lead's elapsed, non-cancelled visits completed.
    pub(super) fn complete_elapsed_visits(&self, lead_id: Option<LeadId>) {
        let Some(lead_id) = lead_id else { return };
        match self.try_complete_elapsed_visits(lead_id) {
            Ok(0) => {}
            Ok(count) => tracing::info!(lead_id = %lead_id, count, "visits completed on close"),
            Err(err) => tracing::warn!(
                lead_id = %lead_id,
                error = %err,
                "visit completion cascade failed"
            ),
        }
    }

    fn try_complete_elapsed_visits(&self, lead_id: LeadId) -> Result<usize, PipelineError> {
        let now = self.clock.now();
        let mut candidates: Vec<_> = self
            .store
            .visits_for_lead(lead_id)?
            .into_iter()
            .filter(|visit| completes_on_close(visit, now))
            .map(|visit| visit.id)
            .collect();
        candidates.sort();

        let mut tx = self.store.begin()?;
        let mut completed = 0;
        for id in candidates {
            let Some(mut visit) = tx.lock_visit(id)? else { continue };
            if !completes_on_close(&visit, now) {
                continue;
            }
            visit.status = VisitStatus::Completed;
            visit.updated_at = now;
            tx.update_visit(visit)?;
            completed += 1;
        }
        tx.commit()?;
        Ok(completed)
    }
}
