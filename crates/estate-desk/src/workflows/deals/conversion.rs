//! Lead-to-deal conversion.
//!
//! The lead, its property, and its latest visit are row-locked for the whole check-and-insert, so
//! two conversions of the same lead serialize: the second one waits, then sees the first deal and
//! fails with `deal_exists`. Gating rules are a flat precondition list; an admin override skips the
//! entries flagged overridable and nothing else. The one-active-deal check sits outside the list
//! because it can never be overridden.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::service::DealEngine;
use crate::workflows::domain::{
    Actor, AuditAction, DealView, Lead, LeadId, LeadStatus, NewDeal, PropertyRecord,
    PropertyStatus, Role, Visit, VisitStatus,
};
use crate::workflows::error::{ConflictReason, PipelineError};
use crate::workflows::notifications::NotificationPublisher;
use crate::workflows::repository::{PipelineStore, PipelineTransaction, RepositoryError};
use crate::workflows::validation::{optional_text, positive_price, require_role, MESSAGE_MAX_CHARS};
use crate::workflows::views::deal_view;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertLeadRequest {
    pub inquiry_id: LeadId,
    #[serde(default)]
    pub offer_price: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub admin_override: bool,
    #[serde(default)]
    pub override_reason: Option<String>,
}

/// Locked state the preconditions are evaluated against.
pub(crate) struct ConversionContext<'a> {
    pub(crate) lead: &'a Lead,
    pub(crate) property: &'a PropertyRecord,
    pub(crate) latest_visit: Option<&'a Visit>,
    pub(crate) now: DateTime<Utc>,
}

struct Precondition {
    reason: ConflictReason,
    overridable: bool,
    violated: fn(&ConversionContext<'_>) -> bool,
}

fn lead_is_terminal(ctx: &ConversionContext<'_>) -> bool {
    ctx.lead.status.is_terminal()
}

fn lead_not_ready(ctx: &ConversionContext<'_>) -> bool {
    !matches!(
        ctx.lead.status,
        LeadStatus::VisitScheduled | LeadStatus::Negotiation
    )
}

fn property_sold(ctx: &ConversionContext<'_>) -> bool {
    ctx.property.status == PropertyStatus::Sold
}

fn property_inactive(ctx: &ConversionContext<'_>) -> bool {
    ctx.property.status == PropertyStatus::Inactive
}

fn visit_missing(ctx: &ConversionContext<'_>) -> bool {
    ctx.latest_visit.is_none()
}

fn visit_for_other_property(ctx: &ConversionContext<'_>) -> bool {
    ctx.latest_visit
        .is_some_and(|visit| visit.property_id != ctx.lead.property_id)
}

fn visit_not_completed(ctx: &ConversionContext<'_>) -> bool {
    ctx.latest_visit
        .is_some_and(|visit| visit.status != VisitStatus::Completed)
}

fn visit_completed_in_future(ctx: &ConversionContext<'_>) -> bool {
    ctx.latest_visit.is_some_and(|visit| {
        visit.status == VisitStatus::Completed && visit.scheduled_at.is_some_and(|at| at > ctx.now)
    })
}

const PRECONDITIONS: [Precondition; 8] = [
    Precondition {
        reason: ConflictReason::LeadClosedOrDropped,
        overridable: false,
        violated: lead_is_terminal,
    },
    Precondition {
        reason: ConflictReason::LeadInvalidStatus,
        overridable: true,
        violated: lead_not_ready,
    },
    Precondition {
        reason: ConflictReason::PropertySold,
        overridable: false,
        violated: property_sold,
    },
    Precondition {
        reason: ConflictReason::PropertyInactive,
        overridable: true,
        violated: property_inactive,
    },
    Precondition {
        reason: ConflictReason::VisitRequired,
        overridable: true,
        violated: visit_missing,
    },
    Precondition {
        reason: ConflictReason::VisitMismatch,
        overridable: true,
        violated: visit_for_other_property,
    },
    Precondition {
        reason: ConflictReason::LatestVisitNotCompleted,
        overridable: true,
        violated: visit_not_completed,
    },
    Precondition {
        reason: ConflictReason::VisitCompletedInFuture,
        overridable: true,
        violated: visit_completed_in_future,
    },
];

/// First violated precondition, skipping overridable entries under an admin override.
pub(crate) fn check_preconditions(
    ctx: &ConversionContext<'_>,
    admin_override: bool,
) -> Result<(), ConflictReason> {
    PRECONDITIONS
        .iter()
        .filter(|rule| !(admin_override && rule.overridable))
        .find(|rule| (rule.violated)(ctx))
        .map_or(Ok(()), |rule| Err(rule.reason))
}

fn missing_offer_price() -> PipelineError {
    PipelineError::validation(
        "offerPrice",
        "offerPrice is required when the inquiry has no buyer offer",
    )
}

fn deal_exists_on_conflict(err: RepositoryError) -> PipelineError {
    match err {
        RepositoryError::Conflict => ConflictReason::DealExists.into(),
        other => other.into(),
    }
}

impl<S, N> DealEngine<S, N>
where
    S: PipelineStore,
    N: NotificationPublisher,
{
    pub fn convert_lead(
        &self,
        actor: &Actor,
        request: ConvertLeadRequest,
    ) -> Result<DealView, PipelineError> {
        require_role(actor, &[Role::Agent, Role::Admin])?;
        if let Some(price) = request.offer_price {
            positive_price("offerPrice", price)?;
        }
        let message = optional_text("message", request.message, MESSAGE_MAX_CHARS)?;
        let override_reason =
            optional_text("overrideReason", request.override_reason, MESSAGE_MAX_CHARS)?;
        let admin_override = request.admin_override;
        if admin_override {
            if !actor.is_admin() {
                return Err(PipelineError::Forbidden);
            }
            if override_reason.is_none() {
                return Err(PipelineError::validation(
                    "overrideReason",
                    "overrideReason is required when adminOverride is set",
                ));
            }
        }

        if request.offer_price.is_none() {
            // Reject a missing price before waiting on any row lock.
            if let Some(lead) = self.store.fetch_lead(request.inquiry_id)? {
                let owned = actor.is_admin() || lead.agent_id == Some(actor.id);
                if owned && lead.offer_price.is_none() {
                    return Err(missing_offer_price());
                }
            }
        }

        let now = self.clock.now();
        let mut tx = self.store.begin()?;
        let lead = tx
            .lock_lead(request.inquiry_id)?
            .ok_or(PipelineError::NotFound("inquiry"))?;
        if actor.role == Role::Agent {
            match lead.agent_id {
                None => return Err(ConflictReason::NoAssignedAgent.into()),
                Some(agent) if agent != actor.id => return Err(PipelineError::Forbidden),
                Some(_) => {}
            }
        }
        let property = tx
            .lock_property(lead.property_id)?
            .ok_or(PipelineError::NotFound("property"))?;
        let latest_visit = tx.lock_latest_visit(lead.id)?;

        let ctx = ConversionContext {
            lead: &lead,
            property: &property,
            latest_visit: latest_visit.as_ref(),
            now,
        };
        check_preconditions(&ctx, admin_override)?;

        if tx.active_deal_for_lead(lead.id)?.is_some() {
            return Err(ConflictReason::DealExists.into());
        }

        let offer_price = request
            .offer_price
            .or(lead.offer_price)
            .ok_or_else(missing_offer_price)?;
        let offer_price = positive_price("offerPrice", offer_price)?;

        let deal = tx
            .insert_deal(NewDeal {
                lead_id: lead.id,
                property_id: lead.property_id,
                buyer_id: lead.buyer_id,
                seller_id: property.seller_id,
                agent_id: lead.agent_id,
                offer_price,
                notes: message.or_else(|| lead.offer_message.clone()),
                created_at: now,
            })
            .map_err(deal_exists_on_conflict)?;
        tx.commit().map_err(deal_exists_on_conflict)?;

        tracing::info!(
            deal_id = %deal.id,
            lead_id = %lead.id,
            offer_price,
            admin_override,
            "lead converted to deal"
        );

        let used_visit = latest_visit
            .as_ref()
            .filter(|visit| visit.status == VisitStatus::Completed)
            .map(|visit| visit.id);
        self.cascade_lead_status(Some(lead.id), LeadStatus::Negotiation);
        self.record_audit(
            deal.id,
            actor,
            AuditAction::DealCreated,
            json!({
                "inquiryId": lead.id,
                "latestVisitId": latest_visit.as_ref().map(|visit| visit.id),
                "usedVisitId": used_visit,
                "adminOverride": admin_override,
                "overrideReason": override_reason,
            }),
        );

        let mut details = BTreeMap::new();
        details.insert("deal_id".to_string(), deal.id.to_string());
        details.insert("inquiry_id".to_string(), lead.id.to_string());
        details.insert("property_id".to_string(), deal.property_id.to_string());
        details.insert("offer_price".to_string(), offer_price.to_string());
        self.notify_parties("deal_created", &deal, details);

        Ok(deal_view(self.store.as_ref(), deal)?)
    }
}
