use super::common::*;

use crate::workflows::deals::ConvertLeadRequest;
use crate::workflows::domain::{
    AuditAction, DealStatus, LeadStatus, PropertyStatus, VisitStatus,
};
use crate::workflows::leads::{ReassignLeadRequest, SubmitOfferRequest};
use crate::workflows::visits::SetVisitStatusRequest;
use crate::workflows::{PipelineStore, PipelineTransaction};
use crate::workflows::{ConflictReason, PipelineError};

fn conflict(result: Result<impl std::fmt::Debug, PipelineError>) -> ConflictReason {
    match result {
        Err(PipelineError::Conflict(reason)) => reason,
        other => panic!("expected a conflict, got {other:?}"),
    }
}

fn with_override(lead: crate::workflows::domain::LeadId, reason: Option<&str>) -> ConvertLeadRequest {
    ConvertLeadRequest {
        admin_override: true,
        override_reason: reason.map(str::to_string),
        ..conversion(lead, Some(400_000.0))
    }
}

#[test]
fn qualifying_lead_converts_into_an_open_deal() {
    let h = Harness::new();
    let (lead, visit) = h.qualified_lead();

    let deal = h.convert(lead, Some(300_000.0));
    assert_eq!(deal.deal.status, DealStatus::Open);
    assert_eq!(deal.deal.offer_price, Some(300_000.0));
    assert_eq!(deal.deal.final_price, None);
    assert_eq!(deal.deal.lead_id, Some(lead));
    assert_eq!(deal.deal.buyer_id, BUYER);
    assert_eq!(deal.deal.seller_id, Some(SELLER));
    assert_eq!(deal.deal.agent_id, Some(AGENT));
    assert_eq!(
        deal.lead.as_ref().map(|summary| summary.status),
        Some(LeadStatus::Negotiation)
    );
    assert_eq!(h.lead_status(lead), LeadStatus::Negotiation);

    let trail = h
        .services
        .deals
        .audit_trail(&agent(), deal.deal.id)
        .expect("audit");
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::DealCreated);
    assert_eq!(trail[0].actor_id, Some(AGENT));
    assert_eq!(trail[0].metadata["usedVisitId"], visit.0);
    assert_eq!(trail[0].metadata["latestVisitId"], visit.0);
    assert_eq!(trail[0].metadata["adminOverride"], false);

    let events = h.outbox.events();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event.template == "deal_created"));
    let recipients: Vec<_> = events.iter().map(|event| event.recipient).collect();
    assert_eq!(recipients, vec![BUYER, SELLER, AGENT]);
}

#[test]
fn precondition_chain_reports_specific_reasons() {
    let h = Harness::new();
    let lead = h.new_lead();
    assert_eq!(
        conflict(h.services.deals.convert_lead(&agent(), conversion(lead, Some(1.0)))),
        ConflictReason::LeadInvalidStatus
    );

    h.advance_lead(lead, LeadStatus::Contacted);
    h.advance_lead(lead, LeadStatus::VisitScheduled);
    assert_eq!(
        conflict(h.services.deals.convert_lead(&agent(), conversion(lead, Some(1.0)))),
        ConflictReason::VisitRequired
    );

    let visit = h.book_visit(lead, "2025-06-03", "10:00");
    assert_eq!(
        conflict(h.services.deals.convert_lead(&agent(), conversion(lead, Some(1.0)))),
        ConflictReason::LatestVisitNotCompleted
    );

    h.clock.set(at(3, 10));
    h.complete_visit(visit);
    h.clock.set(at(3, 9));
    assert_eq!(
        conflict(h.services.deals.convert_lead(&agent(), conversion(lead, Some(1.0)))),
        ConflictReason::VisitCompletedInFuture
    );

    h.clock.set(at(3, 12));
    h.convert(lead, Some(250_000.0));
    assert_eq!(h.lead_status(lead), LeadStatus::Negotiation);
}

#[test]
fn terminal_leads_never_convert_even_with_override() {
    let h = Harness::new();
    let (lead, _) = h.qualified_lead();
    h.advance_lead(lead, LeadStatus::Dropped);

    assert_eq!(
        conflict(h.services.deals.convert_lead(&agent(), conversion(lead, Some(1.0)))),
        ConflictReason::LeadClosedOrDropped
    );
    assert_eq!(
        conflict(
            h.services
                .deals
                .convert_lead(&admin(), with_override(lead, Some("buyer came back")))
        ),
        ConflictReason::LeadClosedOrDropped
    );
}

#[test]
fn sold_property_blocks_conversion_and_inactive_is_overridable() {
    let h = Harness::new();
    let (lead, _) = h.qualified_lead();

    h.set_property_status(LISTING, PropertyStatus::Inactive);
    assert_eq!(
        conflict(h.services.deals.convert_lead(&agent(), conversion(lead, Some(1.0)))),
        ConflictReason::PropertyInactive
    );

    h.set_property_status(LISTING, PropertyStatus::Sold);
    assert_eq!(
        conflict(
            h.services
                .deals
                .convert_lead(&admin(), with_override(lead, Some("paperwork lag")))
        ),
        ConflictReason::PropertySold
    );

    h.set_property_status(LISTING, PropertyStatus::Inactive);
    let deal = h
        .services
        .deals
        .convert_lead(&admin(), with_override(lead, Some("listing paused by mistake")))
        .expect("override");
    assert_eq!(deal.deal.status, DealStatus::Open);

    let trail = h
        .services
        .deals
        .audit_trail(&admin(), deal.deal.id)
        .expect("audit");
    assert_eq!(trail[0].metadata["adminOverride"], true);
    assert_eq!(
        trail[0].metadata["overrideReason"],
        "listing paused by mistake"
    );
}

#[test]
fn override_skips_the_visit_gate_but_not_the_active_deal_check() {
    let h = Harness::new();
    let lead = h.contacted_lead();

    let deal = h
        .services
        .deals
        .convert_lead(&admin(), with_override(lead, Some("offline viewing")))
        .expect("override without visits");
    let trail = h
        .services
        .deals
        .audit_trail(&admin(), deal.deal.id)
        .expect("audit");
    assert!(trail[0].metadata["usedVisitId"].is_null());

    assert_eq!(
        conflict(
            h.services
                .deals
                .convert_lead(&admin(), with_override(lead, Some("again")))
        ),
        ConflictReason::DealExists
    );
}

#[test]
fn override_is_admin_only_and_needs_a_reason() {
    let h = Harness::new();
    let (lead, _) = h.qualified_lead();

    let err = h
        .services
        .deals
        .convert_lead(&agent(), with_override(lead, Some("please")))
        .expect_err("agents cannot override");
    assert!(matches!(err, PipelineError::Forbidden));

    let err = h
        .services
        .deals
        .convert_lead(&admin(), with_override(lead, Some("   ")))
        .expect_err("blank reason");
    assert!(matches!(
        err,
        PipelineError::Validation {
            field: "overrideReason",
            ..
        }
    ));
}

#[test]
fn agents_must_be_assigned_to_the_lead() {
    let h = Harness::new();
    let (lead, _) = h.qualified_lead();

    let err = h
        .services
        .deals
        .convert_lead(&other_agent(), conversion(lead, Some(1.0)))
        .expect_err("not assigned");
    assert!(matches!(err, PipelineError::Forbidden));

    for outsider in [buyer(), seller()] {
        assert!(matches!(
            h.services
                .deals
                .convert_lead(&outsider, conversion(lead, Some(1.0))),
            Err(PipelineError::Forbidden)
        ));
    }

    h.services
        .leads
        .reassign(&admin(), lead, ReassignLeadRequest { agent_id: None })
        .expect("unassign");
    assert_eq!(
        conflict(h.services.deals.convert_lead(&agent(), conversion(lead, Some(1.0)))),
        ConflictReason::NoAssignedAgent
    );
}

#[test]
fn missing_leads_are_not_found() {
    let h = Harness::new();
    let err = h
        .services
        .deals
        .convert_lead(
            &admin(),
            conversion(crate::workflows::domain::LeadId(999), Some(1.0)),
        )
        .expect_err("no such lead");
    assert!(matches!(err, PipelineError::NotFound("inquiry")));
}

#[test]
fn offer_price_falls_back_to_the_buyer_offer() {
    let h = Harness::new();
    let (lead, _) = h.qualified_lead();

    let err = h
        .services
        .deals
        .convert_lead(&agent(), conversion(lead, None))
        .expect_err("no price anywhere");
    assert!(matches!(
        err,
        PipelineError::Validation {
            field: "offerPrice",
            ..
        }
    ));

    h.services
        .leads
        .submit_offer(
            &buyer(),
            lead,
            SubmitOfferRequest {
                offer_price: 415_000.0,
                message: Some("Flexible on dates".to_string()),
            },
        )
        .expect("buyer offer");
    let deal = h.convert(lead, None);
    assert_eq!(deal.deal.offer_price, Some(415_000.0));
    assert_eq!(deal.deal.notes.as_deref(), Some("Flexible on dates"));
}

#[test]
fn missing_offer_price_is_rejected_without_waiting_on_the_lead_row() {
    let h = Harness::new();
    let lead = h.new_lead();

    let mut tx = h.store.begin().expect("begin");
    tx.lock_lead(lead).expect("lock").expect("lead exists");

    let err = h
        .services
        .deals
        .convert_lead(&agent(), conversion(lead, None))
        .expect_err("no price anywhere");
    assert!(matches!(
        err,
        PipelineError::Validation {
            field: "offerPrice",
            ..
        }
    ));
    drop(tx);

    let err = h
        .services
        .deals
        .convert_lead(&other_agent(), conversion(lead, None))
        .expect_err("not assigned");
    assert!(matches!(err, PipelineError::Forbidden));
}

#[test]
fn latest_visit_decides_even_when_an_older_one_completed() {
    let h = Harness::new();
    let (lead, first) = h.qualified_lead();
    let second = h.book_visit(lead, "2025-06-04", "10:00");
    h.services
        .visits
        .set_status(
            &agent(),
            second,
            SetVisitStatusRequest {
                status: VisitStatus::Cancelled,
                notes: None,
            },
        )
        .expect("cancel second visit");

    assert_eq!(h.visit_status(first), VisitStatus::Completed);
    assert_eq!(
        conflict(h.services.deals.convert_lead(&agent(), conversion(lead, Some(1.0)))),
        ConflictReason::LatestVisitNotCompleted
    );
}

#[test]
fn failed_conversion_leaves_no_trace() {
    let h = Harness::new();
    let lead = h.contacted_lead();
    h.advance_lead(lead, LeadStatus::VisitScheduled);

    let _ = h
        .services
        .deals
        .convert_lead(&agent(), conversion(lead, Some(1.0)))
        .expect_err("visit required");

    assert_eq!(h.lead_status(lead), LeadStatus::VisitScheduled);
    assert!(h.outbox.events().is_empty());
    assert!(h
        .services
        .deals
        .list_deals(&admin(), Default::default())
        .expect("deals")
        .items
        .is_empty());
}
