use super::common::*;

use crate::workflows::deals::{
    AddDealDocumentRequest, AddDealNoteRequest, DealListQuery, ReassignDealRequest,
    UpdateDealOfferRequest,
};
use crate::workflows::domain::{
    AuditAction, DealDocumentType, DealStatus, LeadStatus, PropertyStatus, VisitStatus,
};
use crate::workflows::transitions::deal_transition_allowed;
use crate::workflows::{ConflictReason, PipelineError};

#[test]
fn close_won_sells_the_property_and_closes_the_lead() {
    let h = Harness::new();
    let (lead, deal) = h.deal_in(DealStatus::AgreementPending, 450_000.0);

    let closed = h
        .services
        .deals
        .update_status(
            &agent(),
            deal.deal.id,
            status_change(DealStatus::ClosedWon, Some(500_000.0)),
        )
        .expect("closed won");
    assert_eq!(closed.deal.status, DealStatus::ClosedWon);
    assert_eq!(closed.deal.final_price, Some(500_000.0));
    assert_eq!(h.property_status(LISTING), PropertyStatus::Sold);
    assert_eq!(h.lead_status(lead), LeadStatus::Closed);

    let trail = h
        .services
        .deals
        .audit_trail(&admin(), deal.deal.id)
        .expect("audit");
    let latest = trail.first().expect("entry");
    assert_eq!(latest.action, AuditAction::DealClosedWon);
    assert_eq!(latest.metadata["finalPrice"], 500_000.0);
    assert_eq!(latest.metadata["from"], "agreement_pending");
}

#[test]
fn close_won_falls_back_to_the_offer_price() {
    let h = Harness::new();
    let (_, deal) = h.deal_in(DealStatus::AgreementPending, 430_000.0);
    let closed = h
        .services
        .deals
        .update_status(&agent(), deal.deal.id, status_change(DealStatus::ClosedWon, None))
        .expect("closed won");
    assert_eq!(closed.deal.final_price, Some(430_000.0));
}

#[test]
fn close_won_rejects_a_final_price_below_the_offer() {
    let h = Harness::new();
    let (lead, deal) = h.deal_in(DealStatus::AgreementPending, 450_000.0);
    let err = h
        .services
        .deals
        .update_status(
            &agent(),
            deal.deal.id,
            status_change(DealStatus::ClosedWon, Some(440_000.0)),
        )
        .expect_err("below offer");
    assert!(matches!(
        err,
        PipelineError::Conflict(ConflictReason::FinalPriceBelowOffer)
    ));
    assert_eq!(h.property_status(LISTING), PropertyStatus::Approved);
    assert_eq!(h.lead_status(lead), LeadStatus::Negotiation);
}

#[test]
fn close_won_refuses_an_already_sold_property() {
    let h = Harness::new();
    let (_, deal) = h.deal_in(DealStatus::AgreementPending, 450_000.0);
    h.set_property_status(LISTING, PropertyStatus::Sold);

    let err = h
        .services
        .deals
        .update_status(&agent(), deal.deal.id, status_change(DealStatus::ClosedWon, None))
        .expect_err("already sold");
    assert!(matches!(
        err,
        PipelineError::Conflict(ConflictReason::PropertySold)
    ));
    let reread = h.services.deals.get_deal(&agent(), deal.deal.id).expect("deal");
    assert_eq!(reread.deal.status, DealStatus::AgreementPending);
}

#[test]
fn close_won_completes_elapsed_visits_only() {
    let h = Harness::new();
    let (lead, visit) = h.qualified_lead();
    let upcoming = h.book_visit(lead, "2025-06-09", "12:00");
    let elapsed = h.book_visit(lead, "2025-06-04", "08:00");

    // The upcoming visit is now the latest one, so convert with an override.
    let deal = h
        .services
        .deals
        .convert_lead(
            &admin(),
            crate::workflows::deals::ConvertLeadRequest {
                admin_override: true,
                override_reason: Some("second viewing is a formality".to_string()),
                ..conversion(lead, Some(400_000.0))
            },
        )
        .expect("override conversion");
    for next in [DealStatus::Negotiation, DealStatus::AgreementPending] {
        h.services
            .deals
            .update_status(&agent(), deal.deal.id, status_change(next, None))
            .expect("advance");
    }

    h.clock.set(at(5, 9));
    h.services
        .deals
        .update_status(&agent(), deal.deal.id, status_change(DealStatus::ClosedWon, None))
        .expect("closed won");

    assert_eq!(h.visit_status(visit), VisitStatus::Completed);
    assert_eq!(h.visit_status(elapsed), VisitStatus::Completed);
    assert_eq!(h.visit_status(upcoming), VisitStatus::Scheduled);
}

#[test]
fn close_lost_drops_the_lead_and_clears_the_final_price() {
    let h = Harness::new();
    let (lead, deal) = h.deal_in(DealStatus::AgreementPending, 450_000.0);
    let closed = h
        .services
        .deals
        .update_status(&agent(), deal.deal.id, status_change(DealStatus::ClosedLost, None))
        .expect("closed lost");
    assert_eq!(closed.deal.status, DealStatus::ClosedLost);
    assert_eq!(closed.deal.final_price, None);
    assert_eq!(h.lead_status(lead), LeadStatus::Dropped);
    assert_eq!(h.property_status(LISTING), PropertyStatus::Approved);
}

#[test]
fn final_price_is_only_accepted_for_closed_won() {
    let h = Harness::new();
    let (_, deal) = h.deal_in(DealStatus::Open, 450_000.0);
    let err = h
        .services
        .deals
        .update_status(
            &agent(),
            deal.deal.id,
            status_change(DealStatus::Negotiation, Some(460_000.0)),
        )
        .expect_err("final price on a non-closing move");
    assert!(matches!(
        err,
        PipelineError::Validation {
            field: "finalPrice",
            ..
        }
    ));
}

#[test]
fn deal_graph_rejects_missing_edges_and_terminal_moves() {
    for from in [
        DealStatus::Open,
        DealStatus::Negotiation,
        DealStatus::AgreementPending,
    ] {
        for to in DealStatus::ordered() {
            let h = Harness::new();
            let (_, deal) = h.deal_in(from, 450_000.0);
            let result =
                h.services
                    .deals
                    .update_status(&agent(), deal.deal.id, status_change(to, None));
            if deal_transition_allowed(from, to) {
                assert_eq!(result.expect("allowed edge").deal.status, to);
            } else {
                assert!(
                    matches!(
                        result,
                        Err(PipelineError::Conflict(ConflictReason::InvalidStatusTransition))
                    ),
                    "{from:?} -> {to:?} should be rejected"
                );
            }
        }
    }

    let h = Harness::new();
    let (_, deal) = h.deal_in(DealStatus::Open, 450_000.0);
    h.services.deals.cancel(&agent(), deal.deal.id).expect("cancel");
    let err = h
        .services
        .deals
        .update_status(&agent(), deal.deal.id, status_change(DealStatus::Negotiation, None))
        .expect_err("terminal");
    assert!(matches!(
        err,
        PipelineError::Conflict(ConflictReason::DealClosed)
    ));
}

#[test]
fn only_admins_and_the_assigned_agent_move_deals() {
    let h = Harness::new();
    let (_, deal) = h.deal_in(DealStatus::Open, 450_000.0);
    for outsider in [buyer(), seller(), other_agent()] {
        let err = h
            .services
            .deals
            .update_status(&outsider, deal.deal.id, status_change(DealStatus::Negotiation, None))
            .expect_err("not allowed");
        assert!(matches!(err, PipelineError::Forbidden));
    }
    assert!(h
        .services
        .deals
        .update_status(&admin(), deal.deal.id, status_change(DealStatus::Negotiation, None))
        .is_ok());
}

#[test]
fn offers_change_only_while_open_or_negotiating() {
    let h = Harness::new();
    let (_, deal) = h.deal_in(DealStatus::Negotiation, 450_000.0);
    let updated = h
        .services
        .deals
        .update_offer(
            &buyer(),
            deal.deal.id,
            UpdateDealOfferRequest {
                offer_price: 455_000.0,
                message: None,
            },
        )
        .expect("offer updated");
    assert_eq!(updated.deal.offer_price, Some(455_000.0));
    let trail = h
        .services
        .deals
        .audit_trail(&admin(), deal.deal.id)
        .expect("audit");
    assert_eq!(trail[0].action, AuditAction::OfferUpdated);
    assert_eq!(trail[0].metadata["from"], 450_000.0);
    assert_eq!(trail[0].metadata["to"], 455_000.0);

    h.services
        .deals
        .update_status(&agent(), deal.deal.id, status_change(DealStatus::AgreementPending, None))
        .expect("agreement pending");
    let err = h
        .services
        .deals
        .update_offer(
            &agent(),
            deal.deal.id,
            UpdateDealOfferRequest {
                offer_price: 460_000.0,
                message: None,
            },
        )
        .expect_err("locked");
    assert!(matches!(
        err,
        PipelineError::Conflict(ConflictReason::OfferLocked)
    ));

    let err = h
        .services
        .deals
        .cancel(&buyer(), deal.deal.id)
        .expect_err("cancellation locked");
    assert!(matches!(
        err,
        PipelineError::Conflict(ConflictReason::CancellationLocked)
    ));
}

#[test]
fn cancelling_frees_the_lead_for_a_new_deal() {
    let h = Harness::new();
    let (lead, deal) = h.deal_in(DealStatus::Open, 450_000.0);
    let cancelled = h.services.deals.cancel(&buyer(), deal.deal.id).expect("cancel");
    assert_eq!(cancelled.deal.status, DealStatus::Cancelled);
    let trail = h
        .services
        .deals
        .audit_trail(&admin(), deal.deal.id)
        .expect("audit");
    assert_eq!(trail[0].action, AuditAction::DealCancelled);
    assert_eq!(trail[0].actor_id, Some(BUYER));

    let second = h.convert(lead, Some(440_000.0));
    assert_ne!(second.deal.id, deal.deal.id);
    assert_eq!(second.deal.status, DealStatus::Open);
}

#[test]
fn reassignment_requires_an_admin_and_an_active_agent() {
    let h = Harness::new();
    let (_, deal) = h.deal_in(DealStatus::Open, 450_000.0);
    assert!(matches!(
        h.services.deals.reassign(
            &agent(),
            deal.deal.id,
            ReassignDealRequest {
                agent_id: OTHER_AGENT
            }
        ),
        Err(PipelineError::Forbidden)
    ));
    assert!(matches!(
        h.services.deals.reassign(
            &admin(),
            deal.deal.id,
            ReassignDealRequest {
                agent_id: INACTIVE_AGENT
            }
        ),
        Err(PipelineError::Validation { field: "agentId", .. })
    ));

    let view = h
        .services
        .deals
        .reassign(
            &admin(),
            deal.deal.id,
            ReassignDealRequest {
                agent_id: OTHER_AGENT,
            },
        )
        .expect("reassigned");
    assert_eq!(view.deal.agent_id, Some(OTHER_AGENT));
    let trail = h.services.deals.audit_trail(&admin(), deal.deal.id).expect("audit");
    assert_eq!(trail[0].action, AuditAction::AgentChanged);
}

#[test]
fn notes_lock_for_non_admins_once_the_deal_closes() {
    let h = Harness::new();
    let (_, deal) = h.deal_in(DealStatus::Open, 450_000.0);
    h.services
        .deals
        .add_note(
            &seller(),
            deal.deal.id,
            AddDealNoteRequest {
                content: "Curtains stay".to_string(),
            },
        )
        .expect("seller note");
    assert!(matches!(
        h.services.deals.list_notes(&other_buyer(), deal.deal.id),
        Err(PipelineError::NotFound("deal"))
    ));

    h.services.deals.cancel(&agent(), deal.deal.id).expect("cancel");
    let err = h
        .services
        .deals
        .add_note(
            &buyer(),
            deal.deal.id,
            AddDealNoteRequest {
                content: "One more thing".to_string(),
            },
        )
        .expect_err("locked");
    assert!(matches!(
        err,
        PipelineError::Conflict(ConflictReason::DealNotesLocked)
    ));
    h.services
        .deals
        .add_note(
            &admin(),
            deal.deal.id,
            AddDealNoteRequest {
                content: "Archived".to_string(),
            },
        )
        .expect("admin note");
    assert_eq!(
        h.services
            .deals
            .list_notes(&buyer(), deal.deal.id)
            .expect("notes")
            .len(),
        2
    );
}

#[test]
fn documents_follow_the_negotiation_window_and_uploader() {
    let h = Harness::new();
    let (_, deal) = h.deal_in(DealStatus::Open, 450_000.0);
    let request = || AddDealDocumentRequest {
        doc_type: Some(DealDocumentType::IdProof),
        filename: "passport.pdf".to_string(),
        url: "https://files.example.com/passport.pdf".to_string(),
    };

    assert!(matches!(
        h.services.deals.add_document(&buyer(), deal.deal.id, request()),
        Err(PipelineError::Conflict(ConflictReason::DocumentsLocked))
    ));

    h.services
        .deals
        .update_status(&agent(), deal.deal.id, status_change(DealStatus::Negotiation, None))
        .expect("negotiation");
    let document = h
        .services
        .deals
        .add_document(&buyer(), deal.deal.id, request())
        .expect("uploaded");
    assert_eq!(document.uploaded_by, BUYER);

    assert!(matches!(
        h.services
            .deals
            .delete_document(&seller(), deal.deal.id, document.id),
        Err(PipelineError::Forbidden)
    ));
    h.services
        .deals
        .delete_document(&buyer(), deal.deal.id, document.id)
        .expect("uploader deletes");
    assert!(h
        .services
        .deals
        .list_documents(&agent(), deal.deal.id)
        .expect("documents")
        .is_empty());
}

#[test]
fn deal_listings_are_scoped_per_role() {
    let h = Harness::new();
    let (_, deal) = h.deal_in(DealStatus::Open, 450_000.0);

    let mine = h
        .services
        .deals
        .list_buyer_deals(&buyer(), DealListQuery::default())
        .expect("buyer deals");
    assert_eq!(mine.items.len(), 1);
    assert!(h
        .services
        .deals
        .list_buyer_deals(&other_buyer(), DealListQuery::default())
        .expect("other buyer")
        .items
        .is_empty());

    let agents = h
        .services
        .deals
        .list_agent_deals(&other_agent(), DealListQuery::default())
        .expect("other agent");
    assert!(agents.items.is_empty());

    let sellers = h
        .services
        .deals
        .list_deals(&seller(), DealListQuery::default())
        .expect("seller deals");
    assert_eq!(sellers.items[0].deal.id, deal.deal.id);

    let filtered = h
        .services
        .deals
        .list_deals(
            &admin(),
            DealListQuery {
                status: Some(DealStatus::ClosedWon),
                ..DealListQuery::default()
            },
        )
        .expect("admin deals");
    assert!(filtered.items.is_empty());
    assert!(matches!(
        h.services.deals.list_deals(&agent(), DealListQuery::default()),
        Err(PipelineError::Forbidden)
    ));
}
