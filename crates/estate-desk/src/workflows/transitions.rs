//! Lead and deal status graphs, kept as adjacency tables so the allowed edges can be audited
//! and tested apart from the services that enforce them.

use super::domain::{DealStatus, LeadStatus};

const LEAD_EDGES: &[(LeadStatus, &[LeadStatus])] = &[
    (
        LeadStatus::New,
        &[LeadStatus::Contacted, LeadStatus::Dropped],
    ),
    (
        LeadStatus::Contacted,
        &[LeadStatus::VisitScheduled, LeadStatus::Dropped],
    ),
    (
        LeadStatus::VisitScheduled,
        &[LeadStatus::Negotiation, LeadStatus::Dropped],
    ),
    (
        LeadStatus::Negotiation,
        &[LeadStatus::Closed, LeadStatus::Dropped],
    ),
    (LeadStatus::Closed, &[]),
    (LeadStatus::Dropped, &[]),
];

const DEAL_EDGES: &[(DealStatus, &[DealStatus])] = &[
    (
        DealStatus::Open,
        &[DealStatus::Negotiation, DealStatus::Cancelled],
    ),
    (
        DealStatus::Negotiation,
        &[DealStatus::AgreementPending, DealStatus::Cancelled],
    ),
    (
        DealStatus::AgreementPending,
        &[DealStatus::ClosedWon, DealStatus::ClosedLost],
    ),
    (DealStatus::ClosedWon, &[]),
    (DealStatus::ClosedLost, &[]),
    (DealStatus::Cancelled, &[]),
];

fn targets<S: PartialEq + Copy>(table: &'static [(S, &'static [S])], from: S) -> &'static [S] {
    table
        .iter()
        .find(|(state, _)| *state == from)
        .map(|(_, next)| *next)
        .unwrap_or(&[])
}

pub fn lead_targets(from: LeadStatus) -> &'static [LeadStatus] {
    targets(LEAD_EDGES, from)
}

pub fn lead_transition_allowed(from: LeadStatus, to: LeadStatus) -> bool {
    lead_targets(from).contains(&to)
}

pub fn deal_targets(from: DealStatus) -> &'static [DealStatus] {
    targets(DEAL_EDGES, from)
}

pub fn deal_transition_allowed(from: DealStatus, to: DealStatus) -> bool {
    deal_targets(from).contains(&to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_graph_matches_forward_pipeline() {
        let allowed = [
            (LeadStatus::New, LeadStatus::Contacted),
            (LeadStatus::Contacted, LeadStatus::VisitScheduled),
            (LeadStatus::VisitScheduled, LeadStatus::Negotiation),
            (LeadStatus::Negotiation, LeadStatus::Closed),
            (LeadStatus::New, LeadStatus::Dropped),
            (LeadStatus::Contacted, LeadStatus::Dropped),
            (LeadStatus::VisitScheduled, LeadStatus::Dropped),
            (LeadStatus::Negotiation, LeadStatus::Dropped),
        ];

        for from in LeadStatus::ordered() {
            for to in LeadStatus::ordered() {
                assert_eq!(
                    lead_transition_allowed(from, to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from.label(),
                    to.label()
                );
            }
        }
    }

    #[test]
    fn deal_graph_matches_negotiation_flow() {
        let allowed = [
            (DealStatus::Open, DealStatus::Negotiation),
            (DealStatus::Open, DealStatus::Cancelled),
            (DealStatus::Negotiation, DealStatus::AgreementPending),
            (DealStatus::Negotiation, DealStatus::Cancelled),
            (DealStatus::AgreementPending, DealStatus::ClosedWon),
            (DealStatus::AgreementPending, DealStatus::ClosedLost),
        ];

        for from in DealStatus::ordered() {
            for to in DealStatus::ordered() {
                assert_eq!(
                    deal_transition_allowed(from, to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from.label(),
                    to.label()
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for status in LeadStatus::ordered().into_iter().filter(|s| s.is_terminal()) {
            assert!(lead_targets(status).is_empty());
        }
        for status in DealStatus::ordered().into_iter().filter(|s| s.is_terminal()) {
            assert!(deal_targets(status).is_empty());
        }
    }
}
