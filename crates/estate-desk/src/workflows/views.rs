use super::domain::{
    latest_visit, Deal, DealView, Lead, LeadSummary, LeadView, PartySummary, PropertyId,
    PropertySummary, UserId, Visit, VisitStatus, VisitView,
};
use super::repository::{PipelineStore, RepositoryError};

fn party<S: PipelineStore>(store: &S, id: Option<UserId>) -> Result<Option<PartySummary>, RepositoryError> {
    match id {
        Some(id) => Ok(store.user(id)?.as_ref().map(PartySummary::from)),
        None => Ok(None),
    }
}

fn property<S: PipelineStore>(
    store: &S,
    id: PropertyId,
) -> Result<Option<PropertySummary>, RepositoryError> {
    Ok(store.property(id)?.as_ref().map(PropertySummary::from))
}

pub(crate) fn lead_view<S: PipelineStore>(store: &S, lead: Lead) -> Result<LeadView, RepositoryError> {
    let visits = store.visits_for_lead(lead.id)?;
    let latest = latest_visit(&visits);
    let has_completed_visit = visits
        .iter()
        .any(|visit| visit.status == VisitStatus::Completed);
    let has_active_deal = store.active_deal_for_lead(lead.id)?.is_some();

    Ok(LeadView {
        has_active_deal,
        has_completed_visit,
        latest_visit_id: latest.map(|visit| visit.id),
        latest_visit_status: latest.map(|visit| visit.status),
        latest_visit_scheduled_at: latest.and_then(|visit| visit.scheduled_at),
        latest_visit_completed: latest.is_some_and(|visit| visit.status == VisitStatus::Completed),
        property: property(store, lead.property_id)?,
        buyer: party(store, Some(lead.buyer_id))?,
        agent: party(store, lead.agent_id)?,
        lead,
    })
}

pub(crate) fn visit_view<S: PipelineStore>(
    store: &S,
    visit: Visit,
) -> Result<VisitView, RepositoryError> {
    Ok(VisitView {
        property: property(store, visit.property_id)?,
        buyer: party(store, Some(visit.buyer_id))?,
        agent: party(store, visit.agent_id)?,
        visit,
    })
}

pub(crate) fn deal_view<S: PipelineStore>(store: &S, deal: Deal) -> Result<DealView, RepositoryError> {
    let lead = match deal.lead_id {
        Some(id) => store.fetch_lead(id)?.map(|lead| LeadSummary {
            id: lead.id,
            status: lead.status,
            message: lead.message,
            created_at: lead.created_at,
        }),
        None => None,
    };

    Ok(DealView {
        property: property(store, deal.property_id)?,
        buyer: party(store, Some(deal.buyer_id))?,
        agent: party(store, deal.agent_id)?,
        lead,
        deal,
    })
}
