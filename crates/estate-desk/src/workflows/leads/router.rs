use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, patch, post},
    Json, Router,
};

use super::service::{
    AddLeadNoteRequest, CreateLeadRequest, LeadListQuery, LeadRegistry, ReassignLeadRequest,
    SubmitOfferRequest, UpdateLeadStatusRequest,
};
use crate::workflows::domain::{Actor, LeadId};
use crate::workflows::http::{blocking, respond};
use crate::workflows::repository::PipelineStore;

/// Lead endpoints: buyer intake and offers, agent pipeline and notes, admin listing and assignment.
pub fn lead_router<S: PipelineStore>(registry: Arc<LeadRegistry<S>>) -> Router {
    Router::new()
        .route("/inquiries", post(create_handler::<S>))
        .route("/inquiries/my", get(buyer_leads_handler::<S>))
        .route("/inquiries/:lead_id", get(get_handler::<S>))
        .route("/inquiries/:lead_id/status", patch(status_handler::<S>))
        .route("/inquiries/:lead_id/offer", patch(offer_handler::<S>))
        .route(
            "/inquiries/:lead_id/notes",
            post(add_note_handler::<S>).get(list_notes_handler::<S>),
        )
        .route("/agent/leads", get(agent_leads_handler::<S>))
        .route("/admin/leads", get(admin_leads_handler::<S>))
        .route("/admin/leads/:lead_id/assign", patch(reassign_handler::<S>))
        .with_state(registry)
}

pub(crate) async fn create_handler<S: PipelineStore>(
    State(registry): State<Arc<LeadRegistry<S>>>,
    actor: Actor,
    Json(request): Json<CreateLeadRequest>,
) -> Response {
    let result = blocking(move || registry.create_lead(&actor, request)).await;
    respond(StatusCode::CREATED, result)
}

async fn get_handler<S: PipelineStore>(
    State(registry): State<Arc<LeadRegistry<S>>>,
    actor: Actor,
    Path(lead_id): Path<u64>,
) -> Response {
    let result = blocking(move || registry.get_lead(&actor, LeadId(lead_id))).await;
    respond(StatusCode::OK, result)
}

async fn buyer_leads_handler<S: PipelineStore>(
    State(registry): State<Arc<LeadRegistry<S>>>,
    actor: Actor,
    Query(query): Query<LeadListQuery>,
) -> Response {
    let result = blocking(move || registry.list_buyer_leads(&actor, query)).await;
    respond(StatusCode::OK, result)
}

async fn agent_leads_handler<S: PipelineStore>(
    State(registry): State<Arc<LeadRegistry<S>>>,
    actor: Actor,
    Query(query): Query<LeadListQuery>,
) -> Response {
    let result = blocking(move || registry.list_agent_leads(&actor, query)).await;
    respond(StatusCode::OK, result)
}

async fn admin_leads_handler<S: PipelineStore>(
    State(registry): State<Arc<LeadRegistry<S>>>,
    actor: Actor,
    Query(query): Query<LeadListQuery>,
) -> Response {
    let result = blocking(move || registry.list_admin_leads(&actor, query)).await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn status_handler<S: PipelineStore>(
    State(registry): State<Arc<LeadRegistry<S>>>,
    actor: Actor,
    Path(lead_id): Path<u64>,
    Json(request): Json<UpdateLeadStatusRequest>,
) -> Response {
    let result =
        blocking(move || registry.update_status(&actor, LeadId(lead_id), request)).await;
    respond(StatusCode::OK, result)
}

async fn offer_handler<S: PipelineStore>(
    State(registry): State<Arc<LeadRegistry<S>>>,
    actor: Actor,
    Path(lead_id): Path<u64>,
    Json(request): Json<SubmitOfferRequest>,
) -> Response {
    let result = blocking(move || registry.submit_offer(&actor, LeadId(lead_id), request)).await;
    respond(StatusCode::OK, result)
}

async fn add_note_handler<S: PipelineStore>(
    State(registry): State<Arc<LeadRegistry<S>>>,
    actor: Actor,
    Path(lead_id): Path<u64>,
    Json(request): Json<AddLeadNoteRequest>,
) -> Response {
    let result = blocking(move || registry.add_note(&actor, LeadId(lead_id), request)).await;
    respond(StatusCode::CREATED, result)
}

async fn list_notes_handler<S: PipelineStore>(
    State(registry): State<Arc<LeadRegistry<S>>>,
    actor: Actor,
    Path(lead_id): Path<u64>,
) -> Response {
    let result = blocking(move || registry.list_notes(&actor, LeadId(lead_id))).await;
    respond(StatusCode::OK, result)
}

async fn reassign_handler<S: PipelineStore>(
    State(registry): State<Arc<LeadRegistry<S>>>,
    actor: Actor,
    Path(lead_id): Path<u64>,
    Json(request): Json<ReassignLeadRequest>,
) -> Response {
    let result = blocking(move || registry.reassign(&actor, LeadId(lead_id), request)).await;
    respond(StatusCode::OK, result)
}
