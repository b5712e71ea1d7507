use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, patch},
    Json, Router,
};

use super::conversion::ConvertLeadRequest;
use super::ledger::{AddDealDocumentRequest, AddDealNoteRequest};
use super::service::{
    DealEngine, DealListQuery, ReassignDealRequest, UpdateDealOfferRequest,
    UpdateDealStatusRequest,
};
use crate::workflows::domain::{Actor, DealDocumentId, DealId};
use crate::workflows::http::{blocking, no_content, respond};
use crate::workflows::notifications::NotificationPublisher;
use crate::workflows::repository::PipelineStore;

type Engine<S, N> = State<Arc<DealEngine<S, N>>>;

pub fn deal_router<S, N>(engine: Arc<DealEngine<S, N>>) -> Router
where
    S: PipelineStore,
    N: NotificationPublisher,
{
    Router::new()
        .route(
            "/deals",
            get(list_handler::<S, N>).post(convert_handler::<S, N>),
        )
        .route("/deals/my", get(buyer_deals_handler::<S, N>))
        .route("/deals/agent", get(agent_deals_handler::<S, N>))
        .route(
            "/deals/:deal_id",
            get(get_handler::<S, N>).delete(cancel_handler::<S, N>),
        )
        .route("/deals/:deal_id/status", patch(status_handler::<S, N>))
        .route("/deals/:deal_id/offer", patch(offer_handler::<S, N>))
        .route("/deals/:deal_id/reassign", patch(reassign_handler::<S, N>))
        .route(
            "/deals/:deal_id/notes",
            get(list_notes_handler::<S, N>).post(add_note_handler::<S, N>),
        )
        .route(
            "/deals/:deal_id/documents",
            get(list_documents_handler::<S, N>).post(add_document_handler::<S, N>),
        )
        .route(
            "/deals/:deal_id/documents/:document_id",
            delete(delete_document_handler::<S, N>),
        )
        .route("/deals/:deal_id/audit", get(audit_handler::<S, N>))
        .with_state(engine)
}

async fn convert_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Json(request): Json<ConvertLeadRequest>,
) -> Response {
    let result = blocking(move || engine.convert_lead(&actor, request)).await;
    respond(StatusCode::CREATED, result)
}

async fn list_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Query(query): Query<DealListQuery>,
) -> Response {
    let result = blocking(move || engine.list_deals(&actor, query)).await;
    respond(StatusCode::OK, result)
}

async fn buyer_deals_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Query(query): Query<DealListQuery>,
) -> Response {
    let result = blocking(move || engine.list_buyer_deals(&actor, query)).await;
    respond(StatusCode::OK, result)
}

async fn agent_deals_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Query(query): Query<DealListQuery>,
) -> Response {
    let result = blocking(move || engine.list_agent_deals(&actor, query)).await;
    respond(StatusCode::OK, result)
}

async fn get_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Path(deal_id): Path<u64>,
) -> Response {
    let result = blocking(move || engine.get_deal(&actor, DealId(deal_id))).await;
    respond(StatusCode::OK, result)
}

async fn cancel_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Path(deal_id): Path<u64>,
) -> Response {
    let result = blocking(move || engine.cancel(&actor, DealId(deal_id))).await;
    respond(StatusCode::OK, result)
}

async fn status_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Path(deal_id): Path<u64>,
    Json(request): Json<UpdateDealStatusRequest>,
) -> Response {
    let result = blocking(move || engine.update_status(&actor, DealId(deal_id), request)).await;
    respond(StatusCode::OK, result)
}

async fn offer_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Path(deal_id): Path<u64>,
    Json(request): Json<UpdateDealOfferRequest>,
) -> Response {
    let result = blocking(move || engine.update_offer(&actor, DealId(deal_id), request)).await;
    respond(StatusCode::OK, result)
}

async fn reassign_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Path(deal_id): Path<u64>,
    Json(request): Json<ReassignDealRequest>,
) -> Response {
    let result = blocking(move || engine.reassign(&actor, DealId(deal_id), request)).await;
    respond(StatusCode::OK, result)
}

async fn list_notes_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Path(deal_id): Path<u64>,
) -> Response {
    let result = blocking(move || engine.list_notes(&actor, DealId(deal_id))).await;
    respond(StatusCode::OK, result)
}

async fn add_note_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Path(deal_id): Path<u64>,
    Json(request): Json<AddDealNoteRequest>,
) -> Response {
    let result = blocking(move || engine.add_note(&actor, DealId(deal_id), request)).await;
    respond(StatusCode::CREATED, result)
}

async fn list_documents_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Path(deal_id): Path<u64>,
) -> Response {
    let result = blocking(move || engine.list_documents(&actor, DealId(deal_id))).await;
    respond(StatusCode::OK, result)
}

async fn add_document_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Path(deal_id): Path<u64>,
    Json(request): Json<AddDealDocumentRequest>,
) -> Response {
    let result = blocking(move || engine.add_document(&actor, DealId(deal_id), request)).await;
    respond(StatusCode::CREATED, result)
}

async fn delete_document_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Path((deal_id, document_id)): Path<(u64, u64)>,
) -> Response {
    let result = blocking(move || {
        engine.delete_document(&actor, DealId(deal_id), DealDocumentId(document_id))
    })
    .await;
    no_content(result)
}

async fn audit_handler<S: PipelineStore, N: NotificationPublisher>(
    State(engine): Engine<S, N>,
    actor: Actor,
    Path(deal_id): Path<u64>,
) -> Response {
    let result = blocking(move || engine.audit_trail(&actor, DealId(deal_id))).await;
    respond(StatusCode::OK, result)
}
