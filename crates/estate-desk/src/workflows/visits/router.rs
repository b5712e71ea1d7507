use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, patch},
    Json, Router,
};

use super::service::{
    CreateVisitRequest, ReassignVisitRequest, RescheduleVisitRequest, SetVisitStatusRequest,
    VisitListQuery, VisitScheduler,
};
use crate::workflows::domain::{Actor, VisitId};
use crate::workflows::http::{blocking, respond};
use crate::workflows::repository::PipelineStore;

pub fn visit_router<S: PipelineStore>(scheduler: Arc<VisitScheduler<S>>) -> Router {
    Router::new()
        .route(
            "/visits",
            get(list_handler::<S>).post(create_handler::<S>),
        )
        .route("/visits/my", get(buyer_visits_handler::<S>))
        .route("/visits/agent", get(agent_visits_handler::<S>))
        .route(
            "/visits/:visit_id",
            get(get_handler::<S>).delete(cancel_handler::<S>),
        )
        .route("/visits/:visit_id/status", patch(status_handler::<S>))
        .route("/visits/:visit_id/reschedule", patch(reschedule_handler::<S>))
        .route("/visits/:visit_id/reassign", patch(reassign_handler::<S>))
        .with_state(scheduler)
}

async fn create_handler<S: PipelineStore>(
    State(scheduler): State<Arc<VisitScheduler<S>>>,
    actor: Actor,
    Json(request): Json<CreateVisitRequest>,
) -> Response {
    let result = blocking(move || scheduler.create_visit(&actor, request)).await;
    respond(StatusCode::CREATED, result)
}

async fn list_handler<S: PipelineStore>(
    State(scheduler): State<Arc<VisitScheduler<S>>>,
    actor: Actor,
    Query(query): Query<VisitListQuery>,
) -> Response {
    let result = blocking(move || scheduler.list_visits(&actor, query)).await;
    respond(StatusCode::OK, result)
}

async fn buyer_visits_handler<S: PipelineStore>(
    State(scheduler): State<Arc<VisitScheduler<S>>>,
    actor: Actor,
    Query(query): Query<VisitListQuery>,
) -> Response {
    let result = blocking(move || scheduler.list_buyer_visits(&actor, query)).await;
    respond(StatusCode::OK, result)
}

async fn agent_visits_handler<S: PipelineStore>(
    State(scheduler): State<Arc<VisitScheduler<S>>>,
    actor: Actor,
    Query(query): Query<VisitListQuery>,
) -> Response {
    let result = blocking(move || scheduler.list_agent_visits(&actor, query)).await;
    respond(StatusCode::OK, result)
}

async fn get_handler<S: PipelineStore>(
    State(scheduler): State<Arc<VisitScheduler<S>>>,
    actor: Actor,
    Path(visit_id): Path<u64>,
) -> Response {
    let result = blocking(move || scheduler.get_visit(&actor, VisitId(visit_id))).await;
    respond(StatusCode::OK, result)
}

async fn cancel_handler<S: PipelineStore>(
    State(scheduler): State<Arc<VisitScheduler<S>>>,
    actor: Actor,
    Path(visit_id): Path<u64>,
) -> Response {
    let result = blocking(move || scheduler.cancel(&actor, VisitId(visit_id))).await;
    respond(StatusCode::OK, result)
}

async fn status_handler<S: PipelineStore>(
    State(scheduler): State<Arc<VisitScheduler<S>>>,
    actor: Actor,
    Path(visit_id): Path<u64>,
    Json(request): Json<SetVisitStatusRequest>,
) -> Response {
    let result =
        blocking(move || scheduler.set_status(&actor, VisitId(visit_id), request)).await;
    respond(StatusCode::OK, result)
}

async fn reschedule_handler<S: PipelineStore>(
    State(scheduler): State<Arc<VisitScheduler<S>>>,
    actor: Actor,
    Path(visit_id): Path<u64>,
    Json(request): Json<RescheduleVisitRequest>,
) -> Response {
    let result =
        blocking(move || scheduler.reschedule(&actor, VisitId(visit_id), request)).await;
    respond(StatusCode::OK, result)
}

async fn reassign_handler<S: PipelineStore>(
    State(scheduler): State<Arc<VisitScheduler<S>>>,
    actor: Actor,
    Path(visit_id): Path<u64>,
    Json(request): Json<ReassignVisitRequest>,
) -> Response {
    let result =
        blocking(move || scheduler.reassign_agent(&actor, VisitId(visit_id), request)).await;
    respond(StatusCode::OK, result)
}
