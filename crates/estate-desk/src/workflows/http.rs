//! HTTP plumbing shared by the lead, visit, and deal routers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use super::domain::{Actor, Role, UserId};
use super::error::PipelineError;
use super::repository::RepositoryError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Identity claims were missing or unreadable.
#[derive(Debug, thiserror::Error)]
pub enum IdentityRejection {
    #[error("missing {0} header")]
    Missing(&'static str),
    #[error("invalid {0} header")]
    Invalid(&'static str),
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.to_string() });
        (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
    }
}

fn header<'a>(parts: &'a Parts, name: &'static str) -> Result<&'a str, IdentityRejection> {
    parts
        .headers
        .get(name)
        .ok_or(IdentityRejection::Missing(name))?
        .to_str()
        .map_err(|_| IdentityRejection::Invalid(name))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)?
            .trim()
            .parse::<u64>()
            .map_err(|_| IdentityRejection::Invalid(ACTOR_ID_HEADER))?;
        let role = Role::parse(header(parts, ACTOR_ROLE_HEADER)?)
            .ok_or(IdentityRejection::Invalid(ACTOR_ROLE_HEADER))?;
        Ok(Actor::new(UserId(id), role))
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let (status, payload) = match &self {
            PipelineError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "field": field }),
            ),
            PipelineError::NotFound(_) => {
                (StatusCode::NOT_FOUND, json!({ "error": self.to_string() }))
            }
            PipelineError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "error": "forbidden", "reason": "forbidden" }),
            ),
            PipelineError::Conflict(reason) => (
                StatusCode::CONFLICT,
                json!({ "error": reason.to_string(), "reason": reason.code() }),
            ),
            PipelineError::Repository(RepositoryError::Conflict) => (
                StatusCode::CONFLICT,
                json!({ "error": self.to_string(), "reason": "conflict" }),
            ),
            PipelineError::Repository(RepositoryError::NotFound) => {
                (StatusCode::NOT_FOUND, json!({ "error": self.to_string() }))
            }
            PipelineError::Repository(RepositoryError::Unavailable(_)) => {
                tracing::error!(error = %self, "pipeline store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };
        (status, Json(payload)).into_response()
    }
}

/// Run a service call on the blocking pool; row-lock waits park the calling thread.
pub(crate) async fn blocking<T, F>(task: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.unwrap_or_else(|err| {
        Err(PipelineError::Repository(RepositoryError::Unavailable(
            format!("worker task failed: {err}"),
        )))
    })
}

pub(crate) fn respond<T: Serialize>(status: StatusCode, result: Result<T, PipelineError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) fn no_content(result: Result<(), PipelineError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::error::ConflictReason;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Actor, IdentityRejection> {
        let (mut parts, _) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_actor_from_headers() {
        let request = Request::builder()
            .header(ACTOR_ID_HEADER, "42")
            .header(ACTOR_ROLE_HEADER, "Agent")
            .body(())
            .expect("request");
        let actor = extract(request).await.expect("actor");
        assert_eq!(actor, Actor::new(UserId(42), Role::Agent));
    }

    #[tokio::test]
    async fn missing_or_bad_claims_are_unauthorized() {
        let missing = Request::builder().body(()).expect("request");
        let rejection = extract(missing).await.expect_err("missing headers");
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);

        let bad_role = Request::builder()
            .header(ACTOR_ID_HEADER, "42")
            .header(ACTOR_ROLE_HEADER, "landlord")
            .body(())
            .expect("request");
        assert!(matches!(
            extract(bad_role).await,
            Err(IdentityRejection::Invalid(ACTOR_ROLE_HEADER))
        ));
    }

    #[test]
    fn conflicts_map_to_409() {
        let response = PipelineError::Conflict(ConflictReason::DealExists).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let response = PipelineError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response =
            PipelineError::Repository(RepositoryError::Unavailable("down".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
