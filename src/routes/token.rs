use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::instrument;

use crate::core::error::Error;
use crate::core::state::AppState;
use crate::types::{AuthenticatedSubject, response};
use crate::utils::auth::bearer_token;

/// Header carrying the subject already authenticated by an upstream service.
pub(crate) const SUBJECT_HEADER: &str = "x-user-id";

#[instrument(skip_all)]
pub(crate) async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<response::Token>, Error> {
    let subject = match headers.get(SUBJECT_HEADER) {
        Some(value) => value.to_str()?.trim(),
        None => return Err(Error::MissingSubject),
    };

    if subject.is_empty() {
        return Err(Error::MissingSubject);
    }

    let issued = state.authority.issue(subject).await?;

    Ok(Json(issued.into()))
}

#[instrument(skip_all)]
pub(crate) async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<response::Validation>), Error> {
    let token = match bearer_token(&headers) {
        Some(token) => token,
        None => return Ok((StatusCode::UNAUTHORIZED, Json(response::Validation::invalid()))),
    };

    match state.authority.validate(token).await {
        Ok(subject) => Ok((StatusCode::OK, Json(response::Validation::valid(subject)))),
        Err(e) if e.is_rejection() => {
            tracing::debug!("credential rejected: {}", e);
            Ok((StatusCode::UNAUTHORIZED, Json(response::Validation::invalid())))
        }
        Err(e) => Err(e),
    }
}

#[instrument(skip_all)]
pub(crate) async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<response::Token>, Error> {
    let token = bearer_token(&headers).ok_or(Error::NoCredentials)?;

    let issued = state.authority.refresh(token).await?;

    Ok(Json(issued.into()))
}

#[instrument(skip_all)]
pub(crate) async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<response::Message>, Error> {
    if let Some(token) = bearer_token(&headers) {
        state.authority.revoke(token).await?;
    }

    Ok(Json(response::Message::new("Token revoked")))
}

#[instrument(skip_all, fields(subject = %subject.0))]
pub(crate) async fn revoke_all(
    State(state): State<AppState>,
    Extension(subject): Extension<AuthenticatedSubject>,
) -> Result<Json<response::Message>, Error> {
    state.authority.revoke_all(&subject.0).await?;

    Ok(Json(response::Message::new("All tokens revoked")))
}
