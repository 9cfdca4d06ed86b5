use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::{body::Body, http::Response, middleware::Next};

use crate::core::error::Error;
use crate::core::state::AppState;
use crate::types::AuthenticatedSubject;

/// Extracts the credential from an `Authorization: Bearer <credential>`
/// header. `None` when the header is absent, not visible ASCII, or uses
/// another scheme.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth_header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    let mut parts = auth_header.split_whitespace();

    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

/// Rejects requests without a valid bearer credential and exposes the
/// verified subject to the handler as [`AuthenticatedSubject`].
pub(crate) async fn authorize(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response<Body>, Error> {
    let token = bearer_token(request.headers()).ok_or(Error::NoCredentials)?;

    let subject = state.authority.validate(token).await?;

    request
        .extensions_mut()
        .insert(AuthenticatedSubject(subject));

    Ok(next.run(request).await)
}
