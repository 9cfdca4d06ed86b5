use axum::Json;
use axum::extract::State;
use tracing::instrument;

use crate::core::error::Error;
use crate::core::state::AppState;
use crate::types::{request, response};

#[instrument(skip_all, fields(username = %user_data.username))]
pub(crate) async fn register(
    State(state): State<AppState>,
    Json(user_data): Json<request::LoginData>,
) -> Result<Json<response::Token>, Error> {
    let user = state
        .user_controller
        .register(&user_data.username, &user_data.password)
        .await?;

    let issued = state.authority.issue(&user.subject()).await?;

    Ok(Json(issued.into()))
}

#[instrument(skip_all, fields(username = %user_data.username))]
pub(crate) async fn login(
    State(state): State<AppState>,
    Json(user_data): Json<request::LoginData>,
) -> Result<Json<response::Token>, Error> {
    let user = state
        .user_controller
        .login(&user_data.username, &user_data.password)
        .await?;

    let issued = state.authority.issue(&user.subject()).await?;

    Ok(Json(issued.into()))
}
