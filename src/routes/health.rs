use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::core::state::AppState;
use crate::types::response;

pub(crate) async fn get(State(state): State<AppState>) -> (StatusCode, Json<response::Health>) {
    match state.authority.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(response::Health {
                status: "ok",
                store: state.backend_name,
            }),
        ),
        Err(e) => {
            tracing::error!("credential store health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(response::Health {
                    status: "unavailable",
                    store: state.backend_name,
                }),
            )
        }
    }
}
