use crate::core::error;
use crate::core::state::AppState;
use crate::routes::{auth, health, token};
use crate::utils;
use axum::error_handling::HandleErrorLayer;
use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::{HeaderName, Method, header},
    middleware,
    routing::{get, post},
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{self, CorsLayer},
    trace::TraceLayer,
};
use tracing::info_span;

pub(crate) fn routes(state: AppState, request_timeout: Duration) -> Router {
    // /token/...
    let token_router = Router::new()
        .route("/validate", get(token::validate))
        .route("/refresh", post(token::refresh))
        .route("/revoke", post(token::revoke))
        .route(
            "/revoke-all",
            post(token::revoke_all).route_layer(middleware::from_fn_with_state(
                state.clone(),
                utils::auth::authorize,
            )),
        );

    Router::new()
        .route("/health", get(health::get))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/token", post(token::create))
        .nest("/token", token_router)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                        let matched_path = request
                            .extensions()
                            .get::<MatchedPath>()
                            .map(MatchedPath::as_str);

                        info_span!(
                            "request",
                            method = ?request.method(),
                            matched_path,
                        )
                    }),
                )
                .layer(HandleErrorLayer::new(error::handle_middleware_errors))
                .timeout(request_timeout)
                .layer(
                    CorsLayer::new()
                        .allow_methods([Method::GET, Method::POST])
                        .allow_origin(cors::Any)
                        .allow_headers([
                            header::AUTHORIZATION,
                            header::CONTENT_TYPE,
                            HeaderName::from_static(token::SUBJECT_HEADER),
                        ]),
                ),
        )
}
