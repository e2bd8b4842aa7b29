//! API routes.

pub mod auth;
pub mod health;
pub mod sessions;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/auth/sign-in", post(auth::sign_in_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/sessions", get(sessions::list_handler))
        .route("/sessions/terminate-others", post(sessions::terminate_others_handler))
        .route(
            "/sessions/:id",
            get(sessions::get_handler).delete(sessions::terminate_handler),
        )
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}
