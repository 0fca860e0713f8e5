use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{creations, handlers, pricing, middleware as api_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes: authenticated, metered, traced. Admission is applied
    // per-handler so validation can run before a token is consumed.
    let api_routes = Router::new()
        // Creations
        .route("/creations/create", post(creations::create_creation))
        .route("/creations", get(creations::list_creations))
        .route("/creations/{id}", get(creations::get_creation))
        // Pricing
        .route("/pricing", get(pricing::get_pricing))
        // Config
        .route("/config", get(handlers::get_config))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_middleware::auth_middleware,
        ))
        .layer(middleware::from_fn(api_middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Health and metrics stay outside auth, admission, and request logging.
    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_endpoint))
        .with_state(state)
}
