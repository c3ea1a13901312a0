//! Route table and dispatch.
//!
//! The same table is mounted at the root and again under the API prefix, so
//! `/api/greeting` and `/api/api/greeting` answer identically and `/api`
//! (with or without a trailing slash) returns the welcome text. Anything
//! unmatched, including a known path with the wrong method, reaches the
//! not-found fallback.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::lifecycle::startup::AppContext;
use crate::routing::handlers;
use crate::routing::validation::require_email;

/// Handlers, unmounted.
pub fn route_table() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/", get(handlers::welcome))
        .route("/api/greeting", get(handlers::greeting))
        .route("/api/external", get(handlers::external))
        .route(
            "/api/data",
            post(handlers::submit_data).layer(middleware::from_fn(require_email)),
        )
}

/// Terminal router for the pipeline.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let routing = &ctx.config.routing;
    let mut router = route_table();

    if routing.mount_api_prefix {
        // `nest` only matches the bare prefix; the mounted root also answers with a slash.
        router = router
            .nest(&routing.api_prefix, route_table())
            .route(&format!("{}/", routing.api_prefix), get(handlers::welcome));
    }

    router
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .with_state(ctx)
}
