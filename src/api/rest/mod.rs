pub mod auth;
pub mod drivers;
pub mod extract;
pub mod orders;
pub mod routes;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/api/orders", orders::router())
        .nest("/api/routes", routes::router())
        .nest("/api/drive", drivers::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store: &'static str,
    cache: &'static str,
}

fn probe<E: std::fmt::Display>(component: &str, result: Result<(), E>) -> &'static str {
    match result {
        Ok(()) => "up",
        Err(err) => {
            tracing::warn!(component, error = %err, "health probe failed");
            "down"
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = probe("store", state.store.ping().await);
    let cache = probe("cache", state.cache.ping().await);

    // A cache outage degrades reads but does not stop the service.
    let (code, status) = match (store, cache) {
        ("up", "up") => (StatusCode::OK, "ok"),
        ("up", _) => (StatusCode::OK, "degraded"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };

    (
        code,
        Json(HealthResponse {
            status,
            store,
            cache,
        }),
    )
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
