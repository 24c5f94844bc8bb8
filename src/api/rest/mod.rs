pub mod auth;
pub mod bookings;
pub mod donations;
pub mod nearby;
pub mod profiles;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(profiles::router())
        .merge(donations::router())
        .merge(bookings::router())
        .merge(nearby::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws/nearby", get(ws::nearby_ws_handler))
        .route("/ws/orders/booked", get(ws::booked_orders_ws_handler))
        .route("/ws/orders/tracked", get(ws::tracked_orders_ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    pending_donations: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.query_pending().await {
        Ok(pending) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                pending_donations: pending.len(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
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
