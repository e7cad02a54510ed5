use std::sync::Arc;

use axum::{
    Json, Router,
    routing::get,
};
use serde_json::{json, Value};

use appointment_cell::router::appointment_routes;
use professional_cell::router::professional_routes;
use reporting_cell::router::reporting_routes;
use shared_config::AppConfig;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .route("/health", get(health))
        .nest("/professionals", professional_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/reports", reporting_routes(state))
}
