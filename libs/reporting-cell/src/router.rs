use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::staff_middleware;

use crate::handlers;

pub fn reporting_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/financial", get(handlers::get_financial_report))
        .route("/goals", get(handlers::list_goals).put(handlers::upsert_goal))
        .route("/goals/{professional_id}/progress", get(handlers::get_goal_progress))
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/{notification_id}/read", patch(handlers::mark_notification_read))
        .layer(middleware::from_fn_with_state(state.clone(), staff_middleware))
        .with_state(state)
}
