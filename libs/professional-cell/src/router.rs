use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::staff_middleware;

use crate::handlers;

pub fn professional_routes(state: Arc<AppConfig>) -> Router {
    // Public routes used by the booking flow
    let public_routes = Router::new()
        .route("/", get(handlers::list_professionals))
        .route("/services", get(handlers::list_services))
        .route("/{professional_id}", get(handlers::get_professional))
        .route("/{professional_id}/schedules", get(handlers::get_schedules))
        .route("/{professional_id}/slots", get(handlers::get_day_slots))
        .route("/{professional_id}/available-dates", get(handlers::get_available_dates));

    // Back office
    let staff_routes = Router::new()
        .route("/{professional_id}/agenda-slots", get(handlers::get_day_agenda_slots))
        .route("/{professional_id}/schedules", post(handlers::create_schedule))
        .route(
            "/{professional_id}/schedules/{schedule_id}",
            put(handlers::update_schedule).delete(handlers::delete_schedule),
        )
        .route(
            "/{professional_id}/blocked-times",
            get(handlers::list_blocked_times).post(handlers::create_blocked_time),
        )
        .route(
            "/{professional_id}/blocked-times/{blocked_id}",
            axum::routing::delete(handlers::delete_blocked_time),
        )
        .layer(middleware::from_fn_with_state(state.clone(), staff_middleware));

    Router::new()
        .merge(public_routes)
        .merge(staff_routes)
        .with_state(state)
}
