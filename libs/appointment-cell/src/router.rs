use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::{auth_middleware, staff_middleware};

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // Public booking and the checkout return leg
    let public_routes = Router::new()
        .route("/book", post(handlers::book_appointment))
        .route("/{appointment_id}/verify-payment", post(handlers::verify_payment));

    // Patients (own appointments) and staff
    let protected_routes = Router::new()
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/reschedule-request", post(handlers::request_reschedule))
        .route("/{appointment_id}/whatsapp-link", get(handlers::get_message_link))
        .route("/{appointment_id}/checkout", post(handlers::create_checkout))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Back office
    let staff_routes = Router::new()
        .route("/agenda", get(handlers::get_agenda))
        .route("/{appointment_id}/status", patch(handlers::update_status))
        .route("/{appointment_id}/payment-status", patch(handlers::update_payment_status))
        .layer(middleware::from_fn_with_state(state.clone(), staff_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(staff_routes)
        .with_state(state)
}
