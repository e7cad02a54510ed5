use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AgendaQuery, AppointmentError, BookingRequest, BookingResponse, CancelAppointmentRequest,
    MessageLinkQuery, PaymentStatus, RescheduleRequest, UpdatePaymentStatusRequest,
    UpdateStatusRequest, VerifyPaymentRequest,
};
use crate::services::booking::{ensure_access, AppointmentBookingService};
use crate::services::messaging::patient_message_link;
use crate::services::payment::PaymentService;
use crate::services::policy::{can_cancel, can_request_reschedule};

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match &err {
            AppointmentError::NotFound
            | AppointmentError::ServiceNotFound
            | AppointmentError::ProfessionalNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotNotAvailable => AppError::Conflict(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg.clone()),
            AppointmentError::InvalidTime(msg) => AppError::BadRequest(msg.clone()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg.clone()),
            AppointmentError::ExternalServiceError(msg) => AppError::ExternalService(msg.clone()),
            AppointmentError::PaymentNotConfigured => AppError::ExternalService(err.to_string()),
            AppointmentError::ServiceInactive
            | AppointmentError::ProfessionalInactive
            | AppointmentError::SpecialtyMismatch { .. }
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::InvalidPaymentTransition { .. }
            | AppointmentError::CancellationWindowClosed { .. }
            | AppointmentError::RescheduleNotAllowed(_)
            | AppointmentError::PaymentSessionMismatch
            | AppointmentError::MissingPhone => AppError::BusinessRule(err.to_string()),
        }
    }
}

// ==============================================================================
// PUBLIC BOOKING
// ==============================================================================

/// Commit a booking from the public wizard. When payments are configured a
/// checkout session is opened right away.
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.book_appointment(request, None).await?;

    let payment_service = PaymentService::new(&state);
    let checkout = if payment_service.is_configured() {
        match payment_service.create_checkout(&appointment, None).await {
            Ok(session) => Some(session),
            Err(e) => {
                // The booking stands; checkout can be retried from the appointment
                warn!("Checkout for appointment {} not opened: {}", appointment.id, e);
                None
            }
        }
    } else {
        None
    };

    Ok(Json(BookingResponse { appointment, checkout }))
}

/// Return leg of the checkout redirect. The session id is the proof of
/// payment attempt, so no login is required.
pub async fn verify_payment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let payment_service = PaymentService::new(&state);
    let appointment = payment_service.verify_payment(appointment_id, &request.session_id, None).await?;

    Ok(Json(json!({
        "appointment": appointment,
        "paid": appointment.payment_status == PaymentStatus::Paid
    })))
}

// ==============================================================================
// AUTHENTICATED: PATIENT OR STAFF
// ==============================================================================

pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.get_appointment(appointment_id, Some(auth.token())).await?;
    ensure_access(&appointment, &user)?;

    let now = state.clinic.now_local();
    let cancellable = can_cancel(&appointment, now, state.clinic.cancellation_notice());
    let reschedulable = can_request_reschedule(&appointment);

    Ok(Json(json!({
        "appointment": appointment,
        "can_cancel": cancellable,
        "can_request_reschedule": reschedulable
    })))
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .cancel_appointment(appointment_id, request, &user, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

pub async fn request_reschedule(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .request_reschedule(appointment_id, request, &user, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

pub async fn get_message_link(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Query(query): Query<MessageLinkQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.get_appointment(appointment_id, Some(auth.token())).await?;
    ensure_access(&appointment, &user)?;

    let url = patient_message_link(&appointment, query.kind, &state.clinic)?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "kind": query.kind,
        "url": url
    })))
}

pub async fn create_checkout(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.get_appointment(appointment_id, Some(auth.token())).await?;
    ensure_access(&appointment, &user)?;

    let payment_service = PaymentService::new(&state);
    let session = payment_service.create_checkout(&appointment, Some(auth.token())).await?;

    Ok(Json(json!({
        "session_id": session.session_id,
        "url": session.url
    })))
}

// ==============================================================================
// STAFF
// ==============================================================================

pub async fn get_agenda(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AgendaQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_agenda(&query, auth.token()).await?;

    Ok(Json(json!({
        "from": query.from,
        "to": query.to,
        "total": appointments.len(),
        "appointments": appointments
    })))
}

pub async fn update_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("User {} setting appointment {} to {}", user.id, appointment_id, request.status);

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.update_status(appointment_id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

pub async fn update_payment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("User {} setting payment of {} to {}", user.id, appointment_id, request.payment_status);

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .update_payment_status(appointment_id, request, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}
