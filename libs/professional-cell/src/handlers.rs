use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseError;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AvailableDatesQuery, CreateBlockedTimeRequest, CreateScheduleRequest, DateRangeQuery,
    DaySlotsResponse, ProfessionalError, ProfessionalSearchQuery, Slot, SlotQuery,
    UpdateScheduleRequest,
};
use crate::services::slots::is_offered_on;
use crate::services::{CatalogService, ScheduleService, SlotService};

pub(crate) fn map_error(error: anyhow::Error) -> AppError {
    if let Some(err) = error.downcast_ref::<ProfessionalError>() {
        return match err {
            ProfessionalError::NotFound
            | ProfessionalError::ServiceNotFound
            | ProfessionalError::ScheduleNotFound => AppError::NotFound(err.to_string()),
            ProfessionalError::Inactive => AppError::BusinessRule(err.to_string()),
            ProfessionalError::ScheduleOverlap => AppError::Conflict(err.to_string()),
            ProfessionalError::ValidationError(msg) => AppError::ValidationError(msg.clone()),
        };
    }

    if let Some(err) = SupabaseError::from_anyhow(&error) {
        if err.is_auth() {
            return AppError::Forbidden(err.message.clone());
        }
        if err.is_not_found() {
            return AppError::NotFound(err.message.clone());
        }
    }

    AppError::Database(error.to_string())
}

// ==============================================================================
// PUBLIC CATALOG
// ==============================================================================

pub async fn list_services(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ProfessionalSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let catalog = CatalogService::new(&state);
    let services = catalog.list_services(query.specialty.as_deref(), None).await
        .map_err(map_error)?;

    Ok(Json(json!({ "services": services })))
}

pub async fn list_professionals(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ProfessionalSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let catalog = CatalogService::new(&state);

    let professionals = match query.service_id {
        Some(service_id) => catalog.professionals_for_service(service_id, None).await,
        None => catalog.list_professionals(query.specialty.as_deref(), None).await,
    }
    .map_err(map_error)?;

    Ok(Json(json!({ "professionals": professionals })))
}

pub async fn get_professional(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let catalog = CatalogService::new(&state);
    let professional = catalog.get_professional(professional_id, None).await
        .map_err(map_error)?;

    if !professional.is_active {
        return Err(AppError::NotFound("Professional not found".to_string()));
    }

    Ok(Json(json!(professional)))
}

pub async fn get_schedules(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(&state);
    let schedules = schedule_service.get_schedules(professional_id, None).await
        .map_err(map_error)?;

    Ok(Json(json!({ "schedules": schedules })))
}

/// Public slot listing. Booking details are redacted.
pub async fn get_day_slots(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<DaySlotsResponse>, AppError> {
    let slot_service = SlotService::new(&state);
    let slots = slot_service.get_day_slots(professional_id, query.date, None).await
        .map_err(map_error)?;

    Ok(Json(DaySlotsResponse {
        professional_id,
        date: query.date,
        offered: !slots.is_empty(),
        slots: slots.into_iter().map(Slot::redacted).collect(),
    }))
}

pub async fn get_available_dates(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<AvailableDatesQuery>,
) -> Result<Json<Value>, AppError> {
    let today = state.clinic.now_local().date();
    let from = query.from.unwrap_or(today).max(today);
    let days = query.days
        .unwrap_or(state.clinic.available_dates_window_days)
        .clamp(1, 180);

    let slot_service = SlotService::new(&state);
    let dates = slot_service.available_dates(professional_id, from, days, None).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "from": from,
        "days": days,
        "dates": dates
    })))
}

// ==============================================================================
// STAFF: AGENDA DETAIL, SCHEDULES AND BLOCKED TIMES
// ==============================================================================

/// Staff slot listing, including who booked each slot.
pub async fn get_day_agenda_slots(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<DaySlotsResponse>, AppError> {
    let schedule_service = ScheduleService::new(&state);
    let schedules = schedule_service.get_schedules(professional_id, Some(auth.token())).await
        .map_err(map_error)?;

    let slot_service = SlotService::new(&state);
    let slots = slot_service.get_day_slots(professional_id, query.date, Some(auth.token())).await
        .map_err(map_error)?;

    Ok(Json(DaySlotsResponse {
        professional_id,
        date: query.date,
        offered: is_offered_on(&schedules, query.date),
        slots,
    }))
}

pub async fn create_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("User {} creating schedule for professional {}", user.id, professional_id);

    let schedule_service = ScheduleService::new(&state);
    let schedule = schedule_service.create_schedule(professional_id, request, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule
    })))
}

pub async fn update_schedule(
    State(state): State<Arc<AppConfig>>,
    Path((professional_id, schedule_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(&state);
    let schedule = schedule_service
        .update_schedule(professional_id, schedule_id, request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule
    })))
}

pub async fn delete_schedule(
    State(state): State<Arc<AppConfig>>,
    Path((professional_id, schedule_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(&state);
    schedule_service.delete_schedule(professional_id, schedule_id, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true })))
}

pub async fn list_blocked_times(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    Query(range): Query<DateRangeQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    if range.from > range.to {
        return Err(AppError::ValidationError("'from' must not be after 'to'".to_string()));
    }

    let schedule_service = ScheduleService::new(&state);
    let blocked = schedule_service
        .get_blocked_times(professional_id, range.from, range.to, Some(auth.token()))
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "blocked_times": blocked })))
}

pub async fn create_blocked_time(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBlockedTimeRequest>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("User {} blocking {} for professional {}", user.id, request.blocked_date, professional_id);

    let schedule_service = ScheduleService::new(&state);
    let blocked = schedule_service.create_blocked_time(professional_id, request, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "blocked_time": blocked
    })))
}

pub async fn delete_blocked_time(
    State(state): State<Arc<AppConfig>>,
    Path((professional_id, blocked_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(&state);
    schedule_service.delete_blocked_time(professional_id, blocked_id, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true })))
}
