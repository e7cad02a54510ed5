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
    FinancialReport, GoalListQuery, GoalProgress, PeriodQuery, ReportQuery, ReportingError,
    UpsertGoalRequest,
};
use crate::services::{GoalService, NotificationService, ReportService};

fn map_error(error: anyhow::Error) -> AppError {
    if let Some(err) = error.downcast_ref::<ReportingError>() {
        return match err {
            ReportingError::GoalNotFound => AppError::NotFound(err.to_string()),
            ReportingError::InvalidPeriod(_) | ReportingError::ValidationError(_) => {
                AppError::ValidationError(err.to_string())
            }
        };
    }

    if let Some(err) = SupabaseError::from_anyhow(&error) {
        if err.is_auth() {
            return AppError::Forbidden(err.message.clone());
        }
    }

    AppError::Database(error.to_string())
}

pub async fn get_financial_report(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ReportQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<FinancialReport>, AppError> {
    let report_service = ReportService::new(&state);
    let report = report_service.financial_report(query.from, query.to, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(report))
}

pub async fn list_goals(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<GoalListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let goal_service = GoalService::new(&state);
    let goals = goal_service.list_goals(query.month, query.year, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({ "goals": goals })))
}

pub async fn upsert_goal(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpsertGoalRequest>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("User {} setting goal for professional {}", user.id, request.professional_id);

    let goal_service = GoalService::new(&state);
    let goal = goal_service.upsert_goal(request, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "goal": goal
    })))
}

pub async fn get_goal_progress(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<GoalProgress>, AppError> {
    let goal_service = GoalService::new(&state);
    let progress = goal_service
        .goal_progress(professional_id, query.month, query.year, Some(auth.token()))
        .await
        .map_err(map_error)?;

    Ok(Json(progress))
}

pub async fn list_notifications(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let notification_service = NotificationService::new(&state);
    let notifications = notification_service.list_unread(auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({ "notifications": notifications })))
}

pub async fn mark_notification_read(
    State(state): State<Arc<AppConfig>>,
    Path(notification_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let notification_service = NotificationService::new(&state);
    notification_service.mark_read(notification_id, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true })))
}
