use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::jwt::validate_token;

fn bearer_token(request: &Request<Body>) -> Result<Option<&str>, AppError> {
    let Some(auth_header) = request.headers().get("Authorization") else {
        return Ok(None);
    };

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

/// Reject the request unless it carries a valid bearer token; the verified
/// `User` is placed in the request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)?
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Same as `auth_middleware`, but additionally requires a back-office role.
pub async fn staff_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)?
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    if !user.is_staff() {
        return Err(AppError::Forbidden("Staff access required".to_string()));
    }

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
