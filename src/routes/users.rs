use crate::{
    error::{AppError, Result},
    models::user::*,
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me", put(update_me))
        .route("/me/notification-preferences", put(update_preferences))
        .route("/:username", get(get_by_username))
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let profile = state.user_service.get_profile(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": ProfileResponse::from(profile)
    })))
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let profile = state.user_service.update_profile(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": ProfileResponse::from(profile)
    })))
}

async fn update_preferences(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<UpdateNotificationPreferencesRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let profile = state
        .user_service
        .update_notification_preferences(&user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "email_notification": profile.email_notification,
            "in_app_notification": profile.in_app_notification
        }
    })))
}

async fn get_by_username(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<Value>> {
    let profile = state.user_service.get_by_username(&username).await?;

    Ok(Json(json!({
        "success": true,
        "data": ProfileResponse::from(profile)
    })))
}
