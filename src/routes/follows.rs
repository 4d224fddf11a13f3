use crate::{
    error::{AppError, Result},
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:username", post(follow_user))
        .route("/:username", delete(unfollow_user))
        .route("/followers", get(get_followers))
        .route("/following", get(get_following))
}

async fn follow_user(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(username): Path<String>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let target = state.user_service.get_by_username(&username).await?;
    state.follow_service.follow_user(&user.id, &target.id).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Now following {}", username)
    })))
}

async fn unfollow_user(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(username): Path<String>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let target = state.user_service.get_by_username(&username).await?;
    state
        .follow_service
        .unfollow_user(&user.id, &target.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Unfollowed {}", username)
    })))
}

async fn get_followers(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let followers = state.follow_service.get_followers(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": followers
    })))
}

async fn get_following(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let following = state.follow_service.get_following(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": following
    })))
}
