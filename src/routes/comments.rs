use crate::{
    error::{AppError, Result},
    models::comment::*,
    services::comment::ensure_body_within_limit,
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/article/:article_id", get(get_article_comments))
        .route("/article/:article_id/:comment_id/history", get(get_comment_history))
        .route("/", post(create_comment))
        .route("/:id", put(update_comment))
        .route("/:id", delete(delete_comment))
        .route("/:id/like", post(toggle_like))
}

async fn get_article_comments(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<String>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    let user_id = user.as_ref().map(|u| u.id.as_str());
    let comments = state
        .comment_service
        .get_article_comments(&article_id, user_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": comments
    })))
}

/// 评论的完整编辑历史：最早的文本 + 按时间倒序的后续版本
async fn get_comment_history(
    State(state): State<Arc<AppState>>,
    Path((article_id, comment_id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let history = state
        .history_service
        .get_history(&article_id, &comment_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": history
    })))
}

async fn create_comment(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let comment = state
        .comment_service
        .create_comment(&user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": comment
    })))
}

/// 编辑评论：先归档当前文本再更新
async fn update_comment(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(comment_id): Path<String>,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    request.validate().map_err(AppError::ValidatorError)?;
    ensure_body_within_limit(&request.body, state.config.max_comment_length)?;

    let comment = state
        .history_service
        .record_and_update(&comment_id, &user.id, &request.body)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": comment
    })))
}

async fn delete_comment(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(comment_id): Path<String>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    state
        .comment_service
        .delete_comment(&comment_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Comment deleted successfully"
    })))
}

async fn toggle_like(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(comment_id): Path<String>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let liked = state
        .comment_service
        .toggle_like(&comment_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": { "liked": liked }
    })))
}
