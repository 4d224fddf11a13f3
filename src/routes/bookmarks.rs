use crate::{
    error::{AppError, Result},
    models::bookmark::CreateBookmarkRequest,
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
use validator::Validate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(bookmark_article))
        .route("/", get(get_bookmarks))
        .route("/:article_id", delete(remove_bookmark))
}

async fn bookmark_article(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CreateBookmarkRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    request.validate().map_err(AppError::ValidatorError)?;

    let bookmark = state
        .bookmark_service
        .bookmark_article(&user.id, &request.article_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": bookmark
    })))
}

async fn get_bookmarks(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let bookmarks = state.bookmark_service.get_user_bookmarks(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": bookmarks
    })))
}

async fn remove_bookmark(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(article_id): Path<String>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    state
        .bookmark_service
        .remove_bookmark(&user.id, &article_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Bookmark removed"
    })))
}
