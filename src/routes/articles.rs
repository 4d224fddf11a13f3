use crate::{
    error::{AppError, Result},
    models::article::CreateArticleRequest,
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_article))
        .route("/", get(list_articles))
        .route("/:slug", get(get_article))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<i32>,
    limit: Option<i32>,
}

async fn create_article(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CreateArticleRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let article = state
        .article_service
        .create_article(&user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": article
    })))
}

async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>> {
    let articles = state
        .article_service
        .list_articles(query.page, query.limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": articles
    })))
}

async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Value>> {
    let article = state.article_service.get_by_slug(&slug).await?;

    Ok(Json(json!({
        "success": true,
        "data": article
    })))
}
