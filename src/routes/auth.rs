use crate::{
    error::Result,
    models::user::{LoginRequest, SignupRequest},
    state::AppState,
};
use axum::{
    extract::State,
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<Value>> {
    let response = state.auth_service.signup(request).await?;

    Ok(Json(json!({
        "success": true,
        "data": response
    })))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>> {
    let response = state.auth_service.login(request).await?;

    Ok(Json(json!({
        "success": true,
        "data": response
    })))
}
