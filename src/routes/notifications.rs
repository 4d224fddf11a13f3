use crate::{
    error::{AppError, Result},
    models::notification::NotificationType,
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{
        ws::{Message, WebSocketUpgrade},
        Path, Query, State,
    },
    response::{Json, Response},
    routing::{get, put},
    Router,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(unread_notifications))
        .route("/:id/read", put(mark_read))
        .route("/stream", get(notification_stream))
}

#[derive(Debug, Deserialize)]
struct UnreadQuery {
    #[serde(rename = "type")]
    notification_type: Option<NotificationType>,
}

async fn unread_notifications(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<UnreadQuery>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let notifications = state
        .notification_service
        .unread_notifications(&user.id, query.notification_type)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": notifications
    })))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    state
        .notification_service
        .mark_read(&user.id, &notification_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Notification marked as read"
    })))
}

/// 实时通知流：把用户频道上的推送转发到 WebSocket
async fn notification_stream(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let mut rx = state.realtime_service.subscribe(&user.id);
    debug!("User {} subscribed to notification stream", user.id);

    Ok(ws.on_upgrade(move |socket| async move {
        let (mut sender, mut receiver) = socket.split();

        loop {
            tokio::select! {
                push = rx.recv() => match push {
                    Ok(message) => {
                        let text = match serde_json::to_string(&message) {
                            Ok(text) => text,
                            Err(_) => continue,
                        };
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Notification stream lagged, skipped {} messages", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                },
            }
        }
    }))
}
