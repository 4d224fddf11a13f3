use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use tokio::sync::broadcast;
use tracing::debug;

/// 每个用户通道的推送消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    pub event: String,
    pub payload: Value,
}

/// 实时推送的边界。发布是 fire-and-forget，
/// 没有订阅者时消息直接丢弃。
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn publish(&self, channel_id: &str, event: &str, payload: Value) -> Result<()>;
}

/// 进程内的按用户频道管理器，WebSocket 路由从这里订阅
#[derive(Clone)]
pub struct RealtimeService {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<PushMessage>>>>,
}

impl RealtimeService {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 订阅某个用户的通知频道
    pub fn subscribe(&self, user_id: &str) -> broadcast::Receiver<PushMessage> {
        let mut channels = self.channels.write().unwrap();
        channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .subscribe()
    }

    fn sender_for(&self, user_id: &str) -> broadcast::Sender<PushMessage> {
        let mut channels = self.channels.write().unwrap();
        channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }
}

impl Default for RealtimeService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushChannel for RealtimeService {
    async fn publish(&self, channel_id: &str, event: &str, payload: Value) -> Result<()> {
        let sender = self.sender_for(channel_id);
        let message = PushMessage {
            event: event.to_string(),
            payload,
        };

        if sender.send(message).is_err() {
            debug!("No active subscribers on channel {}", channel_id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn delivers_to_subscriber() {
        let realtime = RealtimeService::new();
        let mut rx = realtime.subscribe("u1");

        realtime
            .publish("u1", "notification", json!({"title": "hi"}))
            .await
            .unwrap();

        let message = rx.recv().await.unwrap();
        assert_eq!(message.event, "notification");
        assert_eq!(message.payload["title"], "hi");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let realtime = RealtimeService::new();
        let result = realtime.publish("ghost", "notification", json!({})).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn channels_are_isolated_per_user() {
        let realtime = RealtimeService::new();
        let mut rx_a = realtime.subscribe("a");
        let _rx_b = realtime.subscribe("b");

        realtime.publish("b", "notification", json!({})).await.unwrap();

        assert!(rx_a.try_recv().is_err());
    }
}
