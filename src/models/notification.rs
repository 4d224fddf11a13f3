use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::user::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Comment,
    ArticlePublished,
    Follow,
}

/// 共享的通知内容，创建后除关联的已读状态外不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub message: String,
    /// 通知主体的引用（文章或用户）
    pub meta_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// 每个接收者一行的投递/已读状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserNotification {
    pub id: String,
    pub user_id: String,
    pub notification_id: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// 未读列表里返回的联结视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserNotificationView {
    pub id: String,
    pub user_id: String,
    pub notification_id: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub notification: Option<Notification>,
}

/// 触发一次扇出的事件
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub notification_type: NotificationType,
    pub actor_id: String,
    pub actor_username: String,
    pub meta_id: String,
    pub title: String,
    pub message: String,
    pub url: String,
}

impl NotificationEvent {
    pub fn comment_created(
        actor_id: &str,
        actor_username: &str,
        article_id: &str,
        article_title: &str,
        article_url: &str,
    ) -> Self {
        Self {
            notification_type: NotificationType::Comment,
            actor_id: actor_id.to_string(),
            actor_username: actor_username.to_string(),
            meta_id: article_id.to_string(),
            title: "New comment".to_string(),
            message: format!("{} commented on \"{}\"", actor_username, article_title),
            url: article_url.to_string(),
        }
    }

    pub fn article_published(
        actor_id: &str,
        actor_username: &str,
        article_id: &str,
        article_title: &str,
        article_url: &str,
    ) -> Self {
        Self {
            notification_type: NotificationType::ArticlePublished,
            actor_id: actor_id.to_string(),
            actor_username: actor_username.to_string(),
            meta_id: article_id.to_string(),
            title: "New article".to_string(),
            message: format!("{} published \"{}\"", actor_username, article_title),
            url: article_url.to_string(),
        }
    }

    pub fn follower_gained(actor_id: &str, actor_username: &str, profile_url: &str) -> Self {
        Self {
            notification_type: NotificationType::Follow,
            actor_id: actor_id.to_string(),
            actor_username: actor_username.to_string(),
            meta_id: actor_id.to_string(),
            title: "New follower".to_string(),
            message: format!("{} started following you", actor_username),
            url: profile_url.to_string(),
        }
    }
}

/// 扇出引擎眼中的接收者：身份 + 渠道偏好
#[derive(Debug, Clone)]
pub struct Recipient {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub email_notification: bool,
    pub in_app_notification: bool,
}

impl From<&UserProfile> for Recipient {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.id.clone(),
            username: profile.username.clone(),
            email: profile.email.clone(),
            email_notification: profile.email_notification,
            in_app_notification: profile.in_app_notification,
        }
    }
}
