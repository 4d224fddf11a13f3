use crate::{
    error::{AppError, Result},
    models::user::*,
    services::Database,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

#[derive(Clone)]
pub struct UserService {
    db: Arc<Database>,
}

impl UserService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<UserProfile> {
        self.db
            .get_by_id("user_profile", user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<UserProfile> {
        self.db
            .find_one("user_profile", "username", username)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile> {
        request.validate().map_err(AppError::ValidatorError)?;

        // 确认用户存在
        self.get_profile(user_id).await?;

        let mut updates = json!({ "updated_at": Utc::now() });
        if let Some(display_name) = request.display_name {
            updates["display_name"] = json!(display_name);
        }
        if let Some(bio) = request.bio {
            updates["bio"] = json!(bio);
        }
        if let Some(avatar_url) = request.avatar_url {
            updates["avatar_url"] = json!(avatar_url);
        }

        self.db
            .update_by_id_with_json("user_profile", user_id, updates)
            .await?
            .ok_or_else(|| AppError::internal("Failed to update profile"))
    }

    /// 更新通知渠道偏好，扇出引擎按这两个开关决定投递方式
    pub async fn update_notification_preferences(
        &self,
        user_id: &str,
        request: UpdateNotificationPreferencesRequest,
    ) -> Result<UserProfile> {
        let profile = self.get_profile(user_id).await?;

        let updates = json!({
            "email_notification": request.email_notification.unwrap_or(profile.email_notification),
            "in_app_notification": request.in_app_notification.unwrap_or(profile.in_app_notification),
            "updated_at": Utc::now(),
        });

        debug!("Updating notification preferences for user {}", user_id);

        self.db
            .update_by_id_with_json("user_profile", user_id, updates)
            .await?
            .ok_or_else(|| AppError::internal("Failed to update preferences"))
    }
}
