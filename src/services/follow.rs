use crate::{
    error::{AppError, Result},
    models::{
        follow::*,
        notification::{NotificationEvent, Recipient},
        user::UserProfile,
    },
    services::{Database, NotificationService},
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct FollowService {
    db: Arc<Database>,
    notification_service: NotificationService,
}

impl FollowService {
    pub async fn new(db: Arc<Database>, notification_service: NotificationService) -> Result<Self> {
        Ok(Self {
            db,
            notification_service,
        })
    }

    pub async fn follow_user(&self, follower_id: &str, following_id: &str) -> Result<()> {
        debug!("User {} following user {}", follower_id, following_id);

        // 防止自己关注自己
        if follower_id == following_id {
            return Err(AppError::bad_request("Cannot follow yourself"));
        }

        let following: UserProfile = self
            .db
            .get_by_id("user_profile", following_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        let follower: UserProfile = self
            .db
            .get_by_id("user_profile", follower_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        // 检查是否已经关注
        let mut response = self
            .db
            .query_with_params(
                r#"
                    SELECT * FROM follow
                    WHERE follower_id = $follower_id
                    AND following_id = $following_id
                "#,
                json!({
                    "follower_id": follower_id,
                    "following_id": following_id
                }),
            )
            .await?;
        let existing: Vec<Follow> = response.take(0)?;

        if !existing.is_empty() {
            return Err(AppError::conflict("Already following this user"));
        }

        let follow = Follow {
            id: Uuid::new_v4().to_string(),
            follower_id: follower_id.to_string(),
            following_id: following_id.to_string(),
            created_at: Utc::now(),
        };

        self.db.create("follow", follow).await?;
        self.update_follow_counts(follower_id, following_id).await?;

        // 被关注者的通知走同一套扇出路径，失败不影响关注本身
        let notifier = self.notification_service.clone();
        let event = NotificationEvent::follower_gained(
            &follower.id,
            &follower.username,
            &format!("{}/profiles/{}", self.db.config.frontend_url, follower.username),
        );
        let recipient = Recipient::from(&following);
        tokio::spawn(async move {
            notifier.fan_out(event, vec![recipient]).await;
        });

        info!("User {} followed user {}", follower_id, following_id);
        Ok(())
    }

    pub async fn unfollow_user(&self, follower_id: &str, following_id: &str) -> Result<()> {
        debug!("User {} unfollowing user {}", follower_id, following_id);

        self.db
            .query_with_params(
                r#"
                    DELETE follow
                    WHERE follower_id = $follower_id
                    AND following_id = $following_id
                "#,
                json!({
                    "follower_id": follower_id,
                    "following_id": following_id
                }),
            )
            .await?;

        self.update_follow_counts(follower_id, following_id).await?;

        Ok(())
    }

    pub async fn get_followers(&self, user_id: &str) -> Result<Vec<FollowUserInfo>> {
        debug!("Getting followers for user: {}", user_id);

        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM follow WHERE following_id = $user_id ORDER BY created_at DESC",
                json!({ "user_id": user_id }),
            )
            .await?;
        let follows: Vec<Follow> = response.take(0)?;

        self.profiles_for(follows.into_iter().map(|f| f.follower_id).collect())
            .await
    }

    pub async fn get_following(&self, user_id: &str) -> Result<Vec<FollowUserInfo>> {
        debug!("Getting following for user: {}", user_id);

        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM follow WHERE follower_id = $user_id ORDER BY created_at DESC",
                json!({ "user_id": user_id }),
            )
            .await?;
        let follows: Vec<Follow> = response.take(0)?;

        self.profiles_for(follows.into_iter().map(|f| f.following_id).collect())
            .await
    }

    async fn profiles_for(&self, user_ids: Vec<String>) -> Result<Vec<FollowUserInfo>> {
        let mut result = Vec::new();
        for user_id in user_ids {
            if let Some(profile) = self
                .db
                .get_by_id::<UserProfile>("user_profile", &user_id)
                .await?
            {
                result.push(FollowUserInfo {
                    user_id: profile.id,
                    username: profile.username,
                    display_name: profile.display_name,
                    avatar_url: profile.avatar_url,
                    bio: profile.bio,
                });
            }
        }
        Ok(result)
    }

    async fn update_follow_counts(&self, follower_id: &str, following_id: &str) -> Result<()> {
        // 更新关注者的 following_count
        let query1 = r#"
            LET $count = (SELECT count() FROM follow WHERE follower_id = $user_id);
            UPDATE user_profile SET following_count = $count WHERE id = $user_id;
        "#;

        self.db
            .query_with_params(query1, json!({ "user_id": follower_id }))
            .await?;

        // 更新被关注者的 follower_count
        let query2 = r#"
            LET $count = (SELECT count() FROM follow WHERE following_id = $user_id);
            UPDATE user_profile SET follower_count = $count WHERE id = $user_id;
        "#;

        self.db
            .query_with_params(query2, json!({ "user_id": following_id }))
            .await?;

        Ok(())
    }
}
