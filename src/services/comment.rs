use crate::{
    error::{AppError, Result},
    models::{article::Article, comment::*, notification::NotificationEvent, user::UserProfile},
    services::{Database, NotificationService},
};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

/// 评论正文的长度上限来自配置，按字符计
pub fn ensure_body_within_limit(body: &str, max: usize) -> Result<()> {
    if body.chars().count() > max {
        return Err(AppError::Validation(format!(
            "Comment body exceeds the {} character limit",
            max
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CommentService {
    db: Arc<Database>,
    notification_service: NotificationService,
}

impl CommentService {
    pub async fn new(db: Arc<Database>, notification_service: NotificationService) -> Result<Self> {
        Ok(Self {
            db,
            notification_service,
        })
    }

    pub async fn create_comment(
        &self,
        user_id: &str,
        request: CreateCommentRequest,
    ) -> Result<Comment> {
        debug!("Creating comment for article: {}", request.article_id);

        request.validate().map_err(AppError::ValidatorError)?;
        ensure_body_within_limit(&request.body, self.db.config.max_comment_length)?;

        let article: Article = self
            .db
            .get_by_id("article", &request.article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Article"))?;

        let author: UserProfile = self
            .db
            .get_by_id("user_profile", user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        // 高亮评论必须同时给出片段和起始位置
        if request.highlighted.is_some() != request.index.is_some() {
            return Err(AppError::bad_request(
                "Highlighted comments need both the snippet and its index",
            ));
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            article_id: request.article_id.clone(),
            author_id: user_id.to_string(),
            body: request.body,
            highlighted: request.highlighted,
            index: request.index,
            like_count: 0,
            created_at: now,
            updated_at: now,
        };

        let created: Comment = self.db.create("comment", comment).await?;

        self.update_article_comment_count(&request.article_id).await?;

        // 主响应先返回，收藏者的通知在独立任务里扇出
        let notifier = self.notification_service.clone();
        let event = NotificationEvent::comment_created(
            &author.id,
            &author.username,
            &article.id,
            &article.title,
            &format!("{}/articles/{}", self.db.config.frontend_url, article.slug),
        );
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_bookmarkers(event).await {
                warn!("Comment fan-out failed: {}", e);
            }
        });

        Ok(created)
    }

    pub async fn get_article_comments(
        &self,
        article_id: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<CommentWithAuthor>> {
        debug!("Getting comments for article: {}", article_id);

        let query = r#"
            SELECT * FROM comment
            WHERE article_id = $article_id
            ORDER BY created_at DESC
        "#;

        let mut response = self
            .db
            .query_with_params(query, json!({ "article_id": article_id }))
            .await?;
        let comments: Vec<Comment> = response.take(0)?;

        let authors = self.get_authors_info(&comments).await?;
        let user_likes = match user_id {
            Some(uid) => self.get_user_comment_likes(uid, &comments).await?,
            None => HashMap::new(),
        };

        Ok(comments
            .into_iter()
            .map(|comment| {
                let author = authors.get(&comment.author_id).cloned().unwrap_or_default();
                let user_has_liked = user_likes.get(&comment.id).copied().unwrap_or(false);
                CommentWithAuthor {
                    author_username: author.0,
                    author_display_name: author.1,
                    user_has_liked,
                    comment,
                }
            })
            .collect())
    }

    pub async fn delete_comment(&self, comment_id: &str, user_id: &str) -> Result<()> {
        let comment: Comment = self
            .db
            .get_by_id("comment", comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if comment.author_id != user_id {
            return Err(AppError::forbidden("You can only delete your own comments"));
        }

        self.db.delete_by_id("comment", comment_id).await?;
        self.update_article_comment_count(&comment.article_id).await?;

        Ok(())
    }

    /// 点赞开关：已点赞则取消，否则点赞
    pub async fn toggle_like(&self, comment_id: &str, user_id: &str) -> Result<bool> {
        let _: Comment = self
            .db
            .get_by_id("comment", comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        let query = r#"
            SELECT * FROM comment_like
            WHERE user_id = $user_id
            AND comment_id = $comment_id
        "#;

        let mut response = self
            .db
            .query_with_params(
                query,
                json!({ "user_id": user_id, "comment_id": comment_id }),
            )
            .await?;
        let existing: Vec<CommentLike> = response.take(0)?;

        let liked = if existing.is_empty() {
            let like = CommentLike {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                comment_id: comment_id.to_string(),
                created_at: Utc::now(),
            };
            self.db.create("comment_like", like).await?;
            true
        } else {
            self.db
                .query_with_params(
                    "DELETE comment_like WHERE user_id = $user_id AND comment_id = $comment_id",
                    json!({ "user_id": user_id, "comment_id": comment_id }),
                )
                .await?;
            false
        };

        self.update_comment_like_count(comment_id).await?;
        Ok(liked)
    }

    // Helper methods

    async fn get_authors_info(
        &self,
        comments: &[Comment],
    ) -> Result<HashMap<String, (String, String)>> {
        let mut authors = HashMap::new();

        for comment in comments {
            if authors.contains_key(&comment.author_id) {
                continue;
            }
            if let Some(profile) = self
                .db
                .get_by_id::<UserProfile>("user_profile", &comment.author_id)
                .await?
            {
                authors.insert(
                    comment.author_id.clone(),
                    (profile.username, profile.display_name),
                );
            }
        }

        Ok(authors)
    }

    async fn get_user_comment_likes(
        &self,
        user_id: &str,
        comments: &[Comment],
    ) -> Result<HashMap<String, bool>> {
        let mut likes = HashMap::new();
        let comment_ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();

        if !comment_ids.is_empty() {
            let query = r#"
                SELECT comment_id
                FROM comment_like
                WHERE user_id = $user_id
                AND comment_id IN $comment_ids
            "#;

            let mut response = self
                .db
                .query_with_params(
                    query,
                    json!({ "user_id": user_id, "comment_ids": comment_ids }),
                )
                .await?;
            let results: Vec<Value> = response.take(0)?;

            for result in results {
                if let Some(comment_id) = result["comment_id"].as_str() {
                    likes.insert(comment_id.to_string(), true);
                }
            }
        }

        Ok(likes)
    }

    async fn update_article_comment_count(&self, article_id: &str) -> Result<()> {
        let query = r#"
            LET $count = (SELECT count() FROM comment WHERE article_id = $article_id);
            UPDATE article SET comment_count = $count WHERE id = $article_id;
        "#;

        self.db
            .query_with_params(query, json!({ "article_id": article_id }))
            .await?;

        Ok(())
    }

    async fn update_comment_like_count(&self, comment_id: &str) -> Result<()> {
        let query = r#"
            LET $count = (SELECT count() FROM comment_like WHERE comment_id = $comment_id);
            UPDATE comment SET like_count = $count WHERE id = $comment_id;
        "#;

        self.db
            .query_with_params(query, json!({ "comment_id": comment_id }))
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_within_the_configured_limit_passes() {
        assert!(ensure_body_within_limit("short enough", 5000).is_ok());
    }

    #[test]
    fn body_at_the_configured_limit_passes() {
        let body = "x".repeat(20);
        assert!(ensure_body_within_limit(&body, 20).is_ok());
    }

    #[test]
    fn body_over_the_configured_limit_is_rejected() {
        let body = "x".repeat(21);
        let err = ensure_body_within_limit(&body, 20).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
