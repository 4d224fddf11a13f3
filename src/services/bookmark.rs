use crate::{
    error::{AppError, Result},
    models::{article::Article, bookmark::*},
    services::Database,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct BookmarkService {
    db: Arc<Database>,
}

impl BookmarkService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    pub async fn bookmark_article(&self, user_id: &str, article_id: &str) -> Result<Bookmark> {
        debug!("User {} bookmarking article {}", user_id, article_id);

        let _: Article = self
            .db
            .get_by_id("article", article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Article"))?;

        let mut response = self
            .db
            .query_with_params(
                r#"
                    SELECT * FROM bookmark
                    WHERE user_id = $user_id
                    AND article_id = $article_id
                "#,
                json!({ "user_id": user_id, "article_id": article_id }),
            )
            .await?;
        let existing: Vec<Bookmark> = response.take(0)?;

        if !existing.is_empty() {
            return Err(AppError::conflict("Article already bookmarked"));
        }

        let bookmark = Bookmark {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            article_id: article_id.to_string(),
            created_at: Utc::now(),
        };

        self.db.create("bookmark", bookmark).await
    }

    pub async fn remove_bookmark(&self, user_id: &str, article_id: &str) -> Result<()> {
        self.db
            .query_with_params(
                "DELETE bookmark WHERE user_id = $user_id AND article_id = $article_id",
                json!({ "user_id": user_id, "article_id": article_id }),
            )
            .await?;
        Ok(())
    }

    pub async fn get_user_bookmarks(&self, user_id: &str) -> Result<Vec<BookmarkWithArticle>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM bookmark WHERE user_id = $user_id ORDER BY created_at DESC",
                json!({ "user_id": user_id }),
            )
            .await?;
        let bookmarks: Vec<Bookmark> = response.take(0)?;

        let mut result = Vec::new();
        for bookmark in bookmarks {
            if let Some(article) = self
                .db
                .get_by_id::<Article>("article", &bookmark.article_id)
                .await?
            {
                result.push(BookmarkWithArticle {
                    bookmark,
                    article_title: article.title,
                    article_slug: article.slug,
                });
            }
        }

        Ok(result)
    }
}
