use crate::{
    error::{AppError, Result},
    models::{
        article::*, notification::NotificationEvent, response::PaginatedResult, user::UserProfile,
    },
    services::{Database, NotificationService},
    utils::slug::generate_unique_slug,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct ArticleService {
    db: Arc<Database>,
    notification_service: NotificationService,
}

impl ArticleService {
    pub async fn new(db: Arc<Database>, notification_service: NotificationService) -> Result<Self> {
        Ok(Self {
            db,
            notification_service,
        })
    }

    pub async fn create_article(
        &self,
        author_id: &str,
        request: CreateArticleRequest,
    ) -> Result<Article> {
        debug!("Creating article for author: {}", author_id);

        request.validate().map_err(AppError::ValidatorError)?;

        let author: UserProfile = self
            .db
            .get_by_id("user_profile", author_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4().to_string(),
            author_id: author_id.to_string(),
            title: request.title.clone(),
            slug: generate_unique_slug(&request.title),
            description: request.description,
            body: request.body,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        };

        let created: Article = self.db.create("article", article).await?;
        info!("Article {} published by {}", created.slug, author.username);

        // 主响应先返回，扇出在独立任务里执行，失败只记日志
        let notifier = self.notification_service.clone();
        let event = NotificationEvent::article_published(
            &author.id,
            &author.username,
            &created.id,
            &created.title,
            &format!("{}/articles/{}", self.db.config.frontend_url, created.slug),
        );
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_followers(event).await {
                warn!("Article fan-out failed: {}", e);
            }
        });

        Ok(created)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<ArticleWithAuthor> {
        let article: Article = self
            .db
            .find_one("article", "slug", slug)
            .await?
            .ok_or_else(|| AppError::not_found("Article"))?;

        let author: Option<UserProfile> = self
            .db
            .get_by_id("user_profile", &article.author_id)
            .await?;

        Ok(ArticleWithAuthor {
            article,
            author_username: author
                .as_ref()
                .map(|a| a.username.clone())
                .unwrap_or_default(),
            author_display_name: author.map(|a| a.display_name).unwrap_or_default(),
        })
    }

    pub async fn get_by_id(&self, article_id: &str) -> Result<Option<Article>> {
        self.db.get_by_id("article", article_id).await
    }

    pub async fn list_articles(
        &self,
        page: Option<i32>,
        limit: Option<i32>,
    ) -> Result<PaginatedResult<Article>> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(self.db.config.default_articles_per_page as i32)
            .min(100);
        let offset = (page - 1) * limit;

        let query = r#"
            SELECT * FROM article
            ORDER BY created_at DESC
            LIMIT $limit
            START $offset;
            SELECT count() AS total FROM article GROUP ALL;
        "#;

        let mut response = self
            .db
            .query_with_params(query, json!({ "limit": limit, "offset": offset }))
            .await?;
        let articles: Vec<Article> = response.take(0)?;

        #[derive(serde::Deserialize)]
        struct CountRow {
            total: usize,
        }
        let counts: Vec<CountRow> = response.take(1)?;
        let total = counts.first().map(|c| c.total).unwrap_or(0);

        Ok(PaginatedResult {
            data: articles,
            total,
            page: page as usize,
            per_page: limit as usize,
        })
    }

}
