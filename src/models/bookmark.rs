use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub user_id: String,
    pub article_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBookmarkRequest {
    #[validate(length(min = 1))]
    pub article_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkWithArticle {
    #[serde(flatten)]
    pub bookmark: Bookmark,
    pub article_title: String,
    pub article_slug: String,
}
