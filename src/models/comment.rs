use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub article_id: String,
    pub author_id: String,
    /// 当前文本，历史版本只存在于 comment_edit_history
    pub body: String,
    /// 高亮评论引用的原文片段
    pub highlighted: Option<String>,
    /// 高亮片段在文章正文中的起始位置
    pub index: Option<i64>,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 评论编辑档案，只增不改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentEditHistory {
    pub id: String,
    pub comment_id: String,
    pub previous_body: String,
    pub created_at: DateTime<Utc>,
}

/// 一条历史记录的展示形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// `get_history` 的返回结构：最早的文本 + 按时间倒序的后续版本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentHistory {
    pub original: HistoryEntry,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1))]
    pub article_id: String,

    /// 长度上限由配置的 max_comment_length 控制
    #[validate(length(min = 1))]
    pub body: String,

    #[validate(length(min = 1, max = 5000))]
    pub highlighted: Option<String>,

    #[validate(range(min = 0))]
    pub index: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    /// 长度上限由配置的 max_comment_length 控制
    #[validate(length(min = 1))]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentLike {
    pub id: String,
    pub user_id: String,
    pub comment_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: String,
    pub author_display_name: String,
    pub user_has_liked: bool,
}
