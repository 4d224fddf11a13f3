use crate::{
    error::{AppError, Result},
    models::comment::{Comment, CommentEditHistory, CommentHistory, HistoryEntry},
    services::Database,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 编辑历史记录器对持久层的要求。
/// `archive_and_update` 必须原子地完成归档和正文更新。
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn comment_by_id(&self, comment_id: &str) -> Result<Option<Comment>>;
    async fn comment_in_article(&self, article_id: &str, comment_id: &str)
        -> Result<Option<Comment>>;
    async fn archive_and_update(&self, comment: &Comment, new_body: &str) -> Result<Comment>;
    /// 归档行，按创建时间倒序（最近的编辑在前）
    async fn history_for(&self, comment_id: &str) -> Result<Vec<CommentEditHistory>>;
}

/// 编辑历史记录器。
///
/// 保证评论的每一次文本更新都不丢历史：更新前先把当前文本归档，
/// 归档与更新在同一个存储事务里提交。同一条评论的并发编辑是
/// last-write-wins，但两条归档行都会保留。
#[derive(Clone)]
pub struct EditHistoryService {
    store: Arc<dyn CommentStore>,
}

impl EditHistoryService {
    pub fn new(store: Arc<dyn CommentStore>) -> Self {
        Self { store }
    }

    /// 归档当前文本，然后应用新文本，返回更新后的评论
    pub async fn record_and_update(
        &self,
        comment_id: &str,
        author_id: &str,
        new_body: &str,
    ) -> Result<Comment> {
        let comment = self
            .store
            .comment_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if comment.author_id != author_id {
            return Err(AppError::forbidden("You can only edit your own comments"));
        }

        debug!("Archiving previous text of comment {}", comment_id);
        self.store.archive_and_update(&comment, new_body).await
    }

    /// 返回 `{original, history}`：
    /// original 是最早的文本；history 是按时间倒序排列的所有后续版本，
    /// 有过编辑时当前文本作为最新一项排在最前。
    pub async fn get_history(&self, article_id: &str, comment_id: &str) -> Result<CommentHistory> {
        let comment = self
            .store
            .comment_in_article(article_id, comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        // 倒序：rows[0] 是最近归档的文本，rows 最后一项是最初的文本
        let rows = self.store.history_for(comment_id).await?;

        if rows.is_empty() {
            return Ok(CommentHistory {
                original: HistoryEntry {
                    body: comment.body,
                    created_at: comment.created_at,
                },
                history: Vec::new(),
            });
        }

        let oldest = rows.last().cloned().unwrap();
        let original = HistoryEntry {
            body: oldest.previous_body,
            created_at: comment.created_at,
        };

        let mut history = Vec::with_capacity(rows.len());
        history.push(HistoryEntry {
            body: comment.body,
            created_at: comment.updated_at,
        });
        for row in &rows[..rows.len() - 1] {
            history.push(HistoryEntry {
                body: row.previous_body.clone(),
                created_at: row.created_at,
            });
        }

        Ok(CommentHistory { original, history })
    }
}

/// SurrealDB 支持的评论持久层
pub struct SurrealCommentStore {
    db: Arc<Database>,
}

impl SurrealCommentStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CommentStore for SurrealCommentStore {
    async fn comment_by_id(&self, comment_id: &str) -> Result<Option<Comment>> {
        self.db.get_by_id("comment", comment_id).await
    }

    async fn comment_in_article(
        &self,
        article_id: &str,
        comment_id: &str,
    ) -> Result<Option<Comment>> {
        let comment: Option<Comment> = self.db.get_by_id("comment", comment_id).await?;
        // 跨文章的历史查询必须拿不到结果
        Ok(comment.filter(|c| c.article_id == article_id))
    }

    async fn archive_and_update(&self, comment: &Comment, new_body: &str) -> Result<Comment> {
        let entry = CommentEditHistory {
            id: Uuid::new_v4().to_string(),
            comment_id: comment.id.clone(),
            previous_body: comment.body.clone(),
            created_at: Utc::now(),
        };

        // 归档和更新在同一个事务里，任何一步失败都整体回滚
        let query = format!(
            r#"
            BEGIN TRANSACTION;
            CREATE comment_edit_history CONTENT $entry;
            UPDATE comment:`{}` MERGE {{ body: $body, updated_at: $updated_at }} RETURN AFTER;
            COMMIT TRANSACTION;
            "#,
            comment.id
        );

        let mut response = self
            .db
            .query_with_params(
                &query,
                json!({
                    "entry": entry,
                    "body": new_body,
                    "updated_at": Utc::now(),
                }),
            )
            .await?;

        let updated: Vec<Comment> = response.take(1)?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| AppError::internal("Failed to update comment"))
    }

    async fn history_for(&self, comment_id: &str) -> Result<Vec<CommentEditHistory>> {
        let query = r#"
            SELECT * FROM comment_edit_history
            WHERE comment_id = $comment_id
            ORDER BY created_at DESC
        "#;

        let mut response = self
            .db
            .query_with_params(query, json!({ "comment_id": comment_id }))
            .await?;
        let rows: Vec<CommentEditHistory> = response.take(0)?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 内存版评论存储，归档+更新在一个临界区里完成
    #[derive(Default)]
    struct MemoryCommentStore {
        comments: Mutex<HashMap<String, Comment>>,
        archive: Mutex<Vec<CommentEditHistory>>,
    }

    impl MemoryCommentStore {
        fn with_comment(comment: Comment) -> Self {
            let store = Self::default();
            store
                .comments
                .lock()
                .unwrap()
                .insert(comment.id.clone(), comment);
            store
        }
    }

    #[async_trait]
    impl CommentStore for MemoryCommentStore {
        async fn comment_by_id(&self, comment_id: &str) -> Result<Option<Comment>> {
            Ok(self.comments.lock().unwrap().get(comment_id).cloned())
        }

        async fn comment_in_article(
            &self,
            article_id: &str,
            comment_id: &str,
        ) -> Result<Option<Comment>> {
            Ok(self
                .comments
                .lock()
                .unwrap()
                .get(comment_id)
                .filter(|c| c.article_id == article_id)
                .cloned())
        }

        async fn archive_and_update(&self, comment: &Comment, new_body: &str) -> Result<Comment> {
            let mut comments = self.comments.lock().unwrap();
            let mut archive = self.archive.lock().unwrap();

            let stored = comments
                .get_mut(&comment.id)
                .ok_or_else(|| AppError::not_found("Comment"))?;

            archive.push(CommentEditHistory {
                id: Uuid::new_v4().to_string(),
                comment_id: stored.id.clone(),
                previous_body: stored.body.clone(),
                created_at: stored.updated_at + Duration::seconds(1),
            });

            stored.body = new_body.to_string();
            stored.updated_at = stored.updated_at + Duration::seconds(2);
            Ok(stored.clone())
        }

        async fn history_for(&self, comment_id: &str) -> Result<Vec<CommentEditHistory>> {
            let mut rows: Vec<CommentEditHistory> = self
                .archive
                .lock()
                .unwrap()
                .iter()
                .filter(|row| row.comment_id == comment_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows)
        }
    }

    fn comment(id: &str, article_id: &str, body: &str) -> Comment {
        Comment {
            id: id.to_string(),
            article_id: article_id.to_string(),
            author_id: "author".to_string(),
            body: body.to_string(),
            highlighted: None,
            index: None,
            like_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn history_of_unedited_comment_is_empty() {
        let store = Arc::new(MemoryCommentStore::with_comment(comment("c1", "a1", "v1")));
        let recorder = EditHistoryService::new(store);

        let result = recorder.get_history("a1", "c1").await.unwrap();

        assert_eq!(result.original.body, "v1");
        assert!(result.history.is_empty());
    }

    #[tokio::test]
    async fn history_after_two_edits_is_in_descending_recency_order() {
        let store = Arc::new(MemoryCommentStore::with_comment(comment("c1", "a1", "v1")));
        let recorder = EditHistoryService::new(store);

        recorder.record_and_update("c1", "author", "v2").await.unwrap();
        recorder.record_and_update("c1", "author", "v3").await.unwrap();

        let result = recorder.get_history("a1", "c1").await.unwrap();

        assert_eq!(result.original.body, "v1");
        let bodies: Vec<&str> = result.history.iter().map(|e| e.body.as_str()).collect();
        assert_eq!(bodies, vec!["v3", "v2"]);
    }

    #[tokio::test]
    async fn single_edit_puts_current_text_first() {
        let store = Arc::new(MemoryCommentStore::with_comment(comment("c1", "a1", "v1")));
        let recorder = EditHistoryService::new(store);

        let updated = recorder.record_and_update("c1", "author", "v2").await.unwrap();
        assert_eq!(updated.body, "v2");

        let result = recorder.get_history("a1", "c1").await.unwrap();
        assert_eq!(result.original.body, "v1");
        assert_eq!(result.history.len(), 1);
        assert_eq!(result.history[0].body, "v2");
    }

    #[tokio::test]
    async fn missing_comment_is_not_found_and_archives_nothing() {
        let store = Arc::new(MemoryCommentStore::default());
        let recorder = EditHistoryService::new(store.clone());

        let err = recorder
            .record_and_update("ghost", "author", "v2")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.archive.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_the_author_may_edit() {
        let store = Arc::new(MemoryCommentStore::with_comment(comment("c1", "a1", "v1")));
        let recorder = EditHistoryService::new(store.clone());

        let err = recorder
            .record_and_update("c1", "someone-else", "v2")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Authorization(_)));
        assert!(store.archive.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_does_not_leak_across_articles() {
        let store = Arc::new(MemoryCommentStore::with_comment(comment("c1", "a1", "v1")));
        let recorder = EditHistoryService::new(store);

        let err = recorder.get_history("a2", "c1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn every_edit_appends_exactly_one_archive_row() {
        let store = Arc::new(MemoryCommentStore::with_comment(comment("c1", "a1", "v1")));
        let recorder = EditHistoryService::new(store.clone());

        for n in 2..=5 {
            recorder
                .record_and_update("c1", "author", &format!("v{}", n))
                .await
                .unwrap();
        }

        assert_eq!(store.archive.lock().unwrap().len(), 4);
        let result = recorder.get_history("a1", "c1").await.unwrap();
        assert_eq!(result.history.len(), 4);
        assert_eq!(result.history[0].body, "v5");
        assert_eq!(result.original.body, "v1");
    }
}
