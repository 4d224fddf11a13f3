use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        bookmark::Bookmark,
        follow::Follow,
        notification::*,
        user::UserProfile,
    },
    services::{email::EmailDispatcher, email::EmailTemplates, realtime::PushChannel, Database},
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 扇出引擎对持久层的全部要求：受众解析 + 通知行写入 + 未读查询。
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// 收藏了某篇文章的所有用户
    async fn bookmarkers_of_article(&self, article_id: &str) -> Result<Vec<Recipient>>;
    /// 某个作者的所有关注者
    async fn followers_of_author(&self, author_id: &str) -> Result<Vec<Recipient>>;
    async fn insert_notification(&self, notification: Notification) -> Result<Notification>;
    async fn insert_user_notification(&self, row: UserNotification) -> Result<()>;
    async fn unread_for_user(&self, user_id: &str) -> Result<Vec<UserNotificationView>>;
    /// 返回 false 表示该用户名下没有这条通知
    async fn mark_read(&self, user_id: &str, user_notification_id: &str) -> Result<bool>;
}

/// 通知扇出引擎。
///
/// 对每个接收者独立投递：邮件、实时推送、持久化的应用内通知，
/// 任何一个接收者的失败只记日志，不影响其他接收者，也绝不回传给
/// 触发请求。引擎本身不去重：同一事件扇出两次就产生两份通知，
/// 调用点保证每个事件只触发一次。
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    mailer: Arc<dyn EmailDispatcher>,
    push: Arc<dyn PushChannel>,
    templates: Arc<EmailTemplates>,
    email_enabled: bool,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        mailer: Arc<dyn EmailDispatcher>,
        push: Arc<dyn PushChannel>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            store,
            mailer,
            push,
            templates: Arc::new(EmailTemplates::new()?),
            email_enabled: config.enable_email_notifications,
        })
    }

    /// 新评论：通知文章的收藏者
    pub async fn notify_bookmarkers(&self, event: NotificationEvent) -> Result<()> {
        let recipients = self.store.bookmarkers_of_article(&event.meta_id).await?;
        debug!(
            "Fanning out comment notification for article {} to {} bookmarkers",
            event.meta_id,
            recipients.len()
        );
        self.fan_out(event, recipients).await;
        Ok(())
    }

    /// 新文章：通知作者的关注者
    pub async fn notify_followers(&self, event: NotificationEvent) -> Result<()> {
        let recipients = self.store.followers_of_author(&event.actor_id).await?;
        debug!(
            "Fanning out article notification from {} to {} followers",
            event.actor_username,
            recipients.len()
        );
        self.fan_out(event, recipients).await;
        Ok(())
    }

    /// 对一组已解析的接收者执行扇出。
    ///
    /// 共享的 notification 行最多创建一次，且只在至少一个接收者开启
    /// 应用内通知时创建；user_notification 行按接收者逐条写入。
    pub async fn fan_out(&self, event: NotificationEvent, recipients: Vec<Recipient>) {
        let recipients: Vec<Recipient> = recipients
            .into_iter()
            .filter(|r| r.user_id != event.actor_id)
            .collect();

        if recipients.is_empty() {
            return;
        }

        let mut notification = None;
        if recipients.iter().any(|r| r.in_app_notification) {
            let row = Notification {
                id: Uuid::new_v4().to_string(),
                message: event.message.clone(),
                meta_id: event.meta_id.clone(),
                notification_type: event.notification_type,
                title: event.title.clone(),
                url: event.url.clone(),
                created_at: Utc::now(),
            };

            match self.store.insert_notification(row).await {
                Ok(created) => notification = Some(created),
                Err(e) => warn!("Failed to persist shared notification: {}", e),
            }
        }

        for recipient in recipients {
            self.notify_recipient(&event, notification.as_ref(), recipient)
                .await;
        }

        info!("Fan-out complete for {:?} event", event.notification_type);
    }

    /// 单个接收者的投递，每个渠道都有自己的错误边界
    async fn notify_recipient(
        &self,
        event: &NotificationEvent,
        notification: Option<&Notification>,
        recipient: Recipient,
    ) {
        if recipient.email_notification && self.email_enabled {
            match self.templates.render_notification(event, &recipient) {
                Ok((subject, text, html)) => {
                    if let Err(e) = self
                        .mailer
                        .send(&recipient.email, &subject, &text, &html)
                        .await
                    {
                        warn!("Failed to email {}: {}", recipient.email, e);
                    }
                }
                Err(e) => warn!("Failed to render email for {}: {}", recipient.email, e),
            }
        }

        if recipient.in_app_notification {
            let payload = json!({
                "message": event.message,
                "title": event.title,
                "type": event.notification_type,
                "url": event.url,
            });

            if let Err(e) = self
                .push
                .publish(&recipient.user_id, "notification", payload)
                .await
            {
                warn!("Failed to push to user {}: {}", recipient.user_id, e);
            }

            if let Some(notification) = notification {
                let row = UserNotification {
                    id: Uuid::new_v4().to_string(),
                    user_id: recipient.user_id.clone(),
                    notification_id: notification.id.clone(),
                    is_read: false,
                    created_at: Utc::now(),
                };

                if let Err(e) = self.store.insert_user_notification(row).await {
                    warn!(
                        "Failed to persist notification state for user {}: {}",
                        recipient.user_id, e
                    );
                }
            }
        }
    }

    /// 未读通知，可按类型过滤
    pub async fn unread_notifications(
        &self,
        user_id: &str,
        kind: Option<NotificationType>,
    ) -> Result<Vec<UserNotificationView>> {
        let rows = self.store.unread_for_user(user_id).await?;

        Ok(match kind {
            Some(kind) => rows
                .into_iter()
                .filter(|row| {
                    row.notification
                        .as_ref()
                        .map(|n| n.notification_type == kind)
                        .unwrap_or(false)
                })
                .collect(),
            None => rows,
        })
    }

    pub async fn mark_read(&self, user_id: &str, user_notification_id: &str) -> Result<()> {
        if self.store.mark_read(user_id, user_notification_id).await? {
            Ok(())
        } else {
            Err(AppError::not_found("Notification"))
        }
    }
}

/// SurrealDB 支持的持久层实现
pub struct SurrealNotificationStore {
    db: Arc<Database>,
}

impl SurrealNotificationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn profiles_to_recipients(&self, user_ids: Vec<String>) -> Result<Vec<Recipient>> {
        let mut recipients = Vec::new();
        for user_id in user_ids {
            if let Some(profile) = self
                .db
                .get_by_id::<UserProfile>("user_profile", &user_id)
                .await?
            {
                recipients.push(Recipient::from(&profile));
            }
        }
        Ok(recipients)
    }
}

#[async_trait]
impl NotificationStore for SurrealNotificationStore {
    async fn bookmarkers_of_article(&self, article_id: &str) -> Result<Vec<Recipient>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM bookmark WHERE article_id = $article_id",
                json!({ "article_id": article_id }),
            )
            .await?;
        let bookmarks: Vec<Bookmark> = response.take(0)?;

        self.profiles_to_recipients(bookmarks.into_iter().map(|b| b.user_id).collect())
            .await
    }

    async fn followers_of_author(&self, author_id: &str) -> Result<Vec<Recipient>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM follow WHERE following_id = $following_id",
                json!({ "following_id": author_id }),
            )
            .await?;
        let follows: Vec<Follow> = response.take(0)?;

        self.profiles_to_recipients(follows.into_iter().map(|f| f.follower_id).collect())
            .await
    }

    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        self.db.create("notification", notification).await
    }

    async fn insert_user_notification(&self, row: UserNotification) -> Result<()> {
        self.db.create("user_notification", row).await?;
        Ok(())
    }

    async fn unread_for_user(&self, user_id: &str) -> Result<Vec<UserNotificationView>> {
        let query = r#"
            SELECT *, (SELECT * FROM notification WHERE id = $parent.notification_id)[0] AS notification
            FROM user_notification
            WHERE user_id = $user_id AND is_read = false
            ORDER BY created_at DESC
        "#;

        let mut response = self
            .db
            .query_with_params(query, json!({ "user_id": user_id }))
            .await?;
        let rows: Vec<UserNotificationView> = response.take(0)?;
        Ok(rows)
    }

    async fn mark_read(&self, user_id: &str, user_notification_id: &str) -> Result<bool> {
        let query = r#"
            UPDATE user_notification
            SET is_read = true
            WHERE id = $id AND user_id = $user_id
            RETURN AFTER
        "#;

        let mut response = self
            .db
            .query_with_params(
                query,
                json!({ "id": user_notification_id, "user_id": user_id }),
            )
            .await?;
        let updated: Vec<UserNotification> = response.take(0)?;
        Ok(!updated.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 内存版持久层，按扇出引擎的契约实现
    #[derive(Default)]
    struct MemoryStore {
        bookmarkers: Vec<Recipient>,
        followers: Vec<Recipient>,
        notifications: Mutex<Vec<Notification>>,
        user_notifications: Mutex<Vec<UserNotification>>,
        fail_user_notification_for: Option<String>,
    }

    #[async_trait]
    impl NotificationStore for MemoryStore {
        async fn bookmarkers_of_article(&self, _article_id: &str) -> Result<Vec<Recipient>> {
            Ok(self.bookmarkers.clone())
        }

        async fn followers_of_author(&self, _author_id: &str) -> Result<Vec<Recipient>> {
            Ok(self.followers.clone())
        }

        async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
            self.notifications.lock().unwrap().push(notification.clone());
            Ok(notification)
        }

        async fn insert_user_notification(&self, row: UserNotification) -> Result<()> {
            if self.fail_user_notification_for.as_deref() == Some(row.user_id.as_str()) {
                return Err(AppError::internal("simulated insert failure"));
            }
            self.user_notifications.lock().unwrap().push(row);
            Ok(())
        }

        async fn unread_for_user(&self, user_id: &str) -> Result<Vec<UserNotificationView>> {
            let notifications = self.notifications.lock().unwrap();
            let rows = self
                .user_notifications
                .lock()
                .unwrap()
                .iter()
                .filter(|row| row.user_id == user_id && !row.is_read)
                .map(|row| UserNotificationView {
                    id: row.id.clone(),
                    user_id: row.user_id.clone(),
                    notification_id: row.notification_id.clone(),
                    is_read: row.is_read,
                    created_at: row.created_at,
                    notification: notifications
                        .iter()
                        .find(|n| n.id == row.notification_id)
                        .cloned(),
                })
                .collect();
            Ok(rows)
        }

        async fn mark_read(&self, user_id: &str, user_notification_id: &str) -> Result<bool> {
            let mut rows = self.user_notifications.lock().unwrap();
            for row in rows.iter_mut() {
                if row.id == user_notification_id && row.user_id == user_id {
                    row.is_read = true;
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl EmailDispatcher for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _text: &str, _html: &str) -> Result<()> {
            if self.fail_for.as_deref() == Some(to) {
                return Err(AppError::Email("simulated smtp failure".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPush {
        published: Mutex<Vec<(String, serde_json::Value)>>,
    }

    #[async_trait]
    impl PushChannel for RecordingPush {
        async fn publish(
            &self,
            channel_id: &str,
            _event: &str,
            payload: serde_json::Value,
        ) -> Result<()> {
            self.published
                .lock()
                .unwrap()
                .push((channel_id.to_string(), payload));
            Ok(())
        }
    }

    fn recipient(user_id: &str, email_on: bool, in_app_on: bool) -> Recipient {
        Recipient {
            user_id: user_id.to_string(),
            username: format!("user-{}", user_id),
            email: format!("{}@example.com", user_id),
            email_notification: email_on,
            in_app_notification: in_app_on,
        }
    }

    fn test_config() -> Config {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            environment: "test".to_string(),
            log_level: "debug".to_string(),
            database_url: "localhost:8000".to_string(),
            database_namespace: "haven".to_string(),
            database_name: "authors".to_string(),
            database_username: "root".to_string(),
            database_password: "root".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_expiry_hours: 168,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_from_name: "Authors Haven".to_string(),
            smtp_from_email: "noreply@authorshaven.com".to_string(),
            frontend_url: "http://localhost:3001".to_string(),
            max_comment_length: 5000,
            default_articles_per_page: 20,
            default_comments_per_page: 50,
            enable_registrations: true,
            enable_email_notifications: true,
            rate_limit_requests: 100,
            cors_allowed_origins: "http://localhost:3001".to_string(),
        }
    }

    fn engine(
        store: Arc<MemoryStore>,
        mailer: Arc<RecordingMailer>,
        push: Arc<RecordingPush>,
    ) -> NotificationService {
        NotificationService::new(store, mailer, push, &test_config()).unwrap()
    }

    fn comment_event() -> NotificationEvent {
        NotificationEvent::comment_created(
            "actor",
            "actor-name",
            "article-1",
            "A Title",
            "http://localhost:3001/articles/a-title",
        )
    }

    #[tokio::test]
    async fn fan_out_respects_channel_preferences() {
        // B 只收邮件，F 只收应用内通知
        let store = Arc::new(MemoryStore {
            bookmarkers: vec![recipient("b", true, false), recipient("f", false, true)],
            ..Default::default()
        });
        let mailer = Arc::new(RecordingMailer::default());
        let push = Arc::new(RecordingPush::default());
        let engine = engine(store.clone(), mailer.clone(), push.clone());

        engine.notify_bookmarkers(comment_event()).await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "b@example.com");

        let pushed = push.published.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, "f");

        let rows = store.user_notifications.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "f");
        assert!(!rows[0].is_read);
    }

    #[tokio::test]
    async fn recipients_with_all_channels_disabled_get_nothing() {
        let store = Arc::new(MemoryStore {
            bookmarkers: vec![recipient("quiet", false, false)],
            ..Default::default()
        });
        let mailer = Arc::new(RecordingMailer::default());
        let push = Arc::new(RecordingPush::default());
        let engine = engine(store.clone(), mailer.clone(), push.clone());

        engine.notify_bookmarkers(comment_event()).await.unwrap();

        assert!(mailer.sent.lock().unwrap().is_empty());
        assert!(push.published.lock().unwrap().is_empty());
        assert!(store.user_notifications.lock().unwrap().is_empty());
        // 没有人会收到应用内通知时，共享内容行也不创建
        assert!(store.notifications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_shared_notification_row_per_event() {
        let store = Arc::new(MemoryStore {
            bookmarkers: vec![
                recipient("a", false, true),
                recipient("b", false, true),
                recipient("c", false, true),
            ],
            ..Default::default()
        });
        let mailer = Arc::new(RecordingMailer::default());
        let push = Arc::new(RecordingPush::default());
        let engine = engine(store.clone(), mailer.clone(), push.clone());

        engine.notify_bookmarkers(comment_event()).await.unwrap();

        let shared_id = store.notifications.lock().unwrap()[0].id.clone();
        assert_eq!(store.notifications.lock().unwrap().len(), 1);
        let rows = store.user_notifications.lock().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.notification_id == shared_id));
    }

    #[tokio::test]
    async fn actor_is_excluded_from_the_audience() {
        let store = Arc::new(MemoryStore {
            bookmarkers: vec![recipient("actor", true, true), recipient("other", false, true)],
            ..Default::default()
        });
        let mailer = Arc::new(RecordingMailer::default());
        let push = Arc::new(RecordingPush::default());
        let engine = engine(store.clone(), mailer.clone(), push.clone());

        engine.notify_bookmarkers(comment_event()).await.unwrap();

        assert!(mailer.sent.lock().unwrap().is_empty());
        let rows = store.user_notifications.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "other");
    }

    #[tokio::test]
    async fn one_failing_recipient_does_not_stop_the_rest() {
        let store = Arc::new(MemoryStore {
            bookmarkers: vec![
                recipient("first", true, true),
                recipient("second", true, true),
            ],
            fail_user_notification_for: Some("first".to_string()),
            ..Default::default()
        });
        let mailer = Arc::new(RecordingMailer {
            fail_for: Some("first@example.com".to_string()),
            ..Default::default()
        });
        let push = Arc::new(RecordingPush::default());
        let engine = engine(store.clone(), mailer.clone(), push.clone());

        engine.notify_bookmarkers(comment_event()).await.unwrap();

        // first 的邮件和行写入都失败了，second 完整收到
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "second@example.com");

        let rows = store.user_notifications.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "second");

        // 推送不区分失败者，两个都发出
        assert_eq!(push.published.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn fan_out_is_not_idempotent() {
        let store = Arc::new(MemoryStore {
            bookmarkers: vec![recipient("r", false, true)],
            ..Default::default()
        });
        let mailer = Arc::new(RecordingMailer::default());
        let push = Arc::new(RecordingPush::default());
        let engine = engine(store.clone(), mailer.clone(), push.clone());

        engine.notify_bookmarkers(comment_event()).await.unwrap();
        engine.notify_bookmarkers(comment_event()).await.unwrap();

        assert_eq!(store.notifications.lock().unwrap().len(), 2);
        assert_eq!(store.user_notifications.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn follower_fan_out_uses_follower_audience() {
        let store = Arc::new(MemoryStore {
            followers: vec![recipient("fan", false, true)],
            ..Default::default()
        });
        let mailer = Arc::new(RecordingMailer::default());
        let push = Arc::new(RecordingPush::default());
        let engine = engine(store.clone(), mailer.clone(), push.clone());

        let event = NotificationEvent::article_published(
            "author",
            "author-name",
            "article-9",
            "Fresh Ink",
            "http://localhost:3001/articles/fresh-ink",
        );
        engine.notify_followers(event).await.unwrap();

        let rows = store.user_notifications.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "fan");

        let notifications = store.notifications.lock().unwrap();
        assert_eq!(
            notifications[0].notification_type,
            NotificationType::ArticlePublished
        );
    }

    #[tokio::test]
    async fn unread_list_filters_by_type() {
        let store = Arc::new(MemoryStore {
            bookmarkers: vec![recipient("r", false, true)],
            followers: vec![recipient("r", false, true)],
            ..Default::default()
        });
        let mailer = Arc::new(RecordingMailer::default());
        let push = Arc::new(RecordingPush::default());
        let engine = engine(store.clone(), mailer.clone(), push.clone());

        engine.notify_bookmarkers(comment_event()).await.unwrap();
        let event = NotificationEvent::article_published(
            "author",
            "author-name",
            "article-9",
            "Fresh Ink",
            "http://localhost:3001/articles/fresh-ink",
        );
        engine.notify_followers(event).await.unwrap();

        let all = engine.unread_notifications("r", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let comments = engine
            .unread_notifications("r", Some(NotificationType::Comment))
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(
            comments[0].notification.as_ref().unwrap().notification_type,
            NotificationType::Comment
        );
    }

    #[tokio::test]
    async fn mark_read_rejects_other_users_notifications() {
        let store = Arc::new(MemoryStore {
            bookmarkers: vec![recipient("owner", false, true)],
            ..Default::default()
        });
        let mailer = Arc::new(RecordingMailer::default());
        let push = Arc::new(RecordingPush::default());
        let engine = engine(store.clone(), mailer.clone(), push.clone());

        engine.notify_bookmarkers(comment_event()).await.unwrap();

        let row_id = store.user_notifications.lock().unwrap()[0].id.clone();

        let err = engine.mark_read("intruder", &row_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        engine.mark_read("owner", &row_id).await.unwrap();
        assert!(store.user_notifications.lock().unwrap()[0].is_read);
    }
}
