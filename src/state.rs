use crate::{
    config::Config,
    services::{
        article::ArticleService,
        auth::AuthService,
        bookmark::BookmarkService,
        comment::CommentService,
        database::Database,
        follow::FollowService,
        history::EditHistoryService,
        notification::NotificationService,
        realtime::RealtimeService,
        user::UserService,
    },
};

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Database,

    /// 认证服务
    pub auth_service: AuthService,

    /// 用户服务
    pub user_service: UserService,

    /// 文章服务
    pub article_service: ArticleService,

    /// 评论服务
    pub comment_service: CommentService,

    /// 编辑历史记录器
    pub history_service: EditHistoryService,

    /// 通知扇出引擎
    pub notification_service: NotificationService,

    /// 实时推送服务
    pub realtime_service: RealtimeService,

    /// 关注服务
    pub follow_service: FollowService,

    /// 书签服务
    pub bookmark_service: BookmarkService,
}
