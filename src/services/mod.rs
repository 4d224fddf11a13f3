pub mod article;
pub mod auth;
pub mod bookmark;
pub mod comment;
pub mod database;
pub mod email;
pub mod follow;
pub mod history;
pub mod notification;
pub mod realtime;
pub mod user;

// 重新导出常用类型
pub use article::ArticleService;
pub use auth::AuthService;
pub use bookmark::BookmarkService;
pub use comment::CommentService;
pub use database::Database;
pub use email::SmtpMailer;
pub use follow::FollowService;
pub use history::EditHistoryService;
pub use notification::NotificationService;
pub use realtime::RealtimeService;
pub use user::UserService;
