pub mod articles;
pub mod auth;
pub mod bookmarks;
pub mod comments;
pub mod follows;
pub mod notifications;
pub mod users;
