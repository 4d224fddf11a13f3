pub mod article;
pub mod bookmark;
pub mod comment;
pub mod follow;
pub mod notification;
pub mod response;
pub mod user;
