pub mod middleware;
pub mod slug;
