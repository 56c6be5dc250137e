//! Application services layer.

pub mod chat;
pub mod error;
pub mod export;
pub mod render;
pub mod sessions;
