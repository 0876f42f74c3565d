//! API handlers module

pub mod chat;
pub mod health;
pub mod papers;
pub mod sessions;
pub mod upload;
