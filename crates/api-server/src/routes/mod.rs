//! API routes

pub mod files;
pub mod health;
pub mod sessions;
pub mod stream;
