//! Core library for Browser Pilot
//!
//! This crate contains the durable side of the system:
//! - Session and message models
//! - File-backed session storage

pub mod error;
pub mod session;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
