//! Core types for the Obscura image service.
//!
//! This crate holds the pieces shared by every other layer: the runtime
//! configuration, the unified `AppError`, the domain and wire models, and
//! upload-token generation. It stays free of any I/O so the store and API
//! crates can depend on it without pulling in their stacks.

pub mod config;
pub mod error;
pub mod models;
pub mod token;

pub use config::Config;
pub use error::AppError;
