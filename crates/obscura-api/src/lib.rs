//! HTTP surface and concurrency fabric of the Obscura image service.
//!
//! The interesting machinery lives in [`repository`]: each repository runs a
//! single consumer task that owns its mutable state outright, so the caches
//! and the open-handle map need no locks. Handlers talk to cloneable handles
//! that send typed commands and wait for typed replies.

pub mod api_doc;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod repository;
pub mod services;
pub mod setup;
pub mod state;
