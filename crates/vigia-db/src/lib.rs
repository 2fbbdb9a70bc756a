//! Vigia Database Layer
//!
//! This crate provides PostgreSQL database access and repository
//! implementations for the Vigia call monitor. It includes:
//!
//! - Connection pool management with sqlx
//! - Repository implementations for calls, legs, bridge segments, and
//!   extensions
//! - Upsert-by-key semantics matching the reconstruction engine's
//!   read-modify-write access pattern

pub mod pool;
pub mod repositories;

pub use pool::create_pool;
pub use repositories::*;

// Re-export commonly used types
pub use sqlx::PgPool;
pub use vigia_core::{AppError, AppResult};
