//! Vigia Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Vigia call monitor. It includes:
//!
//! - Domain models (Call, CallLeg, BridgeSegment, Extension)
//! - Repository and broadcast traits the call tracker writes through
//! - Unified error handling with HTTP response mapping
//! - Application configuration
//! - Phone number normalization

pub mod config;
pub mod error;
pub mod models;
pub mod phone;
pub mod traits;

pub use config::{AmiConfig, AppConfig};
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
