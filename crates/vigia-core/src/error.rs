//! Unified error handling for Vigia
//!
//! This module provides a single error type covering every failure scenario
//! in the application, with automatic HTTP response mapping for the handlers
//! that surface errors to operators.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Manager Connection Errors ====================
    #[error("Connection to manager timed out: {0}")]
    ConnectTimeout(String),

    #[error("Connection to manager failed: {0}")]
    ConnectError(String),

    #[error("Manager login timed out: {0}")]
    AuthTimeout(String),

    #[error("Manager login rejected: {0}")]
    AuthRejected(String),

    #[error("Manager query timed out: {0}")]
    QueryTimeout(String),

    #[error("Manager connection closed: {0}")]
    ConnectionClosed(String),

    // ==================== Protocol Errors ====================
    #[error("Malformed manager message: {0}")]
    MalformedMessage(String),

    // ==================== Event Handling Errors ====================
    #[error("Event handler failed for {event}: {reason}")]
    Handler { event: String, reason: String },

    #[error("Missing event field: {0}")]
    MissingField(String),

    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 404 Not Found
            AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 502 Bad Gateway: the switch is unreachable or unhappy
            AppError::ConnectTimeout(_)
            | AppError::ConnectError(_)
            | AppError::AuthTimeout(_)
            | AppError::AuthRejected(_)
            | AppError::ConnectionClosed(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout: the switch did not answer in time
            AppError::QueryTimeout(_) => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::ConnectTimeout(_) => "connect_timeout",
            AppError::ConnectError(_) => "connect_error",
            AppError::AuthTimeout(_) => "auth_timeout",
            AppError::AuthRejected(_) => "auth_rejected",
            AppError::QueryTimeout(_) => "query_timeout",
            AppError::ConnectionClosed(_) => "connection_closed",
            AppError::MalformedMessage(_) => "malformed_message",
            AppError::Handler { .. } => "handler_error",
            AppError::MissingField(_) => "missing_field",
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::NotFound(_) => "not_found",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// True for connection-phase failures handled by the reconnect policy
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AppError::ConnectTimeout(_)
                | AppError::ConnectError(_)
                | AppError::AuthTimeout(_)
                | AppError::AuthRejected(_)
                | AppError::ConnectionClosed(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::ConnectionClosed(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
