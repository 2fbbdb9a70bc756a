//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ami: AmiConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9040
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// Asterisk Manager Interface configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AmiConfig {
    /// Manager hostname or IP
    pub host: String,

    /// Manager port
    #[serde(default = "default_ami_port")]
    pub port: u16,

    /// Manager username
    pub username: String,

    /// Manager secret
    pub secret: String,

    /// Whether to request the event stream at login (Events: on|off)
    #[serde(default = "default_events")]
    pub events: bool,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Login response timeout in seconds
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,

    /// Keep-alive probe interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    /// Per-query response timeout in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Delay between reconnection attempts in seconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Give up after this many consecutive failed attempts
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

fn default_ami_port() -> u16 {
    5038
}

fn default_events() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_auth_timeout() -> u64 {
    5
}

fn default_keepalive_interval() -> u64 {
    30
}

fn default_query_timeout() -> u64 {
    5
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

impl AmiConfig {
    /// Get the manager connection address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 9040)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 10)?
            .set_default("ami.port", 5038)?
            .set_default("ami.events", true)?
            .set_default("ami.connect_timeout_secs", 10)?
            .set_default("ami.auth_timeout_secs", 5)?
            .set_default("ami.keepalive_interval_secs", 30)?
            .set_default("ami.query_timeout_secs", 5)?
            .set_default("ami.reconnect_delay_secs", 5)?
            .set_default("ami.max_reconnect_attempts", 10)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with VIGIA_ prefix
            .add_source(
                Environment::with_prefix("VIGIA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("VIGIA").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ami_addr() {
        let ami = AmiConfig {
            host: "10.20.0.5".to_string(),
            port: 5038,
            username: "monitor".to_string(),
            secret: "secret".to_string(),
            events: true,
            connect_timeout_secs: 10,
            auth_timeout_secs: 5,
            keepalive_interval_secs: 30,
            query_timeout_secs: 5,
            reconnect_delay_secs: 5,
            max_reconnect_attempts: 10,
        };
        assert_eq!(ami.addr(), "10.20.0.5:5038");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(default_ami_port(), 5038);
        assert_eq!(default_keepalive_interval(), 30);
        assert!(default_events());
    }
}
