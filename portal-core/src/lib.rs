//! Core library for the WiFi captive-portal provisioner.
//! This crate defines the wire types and core traits (interfaces) of the
//! provisioning exchange (`GET /scan`, `POST /save`), the web server that
//! serves it, backends for Wi-Fi control and credential storage, and the
//! client-side flow of the provisioning page.

pub mod backends;
pub mod client;
pub mod config;
pub mod frontends;
pub mod store;
pub mod structs;
pub mod traits;
pub mod web_server;

// Define a shared Error and Result type for the entire crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Web server error: {0}")]
    WebServer(#[from] axum::BoxError),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;
