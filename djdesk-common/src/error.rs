// djdesk-common/src/error.rs
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DjdeskError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Git Error: {0}")]
    Git(#[from] Arc<git2::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Unsupported target: platform '{platform}', architecture '{arch}'")]
    UnsupportedTarget { platform: String, arch: String },

    #[error("Python interpreter not found: {0}")]
    InterpreterNotFound(String),

    #[error("Checksum mismatch for {asset}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        asset: String,
        expected: String,
        actual: String,
    },

    #[error("Unexpected Python version ({actual}); expected {expected}")]
    InterpreterVersionMismatch { expected: String, actual: String },

    #[error("DownloadError: Failed to download '{0}' from '{1}': {2}")]
    DownloadError(String, String, String),

    #[error("HttpError: {0}")]
    HttpError(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("{tool} exited with status {status}: {output}")]
    ExternalTool {
        tool: String,
        status: String,
        output: String,
    },

    #[error("Bundle verification failed (status {status}): {output}")]
    BundleVerificationFailed { status: String, output: String },

    #[error("Failed to start server process: {0}")]
    SpawnFailed(String),

    #[error("Server process exited before becoming ready (code {0})")]
    PrematureExit(i32),

    #[error("Server process exited unexpectedly (code {0})")]
    ServerExited(i32),

    #[error("Server at {url} failed to start (timeout after {attempts} attempts)")]
    HealthCheckTimeout { url: String, attempts: u32 },

    #[error("Single-instance lock error: {0}")]
    InstanceLock(String),

    #[error("IoError: {0}")]
    IoError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for DjdeskError {
    fn from(err: std::io::Error) -> Self {
        DjdeskError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for DjdeskError {
    fn from(err: reqwest::Error) -> Self {
        DjdeskError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for DjdeskError {
    fn from(err: serde_json::Error) -> Self {
        DjdeskError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for DjdeskError {
    fn from(err: toml::de::Error) -> Self {
        DjdeskError::Toml(Arc::new(err))
    }
}

impl From<git2::Error> for DjdeskError {
    fn from(err: git2::Error) -> Self {
        DjdeskError::Git(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, DjdeskError>;
