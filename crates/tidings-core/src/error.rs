use std::fmt;

use thiserror::Error;

/// Application-wide error types for Tidings.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Expected markup was absent or could not be interpreted.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A rendered page never produced the marker element.
    #[error("Marker '{selector}' did not appear within {secs} seconds")]
    RenderTimeout { selector: String, secs: u64 },

    /// Headless browser could not be launched or driven.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Persistent-tier operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

/// Coarse failure classes used for logging and propagation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Parse,
    Render,
    Store,
    Config,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Parse => "parse",
            FailureKind::Render => "render",
            FailureKind::Store => "store",
            FailureKind::Config => "config",
            FailureKind::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::HttpError(_) | AppError::NetworkError(_) | AppError::Timeout(_) => {
                FailureKind::Network
            }
            AppError::ParseError(_) => FailureKind::Parse,
            AppError::RenderTimeout { .. } | AppError::BrowserError(_) => FailureKind::Render,
            AppError::DatabaseError(_) => FailureKind::Store,
            AppError::ConfigError(_) => FailureKind::Config,
            AppError::Generic(_) => FailureKind::Other,
        }
    }

    /// Returns true if this error belongs to a single adapter's harvest and
    /// only costs that source one cycle.
    pub fn is_adapter_local(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Network | FailureKind::Parse | FailureKind::Render
        )
    }
}
