//! Application-level errors for Sunshine.
//!
//! Only startup and configuration paths surface these. A failing sync pass
//! is reported as an outcome by the sync pipeline and never converted here.

use thiserror::Error;

/// Top-level error returned by the binary's startup path.
///
/// `user_message()` gives the short text printed to the terminal.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Forecast service: {0}")]
    Network(#[from] NetworkError),

    #[error("Forecast database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Trigger registration and other background plumbing.
    #[error("Background sync: {0}")]
    Service(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Keep typed configuration errors distinct when they arrive wrapped in anyhow.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<ConfigError>() {
            Ok(config) => AppError::Config(config),
            Err(other) => AppError::Other(other),
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Database(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "Could not read or write a local file.",
            AppError::Service(_) => "Background sync could not be started.",
            AppError::Other(_) => "Sunshine stopped because of an unexpected error.",
        }
    }
}

/// Talking to the forecast endpoint failed.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("request timed out")]
    Timeout,

    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::Unreachable(_) => {
                "The forecast service is unreachable. Check your connection."
            }
            NetworkError::Timeout => "The forecast service did not answer in time.",
            NetworkError::Rejected { status, .. } if *status >= 500 => {
                "The forecast service is having problems. Try again later."
            }
            NetworkError::Rejected { .. } => {
                "The forecast service rejected the request. Check the configured location."
            }
            NetworkError::Malformed(_) => {
                "The forecast service sent data Sunshine cannot read."
            }
        }
    }
}

/// The local forecast database failed.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("cannot open: {0}")]
    Unavailable(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("corrupt data: {0}")]
    Corrupt(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::Unavailable(_) => "The forecast database could not be opened.",
            DatabaseError::OperationFailed(_) => {
                "Reading or writing the forecast database failed."
            }
            DatabaseError::Corrupt(_) => {
                "The forecast database holds unreadable data. Deleting it resets Sunshine."
            }
        }
    }
}

/// `config.toml` could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("cannot parse config.toml: {0}")]
    Malformed(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "config.toml has invalid settings.",
            ConfigError::Malformed(_) => "config.toml is not valid TOML.",
        }
    }
}

/// Classify reqwest failures into [`NetworkError`].
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            return NetworkError::Timeout;
        }
        if let Some(status) = self.status() {
            return NetworkError::Rejected {
                status: status.as_u16(),
                message: self.to_string(),
            };
        }
        if self.is_decode() || self.is_body() {
            return NetworkError::Malformed(self.to_string());
        }
        NetworkError::Unreachable(self.to_string())
    }
}
