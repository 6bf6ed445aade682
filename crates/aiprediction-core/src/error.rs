//! Error types for aiprediction-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to authenticate: {0}")]
    Unauthenticated(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API call failed: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Invalid JSON response: {0}")]
    InvalidResponse(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Taxonomy bucket, used as a structured log field
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "configuration",
            Error::Authentication(_) | Error::Unauthenticated(_) => "authentication",
            Error::Network(_) => "network",
            Error::Api { .. } | Error::InvalidResponse(_) => "protocol",
            Error::InvalidDate(_) | Error::Validation(_) => "validation",
        }
    }

    /// HTTP status carried by a protocol error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidResponse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
