//! API configuration
//!
//! Credentials are wrapped in `secrecy` so they never show up in `Debug`
//! output or logs.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result};

/// Default base URL of the prediction API
pub const DEFAULT_BASE_URL: &str = "https://aiprediction.us";

/// Default timeout for API requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the prediction API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL for the API, without a trailing slash
    pub base_url: String,
    /// Account username
    pub username: Option<String>,
    /// Account password
    pub password: Option<SecretString>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: None,
            password: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    /// Create a configuration for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            ..Default::default()
        }
    }

    /// Set the account credentials. Empty strings count as unset.
    pub fn with_credentials(
        mut self,
        username: Option<impl Into<String>>,
        password: Option<impl Into<String>>,
    ) -> Self {
        self.username = username.map(Into::into).filter(|u| !u.is_empty());
        self.password = password
            .map(Into::into)
            .filter(|p| !p.is_empty())
            .map(SecretString::new);
        self
    }

    /// Set request and connect timeouts
    pub fn with_timeouts(mut self, timeout_secs: u64, connect_timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self.connect_timeout_secs = connect_timeout_secs;
        self
    }

    /// URL for an endpoint path such as `/api-token-auth/`
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Both credentials, or a configuration error naming what is missing
    pub fn credentials(&self) -> Result<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            (username, password) => Err(Error::Config(format!(
                "Missing credentials (API_USERNAME: {}, API_PASSWORD: {})",
                set_or_not(username.is_some()),
                set_or_not(password.is_some()),
            ))),
        }
    }

    /// Password rendered as asterisks, for diagnostics
    pub fn masked_password(&self) -> String {
        match &self.password {
            Some(p) => "*".repeat(p.expose_secret().chars().count()),
            None => "NOT SET".to_string(),
        }
    }
}

/// Username and password for the token endpoint
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

fn set_or_not(present: bool) -> &'static str {
    if present {
        "SET"
    } else {
        "NOT SET"
    }
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
