//! Token endpoint payloads and held-token state

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Path of the token-issuing endpoint
pub const AUTH_ENDPOINT: &str = "/api-token-auth/";

/// Request body for the token endpoint
#[derive(Serialize)]
pub(crate) struct AuthRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Response body of a successful token request
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: Option<String>,
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_member: Option<bool>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

impl AuthResponse {
    /// The issued token, if the server sent a non-empty one
    pub fn into_token(self) -> Option<SecretString> {
        self.token.filter(|t| !t.is_empty()).map(SecretString::new)
    }
}

/// The single live token and how many times one has been issued.
///
/// `generation` only moves forward, so a caller holding an older generation
/// knows someone else already renewed.
#[derive(Default)]
pub(crate) struct TokenState {
    pub token: Option<SecretString>,
    pub generation: u64,
}

impl TokenState {
    pub fn replace(&mut self, token: SecretString) {
        self.token = Some(token);
        self.generation += 1;
    }
}
