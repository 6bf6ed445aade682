//! Prediction API client
//!
//! Holds one pooled HTTP client and the current auth token. The token sits
//! behind an async mutex so renewals triggered by concurrent 401s are
//! serialized: only the first caller re-authenticates, later callers pick up
//! the fresh token.

use aiprediction_core::{ApiConfig, DateId, Error, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::{last_elements_endpoint, PredictionApi, DEBUG_INFO_ENDPOINT};
use crate::auth::{AuthRequest, AuthResponse, TokenState, AUTH_ENDPOINT};

/// Authenticated client for the prediction API
pub struct PredictionClient {
    config: ApiConfig,
    http: reqwest::Client,
    state: Mutex<TokenState>,
}

impl PredictionClient {
    /// Create a client. No request is made until the first call.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            config,
            http,
            state: Mutex::new(TokenState::default()),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Whether a token is currently held
    pub async fn has_token(&self) -> bool {
        self.state.lock().await.token.is_some()
    }

    /// Request a new token and store it.
    ///
    /// Returns `false` on missing credentials, non-200 responses, network
    /// failures and unusable bodies. A previously held token is kept on failure.
    pub async fn authenticate(&self) -> bool {
        let mut state = self.state.lock().await;
        self.authenticate_locked(&mut state).await
    }

    async fn authenticate_locked(&self, state: &mut TokenState) -> bool {
        match self.request_token().await {
            Ok(token) => {
                state.replace(token);
                true
            }
            Err(e) => {
                error!(category = e.category(), error = %e, "Authentication failed");
                false
            }
        }
    }

    async fn request_token(&self) -> Result<SecretString> {
        let credentials = self.config.credentials()?;
        let url = self.config.url(AUTH_ENDPOINT);

        info!(
            url = %url,
            username = %credentials.username,
            password = %self.config.masked_password(),
            "Attempting authentication"
        );

        let response = self
            .http
            .post(&url)
            .json(&AuthRequest {
                username: &credentials.username,
                password: credentials.password.expose_secret(),
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(Error::Authentication(format!(
                "status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let auth: AuthResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Authentication(format!("Could not parse JSON response: {} ({})", e, body))
        })?;

        info!(
            user_id = ?auth.user_id,
            username = ?auth.username,
            is_member = ?auth.is_member,
            expires_at = ?auth.expires_at,
            "Authentication successful"
        );

        auth.into_token()
            .ok_or_else(|| Error::Authentication("No token in response".to_string()))
    }

    /// Current token and its generation, authenticating first if none is held
    async fn current_token(&self) -> Result<(SecretString, u64)> {
        let mut state = self.state.lock().await;

        if state.token.is_none() {
            debug!("No auth token, attempting authentication");
            if !self.authenticate_locked(&mut state).await {
                return Err(Error::Unauthenticated(
                    "no token held and authentication did not succeed".to_string(),
                ));
            }
        }

        match &state.token {
            Some(token) => Ok((token.clone(), state.generation)),
            None => Err(Error::Unauthenticated("no token held".to_string())),
        }
    }

    /// Replace the token that was rejected at `stale_generation`.
    ///
    /// If another call renewed it in the meantime the newer token is returned
    /// without authenticating again.
    async fn renew_token(&self, stale_generation: u64) -> Result<SecretString> {
        let mut state = self.state.lock().await;

        if state.generation != stale_generation {
            if let Some(token) = &state.token {
                debug!(
                    generation = state.generation,
                    "Token already renewed by a concurrent call"
                );
                return Ok(token.clone());
            }
        }

        if !self.authenticate_locked(&mut state).await {
            return Err(Error::Unauthenticated("Re-authentication failed".to_string()));
        }

        state
            .token
            .clone()
            .ok_or_else(|| Error::Unauthenticated("Re-authentication failed".to_string()))
    }

    async fn get(
        &self,
        url: &str,
        token: &SecretString,
        params: &[(&str, &str)],
    ) -> Result<Response> {
        let mut request = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Token {}", token.expose_secret()));

        if !params.is_empty() {
            request = request.query(params);
        }

        Ok(request.send().await?)
    }

    /// Authenticated GET of `endpoint`, returning the JSON body.
    ///
    /// A 401 triggers exactly one re-authentication and one retry. Every other
    /// non-200 status is returned as [`Error::Api`].
    pub async fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = self.config.url(endpoint);
        let (token, generation) = self.current_token().await?;

        debug!(url = %url, "Making API call");
        let response = self.get(&url, &token, params).await?;

        match response.status() {
            StatusCode::OK => {
                let value = parse_json(response).await?;
                debug!(url = %url, "API call successful");
                Ok(value)
            }
            StatusCode::UNAUTHORIZED => {
                warn!(url = %url, "Token expired (401), attempting re-authentication");
                let token = self.renew_token(generation).await?;

                let retry = self.get(&url, &token, params).await?;
                if retry.status() == StatusCode::OK {
                    let value = parse_json(retry).await?;
                    info!(url = %url, "API call successful after re-authentication");
                    return Ok(value);
                }

                let err = api_error(retry).await;
                error!(url = %url, error = %err, "API call failed even after re-authentication");
                Err(err)
            }
            _ => {
                let err = api_error(response).await;
                error!(url = %url, error = %err, "API call failed");
                Err(err)
            }
        }
    }

    /// Last elements recorded for a date
    pub async fn get_last_elements(&self, did: &DateId) -> Result<Value> {
        self.call(&last_elements_endpoint(did), &[]).await
    }

    /// General debug information about the model
    pub async fn get_debug_info(&self) -> Result<Value> {
        self.call(DEBUG_INFO_ENDPOINT, &[]).await
    }
}

#[async_trait]
impl PredictionApi for PredictionClient {
    async fn get_last_elements(&self, did: &DateId) -> Result<Value> {
        PredictionClient::get_last_elements(self, did).await
    }

    async fn get_debug_info(&self) -> Result<Value> {
        PredictionClient::get_debug_info(self).await
    }
}

async fn parse_json(response: Response) -> Result<Value> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        error!(raw = %body, "Could not parse JSON response");
        Error::InvalidResponse(e.to_string())
    })
}

async fn api_error(response: Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Error::Api { status, body }
}
