//! In-process stand-in for the prediction API
//!
//! Issues tokens `token-1`, `token-2`, ... and only accepts the most recent
//! one, so expiring it reproduces the server-side 401 path.

#![allow(dead_code)]

use aiprediction_client::PredictionClient;
use aiprediction_core::ApiConfig;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "correct-horse";

/// How the token endpoint answers a correct password
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthMode {
    Normal,
    Unparseable,
    MissingToken,
}

pub struct MockApi {
    pub auth_calls: AtomicUsize,
    pub data_calls: AtomicUsize,
    issued: AtomicUsize,
    password: Mutex<String>,
    auth_mode: Mutex<AuthMode>,
    current_token: Mutex<Option<String>>,
    scripted: Mutex<VecDeque<(StatusCode, String)>>,
    seen_auth_headers: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            auth_calls: AtomicUsize::new(0),
            data_calls: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
            password: Mutex::new(PASSWORD.to_string()),
            auth_mode: Mutex::new(AuthMode::Normal),
            current_token: Mutex::new(None),
            scripted: Mutex::new(VecDeque::new()),
            seen_auth_headers: Mutex::new(Vec::new()),
        })
    }

    pub fn auth_count(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn data_count(&self) -> usize {
        self.data_calls.load(Ordering::SeqCst)
    }

    /// Invalidate the live token server-side
    pub fn expire_token(&self) {
        *self.current_token.lock().unwrap() = None;
    }

    /// Change the password the token endpoint accepts
    pub fn set_password(&self, password: &str) {
        *self.password.lock().unwrap() = password.to_string();
    }

    pub fn set_auth_mode(&self, mode: AuthMode) {
        *self.auth_mode.lock().unwrap() = mode;
    }

    /// Queue a response for the next data request, bypassing token checks
    pub fn script(&self, status: StatusCode, body: &str) {
        self.scripted
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
    }

    /// `Authorization` headers received by data endpoints, in order
    pub fn seen_auth_headers(&self) -> Vec<String> {
        self.seen_auth_headers.lock().unwrap().clone()
    }

    fn check_data_request(&self, headers: &HeaderMap) -> Option<(StatusCode, String)> {
        self.data_calls.fetch_add(1, Ordering::SeqCst);

        let header = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.seen_auth_headers.lock().unwrap().push(header.clone());

        if let Some(scripted) = self.scripted.lock().unwrap().pop_front() {
            return Some(scripted);
        }

        let valid = self
            .current_token
            .lock()
            .unwrap()
            .as_ref()
            .map(|t| header == format!("Token {}", t))
            .unwrap_or(false);

        if valid {
            None
        } else {
            Some((
                StatusCode::UNAUTHORIZED,
                json!({"detail": "Invalid token."}).to_string(),
            ))
        }
    }
}

async fn token_auth(
    State(mock): State<Arc<MockApi>>,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    mock.auth_calls.fetch_add(1, Ordering::SeqCst);

    let expected = mock.password.lock().unwrap().clone();
    let username = body["username"].as_str().unwrap_or_default();
    if username != USERNAME || body["password"].as_str() != Some(expected.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            json!({"non_field_errors": ["Unable to log in with provided credentials."]})
                .to_string(),
        );
    }

    match *mock.auth_mode.lock().unwrap() {
        AuthMode::Unparseable => return (StatusCode::OK, "<html>oops</html>".to_string()),
        AuthMode::MissingToken => {
            return (StatusCode::OK, json!({"username": USERNAME}).to_string())
        }
        AuthMode::Normal => {}
    }

    let n = mock.issued.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("token-{}", n);
    *mock.current_token.lock().unwrap() = Some(token.clone());

    (
        StatusCode::OK,
        json!({
            "token": token,
            "user_id": 1,
            "username": USERNAME,
            "is_member": true,
            "expires_at": "2030-01-01T00:00:00Z"
        })
        .to_string(),
    )
}

async fn last_elements(
    State(mock): State<Arc<MockApi>>,
    Path(did): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    if let Some(rejection) = mock.check_data_request(&headers) {
        return rejection;
    }
    (
        StatusCode::OK,
        json!({"DID": did, "last_elements": {"x": 1, "y": null}}).to_string(),
    )
}

async fn debug_info(State(mock): State<Arc<MockApi>>, headers: HeaderMap) -> (StatusCode, String) {
    if let Some(rejection) = mock.check_data_request(&headers) {
        return rejection;
    }
    (
        StatusCode::OK,
        json!({"model": "v53a", "status": "ok"}).to_string(),
    )
}

/// Serve the mock on an ephemeral port and return its base URL
pub async fn spawn(mock: Arc<MockApi>) -> String {
    let app = Router::new()
        .route("/api-token-auth/", post(token_auth))
        .route("/api/v53a/:did/last-elements/", get(last_elements))
        .route("/api/debug/v53a/general/", get(debug_info))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

pub fn client_with_password(base_url: &str, password: &str) -> PredictionClient {
    let config = ApiConfig::new(base_url)
        .with_credentials(Some(USERNAME), Some(password))
        .with_timeouts(5, 2);
    PredictionClient::new(config).unwrap()
}

pub fn client(base_url: &str) -> PredictionClient {
    client_with_password(base_url, PASSWORD)
}
