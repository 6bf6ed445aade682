//! AI Prediction Client - Authenticated access to the prediction API
//!
//! This crate provides:
//! - Token authentication with username/password
//! - Authenticated GET calls with a single re-authentication on 401
//! - Accessors for the last-elements and debug endpoints
//! - The `PredictionApi` trait consumed by the MCP adapter

pub mod api;
pub mod auth;
pub mod client;

pub use api::PredictionApi;
pub use auth::AuthResponse;
pub use client::PredictionClient;
