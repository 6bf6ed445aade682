//! Read-only operations of the prediction API

use aiprediction_core::{DateId, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Endpoint for the last-elements snapshot of a date
pub fn last_elements_endpoint(did: &DateId) -> String {
    format!("/api/v53a/{}/last-elements/", did)
}

/// Endpoint for model debug information
pub const DEBUG_INFO_ENDPOINT: &str = "/api/debug/v53a/general/";

/// Data source behind the MCP tools and resources
#[async_trait]
pub trait PredictionApi: Send + Sync {
    /// Last elements recorded for a date
    async fn get_last_elements(&self, did: &DateId) -> Result<Value>;

    /// General debug information about the model
    async fn get_debug_info(&self) -> Result<Value>;
}
