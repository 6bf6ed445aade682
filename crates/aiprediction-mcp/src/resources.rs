//! Resource catalog and reads

use aiprediction_client::PredictionApi;
use aiprediction_core::DateId;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::protocol::RpcError;

pub const CURRENT_DATE_URI: &str = "aiprediction://current-date";
pub const DEBUG_INFO_URI: &str = "aiprediction://debug-info";

const JSON_MIME_TYPE: &str = "application/json";

/// Resource advertised through `resources/list`
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDefinition {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Resources served by the bridge. The current-date description names today's DID.
pub fn resource_definitions() -> Vec<ResourceDefinition> {
    let today = DateId::today();
    vec![
        ResourceDefinition {
            uri: CURRENT_DATE_URI.to_string(),
            name: "Current Date Data".to_string(),
            description: format!("Last elements for current date ({})", today),
            mime_type: JSON_MIME_TYPE.to_string(),
        },
        ResourceDefinition {
            uri: DEBUG_INFO_URI.to_string(),
            name: "API Debug Info".to_string(),
            description: "Debug information about the V53a model".to_string(),
            mime_type: JSON_MIME_TYPE.to_string(),
        },
    ]
}

/// Read a resource as pretty JSON text.
///
/// Fetch failures are rendered into the text as `{"error": ...}`; only an
/// unknown URI is a protocol error.
pub async fn read_resource(api: &dyn PredictionApi, uri: &str) -> Result<String, RpcError> {
    let (result, failure) = match uri {
        CURRENT_DATE_URI => (
            api.get_last_elements(&DateId::today()).await,
            "Failed to get current date data",
        ),
        DEBUG_INFO_URI => (api.get_debug_info().await, "Failed to get debug info"),
        _ => return Err(RpcError::invalid_params(format!("Unknown resource: {}", uri))),
    };

    let value = match result {
        Ok(value) => value,
        Err(e) => {
            warn!(uri = %uri, error = %e, "Resource read failed");
            json!({ "error": format!("{}: {}", failure, e) })
        }
    };

    serde_json::to_string_pretty(&value).map_err(|e| RpcError::internal(e.to_string()))
}

/// `resources/read` result body for a URI and its text
pub fn contents_payload(uri: &str, text: String) -> Value {
    json!({
        "contents": [{
            "uri": uri,
            "mimeType": JSON_MIME_TYPE,
            "text": text
        }]
    })
}
