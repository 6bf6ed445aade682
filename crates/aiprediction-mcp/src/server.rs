//! MCP server over newline-delimited JSON-RPC
//!
//! Reads one JSON message per line and writes one response per line. Stdout
//! is reserved for protocol traffic; diagnostics go through `tracing`.

use aiprediction_client::PredictionApi;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::protocol::{
    error_response, success_response, RpcError, DEFAULT_PROTOCOL_VERSION, JSONRPC_VERSION,
};
use crate::resources::{contents_payload, read_resource, resource_definitions};
use crate::tools::ToolExecutor;

pub const SERVER_NAME: &str = "aiprediction-mcp-server";

/// MCP request handler bound to one prediction API
pub struct McpServer {
    api: Arc<dyn PredictionApi>,
    tools: ToolExecutor,
}

impl McpServer {
    pub fn new(api: Arc<dyn PredictionApi>) -> Self {
        Self {
            tools: ToolExecutor::new(api.clone()),
            api,
        }
    }

    /// Serve on the process stdin/stdout until EOF
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve on an arbitrary line-oriented stream pair until EOF
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP server ready for connections");
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let responses = match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.handle_line(line.trim_end_matches(['\r', '\n'])).await,
                Err(e) => {
                    warn!(error = %e, "MCP message is not valid UTF-8");
                    vec![error_response(
                        Value::Null,
                        RpcError::parse_error(format!("Parse error: {}", e)),
                    )]
                }
            };

            for response in responses {
                let mut bytes = serde_json::to_vec(&response)?;
                bytes.push(b'\n');
                writer.write_all(&bytes).await?;
                writer.flush().await?;
            }
        }

        info!("Input closed, MCP server stopping");
        Ok(())
    }

    /// Handle one raw line, returning the responses to write
    pub async fn handle_line(&self, line: &str) -> Vec<Value> {
        match serde_json::from_str::<Value>(line) {
            Ok(incoming) => self.handle_message(incoming).await,
            Err(e) => {
                warn!(error = %e, "Unparseable MCP message");
                vec![error_response(
                    Value::Null,
                    RpcError::parse_error(format!("Parse error: {}", e)),
                )]
            }
        }
    }

    /// Handle a decoded message or batch
    pub async fn handle_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Value::Array(batch) = incoming {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single(item).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Responses to requests we never send.
            if obj.contains_key("result") || obj.contains_key("error") {
                return None;
            }
            let id = obj.get("id").cloned()?;
            return Some(error_response(
                id,
                RpcError::invalid_request("Request must have a string 'method'"),
            ));
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id").cloned() {
            Some(id) => {
                debug!(method = %method, id = %id, "MCP request");
                Some(match self.handle_request(method, params).await {
                    Ok(result) => success_response(id, result),
                    Err(err) => error_response(id, err),
                })
            }
            None => {
                debug!(method = %method, "MCP notification");
                None
            }
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize_payload(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tools.definitions() })),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": resource_definitions() })),
            "resources/read" => self.handle_resources_read(params).await,
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let arguments = match params.get("arguments") {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        Ok(self.tools.execute(name, &arguments).await.to_value())
    }

    async fn handle_resources_read(&self, params: Value) -> Result<Value, RpcError> {
        let uri = params.get("uri").and_then(Value::as_str).ok_or_else(|| {
            RpcError::invalid_params("resources/read requires string field 'uri'")
        })?;

        let text = read_resource(self.api.as_ref(), uri).await?;
        Ok(contents_payload(uri, text))
    }
}

fn initialize_payload(params: &Value) -> Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);

    json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": { "listChanged": false },
            "resources": { "subscribe": false, "listChanged": false }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiprediction_core::{DateId, Result};
    use async_trait::async_trait;

    struct EchoApi;

    #[async_trait]
    impl PredictionApi for EchoApi {
        async fn get_last_elements(&self, did: &DateId) -> Result<Value> {
            Ok(json!({ "DID": did, "last_elements": {} }))
        }

        async fn get_debug_info(&self) -> Result<Value> {
            Ok(json!({ "status": "ok" }))
        }
    }

    fn server() -> McpServer {
        McpServer::new(Arc::new(EchoApi))
    }

    #[tokio::test]
    async fn test_initialize_echoes_protocol_version() {
        let responses = server()
            .handle_message(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": { "protocolVersion": "2025-06-18" }
            }))
            .await;

        let result = &responses[0]["result"];
        assert_eq!(result["protocolVersion"], "2025-06-18");
        assert_eq!(result["serverInfo"]["name"], "aiprediction-mcp-server");
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["resources"].is_object());
    }

    #[tokio::test]
    async fn test_initialize_default_protocol_version() {
        let responses = server()
            .handle_message(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
            .await;
        assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let responses = server()
            .handle_message(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let responses = server()
            .handle_message(json!({"jsonrpc": "2.0", "id": 9, "method": "prompts/get"}))
            .await;
        assert_eq!(responses[0]["id"], 9);
        assert_eq!(responses[0]["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_wrong_jsonrpc_version() {
        let responses = server()
            .handle_message(json!({"jsonrpc": "1.0", "id": 2, "method": "ping"}))
            .await;
        assert_eq!(responses[0]["id"], 2);
        assert_eq!(responses[0]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_missing_method_with_id() {
        let responses = server()
            .handle_message(json!({"jsonrpc": "2.0", "id": 11, "method": 42}))
            .await;
        assert_eq!(responses[0]["id"], 11);
        assert_eq!(responses[0]["error"]["code"], -32600);

        let responses = server()
            .handle_message(json!({"jsonrpc": "2.0", "id": 12}))
            .await;
        assert_eq!(responses[0]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_client_response_and_bare_object_are_ignored() {
        let responses = server()
            .handle_message(json!({"jsonrpc": "2.0", "id": 3, "result": {}}))
            .await;
        assert!(responses.is_empty());

        let responses = server().handle_message(json!({"jsonrpc": "2.0"})).await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_line() {
        let responses = server().handle_line("{not json").await;
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_batch() {
        let responses = server()
            .handle_message(json!([
                {"jsonrpc": "2.0", "id": 1, "method": "ping"},
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "id": 2, "method": "tools/list"}
            ]))
            .await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 4);

        let empty = server().handle_message(json!([])).await;
        assert_eq!(empty[0]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_tools_call_requires_name() {
        let responses = server()
            .handle_message(json!({
                "jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {}
            }))
            .await;
        assert_eq!(responses[0]["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_tools_call_rejects_non_object_arguments() {
        let responses = server()
            .handle_message(json!({
                "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                "params": { "name": "get_api_debug_info", "arguments": [1, 2] }
            }))
            .await;
        assert_eq!(responses[0]["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_tools_call_debug_info() {
        let responses = server()
            .handle_message(json!({
                "jsonrpc": "2.0", "id": 4, "method": "tools/call",
                "params": { "name": "get_api_debug_info" }
            }))
            .await;

        let result = &responses[0]["result"];
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(text).unwrap(), json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_resources_read() {
        let responses = server()
            .handle_message(json!({
                "jsonrpc": "2.0", "id": 5, "method": "resources/read",
                "params": { "uri": "aiprediction://debug-info" }
            }))
            .await;

        let contents = &responses[0]["result"]["contents"][0];
        assert_eq!(contents["uri"], "aiprediction://debug-info");
        assert_eq!(contents["mimeType"], "application/json");
    }

    #[tokio::test]
    async fn test_resources_read_unknown_uri() {
        let responses = server()
            .handle_message(json!({
                "jsonrpc": "2.0", "id": 6, "method": "resources/read",
                "params": { "uri": "file:///etc/passwd" }
            }))
            .await;
        assert_eq!(responses[0]["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_serve_over_duplex() {
        let (client, server_side) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_side);

        let handle = tokio::spawn(async move {
            server()
                .serve(BufReader::new(server_read), server_write)
                .await
        });

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(
                b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\n\
                  {\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n\
                  {\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"resources/list\"}\n",
            )
            .await
            .unwrap();
        client_write.shutdown().await.unwrap();
        drop(client_write);

        let mut lines = BufReader::new(client_read).lines();
        let first: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        let second: Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();

        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
        assert_eq!(second["result"]["resources"].as_array().unwrap().len(), 2);

        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_serve_survives_invalid_utf8() {
        let input: &[u8] = b"\xff\xfe garbage\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
        let mut out = Vec::new();

        server().serve(BufReader::new(input), &mut out).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[1]["id"], 1);
        assert_eq!(responses[1]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_serve_final_line_without_newline() {
        let input: &[u8] = b"{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}\r\n{\"jsonrpc\":\"2.0\",\"id\":8,\"method\":\"ping\"}";
        let mut out = Vec::new();

        server().serve(BufReader::new(input), &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let ids: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap()["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(7), json!(8)]);
    }
}
