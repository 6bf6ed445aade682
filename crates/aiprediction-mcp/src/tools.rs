//! Tool catalog and execution
//!
//! Every tool answers with pretty-printed JSON text. Failures never become
//! JSON-RPC errors; they come back as `Error: ...` text flagged `is_error`.

use aiprediction_client::PredictionApi;
use aiprediction_core::{normalize, DateId, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const GET_LAST_ELEMENTS_BY_DATE: &str = "get_last_elements_by_date";
pub const GET_CURRENT_DATE_DATA: &str = "get_current_date_data";
pub const GET_API_DEBUG_INFO: &str = "get_api_debug_info";
pub const FORMAT_DATE_YYMMDD: &str = "format_date_yymmdd";

/// Tool advertised through `tools/list`
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// All tools served by the bridge
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: GET_LAST_ELEMENTS_BY_DATE.to_string(),
            description: "Get last elements for a specific date (YYMMDD format)".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": {
                        "type": "string",
                        "description": "Date in YYMMDD format (e.g., '241213' for Dec 13, 2024). Leave empty for current date.",
                        "pattern": "^[0-9]{6}$"
                    },
                    "year": {
                        "type": "integer",
                        "description": "Year (2024, 24, etc.) - alternative to date parameter"
                    },
                    "month": {
                        "type": "integer",
                        "description": "Month (1-12) - use with year and day"
                    },
                    "day": {
                        "type": "integer",
                        "description": "Day (1-31) - use with year and month"
                    }
                }
            }),
        },
        ToolDefinition {
            name: GET_CURRENT_DATE_DATA.to_string(),
            description: "Get last elements for today's date".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: GET_API_DEBUG_INFO.to_string(),
            description: "Get debug information about the API and V53a model".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: FORMAT_DATE_YYMMDD.to_string(),
            description: "Convert a date to YYMMDD format".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "year": {
                        "type": "integer",
                        "description": "Year (e.g., 2024, 24)"
                    },
                    "month": {
                        "type": "integer",
                        "description": "Month (1-12)"
                    },
                    "day": {
                        "type": "integer",
                        "description": "Day (1-31)"
                    }
                },
                "required": ["year", "month", "day"]
            }),
        },
    ]
}

#[derive(Debug, Default, Deserialize)]
struct DateArgs {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    month: Option<u32>,
    #[serde(default)]
    day: Option<u32>,
}

impl DateArgs {
    fn parse(input: &Value) -> Result<Self> {
        if input.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(input.clone())
            .map_err(|e| Error::Validation(format!("Invalid arguments: {}", e)))
    }

    /// Explicit date string first, then year/month/day, then today
    fn resolve(&self) -> Result<DateId> {
        match self.date.as_deref().map(str::trim) {
            Some(date) if !date.is_empty() => date.parse(),
            _ => normalize(self.year, self.month, self.day),
        }
    }
}

/// Outcome of a tool call, rendered as a single text content block
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn to_value(&self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.text }],
            "isError": self.is_error
        })
    }
}

/// Runs tools against a prediction API
pub struct ToolExecutor {
    api: Arc<dyn PredictionApi>,
}

impl ToolExecutor {
    pub fn new(api: Arc<dyn PredictionApi>) -> Self {
        Self { api }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, input: &Value) -> ToolOutput {
        debug!("Executing tool {} with input {:?}", name, input);

        let result = match name {
            GET_LAST_ELEMENTS_BY_DATE => self.last_elements_by_date(input).await,
            GET_CURRENT_DATE_DATA => self.current_date_data().await,
            GET_API_DEBUG_INFO => self.api.get_debug_info().await,
            FORMAT_DATE_YYMMDD => format_date(input),
            _ => Err(Error::Validation(format!("Unknown tool: {}", name))),
        };

        let rendered =
            result.and_then(|value| serde_json::to_string_pretty(&value).map_err(Error::from));

        match rendered {
            Ok(text) => ToolOutput {
                text,
                is_error: false,
            },
            Err(e) => {
                warn!(category = e.category(), "Tool {} failed: {}", name, e);
                ToolOutput {
                    text: format!("Error: {}", e),
                    is_error: true,
                }
            }
        }
    }

    async fn last_elements_by_date(&self, input: &Value) -> Result<Value> {
        let did = DateArgs::parse(input)?.resolve()?;
        let data = self.api.get_last_elements(&did).await?;
        Ok(json!({
            "requested_date": did,
            "data": data
        }))
    }

    async fn current_date_data(&self) -> Result<Value> {
        let did = DateId::today();
        let data = self.api.get_last_elements(&did).await?;
        Ok(json!({
            "current_date": did,
            "data": data
        }))
    }
}

fn format_date(input: &Value) -> Result<Value> {
    let args = DateArgs::parse(input)?;
    let (Some(year), Some(month), Some(day)) = (args.year, args.month, args.day) else {
        return Err(Error::Validation(
            "year, month and day are all required".to_string(),
        ));
    };

    let formatted = normalize(Some(year), Some(month), Some(day))?;
    Ok(json!({
        "input": { "year": year, "month": month, "day": day },
        "formatted_date": formatted
    }))
}
