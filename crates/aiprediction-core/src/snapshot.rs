//! Summaries of last-elements responses
//!
//! The bridge hands responses back verbatim; these helpers only read a few
//! well-known fields for diagnostics.

use serde_json::Value;

/// Diagnostic view of a `/last-elements/` response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotSummary {
    pub did: Option<String>,
    pub id: Option<String>,
    pub last_ctime: Option<String>,
    pub lookup_method: Option<String>,
    /// `(field, value)` pairs, ordered by field name
    pub fields: Vec<(String, Value)>,
}

impl SnapshotSummary {
    /// Read the summary fields out of a response body
    pub fn from_response(response: &Value) -> Self {
        let fields = response
            .get("last_elements")
            .and_then(Value::as_object)
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        Self {
            did: scalar(response, "DID"),
            id: scalar(response, "ID"),
            last_ctime: scalar(response, "last_ctime"),
            lookup_method: scalar(response, "lookup_method"),
            fields,
        }
    }

    pub fn total(&self) -> usize {
        self.fields.len()
    }

    pub fn non_null_count(&self) -> usize {
        self.fields.iter().filter(|(_, v)| !v.is_null()).count()
    }

    pub fn null_count(&self) -> usize {
        self.total() - self.non_null_count()
    }

    /// First `n` fields
    pub fn sample(&self, n: usize) -> &[(String, Value)] {
        &self.fields[..n.min(self.fields.len())]
    }

    /// First field that carries a value
    pub fn first_non_null(&self) -> Option<&(String, Value)> {
        self.fields.iter().find(|(_, v)| !v.is_null())
    }
}

fn scalar(response: &Value, key: &str) -> Option<String> {
    match response.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
