//! Query and feed types for the service boundary.
//!
//! # Responsibility
//! - Describe the supported filter shape: one field equals one scalar.
//! - Validate field names and partition key paths against a fixed grammar.
//! - Carry paging state (`FeedOptions`, `FeedPage`, continuation tokens).
//!
//! # Invariants
//! - Field paths and partition key paths only contain identifier segments,
//!   so they can be embedded into JSON paths without escaping.
//! - Filter values are JSON scalars.

use crate::client::{ClientError, ClientResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_MAX_ITEM_COUNT: u32 = 100;
const MAX_ITEM_COUNT_LIMIT: u32 = 1000;

static FIELD_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid field path regex")
});
static PARTITION_KEY_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(/[A-Za-z_][A-Za-z0-9_]*)+$").expect("valid partition key path regex")
});

/// Equality filter over one stored field.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    field: String,
    value: Value,
}

impl QuerySpec {
    /// Builds `field = value`.
    ///
    /// # Errors
    /// - `BadRequest` when `field` is not a dotted identifier path.
    /// - `BadRequest` when `value` is an array or object.
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> ClientResult<Self> {
        let field = field.into();
        validate_field_path(&field)?;
        let value = value.into();
        if value.is_array() || value.is_object() {
            return Err(ClientError::BadRequest(format!(
                "filter value for `{field}` must be a scalar"
            )));
        }
        Ok(Self { field, value })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// JSON path of the filtered field, e.g. `$.address.state`.
    pub fn json_path(&self) -> String {
        format!("$.{}", self.field)
    }

    /// SQL-style rendering used for logs and console output.
    pub fn query_text(&self) -> String {
        let literal = match &self.value {
            Value::String(text) => format!("'{}'", text.replace('\'', "''")),
            other => other.to_string(),
        };
        format!("SELECT * FROM c WHERE c.{} = {literal}", self.field)
    }
}

/// Paging options for query feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOptions {
    /// Maximum documents per page. `0` falls back to the default; larger
    /// values are clamped.
    pub max_item_count: u32,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            max_item_count: DEFAULT_MAX_ITEM_COUNT,
        }
    }
}

impl FeedOptions {
    pub fn with_max_item_count(max_item_count: u32) -> Self {
        Self { max_item_count }
    }

    /// Page size actually applied by the service.
    pub fn effective_max_item_count(&self) -> u32 {
        match self.max_item_count {
            0 => DEFAULT_MAX_ITEM_COUNT,
            value if value > MAX_ITEM_COUNT_LIMIT => MAX_ITEM_COUNT_LIMIT,
            value => value,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub items: Vec<Value>,
    /// Present when more pages may follow.
    pub continuation: Option<String>,
}

/// Position after the last document of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    #[serde(rename = "pk")]
    pub partition_key: String,
    pub id: String,
}

impl ContinuationToken {
    pub fn encode(&self) -> ClientResult<String> {
        serde_json::to_string(self)
            .map_err(|err| ClientError::InvalidData(format!("continuation encode failed: {err}")))
    }

    pub fn decode(raw: &str) -> ClientResult<Self> {
        serde_json::from_str(raw)
            .map_err(|_| ClientError::BadRequest(format!("malformed continuation token `{raw}`")))
    }
}

/// Checks a dotted field path such as `LastName` or `address.state`.
pub fn validate_field_path(field: &str) -> ClientResult<()> {
    if FIELD_PATH_RE.is_match(field) {
        Ok(())
    } else {
        Err(ClientError::BadRequest(format!(
            "invalid field path `{field}`"
        )))
    }
}

/// Checks a partition key path such as `/LastName`.
pub fn validate_partition_key_path(path: &str) -> ClientResult<()> {
    if PARTITION_KEY_PATH_RE.is_match(path) {
        Ok(())
    } else {
        Err(ClientError::BadRequest(format!(
            "invalid partition key path `{path}`"
        )))
    }
}

/// Resolves a partition key path inside a document.
///
/// Returns `None` when any segment is missing.
pub fn extract_at_path<'doc>(document: &'doc Value, path: &str) -> Option<&'doc Value> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(document, |current, segment| current.get(segment))
}
