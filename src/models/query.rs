//! Query-related data models.

use serde_json::Value as JsonValue;

/// One result row: column name to value, in the order the database returned
/// the columns.
pub type Row = serde_json::Map<String, JsonValue>;
