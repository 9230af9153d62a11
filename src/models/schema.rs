//! Schema-related data models.
//!
//! This module defines the records produced by schema introspection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A table in the `public` schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub table_name: String,
}

impl TableInfo {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }
}

/// A column of a table.
///
/// `data_type` is PostgreSQL's own type name (`integer`, `character varying`, ...),
/// passed through as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(column_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_info_serializes_camel_case() {
        let json = serde_json::to_value(TableInfo::new("users")).unwrap();
        assert_eq!(json, serde_json::json!({ "tableName": "users" }));
    }

    #[test]
    fn test_column_info_serializes_camel_case() {
        let json = serde_json::to_value(ColumnInfo::new("name", "character varying")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "columnName": "name", "dataType": "character varying" })
        );
    }
}
