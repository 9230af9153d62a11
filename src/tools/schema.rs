//! Schema introspection tools.
//!
//! This module implements the `listTables` and `getTableSchema` MCP tools on
//! top of PostgreSQL's `information_schema` views.

use crate::db::session::{SessionError, SessionSource};
use crate::error::{DEFAULT_ERROR_MESSAGE, ErrorCode, QueryError};
use crate::models::{ColumnInfo, Row, TableInfo};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info};

/// Lists the tables of the `public` schema.
pub const LIST_TABLES_SQL: &str =
    "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'";

/// Describes the columns of one table (`$1` is the table name).
pub const DESCRIBE_COLUMNS_SQL: &str =
    "SELECT column_name, data_type FROM information_schema.columns WHERE table_name = $1";

/// Input for the getTableSchema tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetTableSchemaInput {
    /// Table name to get schema for
    pub table_name: String,
}

/// Handler for schema introspection tools.
pub struct SchemaToolHandler<S> {
    source: Arc<S>,
}

impl<S: SessionSource> SchemaToolHandler<S> {
    /// Create a new schema tool handler.
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// List the tables of the `public` schema, in catalog order.
    ///
    /// An empty schema is a successful, empty list.
    pub async fn list_tables(&self) -> Result<Vec<TableInfo>, QueryError> {
        let rows = self.fetch(LIST_TABLES_SQL, &[]).await.map_err(|e| {
            QueryError::from_failure(ErrorCode::ListTablesError, &e, DEFAULT_ERROR_MESSAGE)
        })?;

        let tables: Vec<TableInfo> = rows
            .iter()
            .map(|row| TableInfo::new(column_text(row, "table_name")))
            .collect();

        info!(count = tables.len(), "Listed tables");
        Ok(tables)
    }

    /// Describe the columns of `table_name`.
    ///
    /// Zero matching columns means the table does not exist and yields
    /// `TABLE_NOT_FOUND`, never an empty success.
    pub async fn get_table_schema(&self, table_name: &str) -> Result<Vec<ColumnInfo>, QueryError> {
        let rows = self
            .fetch(DESCRIBE_COLUMNS_SQL, &[table_name])
            .await
            .map_err(|e| {
                QueryError::from_failure(ErrorCode::GetSchemaError, &e, DEFAULT_ERROR_MESSAGE)
            })?;

        if rows.is_empty() {
            info!(table = %table_name, "Table not found");
            return Err(QueryError::table_not_found(table_name));
        }

        let columns: Vec<ColumnInfo> = rows
            .iter()
            .map(|row| {
                ColumnInfo::new(column_text(row, "column_name"), column_text(row, "data_type"))
            })
            .collect();

        info!(table = %table_name, columns = columns.len(), "Described table");
        Ok(columns)
    }

    /// Run one catalog statement on a fresh session, released on return.
    async fn fetch(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>, SessionError<S>> {
        let mut session = self.source.checkout().await?;
        debug!(sql = %sql, params = params.len(), "Executing catalog query");
        session.execute(sql, params).await
    }
}

/// Read a column as text. Catalog columns are never NULL.
fn column_text(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
