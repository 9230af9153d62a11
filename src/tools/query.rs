//! Query execution tool.
//!
//! This module implements the `query` MCP tool. The caller's SQL is never
//! inspected: it runs inside a read-only transaction that is always rolled
//! back, so no statement can leave a persistent change behind. There is no
//! commit anywhere in this path.

use crate::db::session::{Session, SessionError, SessionGuard, SessionSource};
use crate::error::{DEFAULT_QUERY_ERROR_MESSAGE, ErrorCode, GuardError, QueryError};
use crate::models::Row;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Opens the read-only transaction wrapping the caller's statement.
pub const BEGIN_READ_ONLY_SQL: &str = "BEGIN TRANSACTION READ ONLY";

/// Undoes whatever the transaction did.
pub const ROLLBACK_SQL: &str = "ROLLBACK";

/// Input for the query tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// SQL query to execute
    pub sql: String,
}

impl QueryInput {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }
}

/// Handler for the query tool.
pub struct QueryToolHandler<S> {
    source: Arc<S>,
}

impl<S: SessionSource> QueryToolHandler<S> {
    /// Create a new query tool handler.
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Execute the caller's statement inside a read-only transaction.
    ///
    /// The statement sequence on the session is always `BEGIN TRANSACTION READ
    /// ONLY`, the caller's statement, `ROLLBACK`; the statement is skipped when
    /// the begin fails. A failing rollback is logged, discards the connection
    /// and never replaces the result. The session is released exactly once
    /// before returning.
    ///
    /// Failing to acquire a session is returned as [`GuardError::Acquire`];
    /// every other failure is normalized into a `QUERY_ERROR`.
    pub async fn execute_query(
        &self,
        input: &QueryInput,
    ) -> Result<Vec<Row>, GuardError<SessionError<S>>> {
        let start = Instant::now();

        let mut session = self.source.checkout().await.map_err(|e| {
            warn!(error = %e, "Failed to acquire session for query");
            GuardError::Acquire(e)
        })?;

        debug!(sql = %input.sql, "Executing query in read-only transaction");

        let outcome = run_read_only(&mut session, &input.sql).await;
        rollback(&mut session).await;
        drop(session);

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(rows) => {
                info!(
                    row_count = rows.len(),
                    execution_time_ms = elapsed_ms,
                    "Query executed"
                );
                Ok(rows)
            }
            Err(e) => {
                let err = QueryError::from_failure(
                    ErrorCode::QueryError,
                    &e,
                    DEFAULT_QUERY_ERROR_MESSAGE,
                );
                info!(
                    error = %err,
                    execution_time_ms = elapsed_ms,
                    "Query failed"
                );
                Err(GuardError::Query(err))
            }
        }
    }
}

/// Open the read-only transaction and run the statement in it.
async fn run_read_only<T: Session>(
    session: &mut SessionGuard<T>,
    sql: &str,
) -> Result<Vec<Row>, T::Error> {
    session.execute(BEGIN_READ_ONLY_SQL, &[]).await?;
    session.execute(sql, &[]).await
}

/// Roll back, even when the begin failed: a driver may have left a partially
/// opened transaction behind.
///
/// A connection whose rollback failed may still hold the transaction open, so
/// it is closed on release rather than handed to the next caller.
async fn rollback<T: Session>(session: &mut SessionGuard<T>) {
    if let Err(e) = session.execute(ROLLBACK_SQL, &[]).await {
        warn!(error = %e, "Could not roll back transaction");
        session.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_literals() {
        assert_eq!(BEGIN_READ_ONLY_SQL, "BEGIN TRANSACTION READ ONLY");
        assert_eq!(ROLLBACK_SQL, "ROLLBACK");
    }

    #[test]
    fn test_query_input_deserialize() {
        let input: QueryInput = serde_json::from_str(r#"{"sql": "SELECT 1"}"#).unwrap();
        assert_eq!(input.sql, "SELECT 1");
    }

    #[test]
    fn test_query_input_requires_sql() {
        assert!(serde_json::from_str::<QueryInput>("{}").is_err());
    }
}
