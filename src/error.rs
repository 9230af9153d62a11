//! Error types for the PostgreSQL MCP server.
//!
//! Two layers live here:
//! - [`DbError`]: infrastructure failures (connection, driver, configuration),
//!   built with `thiserror` and converted from `sqlx::Error`.
//! - [`QueryError`]: the stable `{ code, message, detail? }` record every tool
//!   operation reports. It is produced by normalizing an arbitrary failure
//!   through the [`FailureDetails`] capability trait.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Message used by the query guard when a failure carries no message.
pub const DEFAULT_QUERY_ERROR_MESSAGE: &str = "Unknown query error";

/// Message used by schema introspection when a failure carries no message.
pub const DEFAULT_ERROR_MESSAGE: &str = "Unknown error";

// =============================================================================
// Failure capability
// =============================================================================

/// What a failure value is able to tell about itself.
///
/// Normalization never depends on a concrete error type. A failure either
/// exposes a message (and possibly a vendor-supplied detail) or it does not,
/// in which case the caller's default message is substituted.
pub trait FailureDetails {
    /// Human-readable message, if the failure carries one.
    fn message(&self) -> Option<Cow<'_, str>> {
        None
    }

    /// Vendor-specific elaboration (PostgreSQL `DETAIL`), if supplied.
    fn detail(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// QueryError
// =============================================================================

/// Fixed enumeration of error codes reported by the tool operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ListTablesError,
    GetSchemaError,
    TableNotFound,
    QueryError,
    InvalidUri,
    UriParseError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListTablesError => "LIST_TABLES_ERROR",
            Self::GetSchemaError => "GET_SCHEMA_ERROR",
            Self::TableNotFound => "TABLE_NOT_FOUND",
            Self::QueryError => "QUERY_ERROR",
            Self::InvalidUri => "INVALID_URI",
            Self::UriParseError => "URI_PARSE_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error record returned by every tool operation.
///
/// `Display` renders the string surfaced to MCP clients:
/// `message`, followed by ` (detail)` when a detail is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({})", self.message, detail),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for QueryError {}

impl QueryError {
    /// Create an error with no detail.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach a detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Normalize an arbitrary failure into a `QueryError`.
    ///
    /// The message comes from the failure when it has a non-empty one, else
    /// `default_message`. The detail is carried verbatim when present.
    pub fn from_failure<F>(code: ErrorCode, failure: &F, default_message: &str) -> Self
    where
        F: FailureDetails + ?Sized,
    {
        let message = failure
            .message()
            .filter(|m| !m.is_empty())
            .map(Cow::into_owned)
            .unwrap_or_else(|| default_message.to_string());

        Self {
            code,
            message,
            detail: failure.detail().map(String::from),
        }
    }

    /// Table lookup found nothing.
    pub fn table_not_found(table_name: &str) -> Self {
        Self::new(
            ErrorCode::TableNotFound,
            format!("Table \"{}\" not found", table_name),
        )
    }

    /// Structured `data` payload attached to MCP errors.
    fn data(&self) -> serde_json::Value {
        match &self.detail {
            Some(detail) => serde_json::json!({ "code": self.code, "detail": detail }),
            None => serde_json::json!({ "code": self.code }),
        }
    }
}

impl FailureDetails for QueryError {
    fn message(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(&self.message))
    }

    fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// Convert a `QueryError` to MCP ErrorData, prefixing the message with the
/// tool-specific context (e.g. "Query error").
pub fn to_mcp_error(context: &str, err: &QueryError) -> rmcp::ErrorData {
    let message = format!("{}: {}", context, err);
    let data = Some(err.data());
    match err.code {
        ErrorCode::TableNotFound => rmcp::ErrorData::resource_not_found(message, data),
        ErrorCode::InvalidUri | ErrorCode::UriParseError => {
            rmcp::ErrorData::invalid_params(message, data)
        }
        ErrorCode::ListTablesError | ErrorCode::GetSchemaError | ErrorCode::QueryError => {
            rmcp::ErrorData::internal_error(message, data)
        }
    }
}

// =============================================================================
// DbError
// =============================================================================

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// PostgreSQL DETAIL field
        detail: Option<String>,
    },

    #[error("Timeout: {operation} timed out")]
    Timeout { operation: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with an optional detail.
    pub fn database(message: impl Into<String>, detail: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            detail,
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }
}

impl FailureDetails for DbError {
    fn message(&self) -> Option<Cow<'_, str>> {
        match self {
            // Raw server/driver text, without the variant prefix
            Self::Connection { message, .. }
            | Self::Database { message, .. }
            | Self::Internal { message } => Some(Cow::Borrowed(message)),
            Self::Timeout { .. } => Some(Cow::Owned(self.to_string())),
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            Self::Database { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let detail = db_err
                    .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                    .and_then(|pg| pg.detail())
                    .map(String::from);
                DbError::database(db_err.message(), detail)
            }
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire"),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Restart the server")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::internal(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Convert DbError to MCP ErrorData.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = err
            .suggestion()
            .map(|s| serde_json::json!({ "suggestion": s }));
        rmcp::ErrorData::internal_error(err.to_string(), data)
    }
}

/// Failure of a guarded query.
///
/// Acquisition failure is kept apart from the normalized [`QueryError`]: no
/// session was obtained, so nothing was executed or released.
#[derive(Debug, Error)]
pub enum GuardError<E> {
    #[error(transparent)]
    Query(QueryError),

    #[error("Failed to acquire a database session: {0}")]
    Acquire(E),
}

impl<E> GuardError<E> {
    /// The normalized query error, if this is not an acquisition failure.
    pub fn as_query_error(&self) -> Option<&QueryError> {
        match self {
            Self::Query(err) => Some(err),
            Self::Acquire(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Opaque;

    impl FailureDetails for Opaque {}

    struct WithDetail;

    impl FailureDetails for WithDetail {
        fn message(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("duplicate key value violates unique constraint"))
        }

        fn detail(&self) -> Option<&str> {
            Some("Key (id)=(1) already exists.")
        }
    }

    #[test]
    fn test_error_code_serializes_as_literal() {
        let json = serde_json::to_value(ErrorCode::ListTablesError).unwrap();
        assert_eq!(json, "LIST_TABLES_ERROR");
        assert_eq!(ErrorCode::UriParseError.to_string(), "URI_PARSE_ERROR");
    }

    #[test]
    fn test_detail_omitted_when_absent() {
        let err = QueryError::new(ErrorCode::QueryError, "Syntax error in SQL");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "QUERY_ERROR");
        assert_eq!(json["message"], "Syntax error in SQL");
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn test_display_appends_detail_in_parentheses() {
        let err = QueryError::new(ErrorCode::QueryError, "failed").with_detail("constraint x");
        assert_eq!(err.to_string(), "failed (constraint x)");
        assert_eq!(QueryError::new(ErrorCode::QueryError, "failed").to_string(), "failed");
    }

    #[test]
    fn test_from_failure_uses_default_for_opaque_value() {
        let err =
            QueryError::from_failure(ErrorCode::QueryError, &Opaque, DEFAULT_QUERY_ERROR_MESSAGE);
        assert_eq!(err.message, "Unknown query error");
        assert_eq!(err.detail, None);
    }

    #[test]
    fn test_from_failure_carries_detail() {
        let err = QueryError::from_failure(
            ErrorCode::QueryError,
            &WithDetail,
            DEFAULT_QUERY_ERROR_MESSAGE,
        );
        assert_eq!(err.message, "duplicate key value violates unique constraint");
        assert_eq!(err.detail.as_deref(), Some("Key (id)=(1) already exists."));
    }

    #[test]
    fn test_schema_code_keeps_detail() {
        let err =
            QueryError::from_failure(ErrorCode::GetSchemaError, &WithDetail, DEFAULT_ERROR_MESSAGE);
        assert_eq!(err.code, ErrorCode::GetSchemaError);
        assert_eq!(err.detail.as_deref(), Some("Key (id)=(1) already exists."));
    }

    #[test]
    fn test_empty_message_falls_back_to_default() {
        let origin = DbError::internal("");
        let err =
            QueryError::from_failure(ErrorCode::ListTablesError, &origin, DEFAULT_ERROR_MESSAGE);
        assert_eq!(err.message, "Unknown error");
    }

    #[test]
    fn test_db_error_exposes_raw_message_and_detail() {
        let origin = DbError::database(
            "null value in column \"name\"",
            Some("Failing row contains (1, null).".to_string()),
        );
        assert_eq!(origin.message().as_deref(), Some("null value in column \"name\""));
        assert_eq!(origin.detail(), Some("Failing row contains (1, null)."));
    }

    #[test]
    fn test_table_not_found_message() {
        let err = QueryError::table_not_found("users");
        assert_eq!(err.code, ErrorCode::TableNotFound);
        assert_eq!(err.message, "Table \"users\" not found");
    }

    #[test]
    fn test_mcp_error_prefix_and_category() {
        let err = QueryError::new(ErrorCode::QueryError, "boom").with_detail("why");
        let mcp_err = to_mcp_error("Query error", &err);
        assert_eq!(mcp_err.message, "Query error: boom (why)");
        // internal_error uses -32603
        assert_eq!(mcp_err.code.0, -32603);
        let data = mcp_err.data.unwrap();
        assert_eq!(data["code"], "QUERY_ERROR");
        assert_eq!(data["detail"], "why");
    }

    #[test]
    fn test_table_not_found_maps_to_resource_not_found() {
        let mcp_err = to_mcp_error("Failed to get table schema", &QueryError::table_not_found("t"));
        // resource_not_found uses -32002 in rmcp
        assert_eq!(mcp_err.code.0, -32002);
    }

    #[test]
    fn test_invalid_uri_maps_to_invalid_params() {
        let err = QueryError::new(ErrorCode::InvalidUri, "Invalid resource URI format");
        let mcp_err = to_mcp_error("Invalid resource", &err);
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_connection_error_includes_suggestion_in_data() {
        let err = DbError::connection("failed", "try reconnecting");
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32603);
        assert_eq!(mcp_err.data.unwrap()["suggestion"], "try reconnecting");
    }

    #[test]
    fn test_guard_error_display() {
        let err: GuardError<DbError> =
            GuardError::Acquire(DbError::connection("refused", "check server"));
        assert!(err.as_query_error().is_none());
        assert!(err.to_string().contains("Failed to acquire a database session"));

        let err: GuardError<DbError> =
            GuardError::Query(QueryError::new(ErrorCode::QueryError, "bad"));
        assert_eq!(err.to_string(), "bad");
    }
}
