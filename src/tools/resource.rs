//! Table schema resource locators.
//!
//! A table's schema is addressed as `scheme://host[:port]/.../<table>/schema`.
//! Only the last two path segments matter: the fixed `schema` literal and the
//! table name before it. The table segment is percent-encoded on the way out
//! and decoded on the way in, so any table name survives the round trip.

use crate::error::{ErrorCode, QueryError};
use percent_encoding::percent_decode_str;
use url::Url;

/// Final path segment of every table schema locator.
pub const SCHEMA_PATH: &str = "schema";

/// Resolve a schema resource locator to its table name.
///
/// # Errors
///
/// - `URI_PARSE_ERROR` when `uri` is not a URI at all
/// - `INVALID_URI` when the last segment is not `schema`, or the table name is
///   empty or not UTF-8 once decoded
///
/// # Examples
///
/// ```
/// use pg_mcp_server::tools::resource::parse_resource_uri;
///
/// assert_eq!(parse_resource_uri("postgres://localhost/users/schema").unwrap(), "users");
/// assert_eq!(parse_resource_uri("postgres://localhost/my%20table/schema").unwrap(), "my table");
/// assert!(parse_resource_uri("postgres://localhost//schema").is_err());
/// ```
pub fn parse_resource_uri(uri: &str) -> Result<String, QueryError> {
    let url = Url::parse(uri).map_err(|e| {
        tracing::debug!(uri = %uri, error = %e, "Unparseable resource URI");
        QueryError::new(ErrorCode::UriParseError, "Failed to parse resource URI")
    })?;

    let mut segments = url.path().rsplit('/');
    let schema = segments.next();
    let table_name = segments.next().filter(|name| !name.is_empty());

    match (schema, table_name) {
        (Some(SCHEMA_PATH), Some(table_name)) => percent_decode_str(table_name)
            .decode_utf8()
            .map(|name| name.into_owned())
            .map_err(|_| invalid_uri()),
        _ => Err(invalid_uri()),
    }
}

/// Build the schema locator of `table_name` under `base`
/// (e.g. `postgres://host/db`).
///
/// Reserved characters in the table name (`/`, `?`, `#`, `%`, spaces) are
/// percent-encoded. A name the path cannot carry (empty, `.` or `..`) is
/// rejected with `INVALID_URI`.
pub fn schema_resource_uri(base: &str, table_name: &str) -> Result<String, QueryError> {
    if matches!(table_name, "" | "." | "..") {
        return Err(invalid_uri());
    }

    let mut url = Url::parse(base)
        .map_err(|_| QueryError::new(ErrorCode::UriParseError, "Failed to parse resource URI"))?;
    url.path_segments_mut()
        .map_err(|()| invalid_uri())?
        .pop_if_empty()
        .push(table_name)
        .push(SCHEMA_PATH);

    Ok(url.into())
}

fn invalid_uri() -> QueryError {
    QueryError::new(ErrorCode::InvalidUri, "Invalid resource URI format")
}
