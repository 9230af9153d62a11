//! MCP tool implementations.
//!
//! This module contains the database tool handlers:
//! - `query`: Execute a statement inside an always-rolled-back read-only transaction
//! - `schema`: List tables and describe a table's columns
//! - `resource`: Resolve table schema resource locators

pub mod query;
pub mod resource;
pub mod schema;

pub use query::{QueryInput, QueryToolHandler};
pub use resource::{parse_resource_uri, schema_resource_uri};
pub use schema::{GetTableSchemaInput, SchemaToolHandler};
