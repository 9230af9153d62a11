//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The session contract consumed by the tool handlers
//! - The PostgreSQL session source (sqlx pool)
//! - Row to JSON type mappings

pub mod postgres;
pub mod session;
pub mod types;

pub use postgres::{PgSession, PgSessionPool};
pub use session::{Session, SessionError, SessionGuard, SessionSource};
