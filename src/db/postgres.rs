//! PostgreSQL session source backed by an sqlx connection pool.

use crate::db::session::{Session, SessionSource};
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::Row;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Pool of PostgreSQL connections handing out [`PgSession`]s.
///
/// Sizing follows sqlx defaults. Connections are opened lazily on first
/// acquisition, so building the pool never touches the network.
#[derive(Debug, Clone)]
pub struct PgSessionPool {
    pool: PgPool,
}

impl PgSessionPool {
    /// Build a lazily-connecting pool from a connection URL.
    pub fn connect_lazy(connection_string: &str, acquire_timeout: Duration) -> DbResult<Self> {
        let options = PgConnectOptions::from_str(connection_string).map_err(DbError::from)?;
        let pool = PgPoolOptions::new()
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(options);

        info!(
            acquire_timeout_secs = acquire_timeout.as_secs(),
            "PostgreSQL pool created"
        );
        Ok(Self { pool })
    }

    /// Close every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl SessionSource for PgSessionPool {
    type Session = PgSession;

    async fn acquire(&self) -> DbResult<PgSession> {
        let conn = self.pool.acquire().await?;
        debug!(
            size = self.pool.size(),
            idle = self.pool.num_idle(),
            "Session acquired"
        );
        Ok(PgSession { conn: Some(conn) })
    }
}

/// One checked-out pool connection.
#[derive(Debug)]
pub struct PgSession {
    conn: Option<PoolConnection<Postgres>>,
}

impl Session for PgSession {
    type Error = DbError;

    async fn execute(&mut self, sql: &str, params: &[&str]) -> DbResult<Vec<Row>> {
        let conn = self
            .conn
            .as_deref_mut()
            .ok_or_else(|| DbError::internal("Session has already been released"))?;

        // Always the extended protocol: the server accepts exactly one
        // statement per prepared query. Caller text is not cached.
        let mut query = sqlx::query(sql).persistent(false);
        for param in params {
            query = query.bind(*param);
        }
        let rows = query.fetch_all(conn).await?;

        Ok(rows.iter().map(RowToJson::to_json_map).collect())
    }

    fn discard(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.close_on_drop();
        }
    }

    fn release(&mut self) {
        // Dropping a PoolConnection hands it back to the pool, or closes it
        // after discard()
        drop(self.conn.take());
    }
}
