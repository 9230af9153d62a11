//! Session acquisition contract.
//!
//! A [`SessionSource`] hands out exclusive [`Session`]s. Tool handlers never
//! touch the pool directly: they check a session out, run their statements on
//! it sequentially and let the [`SessionGuard`] give it back.

use crate::error::FailureDetails;
use crate::models::Row;
use std::fmt;
use std::future::Future;
use tracing::debug;

/// An exclusive, stateful handle to one database connection.
pub trait Session: Send {
    /// Failure raised by acquisition or statement execution.
    type Error: FailureDetails + fmt::Display + fmt::Debug + Send;

    /// Run one statement and return its rows in database order.
    ///
    /// `sql` is sent unmodified as a single statement; `params` bind to
    /// `$1`, `$2`, ... as text.
    fn execute(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send;

    /// Mark the connection as unusable: release closes it instead of
    /// returning it to the pool.
    fn discard(&mut self);

    /// Return the connection to its pool. Never fails and is a no-op after
    /// the first call.
    fn release(&mut self);
}

/// Something that hands out sessions, typically a connection pool.
pub trait SessionSource: Send + Sync {
    type Session: Session;

    /// Acquire an exclusive session.
    fn acquire(
        &self,
    ) -> impl Future<Output = Result<Self::Session, <Self::Session as Session>::Error>> + Send;

    /// Acquire a session already wrapped in a [`SessionGuard`].
    fn checkout(
        &self,
    ) -> impl Future<
        Output = Result<SessionGuard<Self::Session>, <Self::Session as Session>::Error>,
    > + Send {
        async move { self.acquire().await.map(SessionGuard::new) }
    }
}

/// Failure type of the sessions handed out by a source.
pub type SessionError<S> = <<S as SessionSource>::Session as Session>::Error;

/// Scope guard releasing its session exactly once, when dropped.
///
/// Created immediately after acquisition so every exit path, including early
/// returns and panics in cleanup code, gives the session back.
pub struct SessionGuard<S: Session> {
    session: S,
}

impl<S: Session> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    /// Run a statement on the guarded session.
    pub async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, S::Error> {
        self.session.execute(sql, params).await
    }

    /// Close the connection on release instead of pooling it.
    pub fn discard(&mut self) {
        self.session.discard();
    }
}

impl<S: Session> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.session.release();
        debug!("Session released");
    }
}

impl<S: Session> fmt::Debug for SessionGuard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSession {
        releases: Arc<AtomicUsize>,
        released: bool,
    }

    impl Session for CountingSession {
        type Error = DbError;

        async fn execute(&mut self, _sql: &str, _params: &[&str]) -> Result<Vec<Row>, DbError> {
            Err(DbError::internal("no database"))
        }

        fn discard(&mut self) {}

        fn release(&mut self) {
            if !self.released {
                self.released = true;
                self.releases.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct CountingSource {
        releases: Arc<AtomicUsize>,
    }

    impl SessionSource for CountingSource {
        type Session = CountingSession;

        async fn acquire(&self) -> Result<CountingSession, DbError> {
            Ok(CountingSession {
                releases: self.releases.clone(),
                released: false,
            })
        }
    }

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let releases = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            releases: releases.clone(),
        };

        {
            let mut guard = source.checkout().await.unwrap();
            assert!(guard.execute("SELECT 1", &[]).await.is_err());
            assert_eq!(releases.load(Ordering::SeqCst), 0);
        }

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guard_releases_on_early_return() {
        async fn failing(source: &CountingSource) -> Result<(), DbError> {
            let mut guard = source.checkout().await?;
            guard.execute("SELECT 1", &[]).await?;
            Ok(())
        }

        let releases = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            releases: releases.clone(),
        };

        assert!(failing(&source).await.is_err());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
