//! Scoped connection borrowing.
//!
//! A [`PoolHandle`] wraps the driver pool together with the sizing it was
//! built with and a pair of borrow counters. Connections leave the pool only
//! inside a [`BorrowedConnection`] guard, which records the return when it is
//! dropped. Dropping happens on every exit path of the borrowing future:
//! normal completion, an error, a panic unwinding through it, or the future
//! itself being dropped because the caller was cancelled.

use crate::error::{DbError, DbResult};
use sqlx::PgPool;
use sqlx::pool::PoolConnection;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// A pool that hands out connections.
///
/// Implemented for `sqlx::PgPool`; tests provide in-memory sources.
pub trait ConnectionSource: Send + Sync + 'static {
    type Connection: Send;

    /// Wait for a free connection. Returning the connection to the pool is the
    /// job of `Self::Connection`'s destructor.
    fn acquire(&self) -> impl Future<Output = DbResult<Self::Connection>> + Send;

    /// Close the pool, waiting for checked-out connections to come back.
    fn close(&self) -> impl Future<Output = ()> + Send;

    /// Open connections (idle + in use), when the source can tell.
    fn size(&self) -> Option<u32> {
        None
    }

    /// Idle connections, when the source can tell.
    fn num_idle(&self) -> Option<usize> {
        None
    }
}

impl ConnectionSource for PgPool {
    type Connection = PoolConnection<sqlx::Postgres>;

    async fn acquire(&self) -> DbResult<Self::Connection> {
        PgPool::acquire(self).await.map_err(DbError::from)
    }

    async fn close(&self) {
        PgPool::close(self).await
    }

    fn size(&self) -> Option<u32> {
        Some(PgPool::size(self))
    }

    fn num_idle(&self) -> Option<usize> {
        Some(PgPool::num_idle(self))
    }
}

/// Counters for connections leaving and re-entering the pool.
#[derive(Debug, Default)]
pub struct BorrowStats {
    borrowed: AtomicU64,
    returned: AtomicU64,
}

impl BorrowStats {
    fn record_borrow(&self) {
        self.borrowed.fetch_add(1, Ordering::AcqRel);
    }

    fn record_return(&self) {
        self.returned.fetch_add(1, Ordering::AcqRel);
    }

    pub fn borrowed(&self) -> u64 {
        self.borrowed.load(Ordering::Acquire)
    }

    pub fn returned(&self) -> u64 {
        self.returned.load(Ordering::Acquire)
    }

    /// Connections currently held by callers.
    pub fn checked_out(&self) -> u64 {
        // Read returned first so a concurrent borrow+return cannot make it negative
        let returned = self.returned();
        self.borrowed().saturating_sub(returned)
    }
}

/// Shared handle to a live pool.
pub struct PoolHandle<S> {
    source: S,
    min_connections: u32,
    max_connections: u32,
    command_timeout: Duration,
    created_at: Instant,
    stats: BorrowStats,
}

impl<S: ConnectionSource> PoolHandle<S> {
    pub fn new(
        source: S,
        min_connections: u32,
        max_connections: u32,
        command_timeout: Duration,
    ) -> Self {
        Self {
            source,
            min_connections,
            max_connections,
            command_timeout,
            created_at: Instant::now(),
            stats: BorrowStats::default(),
        }
    }

    /// The underlying driver pool.
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn min_connections(&self) -> u32 {
        self.min_connections
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn stats(&self) -> &BorrowStats {
        &self.stats
    }

    /// Check out one connection. It goes back to the pool when the guard drops.
    pub async fn borrow_connection(&self) -> DbResult<BorrowedConnection<'_, S>> {
        let connection = self.source.acquire().await?;
        self.stats.record_borrow();
        trace!(checked_out = self.stats.checked_out(), "Connection borrowed");
        Ok(BorrowedConnection {
            connection,
            stats: &self.stats,
        })
    }
}

impl<S> std::fmt::Debug for PoolHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle")
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .field("command_timeout", &self.command_timeout)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// A connection checked out for a single statement.
pub struct BorrowedConnection<'h, S: ConnectionSource> {
    connection: S::Connection,
    stats: &'h BorrowStats,
}

impl<S: ConnectionSource> Deref for BorrowedConnection<'_, S> {
    type Target = S::Connection;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl<S: ConnectionSource> DerefMut for BorrowedConnection<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connection
    }
}

/// Counts the connection as returned. The driver may still be draining the
/// rest of a dropped statement's response, or closing a connection marked
/// close-on-drop, so `checked_out` can read 0 briefly before the pool slot
/// is actually free. With the server-side `statement_timeout` in place that
/// window is bounded by the command timeout.
impl<S: ConnectionSource> Drop for BorrowedConnection<'_, S> {
    fn drop(&mut self) {
        // The connection field is dropped right after this, handing it back
        // to the driver pool.
        self.stats.record_return();
        trace!(checked_out = self.stats.checked_out(), "Connection returned");
    }
}

/// Run `operation` with one connection borrowed from `handle`.
///
/// The connection is moved into the operation and released when the
/// operation's future finishes or is dropped. Failures propagate unchanged;
/// nothing is retried.
pub async fn with_connection<'h, S, F, Fut, T>(handle: &'h PoolHandle<S>, operation: F) -> DbResult<T>
where
    S: ConnectionSource,
    F: FnOnce(BorrowedConnection<'h, S>) -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let connection = handle.borrow_connection().await?;
    operation(connection).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::{OwnedSemaphorePermit, Semaphore};

    struct SemaphoreSource {
        permits: Arc<Semaphore>,
    }

    impl ConnectionSource for SemaphoreSource {
        type Connection = OwnedSemaphorePermit;

        async fn acquire(&self) -> DbResult<Self::Connection> {
            Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| DbError::operation("source closed", None, ""))
        }

        async fn close(&self) {
            self.permits.close();
        }
    }

    fn handle(max: usize) -> PoolHandle<SemaphoreSource> {
        PoolHandle::new(
            SemaphoreSource {
                permits: Arc::new(Semaphore::new(max)),
            },
            1,
            max as u32,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_connection_returned_after_success() {
        let handle = handle(1);
        let value = with_connection(&handle, |_conn| async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(handle.stats().borrowed(), 1);
        assert_eq!(handle.stats().returned(), 1);
        assert_eq!(handle.source().permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_connection_returned_after_error() {
        let handle = handle(1);
        let result: DbResult<()> = with_connection(&handle, |_conn| async {
            Err(DbError::operation("boom", None, ""))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(handle.stats().checked_out(), 0);
        assert_eq!(handle.source().permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_connection_returned_when_future_dropped() {
        let handle = handle(1);
        let pending = with_connection(&handle, |_conn| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(20), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(handle.stats().borrowed(), 1);
        assert_eq!(handle.stats().returned(), 1);
        assert_eq!(handle.source().permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_acquire_failure_counts_nothing() {
        let handle = handle(1);
        handle.source().close().await;
        let result = with_connection(&handle, |_conn| async { Ok(()) }).await;
        assert!(matches!(result, Err(DbError::DatabaseOperationFailed { .. })));
        assert_eq!(handle.stats().borrowed(), 0);
        assert_eq!(handle.stats().returned(), 0);
    }

    #[test]
    fn test_default_sources_report_no_size() {
        let handle = handle(2);
        assert_eq!(handle.source().size(), None);
        assert_eq!(handle.source().num_idle(), None);
        assert_eq!(handle.max_connections(), 2);
    }
}
