//! Query execution engine.
//!
//! Every call fetches the shared pool from the provider, borrows one
//! connection for exactly one statement and returns it on every exit path.
//! Statements without parameters go over the simple-query protocol, so
//! multi-statement scripts and utility commands work unchanged; statements
//! with parameters use the extended protocol with driver-bound arguments.
//!
//! The command timeout is enforced by the server through the
//! `statement_timeout` each pooled connection is opened with. The client-side
//! timer only fires when the server stays silent past that deadline plus
//! [`NO_RESPONSE_GRACE`], and the connection is then closed instead of being
//! returned to the pool.
//!
//! The executor performs no validation and never retries. Read-only policy
//! belongs to the caller.

use crate::db::borrow::with_connection;
use crate::db::provider::PoolProvider;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, QueryResult, RowRecord, StatementStatus};
use futures_util::StreamExt;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgConnection, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::{Connection, Executor, Postgres, Type};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Extra wait past the command timeout for the server's own cancellation.
pub const NO_RESPONSE_GRACE: Duration = Duration::from_secs(5);

/// Executes statements against the provider's pool.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    provider: Arc<PoolProvider>,
}

impl QueryExecutor {
    pub fn new(provider: Arc<PoolProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<PoolProvider> {
        &self.provider
    }

    /// Run a row-returning statement and materialize every row.
    ///
    /// Zero rows yields an empty vector. Column order is preserved in each
    /// record.
    pub async fn execute_query(&self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<RowRecord>> {
        Ok(self.fetch(sql, params, None).await?.rows)
    }

    /// [`execute_query`](Self::execute_query) that gives up when `ct` fires.
    pub async fn execute_query_cancellable(
        &self,
        sql: &str,
        params: &[QueryParam],
        ct: &CancellationToken,
    ) -> DbResult<Vec<RowRecord>> {
        cancellable(ct, "query execution", self.execute_query(sql, params)).await
    }

    /// Run a row-returning statement, keeping at most `limit` rows.
    ///
    /// One extra row is read to detect truncation; the rest of the result is
    /// never pulled from the server.
    pub async fn fetch(
        &self,
        sql: &str,
        params: &[QueryParam],
        limit: Option<u32>,
    ) -> DbResult<QueryResult> {
        self.fetch_with(sql, params, limit, false).await
    }

    /// [`fetch`](Self::fetch) inside a `READ ONLY` transaction that is always
    /// rolled back. The server refuses anything with side effects, including
    /// functions such as `nextval()` or `set_config()`, with SQLSTATE 25006.
    pub async fn fetch_read_only(
        &self,
        sql: &str,
        params: &[QueryParam],
        limit: Option<u32>,
    ) -> DbResult<QueryResult> {
        self.fetch_with(sql, params, limit, true).await
    }

    async fn fetch_with(
        &self,
        sql: &str,
        params: &[QueryParam],
        limit: Option<u32>,
        read_only: bool,
    ) -> DbResult<QueryResult> {
        let start = Instant::now();
        let handle = self.provider.get_pool().await?;
        let command_timeout = handle.command_timeout();
        let deadline = command_timeout + NO_RESPONSE_GRACE;
        let fetch_limit = limit.map(|l| l as usize + 1);

        debug!(
            sql = %sql,
            params = params.len(),
            limit = ?limit,
            read_only,
            timeout_secs = command_timeout.as_secs(),
            "Executing query"
        );

        let rows = with_connection(&handle, |mut conn| async move {
            let connection: &mut PgConnection = &mut conn;
            let fetched = if read_only {
                // Dropping the transaction without commit rolls it back
                let mut tx = connection
                    .begin_with("BEGIN READ ONLY")
                    .await
                    .map_err(DbError::from)?;
                let fetched = timeout(deadline, fetch_rows(&mut tx, sql, params, fetch_limit)).await;
                if fetched.is_ok() {
                    tx.rollback().await.map_err(DbError::from)?;
                }
                fetched
            } else {
                timeout(deadline, fetch_rows(connection, sql, params, fetch_limit)).await
            };

            match fetched {
                Ok(results) => collect_rows(results),
                Err(_) => {
                    conn.close_on_drop();
                    Err(no_response_error("query execution", deadline))
                }
            }
        })
        .await?;

        Ok(process_rows(rows, limit, start))
    }

    /// Run a statement that returns no rows and report its status.
    pub async fn execute_statement(
        &self,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<StatementStatus> {
        let start = Instant::now();
        let handle = self.provider.get_pool().await?;
        let command_timeout = handle.command_timeout();
        let deadline = command_timeout + NO_RESPONSE_GRACE;

        debug!(
            sql = %sql,
            params = params.len(),
            timeout_secs = command_timeout.as_secs(),
            "Executing statement"
        );

        let rows_affected = with_connection(&handle, |mut conn| async move {
            let connection: &mut PgConnection = &mut conn;
            let result = if params.is_empty() {
                timeout(deadline, connection.execute(sql)).await
            } else {
                timeout(deadline, build_query(sql, params).execute(connection)).await
            };

            match result {
                Ok(Ok(r)) => Ok(r.rows_affected()),
                Ok(Err(e)) => Err(DbError::from(e)),
                Err(_) => {
                    conn.close_on_drop();
                    Err(no_response_error("statement execution", deadline))
                }
            }
        })
        .await?;

        let execution_time_ms = start.elapsed().as_millis() as u64;
        Ok(StatementStatus::new(sql, rows_affected, execution_time_ms))
    }

    /// [`execute_statement`](Self::execute_statement) that gives up when `ct` fires.
    pub async fn execute_statement_cancellable(
        &self,
        sql: &str,
        params: &[QueryParam],
        ct: &CancellationToken,
    ) -> DbResult<StatementStatus> {
        cancellable(ct, "statement completion", self.execute_statement(sql, params)).await
    }
}

/// Race `operation` against the caller's cancellation token.
///
/// Dropping the operation releases any borrowed connection; the statement
/// itself may still finish on the server.
pub async fn cancellable<T, F>(ct: &CancellationToken, operation: &str, fut: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    tokio::select! {
        biased;
        _ = ct.cancelled() => {
            debug!(operation, "Caller cancelled");
            Err(DbError::cancelled(operation))
        }
        result = fut => result,
    }
}

async fn fetch_rows(
    connection: &mut PgConnection,
    sql: &str,
    params: &[QueryParam],
    fetch_limit: Option<usize>,
) -> Vec<Result<PgRow, sqlx::Error>> {
    let stream = if params.is_empty() {
        connection.fetch(sql)
    } else {
        build_query(sql, params).fetch(connection)
    };
    match fetch_limit {
        Some(n) => stream.take(n).collect().await,
        None => stream.collect().await,
    }
}

fn build_query<'q>(sql: &'q str, params: &'q [QueryParam]) -> Query<'q, Postgres, PgArguments> {
    params.iter().fold(sqlx::query(sql), bind_param)
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Null => query.bind(UntypedNull),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(sqlx::types::Json(v)),
    }
}

/// SQL NULL sent with an unspecified parameter type (OID 0), so the server
/// infers the type from where the placeholder appears.
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

fn collect_rows(results: Vec<Result<PgRow, sqlx::Error>>) -> DbResult<Vec<PgRow>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(DbError::from)?);
    }
    Ok(rows)
}

fn process_rows(rows: Vec<PgRow>, limit: Option<u32>, start: Instant) -> QueryResult {
    let total_rows = rows.len();
    let keep = limit.map_or(total_rows, |l| (l as usize).min(total_rows));
    let truncated = total_rows > keep;

    if truncated {
        warn!(total_rows, limit = keep, "Query result truncated");
    }

    let columns = rows.first().map(|r| r.column_names()).unwrap_or_default();
    let records = rows.iter().take(keep).map(|r| r.to_record()).collect();

    QueryResult {
        columns,
        rows: records,
        truncated,
        execution_time_ms: start.elapsed().as_millis() as u64,
    }
}

fn no_response_error(operation: &str, waited: Duration) -> DbError {
    DbError::no_response(operation, waited.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let ct = CancellationToken::new();
        let result = cancellable(&ct, "query execution", async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cancellable_reports_caller_cancelled() {
        let ct = CancellationToken::new();
        ct.cancel();
        let result: DbResult<()> =
            cancellable(&ct, "statement completion", std::future::pending()).await;
        match result {
            Err(DbError::CallerCancelled { operation }) => {
                assert_eq!(operation, "statement completion")
            }
            other => panic!("expected CallerCancelled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_while_suspended() {
        let ct = CancellationToken::new();
        let trigger = ct.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let result: DbResult<()> = cancellable(&ct, "query execution", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(DbError::CallerCancelled { .. })));
    }

    #[test]
    fn test_no_response_error_has_no_sql_state() {
        let err = no_response_error("query execution", Duration::from_secs(3) + NO_RESPONSE_GRACE);
        assert!(matches!(err, DbError::DatabaseOperationFailed { .. }));
        assert!(err.to_string().contains("8s"));
        assert_eq!(err.sql_state(), None);
    }

    #[test]
    fn test_null_parameter_type_is_unspecified() {
        assert_eq!(UntypedNull::type_info().oid(), Some(Oid(0)));
    }

    #[test]
    fn test_process_rows_empty() {
        let result = process_rows(Vec::new(), Some(10), Instant::now());
        assert!(result.rows.is_empty());
        assert!(result.columns.is_empty());
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_setup_failure() {
        let settings = crate::config::PoolSettings::new("postgres://u:p@127.0.0.1:1/db")
            .unwrap()
            .with_acquire_timeout(Duration::from_secs(2));
        let provider = Arc::new(PoolProvider::postgres(settings).unwrap());
        let executor = QueryExecutor::new(Arc::clone(&provider));
        let err = executor.execute_query("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionSetupFailed { .. }));
        assert_eq!(provider.state(), crate::db::PoolState::Failed);
    }
}
