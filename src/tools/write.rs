//! Write operation tools.
//!
//! This module implements `execute` and the `create_schema`, `create_table`
//! and `create_index` tools. All of them are refused when the server runs
//! read-only.

use crate::catalog::{ColumnSpec, IndexSpec, create_index_sql, create_schema_sql, create_table_sql};
use crate::db::QueryExecutor;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, QueryParamInput, StatementStatus};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Input for the execute tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteInput {
    /// SQL statement to execute (INSERT, UPDATE, DELETE, or DDL like CREATE/DROP/ALTER/TRUNCATE)
    pub sql: String,
    /// Positional parameters bound to $1, $2, ... placeholders
    #[serde(default)]
    pub params: Vec<QueryParamInput>,
}

/// Input for the create_schema tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateSchemaInput {
    /// Schema name
    pub schema_name: String,
    /// Role that will own the schema. Default: current user
    #[serde(default)]
    pub owner: Option<String>,
    /// Do nothing if the schema already exists
    #[serde(default)]
    pub if_not_exists: bool,
}

/// Input for the create_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateTableInput {
    /// Table name
    pub table_name: String,
    /// Schema name. Default: public
    #[serde(default)]
    pub schema: Option<String>,
    /// Column definitions in order
    pub columns: Vec<ColumnSpec>,
    /// Do nothing if the table already exists
    #[serde(default)]
    pub if_not_exists: bool,
}

/// Output from the write tools.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecuteOutput {
    /// Leading command, e.g. "UPDATE" or "CREATE TABLE"
    pub command: String,
    /// Server-style command tag, e.g. "UPDATE 1"
    pub command_tag: String,
    /// Number of rows affected by the operation
    pub rows_affected: u64,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
    /// Statement that was run, for the create_* tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

impl From<StatementStatus> for ExecuteOutput {
    fn from(status: StatementStatus) -> Self {
        Self {
            command_tag: status.command_tag(),
            command: status.command,
            rows_affected: status.rows_affected,
            execution_time_ms: status.execution_time_ms,
            sql: None,
        }
    }
}

pub struct WriteToolHandler {
    executor: Arc<QueryExecutor>,
    read_only: bool,
}

impl WriteToolHandler {
    pub fn new(executor: Arc<QueryExecutor>, read_only: bool) -> Self {
        Self {
            executor,
            read_only,
        }
    }

    pub async fn execute(&self, input: ExecuteInput, ct: &CancellationToken) -> DbResult<ExecuteOutput> {
        self.ensure_writable("execute")?;
        if input.sql.trim().is_empty() {
            return Err(DbError::invalid_input("Empty SQL statement"));
        }

        let params: Vec<QueryParam> = input.params.into_iter().map(Into::into).collect();
        let status = self
            .executor
            .execute_statement_cancellable(&input.sql, &params, ct)
            .await?;

        info!(
            command = %status.command,
            rows_affected = status.rows_affected,
            execution_time_ms = status.execution_time_ms,
            "Write operation executed"
        );

        Ok(status.into())
    }

    pub async fn create_schema(
        &self,
        input: CreateSchemaInput,
        ct: &CancellationToken,
    ) -> DbResult<ExecuteOutput> {
        self.ensure_writable("create_schema")?;
        let sql = create_schema_sql(&input.schema_name, input.if_not_exists, input.owner.as_deref())?;
        self.run_ddl(sql, ct).await
    }

    pub async fn create_table(
        &self,
        input: CreateTableInput,
        ct: &CancellationToken,
    ) -> DbResult<ExecuteOutput> {
        self.ensure_writable("create_table")?;
        let schema = input.schema.as_deref().unwrap_or("public");
        let sql = create_table_sql(schema, &input.table_name, &input.columns, input.if_not_exists)?;
        self.run_ddl(sql, ct).await
    }

    pub async fn create_index(&self, input: IndexSpec, ct: &CancellationToken) -> DbResult<ExecuteOutput> {
        self.ensure_writable("create_index")?;
        let sql = create_index_sql(&input)?;
        self.run_ddl(sql, ct).await
    }

    async fn run_ddl(&self, sql: String, ct: &CancellationToken) -> DbResult<ExecuteOutput> {
        let status = self.executor.execute_statement_cancellable(&sql, &[], ct).await?;
        info!(command = %status.command, sql = %sql, "DDL executed");

        let mut output = ExecuteOutput::from(status);
        output.sql = Some(sql);
        Ok(output)
    }

    fn ensure_writable(&self, tool: &str) -> DbResult<()> {
        if self.read_only {
            return Err(DbError::permission(
                tool,
                "Server is running read-only. Restart without --read-only (MCP_READ_ONLY) to enable writes",
            ));
        }
        Ok(())
    }
}
