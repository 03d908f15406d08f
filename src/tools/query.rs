//! Query execution tool.
//!
//! This module implements the `query` MCP tool. Statements must pass the
//! read-only policy in [`sql_validator`] before they reach the executor.

use crate::db::{QueryExecutor, cancellable};
use crate::error::DbResult;
use crate::models::{DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, QueryParam, QueryParamInput, QueryResult};
use crate::tools::sql_validator;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Input for the query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// SQL SELECT statement to execute. Write operations (INSERT/UPDATE/DELETE/DDL) are blocked.
    pub sql: String,
    /// Positional parameters bound to $1, $2, ... placeholders
    #[serde(default)]
    pub params: Vec<QueryParamInput>,
    /// Maximum rows to return. Default: 1000, max: 10000
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Output from the query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// Column names in result order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    /// Result rows as column-name to value maps
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// Number of rows returned
    pub row_count: usize,
    /// True if result was truncated due to limit
    pub truncated: bool,
    /// Query execution time in milliseconds
    pub execution_time_ms: u64,
}

impl From<QueryResult> for QueryOutput {
    fn from(result: QueryResult) -> Self {
        Self {
            columns: result.columns,
            row_count: result.rows.len(),
            rows: result.rows,
            truncated: result.truncated,
            execution_time_ms: result.execution_time_ms,
        }
    }
}

/// Clamp a requested row limit to [1, MAX_ROW_LIMIT].
pub fn effective_limit(requested: Option<u32>) -> u32 {
    requested
        .map(|l| l.clamp(1, MAX_ROW_LIMIT))
        .unwrap_or(DEFAULT_ROW_LIMIT)
}

pub struct QueryToolHandler {
    executor: Arc<QueryExecutor>,
}

impl QueryToolHandler {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    pub async fn query(&self, input: QueryInput, ct: &CancellationToken) -> DbResult<QueryOutput> {
        sql_validator::validate_readonly(&input.sql)?;

        let limit = effective_limit(input.limit);
        let params: Vec<QueryParam> = input.params.into_iter().map(Into::into).collect();

        let result = cancellable(
            ct,
            "query execution",
            self.executor.fetch_read_only(&input.sql, &params, Some(limit)),
        )
        .await?;

        info!(
            rows = result.rows.len(),
            truncated = result.truncated,
            execution_time_ms = result.execution_time_ms,
            "Query executed"
        );

        Ok(result.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_input_defaults() {
        let input: QueryInput = serde_json::from_str(r#"{"sql": "SELECT 1"}"#).unwrap();
        assert!(input.params.is_empty());
        assert!(input.limit.is_none());
    }

    #[test]
    fn test_query_input_mixed_params() {
        let input: QueryInput = serde_json::from_value(json!({
            "sql": "SELECT $1, $2, $3",
            "params": [5, "five", null]
        }))
        .unwrap();
        let params: Vec<QueryParam> = input.params.into_iter().map(Into::into).collect();
        assert_eq!(
            params,
            vec![QueryParam::Int(5), QueryParam::String("five".into()), QueryParam::Null]
        );
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(None), DEFAULT_ROW_LIMIT);
        assert_eq!(effective_limit(Some(0)), 1);
        assert_eq!(effective_limit(Some(50)), 50);
        assert_eq!(effective_limit(Some(u32::MAX)), MAX_ROW_LIMIT);
    }

    #[test]
    fn test_output_from_empty_result() {
        let output = QueryOutput::from(QueryResult::default());
        assert_eq!(output.row_count, 0);
        let value = serde_json::to_value(&output).unwrap();
        assert!(value.get("columns").is_none());
        assert_eq!(value["rows"], json!([]));
    }
}
