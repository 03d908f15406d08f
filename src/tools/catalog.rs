//! Catalog query tools.
//!
//! This module implements `list_catalog_queries`, `run_catalog_query` and the
//! `list_schemas`, `list_tables` and `describe_table` shortcuts, which run
//! the catalog entries of the same name.

use crate::catalog::{self, CatalogParam, CatalogQuery, ParamDefault, ParamKind};
use crate::db::{QueryExecutor, cancellable};
use crate::error::{DbError, DbResult};
use crate::tools::query::{QueryOutput, effective_limit};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Input for the list_catalog_queries tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListCatalogQueriesInput {
    /// Only list queries in this category (e.g. "activity", "locks", "maintenance")
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CatalogParamInfo {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
    /// Value used when the argument is omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl From<&CatalogParam> for CatalogParamInfo {
    fn from(param: &CatalogParam) -> Self {
        let default = match param.default {
            ParamDefault::Value(v) => Some(v.to_string()),
            ParamDefault::Required | ParamDefault::Null => None,
        };
        Self {
            name: param.name.to_string(),
            kind: param.kind,
            description: param.description.to_string(),
            required: param.default == ParamDefault::Required,
            default,
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CatalogQueryInfo {
    pub name: String,
    pub category: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<CatalogParamInfo>,
}

impl From<&CatalogQuery> for CatalogQueryInfo {
    fn from(query: &CatalogQuery) -> Self {
        Self {
            name: query.name.to_string(),
            category: query.category.to_string(),
            description: query.description.to_string(),
            params: query.params.iter().map(CatalogParamInfo::from).collect(),
        }
    }
}

/// Output from the list_catalog_queries tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListCatalogQueriesOutput {
    pub queries: Vec<CatalogQueryInfo>,
    pub count: usize,
    /// All categories, for narrowing the listing
    pub categories: Vec<String>,
}

/// Input for the run_catalog_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunCatalogQueryInput {
    /// Catalog query name from list_catalog_queries
    pub name: String,
    /// Named arguments, e.g. {"schema": "public"}. Omitted arguments take their defaults.
    #[serde(default)]
    pub arguments: Map<String, JsonValue>,
    /// Maximum rows to return. Default: 1000, max: 10000
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Output from the catalog tools that return rows.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CatalogQueryOutput {
    /// Catalog query that produced the rows
    pub query: String,
    #[serde(flatten)]
    pub result: QueryOutput,
}

/// Input for the list_schemas tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListSchemasInput {
    /// Include pg_catalog, information_schema and other system schemas. Default: false
    #[serde(default)]
    pub include_system: bool,
}

/// Input for the list_tables tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Schema name. Default: public
    #[serde(default)]
    pub schema: Option<String>,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Table name (unquoted)
    pub table_name: String,
    /// Schema name. Default: public
    #[serde(default)]
    pub schema: Option<String>,
}

pub struct CatalogToolHandler {
    executor: Arc<QueryExecutor>,
}

impl CatalogToolHandler {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }

    pub fn list_catalog_queries(&self, input: ListCatalogQueriesInput) -> DbResult<ListCatalogQueriesOutput> {
        let categories = catalog::categories();
        if let Some(category) = input.category.as_deref()
            && !categories.iter().any(|c| c.eq_ignore_ascii_case(category))
        {
            return Err(DbError::invalid_input(format!(
                "Unknown category '{}'. Available: [{}]",
                category,
                categories.join(", ")
            )));
        }

        let queries: Vec<CatalogQueryInfo> = catalog::list(input.category.as_deref())
            .map(CatalogQueryInfo::from)
            .collect();

        Ok(ListCatalogQueriesOutput {
            count: queries.len(),
            queries,
            categories: categories.into_iter().map(String::from).collect(),
        })
    }

    pub async fn run_catalog_query(
        &self,
        input: RunCatalogQueryInput,
        ct: &CancellationToken,
    ) -> DbResult<CatalogQueryOutput> {
        let query = catalog::find(&input.name)?;
        self.run(query, &input.arguments, input.limit, ct).await
    }

    pub async fn list_schemas(&self, input: ListSchemasInput, ct: &CancellationToken) -> DbResult<CatalogQueryOutput> {
        let mut args = Map::new();
        args.insert("include_system".into(), JsonValue::Bool(input.include_system));
        self.run(catalog::find("list_schemas")?, &args, None, ct).await
    }

    pub async fn list_tables(&self, input: ListTablesInput, ct: &CancellationToken) -> DbResult<CatalogQueryOutput> {
        let mut args = Map::new();
        if let Some(schema) = input.schema {
            args.insert("schema".into(), JsonValue::String(schema));
        }
        self.run(catalog::find("list_tables")?, &args, None, ct).await
    }

    pub async fn describe_table(
        &self,
        input: DescribeTableInput,
        ct: &CancellationToken,
    ) -> DbResult<CatalogQueryOutput> {
        let mut args = Map::new();
        args.insert("table_name".into(), JsonValue::String(input.table_name.clone()));
        if let Some(schema) = input.schema {
            args.insert("schema".into(), JsonValue::String(schema));
        }

        let output = self.run(catalog::find("describe_table")?, &args, None, ct).await?;
        if output.result.row_count == 0 {
            return Err(DbError::invalid_input(format!(
                "Table '{}' not found or has no visible columns",
                input.table_name
            )));
        }
        Ok(output)
    }

    async fn run(
        &self,
        query: &CatalogQuery,
        args: &Map<String, JsonValue>,
        limit: Option<u32>,
        ct: &CancellationToken,
    ) -> DbResult<CatalogQueryOutput> {
        let params = query.bind_arguments(args)?;
        let limit = effective_limit(limit);

        let result = cancellable(
            ct,
            "catalog query",
            self.executor.fetch(query.sql, &params, Some(limit)),
        )
        .await?;

        info!(
            query = query.name,
            rows = result.rows.len(),
            execution_time_ms = result.execution_time_ms,
            "Catalog query executed"
        );

        Ok(CatalogQueryOutput {
            query: query.name.to_string(),
            result: result.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolSettings;
    use crate::db::PoolProvider;
    use serde_json::json;

    fn handler() -> CatalogToolHandler {
        let settings = PoolSettings::new("postgres://u:p@localhost/db").unwrap();
        let provider = Arc::new(PoolProvider::postgres(settings).unwrap());
        CatalogToolHandler::new(Arc::new(QueryExecutor::new(provider)))
    }

    #[test]
    fn test_list_all_queries() {
        let output = handler().list_catalog_queries(ListCatalogQueriesInput::default()).unwrap();
        assert_eq!(output.count, catalog::CATALOG.len());
        assert!(output.categories.contains(&"locks".to_string()));
    }

    #[test]
    fn test_list_by_category() {
        let output = handler()
            .list_catalog_queries(ListCatalogQueriesInput {
                category: Some("Locks".into()),
            })
            .unwrap();
        assert!(output.count > 0);
        assert!(output.queries.iter().all(|q| q.category == "locks"));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = handler()
            .list_catalog_queries(ListCatalogQueriesInput {
                category: Some("nope".into()),
            })
            .unwrap_err();
        assert!(err.to_string().contains("Available"));
    }

    #[test]
    fn test_param_info_marks_required() {
        let info = CatalogQueryInfo::from(catalog::find("describe_table").unwrap());
        let table = info.params.iter().find(|p| p.name == "table_name").unwrap();
        assert!(table.required);
        let schema = info.params.iter().find(|p| p.name == "schema").unwrap();
        assert!(!schema.required);
        assert_eq!(schema.default.as_deref(), Some("public"));
    }

    #[test]
    fn test_run_input_defaults() {
        let input: RunCatalogQueryInput = serde_json::from_value(json!({"name": "lock_summary"})).unwrap();
        assert!(input.arguments.is_empty());
        assert!(input.limit.is_none());
    }

    #[tokio::test]
    async fn test_unknown_query_fails_before_connecting() {
        let handler = handler();
        let ct = CancellationToken::new();
        let input = RunCatalogQueryInput {
            name: "drop_everything".into(),
            arguments: Map::new(),
            limit: None,
        };
        let err = handler.run_catalog_query(input, &ct).await.unwrap_err();
        assert!(matches!(err, DbError::CatalogQueryNotFound { .. }));
        assert_eq!(handler.executor.provider().attempts(), 0);
    }

    #[tokio::test]
    async fn test_bad_arguments_fail_before_connecting() {
        let handler = handler();
        let ct = CancellationToken::new();
        let input = RunCatalogQueryInput {
            name: "long_running_queries".into(),
            arguments: json!({"min_seconds": "soon"}).as_object().cloned().unwrap(),
            limit: None,
        };
        let err = handler.run_catalog_query(input, &ct).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert_eq!(handler.executor.provider().attempts(), 0);
    }
}
