//! MCP service implementation using rmcp.
//!
//! This module defines the PgService struct with every tool exposed via the
//! MCP protocol using the rmcp framework's macros. Each tool forwards the
//! request's cancellation token so an abandoned call releases its connection.

use crate::catalog::IndexSpec;
use crate::db::{PoolProvider, PoolStatus, QueryExecutor};
use crate::tools::catalog::{
    CatalogQueryOutput, CatalogToolHandler, DescribeTableInput, ListCatalogQueriesInput,
    ListCatalogQueriesOutput, ListSchemasInput, ListTablesInput, RunCatalogQueryInput,
};
use crate::tools::query::{QueryInput, QueryOutput, QueryToolHandler};
use crate::tools::write::{
    CreateSchemaInput, CreateTableInput, ExecuteInput, ExecuteOutput, WriteToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct PgService {
    /// Shared executor over the process-wide pool provider
    executor: Arc<QueryExecutor>,
    /// Refuse execute and the create_* tools
    read_only: bool,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl PgService {
    /// Create a new PgService over `provider`.
    ///
    /// The provider connects lazily: no connection is opened until the first
    /// tool call that needs one.
    pub fn new(provider: Arc<PoolProvider>, read_only: bool) -> Self {
        Self {
            executor: Arc::new(QueryExecutor::new(provider)),
            read_only,
            tool_router: Self::tool_router(),
        }
    }

    pub fn provider(&self) -> &Arc<PoolProvider> {
        self.executor.provider()
    }

    fn catalog_handler(&self) -> CatalogToolHandler {
        CatalogToolHandler::new(self.executor.clone())
    }

    fn write_handler(&self) -> WriteToolHandler {
        WriteToolHandler::new(self.executor.clone(), self.read_only)
    }
}

#[tool_router]
impl PgService {
    #[tool(
        description = "Execute a read-only SQL query (SELECT, SHOW, EXPLAIN) and return rows.\nUse $1, $2, ... placeholders with `params` to pass values safely.\nResults are capped by `limit` (default 1000, max 10000); `truncated` reports when rows were cut."
    )]
    async fn query(
        &self,
        Parameters(input): Parameters<QueryInput>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<Json<QueryOutput>, McpError> {
        let handler = QueryToolHandler::new(self.executor.clone());
        handler.query(input, &ctx.ct).await.map(Json).map_err(McpError::from)
    }

    #[tool(
        description = "Execute a write statement (INSERT, UPDATE, DELETE) or DDL (CREATE, DROP, ALTER, TRUNCATE).\nUse $1, $2, ... placeholders with `params` to pass values safely.\nReturns the command tag and affected row count. Disabled when the server is read-only."
    )]
    async fn execute(
        &self,
        Parameters(input): Parameters<ExecuteInput>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<Json<ExecuteOutput>, McpError> {
        self.write_handler()
            .execute(input, &ctx.ct)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "List the built-in catalog and administration queries.\nFilter by `category` (server, schema, activity, locks, tables, indexes, performance, maintenance, config, security, replication).\nEach entry lists its arguments and their defaults."
    )]
    async fn list_catalog_queries(
        &self,
        Parameters(input): Parameters<ListCatalogQueriesInput>,
    ) -> Result<Json<ListCatalogQueriesOutput>, McpError> {
        self.catalog_handler()
            .list_catalog_queries(input)
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Run a named catalog query from list_catalog_queries.\nPass arguments by name in `arguments`; omitted arguments take their defaults."
    )]
    async fn run_catalog_query(
        &self,
        Parameters(input): Parameters<RunCatalogQueryInput>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<Json<CatalogQueryOutput>, McpError> {
        self.catalog_handler()
            .run_catalog_query(input, &ctx.ct)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "List schemas in the current database with their owners.")]
    async fn list_schemas(
        &self,
        Parameters(input): Parameters<ListSchemasInput>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<Json<CatalogQueryOutput>, McpError> {
        self.catalog_handler()
            .list_schemas(input, &ctx.ct)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "List tables and views in a schema (default: public).")]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<Json<CatalogQueryOutput>, McpError> {
        self.catalog_handler()
            .list_tables(input, &ctx.ct)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Describe the columns of a table: type, nullability, default and position.\nUse run_catalog_query with table_constraints or table_indexes for keys and indexes."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<Json<CatalogQueryOutput>, McpError> {
        self.catalog_handler()
            .describe_table(input, &ctx.ct)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Create a schema, optionally owned by another role. Disabled when the server is read-only.")]
    async fn create_schema(
        &self,
        Parameters(input): Parameters<CreateSchemaInput>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<Json<ExecuteOutput>, McpError> {
        self.write_handler()
            .create_schema(input, &ctx.ct)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Create a table from column definitions (name, data_type, nullable, default, primary_key).\nIdentifiers are quoted; returns the generated statement. Disabled when the server is read-only."
    )]
    async fn create_table(
        &self,
        Parameters(input): Parameters<CreateTableInput>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<Json<ExecuteOutput>, McpError> {
        self.write_handler()
            .create_table(input, &ctx.ct)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Create an index on one or more columns, optionally UNIQUE or with a method (btree, hash, gist, spgist, gin, brin).\nDisabled when the server is read-only."
    )]
    async fn create_index(
        &self,
        Parameters(input): Parameters<IndexSpec>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<Json<ExecuteOutput>, McpError> {
        self.write_handler()
            .create_index(input, &ctx.ct)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Report connection pool state (uninitialized, initializing, ready, failed, closed), size limits and borrow counters.\nDoes not open a connection."
    )]
    async fn pool_status(&self) -> Json<PoolStatus> {
        Json(self.provider().status())
    }
}

#[tool_handler]
impl ServerHandler for PgService {
    fn get_info(&self) -> ServerInfo {
        let mode = if self.read_only {
            "This server is read-only: `execute` and the `create_*` tools are disabled.\n"
        } else {
            ""
        };

        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "pg-catalog-mcp".to_owned(),
                title: Some("PostgreSQL Catalog MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "PostgreSQL tools over a single shared connection pool.\n\
                \n\
                ## Workflow\n\
                1. Call `list_schemas` and `list_tables` to find objects, `describe_table` for columns\n\
                2. Call `list_catalog_queries` to see built-in diagnostics (activity, locks, sizes, vacuum, replication)\n\
                3. Run one with `run_catalog_query`, or write your own SELECT with `query`\n\
                4. Use `execute` or the `create_*` tools for changes\n\
                \n\
                ## Notes\n\
                - Always pass values through `params` ($1, $2, ...) instead of splicing them into SQL\n\
                - Each call runs on its own pooled connection; there are no multi-call transactions\n\
                - The pool connects on first use; `pool_status` shows whether it is ready or why it failed\n\
                {mode}"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolSettings;
    use crate::db::PoolState;

    fn create_test_service(read_only: bool) -> PgService {
        let settings = PoolSettings::new("postgres://u:p@localhost/db").unwrap();
        let provider = Arc::new(PoolProvider::postgres(settings).unwrap());
        PgService::new(provider, read_only)
    }

    #[test]
    fn test_service_creation_does_not_connect() {
        let service = create_test_service(false);
        assert_eq!(service.provider().state(), PoolState::Uninitialized);
    }

    #[test]
    fn test_all_tools_registered() {
        let service = create_test_service(false);
        let names: Vec<String> = service
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        for expected in [
            "query",
            "execute",
            "list_catalog_queries",
            "run_catalog_query",
            "list_schemas",
            "list_tables",
            "describe_table",
            "create_schema",
            "create_table",
            "create_index",
            "pool_status",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing tool {expected}");
        }
    }

    #[tokio::test]
    async fn test_pool_status_before_first_use() {
        let service = create_test_service(false);
        let Json(status) = service.pool_status().await;
        assert_eq!(status.state, PoolState::Uninitialized);
        assert_eq!(status.attempts, 0);
        assert!(status.open_connections.is_none());
    }

    #[test]
    fn test_server_info() {
        let info = create_test_service(false).get_info();
        assert_eq!(info.server_info.name, "pg-catalog-mcp");
        assert!(info.capabilities.tools.is_some());
    }

    #[test]
    fn test_server_info_mentions_read_only() {
        let info = create_test_service(true).get_info();
        assert!(info.instructions.unwrap().contains("read-only"));
    }
}
