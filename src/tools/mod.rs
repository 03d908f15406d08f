//! MCP tool implementations.
//!
//! This module contains the PostgreSQL tool handlers:
//! - `query`: read-only SQL with bound parameters
//! - `write`: `execute` and the `create_schema`/`create_table`/`create_index` DDL tools
//! - `catalog`: named catalog queries and the schema browsing shortcuts
//! - `sql_validator`: read-only policy for `query`

pub mod catalog;
pub mod query;
pub mod sql_validator;
pub mod write;

pub use catalog::{
    CatalogQueryOutput, CatalogToolHandler, DescribeTableInput, ListCatalogQueriesInput,
    ListCatalogQueriesOutput, ListSchemasInput, ListTablesInput, RunCatalogQueryInput,
};
pub use query::{QueryInput, QueryOutput, QueryToolHandler};
pub use write::{CreateSchemaInput, CreateTableInput, ExecuteInput, ExecuteOutput, WriteToolHandler};
