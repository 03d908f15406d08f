//! PostgreSQL Catalog MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to inspect and administer a PostgreSQL server through one lazily built,
//! shared connection pool.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use db::{PoolProvider, QueryExecutor};
pub use error::DbError;
pub use mcp::PgService;
