//! Data models for the PostgreSQL catalog server.
//!
//! This module re-exports all model types used throughout the application.

pub mod query;

// Re-export commonly used types
pub use query::{
    DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, QueryParam, QueryParamInput, QueryResult, RowRecord, StatementStatus, command_of,
};
