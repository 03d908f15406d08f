//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Lazily-initialized shared pool (`provider`)
//! - Scoped connection borrowing (`borrow`)
//! - Query execution
//! - Type mappings

pub mod borrow;
pub mod executor;
pub mod provider;
pub mod types;

pub use borrow::{BorrowStats, BorrowedConnection, ConnectionSource, PoolHandle, with_connection};
pub use executor::{QueryExecutor, cancellable};
pub use provider::{PgConnector, PoolConnector, PoolProvider, PoolState, PoolStatus};
