//! Error types for the PostgreSQL catalog server.
//!
//! The pool core reports exactly three kinds of failure: the pool could not be
//! built, a statement failed, or the caller went away while suspended. The
//! remaining variants belong to the tool layer (argument and policy checks).

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error("Connection setup failed: {message}")]
    ConnectionSetupFailed { message: String, suggestion: String },

    #[error("Database operation failed: {message}")]
    DatabaseOperationFailed {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Cancelled while waiting for {operation}")]
    CallerCancelled { operation: String },

    #[error("Permission denied: {operation} - {reason}")]
    Permission { operation: String, reason: String },

    #[error("Catalog query not found: {name}")]
    CatalogQueryNotFound { name: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a pool setup error with a helpful suggestion.
    pub fn connection_setup(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConnectionSetupFailed {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a statement failure with optional SQL state.
    pub fn operation(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::DatabaseOperationFailed {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// The server sent nothing back, not even its own statement timeout,
    /// within `waited_secs`. The connection is discarded rather than reused.
    pub fn no_response(operation: &str, waited_secs: u64) -> Self {
        Self::operation(
            format!("{operation} got no response from the server within {waited_secs}s"),
            None,
            "Check database server load and network reachability",
        )
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::CallerCancelled {
            operation: operation.into(),
        }
    }

    pub fn permission(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn catalog_query_not_found(name: impl Into<String>) -> Self {
        Self::CatalogQueryNotFound { name: name.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::ConnectionSetupFailed { suggestion, .. } => Some(suggestion),
            Self::DatabaseOperationFailed { suggestion, .. } => Some(suggestion),
            Self::CatalogQueryNotFound { .. } => {
                Some("Call list_catalog_queries to see the available names")
            }
            _ => None,
        }
    }

    /// SQLSTATE reported by the server, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::DatabaseOperationFailed { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Hint for callers deciding their own retry policy. Nothing in this crate
    /// retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionSetupFailed { .. } => true,
            // 08xxx connection exceptions, serialization failure, deadlock
            Self::DatabaseOperationFailed {
                sql_state: Some(code),
                ..
            } => code.starts_with("08") || code == "40001" || code == "40P01",
            _ => false,
        }
    }
}

/// Statement-time driver failures all collapse into `DatabaseOperationFailed`.
/// Pool construction maps its own errors to `ConnectionSetupFailed` before
/// they reach this conversion.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let suggestion = match code.as_deref() {
                    // query_canceled, raised by the server-side statement_timeout
                    Some("57014") => "Narrow the query or raise PG_COMMAND_TIMEOUT",
                    Some("25006") => {
                        "The query tool is read-only; use the execute tool for statements with side effects"
                    }
                    Some("42804") => "Cast the parameter to the column type, e.g. $1::int",
                    _ => "Check the SQL syntax and referenced objects",
                };
                DbError::operation(db_err.message(), code, suggestion)
            }
            sqlx::Error::PoolTimedOut => DbError::operation(
                "Timed out waiting for a free pooled connection",
                None,
                "All connections are busy; retry later or raise PG_POOL_MAX_SIZE",
            ),
            sqlx::Error::PoolClosed => DbError::operation(
                "Connection pool is closed",
                None,
                "The server is shutting down",
            ),
            sqlx::Error::Io(io_err) => DbError::operation(
                format!("I/O error: {}", io_err),
                Some("08006".to_string()),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Protocol(msg) => DbError::operation(
                format!("Protocol error: {}", msg),
                None,
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => DbError::operation(
                format!("Failed to decode column {}: {}", index, source),
                None,
                "Cast the column to text in the query",
            ),
            other => DbError::operation(
                other.to_string(),
                None,
                "Check the statement and server logs",
            ),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::InvalidInput { .. } | DbError::Permission { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), suggestion_data(err.suggestion()))
            }

            DbError::CatalogQueryNotFound { .. } => rmcp::ErrorData::resource_not_found(
                err.to_string(),
                suggestion_data(err.suggestion()),
            ),

            // Statement errors carry SQLSTATE in the message
            DbError::DatabaseOperationFailed {
                message,
                sql_state,
                suggestion,
            } => {
                let msg = match sql_state {
                    Some(code) => format!("{} (SQLSTATE: {})", message, code),
                    None => message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, suggestion_data(Some(suggestion)))
            }

            DbError::ConnectionSetupFailed { .. }
            | DbError::CallerCancelled { .. }
            | DbError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), suggestion_data(err.suggestion()))
            }
        }
    }
}
