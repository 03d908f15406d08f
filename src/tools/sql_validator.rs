//! Read-only policy for the `query` tool.
//!
//! Statements are parsed with sqlparser's PostgreSQL dialect and checked
//! against an allow-list: plain queries, SHOW and EXPLAIN of a query. A query
//! is further walked so that data-modifying CTEs and `SELECT ... INTO` are
//! refused. Anything else is reported as a permission error naming the
//! tool to use instead.
//!
//! The tool also runs each statement in a `READ ONLY` transaction, which makes
//! the server refuse functions that write (`nextval()` and friends). Functions
//! whose effects that does not stop, like signalling other backends or taking
//! session-level advisory locks, are rejected here by name.

use crate::error::{DbError, DbResult};
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

mod hints {
    pub const WRITE: &str = "Write operations not allowed in query. Use execute for INSERT/UPDATE/DELETE.";
    pub const DDL: &str =
        "DDL operations not allowed in query. Use execute or the create_* tools for schema changes.";
    pub const TRANSACTION: &str =
        "Transaction control not allowed in query. Each tool call runs in its own implicit transaction.";
    pub const OTHER: &str = "Only SELECT, SHOW and EXPLAIN are allowed in query. Use execute for other statements.";
    pub const FUNCTION: &str =
        "Server administration functions are not allowed in query. Use execute to call them.";
}

/// Functions with side effects a read-only transaction does not prevent.
const BLOCKED_FUNCTIONS: &[&str] = &[
    "pg_terminate_backend",
    "pg_cancel_backend",
    "pg_reload_conf",
    "pg_rotate_logfile",
    "pg_switch_wal",
    "pg_create_restore_point",
    "pg_advisory_lock",
    "pg_advisory_lock_shared",
    "pg_try_advisory_lock",
    "pg_try_advisory_lock_shared",
    "pg_advisory_unlock",
    "pg_advisory_unlock_shared",
    "pg_advisory_unlock_all",
];

/// Check that `sql` only reads.
///
/// Returns `DbError::InvalidInput` for unparseable or empty SQL and
/// `DbError::Permission` for anything that could write.
pub fn validate_readonly(sql: &str) -> DbResult<()> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| DbError::invalid_input(format!("Failed to parse SQL statement. Error: {}", e)))?;

    if statements.is_empty() {
        return Err(DbError::invalid_input("Empty SQL statement"));
    }

    statements.iter().try_for_each(check_statement)?;
    check_function_calls(sql)
}

/// Reject calls to [`BLOCKED_FUNCTIONS`], schema-qualified or not. String
/// literals and comments are separate tokens, so mentions there are ignored.
fn check_function_calls(sql: &str) -> DbResult<()> {
    let tokens = Tokenizer::new(&PostgreSqlDialect {}, sql)
        .tokenize()
        .map_err(|e| DbError::invalid_input(format!("Failed to tokenize SQL statement. Error: {}", e)))?;

    let mut previous: Option<&Token> = None;
    for token in tokens.iter().filter(|t| !matches!(t, Token::Whitespace(_))) {
        if let (Some(Token::Word(word)), Token::LParen) = (previous, token) {
            let name = word.value.to_ascii_lowercase();
            if BLOCKED_FUNCTIONS.contains(&name.as_str()) {
                return Err(DbError::permission(format!("{name}()"), hints::FUNCTION));
            }
        }
        previous = Some(token);
    }
    Ok(())
}

fn check_statement(stmt: &Statement) -> DbResult<()> {
    match stmt {
        Statement::Query(query) => check_query(query),
        Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowSchemas { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowCollation { .. }
        | Statement::ExplainTable { .. } => Ok(()),
        // EXPLAIN ANALYZE executes its statement, so the inner statement decides
        Statement::Explain { statement, .. } => check_statement(statement),
        other => {
            let (operation, hint) = blocked(other);
            Err(DbError::permission(operation, hint))
        }
    }
}

fn check_query(query: &Query) -> DbResult<()> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query)?;
        }
    }
    check_set_expr(&query.body)
}

fn check_set_expr(expr: &SetExpr) -> DbResult<()> {
    match expr {
        SetExpr::Select(select) => {
            if select.into.is_some() {
                return Err(DbError::permission("SELECT INTO", hints::DDL));
            }
            Ok(())
        }
        SetExpr::Query(query) => check_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left)?;
            check_set_expr(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => Ok(()),
        // INSERT/UPDATE/DELETE/MERGE in a WITH clause
        _ => Err(DbError::permission("data-modifying CTE", hints::WRITE)),
    }
}

fn blocked(stmt: &Statement) -> (&'static str, &'static str) {
    match stmt {
        Statement::Insert { .. } => ("INSERT", hints::WRITE),
        Statement::Update { .. } => ("UPDATE", hints::WRITE),
        Statement::Delete { .. } => ("DELETE", hints::WRITE),
        Statement::Merge { .. } => ("MERGE", hints::WRITE),
        Statement::Copy { .. } => ("COPY", hints::WRITE),

        Statement::CreateTable { .. } => ("CREATE TABLE", hints::DDL),
        Statement::CreateIndex { .. } => ("CREATE INDEX", hints::DDL),
        Statement::CreateSchema { .. } => ("CREATE SCHEMA", hints::DDL),
        Statement::CreateView { .. } => ("CREATE VIEW", hints::DDL),
        Statement::AlterTable { .. } => ("ALTER TABLE", hints::DDL),
        Statement::Drop { .. } => ("DROP", hints::DDL),
        Statement::Truncate { .. } => ("TRUNCATE", hints::DDL),

        Statement::StartTransaction { .. } => ("BEGIN", hints::TRANSACTION),
        Statement::Commit { .. } => ("COMMIT", hints::TRANSACTION),
        Statement::Rollback { .. } => ("ROLLBACK", hints::TRANSACTION),
        Statement::Savepoint { .. } => ("SAVEPOINT", hints::TRANSACTION),

        Statement::Grant { .. } => ("GRANT", hints::OTHER),
        Statement::Revoke { .. } => ("REVOKE", hints::OTHER),
        Statement::Set { .. } => ("SET", hints::OTHER),
        Statement::Vacuum { .. } => ("VACUUM", hints::OTHER),
        Statement::Analyze { .. } => ("ANALYZE", hints::OTHER),
        Statement::Call { .. } => ("CALL", hints::OTHER),
        Statement::Execute { .. } => ("EXECUTE", hints::OTHER),
        _ => ("statement", hints::OTHER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_permission(sql: &str) -> String {
        match validate_readonly(sql) {
            Err(err @ DbError::Permission { .. }) => err.to_string(),
            other => panic!("expected permission error for {sql:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_select_allowed() {
        assert!(validate_readonly("SELECT * FROM pg_stat_activity").is_ok());
        assert!(validate_readonly("SELECT $1::int AS x").is_ok());
    }

    #[test]
    fn test_admin_functions_blocked() {
        let msg = assert_permission("SELECT pg_terminate_backend(pid) FROM pg_stat_activity");
        assert!(msg.contains("pg_terminate_backend()"));
        assert_permission("select PG_CATALOG.pg_reload_conf ()");
        assert_permission("SELECT pg_advisory_lock(42)");
    }

    #[test]
    fn test_admin_function_names_outside_calls_allowed() {
        assert!(validate_readonly("SELECT 'pg_terminate_backend(1)' AS note").is_ok());
        assert!(validate_readonly("SELECT 1 -- pg_reload_conf()").is_ok());
        assert!(
            validate_readonly("SELECT proname FROM pg_proc WHERE proname = 'pg_cancel_backend'").is_ok()
        );
    }

    #[test]
    fn test_show_and_explain_allowed() {
        assert!(validate_readonly("SHOW max_connections").is_ok());
        assert!(validate_readonly("EXPLAIN SELECT 1").is_ok());
    }

    #[test]
    fn test_read_only_cte_allowed() {
        let sql = "WITH big AS (SELECT relname FROM pg_class WHERE relpages > 100) SELECT * FROM big";
        assert!(validate_readonly(sql).is_ok());
    }

    #[test]
    fn test_union_allowed() {
        assert!(validate_readonly("SELECT a FROM t1 UNION ALL SELECT b FROM t2").is_ok());
    }

    #[test]
    fn test_writes_blocked() {
        let msg = assert_permission("INSERT INTO users VALUES (1)");
        assert!(msg.contains("execute"));
        assert_permission("UPDATE users SET name = 'x' WHERE id = 1");
        assert_permission("DELETE FROM users");
    }

    #[test]
    fn test_ddl_blocked() {
        let msg = assert_permission("CREATE TABLE t (id int)");
        assert!(msg.contains("schema"));
        assert_permission("DROP TABLE users");
        assert_permission("TRUNCATE users");
    }

    #[test]
    fn test_transaction_control_blocked() {
        let msg = assert_permission("COMMIT");
        assert!(msg.contains("Transaction"));
    }

    #[test]
    fn test_explain_analyze_of_write_blocked() {
        assert_permission("EXPLAIN ANALYZE DELETE FROM users");
    }

    #[test]
    fn test_select_into_blocked() {
        assert_permission("SELECT * INTO backup_users FROM users");
    }

    #[test]
    fn test_multiple_statements_blocked_if_any_writes() {
        assert_permission("SELECT 1; INSERT INTO users VALUES (1)");
    }

    #[test]
    fn test_insert_select_blocked() {
        assert_permission("INSERT INTO archive SELECT * FROM users");
    }

    #[test]
    fn test_parse_error_is_invalid_input() {
        let err = validate_readonly("SELEC 1").unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        let err = validate_readonly("").unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }
}
