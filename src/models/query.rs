//! Query-related data models.
//!
//! This module defines parameter values, row records and the status
//! descriptor returned by write statements.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default row limit applied by the `query` tool.
pub const DEFAULT_ROW_LIMIT: u32 = 1000;

/// Maximum allowed row limit for the `query` tool.
pub const MAX_ROW_LIMIT: u32 = 10000;

/// One result row: column name to value, in column order.
pub type RowRecord = serde_json::Map<String, JsonValue>;

/// A positional parameter value, bound by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Arrays and objects, bound as jsonb
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }
}

/// Tool-facing parameter value (documented in the tool's JSON schema).
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum QueryParamInput {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Array or object, bound as jsonb
    Json(JsonValue),
}

impl From<QueryParamInput> for QueryParam {
    fn from(input: QueryParamInput) -> Self {
        match input {
            QueryParamInput::Null => QueryParam::Null,
            QueryParamInput::Bool(v) => QueryParam::Bool(v),
            QueryParamInput::Int(v) => QueryParam::Int(v),
            QueryParamInput::Float(v) => QueryParam::Float(v),
            QueryParamInput::String(v) => QueryParam::String(v),
            QueryParamInput::Json(v) => QueryParam::from(v),
        }
    }
}

impl From<JsonValue> for QueryParam {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Self::String(s),
            other @ (JsonValue::Array(_) | JsonValue::Object(_)) => Self::Json(other),
        }
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for QueryParam {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Rows materialized from a read statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names of the first row; empty when no row came back
    pub columns: Vec<String>,
    pub rows: Vec<RowRecord>,
    /// True when a row limit cut the result short
    pub truncated: bool,
    pub execution_time_ms: u64,
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StatementStatus {
    /// Leading command of the statement, e.g. "UPDATE" or "CREATE TABLE"
    pub command: String,
    /// Rows inserted, updated, deleted or copied
    pub rows_affected: u64,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl StatementStatus {
    pub fn new(sql: &str, rows_affected: u64, execution_time_ms: u64) -> Self {
        Self {
            command: command_of(sql),
            rows_affected,
            execution_time_ms,
        }
    }

    /// Server-style command tag ("INSERT 0 3", "UPDATE 1", "CREATE TABLE").
    pub fn command_tag(&self) -> String {
        match self.command.as_str() {
            "INSERT" => format!("INSERT 0 {}", self.rows_affected),
            "UPDATE" | "DELETE" | "MERGE" | "SELECT" | "COPY" | "MOVE" | "FETCH" => {
                format!("{} {}", self.command, self.rows_affected)
            }
            _ => self.command.clone(),
        }
    }
}

/// Verbs whose tag includes the object kind ("CREATE INDEX", "DROP TABLE").
const TWO_WORD_COMMANDS: &[&str] = &["CREATE", "ALTER", "DROP", "COMMENT", "REFRESH"];

/// Extract the leading command keyword(s) of a statement, skipping comments.
pub fn command_of(sql: &str) -> String {
    let words: Vec<String> = strip_leading_comments(sql)
        .split(|c: char| !c.is_ascii_alphabetic() && c != '_')
        .filter(|w| !w.is_empty())
        .take(4)
        .map(|w| w.to_ascii_uppercase())
        .collect();

    let Some(first) = words.first() else {
        return "UNKNOWN".to_string();
    };

    if TWO_WORD_COMMANDS.contains(&first.as_str()) {
        // CREATE UNIQUE INDEX / CREATE OR REPLACE VIEW / COMMENT ON TABLE
        let object = words[1..]
            .iter()
            .find(|w| !matches!(w.as_str(), "UNIQUE" | "OR" | "REPLACE" | "TEMP" | "TEMPORARY" | "ON" | "MATERIALIZED" | "UNLOGGED"));
        if first == "COMMENT" {
            return "COMMENT".to_string();
        }
        return match object {
            Some(obj) => format!("{first} {obj}"),
            None => first.clone(),
        };
    }

    first.clone()
}

fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, r)| r).unwrap_or("").trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, r)| r).unwrap_or("").trim_start();
        } else {
            return rest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_param_types() {
        assert!(QueryParam::Null.is_null());
        assert!(!QueryParam::Bool(true).is_null());
        assert_eq!(QueryParam::Int(42).type_name(), "int");
        assert_eq!(QueryParam::from("hello").type_name(), "string");
    }

    #[test]
    fn test_query_param_from_json() {
        assert_eq!(QueryParam::from(json!(5)), QueryParam::Int(5));
        assert_eq!(QueryParam::from(json!(1.5)), QueryParam::Float(1.5));
        assert_eq!(QueryParam::from(json!("a")), QueryParam::String("a".into()));
        assert_eq!(QueryParam::from(json!(null)), QueryParam::Null);
        assert_eq!(
            QueryParam::from(json!([1, 2])),
            QueryParam::Json(json!([1, 2]))
        );
    }

    #[test]
    fn test_query_param_deserializes_untagged() {
        let params: Vec<QueryParam> =
            serde_json::from_str(r#"[null, true, 7, 2.5, "'; DROP TABLE t; --"]"#).unwrap();
        assert_eq!(params[0], QueryParam::Null);
        assert_eq!(params[1], QueryParam::Bool(true));
        assert_eq!(params[2], QueryParam::Int(7));
        assert_eq!(params[3], QueryParam::Float(2.5));
        assert_eq!(
            params[4],
            QueryParam::String("'; DROP TABLE t; --".to_string())
        );
    }

    #[test]
    fn test_command_of_simple_statements() {
        assert_eq!(command_of("UPDATE t SET v = $1 WHERE k = $2"), "UPDATE");
        assert_eq!(command_of("  insert into t values (1)"), "INSERT");
        assert_eq!(command_of("VACUUM ANALYZE t"), "VACUUM");
        assert_eq!(command_of(""), "UNKNOWN");
    }

    #[test]
    fn test_command_of_ddl() {
        assert_eq!(command_of("CREATE TABLE t (id int)"), "CREATE TABLE");
        assert_eq!(command_of("create unique index i on t (id)"), "CREATE INDEX");
        assert_eq!(command_of("CREATE OR REPLACE VIEW v AS SELECT 1"), "CREATE VIEW");
        assert_eq!(command_of("DROP SCHEMA s CASCADE"), "DROP SCHEMA");
        assert_eq!(command_of("COMMENT ON TABLE t IS 'x'"), "COMMENT");
    }

    #[test]
    fn test_command_of_skips_comments() {
        let sql = "-- bump\n/* block */ DELETE FROM t WHERE id = 1";
        assert_eq!(command_of(sql), "DELETE");
    }

    #[test]
    fn test_command_tag() {
        assert_eq!(StatementStatus::new("UPDATE t SET v = 1", 1, 3).command_tag(), "UPDATE 1");
        assert_eq!(StatementStatus::new("INSERT INTO t VALUES (1)", 2, 3).command_tag(), "INSERT 0 2");
        assert_eq!(
            StatementStatus::new("CREATE SCHEMA s", 0, 3).command_tag(),
            "CREATE SCHEMA"
        );
    }

    #[test]
    fn test_row_record_preserves_column_order() {
        let mut row = RowRecord::new();
        row.insert("zeta".into(), json!(1));
        row.insert("alpha".into(), json!(2));
        let keys: Vec<&String> = row.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }
}
