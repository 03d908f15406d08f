//! DDL builders for the schema, table and index creation tools.
//!
//! Identifiers are always double-quoted. Type names and default expressions
//! cannot be bound as parameters, so they are checked against a conservative
//! character set instead.

use crate::error::{DbError, DbResult};
use schemars::JsonSchema;
use serde::Deserialize;

/// Longest identifier PostgreSQL keeps without truncation (NAMEDATALEN - 1).
const MAX_IDENTIFIER_BYTES: usize = 63;

const INDEX_METHODS: &[&str] = &["btree", "hash", "gist", "spgist", "gin", "brin"];

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> DbResult<String> {
    if ident.is_empty() {
        return Err(DbError::invalid_input("Identifier cannot be empty"));
    }
    if ident.contains('\0') {
        return Err(DbError::invalid_input("Identifier cannot contain NUL bytes"));
    }
    if ident.len() > MAX_IDENTIFIER_BYTES {
        return Err(DbError::invalid_input(format!(
            "Identifier '{}' exceeds {} bytes",
            ident, MAX_IDENTIFIER_BYTES
        )));
    }
    Ok(format!("\"{}\"", ident.replace('"', "\"\"")))
}

fn qualified(schema: &str, name: &str) -> DbResult<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(name)?))
}

/// One column of a `CREATE TABLE`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// PostgreSQL type, e.g. "integer", "varchar(255)", "timestamptz", "text[]"
    pub data_type: String,
    /// Allow NULL values. Default: true
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Default expression, e.g. "now()" or "0"
    #[serde(default)]
    pub default: Option<String>,
    /// Part of the primary key
    #[serde(default)]
    pub primary_key: bool,
}

fn default_true() -> bool {
    true
}

/// Definition of a `CREATE INDEX`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct IndexSpec {
    /// Index name
    pub index_name: String,
    /// Table to index
    pub table_name: String,
    /// Indexed columns, in order
    pub columns: Vec<String>,
    /// Schema of the table. Default: public
    #[serde(default)]
    pub schema: Option<String>,
    /// Create a UNIQUE index
    #[serde(default)]
    pub unique: bool,
    /// Access method: btree (default), hash, gist, spgist, gin or brin
    #[serde(default)]
    pub method: Option<String>,
    /// Add IF NOT EXISTS
    #[serde(default)]
    pub if_not_exists: bool,
}

/// `CREATE SCHEMA [IF NOT EXISTS] "name" [AUTHORIZATION "owner"]`
pub fn create_schema_sql(name: &str, if_not_exists: bool, owner: Option<&str>) -> DbResult<String> {
    let mut sql = String::from("CREATE SCHEMA ");
    if if_not_exists {
        sql.push_str("IF NOT EXISTS ");
    }
    sql.push_str(&quote_ident(name)?);
    if let Some(owner) = owner {
        sql.push_str(" AUTHORIZATION ");
        sql.push_str(&quote_ident(owner)?);
    }
    Ok(sql)
}

/// `CREATE TABLE "schema"."table" (...)` with an optional composite primary key.
pub fn create_table_sql(
    schema: &str,
    table: &str,
    columns: &[ColumnSpec],
    if_not_exists: bool,
) -> DbResult<String> {
    if columns.is_empty() {
        return Err(DbError::invalid_input("A table needs at least one column"));
    }

    let mut definitions = Vec::with_capacity(columns.len() + 1);
    for column in columns {
        let data_type = validate_type_name(&column.data_type)?;
        let mut def = format!("{} {}", quote_ident(&column.name)?, data_type);
        if !column.nullable || column.primary_key {
            def.push_str(" NOT NULL");
        }
        if let Some(expr) = &column.default {
            def.push_str(" DEFAULT ");
            def.push_str(validate_default_expr(expr)?);
        }
        definitions.push(def);
    }

    let key_columns = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| quote_ident(&c.name))
        .collect::<DbResult<Vec<_>>>()?;
    if !key_columns.is_empty() {
        definitions.push(format!("PRIMARY KEY ({})", key_columns.join(", ")));
    }

    Ok(format!(
        "CREATE TABLE {}{} ({})",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        qualified(schema, table)?,
        definitions.join(", ")
    ))
}

/// `CREATE [UNIQUE] INDEX [IF NOT EXISTS] "name" ON "schema"."table" USING method (...)`
pub fn create_index_sql(spec: &IndexSpec) -> DbResult<String> {
    if spec.columns.is_empty() {
        return Err(DbError::invalid_input("An index needs at least one column"));
    }

    let method = match spec.method.as_deref() {
        None => "btree".to_string(),
        Some(m) => {
            let lower = m.trim().to_ascii_lowercase();
            if !INDEX_METHODS.contains(&lower.as_str()) {
                return Err(DbError::invalid_input(format!(
                    "Unknown index method '{}'. Use one of: {}",
                    m,
                    INDEX_METHODS.join(", ")
                )));
            }
            lower
        }
    };

    let columns = spec
        .columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<DbResult<Vec<_>>>()?;

    Ok(format!(
        "CREATE {}INDEX {}{} ON {} USING {} ({})",
        if spec.unique { "UNIQUE " } else { "" },
        if spec.if_not_exists { "IF NOT EXISTS " } else { "" },
        quote_ident(&spec.index_name)?,
        qualified(spec.schema.as_deref().unwrap_or("public"), &spec.table_name)?,
        method,
        columns.join(", ")
    ))
}

fn validate_type_name(data_type: &str) -> DbResult<&str> {
    let trimmed = data_type.trim();
    let allowed = |c: char| c.is_ascii_alphanumeric() || " _(),[].".contains(c);
    if trimmed.is_empty() || !trimmed.chars().all(allowed) {
        return Err(DbError::invalid_input(format!(
            "Invalid column type '{}'",
            data_type
        )));
    }
    Ok(trimmed)
}

fn validate_default_expr(expr: &str) -> DbResult<&str> {
    let trimmed = expr.trim();
    if trimmed.is_empty() || trimmed.contains(';') || trimmed.contains("--") || trimmed.contains("/*") {
        return Err(DbError::invalid_input(format!(
            "Invalid default expression '{}'",
            expr
        )));
    }
    Ok(trimmed)
}
