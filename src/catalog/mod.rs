//! Named catalog and administration queries.
//!
//! Each entry is inert data: a name, a category, a SQL body with positional
//! placeholders and the typed parameters that fill them. Tool calls supply
//! arguments as a JSON object which [`CatalogQuery::bind_arguments`] turns
//! into driver-bound [`QueryParam`]s.

pub mod ddl;
mod queries;

use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

pub use ddl::{ColumnSpec, IndexSpec, create_index_sql, create_schema_sql, create_table_sql, quote_ident};
pub use queries::CATALOG;

/// Value kind of a catalog parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Text,
    Integer,
    Boolean,
}

/// What a parameter takes when the caller leaves it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDefault {
    /// The caller must supply it.
    Required,
    /// Bound as SQL NULL, which the query reads as "no filter".
    Null,
    /// Parsed according to the parameter kind.
    Value(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogParam {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub default: ParamDefault,
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogQuery {
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub sql: &'static str,
    /// In placeholder order: the first entry binds `$1`.
    pub params: &'static [CatalogParam],
}

/// Look up a catalog entry by name.
pub fn find(name: &str) -> DbResult<&'static CatalogQuery> {
    CATALOG
        .iter()
        .find(|q| q.name == name)
        .ok_or_else(|| DbError::catalog_query_not_found(name))
}

/// Entries in a category, or all entries when `category` is `None`.
pub fn list(category: Option<&str>) -> impl Iterator<Item = &'static CatalogQuery> + '_ {
    CATALOG
        .iter()
        .filter(move |q| category.is_none_or(|c| q.category.eq_ignore_ascii_case(c)))
}

/// Distinct categories in catalog order.
pub fn categories() -> Vec<&'static str> {
    let mut seen: Vec<&'static str> = Vec::new();
    for query in CATALOG {
        if !seen.contains(&query.category) {
            seen.push(query.category);
        }
    }
    seen
}

impl CatalogQuery {
    /// Validate `args` and produce positional parameters.
    ///
    /// Unknown argument names and missing required arguments are rejected.
    /// An explicit JSON `null` counts as absent.
    pub fn bind_arguments(&self, args: &Map<String, JsonValue>) -> DbResult<Vec<QueryParam>> {
        if let Some(unknown) = args.keys().find(|k| !self.params.iter().any(|p| p.name == k.as_str())) {
            let accepted: Vec<&str> = self.params.iter().map(|p| p.name).collect();
            return Err(DbError::invalid_input(format!(
                "Unknown argument '{}' for catalog query '{}'. Accepted: [{}]",
                unknown,
                self.name,
                accepted.join(", ")
            )));
        }

        self.params
            .iter()
            .map(|param| match args.get(param.name) {
                Some(value) if !value.is_null() => param.convert(value),
                _ => param.default_value(self.name),
            })
            .collect()
    }
}

impl CatalogParam {
    fn convert(&self, value: &JsonValue) -> DbResult<QueryParam> {
        let converted = match (self.kind, value) {
            (ParamKind::Text, JsonValue::String(s)) => Some(QueryParam::String(s.clone())),
            (ParamKind::Integer, JsonValue::Number(n)) => n.as_i64().map(QueryParam::Int),
            (ParamKind::Integer, JsonValue::String(s)) => s.trim().parse().ok().map(QueryParam::Int),
            (ParamKind::Boolean, JsonValue::Bool(b)) => Some(QueryParam::Bool(*b)),
            (ParamKind::Boolean, JsonValue::String(s)) => parse_bool(s).map(QueryParam::Bool),
            _ => None,
        };

        converted.ok_or_else(|| {
            DbError::invalid_input(format!(
                "Argument '{}' must be {}, got {}",
                self.name,
                self.kind.expected(),
                value
            ))
        })
    }

    fn default_value(&self, query: &str) -> DbResult<QueryParam> {
        match self.default {
            ParamDefault::Required => Err(DbError::invalid_input(format!(
                "Missing required argument '{}' for catalog query '{}'",
                self.name, query
            ))),
            ParamDefault::Null => Ok(QueryParam::Null),
            ParamDefault::Value(raw) => self.convert(&JsonValue::String(raw.to_string())),
        }
    }
}

impl ParamKind {
    fn expected(self) -> &'static str {
        match self {
            Self::Text => "a string",
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
