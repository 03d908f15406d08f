//! PostgreSQL value decoding.
//!
//! Rows arrive in one of two wire formats: text (simple-query protocol, used
//! for statements without parameters) and binary (extended protocol, used
//! when parameters are bound). Conversion to JSON happens in two phases:
//! 1. `categorize_type` classifies the column type name
//! 2. a per-category decoder extracts the value, handling both formats

use crate::models::RowRecord;
use serde_json::Value as JsonValue;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::{Column, Decode, Postgres, Row, Type, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for PostgreSQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    SmallInt,
    Integer,
    BigInt,
    Oid,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    TextArray,
    IntArray,
    Unknown,
}

/// Classify a type name as reported by `PgTypeInfo::name()`.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    match type_name.to_ascii_uppercase().as_str() {
        "INT2" | "SMALLINT" | "SMALLSERIAL" => TypeCategory::SmallInt,
        "INT4" | "INT" | "INTEGER" | "SERIAL" => TypeCategory::Integer,
        "INT8" | "BIGINT" | "BIGSERIAL" => TypeCategory::BigInt,
        "OID" | "XID" | "CID" => TypeCategory::Oid,
        "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE PRECISION" => TypeCategory::Float,
        "NUMERIC" | "DECIMAL" => TypeCategory::Decimal,
        "BOOL" | "BOOLEAN" => TypeCategory::Boolean,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" | "CHARACTER VARYING" | "CITEXT" => {
            TypeCategory::Text
        }
        "BYTEA" => TypeCategory::Binary,
        "JSON" | "JSONB" => TypeCategory::Json,
        "UUID" => TypeCategory::Uuid,
        "TIMESTAMP" => TypeCategory::Timestamp,
        "TIMESTAMPTZ" => TypeCategory::TimestampTz,
        "DATE" => TypeCategory::Date,
        "TIME" => TypeCategory::Time,
        "TEXT[]" | "VARCHAR[]" | "NAME[]" | "BPCHAR[]" | "_TEXT" | "_VARCHAR" | "_NAME" => {
            TypeCategory::TextArray
        }
        "INT2[]" | "INT4[]" | "INT8[]" | "_INT2" | "_INT4" | "_INT8" => TypeCategory::IntArray,
        _ => TypeCategory::Unknown,
    }
}

// =============================================================================
// Wrapper Types
// =============================================================================

/// Exact NUMERIC value rendered as a string.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_ascii_uppercase();
        name == "NUMERIC" || name == "DECIMAL"
    }
}

impl<'r> Decode<'r, Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawDecimal(
                <&str as Decode<Postgres>>::decode(value)?.to_string(),
            )),
            PgValueFormat::Binary => {
                let bytes = <&[u8] as Decode<Postgres>>::decode(value)?;
                numeric_binary_to_string(bytes).map(RawDecimal)
            }
        }
    }
}

/// Any value, decoded without a type check.
///
/// Text-format values come through verbatim, which is what `regclass`,
/// `interval`, `inet` and enum columns look like to a psql user. Binary values
/// are kept as text when they are valid UTF-8 and base64-encoded otherwise.
#[derive(Debug)]
pub struct RawValue(pub JsonValue);

impl Type<Postgres> for RawValue {
    fn type_info() -> PgTypeInfo {
        <&str as Type<Postgres>>::type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'r> Decode<'r, Postgres> for RawValue {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawValue(JsonValue::String(
                <&str as Decode<Postgres>>::decode(value)?.to_string(),
            ))),
            PgValueFormat::Binary => {
                let bytes = <&[u8] as Decode<Postgres>>::decode(value)?;
                Ok(RawValue(decode_binary_value(bytes, true)))
            }
        }
    }
}

/// Render the binary NUMERIC wire format (base-10000 digit groups).
pub fn numeric_binary_to_string(buf: &[u8]) -> Result<String, BoxDynError> {
    const NUMERIC_NEG: u16 = 0x4000;
    const NUMERIC_NAN: u16 = 0xC000;
    const NUMERIC_PINF: u16 = 0xD000;
    const NUMERIC_NINF: u16 = 0xF000;

    let read_u16 = |at: usize| -> Result<u16, BoxDynError> {
        buf.get(at..at + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated NUMERIC value".into())
    };

    let ndigits = read_u16(0)? as usize;
    let weight = read_u16(2)? as i16 as i32;
    let sign = read_u16(4)?;
    let dscale = read_u16(6)? as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let digits = (0..ndigits)
        .map(|i| read_u16(8 + i * 2).map(|d| d as i16))
        .collect::<Result<Vec<i16>, _>>()?;
    let group = |i: i32| -> i16 {
        if i < 0 {
            0
        } else {
            digits.get(i as usize).copied().unwrap_or(0)
        }
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&group(0).to_string());
        for i in 1..=weight {
            out.push_str(&format!("{:04}", group(i)));
        }
    }

    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", group(i)));
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }

    Ok(out)
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Decode binary data to JSON value.
///
/// If `decode_binary` is true, attempts to decode as UTF-8 text first.
/// Falls back to base64 encoding if not valid UTF-8 or if `decode_binary` is false.
pub fn decode_binary_value(bytes: &[u8], decode_binary: bool) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    if decode_binary {
        if let Ok(s) = std::str::from_utf8(bytes) {
            return JsonValue::String(s.to_string());
        }
    }
    JsonValue::String(STANDARD.encode(bytes))
}

// =============================================================================
// Row Conversion
// =============================================================================

/// Conversion of a driver row into a [`RowRecord`].
pub trait RowToJson {
    /// Column name to value, in column order.
    fn to_record(&self) -> RowRecord;

    fn column_names(&self) -> Vec<String>;
}

impl RowToJson for PgRow {
    fn to_record(&self) -> RowRecord {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name());
                (col.name().to_string(), decode_column(self, idx, category))
            })
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }
}

fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
    let decoded: Result<Option<JsonValue>, sqlx::Error> = match category {
        TypeCategory::SmallInt => get::<i16>(row, idx).map(|v| v.map(JsonValue::from)),
        TypeCategory::Integer => get::<i32>(row, idx).map(|v| v.map(JsonValue::from)),
        TypeCategory::BigInt => get::<i64>(row, idx).map(|v| v.map(JsonValue::from)),
        TypeCategory::Oid => get::<Oid>(row, idx).map(|v| v.map(|oid| JsonValue::from(oid.0))),
        TypeCategory::Float => get::<f64>(row, idx)
            .or_else(|_| get::<f32>(row, idx).map(|v| v.map(f64::from)))
            .map(|v| v.map(float_value)),
        TypeCategory::Decimal => get::<RawDecimal>(row, idx).map(|v| v.map(|d| JsonValue::String(d.0))),
        TypeCategory::Boolean => get::<bool>(row, idx).map(|v| v.map(JsonValue::Bool)),
        TypeCategory::Text => get::<String>(row, idx).map(|v| v.map(JsonValue::String)),
        TypeCategory::Binary => {
            get::<Vec<u8>>(row, idx).map(|v| v.map(|b| decode_binary_value(&b, false)))
        }
        TypeCategory::Json => get::<JsonValue>(row, idx),
        TypeCategory::Uuid => {
            get::<uuid::Uuid>(row, idx).map(|v| v.map(|u| JsonValue::String(u.to_string())))
        }
        TypeCategory::Timestamp => get::<chrono::NaiveDateTime>(row, idx)
            .map(|v| v.map(|t| JsonValue::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        TypeCategory::TimestampTz => get::<chrono::DateTime<chrono::Utc>>(row, idx)
            .map(|v| v.map(|t| JsonValue::String(t.to_rfc3339()))),
        TypeCategory::Date => get::<chrono::NaiveDate>(row, idx)
            .map(|v| v.map(|d| JsonValue::String(d.to_string()))),
        TypeCategory::Time => get::<chrono::NaiveTime>(row, idx)
            .map(|v| v.map(|t| JsonValue::String(t.to_string()))),
        TypeCategory::TextArray => get::<Vec<String>>(row, idx).map(|v| v.map(JsonValue::from)),
        TypeCategory::IntArray => get::<Vec<i64>>(row, idx)
            .or_else(|_| get::<Vec<i32>>(row, idx).map(|v| v.map(widen)))
            .or_else(|_| get::<Vec<i16>>(row, idx).map(|v| v.map(widen)))
            .map(|v| v.map(JsonValue::from)),
        TypeCategory::Unknown => return decode_raw(row, idx),
    };

    match decoded {
        Ok(Some(value)) => value,
        Ok(None) => JsonValue::Null,
        Err(e) => {
            tracing::debug!(column = idx, ?category, error = %e, "Typed decode failed, using raw value");
            decode_raw(row, idx)
        }
    }
}

fn decode_raw(row: &PgRow, idx: usize) -> JsonValue {
    match row.try_get::<Option<RawValue>, _>(idx) {
        Ok(Some(raw)) => raw.0,
        Ok(None) => JsonValue::Null,
        Err(e) => {
            tracing::error!(column = idx, "Failed to decode column: {:?}", e);
            JsonValue::Null
        }
    }
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>, sqlx::Error>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn widen<T: Into<i64>>(values: Vec<T>) -> Vec<i64> {
    values.into_iter().map(Into::into).collect()
}
