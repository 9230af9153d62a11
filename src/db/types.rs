//! PostgreSQL row to JSON conversion.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Category decoders extract the value, falling back to the raw bytes
//!    when the typed decode does not apply
//!
//! Every statement runs over the extended protocol, so values arrive in
//! binary format. The fallback covers catalog domains such as
//! `sql_identifier`, enums and other text-like types sqlx has no mapping for.

use crate::models::Row;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::types::{Oid, PgTimeTz};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::{Column, Decode, Row as _, Type, TypeInfo, ValueRef};
use uuid::Uuid;

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Uuid,
    Array,
    Unknown,
}

/// Classify a PostgreSQL type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.ends_with("[]") || lower.starts_with('_') {
        return TypeCategory::Array;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }

    match lower.as_str() {
        "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "smallserial" | "serial"
        | "bigserial" | "oid" => TypeCategory::Integer,
        "bool" | "boolean" => TypeCategory::Boolean,
        "float4" | "float8" | "real" | "double precision" => TypeCategory::Float,
        "json" | "jsonb" => TypeCategory::Json,
        "bytea" => TypeCategory::Binary,
        "date" => TypeCategory::Date,
        "time" => TypeCategory::Time,
        "timetz" => TypeCategory::TimeTz,
        "timestamp" => TypeCategory::Timestamp,
        "timestamptz" => TypeCategory::TimestampTz,
        "uuid" => TypeCategory::Uuid,
        // text, varchar, enums, domains and anything without a decoder
        _ => TypeCategory::Unknown,
    }
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw NUMERIC values as strings.
/// This preserves the exact database representation, at any precision.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("NUMERIC")
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawDecimal(value.as_str()?.to_string())),
            PgValueFormat::Binary => numeric_to_string(value.as_bytes()?).map(RawDecimal),
        }
    }
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Render a binary NUMERIC (base-10000 digit groups) as decimal text.
///
/// Layout: `ndigits`, `weight`, `sign`, `dscale` (16 bits each), then
/// `ndigits` groups. `weight` is the power of 10000 of the first group.
fn numeric_to_string(bytes: &[u8]) -> Result<String, sqlx::error::BoxDynError> {
    let word = |i: usize| -> Result<u16, sqlx::error::BoxDynError> {
        bytes
            .get(i..i + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated NUMERIC value".into())
    };

    let ndigits = usize::from(word(0)?);
    let weight = i32::from(word(2)? as i16);
    let sign = word(4)?;
    let dscale = usize::from(word(6)?);

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let digits = (0..ndigits)
        .map(|i| word(8 + 2 * i))
        .collect::<Result<Vec<_>, _>>()?;
    let group = |idx: i32| -> u16 {
        usize::try_from(idx)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&group(0).to_string());
        for idx in 1..=weight {
            out.push_str(&format!("{:04}", group(idx)));
        }
    }

    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut idx = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", group(idx)));
            idx += 1;
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

/// Decode binary data to JSON value: UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> Row;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name());
                let value = decode_column(self, idx, category);
                (col.name().to_string(), value)
            })
            .collect()
    }
}

fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
    if is_null(row, idx) {
        return JsonValue::Null;
    }

    let typed = match category {
        TypeCategory::Decimal => decode_decimal(row, idx),
        TypeCategory::Integer => decode_integer(row, idx),
        TypeCategory::Boolean => decode_boolean(row, idx),
        TypeCategory::Float => decode_float(row, idx),
        TypeCategory::Binary => decode_binary_col(row, idx),
        TypeCategory::Json => decode_json(row, idx),
        TypeCategory::Date => decode_date(row, idx),
        TypeCategory::Time => decode_time(row, idx),
        TypeCategory::TimeTz => decode_timetz(row, idx),
        TypeCategory::Timestamp => decode_timestamp(row, idx),
        TypeCategory::TimestampTz => decode_timestamptz(row, idx),
        TypeCategory::Uuid => decode_uuid(row, idx),
        TypeCategory::Array => decode_array(row, idx),
        TypeCategory::Unknown => None,
    };

    typed.unwrap_or_else(|| decode_fallback(row, idx))
}

fn is_null(row: &PgRow, idx: usize) -> bool {
    row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true)
}

fn string<T: ToString>(v: T) -> JsonValue {
    JsonValue::String(v.to_string())
}

fn decode_decimal(row: &PgRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<RawDecimal, _>(idx)
        .ok()
        .map(|v| JsonValue::String(v.0))
}

fn decode_integer(row: &PgRow, idx: usize) -> Option<JsonValue> {
    if let Ok(v) = row.try_get::<i16, _>(idx) {
        return Some(JsonValue::Number(v.into()));
    }
    if let Ok(v) = row.try_get::<i32, _>(idx) {
        return Some(JsonValue::Number(v.into()));
    }
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Some(JsonValue::Number(v.into()));
    }
    if let Ok(v) = row.try_get::<Oid, _>(idx) {
        return Some(JsonValue::Number(v.0.into()));
    }
    None
}

fn decode_boolean(row: &PgRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<bool, _>(idx).ok().map(JsonValue::Bool)
}

fn decode_float(row: &PgRow, idx: usize) -> Option<JsonValue> {
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Some(float_value(v));
    }
    if let Ok(v) = row.try_get::<f32, _>(idx) {
        return Some(float_value(f64::from(v)));
    }
    None
}

/// NaN and infinities have no JSON number form.
fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn decode_binary_col(row: &PgRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<Vec<u8>, _>(idx)
        .ok()
        .map(|v| decode_binary_value(&v))
}

fn decode_json(row: &PgRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<JsonValue, _>(idx).ok()
}

fn decode_date(row: &PgRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<NaiveDate, _>(idx).ok().map(string)
}

fn decode_time(row: &PgRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<NaiveTime, _>(idx).ok().map(string)
}

fn decode_timetz(row: &PgRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<PgTimeTz<NaiveTime, FixedOffset>, _>(idx)
        .ok()
        .map(|v| JsonValue::String(format!("{}{}", v.time, v.offset)))
}

fn decode_timestamp(row: &PgRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<NaiveDateTime, _>(idx).ok().map(string)
}

fn decode_timestamptz(row: &PgRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<DateTime<Utc>, _>(idx)
        .ok()
        .map(|v| JsonValue::String(v.to_rfc3339()))
}

fn decode_uuid(row: &PgRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<Uuid, _>(idx).ok().map(string)
}

/// One-dimensional arrays of the common element types.
fn decode_array(row: &PgRow, idx: usize) -> Option<JsonValue> {
    fn elements<T>(items: Vec<Option<T>>, f: impl Fn(T) -> JsonValue) -> JsonValue {
        JsonValue::Array(
            items
                .into_iter()
                .map(|v| v.map(&f).unwrap_or(JsonValue::Null))
                .collect(),
        )
    }

    if let Ok(v) = row.try_get::<Vec<Option<String>>, _>(idx) {
        return Some(elements(v, JsonValue::String));
    }
    if let Ok(v) = row.try_get::<Vec<Option<i16>>, _>(idx) {
        return Some(elements(v, |n| JsonValue::Number(n.into())));
    }
    if let Ok(v) = row.try_get::<Vec<Option<i32>>, _>(idx) {
        return Some(elements(v, |n| JsonValue::Number(n.into())));
    }
    if let Ok(v) = row.try_get::<Vec<Option<i64>>, _>(idx) {
        return Some(elements(v, |n| JsonValue::Number(n.into())));
    }
    if let Ok(v) = row.try_get::<Vec<Option<f64>>, _>(idx) {
        return Some(elements(v, float_value));
    }
    if let Ok(v) = row.try_get::<Vec<Option<f32>>, _>(idx) {
        return Some(elements(v, |n| float_value(f64::from(n))));
    }
    if let Ok(v) = row.try_get::<Vec<Option<bool>>, _>(idx) {
        return Some(elements(v, JsonValue::Bool));
    }
    if let Ok(v) = row.try_get::<Vec<Option<Uuid>>, _>(idx) {
        return Some(elements(v, string));
    }
    None
}

/// Text-like values are UTF-8 in both wire formats. Anything else without a
/// decoder is returned as base64 of its wire bytes.
fn decode_fallback(row: &PgRow, idx: usize) -> JsonValue {
    let raw = match row.try_get_raw(idx) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(column = idx, error = %e, "Failed to read column");
            return JsonValue::Null;
        }
    };

    match raw.as_bytes() {
        Ok(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) if is_printable(s) => JsonValue::String(s.to_string()),
            _ => {
                use base64::{Engine as _, engine::general_purpose::STANDARD};
                JsonValue::String(STANDARD.encode(bytes))
            }
        },
        Err(e) => {
            tracing::warn!(column = idx, error = %e, "Failed to decode column");
            JsonValue::Null
        }
    }
}

fn is_printable(s: &str) -> bool {
    !s.chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}
