//! Sql types
//!
//! Based on Sqlx types mapping:
//! - Postgres: https://docs.rs/sqlx/latest/sqlx/postgres/types/index.html
//! - SQLite: https://docs.rs/sqlx/latest/sqlx/sqlite/types/index.html
//!
//! PostgreSQL columns are decoded through the statically typed `PG_TMAP` markers. SQLite
//! values carry their own storage class, so they are read as such and then coerced to the
//! declared column type.

use std::{collections::HashMap, marker::PhantomData};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{postgres::PgRow, sqlite::SqliteRow, Column as SColumn, Row as SRow, TypeInfo, ValueRef};
use tabgis_core::{Decimal, Geometry, Value, ValueType};

use crate::macros::{impl_sql_type_tag_marker, tmap_pair};
use crate::SqlResult;

// ================================================================================================
// DriverRow
// ================================================================================================

/// A row as handed out by the driver.
pub enum DriverRow {
    Pg(PgRow),
    Sqlite(SqliteRow),
}

impl DriverRow {
    pub fn len(&self) -> usize {
        match self {
            DriverRow::Pg(r) => r.len(),
            DriverRow::Sqlite(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_name(&self, idx: usize) -> Option<&str> {
        match self {
            DriverRow::Pg(r) => r.columns().get(idx).map(|c| c.name()),
            DriverRow::Sqlite(r) => r.columns().get(idx).map(|c| c.name()),
        }
    }

    /// Decode the cell at `idx`. `hint` is the logical type of the column, `ValueType::Null`
    /// meaning the column is dynamically typed.
    pub fn value(&self, idx: usize, hint: &ValueType) -> SqlResult<Value> {
        let value = match self {
            DriverRow::Pg(r) => pg_value(r, idx)?,
            DriverRow::Sqlite(r) => sqlite_value(r, idx)?,
        };
        Ok(coerce(value, hint))
    }

    /// every cell of the row, decoded with the matching hint
    pub fn values(&self, hints: &[ValueType]) -> SqlResult<Vec<Value>> {
        (0..self.len())
            .map(|i| self.value(i, hints.get(i).unwrap_or(&ValueType::Null)))
            .collect()
    }
}

impl From<PgRow> for DriverRow {
    fn from(r: PgRow) -> Self {
        Self::Pg(r)
    }
}

impl From<SqliteRow> for DriverRow {
    fn from(r: SqliteRow) -> Self {
        Self::Sqlite(r)
    }
}

/// Values that do not match the column type are kept as they came from the driver.
fn coerce(value: Value, hint: &ValueType) -> Value {
    if *hint == ValueType::Null || value.is_null() || value.value_type() == *hint {
        return value;
    }
    value.clone().cast(hint).unwrap_or(value)
}

fn pg_value(row: &PgRow, idx: usize) -> SqlResult<Value> {
    let type_name = row.try_column(idx)?.type_info().name().to_uppercase();
    match PG_TMAP.get(type_name.as_str()) {
        Some(marker) => marker.extract_value(row, idx),
        None => {
            // enums, domains, citext and friends: try text first, raw bytes otherwise
            if let Ok(v) = row.try_get_unchecked::<Option<String>, _>(idx) {
                return Ok(Value::from(v));
            }
            let v: Option<Vec<u8>> = row.try_get_unchecked(idx)?;
            Ok(Value::from(v))
        }
    }
}

fn sqlite_value(row: &SqliteRow, idx: usize) -> SqlResult<Value> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();
    let v = match storage.as_str() {
        "INTEGER" => Value::I64(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" => Value::F64(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        _ => Value::String(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(v)
}

// ================================================================================================
// SqlTypeTag
// ================================================================================================

/// Sql type tag is used to tag static str to Rust primitive type and user customized type
#[derive(Debug)]
pub(crate) struct SqlTypeTag<T>(&'static str, PhantomData<T>)
where
    T: Into<Value>;

impl<T> SqlTypeTag<T>
where
    T: Into<Value>,
{
    pub(crate) fn new(st: &'static str) -> Self {
        SqlTypeTag(st, PhantomData)
    }
}

/// Behavior of SqlTypeTag, used to create trait objects and saving them to the global static HashMap
pub(crate) trait SqlTypeTagMarker: Send + Sync {
    /// to &str
    fn to_str(&self) -> &str;

    /// to datatype
    fn to_dtype(&self) -> ValueType;

    /// extract Value from a PostgreSQL row, SQL `NULL` giving `Value::Null`
    fn extract_value(&self, row: &PgRow, idx: usize) -> SqlResult<Value>;
}

/// tmap value type
pub(crate) type Sttm = Box<dyn SqlTypeTagMarker>;

impl PartialEq<str> for Sttm {
    fn eq(&self, other: &str) -> bool {
        self.to_str() == other
    }
}

impl_sql_type_tag_marker!(bool, Bool);
impl_sql_type_tag_marker!(i8, I8);
impl_sql_type_tag_marker!(i16, I16);
impl_sql_type_tag_marker!(i32, I32);
impl_sql_type_tag_marker!(i64, I64);
impl_sql_type_tag_marker!(f32, F32);
impl_sql_type_tag_marker!(f64, F64);
impl_sql_type_tag_marker!(String, String);
impl_sql_type_tag_marker!(NaiveDate, Date);
impl_sql_type_tag_marker!(NaiveTime, Time);
impl_sql_type_tag_marker!(NaiveDateTime, DateTime);
impl_sql_type_tag_marker!(DateTime<Utc>, DateTime);
impl_sql_type_tag_marker!(Decimal, Decimal);
impl_sql_type_tag_marker!(Vec<u8>, Bytes);

// PostGIS sends geometries as binary EWKB, which sqlx has no decoder for
impl SqlTypeTagMarker for SqlTypeTag<Geometry> {
    fn to_str(&self) -> &str {
        self.0
    }

    fn to_dtype(&self) -> ValueType {
        ValueType::Geometry
    }

    fn extract_value(&self, row: &PgRow, idx: usize) -> SqlResult<Value> {
        let bytes: Option<Vec<u8>> = row.try_get_unchecked(idx)?;
        match bytes {
            Some(b) => Ok(Value::Geometry(Geometry::from_bytes(&b)?)),
            None => Ok(Value::Null),
        }
    }
}

// ================================================================================================
// static types mapping
// ================================================================================================

lazy_static::lazy_static! {
    /// Postgres Type Mapping: &'static str -> SqlTypeTag instance
    pub(crate) static ref PG_TMAP: HashMap<&'static str, Sttm> = {
        HashMap::from([
            tmap_pair!("BOOL", bool),
            tmap_pair!("\"CHAR\"", i8),
            tmap_pair!("INT2", i16),
            tmap_pair!("SMALLINT", i16),
            tmap_pair!("INT4", i32),
            tmap_pair!("INT", i32),
            tmap_pair!("INT8", i64),
            tmap_pair!("BIGINT", i64),
            tmap_pair!("FLOAT4", f32),
            tmap_pair!("REAL", f32),
            tmap_pair!("FLOAT8", f64),
            tmap_pair!("DOUBLE PRECISION", f64),
            tmap_pair!("TEXT", String),
            tmap_pair!("VARCHAR", String),
            tmap_pair!("BPCHAR", String),
            tmap_pair!("NAME", String),
            tmap_pair!("DATE", NaiveDate),
            tmap_pair!("TIME", NaiveTime),
            tmap_pair!("TIMESTAMP", NaiveDateTime),
            tmap_pair!("TIMESTAMPTZ", DateTime<Utc>),
            tmap_pair!("NUMERIC", Decimal),
            tmap_pair!("BYTEA", Vec<u8>),
            tmap_pair!("GEOMETRY", Geometry),
            tmap_pair!("GEOGRAPHY", Geometry),
        ])
    };

    /// Sqlite declared type -> logical type. Declared types are free text in SQLite, the
    /// lookup key is upper-cased with any `(n, m)` suffix removed.
    pub(crate) static ref SQLITE_TMAP: HashMap<&'static str, ValueType> = {
        HashMap::from([
            ("BOOLEAN", ValueType::Bool),
            ("BOOL", ValueType::Bool),
            ("TINYINT", ValueType::I8),
            ("SMALLINT", ValueType::I16),
            ("INT2", ValueType::I16),
            ("INT", ValueType::I32),
            ("INT4", ValueType::I32),
            ("MEDIUMINT", ValueType::I32),
            ("INTEGER", ValueType::I64),
            ("BIGINT", ValueType::I64),
            ("INT8", ValueType::I64),
            ("FLOAT4", ValueType::F32),
            ("REAL", ValueType::F64),
            ("FLOAT", ValueType::F64),
            ("DOUBLE", ValueType::F64),
            ("DOUBLE PRECISION", ValueType::F64),
            ("VARCHAR", ValueType::String),
            ("CHAR", ValueType::String),
            ("CHARACTER", ValueType::String),
            ("NCHAR", ValueType::String),
            ("NVARCHAR", ValueType::String),
            ("TEXT", ValueType::String),
            ("CLOB", ValueType::String),
            ("DATE", ValueType::Date),
            ("TIME", ValueType::Time),
            ("DATETIME", ValueType::DateTime),
            ("TIMESTAMP", ValueType::DateTime),
            ("DECIMAL", ValueType::Decimal),
            ("NUMERIC", ValueType::Decimal),
            ("BLOB", ValueType::Bytes),
            ("GEOMETRY", ValueType::Geometry),
            ("POINT", ValueType::Geometry),
            ("LINESTRING", ValueType::Geometry),
            ("POLYGON", ValueType::Geometry),
            ("MULTIPOINT", ValueType::Geometry),
            ("MULTILINESTRING", ValueType::Geometry),
            ("MULTIPOLYGON", ValueType::Geometry),
            ("GEOMETRYCOLLECTION", ValueType::Geometry),
        ])
    };
}

/// logical type of a PostgreSQL type name, `Null` for names the decoder does not know
pub(crate) fn pg_value_type(type_name: &str) -> ValueType {
    PG_TMAP
        .get(type_name.to_uppercase().as_str())
        .map(|m| m.to_dtype())
        .unwrap_or(ValueType::Null)
}

/// logical type of a SQLite declared type, falling back to the column affinity rules
pub(crate) fn sqlite_value_type(declared: &str) -> ValueType {
    let key = declared
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_uppercase();
    if key.is_empty() {
        return ValueType::Null;
    }
    if let Some(t) = SQLITE_TMAP.get(key.as_str()) {
        return *t;
    }

    if key.contains("INT") {
        ValueType::I64
    } else if key.contains("CHAR") || key.contains("CLOB") || key.contains("TEXT") {
        ValueType::String
    } else if key.contains("BLOB") {
        ValueType::Bytes
    } else if key.contains("REAL") || key.contains("FLOA") || key.contains("DOUB") {
        ValueType::F64
    } else {
        ValueType::Null
    }
}

/// PostgreSQL type used to cast client-side literals
pub(crate) fn pg_cast_type(value_type: &ValueType) -> &'static str {
    match value_type {
        ValueType::Bool => "BOOLEAN",
        ValueType::I8 | ValueType::I16 => "SMALLINT",
        ValueType::I32 => "INTEGER",
        ValueType::I64 => "BIGINT",
        ValueType::F32 => "REAL",
        ValueType::F64 => "DOUBLE PRECISION",
        ValueType::String | ValueType::Null => "TEXT",
        ValueType::Date => "DATE",
        ValueType::Time => "TIME",
        ValueType::DateTime => "TIMESTAMP",
        ValueType::Decimal => "NUMERIC",
        ValueType::Bytes => "BYTEA",
        ValueType::Geometry => "geometry",
    }
}

#[cfg(test)]
mod test_types {
    use super::*;

    #[test]
    fn sqlite_declared_types() {
        assert_eq!(sqlite_value_type("INTEGER"), ValueType::I64);
        assert_eq!(sqlite_value_type("int"), ValueType::I32);
        assert_eq!(sqlite_value_type("VARCHAR(20)"), ValueType::String);
        assert_eq!(sqlite_value_type("decimal(10, 2)"), ValueType::Decimal);
        assert_eq!(sqlite_value_type("POINT"), ValueType::Geometry);
        assert_eq!(sqlite_value_type("UNSIGNED BIG INT"), ValueType::I64);
        assert_eq!(sqlite_value_type("NATIVE CHARACTER"), ValueType::String);
        assert_eq!(sqlite_value_type(""), ValueType::Null);
        assert_eq!(sqlite_value_type("JSONB"), ValueType::Null);
    }

    #[test]
    fn pg_type_names() {
        assert_eq!(pg_value_type("int4"), ValueType::I32);
        assert_eq!(pg_value_type("TIMESTAMPTZ"), ValueType::DateTime);
        assert_eq!(pg_value_type("geometry"), ValueType::Geometry);
        assert_eq!(pg_value_type("citext"), ValueType::Null);
        assert!(PG_TMAP.get("BOOL").map(|m| m == "BOOL").unwrap_or(false));
    }

    #[test]
    fn coerce_keeps_mismatched_values() {
        assert_eq!(coerce(Value::I64(3), &ValueType::I32), Value::I32(3));
        assert_eq!(coerce(Value::I64(1), &ValueType::Bool), Value::Bool(true));
        assert_eq!(
            coerce(Value::String("x".into()), &ValueType::I32),
            Value::String("x".into())
        );
        assert_eq!(coerce(Value::I64(7), &ValueType::Null), Value::I64(7));
    }
}
