//! tabgis value
//!
//! This module contains the value type, which is the atomic unit of a fetched row.
//!
//! Conversions follow the usual SQL driver leniency: integers narrow with a range check,
//! strings parse into numbers and dates, and blobs decode into geometries.

use std::fmt::Display;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    impl_try_from_value, impl_try_from_value_integer, impl_value_from, CoreError, CoreResult,
    Geometry,
};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M:%S%.f";
const DATETIME_FMTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

// ================================================================================================
// Value & ValueType
// ================================================================================================

/// A single cell fetched from a data source.
#[derive(PartialEq, Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Decimal(Decimal),
    Bytes(Vec<u8>),
    Geometry(Geometry),
}

/// Logical column type. `Null` stands for a column whose type is only known per value.
#[derive(PartialEq, Clone, Copy, Debug, Deserialize, Serialize, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Date,
    Time,
    DateTime,
    Decimal,
    Bytes,
    Geometry,
    Null,
}

impl Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValueType::Bool => "bool",
            ValueType::I8 => "i8",
            ValueType::I16 => "i16",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::String => "string",
            ValueType::Date => "date",
            ValueType::Time => "time",
            ValueType::DateTime => "datetime",
            ValueType::Decimal => "decimal",
            ValueType::Bytes => "bytes",
            ValueType::Geometry => "geometry",
            ValueType::Null => "null",
        };
        write!(f, "{s}")
    }
}

impl ValueType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::I8
                | ValueType::I16
                | ValueType::I32
                | ValueType::I64
                | ValueType::F32
                | ValueType::F64
                | ValueType::Decimal
        )
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::I8(_) => ValueType::I8,
            Value::I16(_) => ValueType::I16,
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::String(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::Time(_) => ValueType::Time,
            Value::DateTime(_) => ValueType::DateTime,
            Value::Decimal(_) => ValueType::Decimal,
            Value::Bytes(_) => ValueType::Bytes,
            Value::Geometry(_) => ValueType::Geometry,
        }
    }

    /// integral view of the value, if it has an exact one
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(v) => Some(*v as i64),
            Value::I8(v) => Some(*v as i64),
            Value::I16(v) => Some(*v as i64),
            Value::I32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            Value::F32(v) if v.fract() == 0.0 => v.to_i64(),
            Value::F64(v) if v.fract() == 0.0 => v.to_i64(),
            Value::Decimal(v) if v.fract().is_zero() => v.to_i64(),
            Value::String(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::I8(v) => Some(*v as f64),
            Value::I16(v) => Some(*v as f64),
            Value::I32(v) => Some(*v as f64),
            Value::I64(v) => Some(*v as f64),
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            Value::Decimal(v) => v.to_f64(),
            Value::String(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    /// Coerce a value into the given logical type.
    ///
    /// `Null` values and the `Null` type pass through untouched.
    pub fn cast(self, value_type: &ValueType) -> CoreResult<Value> {
        if self.is_null() || self.value_type() == *value_type {
            return Ok(self);
        }
        let v = match value_type {
            ValueType::Null => self,
            ValueType::Bool => Value::Bool(bool::try_from(self)?),
            ValueType::I8 => Value::I8(i8::try_from(self)?),
            ValueType::I16 => Value::I16(i16::try_from(self)?),
            ValueType::I32 => Value::I32(i32::try_from(self)?),
            ValueType::I64 => Value::I64(i64::try_from(self)?),
            ValueType::F32 => Value::F32(f32::try_from(self)?),
            ValueType::F64 => Value::F64(f64::try_from(self)?),
            ValueType::String => Value::String(String::try_from(self)?),
            ValueType::Date => Value::Date(NaiveDate::try_from(self)?),
            ValueType::Time => Value::Time(NaiveTime::try_from(self)?),
            ValueType::DateTime => Value::DateTime(NaiveDateTime::try_from(self)?),
            ValueType::Decimal => Value::Decimal(Decimal::try_from(self)?),
            ValueType::Bytes => Value::Bytes(Vec::<u8>::try_from(self)?),
            ValueType::Geometry => Value::Geometry(Geometry::try_from(self)?),
        };
        Ok(v)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{}", v.format(DATE_FMT)),
            Value::Time(v) => write!(f, "{}", v.format(TIME_FMT)),
            Value::DateTime(v) => write!(f, "{}", v.format(DATETIME_FMTS[0])),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Bytes(v) => {
                write!(f, "0x")?;
                v.iter().try_for_each(|b| write!(f, "{b:02x}"))
            }
            Value::Geometry(v) => write!(f, "{v}"),
        }
    }
}

// ================================================================================================
// From X to `Value`
// ================================================================================================

impl_value_from!(bool, Bool);
impl_value_from!(i8, I8);
impl_value_from!(i16, I16);
impl_value_from!(i32, I32);
impl_value_from!(i64, I64);
impl_value_from!(f32, F32);
impl_value_from!(f64, F64);
impl_value_from!(String, String);
impl_value_from!(NaiveDate, Date);
impl_value_from!(NaiveTime, Time);
impl_value_from!(NaiveDateTime, DateTime);
impl_value_from!(Decimal, Decimal);
impl_value_from!(Vec<u8>, Bytes);
impl_value_from!(Geometry, Geometry);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v.naive_utc())
    }
}

impl From<Option<DateTime<Utc>>> for Value {
    fn from(ov: Option<DateTime<Utc>>) -> Self {
        ov.map(Value::from).unwrap_or_default()
    }
}

// ================================================================================================
// TryFrom `Value` to X
// ================================================================================================

impl_try_from_value_integer!(
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
);

impl TryFrom<Value> for f64 {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value
            .to_f64()
            .ok_or_else(|| CoreError::new_conversion_error(&value, "f64"))
    }
}

impl TryFrom<Value> for f32 {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::F32(v) => Ok(v),
            v => match v.to_f64() {
                // finite values beyond the f32 range would become infinite
                Some(f) if f.is_finite() && f.abs() > f32::MAX as f64 => {
                    Err(CoreError::new_conversion_error(&v, "f32"))
                }
                Some(f) => Ok(f as f32),
                None => Err(CoreError::new_conversion_error(&v, "f32")),
            },
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::Bool(v) => Ok(*v),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(CoreError::new_conversion_error(&value, "bool")),
            },
            v => v
                .to_i64()
                .map(|i| i != 0)
                .ok_or_else(|| CoreError::new_conversion_error(&value, "bool")),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Err(CoreError::new_conversion_error(&value, "String")),
            Value::String(v) => Ok(v),
            v => Ok(v.to_string()),
        }
    }
}

impl TryFrom<Value> for char {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if let Value::String(s) = &value {
            let trimmed = s.trim_end_matches(' ');
            let mut chars = trimmed.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => return Ok(c),
                // a blank CHAR(1) is padded to a single space
                (None, _) if !s.is_empty() => return Ok(' '),
                _ => {}
            }
        }
        Err(CoreError::new_conversion_error(&value, "char"))
    }
}

impl TryFrom<Value> for NaiveDate {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::Date(v) => Ok(*v),
            Value::DateTime(v) => Ok(v.date()),
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), DATE_FMT)
                .map_err(|_| CoreError::new_conversion_error(&value, "date")),
            _ => Err(CoreError::new_conversion_error(&value, "date")),
        }
    }
}

impl TryFrom<Value> for NaiveTime {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::Time(v) => Ok(*v),
            Value::DateTime(v) => Ok(v.time()),
            Value::String(s) => NaiveTime::parse_from_str(s.trim(), TIME_FMT)
                .map_err(|_| CoreError::new_conversion_error(&value, "time")),
            _ => Err(CoreError::new_conversion_error(&value, "time")),
        }
    }
}

impl TryFrom<Value> for NaiveDateTime {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::DateTime(v) => Ok(*v),
            Value::Date(v) => v
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| CoreError::new_conversion_error(&value, "datetime")),
            Value::String(s) => DATETIME_FMTS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
                .ok_or_else(|| CoreError::new_conversion_error(&value, "datetime")),
            _ => Err(CoreError::new_conversion_error(&value, "datetime")),
        }
    }
}

impl TryFrom<Value> for Decimal {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let d = match &value {
            Value::Decimal(v) => Some(*v),
            Value::F32(v) => Decimal::from_f32(*v),
            Value::F64(v) => Decimal::from_f64(*v),
            Value::String(s) => s.trim().parse().ok(),
            v => v.to_i64().map(Decimal::from),
        };
        d.ok_or_else(|| CoreError::new_conversion_error(&value, "decimal"))
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bytes(v) => Ok(v),
            Value::String(v) => Ok(v.into_bytes()),
            Value::Geometry(g) => Ok(g.to_ewkb()),
            v => Err(CoreError::new_conversion_error(&v, "bytes")),
        }
    }
}

impl TryFrom<Value> for Geometry {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Geometry(g) => Ok(g),
            Value::Bytes(b) => Geometry::from_bytes(&b),
            v => Err(CoreError::new_conversion_error(&v, "geometry")),
        }
    }
}

impl_try_from_value!(
    bool,
    i8,
    i16,
    i32,
    i64,
    f32,
    f64,
    char,
    String,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    Decimal,
    Vec<u8>,
    Geometry,
);

#[cfg(test)]
mod test_value {
    use super::*;

    #[test]
    fn integer_narrowing_checks_range() {
        assert_eq!(i8::try_from(Value::I64(12)).unwrap(), 12);
        assert!(i8::try_from(Value::I64(300)).is_err());
        assert_eq!(i32::try_from(Value::String(" 42 ".into())).unwrap(), 42);
        assert_eq!(i64::try_from(Value::F64(3.0)).unwrap(), 3);
        assert!(i64::try_from(Value::F64(3.5)).is_err());
    }

    #[test]
    fn float_narrowing_checks_range() {
        assert!(i64::try_from(Value::F64(1e30)).is_err());
        assert!(i64::try_from(Value::F64(-1e30)).is_err());
        assert!(i32::try_from(Value::F32(f32::MAX)).is_err());
        assert!(i64::try_from(Value::F64(f64::NAN)).is_err());
        assert_eq!(i64::try_from(Value::F64(-4096.0)).unwrap(), -4096);

        assert!(matches!(
            f32::try_from(Value::F64(1e300)),
            Err(CoreError::Conversion { .. })
        ));
        assert!(f32::try_from(Value::Decimal(Decimal::MAX)).is_ok());
        assert_eq!(f32::try_from(Value::F64(-0.25)).unwrap(), -0.25);
        assert_eq!(f32::try_from(Value::F64(f64::INFINITY)).unwrap(), f32::INFINITY);
    }

    #[test]
    fn null_only_converts_into_option() {
        assert!(i32::try_from(Value::Null).is_err());
        assert!(String::try_from(Value::Null).is_err());
        assert_eq!(Option::<i32>::try_from(Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::try_from(Value::I16(7)).unwrap(), Some(7));
    }

    #[test]
    fn bool_and_char_coercion() {
        assert!(bool::try_from(Value::I64(1)).unwrap());
        assert!(!bool::try_from(Value::String("false".into())).unwrap());
        assert!(bool::try_from(Value::String("maybe".into())).is_err());

        assert_eq!(char::try_from(Value::String("a".into())).unwrap(), 'a');
        assert_eq!(char::try_from(Value::String("b   ".into())).unwrap(), 'b');
        assert!(char::try_from(Value::String("ab".into())).is_err());
    }

    #[test]
    fn cast_into_declared_type() {
        let v = Value::I64(1).cast(&ValueType::Bool).unwrap();
        assert_eq!(v, Value::Bool(true));

        let v = Value::F64(2.5).cast(&ValueType::F32).unwrap();
        assert_eq!(v, Value::F32(2.5));

        let v = Value::String("2021-03-04".into())
            .cast(&ValueType::Date)
            .unwrap();
        assert_eq!(v, Value::Date(NaiveDate::from_ymd_opt(2021, 3, 4).unwrap()));

        let v = Value::Null.cast(&ValueType::I32).unwrap();
        assert!(v.is_null());

        let e = Value::String("abc".into()).cast(&ValueType::I32).unwrap_err();
        assert!(matches!(e, CoreError::Conversion { .. }));
    }

    #[test]
    fn display_values() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bytes(vec![0x01, 0xab]).to_string(), "0x01ab");
        assert_eq!(Value::F64(1.5).to_string(), "1.5");
    }
}
