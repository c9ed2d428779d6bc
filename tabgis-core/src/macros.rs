//! Tabgis core macros
//!
//! This module contains macros used by the value module:
//! 1. impl_value_from
//! 1. impl_try_from_value

/// Type conversion: standard type into Value. Used in `value.rs`.
///
/// Equivalent to:
///
/// ```rust,ignore
/// impl From<Option<bool>> for Value {
///     fn from(ov: Option<bool>) -> Self {
///         match ov {
///             Some(v) => Value::Bool(v),
///             None => Value::Null,
///         }
///     }
/// }
/// ```
///
/// and:
///
/// ```rust,ignore
/// impl From<bool> for Value {
///     fn from(v: bool) -> Self {
///         Value::Bool(v)
///     }
/// }
/// ```
macro_rules! impl_value_from {
    ($ftype:ty, $val_var:ident) => {
        impl From<$ftype> for $crate::Value {
            fn from(v: $ftype) -> Self {
                $crate::Value::$val_var(v)
            }
        }

        impl From<Option<$ftype>> for $crate::Value {
            fn from(ov: Option<$ftype>) -> Self {
                match ov {
                    Some(v) => $crate::Value::$val_var(v),
                    None => $crate::Value::Null,
                }
            }
        }
    };
}

pub(crate) use impl_value_from;

/// Type conversion: Value try_into `Option<T>`, where `T` already implements `TryFrom<Value>`.
///
/// Equivalent to:
///
/// ```rust,ignore
/// impl TryFrom<Value> for Option<bool> {
///     type Error = CoreError;
///     fn try_from(value: Value) -> Result<Self, Self::Error> {
///         match value {
///             Value::Null => Ok(None),
///             v => bool::try_from(v).map(Some),
///         }
///     }
/// }
/// ```
macro_rules! impl_try_from_value {
    ($($ftype:ty),* $(,)?) => {
        $(
            impl TryFrom<$crate::Value> for Option<$ftype> {
                type Error = $crate::CoreError;

                fn try_from(value: $crate::Value) -> Result<Self, Self::Error> {
                    match value {
                        $crate::Value::Null => Ok(None),
                        v => <$ftype>::try_from(v).map(Some),
                    }
                }
            }
        )*
    };
}

pub(crate) use impl_try_from_value;

/// Integer conversion: widen to i64 then narrow with a range check. Used in `value.rs`.
macro_rules! impl_try_from_value_integer {
    ($($ftype:ty => $hint:expr),* $(,)?) => {
        $(
            impl TryFrom<$crate::Value> for $ftype {
                type Error = $crate::CoreError;

                fn try_from(value: $crate::Value) -> Result<Self, Self::Error> {
                    let wide = value
                        .to_i64()
                        .ok_or_else(|| $crate::CoreError::new_conversion_error(&value, $hint))?;
                    <$ftype>::try_from(wide)
                        .map_err(|_| $crate::CoreError::new_conversion_error(&value, $hint))
                }
            }
        )*
    };
}

pub(crate) use impl_try_from_value_integer;
