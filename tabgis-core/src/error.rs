//! Core Error
//!
//! Errors raised by value conversion, identifier parsing and geometry decoding.

use std::fmt::Display;

use nom::error::{ErrorKind, ParseError};
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug)]
pub enum CommonError {
    Str(&'static str),
    String(String),
}

impl std::fmt::Display for CommonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommonError::Str(v) => write!(f, "{:?}", v),
            CommonError::String(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<&'static str> for CommonError {
    fn from(v: &'static str) -> Self {
        CommonError::Str(v)
    }
}

impl From<String> for CommonError {
    fn from(v: String) -> Self {
        CommonError::String(v)
    }
}

// ================================================================================================
// Nom error
// ================================================================================================

/// error type used by the binary geometry parsers
#[derive(Debug, PartialEq)]
pub struct NomError(String);

impl std::fmt::Display for NomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl NomError {
    pub fn new<T: Into<String>>(msg: T) -> Self {
        NomError(msg.into())
    }
}

impl<I> ParseError<I> for NomError {
    fn from_error_kind(_: I, kind: ErrorKind) -> Self {
        NomError(format!("nom error code: {:?}", kind))
    }

    fn append(_: I, kind: ErrorKind, other: Self) -> Self {
        NomError(format!("{}\nnom error code: {:?}", other, kind))
    }
}

// ================================================================================================
// CoreError
// ================================================================================================

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("common error {0}")]
    Common(CommonError),

    #[error("cannot convert {from} into {to}")]
    Conversion { from: String, to: String },

    #[error("invalid identifier `{0}`: {1}")]
    InvalidIdentifier(String, String),

    #[error("geometry error: {0}")]
    Geometry(String),
}

impl CoreError {
    pub fn new_common_error<T>(msg: T) -> Self
    where
        T: Into<CommonError>,
    {
        CoreError::Common(msg.into())
    }

    pub fn new_conversion_error<T1, T2>(from: T1, to: T2) -> CoreError
    where
        T1: Display,
        T2: Display,
    {
        CoreError::Conversion {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn new_identifier_error<T>(raw: T, info: &str) -> CoreError
    where
        T: Display,
    {
        CoreError::InvalidIdentifier(raw.to_string(), info.to_string())
    }
}

impl From<nom::Err<NomError>> for CoreError {
    fn from(e: nom::Err<NomError>) -> Self {
        match e {
            nom::Err::Incomplete(_) => CoreError::Geometry("truncated geometry blob".to_string()),
            nom::Err::Error(e) | nom::Err::Failure(e) => CoreError::Geometry(e.to_string()),
        }
    }
}
