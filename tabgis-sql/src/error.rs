//! Tabgis sql error
//!
//! This module contains the error types raised by the SQL layer.

use tabgis_core::{CommonError, CoreError};
use thiserror::Error;

pub type SqlResult<T> = Result<T, SqlError>;

#[derive(Error, Debug)]
pub enum SqlError {
    #[error("common error {0}")]
    Common(CommonError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid builder state: {0}")]
    InvalidBuilderState(String),

    #[error("incomplete query: {0}")]
    IncompleteQuery(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("cannot convert {from} into {to}")]
    TypeConversion { from: String, to: String },

    #[error("{0} is closed")]
    ClosedResource(&'static str),

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Core(CoreError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqlError {
    pub fn new_common_error<T>(msg: T) -> SqlError
    where
        T: Into<CommonError>,
    {
        SqlError::Common(msg.into())
    }

    pub fn new_connection_error<T: std::fmt::Display>(e: T) -> SqlError {
        SqlError::Connection(e.to_string())
    }

    pub fn new_builder_state_error<T: Into<String>>(msg: T) -> SqlError {
        SqlError::InvalidBuilderState(msg.into())
    }

    pub fn new_incomplete_query_error<T: Into<String>>(msg: T) -> SqlError {
        SqlError::IncompleteQuery(msg.into())
    }

    pub fn new_type_mismatch_error<T: Into<String>>(msg: T) -> SqlError {
        SqlError::TypeMismatch(msg.into())
    }

    pub fn new_unsupported_error<T: Into<String>>(msg: T) -> SqlError {
        SqlError::Unsupported(msg.into())
    }
}

impl From<CoreError> for SqlError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Conversion { from, to } => SqlError::TypeConversion { from, to },
            e => SqlError::Core(e),
        }
    }
}
