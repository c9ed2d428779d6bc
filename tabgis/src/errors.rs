//! Tabgis error type
//!
//! errors

use tabgis_core::CoreError;
use tabgis_sql::SqlError;
use thiserror::Error;

pub type TabgisResult<T> = Result<T, TabgisError>;

#[derive(Error, Debug)]
pub enum TabgisError {
    #[error("common error {0}")]
    Common(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Sql(#[from] SqlError),
}

impl TabgisError {
    pub fn new_common_error<T: Into<String>>(msg: T) -> TabgisError {
        TabgisError::Common(msg.into())
    }
}
