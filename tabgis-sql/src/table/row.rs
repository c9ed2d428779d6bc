//! Row
//!
//! Typed view over one driver row. Cells are decoded on access, with the column type of the
//! shared catalog as decoding hint.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tabgis_core::{CoreError, Decimal, Geometry, Value};

use crate::macros::impl_row_getters;
use crate::{ColumnCatalog, ColumnSelector, DriverRow, SqlError, SqlResult};

pub struct Row {
    inner: DriverRow,
    catalog: Arc<ColumnCatalog>,
    index: usize,
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Row")
            .field("index", &self.index)
            .field("values", &self.values().unwrap_or_default())
            .finish()
    }
}

impl Row {
    pub(crate) fn new(inner: DriverRow, catalog: Arc<ColumnCatalog>, index: usize) -> Self {
        Row {
            inner,
            catalog,
            index,
        }
    }

    /// 0-based position of the row in its table
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    pub fn get_value<C: ColumnSelector>(&self, column: C) -> SqlResult<Value> {
        let idx = column.resolve(&self.catalog)?;
        self.inner.value(idx, &self.catalog.hint(idx))
    }

    /// Value converted into `T`; SQL `NULL` is a conversion error.
    pub fn get<T, C>(&self, column: C) -> SqlResult<T>
    where
        T: TryFrom<Value, Error = CoreError>,
        C: ColumnSelector,
    {
        let value = self.get_value(column)?;
        T::try_from(value).map_err(SqlError::from)
    }

    /// Value converted into `T`, SQL `NULL` giving `None`.
    pub fn get_opt<T, C>(&self, column: C) -> SqlResult<Option<T>>
    where
        Option<T>: TryFrom<Value, Error = CoreError>,
        C: ColumnSelector,
    {
        let value = self.get_value(column)?;
        Option::<T>::try_from(value).map_err(SqlError::from)
    }

    pub fn values(&self) -> SqlResult<Vec<Value>> {
        self.inner.values(&self.catalog.types())
    }

    impl_row_getters!(
        get_bool -> bool,
        get_char -> char,
        get_i8 -> i8,
        get_i16 -> i16,
        get_i32 -> i32,
        get_i64 -> i64,
        get_f32 -> f32,
        get_f64 -> f64,
        get_string -> String,
        get_date -> NaiveDate,
        get_time -> NaiveTime,
        get_datetime -> NaiveDateTime,
        get_decimal -> Decimal,
        get_bytes -> Vec<u8>,
    );

    /// geometry cell, `None` for SQL `NULL`
    pub fn get_geometry<C: ColumnSelector>(&self, column: C) -> SqlResult<Option<Geometry>> {
        self.get_opt::<Geometry, C>(column)
    }
}
