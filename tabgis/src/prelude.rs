//! Tabgis prelude

pub use super::errors::*;
pub use tabgis_core::{
    DbType, Decimal, Geometry, GeometryType, TableLocation, Value, ValueType,
};

// sources: sql
pub use tabgis_sql::{
    Column, ColumnCatalog, CursorType, DataSource, DataSourceConfig, LazyTable, Order,
    QueryBuilder, Row, SpatialSummary, SpatialTable, SqlError, SqlResult, Table, TableSummary,
    TableType,
};

pub use tabgis_core::geo_types;
