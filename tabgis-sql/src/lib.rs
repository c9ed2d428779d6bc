//! Tabgis SQL
//!
//! Lazy, spatially-aware tables over SQLite/SpatiaLite and PostgreSQL/PostGIS.
//!
//! - `DataSource`: entry point, resolves table names and runs queries
//! - `QueryBuilder`: order-enforcing SELECT builder
//! - `LazyTable` / `SpatialTable`: cursor-backed relations and their algebra
//! - `adapter`: one `DataSourceAdapter` per backend

pub mod adapter;
pub mod builder;
pub mod column;
pub mod config;
pub mod cursor;
pub mod error;
pub(crate) mod macros;
pub mod source;
pub mod table;

pub use adapter::{
    DataSourceAdapter, DriverRow, ExecutionResult, GeometryColumn, Postgis, Spatialite, TableKind,
};
pub use builder::{Clause, Clauses, Order, QueryBuilder};
pub use column::{Column, ColumnCatalog, ColumnSelector};
pub use config::DataSourceConfig;
pub use cursor::{Cursor, CursorType};
pub use error::{SqlError, SqlResult};
pub use tabgis_core::CommonError;
pub use source::DataSource;
pub use table::{
    LazyTable, Row, SpatialSummary, SpatialTable, Table, TableSummary, TableType,
};
