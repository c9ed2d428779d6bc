//! Tabgis
//!
//! Lazy, spatially-aware access to SQL tables. A `DataSource` opens a SQLite/SpatiaLite or
//! PostgreSQL/PostGIS database and hands out cursor-backed tables, which can be read row by row,
//! rewritten with a small table algebra, or queried through an order-enforcing builder.

pub mod errors;
pub mod prelude;

pub use prelude::*;

pub use tabgis_sql as sql;
