//! Tabgis core
//!
//! Values, geometries and table locations shared by the SQL layer.

pub mod error;
pub mod geometry;
pub mod location;
pub(crate) mod macros;
pub mod value;

pub use error::*;
pub use geometry::*;
pub use location::*;
pub use value::*;

pub(crate) use macros::*;

pub use chrono;
pub use geo_types;
pub use rust_decimal::{self, Decimal};
