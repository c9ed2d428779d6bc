//! Column catalog
//!
//! Column names and types of a table, resolved once when the table is built and shared by
//! every row it hands out.

use serde::{Deserialize, Serialize};
use tabgis_core::ValueType;

use crate::{SqlError, SqlResult};

/// A result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// driver type name, e.g. `INT4`, `VARCHAR(20)` or `geometry`
    pub type_name: String,
    pub value_type: ValueType,
}

impl Column {
    pub fn new<N, T>(name: N, type_name: T, value_type: ValueType) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Column {
            name: name.into(),
            type_name: type_name.into(),
            value_type,
        }
    }

    pub fn is_geometry(&self) -> bool {
        self.value_type == ValueType::Geometry
    }
}

/// Ordered columns of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCatalog {
    columns: Vec<Column>,
}

impl ColumnCatalog {
    pub fn new(columns: Vec<Column>) -> Self {
        ColumnCatalog { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn types(&self) -> Vec<ValueType> {
        self.columns.iter().map(|c| c.value_type).collect()
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    /// exact match first, then ASCII case-insensitive
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// decode hint of a column, dynamic (`Null`) when out of range
    pub fn hint(&self, idx: usize) -> ValueType {
        self.columns
            .get(idx)
            .map(|c| c.value_type)
            .unwrap_or(ValueType::Null)
    }

    pub fn geometry_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.is_geometry().then_some(i))
            .collect()
    }

    pub(crate) fn mark_geometry(&mut self, idx: usize) {
        if let Some(c) = self.columns.get_mut(idx) {
            c.value_type = ValueType::Geometry;
        }
    }
}

impl FromIterator<Column> for ColumnCatalog {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        ColumnCatalog::new(iter.into_iter().collect())
    }
}

// ================================================================================================
// ColumnSelector
// ================================================================================================

/// Anything that designates a column: a 0-based index or a name.
pub trait ColumnSelector {
    fn resolve(&self, catalog: &ColumnCatalog) -> SqlResult<usize>;
}

impl ColumnSelector for usize {
    fn resolve(&self, catalog: &ColumnCatalog) -> SqlResult<usize> {
        if *self < catalog.len() {
            Ok(*self)
        } else {
            Err(SqlError::ColumnNotFound(format!(
                "index {} out of {} columns",
                self,
                catalog.len()
            )))
        }
    }
}

impl ColumnSelector for &str {
    fn resolve(&self, catalog: &ColumnCatalog) -> SqlResult<usize> {
        catalog
            .index_of(self)
            .ok_or_else(|| SqlError::ColumnNotFound(self.to_string()))
    }
}

impl ColumnSelector for String {
    fn resolve(&self, catalog: &ColumnCatalog) -> SqlResult<usize> {
        self.as_str().resolve(catalog)
    }
}

impl ColumnSelector for &String {
    fn resolve(&self, catalog: &ColumnCatalog) -> SqlResult<usize> {
        self.as_str().resolve(catalog)
    }
}

#[cfg(test)]
mod test_column {
    use super::*;

    fn catalog() -> ColumnCatalog {
        ColumnCatalog::new(vec![
            Column::new("ID", "INTEGER", ValueType::I64),
            Column::new("name", "TEXT", ValueType::String),
            Column::new("Name", "TEXT", ValueType::String),
            Column::new("geom", "POINT", ValueType::Geometry),
        ])
    }

    #[test]
    fn resolve_by_index_and_name() {
        let c = catalog();
        assert_eq!(0usize.resolve(&c).unwrap(), 0);
        assert!(matches!(4usize.resolve(&c), Err(SqlError::ColumnNotFound(_))));
        assert_eq!("id".resolve(&c).unwrap(), 0);
        assert_eq!("Name".resolve(&c).unwrap(), 2);
        assert_eq!("NAME".resolve(&c).unwrap(), 1);
        assert!(matches!("nope".resolve(&c), Err(SqlError::ColumnNotFound(_))));
    }

    #[test]
    fn geometry_columns() {
        let mut c = catalog();
        assert_eq!(c.geometry_indices(), vec![3]);
        c.mark_geometry(1);
        assert_eq!(c.geometry_indices(), vec![1, 3]);
        assert_eq!(c.hint(9), ValueType::Null);
    }
}
