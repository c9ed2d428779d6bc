//! Tables
//!
//! - `LazyTable`: any relation, iterated through a cursor
//! - `SpatialTable`: a `LazyTable` with at least one geometry column
//! - `Table`: either of them, as returned by `DataSource`

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::SqlResult;

pub mod algebra;
pub mod lazy;
pub mod row;
pub mod spatial;

pub use lazy::{LazyTable, TableSummary};
pub use row::Row;
pub use spatial::{SpatialSummary, SpatialTable};

/// `sql` as a parenthesized subquery. The line break keeps a trailing `--` comment from
/// swallowing the closing parenthesis.
pub(crate) fn subquery(sql: &str) -> String {
    format!("({sql}\n)")
}

/// Whether the query carries an `ORDER BY` of its own, outside any parentheses, quotes or
/// comments.
pub(crate) fn is_ordered(sql: &str) -> bool {
    let mut depth = 0usize;
    let mut words = Vec::new();
    let mut word = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                for d in chars.by_ref() {
                    if d == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for d in chars.by_ref() {
                    if d == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for d in chars.by_ref() {
                    if prev == '*' && d == '/' {
                        break;
                    }
                    prev = d;
                }
            }
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if depth == 0 && (c == '_' || c.is_alphanumeric()) => {
                word.push(c);
                continue;
            }
            _ => {}
        }
        if !word.is_empty() {
            words.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        words.push(word);
    }

    words
        .windows(2)
        .any(|w| w[0].eq_ignore_ascii_case("ORDER") && w[1].eq_ignore_ascii_case("BY"))
}

/// Requested flavor of a table, see `LazyTable::as_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableType {
    Plain,
    Spatial,
}

#[derive(Debug)]
pub enum Table {
    Plain(LazyTable),
    Spatial(SpatialTable),
}

impl Table {
    pub fn table_type(&self) -> TableType {
        match self {
            Table::Plain(_) => TableType::Plain,
            Table::Spatial(_) => TableType::Spatial,
        }
    }

    pub fn into_lazy(self) -> LazyTable {
        match self {
            Table::Plain(t) => t,
            Table::Spatial(t) => t.into_inner(),
        }
    }

    pub fn into_spatial(self) -> SqlResult<SpatialTable> {
        match self {
            Table::Plain(t) => t.into_spatial(),
            Table::Spatial(t) => Ok(t),
        }
    }

    pub fn into_plain(self) -> LazyTable {
        self.into_lazy()
    }
}

/// spatial as soon as one geometry column is known
impl From<LazyTable> for Table {
    fn from(table: LazyTable) -> Self {
        if table.is_spatial() {
            Table::Spatial(SpatialTable::new(table))
        } else {
            Table::Plain(table)
        }
    }
}

impl From<SpatialTable> for Table {
    fn from(table: SpatialTable) -> Self {
        Table::Spatial(table)
    }
}

impl Deref for Table {
    type Target = LazyTable;

    fn deref(&self) -> &Self::Target {
        match self {
            Table::Plain(t) => t,
            Table::Spatial(t) => t.as_lazy(),
        }
    }
}

impl DerefMut for Table {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Table::Plain(t) => t,
            Table::Spatial(t) => t.as_lazy_mut(),
        }
    }
}
