//! Query builder
//!
//! A fluent SELECT builder whose type follows the clause order:
//!
//! `select` → `from` → [`where_` → (`and` | `or`)*] → [`group_by`] → [`order_by`*] → [`limit`]
//!
//! Every stage is backed by the checked `Clauses` core, which can also be driven directly.

pub mod clauses;

use std::marker::PhantomData;

pub use clauses::{Clause, Clauses, Order};

use crate::{DataSource, SqlError, SqlResult, Table};

// ================================================================================================
// Stages
// ================================================================================================

#[derive(Debug)]
pub struct Selected;
#[derive(Debug)]
pub struct Sourced;
#[derive(Debug)]
pub struct Filtered;
#[derive(Debug)]
pub struct Grouped;
#[derive(Debug)]
pub struct Ordered;
#[derive(Debug)]
pub struct Limited;

mod private {
    pub trait Sealed {}

    impl Sealed for super::Sourced {}
    impl Sealed for super::Filtered {}
    impl Sealed for super::Grouped {}
    impl Sealed for super::Ordered {}
    impl Sealed for super::Limited {}
}

/// stages after FROM: the query is complete
pub trait Complete: private::Sealed {}
impl Complete for Sourced {}
impl Complete for Filtered {}
impl Complete for Grouped {}
impl Complete for Ordered {}
impl Complete for Limited {}

/// stages accepting GROUP BY
pub trait Groupable: Complete {}
impl Groupable for Sourced {}
impl Groupable for Filtered {}

/// stages accepting ORDER BY and LIMIT
pub trait Orderable: Complete {}
impl Orderable for Sourced {}
impl Orderable for Filtered {}
impl Orderable for Grouped {}
impl Orderable for Ordered {}

// ================================================================================================
// QueryBuilder
// ================================================================================================

#[derive(Debug)]
pub struct QueryBuilder<S> {
    source: Option<DataSource>,
    clauses: Clauses,
    /// first rejected clause, reported by `sql` and `execute`
    pending: Option<String>,
    stage: PhantomData<S>,
}

impl<S> QueryBuilder<S> {
    fn push<N>(mut self, clause: Clause) -> QueryBuilder<N> {
        if self.pending.is_none() {
            if let Err(SqlError::InvalidBuilderState(msg)) = self.clauses.push(clause) {
                self.pending = Some(msg);
            }
        }
        QueryBuilder {
            source: self.source,
            clauses: self.clauses,
            pending: self.pending,
            stage: PhantomData,
        }
    }

    /// data source running the query on `execute`
    pub fn bind(mut self, source: DataSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn source(&self) -> Option<&DataSource> {
        self.source.as_ref()
    }
}

fn strings<I, T>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl QueryBuilder<Selected> {
    /// Start a query; no field means `*`.
    pub fn select<I, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let builder = QueryBuilder::<()> {
            source: None,
            clauses: Clauses::new(),
            pending: None,
            stage: PhantomData,
        };
        builder.push(Clause::Select(strings(fields)))
    }

    pub fn from<I, T>(self, tables: I) -> QueryBuilder<Sourced>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.push(Clause::From(strings(tables)))
    }
}

impl QueryBuilder<Sourced> {
    pub fn where_<T: Into<String>>(self, condition: T) -> QueryBuilder<Filtered> {
        self.push(Clause::Where(condition.into()))
    }
}

impl QueryBuilder<Filtered> {
    pub fn and<T: Into<String>>(self, condition: T) -> QueryBuilder<Filtered> {
        self.push(Clause::And(condition.into()))
    }

    pub fn or<T: Into<String>>(self, condition: T) -> QueryBuilder<Filtered> {
        self.push(Clause::Or(condition.into()))
    }
}

impl<S: Groupable> QueryBuilder<S> {
    pub fn group_by<I, T>(self, fields: I) -> QueryBuilder<Grouped>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.push(Clause::GroupBy(strings(fields)))
    }
}

impl<S: Orderable> QueryBuilder<S> {
    pub fn order_by<T: Into<String>>(self, field: T, order: Order) -> QueryBuilder<Ordered> {
        self.push(Clause::OrderBy(vec![(field.into(), order)]))
    }

    pub fn order_by_asc<T: Into<String>>(self, field: T) -> QueryBuilder<Ordered> {
        self.order_by(field, Order::Asc)
    }

    /// several sort keys at once, in iteration order
    pub fn order_by_map<I, T>(self, orders: I) -> QueryBuilder<Ordered>
    where
        I: IntoIterator<Item = (T, Order)>,
        T: Into<String>,
    {
        let orders = orders.into_iter().map(|(f, o)| (f.into(), o)).collect();
        self.push(Clause::OrderBy(orders))
    }

    pub fn limit(self, n: u64) -> QueryBuilder<Limited> {
        self.push(Clause::Limit(n))
    }
}

impl<S: Complete> QueryBuilder<S> {
    /// Query text, without running it.
    pub fn sql(&self) -> SqlResult<String> {
        match &self.pending {
            Some(msg) => Err(SqlError::new_builder_state_error(msg.as_str())),
            None => self.clauses.finish(),
        }
    }

    /// Run the query on the bound data source.
    pub async fn execute(&self) -> SqlResult<Table> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| SqlError::new_incomplete_query_error("no data source bound"))?;
        self.execute_on(source).await
    }

    pub async fn execute_on(&self, source: &DataSource) -> SqlResult<Table> {
        let sql = self.sql()?;
        source.query(&sql).await
    }
}
