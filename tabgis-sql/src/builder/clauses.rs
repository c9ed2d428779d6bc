//! Clauses
//!
//! Checked core of the query builder: clauses are pushed one by one and every push is validated
//! against the stage reached so far.

use serde::{Deserialize, Serialize};

use crate::{SqlError, SqlResult};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Asc => write!(f, "ASC"),
            Order::Desc => write!(f, "DESC"),
        }
    }
}

/// One clause of a query; fragments are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clause {
    Select(Vec<String>),
    From(Vec<String>),
    Where(String),
    And(String),
    Or(String),
    GroupBy(Vec<String>),
    OrderBy(Vec<(String, Order)>),
    Limit(u64),
}

impl Clause {
    fn keyword(&self) -> &'static str {
        match self {
            Clause::Select(_) => "SELECT",
            Clause::From(_) => "FROM",
            Clause::Where(_) => "WHERE",
            Clause::And(_) => "AND",
            Clause::Or(_) => "OR",
            Clause::GroupBy(_) => "GROUP BY",
            Clause::OrderBy(_) => "ORDER BY",
            Clause::Limit(_) => "LIMIT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Stage {
    #[default]
    Start,
    Selected,
    Sourced,
    Filtered,
    Grouped,
    Ordered,
    Limited,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clauses {
    stage: Stage,
    fields: Vec<String>,
    tables: Option<Vec<String>>,
    predicates: Vec<(&'static str, String)>,
    group_by: Vec<String>,
    order_by: Vec<(String, Order)>,
    limit: Option<u64>,
}

impl Clauses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a clause. Out-of-order clauses leave the state untouched and fail with
    /// `SqlError::InvalidBuilderState`.
    pub fn push(&mut self, clause: Clause) -> SqlResult<()> {
        use Stage::*;

        let next = match (&clause, self.stage) {
            (Clause::Select(_), Start | Selected) => Selected,
            (Clause::From(_), Start | Selected) => Sourced,
            (Clause::Where(_), Sourced) => Filtered,
            (Clause::And(_) | Clause::Or(_), Filtered) => Filtered,
            (Clause::GroupBy(_), Sourced | Filtered) => Grouped,
            (Clause::OrderBy(_), Sourced | Filtered | Grouped | Ordered) => Ordered,
            (Clause::Limit(_), Sourced | Filtered | Grouped | Ordered) => Limited,
            (c, s) => {
                return Err(SqlError::new_builder_state_error(format!(
                    "{} after {:?}",
                    c.keyword(),
                    s
                )))
            }
        };

        match clause {
            Clause::Select(f) => self.fields.extend(f),
            Clause::From(t) => self.tables = Some(t),
            Clause::Where(c) => self.predicates.push(("WHERE", c)),
            Clause::And(c) => self.predicates.push(("AND", c)),
            Clause::Or(c) => self.predicates.push(("OR", c)),
            Clause::GroupBy(g) => self.group_by = g,
            Clause::OrderBy(o) => self.order_by.extend(o),
            Clause::Limit(n) => self.limit = Some(n),
        }
        self.stage = next;

        Ok(())
    }

    /// Render the query text.
    pub fn finish(&self) -> SqlResult<String> {
        let tables = match &self.tables {
            Some(t) if !t.is_empty() => t,
            _ => {
                return Err(SqlError::new_incomplete_query_error(
                    "a query needs at least one table",
                ))
            }
        };

        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        };
        let mut parts = vec![format!("SELECT {}", fields), format!("FROM {}", tables.join(", "))];
        parts.extend(self.predicates.iter().map(|(k, c)| format!("{k} {c}")));
        if !self.group_by.is_empty() {
            parts.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|(f, o)| format!("{f} {o}"))
                .collect::<Vec<_>>();
            parts.push(format!("ORDER BY {}", order.join(", ")));
        }
        if let Some(n) = self.limit {
            parts.push(format!("LIMIT {n}"));
        }

        Ok(parts.join(" "))
    }
}

#[cfg(test)]
mod test_clauses {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn render_full_query() {
        let mut c = Clauses::new();
        c.push(Clause::Select(strings(&["f1", "f2"]))).unwrap();
        c.push(Clause::From(strings(&["t1", "t2"]))).unwrap();
        c.push(Clause::Where("a = 1".into())).unwrap();
        c.push(Clause::And("b = 2".into())).unwrap();
        c.push(Clause::Or("c = 3".into())).unwrap();
        c.push(Clause::GroupBy(strings(&["g1", "g2"]))).unwrap();
        c.push(Clause::OrderBy(vec![("o1".into(), Order::Asc)])).unwrap();
        c.push(Clause::OrderBy(vec![("o2".into(), Order::Desc)])).unwrap();
        c.push(Clause::Limit(10)).unwrap();

        assert_eq!(
            c.finish().unwrap(),
            "SELECT f1, f2 FROM t1, t2 WHERE a = 1 AND b = 2 OR c = 3 GROUP BY g1, g2 \
             ORDER BY o1 ASC, o2 DESC LIMIT 10"
        );
    }

    #[test]
    fn default_fields() {
        let mut c = Clauses::new();
        c.push(Clause::From(strings(&["toto"]))).unwrap();
        assert_eq!(c.finish().unwrap(), "SELECT * FROM toto");
    }

    #[test]
    fn out_of_order_clauses() {
        let mut c = Clauses::new();
        assert!(matches!(
            c.push(Clause::Where("a".into())),
            Err(SqlError::InvalidBuilderState(_))
        ));
        c.push(Clause::From(strings(&["t"]))).unwrap();
        assert!(matches!(
            c.push(Clause::From(strings(&["u"]))),
            Err(SqlError::InvalidBuilderState(_))
        ));
        assert!(matches!(
            c.push(Clause::Select(strings(&["a"]))),
            Err(SqlError::InvalidBuilderState(_))
        ));
        assert!(matches!(
            c.push(Clause::And("a".into())),
            Err(SqlError::InvalidBuilderState(_))
        ));
        c.push(Clause::OrderBy(vec![("a".into(), Order::Asc)])).unwrap();
        assert!(matches!(
            c.push(Clause::GroupBy(strings(&["a"]))),
            Err(SqlError::InvalidBuilderState(_))
        ));
        // failed pushes do not change the query
        assert_eq!(c.finish().unwrap(), "SELECT * FROM t ORDER BY a ASC");
    }

    #[test]
    fn incomplete_query() {
        let mut c = Clauses::new();
        c.push(Clause::Select(strings(&["a"]))).unwrap();
        assert!(matches!(c.finish(), Err(SqlError::IncompleteQuery(_))));

        c.push(Clause::From(vec![])).unwrap();
        assert!(matches!(c.finish(), Err(SqlError::IncompleteQuery(_))));
    }
}
