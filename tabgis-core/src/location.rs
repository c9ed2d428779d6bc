//! Table location
//!
//! `catalog.schema.table` triples, parsed from and rendered into SQL identifiers.
//!
//! - Unquoted parts must match `[A-Za-z_][A-Za-z0-9_$]*` and are case-normalized by the dialect
//!   (SQLite flavor upper-cases, PostgreSQL lower-cases)
//! - Quoted parts keep their case, `""` escapes a double quote

use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

const RESERVED: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "CREATE", "DEFAULT", "DELETE",
    "DESC", "DISTINCT", "DROP", "ELSE", "END", "EXISTS", "FOREIGN", "FROM", "GROUP", "HAVING",
    "IN", "INDEX", "INSERT", "INTO", "IS", "JOIN", "KEY", "LIKE", "LIMIT", "NOT", "NULL", "ON",
    "OR", "ORDER", "PRIMARY", "REFERENCES", "SELECT", "SET", "TABLE", "THEN", "UNION", "UPDATE",
    "USER", "VALUES", "WHEN", "WHERE",
];

// ================================================================================================
// DbType
// ================================================================================================

/// Database dialect, which decides identifier case and the spatial function family.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    /// SQLite with SpatiaLite, unquoted identifiers upper-cased
    Sqlite,
    /// PostgreSQL with PostGIS, unquoted identifiers lower-cased
    Postgres,
}

impl Display for DbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

impl FromStr for DbType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "spatialite" | "s" => Ok(DbType::Sqlite),
            "postgres" | "postgresql" | "postgis" | "p" => Ok(DbType::Postgres),
            _ => Err(CoreError::new_common_error(format!("unknown database type {s}"))),
        }
    }
}

impl DbType {
    /// case-normalize an unquoted identifier
    pub fn normalize(&self, ident: &str) -> String {
        match self {
            DbType::Sqlite => ident.to_uppercase(),
            DbType::Postgres => ident.to_lowercase(),
        }
    }

    /// render one identifier, quoting only when the bare form would not read back unchanged
    pub fn quote_if_needed(&self, ident: &str) -> String {
        let bare = is_plain(ident)
            && self.normalize(ident) == ident
            && !RESERVED.contains(&ident.to_ascii_uppercase().as_str());
        if bare {
            ident.to_string()
        } else {
            quote(ident)
        }
    }
}

/// always double-quote an identifier
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn is_plain(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric())
}

// ================================================================================================
// TableLocation
// ================================================================================================

/// Fully-qualified table name. Equality and hashing only look at the triple, not the dialect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableLocation {
    catalog: Option<String>,
    schema: Option<String>,
    table: String,
    db_type: DbType,
}

impl TableLocation {
    /// Location of `table` without schema nor catalog. The name must not be empty.
    pub fn new<T: Into<String>>(table: T, db_type: DbType) -> CoreResult<Self> {
        let table = table.into();
        check_part(&table)?;
        Ok(TableLocation {
            catalog: None,
            schema: None,
            table,
            db_type,
        })
    }

    pub fn from_parts(
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
        db_type: DbType,
    ) -> CoreResult<Self> {
        let mut loc = TableLocation::new(table, db_type)?;
        if let Some(s) = schema {
            loc = loc.with_schema(s)?;
        }
        if let Some(c) = catalog {
            loc = loc.with_catalog(c)?;
        }
        Ok(loc)
    }

    pub fn with_schema<T: Into<String>>(mut self, schema: T) -> CoreResult<Self> {
        let schema = schema.into();
        check_part(&schema)?;
        self.schema = Some(schema);
        Ok(self)
    }

    pub fn with_catalog<T: Into<String>>(mut self, catalog: T) -> CoreResult<Self> {
        let catalog = catalog.into();
        check_part(&catalog)?;
        self.catalog = Some(catalog);
        Ok(self)
    }

    pub fn with_db_type(mut self, db_type: DbType) -> Self {
        self.db_type = db_type;
        self
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    /// Parse `table`, `schema.table` or `catalog.schema.table`.
    pub fn parse(raw: &str, db_type: DbType) -> CoreResult<Self> {
        let parts = split_identifier(raw.trim(), db_type)?;
        let mut parts = parts.into_iter();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(t), None, None) => TableLocation::new(t, db_type),
            (Some(s), Some(t), None) => TableLocation::new(t, db_type)?.with_schema(s),
            (Some(c), Some(s), Some(t)) => TableLocation::new(t, db_type)?
                .with_schema(s)?
                .with_catalog(c),
            _ => Err(CoreError::new_identifier_error(raw, "empty identifier")),
        }
    }

    /// render the location as SQL text for the given dialect
    pub fn render(&self, db_type: DbType) -> String {
        [self.catalog.as_deref(), self.schema.as_deref(), Some(&self.table)]
            .into_iter()
            .flatten()
            .map(|p| db_type.quote_if_needed(p))
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn to_sql(&self) -> String {
        self.render(self.db_type)
    }

    /// every part double-quoted, whatever the dialect
    pub fn to_string_quoted(&self) -> String {
        [self.catalog.as_deref(), self.schema.as_deref(), Some(&self.table)]
            .into_iter()
            .flatten()
            .map(quote)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl PartialEq for TableLocation {
    fn eq(&self, other: &Self) -> bool {
        self.catalog == other.catalog && self.schema == other.schema && self.table == other.table
    }
}

impl Eq for TableLocation {}

impl Hash for TableLocation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.catalog.hash(state);
        self.schema.hash(state);
        self.table.hash(state);
    }
}

impl Display for TableLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

fn check_part(part: &str) -> CoreResult<()> {
    if part.is_empty() {
        return Err(CoreError::new_identifier_error(part, "empty part"));
    }
    Ok(())
}

/// split a dotted identifier, honoring double quotes
fn split_identifier(raw: &str, db_type: DbType) -> CoreResult<Vec<String>> {
    if raw.is_empty() {
        return Err(CoreError::new_identifier_error(raw, "empty identifier"));
    }

    let err = |info: &str| CoreError::new_identifier_error(raw, info);
    let mut parts = Vec::new();
    let mut chars = raw.chars().peekable();

    while chars.peek().is_some() {
        if !parts.is_empty() {
            match chars.next() {
                Some('.') if chars.peek().is_some() => {}
                Some('.') => return Err(err("trailing '.'")),
                _ => return Err(err("expected '.' between parts")),
            }
        }

        if chars.peek() == Some(&'"') {
            chars.next();
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        name.push('"');
                    }
                    Some('"') => break,
                    Some(c) => name.push(c),
                    None => return Err(err("unterminated quoted part")),
                }
            }
            if name.is_empty() {
                return Err(err("empty quoted part"));
            }
            parts.push(name);
            continue;
        }

        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c == '.' {
                break;
            }
            name.push(c);
            chars.next();
        }
        if name.is_empty() {
            return Err(err("empty part"));
        }
        if !is_plain(&name) {
            return Err(err("invalid character in unquoted part"));
        }
        parts.push(db_type.normalize(&name));
    }

    if parts.len() > 3 {
        return Err(err("more than three parts"));
    }
    Ok(parts)
}

#[cfg(test)]
mod test_location {
    use super::*;

    #[test]
    fn parse_normalizes_unquoted_parts() {
        let l = TableLocation::parse("public.Toto", DbType::Postgres).unwrap();
        assert_eq!(l.schema(), Some("public"));
        assert_eq!(l.table(), "toto");

        let l = TableLocation::parse("main.Toto", DbType::Sqlite).unwrap();
        assert_eq!(l.schema(), Some("MAIN"));
        assert_eq!(l.table(), "TOTO");

        let l = TableLocation::parse(r#"db."My ""Big"" Table""#, DbType::Postgres).unwrap();
        assert_eq!(l.schema(), Some("db"));
        assert_eq!(l.table(), r#"My "Big" Table"#);

        let l = TableLocation::parse("cat.sch.tab", DbType::Sqlite).unwrap();
        assert_eq!(l.catalog(), Some("CAT"));
    }

    #[test]
    fn parse_rejects_malformed_names() {
        for raw in ["", "a..b", "a.", "\"open", "a.b.c.d", "1abc", "a b", "\"\""] {
            assert!(
                TableLocation::parse(raw, DbType::Postgres).is_err(),
                "{raw} should not parse"
            );
        }
    }

    #[test]
    fn render_quotes_only_when_needed() {
        let l = TableLocation::new("toto", DbType::Postgres)
            .and_then(|l| l.with_schema("public"))
            .unwrap();
        assert_eq!(l.render(DbType::Postgres), "public.toto");
        assert_eq!(l.render(DbType::Sqlite), r#""public"."toto""#);

        let l = TableLocation::new("TOTO", DbType::Sqlite).unwrap();
        assert_eq!(l.render(DbType::Sqlite), "TOTO");
        assert_eq!(l.render(DbType::Postgres), r#""TOTO""#);

        let l = TableLocation::new("order", DbType::Postgres).unwrap();
        assert_eq!(l.render(DbType::Postgres), r#""order""#);
        assert_eq!(
            l.with_schema("public").unwrap().to_string_quoted(),
            r#""public"."order""#
        );
    }

    #[test]
    fn parse_render_round_trip() {
        let samples = [
            TableLocation::from_parts(None, None, "toto", DbType::Sqlite),
            TableLocation::from_parts(None, None, "TOTO", DbType::Sqlite),
            TableLocation::from_parts(None, Some("x.y"), "Mixed Case", DbType::Sqlite),
            TableLocation::from_parts(Some("C"), Some("s"), r#"a"b"#, DbType::Sqlite),
            TableLocation::from_parts(None, None, "select", DbType::Sqlite),
            TableLocation::from_parts(None, None, "t$1", DbType::Sqlite),
        ]
        .into_iter()
        .collect::<CoreResult<Vec<_>>>()
        .unwrap();
        for db in [DbType::Sqlite, DbType::Postgres] {
            for loc in samples.iter() {
                let rendered = loc.render(db);
                let back = TableLocation::parse(&rendered, db).unwrap();
                assert_eq!(&back, loc, "round trip of {rendered} on {db}");
            }
        }
    }

    #[test]
    fn equality_ignores_dialect() {
        let a = TableLocation::new("t", DbType::Sqlite).unwrap();
        let b = TableLocation::new("t", DbType::Postgres).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, TableLocation::new("T", DbType::Sqlite).unwrap());
    }

    #[test]
    fn empty_parts_are_rejected() {
        assert!(matches!(
            TableLocation::new("", DbType::Sqlite),
            Err(CoreError::InvalidIdentifier(..))
        ));
        assert!(TableLocation::from_parts(None, Some(""), "t", DbType::Postgres).is_err());
        assert!(TableLocation::from_parts(Some(""), Some("s"), "t", DbType::Postgres).is_err());

        // whatever is accepted renders back into a parseable name
        let l = TableLocation::from_parts(Some("c"), Some(" "), "\"", DbType::Postgres).unwrap();
        for db in [DbType::Sqlite, DbType::Postgres] {
            assert_eq!(TableLocation::parse(&l.render(db), db).unwrap(), l);
        }
    }
}
