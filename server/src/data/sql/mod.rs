//! SQL abstraction layer
//!
//! Renders compiled predicates into parameterized SQL for the supported
//! database backends.

mod dialect;
mod postgres_dialect;
mod render;
mod sqlite_dialect;

pub use dialect::SqlDialect;
pub use postgres_dialect::PostgresDialect;
pub use render::{SqlQuery, render_select};
pub use sqlite_dialect::SqliteDialect;

/// Database backend identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Sqlite,
    Postgres,
}

impl Backend {
    /// Get the SQL dialect for this backend
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Backend::Sqlite => &SqliteDialect,
            Backend::Postgres => &PostgresDialect,
        }
    }

    /// Get the backend name
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Postgres => "postgres",
        }
    }

    /// Parse a backend name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" => Some(Backend::Sqlite),
            "postgres" | "postgresql" => Some(Backend::Postgres),
            _ => None,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_dialects() {
        assert_eq!(Backend::Sqlite.dialect().name(), "sqlite");
        assert_eq!(Backend::Postgres.dialect().name(), "postgres");
    }

    #[test]
    fn backend_parse() {
        assert_eq!(Backend::parse("SQLite"), Some(Backend::Sqlite));
        assert_eq!(Backend::parse("postgresql"), Some(Backend::Postgres));
        assert_eq!(Backend::parse("duckdb"), None);
    }
}
