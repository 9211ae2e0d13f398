//! SQL dialect trait for multi-database support
//!
//! This trait defines the interface for generating database-specific SQL syntax.

/// SQL dialect trait for generating database-specific SQL
///
/// Different databases have different syntax for:
/// - Parameter placeholders (? vs $1)
/// - Case-insensitive pattern matching
/// - String concatenation and casting
pub trait SqlDialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Generate a parameter placeholder for the given index (1-based)
    ///
    /// - SQLite: Always returns "?"
    /// - PostgreSQL: Returns "$1", "$2", etc.
    fn placeholder(&self, index: usize) -> String;

    /// Cast a column or expression to string type
    ///
    /// - SQLite: `CAST(col AS TEXT)`
    /// - PostgreSQL: `col::TEXT`
    fn cast_to_string(&self, col: &str) -> String;

    /// Case-insensitive LIKE against an escaped pattern parameter
    ///
    /// - SQLite: `LOWER(col) LIKE LOWER(?) ESCAPE '\'`
    /// - PostgreSQL: `col ILIKE $1 ESCAPE '\'`
    fn ilike(&self, col: &str, placeholder: &str) -> String;

    /// Case-sensitive LIKE against an escaped pattern parameter
    fn like(&self, col: &str, placeholder: &str) -> String {
        format!("{} LIKE {} ESCAPE '\\'", col, placeholder)
    }

    /// Concatenate string expressions
    ///
    /// - SQLite: `a || b`
    /// - PostgreSQL: `CONCAT(a, b)`
    fn concat(&self, parts: &[String]) -> String;
}
