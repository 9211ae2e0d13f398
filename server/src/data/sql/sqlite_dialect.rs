//! SQLite SQL dialect implementation

use super::SqlDialect;

/// SQLite SQL dialect
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn cast_to_string(&self, col: &str) -> String {
        format!("CAST({} AS TEXT)", col)
    }

    fn ilike(&self, col: &str, placeholder: &str) -> String {
        // SQLite LIKE is only case-insensitive for ASCII, lower both sides
        format!("LOWER({}) LIKE LOWER({}) ESCAPE '\\'", col, placeholder)
    }

    fn concat(&self, parts: &[String]) -> String {
        if parts.is_empty() {
            return "''".to_string();
        }
        format!("({})", parts.join(" || "))
    }
}
