//! PostgreSQL SQL dialect implementation

use super::SqlDialect;

/// PostgreSQL SQL dialect
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn cast_to_string(&self, col: &str) -> String {
        format!("{}::TEXT", col)
    }

    fn ilike(&self, col: &str, placeholder: &str) -> String {
        format!("{} ILIKE {} ESCAPE '\\'", col, placeholder)
    }

    fn concat(&self, parts: &[String]) -> String {
        format!("CONCAT({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered() {
        assert_eq!(PostgresDialect.placeholder(1), "$1");
        assert_eq!(PostgresDialect.placeholder(12), "$12");
    }

    #[test]
    fn ilike_is_native() {
        assert_eq!(
            PostgresDialect.ilike("t0.name", "$1"),
            r"t0.name ILIKE $1 ESCAPE '\'"
        );
    }
}
