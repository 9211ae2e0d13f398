//! Predicate to SQL rendering
//!
//! Turns a compiled [`Predicate`] plus its annotations into a parameterized
//! `SELECT` for one schema. All values are bound as parameters; identifiers are
//! validated before interpolation.
//!
//! Relation paths are rendered as semi-joins:
//!
//! ```sql
//! SELECT t0.* FROM parent AS t0
//! WHERE t0.child_id IN (SELECT t1.id FROM child AS t1 WHERE t1.name = ?)
//! ```

use serde::Serialize;

use super::SqlDialect;
use crate::data::error::DataError;
use crate::data::predicate::{AnnotationMap, Expression, Lookup, PATH_DELIMITER, Predicate};
use crate::data::schema::{FieldDef, FieldKind, PathError, Schema, SchemaRegistry};
use crate::data::value::Value;
use crate::utils::sql::{escape_like_pattern, is_safe_identifier};

/// Rendered statement with its bind parameters in placeholder order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Render `SELECT` over `schema` filtered by `predicate`.
///
/// With annotations the base table is wrapped in a derived table so the
/// predicate can reference annotation names as columns.
pub fn render_select(
    dialect: &dyn SqlDialect,
    schemas: &SchemaRegistry,
    schema: &Schema,
    predicate: Option<&Predicate>,
    annotations: &AnnotationMap,
) -> Result<SqlQuery, DataError> {
    let mut renderer = Renderer {
        dialect,
        schemas,
        annotations,
        params: Vec::new(),
        next_alias: 0,
    };
    let sql = renderer.select(schema, predicate)?;
    Ok(SqlQuery {
        sql,
        params: renderer.params,
    })
}

struct Renderer<'a> {
    dialect: &'a dyn SqlDialect,
    schemas: &'a SchemaRegistry,
    annotations: &'a AnnotationMap,
    params: Vec<Value>,
    next_alias: usize,
}

impl Renderer<'_> {
    fn select(&mut self, schema: &Schema, predicate: Option<&Predicate>) -> Result<String, DataError> {
        let alias = self.alias();
        let from = format!("{} AS {}", ident(schema.table())?, alias);

        let mut sql = if self.annotations.is_empty() {
            format!("SELECT {}.* FROM {}", alias, from)
        } else {
            let mut columns = Vec::with_capacity(self.annotations.len());
            for (name, expression) in self.annotations {
                let rendered = self.expression(schema, &alias, expression)?;
                columns.push(format!("{} AS {}", rendered, ident(name)?));
            }
            format!(
                "SELECT * FROM (SELECT {}.*, {} FROM {}) AS {}",
                alias,
                columns.join(", "),
                from,
                alias
            )
        };

        if let Some(predicate) = predicate {
            let clause = self.predicate(schema, &alias, predicate, true)?;
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        Ok(sql)
    }

    fn alias(&mut self) -> String {
        let alias = format!("t{}", self.next_alias);
        self.next_alias += 1;
        alias
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    /// `top_level` is true while rendering against the annotated base table
    fn predicate(
        &mut self,
        schema: &Schema,
        alias: &str,
        predicate: &Predicate,
        top_level: bool,
    ) -> Result<String, DataError> {
        match predicate {
            Predicate::Condition {
                path,
                lookup,
                value,
            } => self.condition(schema, alias, path, *lookup, value, top_level),
            Predicate::And(items) => self.junction(schema, alias, items, " AND ", "1=1", top_level),
            Predicate::Or(items) => self.junction(schema, alias, items, " OR ", "1=0", top_level),
            Predicate::Not(inner) => {
                // NULL comparisons count as false so NOT stays the exact complement
                let inner = self.predicate(schema, alias, inner, top_level)?;
                Ok(format!("NOT COALESCE(({}), FALSE)", inner))
            }
        }
    }

    fn junction(
        &mut self,
        schema: &Schema,
        alias: &str,
        items: &[Predicate],
        separator: &str,
        identity: &str,
        top_level: bool,
    ) -> Result<String, DataError> {
        if items.is_empty() {
            return Ok(identity.to_string());
        }
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            parts.push(self.predicate(schema, alias, item, top_level)?);
        }
        Ok(format!("({})", parts.join(separator)))
    }

    fn condition(
        &mut self,
        schema: &Schema,
        alias: &str,
        path: &str,
        lookup: Lookup,
        value: &Value,
        top_level: bool,
    ) -> Result<String, DataError> {
        if top_level && self.annotations.contains_key(path) {
            let column = format!("{}.{}", alias, ident(path)?);
            return Ok(self.leaf(&column, None, lookup, value));
        }

        let (head, rest) = split_path(path);
        let field = field_of(schema, head, path)?;
        let column = format!("{}.{}", alias, ident(&field.column())?);

        let Some(rest) = rest else {
            return Ok(self.leaf(&column, Some(&field.kind), lookup, value));
        };

        let target = self
            .schemas
            .relation_target(schema, field)
            .map_err(|e| DataError::path(path, e))?;
        let inner_alias = self.alias();
        let inner = self.condition(&target, &inner_alias, rest, lookup, value, false)?;
        let subquery = format!(
            "{} IN (SELECT {}.{} FROM {} AS {} WHERE {})",
            column,
            inner_alias,
            ident(&id_column(&target))?,
            ident(target.table())?,
            inner_alias,
            inner
        );

        // A missing relation resolves to null, which these lookups match
        let matches_null = match lookup {
            Lookup::IsNull => value.is_truthy(),
            Lookup::Exact => value.is_null(),
            _ => false,
        };
        if matches_null {
            Ok(format!("({} IS NULL OR {})", column, subquery))
        } else {
            Ok(subquery)
        }
    }

    fn leaf(&mut self, column: &str, kind: Option<&FieldKind>, lookup: Lookup, value: &Value) -> String {
        match lookup {
            Lookup::Exact if value.is_null() => format!("{} IS NULL", column),
            Lookup::Exact => self.binary(column, "=", value),
            Lookup::Gt => self.binary(column, ">", value),
            Lookup::Gte => self.binary(column, ">=", value),
            Lookup::Lt => self.binary(column, "<", value),
            Lookup::Lte => self.binary(column, "<=", value),
            Lookup::In => {
                let items = value.clone().into_list();
                if items.is_empty() {
                    return "1=0".to_string();
                }
                let placeholders: Vec<String> = items.into_iter().map(|v| self.bind(v)).collect();
                format!("{} IN ({})", column, placeholders.join(", "))
            }
            Lookup::IsNull if value.is_truthy() => format!("{} IS NULL", column),
            Lookup::IsNull => format!("{} IS NOT NULL", column),
            pattern => {
                let text = match kind {
                    Some(FieldKind::Text) => column.to_string(),
                    _ => self.dialect.cast_to_string(column),
                };
                let needle = escape_like_pattern(&value.as_text().unwrap_or_default());
                let pattern_value = match pattern {
                    Lookup::Contains | Lookup::IContains => format!("%{}%", needle),
                    Lookup::StartsWith | Lookup::IStartsWith => format!("{}%", needle),
                    Lookup::EndsWith | Lookup::IEndsWith => format!("%{}", needle),
                    _ => needle,
                };
                let placeholder = self.bind(Value::Text(pattern_value));
                if pattern.is_case_insensitive() {
                    self.dialect.ilike(&text, &placeholder)
                } else {
                    self.dialect.like(&text, &placeholder)
                }
            }
        }
    }

    fn binary(&mut self, column: &str, op: &str, value: &Value) -> String {
        let placeholder = self.bind(value.clone());
        format!("{} {} {}", column, op, placeholder)
    }

    fn expression(&mut self, schema: &Schema, alias: &str, expression: &Expression) -> Result<String, DataError> {
        match expression {
            Expression::Field(path) => self.column_ref(schema, alias, path),
            Expression::Literal(value) => Ok(self.bind(value.clone())),
            Expression::Concat(parts) => {
                let mut rendered = Vec::with_capacity(parts.len());
                for part in parts {
                    let inner = self.expression(schema, alias, part)?;
                    rendered.push(format!("COALESCE({}, '')", self.dialect.cast_to_string(&inner)));
                }
                Ok(self.dialect.concat(&rendered))
            }
            Expression::Lower(inner) => Ok(format!("LOWER({})", self.expression(schema, alias, inner)?)),
            Expression::Coalesce(parts) => {
                let mut rendered = Vec::with_capacity(parts.len());
                for part in parts {
                    rendered.push(self.expression(schema, alias, part)?);
                }
                Ok(format!("COALESCE({})", rendered.join(", ")))
            }
        }
    }

    /// Column for a path; relation hops become correlated scalar subqueries
    fn column_ref(&mut self, schema: &Schema, alias: &str, path: &str) -> Result<String, DataError> {
        let (head, rest) = split_path(path);
        let field = field_of(schema, head, path)?;
        let column = format!("{}.{}", alias, ident(&field.column())?);
        let Some(rest) = rest else {
            return Ok(column);
        };

        let target = self
            .schemas
            .relation_target(schema, field)
            .map_err(|e| DataError::path(path, e))?;
        let inner_alias = self.alias();
        let inner = self.column_ref(&target, &inner_alias, rest)?;
        Ok(format!(
            "(SELECT {} FROM {} AS {} WHERE {}.{} = {})",
            inner,
            ident(target.table())?,
            inner_alias,
            inner_alias,
            ident(&id_column(&target))?,
            column
        ))
    }
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once(PATH_DELIMITER) {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

fn field_of<'s>(schema: &'s Schema, name: &str, path: &str) -> Result<&'s FieldDef, DataError> {
    schema.field(name).ok_or_else(|| {
        DataError::path(
            path,
            PathError::UnknownField {
                schema: schema.name().to_string(),
                field: name.to_string(),
            },
        )
    })
}

fn id_column(schema: &Schema) -> String {
    schema
        .field(schema.id_field())
        .map(FieldDef::column)
        .unwrap_or_else(|| schema.id_field().to_string())
}

fn ident(name: &str) -> Result<&str, DataError> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(DataError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sql::{PostgresDialect, SqliteDialect};

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(
            Schema::new("Parent")
                .with_table("parents")
                .with_field("label", FieldKind::Text)
                .with_field("age", FieldKind::Integer)
                .with_relation("child", "Child"),
        );
        reg.register(
            Schema::new("Child")
                .with_table("children")
                .with_field("name", FieldKind::Text),
        );
        reg
    }

    fn render(predicate: &Predicate) -> SqlQuery {
        let reg = registry();
        let parent = reg.get("Parent").unwrap();
        render_select(&SqliteDialect, &reg, &parent, Some(predicate), &AnnotationMap::new()).unwrap()
    }

    #[test]
    fn no_predicate_selects_everything() {
        let reg = registry();
        let parent = reg.get("Parent").unwrap();
        let query = render_select(&SqliteDialect, &reg, &parent, None, &AnnotationMap::new()).unwrap();
        assert_eq!(query.sql, "SELECT t0.* FROM parents AS t0");
        assert!(query.params.is_empty());
    }

    #[test]
    fn simple_conditions_bind_parameters() {
        let query = render(&(Predicate::exact("label", "a") & Predicate::condition("age", Lookup::Gte, 3)));
        assert_eq!(
            query.sql,
            "SELECT t0.* FROM parents AS t0 WHERE (t0.label = ? AND t0.age >= ?)"
        );
        assert_eq!(query.params, vec![Value::from("a"), Value::Int(3)]);
    }

    #[test]
    fn postgres_placeholders_are_numbered_in_order() {
        let reg = registry();
        let parent = reg.get("Parent").unwrap();
        let p = Predicate::exact("label", "a") | Predicate::condition("age", Lookup::In, vec![1, 2]);
        let query = render_select(&PostgresDialect, &reg, &parent, Some(&p), &AnnotationMap::new()).unwrap();
        assert_eq!(
            query.sql,
            "SELECT t0.* FROM parents AS t0 WHERE (t0.label = $1 OR t0.age IN ($2, $3))"
        );
        assert_eq!(query.params.len(), 3);
    }

    #[test]
    fn null_and_empty_list() {
        let query = render(&(Predicate::exact("label", Value::Null) | Predicate::condition("age", Lookup::In, Vec::<i64>::new())));
        assert_eq!(
            query.sql,
            "SELECT t0.* FROM parents AS t0 WHERE (t0.label IS NULL OR 1=0)"
        );
    }

    #[test]
    fn negation_is_null_safe() {
        let query = render(&!Predicate::exact("label", "a"));
        assert_eq!(
            query.sql,
            "SELECT t0.* FROM parents AS t0 WHERE NOT COALESCE((t0.label = ?), FALSE)"
        );
    }

    #[test]
    fn patterns_are_escaped_and_cast() {
        let query = render(&Predicate::condition("label", Lookup::IContains, "50%_off"));
        assert_eq!(
            query.sql,
            r"SELECT t0.* FROM parents AS t0 WHERE LOWER(t0.label) LIKE LOWER(?) ESCAPE '\'"
        );
        assert_eq!(query.params, vec![Value::from(r"%50\%\_off%")]);

        let query = render(&Predicate::condition("age", Lookup::StartsWith, 2));
        assert_eq!(
            query.sql,
            r"SELECT t0.* FROM parents AS t0 WHERE CAST(t0.age AS TEXT) LIKE ? ESCAPE '\'"
        );
        assert_eq!(query.params, vec![Value::from("2%")]);
    }

    #[test]
    fn relation_paths_become_subqueries() {
        let query = render(&Predicate::exact("child__name", "X"));
        assert_eq!(
            query.sql,
            "SELECT t0.* FROM parents AS t0 WHERE t0.child_id IN \
             (SELECT t1.id FROM children AS t1 WHERE t1.name = ?)"
        );

        let query = render(&Predicate::is_null("child__name", true));
        assert_eq!(
            query.sql,
            "SELECT t0.* FROM parents AS t0 WHERE (t0.child_id IS NULL OR t0.child_id IN \
             (SELECT t1.id FROM children AS t1 WHERE t1.name IS NULL))"
        );
    }

    #[test]
    fn annotations_wrap_the_base_table() {
        let reg = registry();
        let parent = reg.get("Parent").unwrap();
        let mut annotations = AnnotationMap::new();
        annotations.insert(
            "child_concat".to_string(),
            Expression::Concat(vec![
                Expression::field("label"),
                Expression::literal(" "),
                Expression::field("child__name"),
            ]),
        );
        let p = Predicate::condition("child_concat", Lookup::IContains, "a x");
        let query = render_select(&SqliteDialect, &reg, &parent, Some(&p), &annotations).unwrap();
        assert_eq!(
            query.sql,
            "SELECT * FROM (SELECT t0.*, (COALESCE(CAST(t0.label AS TEXT), '') || \
             COALESCE(CAST(? AS TEXT), '') || COALESCE(CAST((SELECT t1.name FROM children AS t1 \
             WHERE t1.id = t0.child_id) AS TEXT), '')) AS child_concat FROM parents AS t0) AS t0 \
             WHERE LOWER(t0.child_concat) LIKE LOWER(?) ESCAPE '\\'"
        );
        assert_eq!(query.params, vec![Value::from(" "), Value::from("%a x%")]);
    }

    #[test]
    fn unknown_fields_and_unsafe_tables_fail() {
        let reg = registry();
        let parent = reg.get("Parent").unwrap();
        let err = render_select(
            &SqliteDialect,
            &reg,
            &parent,
            Some(&Predicate::exact("missing", 1)),
            &AnnotationMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::Path { .. }));

        let bad = Schema::new("Bad").with_table("bad; DROP TABLE x");
        let err = render_select(&SqliteDialect, &reg, &bad, None, &AnnotationMap::new()).unwrap_err();
        assert!(matches!(err, DataError::InvalidIdentifier(_)));
    }
}
