//! Schema introspection
//!
//! Describes the entities a filter can target: their fields, which fields are
//! relations (and to what), the identifier field, and an optional hook that
//! decides how a bare relation is compared.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::predicate::PATH_DELIMITER;
use crate::domain::filter::LookupResolver;

/// Default identifier field name
pub const DEFAULT_ID_FIELD: &str = "id";

/// Field type as far as filtering is concerned
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    /// To-one relation; the stored value is the target's identifier
    Relation { target: String },
}

impl FieldKind {
    /// Character-like fields get the "empty or null" equality widening
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, Self::Relation { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Storage column; defaults to the field name (`<name>_id` for relations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            column: None,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn column(&self) -> String {
        match (&self.column, &self.kind) {
            (Some(column), _) => column.clone(),
            (None, FieldKind::Relation { .. }) => format!("{}_id", self.name),
            (None, _) => self.name.clone(),
        }
    }
}

/// Entity description used by the compiler and data sources
#[derive(Clone)]
pub struct Schema {
    name: String,
    table: String,
    id_field: String,
    fields: Vec<FieldDef>,
    lookup: Option<Arc<dyn LookupResolver>>,
}

impl Schema {
    /// New schema with an integer `id` identifier and a lowercase table name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.to_lowercase(),
            name,
            id_field: DEFAULT_ID_FIELD.to_string(),
            fields: vec![FieldDef::new(DEFAULT_ID_FIELD, FieldKind::Integer)],
            lookup: None,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Replace the identifier field
    pub fn with_id_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let previous = std::mem::replace(&mut self.id_field, name.clone());
        self.fields.retain(|f| f.name != previous && f.name != name);
        self.fields.insert(0, FieldDef::new(name, kind));
        self
    }

    pub fn with_field(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.with_field_def(FieldDef::new(name, kind))
    }

    pub fn with_relation(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_field(
            name,
            FieldKind::Relation {
                target: target.into(),
            },
        )
    }

    pub fn with_field_def(mut self, def: FieldDef) -> Self {
        self.fields.retain(|f| f.name != def.name);
        self.fields.push(def);
        self
    }

    /// Register a custom hook deciding how a bare relation to this schema is compared
    pub fn with_lookup(mut self, resolver: Arc<dyn LookupResolver>) -> Self {
        self.lookup = Some(resolver);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn lookup_resolver(&self) -> Option<&Arc<dyn LookupResolver>> {
        self.lookup.as_ref()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("id_field", &self.id_field)
            .field("fields", &self.fields)
            .field("lookup", &self.lookup.is_some())
            .finish()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Unknown field '{field}' on {schema}")]
    UnknownField { schema: String, field: String },

    #[error("Field '{field}' on {schema} is not a relation")]
    NotARelation { schema: String, field: String },

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    #[error("Empty attribute path")]
    Empty,
}

/// What an attribute path points at
#[derive(Debug, Clone)]
pub enum PathTarget {
    Scalar(FieldKind),
    Relation {
        field: FieldDef,
        target: Arc<Schema>,
    },
}

/// All known schemas, keyed by name
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: FxHashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: Schema) -> Arc<Schema> {
        let schema = Arc::new(schema);
        self.schemas
            .insert(schema.name().to_string(), Arc::clone(&schema));
        schema
    }

    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).cloned()
    }

    /// Case-insensitive lookup by schema name
    pub fn find_ignore_case(&self, name: &str) -> Option<Arc<Schema>> {
        self.get(name).or_else(|| {
            self.schemas
                .values()
                .find(|s| s.name().eq_ignore_ascii_case(name))
                .cloned()
        })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Resolve the target of a relation field
    pub fn relation_target(&self, owner: &Schema, field: &FieldDef) -> Result<Arc<Schema>, PathError> {
        match &field.kind {
            FieldKind::Relation { target } => self
                .get(target)
                .ok_or_else(|| PathError::UnknownSchema(target.clone())),
            _ => Err(PathError::NotARelation {
                schema: owner.name().to_string(),
                field: field.name.clone(),
            }),
        }
    }

    /// Walk a `__`-delimited path from `schema`, following relations
    pub fn walk(&self, schema: &Schema, path: &str) -> Result<PathTarget, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let segments: Vec<&str> = path.split(PATH_DELIMITER).collect();
        let mut current: Option<Arc<Schema>> = None;

        for (i, segment) in segments.iter().enumerate() {
            let owner: &Schema = current.as_deref().unwrap_or(schema);
            let field = owner
                .field(segment)
                .ok_or_else(|| PathError::UnknownField {
                    schema: owner.name().to_string(),
                    field: segment.to_string(),
                })?;
            let is_last = i + 1 == segments.len();

            if field.kind.is_relation() {
                let target = self.relation_target(owner, field)?;
                if is_last {
                    return Ok(PathTarget::Relation {
                        field: field.clone(),
                        target,
                    });
                }
                current = Some(target);
            } else if is_last {
                return Ok(PathTarget::Scalar(field.kind.clone()));
            } else {
                return Err(PathError::NotARelation {
                    schema: owner.name().to_string(),
                    field: field.name.clone(),
                });
            }
        }
        Err(PathError::Empty)
    }

    /// Field kind at the end of a path, if it resolves
    pub fn field_kind(&self, schema: &Schema, path: &str) -> Option<FieldKind> {
        match self.walk(schema, path).ok()? {
            PathTarget::Scalar(kind) => Some(kind),
            PathTarget::Relation { field, .. } => Some(field.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(
            Schema::new("Parent")
                .with_field("name", FieldKind::Text)
                .with_relation("child", "Child"),
        );
        reg.register(
            Schema::new("Child")
                .with_field("name", FieldKind::Text)
                .with_relation("owner", "User"),
        );
        reg.register(Schema::new("User").with_field("username", FieldKind::Text));
        reg
    }

    #[test]
    fn walk_scalar() {
        let reg = registry();
        let parent = reg.get("Parent").unwrap();
        assert!(matches!(
            reg.walk(&parent, "name"),
            Ok(PathTarget::Scalar(FieldKind::Text))
        ));
    }

    #[test]
    fn walk_through_relations() {
        let reg = registry();
        let parent = reg.get("Parent").unwrap();
        assert!(matches!(
            reg.walk(&parent, "child__owner__username"),
            Ok(PathTarget::Scalar(FieldKind::Text))
        ));
        match reg.walk(&parent, "child__owner") {
            Ok(PathTarget::Relation { field, target }) => {
                assert_eq!(field.name, "owner");
                assert_eq!(target.name(), "User");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn walk_unknown_field() {
        let reg = registry();
        let parent = reg.get("Parent").unwrap();
        assert_eq!(
            reg.walk(&parent, "child__missing").unwrap_err(),
            PathError::UnknownField {
                schema: "Child".into(),
                field: "missing".into()
            }
        );
    }

    #[test]
    fn walk_through_scalar_fails() {
        let reg = registry();
        let parent = reg.get("Parent").unwrap();
        assert!(matches!(
            reg.walk(&parent, "name__x"),
            Err(PathError::NotARelation { .. })
        ));
    }

    #[test]
    fn find_ignore_case() {
        let reg = registry();
        assert_eq!(reg.find_ignore_case("child").unwrap().name(), "Child");
        assert_eq!(reg.find_ignore_case("CHILD").unwrap().name(), "Child");
        assert!(reg.find_ignore_case("orphan").is_none());
    }

    #[test]
    fn relation_columns_default_to_id_suffix() {
        let def = FieldDef::new(
            "child",
            FieldKind::Relation {
                target: "Child".into(),
            },
        );
        assert_eq!(def.column(), "child_id");
        assert_eq!(def.with_column("kid").column(), "kid");
    }

    #[test]
    fn with_id_field_replaces_default() {
        let schema = Schema::new("Tag").with_id_field("slug", FieldKind::Text);
        assert_eq!(schema.id_field(), "slug");
        assert!(schema.field("id").is_none());
        assert_eq!(schema.fields()[0].name, "slug");
    }

    #[test]
    fn field_def_deserializes() {
        let def: FieldDef =
            serde_json::from_str(r#"{"name": "user", "kind": "relation", "target": "User"}"#)
                .unwrap();
        assert_eq!(
            def.kind,
            FieldKind::Relation {
                target: "User".into()
            }
        );
        let def: FieldDef =
            serde_json::from_str(r#"{"name": "created", "kind": "datetime"}"#).unwrap();
        assert_eq!(def.kind, FieldKind::DateTime);
    }
}
