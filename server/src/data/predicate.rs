//! Composable predicates and computed annotations
//!
//! A [`Predicate`] is the backend-neutral form of a WHERE clause. Paths use the
//! native `__` delimiter to traverse relations (`user__username`). Predicates
//! combine with `&`, `|` and `!`.
//!
//! Annotations are derived fields (e.g. a concatenation of two columns) that
//! must be attached to a collection before a predicate can reference them by
//! name.

use std::collections::BTreeMap;
use std::ops::{BitAnd, BitOr, Not};

use super::value::Value;

/// Native relation delimiter in attribute paths
pub const PATH_DELIMITER: &str = "__";

/// Comparison kinds understood by every data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    IsNull,
}

impl Lookup {
    /// Parse a native lookup name (`icontains`, `gte`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        let lookup = match name {
            "exact" => Self::Exact,
            "iexact" => Self::IExact,
            "contains" => Self::Contains,
            "icontains" => Self::IContains,
            "startswith" => Self::StartsWith,
            "istartswith" => Self::IStartsWith,
            "endswith" => Self::EndsWith,
            "iendswith" => Self::IEndsWith,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "in" => Self::In,
            "isnull" => Self::IsNull,
            _ => return None,
        };
        Some(lookup)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::IExact => "iexact",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::StartsWith => "startswith",
            Self::IStartsWith => "istartswith",
            Self::EndsWith => "endswith",
            Self::IEndsWith => "iendswith",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::IsNull => "isnull",
        }
    }

    pub fn is_case_insensitive(&self) -> bool {
        matches!(
            self,
            Self::IExact | Self::IContains | Self::IStartsWith | Self::IEndsWith
        )
    }
}

/// Boolean expression over the fields of one schema
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Condition {
        path: String,
        lookup: Lookup,
        value: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn condition(path: impl Into<String>, lookup: Lookup, value: impl Into<Value>) -> Self {
        Self::Condition {
            path: path.into(),
            lookup,
            value: value.into(),
        }
    }

    pub fn exact(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(path, Lookup::Exact, value)
    }

    pub fn is_null(path: impl Into<String>, null: bool) -> Self {
        Self::condition(path, Lookup::IsNull, Value::Bool(null))
    }

    /// Conjunction, flattening nested `And`s
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), right) => {
                left.push(right);
                Self::And(left)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }

    /// Disjunction, flattening nested `Or`s
    pub fn or(self, other: Predicate) -> Self {
        match (self, other) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), right) => {
                left.push(right);
                Self::Or(left)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }

    /// Negation; double negation collapses
    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// All attribute paths referenced by this predicate
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Condition { path, .. } => out.push(path),
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_paths(out);
                }
            }
            Self::Not(inner) => inner.collect_paths(out),
        }
    }
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        self.and(rhs)
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        self.or(rhs)
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        self.negate()
    }
}

/// Computed expression attached to a collection as a virtual field
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Value of a (possibly related) field path
    Field(String),
    Literal(Value),
    /// Textual concatenation; nulls contribute an empty string
    Concat(Vec<Expression>),
    Lower(Box<Expression>),
    /// First non-null argument
    Coalesce(Vec<Expression>),
}

impl Expression {
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field(path.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }
}

/// Derived-field name -> expression
pub type AnnotationMap = BTreeMap<String, Expression>;

/// Output of compiling a filter node: an optional predicate plus the
/// annotations it references
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    pub predicate: Option<Predicate>,
    pub annotations: AnnotationMap,
}

impl CompiledFilter {
    /// No filtering
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.predicate.is_none()
    }

    pub fn with_annotation(mut self, name: impl Into<String>, expression: Expression) -> Self {
        self.annotations.insert(name.into(), expression);
        self
    }

    /// AND-combine another result into this one; absent predicates are skipped
    /// and later annotations overwrite earlier ones with the same name
    pub fn merge_and(&mut self, other: CompiledFilter) {
        self.merge(other, Predicate::and);
    }

    /// OR-combine another result into this one
    pub fn merge_or(&mut self, other: CompiledFilter) {
        self.merge(other, Predicate::or);
    }

    fn merge(&mut self, other: CompiledFilter, combine: fn(Predicate, Predicate) -> Predicate) {
        self.annotations.extend(other.annotations);
        self.predicate = match (self.predicate.take(), other.predicate) {
            (Some(left), Some(right)) => Some(combine(left, right)),
            (left, right) => left.or(right),
        };
    }
}

impl From<Predicate> for CompiledFilter {
    fn from(predicate: Predicate) -> Self {
        Self {
            predicate: Some(predicate),
            annotations: AnnotationMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_names_round_trip() {
        for name in [
            "exact",
            "iexact",
            "contains",
            "icontains",
            "startswith",
            "istartswith",
            "endswith",
            "iendswith",
            "gt",
            "gte",
            "lt",
            "lte",
            "in",
            "isnull",
        ] {
            assert_eq!(Lookup::from_name(name).map(|l| l.name()), Some(name));
        }
        assert_eq!(Lookup::from_name("regex"), None);
    }

    #[test]
    fn operators_flatten() {
        let a = Predicate::exact("a", 1);
        let b = Predicate::exact("b", 2);
        let c = Predicate::exact("c", 3);

        let and = a.clone() & b.clone() & c.clone();
        assert_eq!(and, Predicate::And(vec![a.clone(), b.clone(), c.clone()]));

        let or = a.clone() | b.clone() | c.clone();
        assert_eq!(or, Predicate::Or(vec![a, b, c]));
    }

    #[test]
    fn double_negation_collapses() {
        let a = Predicate::exact("a", 1);
        assert_eq!(!!a.clone(), a);
    }

    #[test]
    fn merge_skips_absent_predicates() {
        let mut acc = CompiledFilter::empty();
        acc.merge_and(CompiledFilter::empty());
        assert!(acc.is_empty());

        acc.merge_and(Predicate::exact("a", 1).into());
        assert_eq!(acc.predicate, Some(Predicate::exact("a", 1)));

        acc.merge_and(CompiledFilter::empty());
        assert_eq!(acc.predicate, Some(Predicate::exact("a", 1)));
    }

    #[test]
    fn merge_later_annotations_win() {
        let mut acc = CompiledFilter::empty().with_annotation("x", Expression::literal(1));
        acc.merge_or(CompiledFilter::empty().with_annotation("x", Expression::literal(2)));
        assert_eq!(acc.annotations["x"], Expression::literal(2));
    }

    #[test]
    fn paths_are_collected_in_order() {
        let p = Predicate::exact("a", 1) & !(Predicate::exact("b__c", 2) | Predicate::is_null("d", true));
        assert_eq!(p.paths(), vec!["a", "b__c", "d"]);
    }
}
