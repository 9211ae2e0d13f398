//! Filter tree wire format
//!
//! ```json
//! {"type": "and", "data": [
//!     {"type": "operator", "data": {"attribute": "group1", "operator": "=", "value": "GROUP1"}},
//!     {"type": "operator", "data": {"attribute": "date", "operator": ">",
//!                                   "value": {"func": "date", "kwargs": {"year": 2020, "month": 10, "day": 31}}}}
//! ]}
//! ```

use serde::Deserialize;

use super::error::FilterError;

/// Maximum nesting of `and`/`or` groups
pub const MAX_FILTER_DEPTH: usize = 64;

/// One node of a filter tree
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum FilterNode {
    Operator(Condition),
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
}

/// Leaf comparison. Paths use `.` (or `__`) to cross relations and `___` to
/// request a related subquery.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub operator: String,
    #[serde(default)]
    pub value: Option<FilterValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Call(FunctionCall),
    Literal(serde_json::Value),
}

/// Value computed by a registered value function at compile time
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    pub func: String,
    #[serde(default)]
    pub kwargs: serde_json::Map<String, serde_json::Value>,
}

impl FilterNode {
    /// Parse a node tree leniently: a node with an unknown type or invalid
    /// data yields `None` and is dropped from its group, keeping its siblings
    pub fn parse(json: &serde_json::Value) -> Result<Option<Self>, FilterError> {
        Self::parse_at(json, 0)
    }

    fn parse_at(json: &serde_json::Value, depth: usize) -> Result<Option<Self>, FilterError> {
        let kind = json.get("type").and_then(serde_json::Value::as_str);
        match (kind, json.get("data")) {
            (Some("operator"), Some(data)) => match Condition::deserialize(data) {
                Ok(condition) => Ok(Some(Self::Operator(condition))),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping invalid operator node");
                    Ok(None)
                }
            },
            (Some(group @ ("and" | "or")), Some(serde_json::Value::Array(items))) => {
                if depth >= MAX_FILTER_DEPTH {
                    return Err(FilterError::TooDeep {
                        max: MAX_FILTER_DEPTH,
                    });
                }
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    match Self::parse_at(item, depth + 1)? {
                        Some(child) => children.push(child),
                        None => tracing::debug!(node = %item, "Skipping invalid filter node"),
                    }
                }
                Ok(Some(if group == "and" {
                    Self::And(children)
                } else {
                    Self::Or(children)
                }))
            }
            _ => Ok(None),
        }
    }

    pub fn operator(
        attribute: impl Into<String>,
        operator: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self::Operator(Condition {
            attribute: attribute.into(),
            operator: operator.into(),
            value: Some(FilterValue::Literal(value)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_operator_node() {
        let node: FilterNode = serde_json::from_value(json!({
            "type": "operator",
            "data": {"attribute": "group1", "operator": "=", "value": "GROUP1"}
        }))
        .unwrap();
        assert_eq!(node, FilterNode::operator("group1", "=", json!("GROUP1")));
    }

    #[test]
    fn parses_function_call_value() {
        let node: FilterNode = serde_json::from_value(json!({
            "type": "operator",
            "data": {"attribute": "date", "operator": ">",
                     "value": {"func": "date", "kwargs": {"year": 2020, "month": 1, "day": 2}}}
        }))
        .unwrap();
        let FilterNode::Operator(condition) = node else {
            panic!("expected operator node");
        };
        match condition.value {
            Some(FilterValue::Call(call)) => {
                assert_eq!(call.func, "date");
                assert_eq!(call.kwargs["year"], json!(2020));
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn missing_and_null_values_are_absent() {
        let node: FilterNode = serde_json::from_value(json!({
            "type": "operator", "data": {"attribute": "user", "operator": "me"}
        }))
        .unwrap();
        assert!(matches!(node, FilterNode::Operator(Condition { value: None, .. })));

        let node: FilterNode = serde_json::from_value(json!({
            "type": "operator", "data": {"attribute": "user", "operator": "=", "value": null}
        }))
        .unwrap();
        assert!(matches!(node, FilterNode::Operator(Condition { value: None, .. })));
    }

    #[test]
    fn parses_nested_groups() {
        let node: FilterNode = serde_json::from_value(json!({
            "type": "and",
            "data": [
                {"type": "operator", "data": {"attribute": "a", "operator": "=", "value": 1}},
                {"type": "or", "data": []}
            ]
        }))
        .unwrap();
        assert_eq!(
            node,
            FilterNode::And(vec![
                FilterNode::operator("a", "=", json!(1)),
                FilterNode::Or(vec![])
            ])
        );
    }

    #[test]
    fn lenient_parse_drops_only_invalid_nodes() {
        let node = FilterNode::parse(&json!({
            "type": "or",
            "data": [
                {"type": "xor", "data": []},
                {"type": "operator", "data": {"attribute": "a", "operator": "=", "value": 1}},
                {"type": "operator", "data": {"operator": "="}},
                {"type": "and"}
            ]
        }))
        .unwrap();
        assert_eq!(
            node,
            Some(FilterNode::Or(vec![FilterNode::operator("a", "=", json!(1))]))
        );

        assert_eq!(FilterNode::parse(&json!([1, 2])).unwrap(), None);
        assert_eq!(FilterNode::parse(&json!({"type": "xor"})).unwrap(), None);
    }

    #[test]
    fn lenient_parse_limits_depth() {
        let mut tree = json!({"type": "operator", "data": {"attribute": "a", "operator": "=", "value": 1}});
        for _ in 0..MAX_FILTER_DEPTH {
            tree = json!({"type": "and", "data": [tree]});
        }
        assert!(FilterNode::parse(&tree).unwrap().is_some());

        let tree = json!({"type": "and", "data": [tree]});
        let err = FilterNode::parse(&tree).unwrap_err();
        assert!(matches!(err, FilterError::TooDeep { max } if max == MAX_FILTER_DEPTH));
    }

    #[test]
    fn rejects_unknown_node_type() {
        let result: Result<FilterNode, _> =
            serde_json::from_value(json!({"type": "xor", "data": []}));
        assert!(result.is_err());
    }
}
