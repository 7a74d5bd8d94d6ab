//! In-process predicate evaluation.
//!
//! Follows Cypher's three-valued logic: comparisons involving `null` are
//! unknown (`None`), `AND`/`OR`/`NOT` propagate unknown the Kleene way, and a
//! `WHERE` clause keeps a row only when the predicate is definitely true.

use super::{CompareOp, Literal, Operand, Predicate, StringOp};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Borrowed view of a node or relationship bound to a variable.
#[derive(Debug, Clone, Copy)]
pub struct EntityRef<'a> {
    /// Node labels, or the single relationship type for relationships.
    pub labels: &'a [String],
    pub properties: &'a Map<String, Value>,
}

/// Resolves variables to entities during evaluation.
pub trait Bindings {
    fn entity(&self, variable: &str) -> Option<EntityRef<'_>>;
}

impl<'a, const N: usize> Bindings for [(&'a str, EntityRef<'a>); N] {
    fn entity(&self, variable: &str) -> Option<EntityRef<'_>> {
        self.iter()
            .find(|(name, _)| *name == variable)
            .map(|(_, entity)| *entity)
    }
}

impl Predicate {
    /// Evaluate with three-valued logic. `None` means unknown (null).
    pub fn evaluate(&self, bindings: &dyn Bindings) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::Compare { left, op, right } => {
                compare(&left.evaluate(bindings), *op, &right.evaluate(bindings))
            }
            Self::StringMatch {
                subject,
                op,
                pattern,
            } => match (subject.evaluate(bindings), pattern.evaluate(bindings)) {
                (Value::String(s), Value::String(p)) => Some(match op {
                    StringOp::StartsWith => s.starts_with(p.as_str()),
                    StringOp::EndsWith => s.ends_with(p.as_str()),
                    StringOp::Contains => s.contains(p.as_str()),
                }),
                _ => None,
            },
            Self::IsNull { operand, negated } => {
                let is_null = operand.evaluate(bindings).is_null();
                Some(is_null != *negated)
            }
            Self::In { operand, list } => {
                let Value::Array(items) = list.evaluate(bindings) else {
                    return None;
                };
                let needle = operand.evaluate(bindings);
                let mut unknown = false;
                for item in &items {
                    match compare(&needle, CompareOp::Eq, item) {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            Self::HasLabel { variable, label } => bindings
                .entity(variable)
                .map(|e| e.labels.iter().any(|l| l == label)),
            Self::Truthy(operand) => match operand.evaluate(bindings) {
                Value::Bool(b) => Some(b),
                _ => None,
            },
            Self::Not(inner) => inner.evaluate(bindings).map(|b| !b),
            Self::And(items) => {
                let mut result = Some(true);
                for item in items {
                    match item.evaluate(bindings) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Self::Or(items) => {
                let mut result = Some(false);
                for item in items {
                    match item.evaluate(bindings) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
        }
    }

    /// Whether a `WHERE` clause with this predicate keeps the row.
    pub fn matches(&self, bindings: &dyn Bindings) -> bool {
        self.evaluate(bindings) == Some(true)
    }
}

impl Operand {
    fn evaluate(&self, bindings: &dyn Bindings) -> Value {
        match self {
            Self::Literal(lit) => lit.to_value(),
            Self::Property { variable, key } => bindings
                .entity(variable)
                .and_then(|e| e.properties.get(key).cloned())
                .unwrap_or(Value::Null),
            Self::Variable(variable) => bindings
                .entity(variable)
                .map(|e| Value::Object(e.properties.clone()))
                .unwrap_or(Value::Null),
            Self::List(items) => Value::Array(items.iter().map(|o| o.evaluate(bindings)).collect()),
        }
    }
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(x) => Value::from(*x),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> Option<bool> {
    if left.is_null() || right.is_null() {
        return None;
    }
    match op {
        CompareOp::Eq => Some(equals(left, right)),
        CompareOp::Ne => Some(!equals(left, right)),
        CompareOp::Lt => order(left, right).map(|o| o == Ordering::Less),
        CompareOp::Le => order(left, right).map(|o| o != Ordering::Greater),
        CompareOp::Gt => order(left, right).map(|o| o == Ordering::Greater),
        CompareOp::Ge => order(left, right).map(|o| o != Ordering::Less),
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) if left.is_number() && right.is_number() => a == b,
        _ => left == right,
    }
}

/// Grouping key under which values equal by `=` coincide, so `1` and `1.0`
/// land in the same group while `1` and `'1'` stay apart.
pub fn value_key(value: &Value) -> String {
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(x)) if x.fract() == 0.0 && x.abs() < 9.0e15 => (x as i64).to_string(),
            (None, Some(x)) => x.to_string(),
            (None, None) => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_comparison_against_properties() {
        let labels = vec!["Person".to_string()];
        let properties = props(json!({"age": 30, "name": "Ada"}));
        let entity = EntityRef {
            labels: &labels,
            properties: &properties,
        };
        let scope = [("n", entity)];

        assert!(Predicate::parse("n.age > 20").unwrap().matches(&scope));
        assert!(Predicate::parse("n.age = 30.0").unwrap().matches(&scope));
        assert!(Predicate::parse("n:Person AND n.name STARTS WITH 'A'")
            .unwrap()
            .matches(&scope));
        assert!(!Predicate::parse("n.age < 20").unwrap().matches(&scope));
    }

    #[test]
    fn test_missing_property_is_unknown() {
        let labels: Vec<String> = vec![];
        let properties = props(json!({"age": 30}));
        let scope = [(
            "n",
            EntityRef {
                labels: &labels,
                properties: &properties,
            },
        )];

        let p = Predicate::parse("n.height > 1").unwrap();
        assert_eq!(p.evaluate(&scope), None);
        assert!(!p.matches(&scope));

        // NOT unknown stays unknown; OR true short-circuits it
        let negated = Predicate::parse("NOT n.height > 1").unwrap();
        assert_eq!(negated.evaluate(&scope), None);
        let either = Predicate::parse("n.height > 1 OR n.age = 30").unwrap();
        assert_eq!(either.evaluate(&scope), Some(true));
        assert!(Predicate::parse("n.height IS NULL")
            .unwrap()
            .matches(&scope));
    }

    #[test]
    fn test_in_list_with_null_member() {
        let labels: Vec<String> = vec![];
        let properties = props(json!({"kind": "c"}));
        let scope = [(
            "n",
            EntityRef {
                labels: &labels,
                properties: &properties,
            },
        )];
        assert_eq!(
            Predicate::parse("n.kind IN ['a', null]")
                .unwrap()
                .evaluate(&scope),
            None
        );
        assert_eq!(
            Predicate::parse("n.kind IN ['a', 'c']")
                .unwrap()
                .evaluate(&scope),
            Some(true)
        );
    }

    #[test]
    fn test_value_key_follows_numeric_equality() {
        assert_eq!(value_key(&json!(1)), value_key(&json!(1.0)));
        assert_eq!(value_key(&json!(-0.0)), value_key(&json!(0)));
        assert_ne!(value_key(&json!(1)), value_key(&json!(1.5)));
        assert_ne!(value_key(&json!(1)), value_key(&json!("1")));
        assert!(equals(&json!(2), &json!(2.0)));
    }

    #[test]
    fn test_unbound_variable_is_null() {
        let scope: [(&str, EntityRef<'_>); 0] = [];
        assert_eq!(
            Predicate::parse("m.age > 1").unwrap().evaluate(&scope),
            None
        );
        assert!(Predicate::True.matches(&scope));
    }
}
