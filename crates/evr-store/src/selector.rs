//! JSON selector queries over record payloads.
//!
//! A query is either a bare selector object or a document of the form
//! `{"selector": {...}, "limit": n, "skip": n}`. Inside a selector, plain
//! `"field": value` pairs test equality, dotted field names descend into
//! nested objects, and operator objects (`{"$gt": 3}`) apply comparisons.
//!
//! Supported operators: `$eq $ne $gt $gte $lt $lte $in $nin $exists` on
//! fields and `$and $or $not` as combinators. Payloads that are not valid JSON
//! never match.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// A parsed selector query.
#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    root: Condition,
    skip: usize,
    limit: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Field { path: Vec<String>, op: FieldOp },
}

#[derive(Clone, Debug, PartialEq)]
enum FieldOp {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
}

impl Selector {
    /// Parse a query expression.
    pub fn parse(query: &str) -> StoreResult<Self> {
        let doc: Value = serde_json::from_str(query)
            .map_err(|e| StoreError::InvalidQuery(format!("not a JSON document: {e}")))?;
        let Value::Object(doc) = doc else {
            return Err(StoreError::InvalidQuery("query must be a JSON object".into()));
        };

        if let Some(selector) = doc.get("selector") {
            let Value::Object(selector) = selector else {
                return Err(StoreError::InvalidQuery("'selector' must be an object".into()));
            };
            Ok(Self {
                root: parse_object(selector)?,
                skip: read_count(&doc, "skip")?.unwrap_or(0),
                limit: read_count(&doc, "limit")?,
            })
        } else {
            Ok(Self {
                root: parse_object(&doc)?,
                skip: 0,
                limit: None,
            })
        }
    }

    /// Number of leading matches to drop.
    pub fn skip(&self) -> usize {
        self.skip
    }

    /// Maximum number of matches to yield, if bounded.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Test a raw payload against the selector.
    pub fn matches(&self, payload: &[u8]) -> bool {
        match serde_json::from_slice::<Value>(payload) {
            Ok(doc) => self.root.eval(&doc),
            Err(_) => false,
        }
    }
}

fn read_count(doc: &Map<String, Value>, name: &str) -> StoreResult<Option<usize>> {
    match doc.get(name) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                StoreError::InvalidQuery(format!("'{name}' must be a non-negative integer"))
            }),
    }
}

fn parse_object(obj: &Map<String, Value>) -> StoreResult<Condition> {
    let mut conditions = Vec::with_capacity(obj.len());
    for (name, value) in obj {
        conditions.push(match name.as_str() {
            "$and" => Condition::And(parse_list(name, value)?),
            "$or" => Condition::Or(parse_list(name, value)?),
            "$not" => match value {
                Value::Object(inner) => Condition::Not(Box::new(parse_object(inner)?)),
                _ => return Err(StoreError::InvalidQuery("'$not' takes an object".into())),
            },
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidQuery(format!("unsupported combinator '{op}'")))
            }
            field => parse_field(field, value)?,
        });
    }
    Ok(match conditions.len() {
        1 => conditions.remove(0),
        _ => Condition::And(conditions),
    })
}

fn parse_list(name: &str, value: &Value) -> StoreResult<Vec<Condition>> {
    let Value::Array(items) = value else {
        return Err(StoreError::InvalidQuery(format!("'{name}' takes an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(inner) => parse_object(inner),
            _ => Err(StoreError::InvalidQuery(format!("'{name}' entries must be objects"))),
        })
        .collect()
}

fn parse_field(field: &str, value: &Value) -> StoreResult<Condition> {
    let path: Vec<String> = field.split('.').map(str::to_string).collect();

    // An object whose keys are all operators is an operator set; anything
    // else is a literal to compare for equality.
    let operators = match value {
        Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => ops,
        _ => {
            return Ok(Condition::Field {
                path,
                op: FieldOp::Eq(value.clone()),
            })
        }
    };

    let mut conditions = Vec::with_capacity(operators.len());
    for (op, operand) in operators {
        let op = match op.as_str() {
            "$eq" => FieldOp::Eq(operand.clone()),
            "$ne" => FieldOp::Ne(operand.clone()),
            "$gt" => FieldOp::Gt(operand.clone()),
            "$gte" => FieldOp::Gte(operand.clone()),
            "$lt" => FieldOp::Lt(operand.clone()),
            "$lte" => FieldOp::Lte(operand.clone()),
            "$in" => FieldOp::In(operand_list(op, operand)?),
            "$nin" => FieldOp::Nin(operand_list(op, operand)?),
            "$exists" => FieldOp::Exists(operand.as_bool().ok_or_else(|| {
                StoreError::InvalidQuery("'$exists' takes a boolean".into())
            })?),
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "unsupported operator '{other}' on field '{field}'"
                )))
            }
        };
        conditions.push(Condition::Field {
            path: path.clone(),
            op,
        });
    }
    Ok(match conditions.len() {
        1 => conditions.remove(0),
        _ => Condition::And(conditions),
    })
}

fn operand_list(op: &str, operand: &Value) -> StoreResult<Vec<Value>> {
    match operand {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(StoreError::InvalidQuery(format!("'{op}' takes an array"))),
    }
}

impl Condition {
    fn eval(&self, doc: &Value) -> bool {
        match self {
            Self::And(all) => all.iter().all(|c| c.eval(doc)),
            Self::Or(any) => any.iter().any(|c| c.eval(doc)),
            Self::Not(inner) => !inner.eval(doc),
            Self::Field { path, op } => op.eval(resolve(doc, path)),
        }
    }
}

impl FieldOp {
    fn eval(&self, field: Option<&Value>) -> bool {
        let actual = match (self, field) {
            (Self::Exists(expected), field) => return field.is_some() == *expected,
            (_, None) => return false,
            (_, Some(actual)) => actual,
        };
        match self {
            Self::Eq(v) => actual == v,
            Self::Ne(v) => actual != v,
            Self::Gt(v) => compare(actual, v) == Some(Ordering::Greater),
            Self::Gte(v) => matches!(compare(actual, v), Some(Ordering::Greater | Ordering::Equal)),
            Self::Lt(v) => compare(actual, v) == Some(Ordering::Less),
            Self::Lte(v) => matches!(compare(actual, v), Some(Ordering::Less | Ordering::Equal)),
            Self::In(list) => list.contains(actual),
            Self::Nin(list) => !list.contains(actual),
            Self::Exists(_) => false,
        }
    }
}

fn resolve<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(doc, |current, segment| current.as_object()?.get(segment))
}

/// Values of different JSON types are not ordered against each other.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(query: &str, payload: &str) -> bool {
        Selector::parse(query).unwrap().matches(payload.as_bytes())
    }

    #[test]
    fn bare_selector_equality() {
        assert!(matches(r#"{"type":"ship"}"#, r#"{"type":"ship","qty":3}"#));
        assert!(!matches(r#"{"type":"ship"}"#, r#"{"type":"recv"}"#));
    }

    #[test]
    fn wrapped_selector_with_limit_and_skip() {
        let sel = Selector::parse(r#"{"selector":{"type":"ship"},"limit":2,"skip":1}"#).unwrap();
        assert_eq!(sel.limit(), Some(2));
        assert_eq!(sel.skip(), 1);
        assert!(sel.matches(br#"{"type":"ship"}"#));
    }

    #[test]
    fn dotted_paths_descend_into_objects() {
        let q = r#"{"lot.owner":"acme"}"#;
        assert!(matches(q, r#"{"lot":{"owner":"acme"}}"#));
        assert!(!matches(q, r#"{"lot":"acme"}"#));
    }

    #[test]
    fn comparison_operators() {
        let q = r#"{"qty":{"$gte":3,"$lt":10}}"#;
        assert!(matches(q, r#"{"qty":3}"#));
        assert!(matches(q, r#"{"qty":9.5}"#));
        assert!(!matches(q, r#"{"qty":10}"#));
        assert!(!matches(q, r#"{"qty":"5"}"#));
    }

    #[test]
    fn in_nin_and_exists() {
        assert!(matches(r#"{"k":{"$in":["a","b"]}}"#, r#"{"k":"b"}"#));
        assert!(!matches(r#"{"k":{"$nin":["a","b"]}}"#, r#"{"k":"b"}"#));
        assert!(matches(r#"{"k":{"$exists":false}}"#, r#"{"j":1}"#));
        assert!(!matches(r#"{"k":{"$ne":1}}"#, r#"{"j":1}"#));
    }

    #[test]
    fn combinators() {
        let q = r#"{"$or":[{"a":1},{"$not":{"b":2}}]}"#;
        assert!(matches(q, r#"{"a":1,"b":2}"#));
        assert!(matches(q, r#"{"a":0,"b":3}"#));
        assert!(!matches(q, r#"{"a":0,"b":2}"#));
    }

    #[test]
    fn non_json_payload_never_matches() {
        assert!(!matches(r#"{"$not":{"a":1}}"#, "plain text"));
    }

    #[test]
    fn malformed_queries_are_rejected() {
        for q in [
            "not json",
            "[1,2]",
            r#"{"selector":3}"#,
            r#"{"a":{"$regex":"x"}}"#,
            r#"{"$nor":[]}"#,
            r#"{"$and":{}}"#,
            r#"{"selector":{},"limit":-1}"#,
        ] {
            assert!(
                matches!(Selector::parse(q), Err(StoreError::InvalidQuery(_))),
                "expected rejection of {q}"
            );
        }
    }
}
