//! Conservative MongoDB-style predicate evaluation.
//!
//! Decides whether a document *could* belong to a query's result set.
//! Parsed once per cached query, evaluated against every mutation —
//! a tagged-variant tree rather than a walk of raw JSON each time.

use std::cmp::Ordering;

use serde_json::Value;

/// Reserved top-level path segments. A predicate touching one of these
/// at any depth is skipped (treated as matching) because server-managed
/// fields never appear in user write payloads.
const RESERVED_SEGMENTS: [&str; 2] = ["__rerum", "_id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A single evaluable node. `Or`/`And` compose other nodes; every other
/// variant carries a path already resolved relative to the document
/// root (sub-document nesting is flattened into dotted paths at parse
/// time, so evaluation never needs a distinct "sub-document" case).
#[derive(Debug, Clone)]
pub enum PredicateNode {
    Eq { path: String, value: Value },
    Ne { path: String, value: Value },
    Cmp { path: String, op: CmpOp, value: Value },
    In { path: String, values: Vec<Value> },
    Exists { path: String, expected: bool },
    Size { path: String, expected: u64 },
    Or(Vec<PredicateNode>),
    And(Vec<PredicateNode>),
}

fn path_is_reserved(path: &str) -> bool {
    path.split('.').any(|seg| RESERVED_SEGMENTS.contains(&seg))
}

/// Parse a stored query (or query fragment) into its top-level
/// conditions. Unwraps a top-level `__cached` envelope, ignoring
/// sibling `limit`/`skip`.
pub fn parse(query: &Value) -> Vec<PredicateNode> {
    let body = query.get("__cached").unwrap_or(query);
    parse_object(body)
}

fn parse_object(obj: &Value) -> Vec<PredicateNode> {
    let mut out = Vec::new();
    let Value::Object(map) = obj else {
        return out;
    };
    for (key, value) in map {
        match key.as_str() {
            "$or" => {
                if let Some(arr) = value.as_array() {
                    let branches = arr.iter().map(|sub| PredicateNode::And(parse_object(sub))).collect();
                    out.push(PredicateNode::Or(branches));
                }
            }
            "$and" => {
                if let Some(arr) = value.as_array() {
                    let branches = arr.iter().map(|sub| PredicateNode::And(parse_object(sub))).collect();
                    out.push(PredicateNode::And(branches));
                }
            }
            _ => parse_field(key, value, &mut out),
        }
    }
    out
}

fn parse_field(path: &str, value: &Value, out: &mut Vec<PredicateNode>) {
    if path_is_reserved(path) {
        return;
    }
    match value {
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => {
            for (op, operand) in map {
                match op.as_str() {
                    "$eq" => out.push(PredicateNode::Eq { path: path.to_string(), value: operand.clone() }),
                    "$ne" => out.push(PredicateNode::Ne { path: path.to_string(), value: operand.clone() }),
                    "$gt" => out.push(PredicateNode::Cmp { path: path.to_string(), op: CmpOp::Gt, value: operand.clone() }),
                    "$gte" => out.push(PredicateNode::Cmp { path: path.to_string(), op: CmpOp::Gte, value: operand.clone() }),
                    "$lt" => out.push(PredicateNode::Cmp { path: path.to_string(), op: CmpOp::Lt, value: operand.clone() }),
                    "$lte" => out.push(PredicateNode::Cmp { path: path.to_string(), op: CmpOp::Lte, value: operand.clone() }),
                    "$in" => {
                        let values = operand.as_array().cloned().unwrap_or_default();
                        out.push(PredicateNode::In { path: path.to_string(), values });
                    }
                    "$exists" => {
                        let expected = operand.as_bool().unwrap_or(true);
                        out.push(PredicateNode::Exists { path: path.to_string(), expected });
                    }
                    "$size" => {
                        if let Some(expected) = operand.as_u64() {
                            out.push(PredicateNode::Size { path: path.to_string(), expected });
                        }
                    }
                    // Unrecognized operator: conservatively do not constrain
                    // (treated as match, never a false negative).
                    _ => {}
                }
            }
        }
        Value::Object(map) => {
            // Plain sub-document: recurse, flattening into dotted paths.
            for (key, child) in map {
                parse_field(&format!("{path}.{key}"), child, out);
            }
        }
        _ => out.push(PredicateNode::Eq { path: path.to_string(), value: value.clone() }),
    }
}

/// Resolve `segments` against `node`. An array encountered mid-path
/// applies the remaining segments to each element and the results are
/// concatenated (disjunctive — "any array element matches wins"). The
/// terminal value is returned un-exploded so callers needing the
/// container itself (e.g. `$size`) see the real array.
fn resolve_path<'a>(node: &'a Value, segments: &[&str]) -> Vec<&'a Value> {
    if segments.is_empty() {
        return vec![node];
    }
    match node {
        Value::Array(items) => items.iter().flat_map(|item| resolve_path(item, segments)).collect(),
        Value::Object(map) => match map.get(segments[0]) {
            Some(child) => resolve_path(child, &segments[1..]),
            None => vec![],
        },
        _ => vec![],
    }
}

/// Like `resolve_path`, but additionally explodes one level of any
/// terminal array value into its elements. Used by value-comparison
/// operators so an implicit match against an array field (e.g.
/// `{"tags": "x"}` against `{"tags": ["x", "y"]}`) is found. Exploding
/// only ever adds candidate values, so it can only turn a would-be
/// false negative into a match — never the reverse.
fn resolve_values<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    resolve_path(doc, &segments)
        .into_iter()
        .flat_map(|v| match v {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn eval_one(doc: &Value, node: &PredicateNode) -> bool {
    match node {
        PredicateNode::Eq { path, value } => resolve_values(doc, path).iter().any(|v| *v == value),
        PredicateNode::Ne { path, value } => {
            let candidates = resolve_values(doc, path);
            candidates.is_empty() || candidates.iter().any(|v| *v != value)
        }
        PredicateNode::Cmp { path, op, value } => resolve_values(doc, path).iter().any(|v| {
            matches!(
                (op, compare(v, value)),
                (CmpOp::Gt, Some(Ordering::Greater))
                    | (CmpOp::Gte, Some(Ordering::Greater) | Some(Ordering::Equal))
                    | (CmpOp::Lt, Some(Ordering::Less))
                    | (CmpOp::Lte, Some(Ordering::Less) | Some(Ordering::Equal))
            )
        }),
        PredicateNode::In { path, values } => {
            resolve_values(doc, path).iter().any(|v| values.contains(v))
        }
        PredicateNode::Exists { path, expected } => {
            let segments: Vec<&str> = path.split('.').collect();
            let present = !resolve_path(doc, &segments).is_empty();
            present == *expected
        }
        PredicateNode::Size { path, expected } => {
            let segments: Vec<&str> = path.split('.').collect();
            resolve_path(doc, &segments)
                .iter()
                .any(|v| matches!(v, Value::Array(items) if items.len() as u64 == *expected))
        }
        PredicateNode::Or(branches) => branches.iter().any(|b| eval_one(doc, b)),
        PredicateNode::And(branches) => branches.iter().all(|b| eval_one(doc, b)),
    }
}

/// True when `doc` matches all (non-skipped) top-level conditions.
pub fn evaluate(doc: &Value, conditions: &[PredicateNode]) -> bool {
    conditions.iter().all(|c| eval_one(doc, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matches(query: &Value, doc: &Value) -> bool {
        evaluate(doc, &parse(query))
    }

    #[test]
    fn implicit_equality() {
        assert!(matches(&json!({"type": "T"}), &json!({"type": "T"})));
        assert!(!matches(&json!({"type": "T"}), &json!({"type": "Other"})));
    }

    #[test]
    fn nested_dotted_path() {
        let query = json!({"body.target": "http://e/t1"});
        assert!(matches(&query, &json!({"body": {"target": "http://e/t1"}})));
        assert!(!matches(&query, &json!({"body": {"target": "http://e/t2"}})));
    }

    #[test]
    fn or_composition() {
        let query = json!({"$or": [{"target": "u"}, {"target.@id": "u"}]});
        assert!(matches(&query, &json!({"target": {"@id": "u"}})));
    }

    #[test]
    fn reserved_field_skipped_but_siblings_still_match() {
        let query = json!({"__rerum.history.next": {"$size": 0}, "body.v": "x"});
        assert!(matches(&query, &json!({"body": {"v": "x"}})));
        assert!(!matches(&query, &json!({"body": {"v": "y"}})));
    }

    #[test]
    fn exists_operator() {
        let query = json!({"body.label": {"$exists": true}});
        assert!(matches(&query, &json!({"body": {"label": "x"}})));
        assert!(!matches(&query, &json!({"body": {}})));
    }

    #[test]
    fn exists_false() {
        let query = json!({"body.label": {"$exists": false}});
        assert!(matches(&query, &json!({"body": {}})));
        assert!(!matches(&query, &json!({"body": {"label": "x"}})));
    }

    #[test]
    fn size_operator() {
        let query = json!({"tags": {"$size": 2}});
        assert!(matches(&query, &json!({"tags": ["a", "b"]})));
        assert!(!matches(&query, &json!({"tags": ["a"]})));
    }

    #[test]
    fn comparison_operators() {
        assert!(matches(&json!({"age": {"$gt": 18}}), &json!({"age": 21})));
        assert!(!matches(&json!({"age": {"$gte": 22}}), &json!({"age": 21})));
        assert!(matches(&json!({"age": {"$lte": 21}}), &json!({"age": 21})));
    }

    #[test]
    fn in_operator() {
        let query = json!({"status": {"$in": ["active", "pending"]}});
        assert!(matches(&query, &json!({"status": "pending"})));
        assert!(!matches(&query, &json!({"status": "closed"})));
    }

    #[test]
    fn array_disjunction_mid_path() {
        let query = json!({"items.value": "x"});
        let doc = json!({"items": [{"value": "y"}, {"value": "x"}]});
        assert!(matches(&query, &doc));
    }

    #[test]
    fn cached_envelope_unwrapped() {
        let stored = json!({"__cached": {"type": "T"}, "limit": 10, "skip": 0});
        assert!(matches(&stored, &json!({"type": "T"})));
    }

    #[test]
    fn ne_operator() {
        let query = json!({"status": {"$ne": "closed"}});
        assert!(matches(&query, &json!({"status": "open"})));
        assert!(!matches(&query, &json!({"status": "closed"})));
    }

    #[test]
    fn and_composition() {
        let query = json!({"$and": [{"type": "T"}, {"status": "open"}]});
        assert!(matches(&query, &json!({"type": "T", "status": "open"})));
        assert!(!matches(&query, &json!({"type": "T", "status": "closed"})));
    }
}
