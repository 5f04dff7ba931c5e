//! Cache-key namespaces and construction/parsing.

use serde_json::{json, Value};

use super::canonical::to_canonical_string;

/// The six cached route families named in the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Id,
    History,
    Since,
    Query,
    Search,
    SearchPhrase,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Id => "id",
            Namespace::History => "history",
            Namespace::Since => "since",
            Namespace::Query => "query",
            Namespace::Search => "search",
            Namespace::SearchPhrase => "searchPhrase",
        }
    }

    pub fn parse(s: &str) -> Option<Namespace> {
        match s {
            "id" => Some(Namespace::Id),
            "history" => Some(Namespace::History),
            "since" => Some(Namespace::Since),
            "query" => Some(Namespace::Query),
            "search" => Some(Namespace::Search),
            "searchPhrase" => Some(Namespace::SearchPhrase),
            _ => None,
        }
    }

    /// Scalar-shaped namespaces key on a bare id, no JSON encoding.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Namespace::Id | Namespace::History | Namespace::Since)
    }

    pub fn all() -> [Namespace; 6] {
        [
            Namespace::Id,
            Namespace::History,
            Namespace::Since,
            Namespace::Query,
            Namespace::Search,
            Namespace::SearchPhrase,
        ]
    }
}

/// A cache key decomposed back into its namespace and parameters.
#[derive(Debug, Clone)]
pub enum ParsedKey {
    Scalar { namespace: Namespace, id: String },
    Structured { namespace: Namespace, cached: Value, limit: u64, skip: u64 },
}

/// Build a scalar key: `"{ns}:{id}"`.
pub fn scalar_key(namespace: Namespace, id: &str) -> String {
    debug_assert!(namespace.is_scalar());
    format!("{}:{id}", namespace.as_str())
}

/// Build a structured key: namespace, colon, canonical JSON of
/// `{ __cached, limit, skip }`.
pub fn structured_key(namespace: Namespace, payload: &Value, limit: u64, skip: u64) -> String {
    debug_assert!(!namespace.is_scalar());
    let wrapped = json!({ "__cached": payload, "limit": limit, "skip": skip });
    format!("{}:{}", namespace.as_str(), to_canonical_string(&wrapped))
}

/// Parse a wire-format key back into its namespace and parameters.
///
/// Returns `None` for malformed keys (unrecognized namespace, or a
/// structured key whose suffix is not valid JSON) rather than erroring
/// — callers treat an unparsable key conservatively.
pub fn parse_key(key: &str) -> Option<ParsedKey> {
    let (ns_str, rest) = key.split_once(':')?;
    let namespace = Namespace::parse(ns_str)?;
    if namespace.is_scalar() {
        Some(ParsedKey::Scalar { namespace, id: rest.to_string() })
    } else {
        let wrapped: Value = serde_json::from_str(rest).ok()?;
        let cached = wrapped.get("__cached")?.clone();
        let limit = wrapped.get("limit").and_then(Value::as_u64).unwrap_or(0);
        let skip = wrapped.get("skip").and_then(Value::as_u64).unwrap_or(0);
        Some(ParsedKey::Structured { namespace, cached, limit, skip })
    }
}
