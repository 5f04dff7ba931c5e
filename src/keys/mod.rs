//! Cache-key generation and the conservative predicate evaluator used by
//! the invalidation engine.
//!
//! Two key shapes exist: scalar keys for `id`/`history`/`since` routes,
//! and structured keys (canonical JSON) for `query`/`search`/
//! `searchPhrase`. Both are preserved bit-exact so invalidation can
//! pattern-match against the wire format directly.

mod canonical;
mod key;
mod predicate;

pub use canonical::{canonicalize, to_canonical_string};
pub use key::{scalar_key, structured_key, Namespace, ParsedKey};
pub use predicate::{evaluate, parse as parse_predicate, PredicateNode};
