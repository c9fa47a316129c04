//! # Primitives
//!
//! Hardcoded runtime constants for keypath.
//!
//! These values are compiled into the binary. Anything a deployment may want to
//! tune goes through [`crate::config::ResolverConfig`] instead.

/// Default maximum number of identifiers in a single `IN (...)` lookup.
///
/// - The batch resolver never sends more than this many values in one query.
/// - A resolve over N distinct foreign keys issues `ceil(N / DEFAULT_MAX_IN_ITEMS)` queries.
pub const DEFAULT_MAX_IN_ITEMS: usize = 500;

/// Environment variable overriding the maximum `IN (...)` list size.
pub const ENV_MAX_IN_ITEMS: &str = "KEYPATH_MAX_IN_ITEMS";

/// Separator between segment names of a composite key (`order.customer.name`).
pub const PATH_SEPARATOR: char = '.';

/// Maximum length of a key name.
///
/// Names longer than this are rejected when the key is declared.
pub const MAX_KEY_NAME_LENGTH: usize = 128;
