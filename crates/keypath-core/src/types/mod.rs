//! # Core Type Definitions
//!
//! Types shared by every other module:
//! - The `Value` bound for anything stored under a key
//! - Type-erased key descriptors (`KeyInfo`)
//! - Error types (`KeypathError`, `ValidationError`, `QueryError`)
//!
//! ## Ordering Guarantees
//!
//! `KeyInfo` orders by index first and name second, so iterating a registry or
//! a `BTreeSet<KeyInfo>` always yields attributes in declaration order.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

// =============================================================================
// VALUE BOUND
// =============================================================================

/// Anything that can be stored under a key.
///
/// Values are cloned out of storage on read, and containers may be shared
/// across threads once built, so the bound is `Clone + Send + Sync + 'static`.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Value for T {}

// =============================================================================
// REGISTRY IDENTITY
// =============================================================================

/// Identity of one registry, stamped into every key it declares.
///
/// Two registries for the same domain type never share an id, so a
/// container can tell its own keys from look-alikes with the same index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistryId(u64);

impl RegistryId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registry#{}", self.0)
    }
}

// =============================================================================
// KEY INFO
// =============================================================================

/// Type-erased description of one declared key.
///
/// A `KeyInfo` is what a registry stores and what column metadata reports.
/// It carries no value type parameter, so keys of different value types can
/// live in one collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyInfo {
    index: usize,
    name: String,
    domain: &'static str,
    value_type: &'static str,
    field_backed: bool,
    registry: RegistryId,
}

impl KeyInfo {
    pub(crate) fn new(
        index: usize,
        name: String,
        domain: &'static str,
        value_type: &'static str,
        field_backed: bool,
        registry: RegistryId,
    ) -> Self {
        Self {
            index,
            name,
            domain,
            value_type,
            field_backed,
            registry,
        }
    }

    /// Position of the key inside its domain's registry.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Name of the key, unique within its domain.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning domain type.
    #[must_use]
    pub fn domain(&self) -> &'static str {
        self.domain
    }

    /// Rust type name of the stored value.
    #[must_use]
    pub fn value_type(&self) -> &'static str {
        self.value_type
    }

    /// True when the key owns a field agent (read/write closures).
    #[must_use]
    pub fn is_field_backed(&self) -> bool {
        self.field_backed
    }

    /// The registry that declared (or inherited) the key.
    #[must_use]
    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    /// `Domain.name`, e.g. `Order.created`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.domain, self.name)
    }

    /// The same descriptor relabelled for another domain (attribute inheritance).
    pub(crate) fn rebound(&self, domain: &'static str, registry: RegistryId) -> Self {
        Self {
            domain,
            field_backed: false,
            registry,
            ..self.clone()
        }
    }
}

impl fmt::Display for KeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// A validator rejected a value; the mutation did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed for {key}: {message}")]
pub struct ValidationError {
    /// Full name of the key being written.
    pub key: String,
    /// Reason reported by the validator.
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error.
    #[must_use]
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Failure reported by an external query collaborator.
///
/// The resolver never builds these itself; it forwards whatever the
/// collaborator returned.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct QueryError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl QueryError {
    /// Create a query error with a message only.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a query error wrapping the collaborator's own error.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The message given by the collaborator.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that can occur in keypath.
///
/// - No silent failures: the single permissive case is reading a key a
///   map-backed container has never seen, which yields the key's default
/// - Use `Result<T, KeypathError>` for fallible operations
/// - Library code never panics
#[derive(Debug, Error)]
pub enum KeypathError {
    /// A validator rejected the new value.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A listener direction the change notifier was not configured for.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Registry, container or key used out of its lifecycle.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A bulk query failed; surfaced unchanged from the collaborator.
    #[error("Query failed: {0}")]
    Query(#[from] QueryError),

    /// Configuration rejected at setup time.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A stored slot did not hold the key's value type.
    #[error("Type mismatch for key {key}: expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
    },
}

// =============================================================================
// TESTS
// =============================================================================
