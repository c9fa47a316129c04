//! # keypath-core
//!
//! Typed attribute keys for domain objects, and a batch resolver that loads
//! foreign-key references with a bounded number of bulk queries.
//!
//! ## Object Model
//!
//! A domain type declares its attributes as [`Key`]s on a [`RegistryBuilder`]
//! and locks it. Every instance embeds a [`Container`] holding the locked
//! [`Registry`] and one storage strategy (map, array or field agents). State is
//! read and written only through keys; keys chain into [`CompositeKey`] paths
//! that stop quietly at the first missing hop. List-valued attributes get
//! item-level access through [`ListKey`].
//!
//! ## Batch Resolution
//!
//! [`BatchResolver`] takes a list of owning entities, collects their raw
//! foreign keys, and resolves them with `ceil(N / max_in_items)` calls on a
//! [`QuerySource`].
//!
//! ## Architectural Constraints
//!
//! - Synchronous: no async, no internal threads, no network dependencies
//! - No global state: registries are values shared by `Arc`
//! - Deterministic: `BTreeMap` for every keyed collection
//! - Closed: SQL rendering, transactions and transports belong to the caller

// =============================================================================
// MODULES
// =============================================================================

pub mod compare;
pub mod composite;
pub mod config;
pub mod key;
pub mod list_key;
pub mod notify;
pub mod primitives;
pub mod query;
pub mod reference;
pub mod registry;
pub mod resolver;
pub mod storage;
pub mod types;
pub mod validator;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{KeyInfo, KeypathError, QueryError, RegistryId, ValidationError, Value};

// =============================================================================
// RE-EXPORTS: Object Model
// =============================================================================

pub use composite::{CompositeKey, Link};
pub use key::{FieldAgent, Key, KeySpec};
pub use list_key::ListKey;
pub use notify::{ChangeEvent, ChangeNotifier, ChangePhase, ListenMode, ListenerId};
pub use registry::{Registry, RegistryBuilder};
pub use storage::{ArrayStore, Container, Domain, MapStore, Slot, SlotStore, Storage, StorageKind};
pub use validator::Validator;

// =============================================================================
// RE-EXPORTS: Ordering
// =============================================================================

pub use compare::{DomainComparator, SortKey};

// =============================================================================
// RE-EXPORTS: Batch Resolution
// =============================================================================

pub use config::ResolverConfig;
pub use query::{ColumnMeta, ForeignKeyColumn, QuerySource, TableModel, ValueColumn};
pub use reference::{Entity, Reference};
pub use resolver::{BatchResolver, ReferencePath, ResolveReport};
