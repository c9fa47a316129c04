//! # Storage
//!
//! The attribute container every domain object embeds, and the storage
//! strategies it can run on.
//!
//! ## Storage Strategies
//!
//! A `Container` owns exactly one strategy, chosen at construction:
//! - `Map`: sparse `MapStore`; a key of another registry reads as unset
//! - `Array`: dense `ArrayStore`, one slot per registry key
//! - `Field`: no slots at all; every key carries a field agent that reads and
//!   writes a real struct field of the domain object
//!
//! All three answer the same contract through the key: `read(key)` yields
//! the stored value or the key's default, `write(key, value)` stores it.
//! Stores are passive; change events are raised by the key, not the store.
//!
//! ## Type Erasure
//!
//! Slots are `Box<dyn Any>`: one store holds values of every key's type,
//! and the typed `Key<D, V>` downcasts on read. The public surface stays
//! generic over `D` and `V`; only the store is erased. A key is checked
//! against the container's registry before any slot is touched, so a
//! downcast only sees values written through that same key and
//! `KeypathError::TypeMismatch` marks a broken store, not a caller error.

mod array_store;
mod map_store;

pub use array_store::ArrayStore;
pub use map_store::MapStore;

use crate::notify::{ChangeNotifier, ListenMode};
use crate::registry::Registry;
use crate::KeypathError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A type-erased stored value.
pub type Slot = Box<dyn Any + Send + Sync>;

// =============================================================================
// SLOTSTORE TRAIT
// =============================================================================

/// Index-addressed value storage shared by the map and array strategies.
pub trait SlotStore: fmt::Debug + Send + Sync {
    /// Read the slot at `index`. `Ok(None)` means nothing is stored there.
    fn read(&self, index: usize) -> Result<Option<&(dyn Any + Send + Sync)>, KeypathError>;

    /// Store `value` at `index`; `None` clears the slot.
    fn write(&mut self, index: usize, value: Option<Slot>) -> Result<(), KeypathError>;

    /// Number of slots currently holding a value.
    fn written(&self) -> usize;
}

// =============================================================================
// STORAGE STRATEGY
// =============================================================================

/// Which strategy a container runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Map,
    Array,
    Field,
}

/// The storage strategy held by a container.
#[derive(Debug)]
pub enum Storage {
    /// Sparse, keyed by index.
    Map(MapStore),
    /// Dense, one slot per key.
    Array(ArrayStore),
    /// Values live in the domain struct; keys hold the accessors.
    Field,
}

impl Storage {
    /// The strategy tag.
    #[must_use]
    pub fn kind(&self) -> StorageKind {
        match self {
            Self::Map(_) => StorageKind::Map,
            Self::Array(_) => StorageKind::Array,
            Self::Field => StorageKind::Field,
        }
    }

    /// The slot store, or `None` for field-agent storage.
    #[must_use]
    pub fn slots(&self) -> Option<&dyn SlotStore> {
        match self {
            Self::Map(store) => Some(store),
            Self::Array(store) => Some(store),
            Self::Field => None,
        }
    }

    /// Mutable slot store, or `None` for field-agent storage.
    pub fn slots_mut(&mut self) -> Option<&mut dyn SlotStore> {
        match self {
            Self::Map(store) => Some(store),
            Self::Array(store) => Some(store),
            Self::Field => None,
        }
    }
}

// =============================================================================
// DOMAIN TRAIT
// =============================================================================

/// A domain object: a type whose state is reached only through keys.
///
/// Implementors embed one [`Container`] and hand it out. Identity is
/// reference identity; containers are deliberately not comparable.
///
/// ```
/// use keypath_core::{Container, Domain, RegistryBuilder};
///
/// struct Tag {
///     attrs: Container<Tag>,
/// }
///
/// impl Domain for Tag {
///     fn container(&self) -> &Container<Self> {
///         &self.attrs
///     }
///     fn container_mut(&mut self) -> &mut Container<Self> {
///         &mut self.attrs
///     }
/// }
///
/// let mut builder = RegistryBuilder::<Tag>::new("Tag");
/// let label = builder.new_key::<String>("label").expect("key");
/// let registry = builder.lock().expect("lock");
///
/// let mut tag = Tag { attrs: Container::map(&registry) };
/// label.put(&mut tag, "urgent".to_string()).expect("write");
/// assert_eq!(label.get(&tag).expect("read"), Some("urgent".to_string()));
/// ```
pub trait Domain: Sized + 'static {
    fn container(&self) -> &Container<Self>;
    fn container_mut(&mut self) -> &mut Container<Self>;
}

// =============================================================================
// CONTAINER
// =============================================================================

/// Attribute container: the locked registry of the domain, one storage
/// strategy, and an optional change notifier.
pub struct Container<D: 'static> {
    registry: Arc<Registry<D>>,
    storage: Storage,
    notifier: Option<ChangeNotifier<D>>,
}

impl<D: 'static> Container<D> {
    /// Sparse container. Accepts any registry.
    #[must_use]
    pub fn map(registry: &Arc<Registry<D>>) -> Self {
        Self {
            registry: Arc::clone(registry),
            storage: Storage::Map(MapStore::new()),
            notifier: None,
        }
    }

    /// Dense container.
    ///
    /// Returns `IllegalState` unless the registry indices run `0..len`
    /// without gaps.
    pub fn array(registry: &Arc<Registry<D>>) -> Result<Self, KeypathError> {
        if !registry.is_dense() {
            return Err(KeypathError::IllegalState(format!(
                "registry of {} is not densely indexed; array storage needs indices 0..{}",
                registry.domain(),
                registry.len()
            )));
        }
        Ok(Self {
            registry: Arc::clone(registry),
            storage: Storage::Array(ArrayStore::with_len(registry.len())),
            notifier: None,
        })
    }

    /// Field-agent container.
    ///
    /// Returns `IllegalState` if any registry key lacks a field agent.
    pub fn fields(registry: &Arc<Registry<D>>) -> Result<Self, KeypathError> {
        let missing: Vec<&str> = registry
            .iter()
            .filter(|info| !info.is_field_backed())
            .map(|info| info.name())
            .collect();
        if !missing.is_empty() {
            return Err(KeypathError::IllegalState(format!(
                "keys of {} without a field agent: {}",
                registry.domain(),
                missing.join(", ")
            )));
        }
        Ok(Self {
            registry: Arc::clone(registry),
            storage: Storage::Field,
            notifier: None,
        })
    }

    /// Container on the given strategy.
    pub fn with_kind(registry: &Arc<Registry<D>>, kind: StorageKind) -> Result<Self, KeypathError> {
        match kind {
            StorageKind::Map => Ok(Self::map(registry)),
            StorageKind::Array => Self::array(registry),
            StorageKind::Field => Self::fields(registry),
        }
    }

    /// Wire a change notifier into this container.
    #[must_use]
    pub fn with_notifier(mut self, mode: ListenMode) -> Self {
        self.notifier = Some(ChangeNotifier::new(mode));
        self
    }

    /// The domain's registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry<D>> {
        &self.registry
    }

    /// The storage strategy.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub(crate) fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    /// Strategy tag of this container.
    #[must_use]
    pub fn kind(&self) -> StorageKind {
        self.storage.kind()
    }

    /// The change notifier, if one is wired in.
    #[must_use]
    pub fn notifier(&self) -> Option<&ChangeNotifier<D>> {
        self.notifier.as_ref()
    }

    /// Mutable change notifier, for registering listeners.
    pub fn notifier_mut(&mut self) -> Option<&mut ChangeNotifier<D>> {
        self.notifier.as_mut()
    }
}

impl<D: 'static> fmt::Debug for Container<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("domain", &self.registry.domain())
            .field("storage", &self.storage)
            .field("notifier", &self.notifier.as_ref().map(ChangeNotifier::mode))
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
