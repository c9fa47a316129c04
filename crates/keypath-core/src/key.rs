//! # Key Descriptors
//!
//! `Key<D, V>` is the typed accessor for one attribute of domain type `D`
//! holding values of type `V`. It is the only way application code reaches
//! the state of a domain object.
//!
//! ## Identity
//!
//! A key is an `Arc` around its descriptor. Clones share the descriptor and
//! compare equal; two separately declared keys never do, even with the same
//! name. The sort direction is carried next to the `Arc`, so
//! `key.descending() == key` holds.
//!
//! ## Write Path
//!
//! `set` is check-then-apply:
//! 1. Validator runs; a rejection returns before anything changes
//! 2. `Before` listeners see the current value and the proposed one
//! 3. The value is written through the container's storage strategy
//! 4. `After` listeners see the old value and the post-write state
//!
//! `load` skips steps 1, 2 and 4. It exists for code that materialises
//! persisted state, such as the batch resolver.

use crate::notify::ChangePhase;
use crate::registry::RegistryBuilder;
use crate::storage::{Domain, Slot, StorageKind};
use crate::types::{KeyInfo, KeypathError, ValidationError, Value};
use crate::validator::Validator;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// =============================================================================
// FIELD AGENT
// =============================================================================

type FieldRead<D, V> = Box<dyn Fn(&D) -> Option<V> + Send + Sync>;
type FieldWrite<D, V> = Box<dyn Fn(&mut D, Option<V>) + Send + Sync>;

/// Read/write closures bound to one struct field of the domain type.
///
/// Used by containers running on [`StorageKind::Field`].
pub struct FieldAgent<D, V> {
    read: FieldRead<D, V>,
    write: FieldWrite<D, V>,
}

impl<D, V> FieldAgent<D, V> {
    pub fn new(
        read: impl Fn(&D) -> Option<V> + Send + Sync + 'static,
        write: impl Fn(&mut D, Option<V>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            read: Box::new(read),
            write: Box::new(write),
        }
    }
}

// =============================================================================
// KEY IDENTITY
// =============================================================================

/// Type-erased view of a key descriptor, used where keys of different value
/// types sit side by side (composite segments, listener tables).
pub(crate) trait KeyIdentity: Send + Sync {
    fn info(&self) -> &KeyInfo;
}

pub(crate) type ErasedKey = Arc<dyn KeyIdentity>;

/// Same descriptor, regardless of value type.
pub(crate) fn same_key(a: &ErasedKey, b: &ErasedKey) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

struct KeyInner<D, V> {
    info: KeyInfo,
    default: Option<V>,
    validator: Option<Arc<dyn Validator<V>>>,
    agent: Option<FieldAgent<D, V>>,
}

impl<D: 'static, V: Value> KeyIdentity for KeyInner<D, V> {
    fn info(&self) -> &KeyInfo {
        &self.info
    }
}

// =============================================================================
// KEY
// =============================================================================

/// Typed accessor for one attribute of `D`.
pub struct Key<D: 'static, V: Value> {
    inner: Arc<KeyInner<D, V>>,
    ascending: bool,
}

impl<D: 'static, V: Value> Clone for Key<D, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            ascending: self.ascending,
        }
    }
}

impl<D: 'static, V: Value> Key<D, V> {
    pub(crate) fn from_parts(
        info: KeyInfo,
        default: Option<V>,
        validator: Option<Arc<dyn Validator<V>>>,
        agent: Option<FieldAgent<D, V>>,
        ascending: bool,
    ) -> Self {
        Self {
            inner: Arc::new(KeyInner {
                info,
                default,
                validator,
                agent,
            }),
            ascending,
        }
    }

    /// The type-erased descriptor.
    #[must_use]
    pub fn info(&self) -> &KeyInfo {
        &self.inner.info
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.info.name()
    }

    /// `Domain.name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.inner.info.full_name()
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.inner.info.index()
    }

    /// Value returned by `get` when nothing is stored.
    #[must_use]
    pub fn default_value(&self) -> Option<&V> {
        self.inner.default.as_ref()
    }

    pub(crate) fn validator(&self) -> Option<&Arc<dyn Validator<V>>> {
        self.inner.validator.as_ref()
    }

    pub(crate) fn identity(&self) -> ErasedKey {
        Arc::clone(&self.inner) as ErasedKey
    }

    #[must_use]
    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// The same key sorting in descending order.
    #[must_use]
    pub fn descending(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            ascending: false,
        }
    }

    /// The same key sorting in ascending order.
    #[must_use]
    pub fn ascending(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            ascending: true,
        }
    }

    /// Case-sensitive name match.
    #[must_use]
    pub fn equals_name(&self, name: &str) -> bool {
        self.name() == name
    }

    /// Orders by index, then name.
    #[must_use]
    pub fn compare_to<W: Value>(&self, other: &Key<D, W>) -> Ordering {
        self.index()
            .cmp(&other.index())
            .then_with(|| self.name().cmp(other.name()))
    }

    fn mismatch(&self) -> KeypathError {
        KeypathError::TypeMismatch {
            key: self.full_name(),
            expected: std::any::type_name::<V>(),
        }
    }

    fn foreign(&self, registry: &crate::Registry<D>) -> KeypathError {
        KeypathError::IllegalState(format!(
            "{} was not declared by the {} registry of this container",
            self.full_name(),
            registry.domain()
        ))
    }

    fn missing_agent(&self) -> KeypathError {
        KeypathError::IllegalState(format!(
            "{} has no field agent but the container uses field storage",
            self.full_name()
        ))
    }
}

impl<D: Domain, V: Value> Key<D, V> {
    /// The stored value, without falling back to the default.
    ///
    /// A key from another registry reads as unset on map storage and is an
    /// `IllegalState` on array and field storage.
    pub fn get_raw(&self, domain: &D) -> Result<Option<V>, KeypathError> {
        let container = domain.container();
        if !container.registry().owns(self.info()) {
            return match container.kind() {
                StorageKind::Map => Ok(None),
                StorageKind::Array | StorageKind::Field => Err(self.foreign(container.registry())),
            };
        }
        let storage = container.storage();
        let Some(slots) = storage.slots() else {
            let agent = self.inner.agent.as_ref().ok_or_else(|| self.missing_agent())?;
            return Ok((agent.read)(domain));
        };
        match slots.read(self.index())? {
            None => Ok(None),
            Some(slot) => slot
                .downcast_ref::<V>()
                .cloned()
                .map(Some)
                .ok_or_else(|| self.mismatch()),
        }
    }

    /// The stored value, or the key's default when nothing is stored.
    ///
    /// Map storage answers a key it has never seen with the default as well;
    /// that is the one read that never fails for an unknown key.
    pub fn get(&self, domain: &D) -> Result<Option<V>, KeypathError> {
        match self.get_raw(domain)? {
            Some(value) => Ok(Some(value)),
            None => Ok(self.inner.default.clone()),
        }
    }

    /// Validate, notify, write, notify.
    ///
    /// # Errors
    ///
    /// `Validation` if the validator rejects `value`; nothing is written and
    /// no listener runs. A listener error aborts the call at that point.
    /// `IllegalState` if the key belongs to another registry.
    pub fn set(&self, domain: &mut D, value: Option<V>) -> Result<(), KeypathError> {
        self.check_owner(domain)?;
        if let Some(validator) = &self.inner.validator {
            validator
                .validate(value.as_ref())
                .map_err(|message| ValidationError::new(self.full_name(), message))?;
        }

        let observed = domain
            .container()
            .notifier()
            .is_some_and(|notifier| notifier.is_observed(self));
        if !observed {
            return self.write(domain, value);
        }

        let old = self.get(domain)?;
        self.notify(domain, old.as_ref(), value.as_ref(), ChangePhase::Before)?;
        self.write(domain, value)?;
        let current = self.get(domain)?;
        self.notify(domain, old.as_ref(), current.as_ref(), ChangePhase::After)
    }

    /// `set(domain, Some(value))`.
    pub fn put(&self, domain: &mut D, value: V) -> Result<(), KeypathError> {
        self.set(domain, Some(value))
    }

    /// Raw write: no validation, no change events.
    pub fn load(&self, domain: &mut D, value: Option<V>) -> Result<(), KeypathError> {
        self.write(domain, value)
    }

    /// Copy the stored value from one object to another through `set`.
    ///
    /// An unset source clears the target; the default is not copied in.
    pub fn copy(&self, from: &D, to: &mut D) -> Result<(), KeypathError> {
        let value = self.get_raw(from)?;
        self.set(to, value)
    }

    fn check_owner(&self, domain: &D) -> Result<(), KeypathError> {
        let registry = domain.container().registry();
        if registry.owns(self.info()) {
            Ok(())
        } else {
            Err(self.foreign(registry))
        }
    }

    fn write(&self, domain: &mut D, value: Option<V>) -> Result<(), KeypathError> {
        self.check_owner(domain)?;
        if domain.container().kind() == StorageKind::Field {
            let agent = self.inner.agent.as_ref().ok_or_else(|| self.missing_agent())?;
            (agent.write)(domain, value);
            return Ok(());
        }
        let index = self.index();
        match domain.container_mut().storage_mut().slots_mut() {
            Some(slots) => slots.write(index, value.map(|v| Box::new(v) as Slot)),
            None => Err(self.missing_agent()),
        }
    }

    fn notify(
        &self,
        domain: &D,
        old: Option<&V>,
        new: Option<&V>,
        phase: ChangePhase,
    ) -> Result<(), KeypathError> {
        match domain.container().notifier() {
            Some(notifier) => notifier.fire(domain, self, old, new, phase),
            None => Ok(()),
        }
    }
}

impl<D: Domain, V: Value + PartialEq> Key<D, V> {
    /// True when the current value equals the default.
    pub fn is_default(&self, domain: &D) -> Result<bool, KeypathError> {
        Ok(self.get(domain)? == self.inner.default)
    }

    /// True when the current value equals `value`.
    pub fn equals_value(&self, domain: &D, value: Option<&V>) -> Result<bool, KeypathError> {
        Ok(self.get(domain)?.as_ref() == value)
    }
}

impl<D: 'static, V: Value> PartialEq for Key<D, V> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<D: 'static, V: Value> Eq for Key<D, V> {}

impl<D: 'static, V: Value> Hash for Key<D, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.inner), state);
    }
}

impl<D: 'static, V: Value> fmt::Debug for Key<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.full_name())
            .field("index", &self.index())
            .field("ascending", &self.ascending)
            .finish()
    }
}

impl<D: 'static, V: Value> fmt::Display for Key<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-erased key handle, for code that only needs the `Key<D, V>` back
/// after a downcast.
pub(crate) fn erase<D: 'static, V: Value>(key: &Key<D, V>) -> Arc<dyn Any + Send + Sync> {
    Arc::new(key.clone())
}

// =============================================================================
// KEY SPEC (builder)
// =============================================================================

/// Declaration of one key, finished with [`KeySpec::build`].
///
/// ```
/// # use keypath_core::{Container, Domain, RegistryBuilder, validator};
/// # struct Order { attrs: Container<Order> }
/// # impl Domain for Order {
/// #     fn container(&self) -> &Container<Self> { &self.attrs }
/// #     fn container_mut(&mut self) -> &mut Container<Self> { &mut self.attrs }
/// # }
/// let mut builder = RegistryBuilder::<Order>::new("Order");
/// let quantity = builder
///     .key::<i32>("quantity")
///     .default_value(1)
///     .validator(validator::between(1, 99))
///     .build()
///     .expect("declare");
/// assert_eq!(quantity.index(), 0);
/// ```
#[must_use = "a key spec does nothing until build() is called"]
pub struct KeySpec<'a, D: 'static, V: Value> {
    builder: &'a mut RegistryBuilder<D>,
    name: String,
    default: Option<V>,
    validator: Option<Arc<dyn Validator<V>>>,
    agent: Option<FieldAgent<D, V>>,
    ascending: bool,
}

impl<'a, D: 'static, V: Value> KeySpec<'a, D, V> {
    pub(crate) fn new(builder: &'a mut RegistryBuilder<D>, name: String) -> Self {
        Self {
            builder,
            name,
            default: None,
            validator: None,
            agent: None,
            ascending: true,
        }
    }

    pub fn default_value(mut self, value: V) -> Self {
        self.default = Some(value);
        self
    }

    pub fn validator(mut self, validator: impl Validator<V> + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Bind the key to a struct field for field storage.
    pub fn field(
        mut self,
        read: impl Fn(&D) -> Option<V> + Send + Sync + 'static,
        write: impl Fn(&mut D, Option<V>) + Send + Sync + 'static,
    ) -> Self {
        self.agent = Some(FieldAgent::new(read, write));
        self
    }

    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    /// Allocate the next index and produce the key.
    ///
    /// # Errors
    ///
    /// `IllegalState` if the registry is locked or the name is unusable.
    pub fn build(self) -> Result<Key<D, V>, KeypathError> {
        let info = self.builder.declare(
            self.name,
            std::any::type_name::<V>(),
            self.agent.is_some(),
        )?;
        Ok(Key::from_parts(
            info,
            self.default,
            self.validator,
            self.agent,
            self.ascending,
        ))
    }
}

// =============================================================================
// TESTS
// =============================================================================
