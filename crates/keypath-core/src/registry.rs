//! # Registry
//!
//! The set of keys declared for one domain type.
//!
//! A `RegistryBuilder` hands out keys in declaration order, indices
//! `0, 1, 2, ...`, and is frozen by [`RegistryBuilder::lock`]. The locked
//! [`Registry`] is immutable and shared by `Arc` across every instance of the
//! domain type. There is no global state: the builder is an ordinary value,
//! typically consumed inside a `LazyLock` initializer.
//!
//! ## Inheritance
//!
//! `RegistryBuilder::extending` starts a child registry that already holds
//! the parent's keys, so the child's own keys continue the parent's index
//! sequence. Parent keys are rebound with [`RegistryBuilder::inherit`].

use crate::key::{Key, KeySpec};
use crate::list_key::ListKey;
use crate::primitives::MAX_KEY_NAME_LENGTH;
use crate::types::{KeyInfo, KeypathError, RegistryId, Value};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

// =============================================================================
// REGISTRY (locked)
// =============================================================================

/// Locked, immutable key set of domain type `D`.
#[derive(Debug)]
pub struct Registry<D> {
    id: RegistryId,
    domain: &'static str,
    keys: Vec<KeyInfo>,
    inherited: usize,
    _domain: PhantomData<fn() -> D>,
}

impl<D> Registry<D> {
    #[must_use]
    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// True when `info` was declared or inherited by this registry.
    #[must_use]
    pub fn owns(&self, info: &KeyInfo) -> bool {
        info.registry() == self.id
    }

    /// Name of the domain type.
    #[must_use]
    pub fn domain(&self) -> &'static str {
        self.domain
    }

    /// Number of keys, inherited ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of keys taken over from a parent registry.
    #[must_use]
    pub fn inherited(&self) -> usize {
        self.inherited
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&KeyInfo> {
        self.keys.get(index)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&KeyInfo> {
        self.keys.iter().find(|info| info.name() == name)
    }

    /// Keys in `(index, name)` order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyInfo> {
        self.keys.iter()
    }

    /// True when indices run `0..len` with no gap.
    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.keys
            .iter()
            .enumerate()
            .all(|(position, info)| info.index() == position)
    }
}

// =============================================================================
// REGISTRY BUILDER
// =============================================================================

/// Append-only key declaration for domain type `D`, until locked.
#[derive(Debug)]
pub struct RegistryBuilder<D> {
    id: RegistryId,
    domain: &'static str,
    keys: Vec<KeyInfo>,
    inherited: usize,
    locked: Option<Arc<Registry<D>>>,
}

impl<D: 'static> RegistryBuilder<D> {
    /// Empty registry for `domain`.
    #[must_use]
    pub fn new(domain: &'static str) -> Self {
        Self {
            id: RegistryId::next(),
            domain,
            keys: Vec::new(),
            inherited: 0,
            locked: None,
        }
    }

    /// Registry for a child type, starting with every key of `parent`.
    #[must_use]
    pub fn extending<P>(domain: &'static str, parent: &Registry<P>) -> Self {
        let id = RegistryId::next();
        let keys: Vec<KeyInfo> = parent.iter().map(|info| info.rebound(domain, id)).collect();
        Self {
            id,
            domain,
            inherited: keys.len(),
            keys,
            locked: None,
        }
    }

    /// Start declaring a key; finish it with [`KeySpec::build`].
    pub fn key<V: Value>(&mut self, name: impl Into<String>) -> KeySpec<'_, D, V> {
        KeySpec::new(self, name.into())
    }

    /// Declare a key with no default, validator or field agent.
    ///
    /// # Errors
    ///
    /// `IllegalState` once the registry is locked.
    pub fn new_key<V: Value>(&mut self, name: impl Into<String>) -> Result<Key<D, V>, KeypathError> {
        self.key(name).build()
    }

    /// Declare a list-valued key.
    ///
    /// # Errors
    ///
    /// `IllegalState` once the registry is locked.
    pub fn new_list_key<T: Value>(
        &mut self,
        name: impl Into<String>,
    ) -> Result<ListKey<D, T>, KeypathError> {
        self.new_key::<Vec<T>>(name).map(ListKey::new)
    }

    /// Rebind a parent key onto this child registry.
    ///
    /// The result keeps the parent's index, default and validator. Call once
    /// per parent key and keep the result: every call yields a distinct key.
    ///
    /// # Errors
    ///
    /// `IllegalState` if this builder was not created by `extending` the
    /// parent registry that owns `parent_key`.
    pub fn inherit<P: 'static, V: Value>(
        &self,
        parent_key: &Key<P, V>,
    ) -> Result<Key<D, V>, KeypathError> {
        let index = parent_key.index();
        let info = self
            .keys
            .get(index)
            .filter(|info| index < self.inherited && info.name() == parent_key.name())
            .ok_or_else(|| {
                KeypathError::IllegalState(format!(
                    "{} is not inherited by {}",
                    parent_key.full_name(),
                    self.domain
                ))
            })?;
        Ok(Key::from_parts(
            info.clone(),
            parent_key.default_value().cloned(),
            parent_key.validator().cloned(),
            None,
            parent_key.is_ascending(),
        ))
    }

    pub(crate) fn declare(
        &mut self,
        name: String,
        value_type: &'static str,
        field_backed: bool,
    ) -> Result<KeyInfo, KeypathError> {
        if self.locked.is_some() {
            return Err(KeypathError::IllegalState(format!(
                "registry of {} is locked; cannot declare {}",
                self.domain, name
            )));
        }
        if name.is_empty() || name.len() > MAX_KEY_NAME_LENGTH {
            return Err(KeypathError::IllegalState(format!(
                "key name of {} must be 1..={} bytes, got {}",
                self.domain,
                MAX_KEY_NAME_LENGTH,
                name.len()
            )));
        }
        let info = KeyInfo::new(
            self.keys.len(),
            name,
            self.domain,
            value_type,
            field_backed,
            self.id,
        );
        self.keys.push(info.clone());
        Ok(info)
    }

    /// Freeze the registry.
    ///
    /// Idempotent: later calls return the same `Arc`.
    ///
    /// # Errors
    ///
    /// `IllegalState` if two keys share a name.
    pub fn lock(&mut self) -> Result<Arc<Registry<D>>, KeypathError> {
        if let Some(registry) = &self.locked {
            return Ok(Arc::clone(registry));
        }

        let mut names = BTreeSet::new();
        for info in &self.keys {
            if !names.insert(info.name()) {
                return Err(KeypathError::IllegalState(format!(
                    "duplicate key name {} in {}",
                    info.name(),
                    self.domain
                )));
            }
        }

        let registry = Arc::new(Registry {
            id: self.id,
            domain: self.domain,
            keys: self.keys.clone(),
            inherited: self.inherited,
            _domain: PhantomData,
        });
        tracing::debug!(
            domain = self.domain,
            keys = registry.len(),
            inherited = self.inherited,
            "registry locked"
        );
        self.locked = Some(Arc::clone(&registry));
        Ok(registry)
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    /// Keys declared so far, inherited ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
