//! # Change Notification
//!
//! Before/after mutation events, dispatched synchronously by `Key::set`.
//!
//! A `ChangeNotifier` is configured once with a [`ListenMode`]. Registering
//! or removing a listener for a direction the notifier was not built for
//! fails with `UnsupportedOperation`.
//!
//! ## Dispatch
//!
//! `fire` walks the listeners of exactly that key and that phase in
//! registration order. The first listener error stops the walk and is
//! returned as is. Nothing is retried or isolated.
//!
//! One table holds listeners of every value type. Each registration keeps
//! the typed closure behind an erased callback that downcasts the event
//! values back to `V`; the key identity filter guarantees the downcast
//! always matches.

use crate::key::{ErasedKey, Key, same_key};
use crate::types::{KeypathError, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// MODES, PHASES, EVENTS
// =============================================================================

/// Directions a notifier supports, or a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenMode {
    Before,
    After,
    Both,
}

impl ListenMode {
    fn includes(self, phase: ChangePhase) -> bool {
        matches!(
            (self, phase),
            (Self::Both, _) | (Self::Before, ChangePhase::Before) | (Self::After, ChangePhase::After)
        )
    }

    fn phases(self) -> &'static [ChangePhase] {
        match self {
            Self::Before => &[ChangePhase::Before],
            Self::After => &[ChangePhase::After],
            Self::Both => &[ChangePhase::Before, ChangePhase::After],
        }
    }
}

/// Which side of the write an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangePhase {
    Before,
    After,
}

/// One change, as seen by a listener.
#[derive(Debug)]
pub struct ChangeEvent<'a, D: 'static, V: Value> {
    /// The object being written.
    pub source: &'a D,
    pub key: &'a Key<D, V>,
    /// Value before the write (default included).
    pub old: Option<&'a V>,
    /// Proposed value on `Before`, stored value on `After`.
    pub new: Option<&'a V>,
    pub phase: ChangePhase,
}

impl<D: 'static, V: Value> ChangeEvent<'_, D, V> {
    #[must_use]
    pub fn is_before(&self) -> bool {
        self.phase == ChangePhase::Before
    }
}

/// Handle returned by `add_listener`, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

// =============================================================================
// TYPE ERASURE
// =============================================================================

struct RawChange<'a> {
    key: &'a dyn Any,
    old: Option<&'a dyn Any>,
    new: Option<&'a dyn Any>,
    phase: ChangePhase,
}

type Callback<D> = Box<dyn Fn(&D, &RawChange<'_>) -> Result<(), KeypathError> + Send + Sync>;

struct Registration<D> {
    id: ListenerId,
    key: ErasedKey,
    callback: Callback<D>,
}

fn downcast<'a, V: 'static>(
    value: Option<&'a dyn Any>,
    key: &str,
) -> Result<Option<&'a V>, KeypathError> {
    value
        .map(|v| {
            v.downcast_ref::<V>().ok_or_else(|| KeypathError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<V>(),
            })
        })
        .transpose()
}

// =============================================================================
// CHANGE NOTIFIER
// =============================================================================

/// Per-object listener registrar.
pub struct ChangeNotifier<D> {
    mode: ListenMode,
    next_id: u64,
    before: BTreeMap<usize, Vec<Registration<D>>>,
    after: BTreeMap<usize, Vec<Registration<D>>>,
}

impl<D: 'static> ChangeNotifier<D> {
    #[must_use]
    pub fn new(mode: ListenMode) -> Self {
        Self {
            mode,
            next_id: 0,
            before: BTreeMap::new(),
            after: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> ListenMode {
        self.mode
    }

    fn check(&self, direction: ListenMode) -> Result<(), KeypathError> {
        if self.mode == ListenMode::Both || self.mode == direction {
            return Ok(());
        }
        Err(KeypathError::UnsupportedOperation(format!(
            "notifier configured for {:?} cannot take {:?} listeners",
            self.mode, direction
        )))
    }

    fn table(&self, phase: ChangePhase) -> &BTreeMap<usize, Vec<Registration<D>>> {
        match phase {
            ChangePhase::Before => &self.before,
            ChangePhase::After => &self.after,
        }
    }

    fn table_mut(&mut self, phase: ChangePhase) -> &mut BTreeMap<usize, Vec<Registration<D>>> {
        match phase {
            ChangePhase::Before => &mut self.before,
            ChangePhase::After => &mut self.after,
        }
    }

    /// Register `listener` for `key` in `direction`.
    ///
    /// `ListenMode::Both` registers one listener for both phases under one id.
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` if `direction` is outside the notifier's mode.
    pub fn add_listener<V, F>(
        &mut self,
        key: &Key<D, V>,
        direction: ListenMode,
        listener: F,
    ) -> Result<ListenerId, KeypathError>
    where
        V: Value,
        F: Fn(&ChangeEvent<'_, D, V>) -> Result<(), KeypathError> + Send + Sync + 'static,
    {
        self.check(direction)?;
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        let listener = Arc::new(listener);
        for &phase in direction.phases() {
            let listener = Arc::clone(&listener);
            let callback: Callback<D> = Box::new(move |source: &D, raw: &RawChange<'_>| {
                let Some(key) = raw.key.downcast_ref::<Key<D, V>>() else {
                    return Err(KeypathError::TypeMismatch {
                        key: "<listener>".to_string(),
                        expected: std::any::type_name::<Key<D, V>>(),
                    });
                };
                let name = key.full_name();
                listener(&ChangeEvent {
                    source,
                    key,
                    old: downcast::<V>(raw.old, &name)?,
                    new: downcast::<V>(raw.new, &name)?,
                    phase: raw.phase,
                })
            });
            self.table_mut(phase)
                .entry(key.index())
                .or_default()
                .push(Registration {
                    id,
                    key: key.identity(),
                    callback,
                });
        }
        Ok(id)
    }

    /// Remove a listener.
    ///
    /// Returns whether it was found; for `Both` it must be found in both
    /// phases.
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` if `direction` is outside the notifier's mode.
    pub fn remove_listener<V: Value>(
        &mut self,
        key: &Key<D, V>,
        direction: ListenMode,
        id: ListenerId,
    ) -> Result<bool, KeypathError> {
        self.check(direction)?;
        let present = direction.phases().iter().all(|&phase| {
            self.table(phase)
                .get(&key.index())
                .is_some_and(|entries| entries.iter().any(|entry| entry.id == id))
        });
        if !present {
            return Ok(false);
        }
        for &phase in direction.phases() {
            if let Some(entries) = self.table_mut(phase).get_mut(&key.index()) {
                entries.retain(|entry| entry.id != id);
            }
        }
        Ok(true)
    }

    /// True when any listener, either phase, watches `key`.
    #[must_use]
    pub fn is_observed<V: Value>(&self, key: &Key<D, V>) -> bool {
        let identity = key.identity();
        [ChangePhase::Before, ChangePhase::After]
            .into_iter()
            .filter(|&phase| self.mode.includes(phase))
            .filter_map(|phase| self.table(phase).get(&key.index()))
            .flatten()
            .any(|entry| same_key(&entry.key, &identity))
    }

    /// Number of registrations across both phases.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.before.values().chain(self.after.values()).map(Vec::len).sum()
    }

    /// Invoke every listener of `key` for `phase`, in registration order.
    ///
    /// # Errors
    ///
    /// The first listener error, unchanged.
    pub fn fire<V: Value>(
        &self,
        source: &D,
        key: &Key<D, V>,
        old: Option<&V>,
        new: Option<&V>,
        phase: ChangePhase,
    ) -> Result<(), KeypathError> {
        let Some(entries) = self.table(phase).get(&key.index()) else {
            return Ok(());
        };
        let identity = key.identity();
        let raw = RawChange {
            key,
            old: old.map(|v| v as &dyn Any),
            new: new.map(|v| v as &dyn Any),
            phase,
        };
        for entry in entries.iter().filter(|entry| same_key(&entry.key, &identity)) {
            tracing::trace!(key = key.name(), ?phase, listener = entry.id.0, "change event");
            (entry.callback)(source, &raw)?;
        }
        Ok(())
    }
}

impl<D> fmt::Debug for ChangeNotifier<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("mode", &self.mode)
            .field("before", &self.before.values().map(Vec::len).sum::<usize>())
            .field("after", &self.after.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
