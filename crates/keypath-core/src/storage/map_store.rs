//! # Map-backed Storage
//!
//! Sparse storage keyed by key index. Only written slots take memory, so this
//! strategy suits wide domain types where most attributes stay unset.
//!
//! Reading a slot that was never written is not an error: the store reports
//! "nothing stored" and the key substitutes its default value.

use super::{Slot, SlotStore};
use crate::KeypathError;
use std::any::Any;
use std::collections::BTreeMap;

/// Sparse slot store.
#[derive(Debug, Default)]
pub struct MapStore {
    /// Key index -> stored value. BTreeMap for deterministic iteration.
    slots: BTreeMap<usize, Slot>,
}

impl MapStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indices that currently hold a value, ascending.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.keys().copied()
    }
}

impl SlotStore for MapStore {
    fn read(&self, index: usize) -> Result<Option<&(dyn Any + Send + Sync)>, KeypathError> {
        Ok(self.slots.get(&index).map(|slot| &**slot))
    }

    fn write(&mut self, index: usize, value: Option<Slot>) -> Result<(), KeypathError> {
        match value {
            Some(slot) => {
                self.slots.insert(index, slot);
            }
            None => {
                self.slots.remove(&index);
            }
        }
        Ok(())
    }

    fn written(&self) -> usize {
        self.slots.len()
    }
}
