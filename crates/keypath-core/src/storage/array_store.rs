//! # Array-backed Storage
//!
//! Dense storage: one slot per key of the registry, addressed directly by the
//! key's index. Smallest footprint and fastest access, at the price of
//! needing a locked registry whose indices run `0..len` without gaps.

use super::{Slot, SlotStore};
use crate::KeypathError;
use std::any::Any;

/// Fixed-size slot store.
#[derive(Debug)]
pub struct ArrayStore {
    slots: Vec<Option<Slot>>,
}

impl ArrayStore {
    /// Create a store with `len` empty slots.
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        Self { slots }
    }

    /// Number of slots (equals the registry size).
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the registry had no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn out_of_range(index: usize, len: usize) -> KeypathError {
    KeypathError::IllegalState(format!(
        "key index {} is outside the array of {} slots",
        index, len
    ))
}

impl SlotStore for ArrayStore {
    fn read(&self, index: usize) -> Result<Option<&(dyn Any + Send + Sync)>, KeypathError> {
        let slot = self
            .slots
            .get(index)
            .ok_or_else(|| out_of_range(index, self.slots.len()))?;
        Ok(slot.as_ref().map(|value| &**value))
    }

    fn write(&mut self, index: usize, value: Option<Slot>) -> Result<(), KeypathError> {
        let len = self.slots.len();
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(out_of_range(index, len)),
        }
    }

    fn written(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
