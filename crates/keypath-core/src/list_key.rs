//! # List Keys
//!
//! `ListKey<D, T>` wraps a `Key<D, Vec<T>>` with item-level operations.
//! Every mutation reads the whole list, changes a copy and writes it back
//! through [`Key::set`], so validators and change listeners see one list
//! value before and after, exactly as for a plain write.
//!
//! An unset list behaves as an empty one for reads. Adding to an unset list
//! creates it.

use crate::compare::DomainComparator;
use crate::key::Key;
use crate::storage::Domain;
use crate::types::{KeypathError, Value};
use std::cmp::Ordering;
use std::fmt;

/// Key holding a list of `T`.
pub struct ListKey<D: 'static, T: Value> {
    key: Key<D, Vec<T>>,
}

impl<D: 'static, T: Value> Clone for ListKey<D, T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
        }
    }
}

impl<D: 'static, T: Value> ListKey<D, T> {
    #[must_use]
    pub fn new(key: Key<D, Vec<T>>) -> Self {
        Self { key }
    }

    /// The underlying key, for paths, comparators and listeners.
    #[must_use]
    pub fn key(&self) -> &Key<D, Vec<T>> {
        &self.key
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.key.name()
    }
}

impl<D: Domain, T: Value> ListKey<D, T> {
    /// The list, or an empty one when unset.
    pub fn list(&self, domain: &D) -> Result<Vec<T>, KeypathError> {
        Ok(self.key.get(domain)?.unwrap_or_default())
    }

    /// Number of items; 0 when unset.
    pub fn item_count(&self, domain: &D) -> Result<usize, KeypathError> {
        Ok(self.key.get(domain)?.map_or(0, |items| items.len()))
    }

    /// Item at `index`, `None` past the end.
    pub fn item(&self, domain: &D, index: usize) -> Result<Option<T>, KeypathError> {
        Ok(self
            .key
            .get(domain)?
            .and_then(|mut items| (index < items.len()).then(|| items.swap_remove(index))))
    }

    /// Replace the item at `index` and return the previous one.
    ///
    /// # Errors
    ///
    /// `IllegalState` if `index` is past the end; `set` errors otherwise.
    pub fn set_item(&self, domain: &mut D, index: usize, value: T) -> Result<T, KeypathError> {
        let mut items = self.list(domain)?;
        let Some(slot) = items.get_mut(index) else {
            return Err(KeypathError::IllegalState(format!(
                "{} has {} items, no index {}",
                self.key.full_name(),
                items.len(),
                index
            )));
        };
        let previous = std::mem::replace(slot, value);
        self.key.set(domain, Some(items))?;
        Ok(previous)
    }

    /// Append `value`, creating the list when unset.
    pub fn add_item(&self, domain: &mut D, value: T) -> Result<(), KeypathError> {
        let mut items = self.list(domain)?;
        items.push(value);
        self.key.set(domain, Some(items))
    }

    /// Sort the stored list in place with `compare`. An unset list stays unset.
    pub fn sort_by(
        &self,
        domain: &mut D,
        compare: impl FnMut(&T, &T) -> Ordering,
    ) -> Result<(), KeypathError> {
        let Some(mut items) = self.key.get(domain)? else {
            return Ok(());
        };
        items.sort_by(compare);
        self.key.set(domain, Some(items))
    }

    /// Sort items that are domain objects (or point at them) by their keys.
    ///
    /// # Errors
    ///
    /// The first read error met by the comparator; the stored list is left
    /// unchanged in that case.
    pub fn sort<X: Domain>(
        &self,
        domain: &mut D,
        comparator: &DomainComparator<X>,
    ) -> Result<(), KeypathError>
    where
        T: AsRef<X>,
    {
        let Some(mut items) = self.key.get(domain)? else {
            return Ok(());
        };
        let mut failure = None;
        items.sort_by(|a, b| {
            comparator.compare(a.as_ref(), b.as_ref()).unwrap_or_else(|e| {
                failure.get_or_insert(e);
                Ordering::Equal
            })
        });
        if let Some(error) = failure {
            return Err(error);
        }
        self.key.set(domain, Some(items))
    }

    /// True when the list is unset or empty.
    pub fn is_default(&self, domain: &D) -> Result<bool, KeypathError> {
        Ok(self.item_count(domain)? == 0)
    }
}

impl<D: Domain, T: Value + PartialEq> ListKey<D, T> {
    /// Remove the first item equal to `value`; false when there is none.
    pub fn remove_item(&self, domain: &mut D, value: &T) -> Result<bool, KeypathError> {
        let Some(mut items) = self.key.get(domain)? else {
            return Ok(false);
        };
        let Some(position) = items.iter().position(|item| item == value) else {
            return Ok(false);
        };
        items.remove(position);
        self.key.set(domain, Some(items))?;
        Ok(true)
    }
}

impl<D: 'static, T: Value> fmt::Debug for ListKey<D, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListKey").field(&self.key).finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
