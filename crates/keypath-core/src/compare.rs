//! # Comparator
//!
//! Sorting domain objects by one or more keys. Each key brings its own
//! direction (`key.descending()`); absent values sort last in either
//! direction.

use crate::composite::CompositeKey;
use crate::key::Key;
use crate::storage::Domain;
use crate::types::{KeypathError, Value};
use std::cmp::Ordering;
use std::fmt;

/// A key that can order domain objects.
pub trait SortKey<D>: Send + Sync {
    /// Name shown by the comparator's `Display`.
    fn sort_name(&self) -> String;

    fn is_ascending(&self) -> bool;

    /// Compare the values `a` and `b` hold under this key.
    fn compare_values(&self, a: &D, b: &D) -> Result<Ordering, KeypathError>;
}

fn order<V: Ord>(a: Option<V>, b: Option<V>, ascending: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) if ascending => a.cmp(&b),
        (Some(a), Some(b)) => b.cmp(&a),
    }
}

impl<D: Domain, V: Value + Ord> SortKey<D> for Key<D, V> {
    fn sort_name(&self) -> String {
        self.name().to_string()
    }

    fn is_ascending(&self) -> bool {
        Key::is_ascending(self)
    }

    fn compare_values(&self, a: &D, b: &D) -> Result<Ordering, KeypathError> {
        Ok(order(self.get(a)?, self.get(b)?, Key::is_ascending(self)))
    }
}

impl<D: Domain, V: Value + Ord> SortKey<D> for CompositeKey<D, V> {
    fn sort_name(&self) -> String {
        self.name()
    }

    fn is_ascending(&self) -> bool {
        CompositeKey::is_ascending(self)
    }

    fn compare_values(&self, a: &D, b: &D) -> Result<Ordering, KeypathError> {
        Ok(order(self.get(a)?, self.get(b)?, CompositeKey::is_ascending(self)))
    }
}

/// Lexicographic comparator over a list of keys.
pub struct DomainComparator<D> {
    keys: Vec<Box<dyn SortKey<D>>>,
}

impl<D: Domain> DomainComparator<D> {
    /// Comparator on a single key.
    #[must_use]
    pub fn by(key: impl SortKey<D> + 'static) -> Self {
        Self {
            keys: vec![Box::new(key)],
        }
    }

    /// Break ties with `key`.
    #[must_use]
    pub fn then(mut self, key: impl SortKey<D> + 'static) -> Self {
        self.keys.push(Box::new(key));
        self
    }

    /// # Errors
    ///
    /// Any read error from one of the keys.
    pub fn compare(&self, a: &D, b: &D) -> Result<Ordering, KeypathError> {
        for key in &self.keys {
            let ordering = key.compare_values(a, b)?;
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(Ordering::Equal)
    }

    /// Stable sort of `items`.
    ///
    /// # Errors
    ///
    /// The first read error met while sorting. The slice is then in an
    /// unspecified order.
    pub fn sort(&self, items: &mut [D]) -> Result<(), KeypathError> {
        let mut failure = None;
        items.sort_by(|a, b| {
            self.compare(a, b).unwrap_or_else(|e| {
                failure.get_or_insert(e);
                Ordering::Equal
            })
        });
        failure.map_or(Ok(()), Err)
    }
}

impl<D> fmt::Display for DomainComparator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, key) in self.keys.iter().enumerate() {
            if position > 0 {
                f.write_str(", ")?;
            }
            let direction = if key.is_ascending() { "ASC" } else { "DESC" };
            write!(f, "{}[{}]", key.sort_name(), direction)?;
        }
        Ok(())
    }
}

impl<D> fmt::Debug for DomainComparator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainComparator({self})")
    }
}
