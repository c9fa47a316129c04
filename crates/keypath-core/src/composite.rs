//! # Composite Keys
//!
//! A `CompositeKey<D, V>` is a relationship path `k1.k2...kn` starting at
//! domain type `D` and ending in a value of type `V`. Each hop goes through a
//! [`Link`]: a value that may point at another domain object.
//!
//! Reading a path never fails for a missing hop. An absent link, or a link
//! that points nowhere (an unresolved reference), ends the walk with `None`.
//! Paths hold no owning pointers back into the object graph, so a
//! self-referencing type (an order pointing at a parent order) needs no
//! cycle detection.
//!
//! The first segment is kept as `Arc<dyn Any>` so that [`CompositeKey::root`]
//! can hand it back typed; the batch resolver uses it to find the reference
//! key a path starts with. Every other hop is a typed closure.

use crate::key::{ErasedKey, Key, erase, same_key};
use crate::primitives::PATH_SEPARATOR;
use crate::storage::Domain;
use crate::types::{KeyInfo, KeypathError, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// LINK
// =============================================================================

/// A value that can lead to another domain object.
pub trait Link: Value {
    type Target: Domain;

    /// The object this value points at, if it is reachable right now.
    fn target(&self) -> Option<&Self::Target>;
}

impl<T: Domain + Send + Sync> Link for Arc<T> {
    type Target = T;

    fn target(&self) -> Option<&T> {
        Some(self)
    }
}

// =============================================================================
// SEGMENTS
// =============================================================================

#[derive(Clone)]
struct Segment {
    key: ErasedKey,
    alias: Option<String>,
}

impl Segment {
    fn of<D: 'static, V: Value>(key: &Key<D, V>, alias: Option<String>) -> Self {
        Self {
            key: key.identity(),
            alias,
        }
    }

    fn info(&self) -> &KeyInfo {
        self.key.info()
    }
}

type Reader<D, V> = Arc<dyn Fn(&D) -> Result<Option<V>, KeypathError> + Send + Sync>;

// =============================================================================
// COMPOSITE KEY
// =============================================================================

/// Chain of keys read as one attribute of `D`.
pub struct CompositeKey<D: 'static, V: Value> {
    segments: Arc<[Segment]>,
    root: Arc<dyn Any + Send + Sync>,
    reader: Reader<D, V>,
    default: Option<V>,
    ascending: bool,
}

impl<D: 'static, V: Value> Clone for CompositeKey<D, V> {
    fn clone(&self) -> Self {
        Self {
            segments: Arc::clone(&self.segments),
            root: Arc::clone(&self.root),
            reader: Arc::clone(&self.reader),
            default: self.default.clone(),
            ascending: self.ascending,
        }
    }
}

impl<D: Domain, M: Link> Key<D, M> {
    /// The path `self.next`.
    #[must_use]
    pub fn join<V: Value>(&self, next: &Key<M::Target, V>) -> CompositeKey<D, V> {
        self.join_segment(next, None)
    }

    /// The path `self.next`, with `alias` attached to the `next` segment.
    #[must_use]
    pub fn join_as<V: Value>(
        &self,
        next: &Key<M::Target, V>,
        alias: impl Into<String>,
    ) -> CompositeKey<D, V> {
        self.join_segment(next, Some(alias.into()))
    }

    fn join_segment<V: Value>(
        &self,
        next: &Key<M::Target, V>,
        alias: Option<String>,
    ) -> CompositeKey<D, V> {
        let first = self.clone();
        let second = next.clone();
        let reader: Reader<D, V> = Arc::new(move |domain: &D| {
            let Some(link) = first.get(domain)? else {
                return Ok(None);
            };
            match link.target() {
                Some(target) => second.get(target),
                None => Ok(None),
            }
        });
        CompositeKey {
            segments: vec![Segment::of(self, None), Segment::of(next, alias)].into(),
            root: erase(self),
            reader,
            default: next.default_value().cloned(),
            ascending: true,
        }
    }
}

impl<D: Domain, M: Link> CompositeKey<D, M> {
    /// Extend the path by one more hop.
    #[must_use]
    pub fn join<V: Value>(&self, next: &Key<M::Target, V>) -> CompositeKey<D, V> {
        self.join_segment(next, None)
    }

    /// Extend the path by one aliased hop.
    #[must_use]
    pub fn join_as<V: Value>(
        &self,
        next: &Key<M::Target, V>,
        alias: impl Into<String>,
    ) -> CompositeKey<D, V> {
        self.join_segment(next, Some(alias.into()))
    }

    fn join_segment<V: Value>(
        &self,
        next: &Key<M::Target, V>,
        alias: Option<String>,
    ) -> CompositeKey<D, V> {
        let head = Arc::clone(&self.reader);
        let last = next.clone();
        let reader: Reader<D, V> = Arc::new(move |domain: &D| {
            let Some(link) = head(domain)? else {
                return Ok(None);
            };
            match link.target() {
                Some(target) => last.get(target),
                None => Ok(None),
            }
        });
        let mut segments = self.segments.to_vec();
        segments.push(Segment::of(next, alias));
        CompositeKey {
            segments: segments.into(),
            root: Arc::clone(&self.root),
            reader,
            default: next.default_value().cloned(),
            ascending: self.ascending,
        }
    }
}

impl<D: 'static, V: Value> CompositeKey<D, V> {
    /// Value at the end of the path; `None` as soon as a hop is missing.
    pub fn get(&self, domain: &D) -> Result<Option<V>, KeypathError> {
        (self.reader)(domain)
    }

    /// Default of the last segment.
    #[must_use]
    pub fn default_value(&self) -> Option<&V> {
        self.default.as_ref()
    }

    /// Segment names joined with `.`, aliases left out.
    #[must_use]
    pub fn name(&self) -> String {
        let mut name = String::new();
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 {
                name.push(PATH_SEPARATOR);
            }
            name.push_str(segment.info().name());
        }
        name
    }

    /// `Domain.path`, named after the root segment's domain.
    #[must_use]
    pub fn full_name(&self) -> String {
        match self.segments.first() {
            Some(root) => format!("{}.{}", root.info().domain(), self.name()),
            None => self.name(),
        }
    }

    /// Number of hops; always at least two.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Descriptors of the segments, first to last.
    pub fn segments(&self) -> impl Iterator<Item = &KeyInfo> {
        self.segments.iter().map(Segment::info)
    }

    /// Alias of segment `position`, if one was given.
    #[must_use]
    pub fn alias(&self, position: usize) -> Option<&str> {
        self.segments.get(position)?.alias.as_deref()
    }

    /// The first segment as a typed key, if its value type is `M`.
    #[must_use]
    pub fn root<M: Value>(&self) -> Option<&Key<D, M>> {
        self.root.downcast_ref::<Key<D, M>>()
    }

    #[must_use]
    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    #[must_use]
    pub fn descending(&self) -> Self {
        Self {
            ascending: false,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn ascending(&self) -> Self {
        Self {
            ascending: true,
            ..self.clone()
        }
    }
}

impl<D: 'static, V: Value + PartialEq> CompositeKey<D, V> {
    /// True when the value at the end of the path equals the last
    /// segment's default. A broken path reads `None`, which only matches a
    /// key without default.
    pub fn is_default(&self, domain: &D) -> Result<bool, KeypathError> {
        Ok(self.get(domain)? == self.default)
    }

    /// True when the value at the end of the path equals `value`.
    pub fn equals_value(&self, domain: &D, value: Option<&V>) -> Result<bool, KeypathError> {
        Ok(self.get(domain)?.as_ref() == value)
    }
}

impl<D: 'static, V: Value> PartialEq for CompositeKey<D, V> {
    fn eq(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| same_key(&a.key, &b.key))
    }
}

impl<D: 'static, V: Value> Eq for CompositeKey<D, V> {}

impl<D: 'static, V: Value> fmt::Display for CompositeKey<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 {
                write!(f, "{PATH_SEPARATOR}")?;
            }
            f.write_str(segment.info().name())?;
            if let Some(alias) = &segment.alias {
                write!(f, "[{alias}]")?;
            }
        }
        Ok(())
    }
}

impl<D: 'static, V: Value> fmt::Debug for CompositeKey<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeKey")
            .field("path", &self.to_string())
            .field("ascending", &self.ascending)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
