//! # Batch Resolver
//!
//! Turns one lazy load per entity into one bulk query per chunk of distinct
//! foreign keys.
//!
//! ## Algorithm
//!
//! 1. A composite key is reduced to its root segment; only that column joins
//! 2. One pass collects every unresolved identifier, deduplicated, together
//!    with the positions of the entities holding it
//! 3. No identifiers, no query
//! 4. Identifiers are split into chunks of at most `max_in_items`
//! 5. Each chunk is one `where_in` call on the query source
//! 6. Rows of a chunk are fully collected, then written back into every
//!    entity holding one of the chunk's identifiers. An identifier with no
//!    matching row is written back as `None`
//!
//! Entities keep their order and count. Those with no foreign key, or an
//! already resolved one, are not touched.
//!
//! ## Failure
//!
//! A failing query aborts the call. Chunks written back before it stay
//! written; the failing chunk and those after it stay unresolved. Retrying
//! the whole call is safe, it only reads and overwrites references.

use crate::composite::CompositeKey;
use crate::config::ResolverConfig;
use crate::key::Key;
use crate::primitives::DEFAULT_MAX_IN_ITEMS;
use crate::query::{QuerySource, TableModel};
use crate::reference::{Entity, Reference};
use crate::storage::Domain;
use crate::types::{KeypathError, Value};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

const DEFAULT_CHUNK: NonZeroUsize = match NonZeroUsize::new(DEFAULT_MAX_IN_ITEMS) {
    Some(size) => size,
    None => NonZeroUsize::MIN,
};

// =============================================================================
// REFERENCE PATH
// =============================================================================

/// A key whose root segment holds a [`Reference`] to `T`.
pub trait ReferencePath<D: 'static, T: Entity> {
    /// The direct key that participates in the join.
    ///
    /// # Errors
    ///
    /// `IllegalState` if the root segment does not hold `Reference<T>`.
    fn root_reference(&self) -> Result<Key<D, Reference<T>>, KeypathError>;
}

impl<D: 'static, T: Entity> ReferencePath<D, T> for Key<D, Reference<T>> {
    fn root_reference(&self) -> Result<Key<D, Reference<T>>, KeypathError> {
        Ok(self.clone())
    }
}

impl<D: 'static, V: Value, T: Entity> ReferencePath<D, T> for CompositeKey<D, V> {
    fn root_reference(&self) -> Result<Key<D, Reference<T>>, KeypathError> {
        self.root::<Reference<T>>().cloned().ok_or_else(|| {
            KeypathError::IllegalState(format!(
                "{} does not start with a reference to {}",
                self.full_name(),
                std::any::type_name::<T>()
            ))
        })
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// What one resolve call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Entities passed in.
    pub entities: usize,
    /// Distinct unresolved identifiers found.
    pub distinct_keys: usize,
    /// Bulk queries issued.
    pub queries: usize,
    /// Entities whose reference was materialised.
    pub resolved: usize,
    /// Entities whose identifier matched no returned row; their reference
    /// is cleared.
    pub missing: usize,
}

impl ResolveReport {
    /// Report of a call that had nothing to do.
    #[must_use]
    pub fn idle(entities: usize) -> Self {
        Self {
            entities,
            ..Self::default()
        }
    }
}

// =============================================================================
// BATCH RESOLVER
// =============================================================================

/// Chunked foreign-key resolver. Holds no state besides its chunk size;
/// nothing is cached between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchResolver {
    max_in_items: NonZeroUsize,
}

impl Default for BatchResolver {
    fn default() -> Self {
        Self {
            max_in_items: DEFAULT_CHUNK,
        }
    }
}

impl BatchResolver {
    /// Resolver with a validated configuration.
    ///
    /// # Errors
    ///
    /// `Config` if `max_in_items` is zero.
    pub fn new(config: &ResolverConfig) -> Result<Self, KeypathError> {
        config.validate()?;
        let max_in_items = NonZeroUsize::new(config.max_in_items).ok_or_else(|| {
            KeypathError::Config("max_in_items must be at least 1".to_string())
        })?;
        Ok(Self { max_in_items })
    }

    /// Largest identifier list sent in one query.
    #[must_use]
    pub fn max_in_items(&self) -> usize {
        self.max_in_items.get()
    }

    /// Resolve `key` across `entities` in place.
    ///
    /// # Errors
    ///
    /// `Query` from the first failing chunk, `IllegalState` if `key` has no
    /// reference root, and any storage error raised while reading or writing.
    pub fn resolve<D, K, T, Q>(
        &self,
        entities: &mut [D],
        key: &K,
        join: &Key<T, T::Id>,
        source: &Q,
    ) -> Result<ResolveReport, KeypathError>
    where
        D: Domain,
        K: ReferencePath<D, T> + ?Sized,
        T: Entity,
        Q: QuerySource<T> + ?Sized,
    {
        let key = key.root_reference()?;
        let mut report = ResolveReport::idle(entities.len());

        let mut pending: BTreeMap<T::Id, Vec<usize>> = BTreeMap::new();
        for (position, entity) in entities.iter().enumerate() {
            if let Some(Reference::Unresolved(id)) = key.get(entity)? {
                pending.entry(id).or_default().push(position);
            }
        }
        report.distinct_keys = pending.len();
        if pending.is_empty() {
            tracing::debug!(key = %key.full_name(), entities = report.entities, "nothing to resolve");
            return Ok(report);
        }

        let ids: Vec<T::Id> = pending.keys().cloned().collect();
        for (chunk_no, chunk) in ids.chunks(self.max_in_items.get()).enumerate() {
            let rows = source.where_in(join, chunk)?;
            report.queries += 1;

            let mut found: BTreeMap<T::Id, Arc<T>> = BTreeMap::new();
            let mut returned = 0usize;
            for row in rows {
                returned += 1;
                match join.get(&row)? {
                    Some(id) => {
                        found.insert(id, Arc::new(row));
                    }
                    None => tracing::warn!(
                        join = %join.full_name(),
                        "returned row has no join value"
                    ),
                }
            }
            tracing::debug!(
                key = %key.full_name(),
                chunk = chunk_no + 1,
                size = chunk.len(),
                rows = returned,
                "chunk resolved"
            );

            for id in chunk {
                let Some(positions) = pending.get(id) else {
                    continue;
                };
                let target = found.get(id);
                if target.is_none() {
                    tracing::warn!(key = %key.full_name(), ?id, "no target row for foreign key");
                    report.missing += positions.len();
                }
                for &position in positions {
                    if let Some(entity) = entities.get_mut(position) {
                        let value = target.map(|row| Reference::Resolved(Arc::clone(row)));
                        key.load(entity, value)?;
                        if target.is_some() {
                            report.resolved += 1;
                        }
                    }
                }
            }
        }

        tracing::debug!(
            key = %key.full_name(),
            entities = report.entities,
            distinct = report.distinct_keys,
            queries = report.queries,
            resolved = report.resolved,
            missing = report.missing,
            "batch resolve finished"
        );
        Ok(report)
    }

    /// Collect `rows` into a list and resolve `key` across it.
    ///
    /// # Errors
    ///
    /// As [`BatchResolver::resolve`].
    pub fn load_batch<D, I, K, T, Q>(
        &self,
        rows: I,
        key: &K,
        join: &Key<T, T::Id>,
        source: &Q,
    ) -> Result<Vec<D>, KeypathError>
    where
        D: Domain,
        I: IntoIterator<Item = D>,
        K: ReferencePath<D, T> + ?Sized,
        T: Entity,
        Q: QuerySource<T> + ?Sized,
    {
        let mut entities: Vec<D> = rows.into_iter().collect();
        self.resolve(&mut entities, key, join, source)?;
        Ok(entities)
    }

    /// Resolve every foreign-key column of `table`, in table order.
    ///
    /// # Errors
    ///
    /// The first column that fails aborts the rest.
    pub fn resolve_all<D, Q>(
        &self,
        entities: &mut [D],
        table: &TableModel<D, Q>,
        source: &Q,
    ) -> Result<Vec<ResolveReport>, KeypathError>
    where
        D: Domain,
        Q: ?Sized,
    {
        let mut reports = Vec::new();
        for column in table.foreign_keys() {
            reports.push(column.resolve(self, entities, source)?);
        }
        Ok(reports)
    }
}

// =============================================================================
// TESTS
// =============================================================================
