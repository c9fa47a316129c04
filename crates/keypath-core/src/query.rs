//! # Query Module
//!
//! The collaborators the batch resolver talks to. The crate renders no SQL
//! and owns no connection; an ORM layer implements these traits.
//!
//! - `QuerySource<T>`: bulk lookup "T WHERE column IN (values)"
//! - `ColumnMeta<D, Q>`: one column of an owner table, foreign key or not
//! - `TableModel<D, Q>`: the ordered columns of one owner type

use crate::key::Key;
use crate::reference::{Entity, Reference};
use crate::resolver::{BatchResolver, ResolveReport};
use crate::storage::Domain;
use crate::types::{KeyInfo, KeypathError, QueryError, Value};
use std::fmt;

// =============================================================================
// QUERY SOURCE
// =============================================================================

/// Bulk lookup of target entities by one column.
///
/// Implementations run one query per call. Timeouts and retries are theirs
/// to enforce; the resolver calls sequentially and never cancels.
pub trait QuerySource<T: Entity> {
    /// Rows returned by one lookup.
    type Rows: IntoIterator<Item = T>;

    /// Every `T` whose `column` value is in `values`.
    ///
    /// # Errors
    ///
    /// Whatever the backing store reports; the resolver surfaces it unchanged.
    fn where_in(&self, column: &Key<T, T::Id>, values: &[T::Id]) -> Result<Self::Rows, QueryError>;
}

// =============================================================================
// COLUMN METADATA
// =============================================================================

/// One column of owner type `D`, as seen through query source `Q`.
pub trait ColumnMeta<D: Domain, Q: ?Sized> {
    /// The owner key this column stores.
    fn owner_key(&self) -> &KeyInfo;

    fn is_foreign_key(&self) -> bool {
        false
    }

    /// First column of the referenced primary key.
    fn target_join_column(&self) -> Option<&KeyInfo> {
        None
    }

    /// Batch-resolve this column over `entities`.
    ///
    /// Plain columns have nothing to resolve and issue no query.
    fn resolve(
        &self,
        _resolver: &BatchResolver,
        entities: &mut [D],
        _source: &Q,
    ) -> Result<ResolveReport, KeypathError> {
        Ok(ResolveReport::idle(entities.len()))
    }
}

/// A column holding a plain value.
pub struct ValueColumn<D: 'static, V: Value> {
    key: Key<D, V>,
}

impl<D: 'static, V: Value> ValueColumn<D, V> {
    #[must_use]
    pub fn new(key: &Key<D, V>) -> Self {
        Self { key: key.clone() }
    }
}

impl<D: Domain, V: Value, Q: ?Sized> ColumnMeta<D, Q> for ValueColumn<D, V> {
    fn owner_key(&self) -> &KeyInfo {
        self.key.info()
    }
}

/// A column holding a reference to entity `T`, joined on `T`'s primary key.
pub struct ForeignKeyColumn<D: 'static, T: Entity> {
    owner: Key<D, Reference<T>>,
    join: Key<T, T::Id>,
}

impl<D: 'static, T: Entity> ForeignKeyColumn<D, T> {
    #[must_use]
    pub fn new(owner: &Key<D, Reference<T>>, join: &Key<T, T::Id>) -> Self {
        Self {
            owner: owner.clone(),
            join: join.clone(),
        }
    }
}

impl<D, T, Q> ColumnMeta<D, Q> for ForeignKeyColumn<D, T>
where
    D: Domain,
    T: Entity,
    Q: QuerySource<T> + ?Sized,
{
    fn owner_key(&self) -> &KeyInfo {
        self.owner.info()
    }

    fn is_foreign_key(&self) -> bool {
        true
    }

    fn target_join_column(&self) -> Option<&KeyInfo> {
        Some(self.join.info())
    }

    fn resolve(
        &self,
        resolver: &BatchResolver,
        entities: &mut [D],
        source: &Q,
    ) -> Result<ResolveReport, KeypathError> {
        resolver.resolve(entities, &self.owner, &self.join, source)
    }
}

// =============================================================================
// TABLE MODEL
// =============================================================================

/// Ordered column list of owner type `D`.
pub struct TableModel<D: Domain, Q: ?Sized> {
    name: &'static str,
    columns: Vec<Box<dyn ColumnMeta<D, Q>>>,
}

impl<D: Domain, Q: ?Sized> TableModel<D, Q> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            columns: Vec::new(),
        }
    }

    /// Append a column.
    #[must_use]
    pub fn column(mut self, column: impl ColumnMeta<D, Q> + 'static) -> Self {
        self.columns.push(Box::new(column));
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn columns(&self) -> impl Iterator<Item = &(dyn ColumnMeta<D, Q> + 'static)> {
        self.columns.iter().map(AsRef::as_ref)
    }

    /// Only the foreign-key columns, in table order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &(dyn ColumnMeta<D, Q> + 'static)> {
        self.columns().filter(|column| column.is_foreign_key())
    }
}

impl<D: Domain, Q: ?Sized> fmt::Debug for TableModel<D, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableModel")
            .field("name", &self.name)
            .field(
                "columns",
                &self.columns().map(|c| c.owner_key().name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
