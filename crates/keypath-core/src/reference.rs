//! # References
//!
//! A foreign key held by an owning entity: either the raw identifier as it
//! came out of storage, or the target entity it has been resolved to.

use crate::composite::Link;
use crate::storage::Domain;
use std::fmt;
use std::sync::Arc;

/// A domain object with an identity of its own.
pub trait Entity: Domain + Send + Sync {
    /// Primary-key type. `Ord` so identifiers can key a `BTreeMap`.
    type Id: Clone + Ord + fmt::Debug + Send + Sync + 'static;
}

/// Foreign-key value of an owning entity.
pub enum Reference<T: Entity> {
    /// Raw identifier, target not loaded.
    Unresolved(T::Id),
    /// Materialised target.
    Resolved(Arc<T>),
}

impl<T: Entity> Reference<T> {
    #[must_use]
    pub fn unresolved(id: T::Id) -> Self {
        Self::Unresolved(id)
    }

    #[must_use]
    pub fn resolved(target: Arc<T>) -> Self {
        Self::Resolved(target)
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// The raw identifier of an unresolved reference.
    #[must_use]
    pub fn raw_id(&self) -> Option<&T::Id> {
        match self {
            Self::Unresolved(id) => Some(id),
            Self::Resolved(_) => None,
        }
    }

    /// The target of a resolved reference.
    #[must_use]
    pub fn target(&self) -> Option<&Arc<T>> {
        match self {
            Self::Unresolved(_) => None,
            Self::Resolved(target) => Some(target),
        }
    }
}

impl<T: Entity> Clone for Reference<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Unresolved(id) => Self::Unresolved(id.clone()),
            Self::Resolved(target) => Self::Resolved(Arc::clone(target)),
        }
    }
}

impl<T: Entity> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved(id) => f.debug_tuple("Unresolved").field(id).finish(),
            Self::Resolved(_) => f.debug_tuple("Resolved").finish_non_exhaustive(),
        }
    }
}

impl<T: Entity> Link for Reference<T> {
    type Target = T;

    fn target(&self) -> Option<&T> {
        Reference::target(self).map(|target| &**target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use crate::storage::Container;

    struct Shop {
        attrs: Container<Shop>,
    }

    impl Domain for Shop {
        fn container(&self) -> &Container<Self> {
            &self.attrs
        }
        fn container_mut(&mut self) -> &mut Container<Self> {
            &mut self.attrs
        }
    }

    impl Entity for Shop {
        type Id = u32;
    }

    fn shop() -> Shop {
        let mut builder = RegistryBuilder::<Shop>::new("Shop");
        let registry = builder.lock().expect("lock");
        Shop {
            attrs: Container::map(&registry),
        }
    }

    #[test]
    fn unresolved_has_no_target() {
        let reference = Reference::<Shop>::unresolved(7);
        assert!(!reference.is_resolved());
        assert_eq!(reference.raw_id(), Some(&7));
        assert!(Link::target(&reference).is_none());
    }

    #[test]
    fn resolved_leads_to_target() {
        let reference = Reference::resolved(Arc::new(shop()));
        assert!(reference.is_resolved());
        assert_eq!(reference.raw_id(), None);
        assert!(Link::target(&reference).is_some());
        assert_eq!(format!("{reference:?}"), "Resolved(..)");
    }
}
