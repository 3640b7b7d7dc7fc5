//! Type-filtered casts over entity handles.

use smallvec::SmallVec;

use crate::EntityAccess;

/// Which runtime kinds a type test can possibly accept.
#[derive(Clone, Debug)]
pub enum KindFilter<K> {
    Any,
    Only(SmallVec<[K; 4]>),
}

impl<K: Copy + Eq> KindFilter<K> {
    #[must_use]
    pub fn accepts(&self, kind: K) -> bool {
        match self {
            Self::Any => true,
            Self::Only(kinds) => kinds.contains(&kind),
        }
    }
}

/// A predicate-and-downcast pair used by type-filtered queries.
///
/// The kind filter prunes whole buckets of a section before `cast` is
/// attempted on individual handles; `cast` may still reject.
pub struct EntityTypeTest<T: EntityAccess, U> {
    kinds: KindFilter<T::Kind>,
    cast: fn(&T) -> Option<U>,
}

impl<T: EntityAccess, U> EntityTypeTest<T, U> {
    /// Test that considers every kind.
    #[must_use]
    pub const fn any(cast: fn(&T) -> Option<U>) -> Self {
        Self {
            kinds: KindFilter::Any,
            cast,
        }
    }

    /// Test restricted to the given kinds.
    #[must_use]
    pub fn of_kinds(kinds: impl IntoIterator<Item = T::Kind>, cast: fn(&T) -> Option<U>) -> Self {
        Self {
            kinds: KindFilter::Only(kinds.into_iter().collect()),
            cast,
        }
    }

    #[must_use]
    pub fn accepts_kind(&self, kind: T::Kind) -> bool {
        self.kinds.accepts(kind)
    }

    #[must_use]
    pub fn try_cast(&self, entity: &T) -> Option<U> {
        if self.accepts_kind(entity.kind()) {
            (self.cast)(entity)
        } else {
            None
        }
    }
}

impl<T: EntityAccess> EntityTypeTest<T, T> {
    /// Accepts exactly one kind and yields the handle itself.
    #[must_use]
    pub fn kind(kind: T::Kind) -> Self {
        Self::of_kinds([kind], |entity| Some(entity.clone()))
    }

    /// Accepts every entity.
    #[must_use]
    pub fn all() -> Self {
        Self::any(|entity| Some(entity.clone()))
    }
}

impl<T: EntityAccess, U> Clone for EntityTypeTest<T, U> {
    fn clone(&self) -> Self {
        Self {
            kinds: self.kinds.clone(),
            cast: self.cast,
        }
    }
}

impl<T: EntityAccess, U> std::fmt::Debug for EntityTypeTest<T, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityTypeTest")
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}
