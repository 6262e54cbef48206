// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Query system with access descriptors
//!
//! A query is an ordered list of `(component, read|write)` descriptors built
//! from typed [`ComponentKey`]s. Construction rejects a component listed twice,
//! so every column is locked at most once per query and `&mut` items never
//! alias.
//!
//! ```ignore
//! let query = world.query((read(health), write(position)))?;
//! world.each(&query, |entity, (health, position)| {
//!     position.x += health.0 as f32;
//! })?;
//! ```

use std::marker::PhantomData;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use slotmap::SecondaryMap;
use smallvec::SmallVec;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::bitset::BitSet;
use crate::component::{Component, ComponentId, ComponentKey};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::storage::ComponentStore;

/// Maximum number of descriptors in one query
pub const MAX_QUERY_COMPONENTS: usize = 8;

/// Access mode of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

/// One `(component, mode)` entry of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessDescriptor {
    pub component: ComponentId,
    pub access: Access,
}

pub type Descriptors = SmallVec<[AccessDescriptor; MAX_QUERY_COMPONENTS]>;

/// Shared access to component `T`
pub struct Read<T>(ComponentKey<T>);

/// Exclusive access to component `T`
pub struct Write<T>(ComponentKey<T>);

/// Build a read descriptor
pub fn read<T: Component>(key: ComponentKey<T>) -> Read<T> {
    Read(key)
}

/// Build a write descriptor
pub fn write<T: Component>(key: ComponentKey<T>) -> Write<T> {
    Write(key)
}

/// Typed query parameter: a single descriptor or a tuple of them
pub trait QueryParam: 'static {
    /// Column locks held for the duration of one query execution
    type Guard<'w>;

    /// Per-entity item handed to callbacks
    type Item<'g>
    where
        Self: 'g;

    /// Append this parameter's descriptors in order
    fn describe(&self, out: &mut Descriptors);

    /// Lock every column this parameter touches
    fn acquire<'w>(&self, store: &'w ComponentStore) -> Result<Self::Guard<'w>>;

    /// Whether every locked column holds `entity`
    fn contains(guard: &Self::Guard<'_>, entity: EntityId) -> bool;

    /// Borrow the item for `entity` out of the held locks
    fn fetch<'g, 'w: 'g>(guard: &'g mut Self::Guard<'w>, entity: EntityId) -> Option<Self::Item<'g>>
    where
        Self: 'g;
}

impl<T: Component> QueryParam for Read<T> {
    type Guard<'w> = RwLockReadGuard<'w, SecondaryMap<EntityId, T>>;
    type Item<'g> = &'g T where Self: 'g;

    fn describe(&self, out: &mut Descriptors) {
        out.push(AccessDescriptor {
            component: self.0.id(),
            access: Access::Read,
        });
    }

    fn acquire<'w>(&self, store: &'w ComponentStore) -> Result<Self::Guard<'w>> {
        store.column(self.0)?.read()
    }

    fn contains(guard: &Self::Guard<'_>, entity: EntityId) -> bool {
        guard.contains_key(entity)
    }

    fn fetch<'g, 'w: 'g>(guard: &'g mut Self::Guard<'w>, entity: EntityId) -> Option<Self::Item<'g>>
    where
        Self: 'g,
    {
        guard.get(entity)
    }
}

impl<T: Component> QueryParam for Write<T> {
    type Guard<'w> = RwLockWriteGuard<'w, SecondaryMap<EntityId, T>>;
    type Item<'g> = &'g mut T where Self: 'g;

    fn describe(&self, out: &mut Descriptors) {
        out.push(AccessDescriptor {
            component: self.0.id(),
            access: Access::Write,
        });
    }

    fn acquire<'w>(&self, store: &'w ComponentStore) -> Result<Self::Guard<'w>> {
        store.column(self.0)?.write()
    }

    fn contains(guard: &Self::Guard<'_>, entity: EntityId) -> bool {
        guard.contains_key(entity)
    }

    fn fetch<'g, 'w: 'g>(guard: &'g mut Self::Guard<'w>, entity: EntityId) -> Option<Self::Item<'g>>
    where
        Self: 'g,
    {
        guard.get_mut(entity)
    }
}

macro_rules! impl_query_param {
    ($($P:ident),*) => {
        #[allow(non_snake_case)]
        impl<$($P: QueryParam),*> QueryParam for ($($P,)*) {
            type Guard<'w> = ($($P::Guard<'w>,)*);
            type Item<'g> = ($($P::Item<'g>,)*) where Self: 'g;

            fn describe(&self, out: &mut Descriptors) {
                let ($($P,)*) = self;
                $($P.describe(out);)*
            }

            fn acquire<'w>(&self, store: &'w ComponentStore) -> Result<Self::Guard<'w>> {
                let ($($P,)*) = self;
                Ok(($($P.acquire(store)?,)*))
            }

            fn contains(guard: &Self::Guard<'_>, entity: EntityId) -> bool {
                let ($($P,)*) = guard;
                $(<$P as QueryParam>::contains($P, entity))&&*
            }

            fn fetch<'g, 'w: 'g>(
                guard: &'g mut Self::Guard<'w>,
                entity: EntityId,
            ) -> Option<Self::Item<'g>>
            where
                Self: 'g,
            {
                let ($($P,)*) = guard;
                Some(($(<$P as QueryParam>::fetch($P, entity)?,)*))
            }
        }
    };
}

impl_query_param!(A);
impl_query_param!(A, B);
impl_query_param!(A, B, C);
impl_query_param!(A, B, C, D);
impl_query_param!(A, B, C, D, E);
impl_query_param!(A, B, C, D, E, F);
impl_query_param!(A, B, C, D, E, F, G);
impl_query_param!(A, B, C, D, E, F, G, H);

/// Validated query: descriptors are unique
pub struct Query<P: QueryParam> {
    params: P,
    descriptors: Descriptors,
    required: BitSet,
}

impl<P: QueryParam> Query<P> {
    /// Build a query, rejecting any component that is listed twice
    pub fn new(params: P) -> Result<Self> {
        let mut descriptors = Descriptors::new();
        params.describe(&mut descriptors);

        let mut required = BitSet::new();
        for descriptor in &descriptors {
            let index = descriptor.component.index();
            if required.contains(index) {
                return Err(EcsError::ConflictingAccess(descriptor.component));
            }
            required.set(index);
        }

        Ok(Self {
            params,
            descriptors,
            required,
        })
    }

    pub fn descriptors(&self) -> &[AccessDescriptor] {
        &self.descriptors
    }

    /// Whether the query writes to any column
    pub fn is_read_only(&self) -> bool {
        self.descriptors
            .iter()
            .all(|descriptor| descriptor.access == Access::Read)
    }

    pub(crate) fn required(&self) -> &BitSet {
        &self.required
    }

    /// Lock the columns and snapshot the matching entities
    pub fn iter<'w>(&self, store: &'w ComponentStore) -> Result<QueryIter<'w, P>> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("query.iter", components = self.descriptors.len()).entered();

        let guard = self.params.acquire(store)?;
        let entities = store.matching(&self.required);
        Ok(QueryIter {
            guard,
            entities: entities.into_iter(),
            _marker: PhantomData,
        })
    }
}

/// Lending iterator over a locked query
///
/// Items borrow from the iterator, so use `while let Some(..) = iter.next()`.
pub struct QueryIter<'w, P: QueryParam> {
    guard: P::Guard<'w>,
    entities: std::vec::IntoIter<EntityId>,
    _marker: PhantomData<P>,
}

impl<'w, P: QueryParam> QueryIter<'w, P> {
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(EntityId, P::Item<'_>)> {
        loop {
            let entity = self.entities.next()?;
            if P::contains(&self.guard, entity) {
                return P::fetch(&mut self.guard, entity).map(|item| (entity, item));
            }
        }
    }

    /// Entities not yet visited
    pub fn remaining(&self) -> usize {
        self.entities.len()
    }
}
