//! Component storage
//!
//! One typed column per [`ComponentId`], each a `SecondaryMap` keyed by
//! entity behind its own `RwLock`. Structural changes (insert/remove) take
//! `&mut self`; in-place reads and writes go through the column locks so a
//! query can hold several columns at once.

use std::any::{type_name, Any};

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use slotmap::SecondaryMap;

use crate::bitset::BitSet;
use crate::component::{BoxedComponent, Component, ComponentId, ComponentKey};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};

/// Type-erased column
pub(crate) trait ErasedColumn: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn insert_boxed(&mut self, entity: EntityId, value: BoxedComponent) -> Result<()>;
    fn remove(&mut self, entity: EntityId) -> bool;
    fn len(&self) -> Result<usize>;
}

/// Storage for a single component type
pub struct Column<T: Component> {
    id: ComponentId,
    name: String,
    data: RwLock<SecondaryMap<EntityId, T>>,
}

impl<T: Component> Column<T> {
    fn new(id: ComponentId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            data: RwLock::new(SecondaryMap::new()),
        }
    }

    /// Shared lock on the whole column; never blocks
    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, SecondaryMap<EntityId, T>>> {
        self.data
            .try_read()
            .ok_or(EcsError::ComponentBorrowConflict(self.id))
    }

    /// Exclusive lock on the whole column; never blocks
    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, SecondaryMap<EntityId, T>>> {
        self.data
            .try_write()
            .ok_or(EcsError::ComponentBorrowConflict(self.id))
    }
}

impl<T: Component> ErasedColumn for Column<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn insert_boxed(&mut self, entity: EntityId, value: BoxedComponent) -> Result<()> {
        let value = value
            .downcast::<T>()
            .map_err(|_| EcsError::ComponentTypeMismatch {
                name: self.name.clone(),
                expected: type_name::<T>(),
                found: "<boxed value>",
            })?;
        self.data.get_mut().insert(entity, *value);
        Ok(())
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        self.data.get_mut().remove(entity).is_some()
    }

    fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

/// All component columns plus a per-entity component mask
#[derive(Default)]
pub struct ComponentStore {
    columns: Vec<Box<dyn ErasedColumn>>,
    masks: SecondaryMap<EntityId, BitSet>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the column for a freshly registered component
    pub(crate) fn add_column<T: Component>(&mut self, key: ComponentKey<T>, name: &str) {
        debug_assert_eq!(key.id().index(), self.columns.len());
        self.columns.push(Box::new(Column::<T>::new(key.id(), name)));
    }

    /// Start tracking a new entity with no components
    pub(crate) fn track(&mut self, entity: EntityId) {
        self.masks.insert(entity, BitSet::with_capacity(self.columns.len()));
    }

    /// Typed access to a column
    pub fn column<T: Component>(&self, key: ComponentKey<T>) -> Result<&Column<T>> {
        let column = self
            .columns
            .get(key.id().index())
            .ok_or(EcsError::UnknownComponentId(key.id()))?;
        column
            .as_any()
            .downcast_ref::<Column<T>>()
            .ok_or_else(|| EcsError::ComponentTypeMismatch {
                name: format!("#{}", key.id().index()),
                expected: "<registered type>",
                found: type_name::<T>(),
            })
    }

    /// Write a boxed value (spawn path)
    pub(crate) fn insert_boxed(
        &mut self,
        entity: EntityId,
        id: ComponentId,
        value: BoxedComponent,
    ) -> Result<()> {
        let mask = self.masks.get_mut(entity).ok_or(EcsError::EntityNotFound)?;
        let column = self
            .columns
            .get_mut(id.index())
            .ok_or(EcsError::UnknownComponentId(id))?;
        column.insert_boxed(entity, value)?;
        mask.set(id.index());
        Ok(())
    }

    /// Insert or overwrite a component value
    pub fn set<T: Component>(
        &mut self,
        entity: EntityId,
        key: ComponentKey<T>,
        value: T,
    ) -> Result<()> {
        self.insert_boxed(entity, key.id(), Box::new(value))
    }

    /// Remove one component. Returns whether it was present.
    pub fn remove(&mut self, entity: EntityId, id: ComponentId) -> bool {
        let Some(mask) = self.masks.get_mut(entity) else {
            return false;
        };
        if !mask.unset(id.index()) {
            return false;
        }
        self.columns
            .get_mut(id.index())
            .is_some_and(|column| column.remove(entity))
    }

    /// Drop every component of `entity` and stop tracking it
    pub(crate) fn remove_all(&mut self, entity: EntityId) -> usize {
        let Some(mask) = self.masks.remove(entity) else {
            return 0;
        };
        let mut removed = 0;
        for index in mask.ones() {
            if let Some(column) = self.columns.get_mut(index) {
                if column.remove(entity) {
                    removed += 1;
                }
            }
        }
        removed
    }

    pub fn has(&self, entity: EntityId, id: ComponentId) -> bool {
        self.masks
            .get(entity)
            .is_some_and(|mask| mask.contains(id.index()))
    }

    pub fn mask(&self, entity: EntityId) -> Option<&BitSet> {
        self.masks.get(entity)
    }

    /// Read a single component
    pub fn get<T: Component>(
        &self,
        entity: EntityId,
        key: ComponentKey<T>,
    ) -> Result<Option<MappedRwLockReadGuard<'_, T>>> {
        let column = self.column(key)?;
        if !self.has(entity, key.id()) {
            return Ok(None);
        }
        let guard = column.read()?;
        Ok(RwLockReadGuard::try_map(guard, |data| data.get(entity)).ok())
    }

    /// Write a single component in place
    pub fn get_mut<T: Component>(
        &self,
        entity: EntityId,
        key: ComponentKey<T>,
    ) -> Result<Option<MappedRwLockWriteGuard<'_, T>>> {
        let column = self.column(key)?;
        if !self.has(entity, key.id()) {
            return Ok(None);
        }
        let guard = column.write()?;
        Ok(RwLockWriteGuard::try_map(guard, |data| data.get_mut(entity)).ok())
    }

    /// Entities whose mask covers `required`, in stable slot order
    pub fn matching(&self, required: &BitSet) -> Vec<EntityId> {
        self.masks
            .iter()
            .filter(|(_, mask)| mask.is_superset(required))
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Number of values held by a column; unknown ids hold none
    pub fn column_len(&self, id: ComponentId) -> Result<usize> {
        self.columns
            .get(id.index())
            .map_or(Ok(0), |column| column.len())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}
