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

//! Component registration
//!
//! Components are registered by name and bound to a Rust type once. The
//! registry hands out dense [`ComponentId`]s and typed [`ComponentKey`]s;
//! a key is the capability needed to build read/write access descriptors.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

use ahash::AHashMap;

use crate::error::{EcsError, Result};

/// Marker trait for components
///
/// Components must be 'static (no borrowed data)
pub trait Component: 'static + Send + Sync {}

/// Automatically implement Component for all valid types
impl<T: 'static + Send + Sync> Component for T {}

/// Dense component index, stable for the lifetime of a World
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A [`ComponentId`] tagged with the component's Rust type
pub struct ComponentKey<T> {
    id: ComponentId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ComponentKey<T> {
    pub(crate) fn new(id: ComponentId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }
}

impl<T> Clone for ComponentKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentKey<T> {}

impl<T> PartialEq for ComponentKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ComponentKey<T> {}

impl<T> fmt::Debug for ComponentKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentKey")
            .field("id", &self.id.0)
            .field("type", &type_name::<T>())
            .finish()
    }
}

/// Registration record for one component
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub name: String,
    pub type_id: TypeId,
    pub type_name: &'static str,
}

/// Append-only name -> id table
#[derive(Default)]
pub struct ComponentRegistry {
    by_name: AHashMap<String, ComponentId>,
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` as a component of type `T`.
    ///
    /// Registering the same name again returns the existing key. Registering
    /// it with a different type is an error.
    pub fn register<T: Component>(&mut self, name: &str) -> Result<(ComponentKey<T>, bool)> {
        if let Some(&id) = self.by_name.get(name) {
            self.check_type::<T>(id)?;
            return Ok((ComponentKey::new(id), false));
        }

        let id = ComponentId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            name: name.to_string(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        });
        self.by_name.insert(name.to_string(), id);
        Ok((ComponentKey::new(id), true))
    }

    /// Look up the id bound to `name`
    pub fn id(&self, name: &str) -> Result<ComponentId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| EcsError::ComponentNotRegistered(name.to_string()))
    }

    /// Look up a typed key, checking the bound type
    pub fn key<T: Component>(&self, name: &str) -> Result<ComponentKey<T>> {
        let id = self.id(name)?;
        self.check_type::<T>(id)?;
        Ok(ComponentKey::new(id))
    }

    pub fn info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    pub fn name(&self, id: ComponentId) -> Option<&str> {
        self.info(id).map(|info| info.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    fn check_type<T: Component>(&self, id: ComponentId) -> Result<()> {
        let info = self
            .infos
            .get(id.index())
            .ok_or(EcsError::UnknownComponentId(id))?;
        if info.type_id != TypeId::of::<T>() {
            return Err(EcsError::ComponentTypeMismatch {
                name: info.name.clone(),
                expected: info.type_name,
                found: type_name::<T>(),
            });
        }
        Ok(())
    }
}

/// Boxed component value waiting to be written into its column
pub(crate) type BoxedComponent = Box<dyn Any + Send + Sync>;

/// Ordered list of component values supplied to `spawn`
#[derive(Default)]
pub struct ComponentList {
    pub(crate) entries: Vec<(ComponentId, BoxedComponent)>,
}

impl ComponentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component value (builder style)
    pub fn with<T: Component>(mut self, key: ComponentKey<T>, value: T) -> Self {
        self.push(key, value);
        self
    }

    pub fn push<T: Component>(&mut self, key: ComponentKey<T>, value: T) {
        self.entries.push((key.id(), Box::new(value)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }
}

impl fmt::Debug for ComponentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.component_ids()).finish()
    }
}
