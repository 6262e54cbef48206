//! Typed singletons owned by the World
//!
//! Resources live and die with their World. The collision pipeline (spatial
//! hash, dedup set, execution-unit pool) is stored here so both the collision
//! system and the despawn observer reach the same instance.

use std::any::{type_name, Any, TypeId};

use ahash::AHashMap;

use crate::error::{EcsError, Result};

#[derive(Default)]
pub struct Resources {
    map: AHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a resource, returning the previous value
    pub fn insert<R: Any + Send + Sync>(&mut self, resource: R) -> Option<R> {
        self.map
            .insert(TypeId::of::<R>(), Box::new(resource))
            .and_then(|old| old.downcast::<R>().ok())
            .map(|old| *old)
    }

    pub fn remove<R: Any + Send + Sync>(&mut self) -> Option<R> {
        self.map
            .remove(&TypeId::of::<R>())
            .and_then(|old| old.downcast::<R>().ok())
            .map(|old| *old)
    }

    pub fn contains<R: Any + Send + Sync>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<R>())
    }

    pub fn get<R: Any + Send + Sync>(&self) -> Option<&R> {
        self.map
            .get(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast_ref::<R>())
    }

    pub fn get_mut<R: Any + Send + Sync>(&mut self) -> Option<&mut R> {
        self.map
            .get_mut(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast_mut::<R>())
    }

    /// Like `get_mut`, but a missing resource is an error
    pub fn expect_mut<R: Any + Send + Sync>(&mut self) -> Result<&mut R> {
        self.get_mut::<R>()
            .ok_or(EcsError::ResourceNotFound(type_name::<R>()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Score(u32);

    #[test]
    fn test_insert_get_replace() {
        let mut resources = Resources::new();
        assert!(resources.insert(Score(1)).is_none());
        assert_eq!(resources.insert(Score(2)), Some(Score(1)));

        resources.get_mut::<Score>().unwrap().0 += 1;
        assert_eq!(resources.get::<Score>(), Some(&Score(3)));
    }

    #[test]
    fn test_missing_resource_error() {
        let mut resources = Resources::new();
        assert!(matches!(
            resources.expect_mut::<Score>(),
            Err(EcsError::ResourceNotFound(_))
        ));
    }
}
