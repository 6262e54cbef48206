//! Texture metadata lookup.
//!
//! Loading pixels is the host's job; the ECS only needs texture names and
//! dimensions to size sprites and colliders.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{EcsError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub name: String,
    pub width: f32,
    pub height: f32,
}

/// Texture lookup handed to systems
pub trait AssetSource: Send + Sync {
    fn texture(&self, name: &str) -> Option<&TextureInfo>;

    /// Lookup that turns a missing texture into `AssetNotFound`
    fn require_texture(&self, name: &str) -> Result<&TextureInfo> {
        self.texture(name)
            .ok_or_else(|| EcsError::AssetNotFound(name.to_string()))
    }
}

/// In-memory texture table
#[derive(Clone, Debug, Default)]
pub struct AssetRegistry {
    textures: AHashMap<String, TextureInfo>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a texture, replacing any entry with the same name
    pub fn add_texture(&mut self, name: &str, width: f32, height: f32) -> &mut Self {
        debug!(texture = name, width, height, "texture registered");
        self.textures.insert(
            name.to_string(),
            TextureInfo {
                name: name.to_string(),
                width,
                height,
            },
        );
        self
    }

    /// Fail on the first missing name
    pub fn require(&self, names: &[&str]) -> Result<()> {
        for name in names {
            if !self.textures.contains_key(*name) {
                error!(texture = *name, "required texture missing");
                return Err(EcsError::AssetNotFound(name.to_string()));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl AssetSource for AssetRegistry {
    fn texture(&self, name: &str) -> Option<&TextureInfo> {
        self.textures.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_reports_missing_texture() {
        let mut assets = AssetRegistry::new();
        assets.add_texture("player-ship", 120.0, 80.0);

        assert!(assets.require(&["player-ship"]).is_ok());
        assert_eq!(
            assets.require(&["player-ship", "enemy-ship"]),
            Err(EcsError::AssetNotFound("enemy-ship".to_string()))
        );
        assert_eq!(assets.texture("player-ship").unwrap().width, 120.0);
        assert!(assets.require_texture("player-bullet").is_err());
    }
}
