//! Render-phase boundary.
//!
//! Drawing itself belongs to the host. Render systems walk the world and
//! hand rectangles to a [`RenderSink`].

use std::sync::Arc;

use glam::Vec2;
use parking_lot::Mutex;

use crate::builtin::assets::TextureInfo;
use crate::builtin::transform::{Transform, TRANSFORM};
use crate::collision::{Collider, COLLIDER};
use crate::component::ComponentKey;
use crate::error::Result;
use crate::query::read;
use crate::spatial_hash::Rect;
use crate::system::{System, SystemContext};

/// Component name of [`Sprite`]
pub const SPRITE: &str = "@scatter/Sprite";

#[derive(Clone, Debug, PartialEq)]
pub struct Sprite {
    pub texture: TextureInfo,
}

impl Sprite {
    pub fn new(texture: TextureInfo) -> Self {
        Self { texture }
    }

    /// On-screen size under `transform`'s scale
    pub fn scaled_size(&self, transform: &Transform) -> Vec2 {
        Vec2::new(self.texture.width, self.texture.height) * transform.scale
    }
}

/// Receives draw requests from render systems
pub trait RenderSink: Send + Sync {
    fn draw_bounds(&mut self, bounds: Rect, collided: bool);

    fn draw_sprite(&mut self, _texture: &str, _area: Rect) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCall {
    Bounds { bounds: Rect, collided: bool },
    Sprite { texture: String, area: Rect },
}

/// Sink that records draw calls; clones share one buffer
#[derive(Clone, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<DrawCall>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything recorded so far
    pub fn take(&self) -> Vec<DrawCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

impl RenderSink for RecordingSink {
    fn draw_bounds(&mut self, bounds: Rect, collided: bool) {
        self.calls.lock().push(DrawCall::Bounds { bounds, collided });
    }

    fn draw_sprite(&mut self, texture: &str, area: Rect) {
        self.calls.lock().push(DrawCall::Sprite {
            texture: texture.to_string(),
            area,
        });
    }
}

/// Draws every collider's bounds with its collided flag
pub struct BoundsRenderSystem<S: RenderSink> {
    sink: S,
    collider: Option<ComponentKey<Collider>>,
}

impl<S: RenderSink> BoundsRenderSystem<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            collider: None,
        }
    }
}

impl<S: RenderSink> System for BoundsRenderSystem<S> {
    fn name(&self) -> &str {
        "render_bounds"
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> Result<()> {
        let collider = match self.collider {
            Some(key) => key,
            None => *self.collider.insert(ctx.component::<Collider>(COLLIDER)?),
        };

        let query = ctx.query(read(collider))?;
        let mut iter = ctx.world.iter(&query)?;
        while let Some((_, c)) = iter.next() {
            self.sink.draw_bounds(c.bounds, c.collided_this_frame);
        }
        Ok(())
    }
}

/// Draws textured sprites at their transform
pub struct SpriteRenderSystem<S: RenderSink> {
    sink: S,
    keys: Option<(ComponentKey<Transform>, ComponentKey<Sprite>)>,
}

impl<S: RenderSink> SpriteRenderSystem<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, keys: None }
    }
}

impl<S: RenderSink> System for SpriteRenderSystem<S> {
    fn name(&self) -> &str {
        "render_sprites"
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> Result<()> {
        let (transform, sprite) = match self.keys {
            Some(keys) => keys,
            None => *self.keys.insert((
                ctx.component::<Transform>(TRANSFORM)?,
                ctx.component::<Sprite>(SPRITE)?,
            )),
        };

        let query = ctx.query((read(transform), read(sprite)))?;
        let mut iter = ctx.world.iter(&query)?;
        while let Some((_, (t, s))) = iter.next() {
            let size = s.scaled_size(t);
            let area = Rect::new(t.position.x, t.position.y, size.x, size.y);
            self.sink.draw_sprite(&s.texture.name, area);
        }
        Ok(())
    }
}
