// Built-in components, collaborators and systems

pub mod assets;
pub mod input;
pub mod render;
pub mod transform;

pub use assets::{AssetRegistry, AssetSource, TextureInfo};
pub use input::{Input, InputSource, KeyCode, KeyboardInput, NoInput};
pub use render::{
    BoundsRenderSystem, DrawCall, RecordingSink, RenderSink, Sprite, SpriteRenderSystem, SPRITE,
};
pub use transform::{Transform, Velocity, TRANSFORM, VELOCITY};
