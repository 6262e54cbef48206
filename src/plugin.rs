use tracing::debug;

use crate::app::App;
use crate::collision::{self, CollisionSystem};
use crate::error::Result;
use crate::schedule::Phase;

/// Plugin trait for modular application setup
pub trait Plugin {
    fn name(&self) -> &str;

    /// Register components, resources and systems with the app
    fn build(&self, app: &mut App) -> Result<()>;
}

/// Installs the collision pipeline and its update-phase system
#[derive(Debug, Default, Clone, Copy)]
pub struct CollisionPlugin;

impl Plugin for CollisionPlugin {
    fn name(&self) -> &str {
        "CollisionPlugin"
    }

    fn build(&self, app: &mut App) -> Result<()> {
        let config = app.config().clone();
        let (transform, collider) = collision::install(app.world_mut(), &config)?;
        debug!(?transform, ?collider, "collision components registered");
        app.add_system(Phase::Update, CollisionSystem::new());
        Ok(())
    }
}
