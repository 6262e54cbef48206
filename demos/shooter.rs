//! Headless side-scrolling shooter
//!
//! A player ship moves and fires, enemies spawn on a timer and fire back,
//! bullets fly off-stage and are cleaned up. The collision pipeline flags
//! overlapping colliders and the bounds renderer records what a host would
//! draw. Input is scripted so runs are reproducible.
//!
//! Run with `RUST_LOG=debug cargo run --example shooter` for engine logs.

use glam::Vec2;
use scatter_ecs::app::App;
use scatter_ecs::builtin::{
    AssetRegistry, BoundsRenderSystem, DrawCall, KeyCode, RecordingSink, Sprite,
    SpriteRenderSystem, Transform, Velocity, SPRITE, TRANSFORM, VELOCITY,
};
use scatter_ecs::collision::{Collider, CollisionPipeline, COLLIDER};
use scatter_ecs::component::{ComponentKey, ComponentList};
use scatter_ecs::config::EngineConfig;
use scatter_ecs::entity::EntityId;
use scatter_ecs::observer::LoggingObserver;
use scatter_ecs::error::Result;
use scatter_ecs::plugin::{CollisionPlugin, Plugin};
use scatter_ecs::query::{read, write};
use scatter_ecs::schedule::Phase;
use scatter_ecs::system::{system_fn, System, SystemContext};
use scatter_ecs::time::{Timer, TimerMode};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PLAYER_SHIP: &str = "player-ship";
const ENEMY_SHIP: &str = "enemy-ship";
const PLAYER_BULLET: &str = "player-bullet";

const FRAMES: u32 = 600;
const PLAYER_SPEED: f32 = 300.0;
const MAX_ENEMIES: u32 = 10;

struct Player {
    score: u32,
}

#[allow(dead_code)]
struct Bullet {
    owner: EntityId,
}

struct BulletShooter {
    delay: Timer,
    offset: Vec2,
}

struct Enemy;

struct RemoveOnOutside;

#[derive(Clone, Copy)]
struct Keys {
    transform: ComponentKey<Transform>,
    velocity: ComponentKey<Velocity>,
    sprite: ComponentKey<Sprite>,
    collider: ComponentKey<Collider>,
    player: ComponentKey<Player>,
    enemy: ComponentKey<Enemy>,
    bullet: ComponentKey<Bullet>,
    shooter: ComponentKey<BulletShooter>,
    remove_on_outside: ComponentKey<RemoveOnOutside>,
}

impl Keys {
    fn register(app: &mut App) -> Result<Self> {
        let world = app.world_mut();
        Ok(Self {
            transform: world.register_component(TRANSFORM)?,
            velocity: world.register_component(VELOCITY)?,
            sprite: world.register_component(SPRITE)?,
            collider: world.register_component(COLLIDER)?,
            player: world.register_component("@my/Player")?,
            enemy: world.register_component("@my/Enemy")?,
            bullet: world.register_component("@my/Bullet")?,
            shooter: world.register_component("@my/BulletShooter")?,
            remove_on_outside: world.register_component("@my/RemoveOnOutside")?,
        })
    }

    fn bullet_components(
        &self,
        owner: EntityId,
        sprite: Sprite,
        at: Vec2,
        scale: f32,
        speed: f32,
    ) -> ComponentList {
        let size = Vec2::new(sprite.texture.width, sprite.texture.height) * scale;
        ComponentList::new()
            .with(self.sprite, sprite)
            .with(self.transform, Transform::from_position(at).with_scale(scale))
            .with(self.velocity, Velocity::new(speed, 0.0))
            .with(self.remove_on_outside, RemoveOnOutside)
            .with(self.bullet, Bullet { owner })
            .with(self.collider, Collider::new(size.x, size.y))
    }
}

/// Deterministic generator for enemy placement
struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 40) as f32 / (1u64 << 24) as f32
    }
}

struct EnemySpawner {
    keys: Keys,
    timer: Timer,
    spawned: u32,
    rng: Lcg,
}

impl System for EnemySpawner {
    fn name(&self) -> &str {
        "enemy_spawn"
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> Result<()> {
        self.timer.tick(ctx.delta_time());
        if !self.timer.segment_finished() || self.spawned >= MAX_ENEMIES {
            return Ok(());
        }
        self.spawned += 1;

        let texture = ctx.assets.require_texture(ENEMY_SHIP)?.clone();
        let scale = 0.3;
        let position = Vec2::new(
            self.rng.next_f32() * (ctx.stage_width() - 200.0) + 200.0,
            self.rng.next_f32() * (ctx.stage_height() - 60.0) + 30.0,
        );
        let size = Vec2::new(texture.width, texture.height) * scale;
        let keys = self.keys;
        ctx.spawn(
            "Enemy",
            ComponentList::new()
                .with(keys.transform, Transform::from_position(position).with_scale(scale))
                .with(keys.sprite, Sprite::new(texture))
                .with(keys.enemy, Enemy)
                .with(
                    keys.shooter,
                    BulletShooter {
                        delay: Timer::new(0.3, TimerMode::Once),
                        offset: Vec2::new(-size.x, size.y / 2.0),
                    },
                )
                .with(keys.collider, Collider::new(size.x, size.y)),
        );
        Ok(())
    }
}

struct ShooterPlugin {
    sink: RecordingSink,
}

impl Plugin for ShooterPlugin {
    fn name(&self) -> &str {
        "ShooterPlugin"
    }

    fn build(&self, app: &mut App) -> Result<()> {
        let keys = Keys::register(app)?;

        app.add_system(
            Phase::Init,
            system_fn("create_player", move |ctx: &mut SystemContext<'_>| {
                let texture = ctx.assets.require_texture(PLAYER_SHIP)?.clone();
                let scale = 0.5;
                let offset = Vec2::new(texture.width / 2.0, texture.height / 4.0);
                let size = Vec2::new(texture.width, texture.height) * scale;
                ctx.spawn(
                    "Player",
                    ComponentList::new()
                        .with(keys.transform, Transform::from_xy(100.0, 100.0).with_scale(scale))
                        .with(keys.sprite, Sprite::new(texture))
                        .with(keys.player, Player { score: 0 })
                        .with(
                            keys.shooter,
                            BulletShooter {
                                delay: Timer::new(0.1, TimerMode::Once),
                                offset,
                            },
                        )
                        .with(keys.collider, Collider::new(size.x, size.y)),
                );
                Ok(())
            }),
        );

        app.add_system(
            Phase::Update,
            system_fn("player_move", move |ctx: &mut SystemContext<'_>| {
                let mut direction = Vec2::ZERO;
                for (key, step) in [
                    (KeyCode::Left, Vec2::NEG_X),
                    (KeyCode::Right, Vec2::X),
                    (KeyCode::Up, Vec2::NEG_Y),
                    (KeyCode::Down, Vec2::Y),
                ] {
                    if ctx.input.is_pressed(key) {
                        direction += step;
                    }
                }
                let offset = direction * PLAYER_SPEED * ctx.delta_time();

                let world = ctx.world();
                let query = world.query((write(keys.transform), read(keys.player)))?;
                let mut iter = world.iter(&query)?;
                while let Some((_, (transform, _))) = iter.next() {
                    transform.translate(offset);
                }
                Ok(())
            }),
        );

        app.add_system(
            Phase::Update,
            system_fn("player_shoot", move |ctx: &mut SystemContext<'_>| {
                let texture = ctx.assets.require_texture(PLAYER_BULLET)?.clone();
                let delta = ctx.delta_time();
                let firing = ctx.input.is_pressed(KeyCode::Space);

                let world = ctx.world();
                let query = world.query((
                    read(keys.transform),
                    write(keys.shooter),
                    read(keys.player),
                ))?;
                let mut iter = world.iter(&query)?;
                while let Some((shooter, (transform, gun, _))) = iter.next() {
                    gun.delay.tick(delta);
                    if !gun.delay.finished() || !firing {
                        continue;
                    }
                    gun.delay.reset();
                    let at = transform.position + gun.offset;
                    let sprite = Sprite::new(texture.clone());
                    let bullet = keys.bullet_components(shooter, sprite, at, 1.0, 700.0);
                    ctx.commands.spawn("Bullet", bullet);
                }
                Ok(())
            }),
        );

        app.add_system(
            Phase::Update,
            EnemySpawner {
                keys,
                timer: Timer::new(0.03, TimerMode::Infinite),
                spawned: 0,
                rng: Lcg(0x5eed),
            },
        );

        app.add_system(
            Phase::Update,
            system_fn("enemy_shoot", move |ctx: &mut SystemContext<'_>| {
                let texture = ctx.assets.require_texture(PLAYER_BULLET)?.clone();
                let delta = ctx.delta_time();

                let world = ctx.world();
                let query = world.query((
                    read(keys.transform),
                    write(keys.shooter),
                    read(keys.enemy),
                ))?;
                let mut iter = world.iter(&query)?;
                while let Some((shooter, (transform, gun, _))) = iter.next() {
                    gun.delay.tick(delta);
                    if !gun.delay.finished() {
                        continue;
                    }
                    gun.delay.reset();
                    let at = transform.position + gun.offset;
                    let sprite = Sprite::new(texture.clone());
                    let bullet = keys.bullet_components(shooter, sprite, at, 0.3, -500.0);
                    ctx.commands.spawn("Bullet", bullet);
                }
                Ok(())
            }),
        );

        app.add_system(
            Phase::Update,
            system_fn("velocity", move |ctx: &mut SystemContext<'_>| {
                let delta = ctx.delta_time();
                let world = ctx.world();
                let query = world.query((read(keys.velocity), write(keys.transform)))?;
                let mut iter = world.iter(&query)?;
                while let Some((_, (velocity, transform))) = iter.next() {
                    transform.translate(velocity.step(delta));
                }
                Ok(())
            }),
        );

        app.add_plugin(CollisionPlugin)?;

        app.add_system(
            Phase::Update,
            system_fn("score", move |ctx: &mut SystemContext<'_>| {
                let world = ctx.world();
                let hits = ctx.events.collisions().count() as u32;
                if hits == 0 {
                    return Ok(());
                }
                let query = world.query(write(keys.player))?;
                let mut iter = world.iter(&query)?;
                while let Some((_, player)) = iter.next() {
                    player.score += hits;
                }
                Ok(())
            }),
        );

        app.add_system(
            Phase::Update,
            system_fn("clear_outside", move |ctx: &mut SystemContext<'_>| {
                let (width, height) = (ctx.stage_width(), ctx.stage_height());
                let world = ctx.world();
                let query = world.query((
                    read(keys.transform),
                    read(keys.sprite),
                    read(keys.remove_on_outside),
                ))?;
                let mut iter = world.iter(&query)?;
                while let Some((entity, (transform, sprite, _))) = iter.next() {
                    let p = transform.position;
                    if p.x + sprite.texture.width < 0.0
                        || p.x > width
                        || p.y + sprite.texture.height < 0.0
                        || p.y > height
                    {
                        ctx.commands.despawn(entity);
                    }
                }
                Ok(())
            }),
        );

        app.add_system(Phase::Render, SpriteRenderSystem::new(self.sink.clone()));
        app.add_system(Phase::Render, BoundsRenderSystem::new(self.sink.clone()));
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut assets = AssetRegistry::new();
    assets
        .add_texture(PLAYER_SHIP, 99.0, 75.0)
        .add_texture(ENEMY_SHIP, 93.0, 84.0)
        .add_texture(PLAYER_BULLET, 13.0, 37.0);

    let config = EngineConfig::default();
    let mut app = App::with_assets(config, assets, &[PLAYER_SHIP, ENEMY_SHIP, PLAYER_BULLET])?;
    // Spawns and despawns show up with RUST_LOG=debug
    app.world_mut().add_observer(Box::new(LoggingObserver));
    let sink = RecordingSink::new();
    app.add_plugin(ShooterPlugin { sink: sink.clone() })?;

    app.run();
    let mut collided_draws = 0usize;
    for frame in 0..FRAMES {
        let input = app.input_mut();
        input.press(KeyCode::Space);
        if (frame / 90) % 2 == 0 {
            input.release(KeyCode::Up);
            input.press(KeyCode::Down);
        } else {
            input.release(KeyCode::Down);
            input.press(KeyCode::Up);
        }

        app.step(frame as f64 / 60.0)?;

        collided_draws += sink
            .take()
            .iter()
            .filter(|call| matches!(call, DrawCall::Bounds { collided: true, .. }))
            .count();

        if frame % 120 == 0 {
            info!(
                frame,
                entities = app.world().entity_count(),
                fps = app.fps(),
                "shooter running"
            );
        }
    }

    // One more frame from the paused state
    app.pause();
    app.single_step()?;
    let world = app.world();
    let (stats, last_pairs) = world
        .resource::<CollisionPipeline>()
        .map(|pipeline| (pipeline.stats(), pipeline.pairs().len()))
        .unwrap_or_default();
    let player = world.component::<Player>("@my/Player")?;
    let mut score = 0;
    let query = world.query(read(player))?;
    let mut iter = world.view().iter(&query)?;
    while let Some((_, player)) = iter.next() {
        score = player.score;
    }

    info!(
        ticks = world.tick(),
        score,
        entities = world.entity_count(),
        collided_draws,
        last_pairs,
        ?stats,
        "shooter finished"
    );
    Ok(())
}
