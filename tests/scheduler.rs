use std::sync::Arc;

use parking_lot::Mutex;
use scatter_ecs::builtin::{AssetRegistry, NoInput};
use scatter_ecs::event_bus::CustomEvent;
use scatter_ecs::executor::Executor;
use scatter_ecs::prelude::*;
use scatter_ecs::schedule::Schedule;
use scatter_ecs::system::Frame;

type Log = Arc<Mutex<Vec<String>>>;

fn recorder(log: &Log, name: &'static str) -> impl System {
    let log = log.clone();
    system_fn(name, move |_ctx: &mut SystemContext<'_>| {
        log.lock().push(name.to_string());
        Ok(())
    })
}

fn tick(executor: &mut Executor, world: &mut World) -> Result<()> {
    let assets = AssetRegistry::new();
    let frame = Frame::new(1.0 / 60.0, 800.0, 600.0, &assets, &NoInput);
    executor.tick(world, &frame)
}

#[test]
fn phases_run_in_order_and_init_once() {
    let log: Log = Arc::default();
    let schedule = Schedule::new()
        .with_system(Phase::Render, recorder(&log, "render"))
        .with_system(Phase::Update, recorder(&log, "update_a"))
        .with_system(Phase::Init, recorder(&log, "init"))
        .with_system(Phase::Update, recorder(&log, "update_b"));
    let mut executor = Executor::new(schedule);
    let mut world = World::new();

    tick(&mut executor, &mut world).unwrap();
    tick(&mut executor, &mut world).unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "init", "update_a", "update_b", "render", "update_a", "update_b", "render"
        ]
    );
    assert_eq!(world.tick(), 2);
}

#[test]
fn events_reach_later_systems_but_not_the_next_tick() {
    let seen: Arc<Mutex<Vec<usize>>> = Arc::default();
    let mut world = World::new();
    world.register_event("ping");

    let observed = seen.clone();
    let schedule = Schedule::new()
        .with_system(
            Phase::Update,
            system_fn("reader_before", move |ctx: &mut SystemContext<'_>| {
                assert!(ctx.read_events("ping")?.is_empty());
                Ok(())
            }),
        )
        .with_system(
            Phase::Update,
            system_fn("writer", |ctx: &mut SystemContext<'_>| {
                let tick = ctx.tick();
                ctx.create_event(
                    "ping",
                    Event::Custom(CustomEvent {
                        entity: None,
                        payload: serde_json::json!({ "tick": tick }),
                    }),
                )
            }),
        )
        .with_system(
            Phase::Render,
            system_fn("reader_after", move |ctx: &mut SystemContext<'_>| {
                observed.lock().push(ctx.read_events("ping")?.len());
                Ok(())
            }),
        );
    let mut executor = Executor::new(schedule);

    tick(&mut executor, &mut world).unwrap();
    tick(&mut executor, &mut world).unwrap();

    assert_eq!(*seen.lock(), vec![1, 1]);
    assert!(world.events().read_events("ping").unwrap().is_empty());
}

#[test]
fn unregistered_event_is_an_error() {
    let schedule = Schedule::new().with_system(
        Phase::Update,
        system_fn("writer", |ctx: &mut SystemContext<'_>| {
            ctx.create_event(
                "nobody-registered-this",
                Event::Custom(CustomEvent {
                    entity: None,
                    payload: serde_json::Value::Null,
                }),
            )
        }),
    );
    let mut executor = Executor::new(schedule);
    let mut world = World::new();

    let err = tick(&mut executor, &mut world).unwrap_err();
    assert_eq!(
        err,
        EcsError::EventNotRegistered("nobody-registered-this".to_string())
    );
    assert_eq!(world.tick(), 0);
}

#[test]
fn deferred_spawn_lands_before_the_next_system() {
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Marker(u32);

    let counts: Arc<Mutex<Vec<usize>>> = Arc::default();
    let mut world = World::new();
    let marker = world.register_component::<Marker>("Marker").unwrap();

    let observed = counts.clone();
    let schedule = Schedule::new()
        .with_system(
            Phase::Update,
            system_fn("spawner", move |ctx: &mut SystemContext<'_>| {
                ctx.spawn("Marked", ComponentList::new().with(marker, Marker(7)));
                // Not yet applied
                let query = ctx.query(read(marker))?;
                assert_eq!(ctx.world().count(&query), ctx.tick() as usize);
                Ok(())
            }),
        )
        .with_system(
            Phase::Update,
            system_fn("counter", move |ctx: &mut SystemContext<'_>| {
                let query = ctx.query(read(marker))?;
                observed.lock().push(ctx.world().count(&query));
                Ok(())
            }),
        );
    let mut executor = Executor::new(schedule);

    tick(&mut executor, &mut world).unwrap();
    tick(&mut executor, &mut world).unwrap();
    assert_eq!(*counts.lock(), vec![1, 2]);
}

#[test]
fn app_clamps_long_frames() {
    let deltas: Arc<Mutex<Vec<f32>>> = Arc::default();
    let mut app = App::new(EngineConfig::default()).unwrap();
    let observed = deltas.clone();
    app.add_system(
        Phase::Update,
        system_fn("delta", move |ctx: &mut SystemContext<'_>| {
            observed.lock().push(ctx.delta_time());
            Ok(())
        }),
    );

    app.run();
    app.step(1.0).unwrap();
    app.step(1.05).unwrap();
    app.step(3.0).unwrap();

    let deltas = deltas.lock();
    assert_eq!(deltas.len(), 3);
    assert_eq!(deltas[0], 0.0);
    assert!((deltas[1] - 0.05).abs() < 1e-4);
    assert_eq!(deltas[2], 0.1);
}
