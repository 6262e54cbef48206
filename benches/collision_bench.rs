use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scatter_ecs::builtin::Transform;
use scatter_ecs::collision::{install, Collider, CollisionPipeline};
use scatter_ecs::prelude::*;

type Keys = (ComponentKey<Transform>, ComponentKey<Collider>);

fn populated_world(mode: NarrowPhaseMode, count: usize) -> (World, Keys) {
    let mut world = World::new();
    let config = EngineConfig {
        narrow_phase: mode,
        ..EngineConfig::default()
    };
    let keys = install(&mut world, &config).unwrap();

    let mut state: u64 = 42;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 40) as f32 / (1u64 << 24) as f32
    };
    for _ in 0..count {
        let list = ComponentList::new()
            .with(keys.0, Transform::from_xy(next() * 1600.0, next() * 1200.0))
            .with(keys.1, Collider::new(8.0 + next() * 24.0, 8.0 + next() * 24.0));
        world.spawn("Body", list).unwrap();
    }
    (world, keys)
}

fn run_pipeline(world: &mut World, keys: Keys) -> usize {
    let (view, events, resources) = world.split();
    let pairs = resources
        .expect_mut::<CollisionPipeline>()
        .unwrap()
        .run(view, events, keys.0, keys.1)
        .unwrap();
    events.clear();
    pairs
}

fn bench_narrow_phase_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("collision_pipeline");
    for count in [500usize, 2000] {
        for mode in [
            NarrowPhaseMode::PerEntity,
            NarrowPhaseMode::PerCell,
            NarrowPhaseMode::Parallel,
        ] {
            let (mut world, keys) = populated_world(mode, count);
            group.bench_with_input(
                BenchmarkId::new(format!("{mode:?}"), count),
                &count,
                |b, _| b.iter(|| black_box(run_pipeline(&mut world, keys))),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_narrow_phase_modes);
criterion_main!(benches);
