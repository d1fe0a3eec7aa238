//! ECS Benchmarks
//!
//! Performance benchmarks for the archetype store

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mosaic_ecs::World;

#[derive(Clone)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Clone)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Clone)]
struct Health {
    current: f32,
    max: f32,
}

fn world_with_types() -> World {
    let mut world = World::new();
    world.register_component::<Position>();
    world.register_component::<Velocity>();
    world.register_component::<Health>();
    world
}

fn bench_entity_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_spawn");

    for count in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let mut world = world_with_types();
                for _ in 0..count {
                    black_box(world.spawn());
                }
                world
            });
        });
    }

    group.finish();
}

fn bench_entity_despawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_despawn");

    for count in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_batched(
                || {
                    let mut world = world_with_types();
                    let entities: Vec<_> = (0..count)
                        .map(|_| {
                            world
                                .spawn_with((Position { x: 0.0, y: 0.0, z: 0.0 },))
                                .unwrap()
                        })
                        .collect();
                    (world, entities)
                },
                |(mut world, entities)| {
                    for entity in entities {
                        world.despawn(entity).unwrap();
                    }
                    world
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_component_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("component_add");

    for count in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter_batched(
                || {
                    let mut world = world_with_types();
                    let entities: Vec<_> = (0..count).map(|_| world.spawn()).collect();
                    (world, entities)
                },
                |(mut world, entities)| {
                    for entity in entities {
                        world
                            .add_component(entity, Position { x: 0.0, y: 0.0, z: 0.0 })
                            .unwrap();
                    }
                    world
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_component_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("component_get");

    for count in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let mut world = world_with_types();
            let entities: Vec<_> = (0..count)
                .map(|_| {
                    world
                        .spawn_with((Position { x: 1.0, y: 2.0, z: 3.0 },))
                        .unwrap()
                })
                .collect();

            b.iter(|| {
                let mut sum = 0.0f32;
                for &entity in &entities {
                    if let Ok(pos) = world.get_component::<Position>(entity) {
                        sum += pos.x + pos.y + pos.z;
                    }
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn bench_query_for_each(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_for_each");

    for count in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let mut world = world_with_types();
            for i in 0..count {
                let entity = world
                    .spawn_with((
                        Position { x: i as f32, y: 0.0, z: 0.0 },
                        Velocity { x: 1.0, y: 1.0, z: 1.0 },
                    ))
                    .unwrap();
                // Half the entities also carry Health, splitting the rows
                // across two archetypes.
                if i % 2 == 0 {
                    world
                        .add_component(entity, Health { current: 100.0, max: 100.0 })
                        .unwrap();
                }
            }
            let descriptor = world
                .query_builder()
                .with_all::<Position>()
                .with_all::<Velocity>()
                .build()
                .unwrap();
            let query = world.get_query(descriptor);

            b.iter(|| {
                let mut sum = 0.0f32;
                world.for_each(query, |world, entity| {
                    let pos = world.get_component::<Position>(entity).unwrap();
                    sum += pos.x;
                });
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn bench_entity_valid_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_valid_check");

    let mut world = world_with_types();
    let entities: Vec<_> = (0..10000).map(|_| world.spawn()).collect();

    // Despawn every other entity
    for (i, &entity) in entities.iter().enumerate() {
        if i % 2 == 0 {
            world.despawn(entity).unwrap();
        }
    }

    group.bench_function("check_10000", |b| {
        b.iter(|| {
            let mut live_count = 0;
            for &entity in &entities {
                if world.is_valid(entity) {
                    live_count += 1;
                }
            }
            black_box(live_count)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_entity_spawn,
    bench_entity_despawn,
    bench_component_add,
    bench_component_get,
    bench_query_for_each,
    bench_entity_valid_check,
);

criterion_main!(benches);
