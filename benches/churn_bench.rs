//! Composition churn: entities repeatedly gain and lose components while
//! queries are registered, exercising edge caches and incremental query
//! cache updates.

use archetype_store::{Entity, Term, Terms, World};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");

    for component_count in [4usize, 8, 16] {
        group.bench_with_input(
            BenchmarkId::new("toggle", component_count),
            &component_count,
            |b, &component_count| {
                let mut world = World::new();
                let components: Vec<Entity> = (0..component_count)
                    .map(|_| world.new_component(8).unwrap())
                    .collect();
                for &component in &components {
                    world
                        .register_query(Terms::new([Term::with(component)]).unwrap())
                        .unwrap();
                }
                let entities: Vec<Entity> =
                    (0..256).map(|_| world.new_entity().unwrap()).collect();

                let mut step = 0usize;
                b.iter(|| {
                    for (n, &e) in entities.iter().enumerate() {
                        let component = components[(n + step) % components.len()];
                        if world.has(e, component) {
                            world.remove(e, component).unwrap();
                        } else {
                            world.add(e, component).unwrap();
                        }
                    }
                    step += 1;
                    black_box(world.archetype_count())
                });
            },
        );
    }

    group.finish();
}

fn bench_spawn_kill(c: &mut Criterion) {
    c.bench_function("spawn_kill_1k", |b| {
        let mut world = World::new();
        let health = world.new_component(4).unwrap();
        let mut entities = Vec::with_capacity(1_000);
        b.iter(|| {
            for _ in 0..1_000 {
                let e = world.new_entity().unwrap();
                world.set(e, health, &100u32.to_ne_bytes()).unwrap();
                entities.push(e);
            }
            for e in entities.drain(..) {
                world.kill(e).unwrap();
            }
        });
    });
}

fn bench_register_query(c: &mut Criterion) {
    let mut world = World::new();
    let components: Vec<Entity> = (0..12).map(|_| world.new_tag().unwrap()).collect();
    for mask in 1u32..(1 << 10) {
        let e = world.new_entity().unwrap();
        for (bit, &component) in components.iter().take(10).enumerate() {
            if mask & (1 << bit) != 0 {
                world.add(e, component).unwrap();
            }
        }
    }

    let narrow = Terms::new([Term::with(components[0]), Term::with(components[11])]).unwrap();
    let broad = Terms::new([Term::without(components[11])]).unwrap();

    c.bench_function("adhoc_query_narrowed", |b| {
        b.iter(|| black_box(world.query(&narrow).unwrap().count()))
    });
    c.bench_function("adhoc_query_full_scan", |b| {
        b.iter(|| black_box(world.query(&broad).unwrap().count()))
    });
}

criterion_group!(benches, bench_churn, bench_spawn_kill, bench_register_query);
criterion_main!(benches);
