// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Benchmarks for the engine update loop
//!
//! Compares a plain iterating system against one that defers structural
//! changes every step, so the cost of the safe-point drain is visible.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ecs_runtime::ecs::{Component, Engine, Entity, Family};
use ecs_runtime::systems::{EntityProcessor, IteratingSystem, SortedIteratingSystem};

struct Position {
    x: f64,
    y: f64,
}
impl Component for Position {}

struct Velocity {
    x: f64,
    y: f64,
}
impl Component for Velocity {}

struct Marker;
impl Component for Marker {}

struct Movement;

impl EntityProcessor for Movement {
    fn process_entity(&mut self, _engine: &Engine, entity: &Entity, dt: f64) -> anyhow::Result<()> {
        let (vx, vy) = match entity.get::<Velocity>() {
            Some(v) => (v.x, v.y),
            None => return Ok(()),
        };
        if let Some(mut p) = entity.get_mut::<Position>() {
            p.x += vx * dt;
            p.y += vy * dt;
        }
        Ok(())
    }
}

/// Toggles a marker on every entity, forcing a deferred operation per entity
struct Toggle;

impl EntityProcessor for Toggle {
    fn process_entity(&mut self, _engine: &Engine, entity: &Entity, _dt: f64) -> anyhow::Result<()> {
        if entity.has::<Marker>() {
            entity.remove::<Marker>();
        } else {
            entity.add(Marker);
        }
        Ok(())
    }
}

fn populate(engine: &Engine, n: usize) {
    for i in 0..n {
        let entity = engine.create_entity();
        entity
            .add(Position { x: i as f64, y: 0.0 })
            .add(Velocity { x: 1.0, y: 0.5 });
        let _ = engine.add_entity(&entity);
    }
}

fn bench_iterating_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterating_update");

    for n_entities in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("movement", n_entities), n_entities, |b, &n| {
            let engine = Engine::new();
            engine.add_system(IteratingSystem::new(
                Family::all::<(Position, Velocity)>().get(),
                Movement,
            ));
            populate(&engine, n);
            b.iter(|| engine.update(black_box(0.016)));
        });
    }

    group.finish();
}

fn bench_deferred_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("deferred_update");

    for n_entities in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("toggle_marker", n_entities), n_entities, |b, &n| {
            let engine = Engine::new();
            engine.add_system(IteratingSystem::new(Family::all::<(Position,)>().get(), Toggle));
            black_box(engine.get_entities_for(&Family::all::<(Marker,)>().get()));
            populate(&engine, n);
            b.iter(|| engine.update(black_box(0.016)));
        });
    }

    group.finish();
}

fn bench_sorted_update(c: &mut Criterion) {
    c.bench_function("sorted_update_1000", |b| {
        let engine = Engine::new();
        engine.add_system(SortedIteratingSystem::new(
            Family::all::<(Position, Velocity)>().get(),
            |lhs: &Entity, rhs: &Entity| {
                let x = |e: &Entity| e.get::<Position>().map_or(0.0, |p| p.x);
                x(lhs).total_cmp(&x(rhs))
            },
            Movement,
        ));
        populate(&engine, 1000);
        b.iter(|| engine.update(black_box(0.016)));
    });
}

criterion_group!(
    benches,
    bench_iterating_update,
    bench_deferred_update,
    bench_sorted_update,
);
criterion_main!(benches);
