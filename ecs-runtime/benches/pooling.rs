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
//! Benchmarks for memory pooling performance
//!
//! Measures entity churn (create, populate, register, remove) with and
//! without entity and component pooling.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ecs_runtime::ecs::{Component, Engine, Family, Poolable, PooledEngine};
use ecs_runtime::pool::{EnginePoolConfig, PoolConfig};

#[derive(Default)]
struct Position {
    x: f64,
    y: f64,
}

impl Component for Position {}

impl Poolable for Position {
    fn reset(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
    }
}

#[derive(Default)]
struct Velocity {
    x: f64,
    y: f64,
}

impl Component for Velocity {}

impl Poolable for Velocity {
    fn reset(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
    }
}

fn churn_plain(engine: &Engine, n: usize) {
    for i in 0..n {
        let entity = engine.create_entity();
        entity
            .add(Position { x: i as f64, y: 0.0 })
            .add(Velocity { x: 1.0, y: 0.0 });
        let _ = engine.add_entity(&entity);
    }
    engine.remove_all_entities();
}

fn churn_pooled(engine: &PooledEngine, n: usize) {
    for i in 0..n {
        let entity = engine.create_entity();
        let mut position = engine.obtain_component::<Position>();
        position.x = i as f64;
        let mut velocity = engine.obtain_component::<Velocity>();
        velocity.x = 1.0;
        entity.add_boxed(position).add_boxed(velocity);
        let _ = engine.add_entity(&entity);
    }
    engine.remove_all_entities();
}

fn bench_entity_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_churn");

    for n_entities in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("engine", n_entities), n_entities, |b, &n| {
            let engine = Engine::new();
            black_box(engine.get_entities_for(&Family::all::<(Position, Velocity)>().get()));
            b.iter(|| churn_plain(&engine, n));
        });

        group.bench_with_input(
            BenchmarkId::new("pooled_engine", n_entities),
            n_entities,
            |b, &n| {
                let config = EnginePoolConfig::default()
                    .with_entities(PoolConfig::new(n, n))
                    .with_components(PoolConfig::new(n, n));
                let engine = PooledEngine::with_config(config);
                black_box(engine.get_entities_for(&Family::all::<(Position, Velocity)>().get()));
                b.iter(|| churn_pooled(&engine, n));
            },
        );
    }

    group.finish();
}

fn bench_undersized_pools(c: &mut Criterion) {
    let mut group = c.benchmark_group("undersized_pools");

    for n_entities in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("max_16", n_entities), n_entities, |b, &n| {
            let config = EnginePoolConfig::default()
                .with_entities(PoolConfig::new(16, 16))
                .with_components(PoolConfig::new(16, 16));
            let engine = PooledEngine::with_config(config);
            b.iter(|| churn_pooled(&engine, n));
        });
    }

    group.finish();
}

fn bench_pool_stats_overhead(c: &mut Criterion) {
    let engine = PooledEngine::new();
    c.bench_function("churn_with_stats_check", |b| {
        b.iter(|| {
            churn_pooled(&engine, 100);
            black_box(engine.entity_pool_stats());
            black_box(engine.component_pool_stats::<Position>());
        });
    });
}

criterion_group!(
    benches,
    bench_entity_churn,
    bench_undersized_pools,
    bench_pool_stats_overhead,
);
criterion_main!(benches);
