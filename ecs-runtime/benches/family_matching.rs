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
//! Benchmarks for family matching and membership maintenance

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ecs_runtime::ecs::{Component, Engine, Entity, Family};

struct A;
impl Component for A {}
struct B;
impl Component for B {}
struct C;
impl Component for C {}
struct D;
impl Component for D {}

fn bench_family_matches(c: &mut Criterion) {
    let family = Family::all::<(A, B)>().one::<(C, D)>().get();
    let matching = Entity::new();
    matching.add(A).add(B).add(C);
    let missing = Entity::new();
    missing.add(A).add(C);

    c.bench_function("family_matches_hit", |b| {
        b.iter(|| black_box(family.matches(black_box(&matching))))
    });
    c.bench_function("family_matches_miss", |b| {
        b.iter(|| black_box(family.matches(black_box(&missing))))
    });
}

fn bench_family_lookup(c: &mut Criterion) {
    c.bench_function("family_builder_interned", |b| {
        b.iter(|| black_box(Family::all::<(A, B)>().exclude::<(D,)>().get()))
    });
}

fn bench_membership_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("membership_updates");

    for n_families in [1, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("toggle_component", n_families),
            n_families,
            |b, &n| {
                let engine = Engine::new();
                let families = [
                    Family::all::<(A,)>().get(),
                    Family::all::<(A, B)>().get(),
                    Family::one::<(A, C)>().get(),
                    Family::all::<(B,)>().exclude::<(A,)>().get(),
                    Family::all::<(A,)>().exclude::<(D,)>().get(),
                    Family::one::<(A, D)>().get(),
                    Family::all::<(A, B)>().one::<(C, D)>().get(),
                    Family::exclude::<(C,)>().get(),
                ];
                for family in families.iter().take(n) {
                    black_box(engine.get_entities_for(family));
                }
                let entity = Entity::new();
                entity.add(B);
                let _ = engine.add_entity(&entity);
                b.iter(|| {
                    entity.add(A);
                    entity.remove::<A>();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_family_matches,
    bench_family_lookup,
    bench_membership_updates,
);
criterion_main!(benches);
