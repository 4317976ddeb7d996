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
//! Pooled engine tests

use std::cell::Cell;
use std::rc::Rc;

use ecs_runtime::ecs::{Component, Entity, EntityListener, Family, Poolable, PooledEngine};
use ecs_runtime::pool::{EnginePoolConfig, PoolConfig};
use ecs_runtime::signal::{Listener, Signal};

#[derive(Default)]
struct Position {
    x: f64,
}
impl Component for Position {}

#[derive(Default)]
struct Spy {
    value: i32,
    recycled: bool,
}

impl Component for Spy {}

impl Poolable for Spy {
    fn reset(&mut self) {
        self.value = 0;
        self.recycled = true;
    }
}

#[derive(Default)]
struct SignalCounter {
    calls: Cell<usize>,
}

impl Listener<Entity> for SignalCounter {
    fn receive(&self, _signal: &Signal<Entity>, _entity: &Entity) {
        self.calls.set(self.calls.get() + 1);
    }
}

#[test]
fn test_reset_entity_correctly() {
    let engine = PooledEngine::new();
    let members = engine.get_entities_for(&Family::all::<(Position,)>().get());
    let added = Rc::new(SignalCounter::default());
    let removed = Rc::new(SignalCounter::default());
    let total = 10;

    let entities: Vec<Entity> = (0..total)
        .map(|_| {
            let entity = engine.create_entity();
            entity.set_flags(5);
            entity.component_added().add(added.clone());
            entity.component_removed().add(removed.clone());
            entity.add(Position::default());
            engine.add_entity(&entity).unwrap();
            assert_eq!(entity.component_count(), 1);
            assert!(!entity.family_bits().is_empty());
            assert!(members.contains(&entity));
            entity
        })
        .collect();

    assert_eq!(added.calls.get(), total);
    assert_eq!(removed.calls.get(), 0);

    engine.remove_all_entities();
    assert_eq!(added.calls.get(), total);
    assert_eq!(removed.calls.get(), total);

    for entity in &entities {
        assert!(!entity.is_removing());
        assert_eq!(entity.flags(), 0);
        assert_eq!(entity.component_count(), 0);
        assert!(entity.family_bits().is_empty());
        assert!(!members.contains(entity));
        assert_eq!(entity.component_added().listener_count(), 0);
        assert_eq!(entity.component_removed().listener_count(), 0);
    }
}

#[test]
fn test_removal_listener_sees_components() {
    struct RequiresPosition {
        checked: Cell<usize>,
    }

    impl EntityListener for RequiresPosition {
        fn entity_added(&self, _entity: &Entity) {}

        fn entity_removed(&self, entity: &Entity) {
            assert_eq!(entity.get::<Position>().map(|p| p.x), Some(1.0));
            self.checked.set(self.checked.get() + 1);
        }
    }

    let engine = PooledEngine::new();
    let listener = Rc::new(RequiresPosition {
        checked: Cell::new(0),
    });
    engine.add_entity_listener_for(&Family::all::<(Position,)>().get(), 0, listener.clone());

    for _ in 0..4 {
        let entity = engine.create_entity();
        entity.add(Position { x: 1.0 });
        engine.add_entity(&entity).unwrap();
    }
    engine.remove_all_entities();
    assert_eq!(listener.checked.get(), 4);
}

#[test]
fn test_recycle_entity() {
    let count = 5;
    let config = EnginePoolConfig::default()
        .with_entities(PoolConfig::new(count, 100))
        .with_components(PoolConfig::new(0, 100));
    let engine = PooledEngine::with_config(config);

    let entities: Vec<Entity> = (0..count)
        .map(|_| {
            let entity = engine.create_entity();
            assert!(!entity.is_removing());
            assert_eq!(entity.flags(), 0);
            engine.add_entity(&entity).unwrap();
            entity.set_flags(1);
            entity
        })
        .collect();

    for entity in &entities {
        engine.remove_entity(entity);
        assert_eq!(entity.flags(), 0);
        assert!(!entity.is_removing());
    }

    for _ in 0..count {
        let entity = engine.create_entity();
        assert_eq!(entity.flags(), 0);
        assert!(entities.contains(&entity));
    }
    assert_eq!(engine.entity_pool_stats().hits, count);
}

#[test]
fn test_remove_entity_twice() {
    let engine = PooledEngine::new();
    for _ in 0..20 {
        let entities: Vec<Entity> = (0..50)
            .map(|_| {
                let entity = engine.create_entity();
                engine.add_entity(&entity).unwrap();
                assert_eq!(entity.flags(), 0);
                entity.set_flags(1);
                entity
            })
            .collect();

        for entity in &entities {
            engine.remove_entity(entity);
            engine.remove_entity(entity);
        }
    }
    assert!(engine.entities().is_empty());
    assert!(engine.entity_pool_stats().pool_size <= 100);
}

#[test]
fn test_recycle_component() {
    let max = 10;
    let config = EnginePoolConfig::default()
        .with_entities(PoolConfig::new(max, max))
        .with_components(PoolConfig::new(max, max));
    let engine = PooledEngine::with_config(config);

    for _ in 0..max {
        let entity = engine.create_entity();
        let component = engine.obtain_component::<Spy>();
        assert!(!component.recycled);
        entity.add_boxed(component);
        engine.add_entity(&entity).unwrap();
    }
    engine.remove_all_entities();

    for _ in 0..max {
        let entity = engine.create_entity();
        let component = engine.obtain_component::<Spy>();
        assert!(component.recycled);
        entity.add_boxed(component);
    }
    let stats = engine.component_pool_stats::<Spy>().unwrap();
    assert_eq!(stats.hits, max);
    assert_eq!(stats.misses, max);
}

#[test]
fn test_replacing_component_returns_old_one_to_pool() {
    let engine = PooledEngine::new();
    let mut first = engine.obtain_component::<Spy>();
    first.value = 1;
    let mut second = engine.obtain_component::<Spy>();
    second.value = 2;

    let entity = engine.create_entity();
    entity.add_boxed(first);
    entity.add_boxed(second);

    assert_eq!(entity.component_count(), 1);
    assert_eq!(entity.get::<Spy>().unwrap().value, 2);
    assert_eq!(engine.component_pool_stats::<Spy>().unwrap().pool_size, 1);

    let recycled = engine.obtain_component::<Spy>();
    assert!(recycled.recycled);
    assert_eq!(recycled.value, 0);
}

#[test]
fn test_removed_component_returns_to_pool_exactly_once() {
    let engine = PooledEngine::new();
    let entity = engine.create_entity();
    entity.add_boxed(engine.obtain_component::<Spy>());
    assert!(entity.remove::<Spy>());
    assert!(!entity.remove::<Spy>());
    assert_eq!(engine.component_pool_stats::<Spy>().unwrap().pool_size, 1);

    let a = engine.obtain_component::<Spy>();
    let b = engine.obtain_component::<Spy>();
    assert!(!std::ptr::eq(&*a, &*b));
    assert!(a.recycled);
    assert!(!b.recycled);
}

#[test]
fn test_taken_component_is_not_recycled() {
    let engine = PooledEngine::new();
    let entity = engine.create_entity();
    entity.add_boxed(engine.obtain_component::<Spy>());
    let taken = entity.take::<Spy>().unwrap();
    assert!(!taken.recycled);
    assert_eq!(engine.component_pool_stats::<Spy>().unwrap().pool_size, 0);
}

#[test]
fn test_create_component_uses_registered_pool() {
    let engine = PooledEngine::new();
    assert!(engine.create_component::<Position>().is_some());
    assert!(engine.component_pool_stats::<Position>().is_none());

    engine.register_component_pool::<Spy>();
    let entity = engine.create_entity();
    entity.add_boxed(engine.create_component::<Spy>().unwrap());
    entity.remove::<Spy>();
    assert!(engine.create_component::<Spy>().unwrap().recycled);
}

#[test]
fn test_create_component_before_registration_is_not_recycled() {
    let engine = PooledEngine::new();
    let entity = engine.create_entity();
    entity.add_boxed(engine.create_component::<Spy>().unwrap());
    entity.remove::<Spy>();
    assert!(engine.component_pool_stats::<Spy>().is_none());

    let fresh = engine.create_component::<Spy>().unwrap();
    assert!(!fresh.recycled);
}

#[test]
fn test_clear_pools() {
    let engine = PooledEngine::new();
    for _ in 0..3 {
        let entity = engine.create_entity();
        entity.add_boxed(engine.obtain_component::<Spy>());
        engine.add_entity(&entity).unwrap();
    }
    engine.remove_all_entities();
    assert_eq!(engine.entity_pool_stats().pool_size, 3);
    assert_eq!(engine.component_pool_stats::<Spy>().unwrap().pool_size, 3);

    engine.clear_pools();
    assert_eq!(engine.entity_pool_stats().pool_size, 0);
    assert_eq!(engine.component_pool_stats::<Spy>().unwrap().pool_size, 0);
}

#[cfg(feature = "serde")]
#[test]
fn test_pool_config_from_json() {
    let config: EnginePoolConfig =
        serde_json::from_str(r#"{ "entities": { "max_pool_size": 32 } }"#).unwrap();
    assert_eq!(config.entities.max_pool_size, 32);
    assert_eq!(config.entities.initial_capacity, 10);
    assert_eq!(config.components, PoolConfig::default());

    let json = serde_json::to_string(&config).unwrap();
    let parsed: EnginePoolConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}
