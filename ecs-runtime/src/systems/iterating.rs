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
//! Systems that process every entity of a family

use std::any::type_name;

use crate::ecs::{Engine, Entity, EntityArray, EntitySystem, Family};
use crate::systems::interval::IntervalAccumulator;

/// Per-entity logic run by an [`IteratingSystem`]
pub trait EntityProcessor: 'static {
    /// Called when the owning system is added to `engine`
    fn added_to_engine(&mut self, _engine: &Engine) {}

    /// Called when the owning system is removed from `engine`
    fn removed_from_engine(&mut self, _engine: &Engine) {}

    /// Called once per step before the first entity
    fn start_processing(&mut self, _engine: &Engine) -> anyhow::Result<()> {
        Ok(())
    }

    /// Process one entity of the family
    fn process_entity(&mut self, engine: &Engine, entity: &Entity, delta_time: f64) -> anyhow::Result<()>;

    /// Called once per step after the last entity
    fn end_processing(&mut self, _engine: &Engine) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Per-entity logic run by an [`IntervalIteratingSystem`] on every tick
pub trait IntervalEntityProcessor: 'static {
    /// Called when the owning system is added to `engine`
    fn added_to_engine(&mut self, _engine: &Engine) {}

    /// Called when the owning system is removed from `engine`
    fn removed_from_engine(&mut self, _engine: &Engine) {}

    /// Process one entity for the tick starting at `current_time`
    fn process_entity(
        &mut self,
        engine: &Engine,
        entity: &Entity,
        current_time: f64,
        interval: f64,
    ) -> anyhow::Result<()>;
}

/// A family and, while attached to an engine, its live entity list
#[derive(Debug, Clone)]
pub struct FamilyCursor {
    family: Family,
    entities: Option<EntityArray>,
}

impl FamilyCursor {
    /// Track `family`; nothing is tracked until [`FamilyCursor::attach`]
    pub fn new(family: Family) -> Self {
        FamilyCursor {
            family,
            entities: None,
        }
    }

    /// The tracked family
    pub fn family(&self) -> &Family {
        &self.family
    }

    /// Live list of the family's entities, empty while detached
    pub fn entities(&self) -> EntityArray {
        self.entities.clone().unwrap_or_default()
    }

    /// Start tracking the family's entities in `engine`
    pub fn attach(&mut self, engine: &Engine) {
        self.entities = Some(engine.get_entities_for(&self.family));
    }

    /// Stop tracking
    pub fn detach(&mut self) {
        self.entities = None;
    }

    /// Run `f` on every entity, stopping at the first error
    pub fn for_each<F>(&self, mut f: F) -> anyhow::Result<()>
    where
        F: FnMut(&Entity) -> anyhow::Result<()>,
    {
        if let Some(entities) = &self.entities {
            for entity in entities {
                f(&entity)?;
            }
        }
        Ok(())
    }
}

/// A system that processes every entity of a family each step
pub struct IteratingSystem<P: EntityProcessor> {
    cursor: FamilyCursor,
    processor: P,
    priority: i32,
    enabled: bool,
}

impl<P: EntityProcessor> IteratingSystem<P> {
    /// Run `processor` on every entity of `family`
    pub fn new(family: Family, processor: P) -> Self {
        IteratingSystem {
            cursor: FamilyCursor::new(family),
            processor,
            priority: 0,
            enabled: true,
        }
    }

    /// Set the execution priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Enable or disable the system
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// The processed family
    pub fn family(&self) -> &Family {
        self.cursor.family()
    }

    /// Live list of the processed entities
    pub fn entities(&self) -> EntityArray {
        self.cursor.entities()
    }

    /// The wrapped processor
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// The wrapped processor, mutably
    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }
}

impl<P: EntityProcessor> EntitySystem for IteratingSystem<P> {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn added_to_engine(&mut self, engine: &Engine) {
        self.cursor.attach(engine);
        self.processor.added_to_engine(engine);
    }

    fn removed_from_engine(&mut self, engine: &Engine) {
        self.cursor.detach();
        self.processor.removed_from_engine(engine);
    }

    fn step(&mut self, engine: &Engine, delta_time: f64) -> anyhow::Result<()> {
        self.processor.start_processing(engine)?;
        let processor = &mut self.processor;
        self.cursor
            .for_each(|entity| processor.process_entity(engine, entity, delta_time))?;
        self.processor.end_processing(engine)
    }

    fn name(&self) -> &str {
        type_name::<P>()
    }
}

/// A system that processes every entity of a family once per fixed interval
pub struct IntervalIteratingSystem<P: IntervalEntityProcessor> {
    cursor: FamilyCursor,
    timer: IntervalAccumulator,
    processor: P,
    priority: i32,
    enabled: bool,
}

impl<P: IntervalEntityProcessor> IntervalIteratingSystem<P> {
    /// Run `processor` on every entity of `family` each `interval` seconds
    pub fn new(family: Family, interval: f64, processor: P) -> Self {
        IntervalIteratingSystem {
            cursor: FamilyCursor::new(family),
            timer: IntervalAccumulator::new(interval),
            processor,
            priority: 0,
            enabled: true,
        }
    }

    /// Set the execution priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Enable or disable the system
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Length of one tick
    pub fn interval(&self) -> f64 {
        self.timer.interval()
    }

    /// The processed family
    pub fn family(&self) -> &Family {
        self.cursor.family()
    }

    /// Live list of the processed entities
    pub fn entities(&self) -> EntityArray {
        self.cursor.entities()
    }

    /// The wrapped processor
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// The wrapped processor, mutably
    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }
}

impl<P: IntervalEntityProcessor> EntitySystem for IntervalIteratingSystem<P> {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn added_to_engine(&mut self, engine: &Engine) {
        self.timer.set_current_time(engine.current_time());
        self.cursor.attach(engine);
        self.processor.added_to_engine(engine);
    }

    fn removed_from_engine(&mut self, engine: &Engine) {
        self.cursor.detach();
        self.processor.removed_from_engine(engine);
    }

    fn step(&mut self, engine: &Engine, delta_time: f64) -> anyhow::Result<()> {
        let cursor = &self.cursor;
        let processor = &mut self.processor;
        self.timer.advance(delta_time, |time, interval| {
            cursor.for_each(|entity| processor.process_entity(engine, entity, time, interval))
        })
    }

    fn name(&self) -> &str {
        type_name::<P>()
    }
}
