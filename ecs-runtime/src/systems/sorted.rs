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
//! Family processing in comparator order
//!
//! [`SortedFamily`] re-sorts lazily: only after the family's membership
//! changed or [`SortedFamily::force_sort`] was called. Changes to the
//! component values the comparator reads are not observed; call
//! `force_sort` after them.

use std::any::type_name;
use std::cell::Cell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::ecs::{Engine, Entity, EntityArray, EntityListener, EntitySystem, Family};
use crate::systems::iterating::EntityProcessor;

struct MembershipWatch {
    dirty: Rc<Cell<bool>>,
}

impl EntityListener for MembershipWatch {
    fn entity_added(&self, _entity: &Entity) {
        self.dirty.set(true);
    }

    fn entity_removed(&self, _entity: &Entity) {
        self.dirty.set(true);
    }
}

/// A family's entities kept in comparator order
pub struct SortedFamily<C> {
    family: Family,
    comparator: C,
    sorted: Vec<Entity>,
    dirty: Rc<Cell<bool>>,
    watch: Rc<MembershipWatch>,
    source: Option<EntityArray>,
}

impl<C> SortedFamily<C>
where
    C: FnMut(&Entity, &Entity) -> Ordering,
{
    /// Keep `family` sorted by `comparator`
    pub fn new(family: Family, comparator: C) -> Self {
        let dirty = Rc::new(Cell::new(true));
        SortedFamily {
            family,
            comparator,
            sorted: Vec::new(),
            watch: Rc::new(MembershipWatch {
                dirty: dirty.clone(),
            }),
            dirty,
            source: None,
        }
    }

    /// The sorted family
    pub fn family(&self) -> &Family {
        &self.family
    }

    /// Start following the family in `engine`
    pub fn attach(&mut self, engine: &Engine) {
        self.source = Some(engine.get_entities_for(&self.family));
        engine.add_entity_listener_for(&self.family, 0, self.watch.clone());
        self.dirty.set(true);
    }

    /// Stop following the family in `engine`
    pub fn detach(&mut self, engine: &Engine) {
        engine.remove_entity_listener(&self.watch);
        self.source = None;
        self.sorted.clear();
        self.dirty.set(true);
    }

    /// Re-sort before the next access
    pub fn force_sort(&mut self) {
        self.dirty.set(true);
    }

    /// Whether the next access re-sorts
    pub fn needs_sort(&self) -> bool {
        self.dirty.get()
    }

    /// The family's entities in comparator order, sorting first if needed
    pub fn entities(&mut self) -> &[Entity] {
        if self.dirty.replace(false) {
            self.sorted = self.source.as_ref().map(EntityArray::to_vec).unwrap_or_default();
            self.sorted.sort_by(&mut self.comparator);
        }
        &self.sorted
    }
}

/// A system that processes a family's entities in comparator order
pub struct SortedIteratingSystem<P, C>
where
    P: EntityProcessor,
    C: FnMut(&Entity, &Entity) -> Ordering + 'static,
{
    sorted: SortedFamily<C>,
    processor: P,
    priority: i32,
    enabled: bool,
}

impl<P, C> SortedIteratingSystem<P, C>
where
    P: EntityProcessor,
    C: FnMut(&Entity, &Entity) -> Ordering + 'static,
{
    /// Run `processor` on `family` ordered by `comparator`
    pub fn new(family: Family, comparator: C, processor: P) -> Self {
        SortedIteratingSystem {
            sorted: SortedFamily::new(family, comparator),
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
        self.sorted.family()
    }

    /// The processed entities in order
    pub fn entities(&mut self) -> &[Entity] {
        self.sorted.entities()
    }

    /// Re-sort before the next step
    pub fn force_sort(&mut self) {
        self.sorted.force_sort();
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

impl<P, C> EntitySystem for SortedIteratingSystem<P, C>
where
    P: EntityProcessor,
    C: FnMut(&Entity, &Entity) -> Ordering + 'static,
{
    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn added_to_engine(&mut self, engine: &Engine) {
        self.sorted.attach(engine);
        self.processor.added_to_engine(engine);
    }

    fn removed_from_engine(&mut self, engine: &Engine) {
        self.sorted.detach(engine);
        self.processor.removed_from_engine(engine);
    }

    fn step(&mut self, engine: &Engine, delta_time: f64) -> anyhow::Result<()> {
        self.processor.start_processing(engine)?;
        for entity in self.sorted.entities() {
            self.processor.process_entity(engine, entity, delta_time)?;
        }
        self.processor.end_processing(engine)
    }

    fn name(&self) -> &str {
        type_name::<P>()
    }
}
