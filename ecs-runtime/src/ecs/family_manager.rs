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
//! Family membership caches and family listeners
//!
//! For every family that has been queried or listened to, the
//! [`FamilyManager`] keeps the list of matching entities up to date and
//! notifies listeners when an entity enters or leaves the family.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::bits::Bits;
use crate::ecs::entity_manager::EntityArray;
use crate::ecs::{Entity, Family};

/// Receives entity additions and removals
pub trait EntityListener {
    /// An entity was added (to the engine, or to a listened family)
    fn entity_added(&self, entity: &Entity);
    /// An entity was removed (from the engine, or from a listened family)
    fn entity_removed(&self, entity: &Entity);
}

struct FamilyEntry {
    family: Family,
    entities: EntityArray,
}

#[derive(Clone)]
struct ListenerRegistration {
    listener: Rc<dyn EntityListener>,
    family_index: usize,
    priority: i32,
}

/// Keeps per-family entity lists current and dispatches family listeners
pub struct FamilyManager {
    entities: EntityArray,
    families: RefCell<BTreeMap<usize, FamilyEntry>>,
    listeners: RefCell<Vec<ListenerRegistration>>,
    notifying: Cell<usize>,
}

// Depth counter that survives early returns and unwinding.
struct NotifyingGuard<'a>(&'a Cell<usize>);

impl<'a> NotifyingGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        NotifyingGuard(depth)
    }
}

impl Drop for NotifyingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl FamilyManager {
    /// Create a manager over the engine's entity list
    pub fn new(entities: EntityArray) -> Self {
        FamilyManager {
            entities,
            families: RefCell::new(BTreeMap::new()),
            listeners: RefCell::new(Vec::new()),
            notifying: Cell::new(0),
        }
    }

    /// Live list of the entities matching `family`.
    ///
    /// The first request for a family builds its cache by scanning every
    /// entity; later requests return the same shared list.
    pub fn get_entities_for(&self, family: &Family) -> EntityArray {
        if let Some(entry) = self.families.borrow().get(&family.index()) {
            return entry.entities.clone();
        }

        let entities = EntityArray::new();
        for entity in self.entities.iter() {
            if family.matches(&entity) {
                entities.push(entity.clone());
                entity.family_bits_mut().set(family.index());
            }
        }
        debug!(family = family.index(), matched = entities.len(), "built family cache");
        self.families.borrow_mut().insert(
            family.index(),
            FamilyEntry {
                family: family.clone(),
                entities: entities.clone(),
            },
        );
        entities
    }

    /// Register a listener for entities entering or leaving `family`.
    ///
    /// Listeners are notified in ascending priority order; equal priorities
    /// keep registration order.
    pub fn add_entity_listener(&self, family: &Family, priority: i32, listener: Rc<dyn EntityListener>) {
        self.get_entities_for(family);
        let mut listeners = self.listeners.borrow_mut();
        let position = listeners
            .iter()
            .position(|r| r.priority > priority)
            .unwrap_or(listeners.len());
        listeners.insert(
            position,
            ListenerRegistration {
                listener,
                family_index: family.index(),
                priority,
            },
        );
    }

    /// Remove every registration of `listener`, compared by identity
    pub fn remove_entity_listener<L: EntityListener + ?Sized>(&self, listener: &Rc<L>) {
        let target = Rc::as_ptr(listener) as *const ();
        self.listeners
            .borrow_mut()
            .retain(|r| Rc::as_ptr(&r.listener) as *const () != target);
    }

    /// Whether family listeners are being dispatched right now
    pub fn notifying(&self) -> bool {
        self.notifying.get() > 0
    }

    /// Re-evaluate `entity` against every cached family and notify the
    /// listeners of families it entered or left.
    ///
    /// An entity that is being removed matches no family. Listeners of left
    /// families run before listeners of entered families.
    pub fn update_family_membership(&self, entity: &Entity) {
        let mut entered = Bits::new();
        let mut left = Bits::new();
        {
            let families = self.families.borrow();
            let removing = entity.is_removing();
            let components = entity.component_bits();
            let mut membership = entity.family_bits_mut();
            for (&index, entry) in families.iter() {
                let belongs = membership.get(index);
                let matches = !removing && entry.family.matches_bits(&components);
                if belongs == matches {
                    continue;
                }
                if matches {
                    entry.entities.push(entity.clone());
                    membership.set(index);
                    entered.set(index);
                } else {
                    entry.entities.remove(entity);
                    membership.clear(index);
                    left.set(index);
                }
            }
        }

        if entered.is_empty() && left.is_empty() {
            return;
        }

        let registrations = self.listeners.borrow().clone();
        let _guard = NotifyingGuard::enter(&self.notifying);
        for registration in &registrations {
            if left.get(registration.family_index) {
                registration.listener.entity_removed(entity);
            }
        }
        for registration in &registrations {
            if entered.get(registration.family_index) {
                registration.listener.entity_added(entity);
            }
        }
    }

    /// Number of cached families
    pub fn family_count(&self) -> usize {
        self.families.borrow().len()
    }
}

impl fmt::Debug for FamilyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FamilyManager")
            .field("families", &self.family_count())
            .field("listeners", &self.listeners.borrow().len())
            .field("notifying", &self.notifying.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Component;

    struct ComponentA;
    impl Component for ComponentA {}
    struct ComponentB;
    impl Component for ComponentB {}

    struct Logger {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        notifying_seen: Rc<Cell<bool>>,
        manager: Rc<RefCell<Option<Rc<FamilyManager>>>>,
    }

    impl EntityListener for Logger {
        fn entity_added(&self, _entity: &Entity) {
            self.log.borrow_mut().push(format!("{}+", self.name));
            if let Some(manager) = self.manager.borrow().as_ref() {
                self.notifying_seen.set(manager.notifying());
            }
        }

        fn entity_removed(&self, _entity: &Entity) {
            self.log.borrow_mut().push(format!("{}-", self.name));
        }
    }

    struct Fixture {
        all: EntityArray,
        manager: Rc<FamilyManager>,
        log: Rc<RefCell<Vec<String>>>,
        notifying_seen: Rc<Cell<bool>>,
        slot: Rc<RefCell<Option<Rc<FamilyManager>>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let all = EntityArray::new();
            let manager = Rc::new(FamilyManager::new(all.clone()));
            let slot = Rc::new(RefCell::new(Some(manager.clone())));
            Fixture {
                all,
                manager,
                log: Rc::new(RefCell::new(Vec::new())),
                notifying_seen: Rc::new(Cell::new(false)),
                slot,
            }
        }

        fn logger(&self, name: &'static str) -> Rc<Logger> {
            Rc::new(Logger {
                name,
                log: self.log.clone(),
                notifying_seen: self.notifying_seen.clone(),
                manager: self.slot.clone(),
            })
        }

        fn register(&self, entity: &Entity) {
            self.all.push(entity.clone());
            self.manager.update_family_membership(entity);
        }
    }

    #[test]
    fn test_cache_built_from_existing_entities() {
        let fixture = Fixture::new();
        let e1 = Entity::new();
        e1.add(ComponentA);
        let e2 = Entity::new();
        fixture.register(&e1);
        fixture.register(&e2);

        let family = Family::all::<(ComponentA,)>().get();
        let members = fixture.manager.get_entities_for(&family);
        assert_eq!(members.to_vec(), vec![e1.clone()]);
        assert!(e1.family_bits().get(family.index()));
        assert!(members.ptr_eq(&fixture.manager.get_entities_for(&family)));
    }

    #[test]
    fn test_membership_follows_components() {
        let fixture = Fixture::new();
        let family = Family::all::<(ComponentA, ComponentB)>().get();
        let members = fixture.manager.get_entities_for(&family);
        let entity = Entity::new();
        fixture.register(&entity);

        entity.add(ComponentA);
        fixture.manager.update_family_membership(&entity);
        assert!(members.is_empty());

        entity.add(ComponentB);
        fixture.manager.update_family_membership(&entity);
        assert!(members.contains(&entity));

        entity.remove::<ComponentA>();
        fixture.manager.update_family_membership(&entity);
        assert!(members.is_empty());
        assert!(!entity.family_bits().get(family.index()));
    }

    #[test]
    fn test_removing_entity_leaves_every_family() {
        let fixture = Fixture::new();
        let family = Family::all::<(ComponentA,)>().get();
        let members = fixture.manager.get_entities_for(&family);
        let entity = Entity::new();
        entity.add(ComponentA);
        fixture.register(&entity);
        assert_eq!(members.len(), 1);

        entity.set_removing(true);
        fixture.manager.update_family_membership(&entity);
        assert!(members.is_empty());
    }

    #[test]
    fn test_listener_priority_order() {
        let fixture = Fixture::new();
        let family = Family::everything();
        fixture.manager.add_entity_listener(&family, 5, fixture.logger("late"));
        fixture.manager.add_entity_listener(&family, -3, fixture.logger("early"));
        fixture.manager.add_entity_listener(&family, 5, fixture.logger("later"));
        fixture.manager.add_entity_listener(&family, 0, fixture.logger("middle"));

        let entity = Entity::new();
        fixture.register(&entity);
        assert_eq!(
            *fixture.log.borrow(),
            vec!["early+", "middle+", "late+", "later+"]
        );
        assert!(fixture.notifying_seen.get());
        assert!(!fixture.manager.notifying());
        fixture.slot.borrow_mut().take();
    }

    #[test]
    fn test_removals_dispatched_before_additions() {
        let fixture = Fixture::new();
        let with_a = Family::all::<(ComponentA,)>().get();
        let with_b = Family::all::<(ComponentB,)>().get();
        fixture.manager.add_entity_listener(&with_b, 0, fixture.logger("b"));
        fixture.manager.add_entity_listener(&with_a, 0, fixture.logger("a"));

        let entity = Entity::new();
        entity.add(ComponentA);
        fixture.register(&entity);
        fixture.log.borrow_mut().clear();

        entity.remove::<ComponentA>();
        entity.add(ComponentB);
        fixture.manager.update_family_membership(&entity);
        assert_eq!(*fixture.log.borrow(), vec!["a-", "b+"]);
        fixture.slot.borrow_mut().take();
    }

    #[test]
    fn test_remove_listener() {
        let fixture = Fixture::new();
        let listener = fixture.logger("gone");
        let family = Family::everything();
        fixture.manager.add_entity_listener(&family, 0, listener.clone());
        fixture.manager.add_entity_listener(&family, 1, listener.clone());
        fixture.manager.remove_entity_listener(&listener);

        fixture.register(&Entity::new());
        assert!(fixture.log.borrow().is_empty());
        fixture.slot.borrow_mut().take();
    }
}
