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
//! Entity registration and deferred entity operations
//!
//! The [`EntityManager`] owns the engine's entity list. Additions and
//! removals requested while the engine is busy are queued and replayed in
//! strict FIFO order, so the net effect of a sequence such as remove-then-add
//! is exactly what the caller issued.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::ecs::{Entity, EntityId, EntityListener};
use crate::error::{EcsError, Result};

#[derive(Default)]
struct EntityList {
    items: Vec<Entity>,
    members: HashSet<EntityId>,
}

/// Shared, read-only view of an ordered entity list
///
/// The view is live: it observes every later change to the list it was
/// obtained from. Iteration is by index, so the list may change while it
/// is being walked.
#[derive(Clone, Default)]
pub struct EntityArray {
    inner: Rc<RefCell<EntityList>>,
}

impl EntityArray {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().items.is_empty()
    }

    /// Entity at `index`
    pub fn get(&self, index: usize) -> Option<Entity> {
        self.inner.borrow().items.get(index).cloned()
    }

    /// First entity
    pub fn first(&self) -> Option<Entity> {
        self.get(0)
    }

    /// Last entity
    pub fn last(&self) -> Option<Entity> {
        self.inner.borrow().items.last().cloned()
    }

    /// Whether `entity` is in the list
    pub fn contains(&self, entity: &Entity) -> bool {
        self.inner.borrow().members.contains(&entity.id())
    }

    /// Position of `entity` in the list
    pub fn index_of(&self, entity: &Entity) -> Option<usize> {
        let list = self.inner.borrow();
        if !list.members.contains(&entity.id()) {
            return None;
        }
        list.items.iter().position(|e| e == entity)
    }

    /// Copy of the current contents
    pub fn to_vec(&self) -> Vec<Entity> {
        self.inner.borrow().items.clone()
    }

    /// Iterate the live list by index
    pub fn iter(&self) -> EntityArrayIter {
        EntityArrayIter {
            array: self.clone(),
            index: 0,
        }
    }

    /// Whether both views share the same underlying list
    pub fn ptr_eq(&self, other: &EntityArray) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn push(&self, entity: Entity) {
        let mut list = self.inner.borrow_mut();
        if list.members.insert(entity.id()) {
            list.items.push(entity);
        }
    }

    pub(crate) fn remove(&self, entity: &Entity) -> bool {
        let mut list = self.inner.borrow_mut();
        if !list.members.remove(&entity.id()) {
            return false;
        }
        if let Some(index) = list.items.iter().position(|e| e == entity) {
            list.items.remove(index);
        }
        true
    }
}

impl fmt::Debug for EntityArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.inner.borrow().items.iter().map(Entity::id))
            .finish()
    }
}

impl<'a> IntoIterator for &'a EntityArray {
    type Item = Entity;
    type IntoIter = EntityArrayIter;

    fn into_iter(self) -> EntityArrayIter {
        self.iter()
    }
}

/// Index-based iterator over an [`EntityArray`]
pub struct EntityArrayIter {
    array: EntityArray,
    index: usize,
}

impl Iterator for EntityArrayIter {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let entity = self.array.get(self.index)?;
        self.index += 1;
        Some(entity)
    }
}

enum EntityOperation {
    Add(Entity),
    Remove(Entity),
    RemoveAll(EntityArray),
}

/// Owns the engine's entity list and its pending operation queue
pub struct EntityManager {
    entities: EntityArray,
    pending: RefCell<VecDeque<EntityOperation>>,
    pending_additions: RefCell<HashSet<EntityId>>,
    listener: Rc<dyn EntityListener>,
}

impl EntityManager {
    /// Create a manager that reports every effective addition and removal
    /// to `listener`
    pub fn new(listener: Rc<dyn EntityListener>) -> Self {
        EntityManager {
            entities: EntityArray::new(),
            pending: RefCell::new(VecDeque::new()),
            pending_additions: RefCell::new(HashSet::new()),
            listener,
        }
    }

    /// Register an entity, now or at the next safe point.
    ///
    /// Fails if the entity is already registered (and not about to be
    /// removed) or already queued for addition.
    pub fn add_entity(&self, entity: &Entity, delayed: bool) -> Result<()> {
        if delayed {
            let already_member =
                self.entities.contains(entity) && !entity.is_scheduled_for_removal();
            if already_member || self.pending_additions.borrow().contains(&entity.id()) {
                warn!(entity = %entity, "entity added twice");
                return Err(EcsError::EntityAlreadyAdded(entity.id()));
            }
            trace!(entity = %entity, "deferring entity addition");
            // The queued remove still runs first; a later remove must queue
            // again after this add.
            entity.set_scheduled_for_removal(false);
            self.pending_additions.borrow_mut().insert(entity.id());
            self.pending
                .borrow_mut()
                .push_back(EntityOperation::Add(entity.clone()));
            Ok(())
        } else {
            self.add_internal(entity)
        }
    }

    /// Unregister an entity, now or at the next safe point.
    ///
    /// Removing an entity that is not registered, or one already queued for
    /// removal, does nothing.
    pub fn remove_entity(&self, entity: &Entity, delayed: bool) {
        if delayed {
            if entity.is_scheduled_for_removal() {
                return;
            }
            trace!(entity = %entity, "deferring entity removal");
            entity.set_scheduled_for_removal(true);
            self.pending
                .borrow_mut()
                .push_back(EntityOperation::Remove(entity.clone()));
        } else {
            self.remove_internal(entity);
        }
    }

    /// Unregister every entity
    pub fn remove_all_entities(&self, delayed: bool) {
        self.remove_all_entities_in(self.entities.clone(), delayed);
    }

    /// Unregister every entity in `entities`.
    ///
    /// When delayed, the list is read again at replay time, so entities that
    /// joined it in the meantime are removed too.
    pub fn remove_all_entities_in(&self, entities: EntityArray, delayed: bool) {
        if delayed {
            for entity in entities.iter() {
                entity.set_scheduled_for_removal(true);
            }
            self.pending
                .borrow_mut()
                .push_back(EntityOperation::RemoveAll(entities));
        } else {
            self.remove_all_now(&entities);
        }
    }

    fn remove_all_now(&self, entities: &EntityArray) {
        while let Some(entity) = entities.first() {
            if !self.remove_internal(&entity) {
                // Not ours: the list would never shrink.
                break;
            }
        }
    }

    /// Live view of every registered entity
    pub fn entities(&self) -> EntityArray {
        self.entities.clone()
    }

    /// Whether any operation is queued
    pub fn has_pending_operations(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    /// Replay queued operations in FIFO order until the queue is empty.
    ///
    /// Every queued operation is applied even if one fails; the first
    /// failure is returned.
    pub fn process_pending_operations(&self) -> Result<()> {
        let mut outcome = Ok(());
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(operation) = next else { break };
            match operation {
                EntityOperation::Add(entity) => {
                    self.pending_additions.borrow_mut().remove(&entity.id());
                    if let Err(err) = self.add_internal(&entity) {
                        if outcome.is_ok() {
                            outcome = Err(err);
                        }
                    }
                }
                EntityOperation::Remove(entity) => {
                    if !self.remove_internal(&entity) {
                        entity.set_scheduled_for_removal(false);
                    }
                }
                EntityOperation::RemoveAll(entities) => self.remove_all_now(&entities),
            }
        }
        outcome
    }

    fn add_internal(&self, entity: &Entity) -> Result<()> {
        if self.entities.contains(entity) {
            warn!(entity = %entity, "entity added twice");
            return Err(EcsError::EntityAlreadyAdded(entity.id()));
        }
        self.entities.push(entity.clone());
        self.listener.entity_added(entity);
        Ok(())
    }

    fn remove_internal(&self, entity: &Entity) -> bool {
        if !self.entities.remove(entity) {
            return false;
        }
        entity.set_scheduled_for_removal(false);
        entity.set_removing(true);
        self.listener.entity_removed(entity);
        entity.set_removing(false);
        true
    }
}

impl fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("entities", &self.entities.len())
            .field("pending", &self.pending.borrow().len())
            .finish()
    }
}
