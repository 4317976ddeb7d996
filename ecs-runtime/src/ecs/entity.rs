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
//! Entity management
//!
//! An [`Entity`] is a shared handle to a bag of components, at most one per
//! component type. Handles are cheap to clone and compare by identity.
//!
//! Adding or removing a component updates the entity's component bitset
//! immediately. The matching `component_added` / `component_removed`
//! notification goes through the entity's operation handler when it belongs
//! to an engine, which may defer it to the next safe point; a free-standing
//! entity dispatches its signals directly.
//!
//! Borrows returned by [`Entity::get`] and [`Entity::get_mut`] must be
//! released before the entity's component set is changed.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bits::Bits;
use crate::ecs::component::{Component, ComponentType};
use crate::ecs::component_operations::ComponentOperationHandler;
use crate::pool::ComponentPools;
use crate::signal::Signal;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Create a new EntityId from a raw u64 value
    pub fn new(id: u64) -> Self {
        EntityId(id)
    }

    /// Get the raw u64 value
    pub fn raw(&self) -> u64 {
        self.0
    }

    fn next() -> Self {
        EntityId(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

#[derive(Default)]
struct ComponentSlots {
    bits: Bits,
    slots: Vec<Option<Box<dyn Component>>>,
    order: Vec<ComponentType>,
}

impl ComponentSlots {
    fn get(&self, component_type: ComponentType) -> Option<&(dyn Component + 'static)> {
        self.slots.get(component_type.index())?.as_deref()
    }

    fn get_mut(
        &mut self,
        component_type: ComponentType,
    ) -> Option<&mut (dyn Component + 'static)> {
        self.slots.get_mut(component_type.index())?.as_deref_mut()
    }

    fn insert(&mut self, component_type: ComponentType, component: Box<dyn Component>) {
        let index = component_type.index();
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        if self.slots[index].replace(component).is_none() {
            self.order.push(component_type);
            self.bits.set(index);
        }
    }

    fn take(&mut self, component_type: ComponentType) -> Option<Box<dyn Component>> {
        let component = self.slots.get_mut(component_type.index())?.take()?;
        self.bits.clear(component_type.index());
        self.order.retain(|t| *t != component_type);
        Some(component)
    }
}

struct EntityInner {
    id: EntityId,
    components: RefCell<ComponentSlots>,
    family_bits: RefCell<Bits>,
    flags: Cell<i32>,
    removing: Cell<bool>,
    scheduled_for_removal: Cell<bool>,
    operation_handler: RefCell<Option<Rc<ComponentOperationHandler>>>,
    recycler: Option<Weak<ComponentPools>>,
    component_added: Signal<Entity>,
    component_removed: Signal<Entity>,
}

/// Shared handle to a container of components
#[derive(Clone)]
pub struct Entity {
    inner: Rc<EntityInner>,
}

impl Entity {
    /// Create a free-standing entity with no components
    pub fn new() -> Self {
        Self::build(None)
    }

    /// An entity whose removed components go back to `pools`
    pub(crate) fn with_recycler(pools: Weak<ComponentPools>) -> Self {
        Self::build(Some(pools))
    }

    fn build(recycler: Option<Weak<ComponentPools>>) -> Self {
        Entity {
            inner: Rc::new(EntityInner {
                id: EntityId::next(),
                components: RefCell::new(ComponentSlots::default()),
                family_bits: RefCell::new(Bits::new()),
                flags: Cell::new(0),
                removing: Cell::new(false),
                scheduled_for_removal: Cell::new(false),
                operation_handler: RefCell::new(None),
                recycler,
                component_added: Signal::new(),
                component_removed: Signal::new(),
            }),
        }
    }

    /// Process-unique identifier of this entity
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    /// Add a component, replacing any existing component of the same type.
    ///
    /// A replacement is reported as a removal followed by an addition.
    pub fn add<T: Component>(&self, component: T) -> &Self {
        self.add_boxed(Box::new(component))
    }

    /// Add an already boxed component
    pub fn add_boxed(&self, component: Box<dyn Component>) -> &Self {
        let component_type = ComponentType::of_component(&*component);
        if self.has_type(component_type) {
            self.remove_type(component_type);
        }
        self.inner
            .components
            .borrow_mut()
            .insert(component_type, component);
        self.notify_added(component_type);
        self
    }

    /// Remove the component of type `T`.
    ///
    /// Returns `false` (and notifies nobody) if there was none. Entities
    /// created by a pooled engine return the component to its pool.
    pub fn remove<T: Component>(&self) -> bool {
        self.remove_type(ComponentType::of::<T>())
    }

    /// Remove the component of the given type
    pub fn remove_type(&self, component_type: ComponentType) -> bool {
        let Some(component) = self.inner.components.borrow_mut().take(component_type) else {
            return false;
        };
        self.recycle(component);
        self.notify_removed(component_type);
        true
    }

    /// Remove the component of type `T` and hand it back instead of
    /// recycling it
    pub fn take<T: Component>(&self) -> Option<Box<T>> {
        let component_type = ComponentType::of::<T>();
        let component = self.inner.components.borrow_mut().take(component_type)?;
        self.notify_removed(component_type);
        component.downcast::<T>()
    }

    /// Remove every component, oldest first
    pub fn remove_all(&self) {
        loop {
            let next = self.inner.components.borrow().order.first().copied();
            match next {
                Some(component_type) => {
                    self.remove_type(component_type);
                }
                None => break,
            }
        }
    }

    /// Borrow the component of type `T`
    pub fn get<T: Component>(&self) -> Option<Ref<'_, T>> {
        self.get_by_type(ComponentType::of::<T>())
    }

    /// Mutably borrow the component of type `T`
    pub fn get_mut<T: Component>(&self) -> Option<RefMut<'_, T>> {
        self.get_mut_by_type(ComponentType::of::<T>())
    }

    pub(crate) fn get_by_type<T: Component>(
        &self,
        component_type: ComponentType,
    ) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.inner.components.borrow(), |c| {
            c.get(component_type)?.downcast_ref::<T>()
        })
        .ok()
    }

    pub(crate) fn get_mut_by_type<T: Component>(
        &self,
        component_type: ComponentType,
    ) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.inner.components.borrow_mut(), |c| {
            c.get_mut(component_type)?.downcast_mut::<T>()
        })
        .ok()
    }

    /// Whether the entity has a component of type `T`
    pub fn has<T: Component>(&self) -> bool {
        self.has_type(ComponentType::of::<T>())
    }

    /// Whether the entity has a component of the given type
    pub fn has_type(&self, component_type: ComponentType) -> bool {
        self.inner
            .components
            .borrow()
            .bits
            .get(component_type.index())
    }

    /// Number of attached components
    pub fn component_count(&self) -> usize {
        self.inner.components.borrow().order.len()
    }

    /// Types of the attached components, oldest first
    pub fn component_types(&self) -> Vec<ComponentType> {
        self.inner.components.borrow().order.clone()
    }

    /// Bitset of attached component types
    pub fn component_bits(&self) -> Ref<'_, Bits> {
        Ref::map(self.inner.components.borrow(), |c| &c.bits)
    }

    /// Bitset of the families this entity currently belongs to
    pub fn family_bits(&self) -> Ref<'_, Bits> {
        self.inner.family_bits.borrow()
    }

    pub(crate) fn family_bits_mut(&self) -> RefMut<'_, Bits> {
        self.inner.family_bits.borrow_mut()
    }

    /// Free-form user flags
    pub fn flags(&self) -> i32 {
        self.inner.flags.get()
    }

    /// Set the user flags
    pub fn set_flags(&self, flags: i32) {
        self.inner.flags.set(flags);
    }

    /// Whether the entity is in the middle of being removed from an engine
    pub fn is_removing(&self) -> bool {
        self.inner.removing.get()
    }

    pub(crate) fn set_removing(&self, removing: bool) {
        self.inner.removing.set(removing);
    }

    /// Whether a deferred removal of this entity is queued
    pub fn is_scheduled_for_removal(&self) -> bool {
        self.inner.scheduled_for_removal.get()
    }

    pub(crate) fn set_scheduled_for_removal(&self, scheduled: bool) {
        self.inner.scheduled_for_removal.set(scheduled);
    }

    /// Signal fired after a component is added
    pub fn component_added(&self) -> &Signal<Entity> {
        &self.inner.component_added
    }

    /// Signal fired after a component is removed
    pub fn component_removed(&self) -> &Signal<Entity> {
        &self.inner.component_removed
    }

    pub(crate) fn operation_handler(&self) -> Option<Rc<ComponentOperationHandler>> {
        self.inner.operation_handler.borrow().clone()
    }

    pub(crate) fn set_operation_handler(&self, handler: Option<Rc<ComponentOperationHandler>>) {
        *self.inner.operation_handler.borrow_mut() = handler;
    }

    pub(crate) fn dispatch_component_added(&self) {
        self.inner.component_added.dispatch(self);
    }

    pub(crate) fn dispatch_component_removed(&self) {
        self.inner.component_removed.dispatch(self);
    }

    /// Return a pooled entity to its pristine state
    pub(crate) fn reset(&self) {
        self.remove_all();
        self.inner.flags.set(0);
        self.inner.component_added.remove_all_listeners();
        self.inner.component_removed.remove_all_listeners();
        self.inner.scheduled_for_removal.set(false);
        self.inner.removing.set(false);
        self.inner.family_bits.borrow_mut().clear_all();
        self.set_operation_handler(None);
    }

    fn recycle(&self, component: Box<dyn Component>) {
        if let Some(pools) = self.inner.recycler.as_ref().and_then(Weak::upgrade) {
            pools.free(component);
        }
    }

    fn notify_added(&self, component_type: ComponentType) {
        match self.operation_handler() {
            Some(handler) => handler.add(self, component_type),
            None => self.dispatch_component_added(),
        }
    }

    fn notify_removed(&self, component_type: ComponentType) {
        match self.operation_handler() {
            Some(handler) => handler.remove(self, component_type),
            None => self.dispatch_component_removed(),
        }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Entity");
        s.field("id", &self.inner.id.raw());
        if let Ok(components) = self.inner.components.try_borrow() {
            s.field("components", &components.order);
        }
        s.finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.id, f)
    }
}
