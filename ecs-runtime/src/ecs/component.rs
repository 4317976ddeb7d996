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
//! Components and component kinds
//!
//! Components are plain data attached to entities. Every concrete component
//! type is assigned a dense, process-wide [`ComponentType`] index the first
//! time it is seen; the index is stable for the life of the process and is
//! what entity bitsets and family masks are built from.

use std::any::{type_name, Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::bits::Bits;
use crate::ecs::Entity;

/// Upcasting helper implemented for every `'static` type
///
/// This is what lets a `Box<dyn Component>` be turned back into its
/// concrete type; it never needs to be implemented by hand.
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`
    fn as_any(&self) -> &dyn Any;
    /// Borrow as `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Convert a boxed value into `Box<dyn Any>`
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    /// Fully qualified name of the concrete type
    fn component_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn component_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Trait that all components must implement
///
/// Components should be plain data structures without behavior:
///
/// ```
/// use ecs_runtime::ecs::Component;
///
/// struct Position { x: f32, y: f32 }
/// impl Component for Position {}
/// ```
pub trait Component: AsAny {}

impl dyn Component {
    /// Whether the concrete type is `T`
    pub fn is<T: Component>(&self) -> bool {
        AsAny::as_any(self).is::<T>()
    }

    /// Borrow as `T` if that is the concrete type
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref::<T>()
    }

    /// Mutably borrow as `T` if that is the concrete type
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        AsAny::as_any_mut(self).downcast_mut::<T>()
    }

    /// Convert into `Box<T>`, dropping the value if the type does not match
    pub fn downcast<T: Component>(self: Box<Self>) -> Option<Box<T>> {
        AsAny::into_any(self).downcast::<T>().ok()
    }
}

impl fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.component_name())
    }
}

/// A component that can be recycled through a pool
///
/// `reset` is called exactly once each time an instance is returned to its
/// pool and must bring it back to a reusable default state.
pub trait Poolable: Component {
    /// Clear per-use state before the instance is reused
    fn reset(&mut self);
}

#[derive(Default)]
struct Registry {
    indices: HashMap<TypeId, usize>,
    names: Vec<&'static str>,
}

fn registry() -> MutexGuard<'static, Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| Mutex::new(Registry::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

thread_local! {
    // Per-thread memo of the global registry so lookups skip the mutex.
    static LOCAL_INDICES: RefCell<HashMap<TypeId, usize>> = RefCell::new(HashMap::new());
}

/// Dense identifier for a concrete component type
///
/// Two lookups for the same type always yield the same index, from any
/// engine and any thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentType {
    index: usize,
}

impl ComponentType {
    /// The component type for `T`, registering it on first use
    pub fn of<T: Component>() -> Self {
        Self::for_type(TypeId::of::<T>(), type_name::<T>())
    }

    /// The component type of a boxed component's concrete type
    pub fn of_component(component: &dyn Component) -> Self {
        Self::for_type(AsAny::as_any(component).type_id(), component.component_name())
    }

    fn for_type(type_id: TypeId, name: &'static str) -> Self {
        let cached = LOCAL_INDICES.with(|local| local.borrow().get(&type_id).copied());
        if let Some(index) = cached {
            return ComponentType { index };
        }

        let index = {
            let mut registry = registry();
            let next = registry.names.len();
            match registry.indices.get(&type_id) {
                Some(&index) => index,
                None => {
                    registry.indices.insert(type_id, next);
                    registry.names.push(name);
                    next
                }
            }
        };
        LOCAL_INDICES.with(|local| local.borrow_mut().insert(type_id, index));
        ComponentType { index }
    }

    /// Index used in component and family bitsets
    pub fn index(self) -> usize {
        self.index
    }

    /// Index of `T`'s component type
    pub fn index_for<T: Component>() -> usize {
        Self::of::<T>().index
    }

    /// Type name recorded when the kind was registered
    pub fn name(self) -> &'static str {
        registry()
            .names
            .get(self.index)
            .copied()
            .unwrap_or("<unregistered>")
    }

    /// Number of component types registered so far in this process
    pub fn registered_count() -> usize {
        registry().names.len()
    }

    /// Bitset with the index of every type in `S` set
    pub fn bits_for<S: ComponentSet>() -> Bits {
        Self::bits_for_types(&S::component_types())
    }

    /// Bitset with the index of every listed type set
    pub fn bits_for_types(types: &[ComponentType]) -> Bits {
        types.iter().map(|t| t.index).collect()
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name(), self.index)
    }
}

/// A tuple of component types, used to describe families
///
/// Implemented for `()` and tuples of up to eight components.
pub trait ComponentSet {
    /// Component types in declaration order
    fn component_types() -> Vec<ComponentType>;
}

impl ComponentSet for () {
    fn component_types() -> Vec<ComponentType> {
        Vec::new()
    }
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn component_types() -> Vec<ComponentType> {
                vec![$(ComponentType::of::<$name>()),+]
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

/// Cached accessor for one component type
///
/// Resolves the type's index once so repeated lookups in a hot loop go
/// straight to the entity's slot.
pub struct ComponentMapper<T: Component> {
    component_type: ComponentType,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> ComponentMapper<T> {
    /// Create a mapper for `T`
    pub fn new() -> Self {
        ComponentMapper {
            component_type: ComponentType::of::<T>(),
            _marker: PhantomData,
        }
    }

    /// The mapped component type
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// Borrow the entity's `T`, if present
    pub fn get<'a>(&self, entity: &'a Entity) -> Option<Ref<'a, T>> {
        entity.get_by_type::<T>(self.component_type)
    }

    /// Mutably borrow the entity's `T`, if present
    pub fn get_mut<'a>(&self, entity: &'a Entity) -> Option<RefMut<'a, T>> {
        entity.get_mut_by_type::<T>(self.component_type)
    }

    /// Whether the entity has a `T`
    pub fn has(&self, entity: &Entity) -> bool {
        entity.has_type(self.component_type)
    }
}

impl<T: Component> Default for ComponentMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> Clone for ComponentMapper<T> {
    fn clone(&self) -> Self {
        ComponentMapper {
            component_type: self.component_type,
            _marker: PhantomData,
        }
    }
}
