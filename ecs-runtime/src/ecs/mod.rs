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
//! Entity Component System (ECS) core implementation
//!
//! This module provides the foundational ECS architecture including:
//! - Entities as component containers with change signals
//! - Component type registry and families (component-set predicates)
//! - Entity and family bookkeeping with deferred structural changes
//! - Prioritized system execution driven by [`Engine`]

mod component;
mod component_operations;
mod engine;
mod entity;
mod entity_manager;
mod family;
mod family_manager;
mod system;
mod system_manager;

pub use component::{AsAny, Component, ComponentMapper, ComponentSet, ComponentType, Poolable};
pub use component_operations::{ComponentOperation, ComponentOperationHandler, ComponentOperationKind};
pub use engine::{Engine, PooledEngine, WeakEngine};
pub use entity::{Entity, EntityId};
pub use entity_manager::{EntityArray, EntityArrayIter, EntityManager};
pub use family::{Family, FamilyBuilder};
pub use family_manager::{EntityListener, FamilyManager};
pub use system::EntitySystem;
pub use system_manager::{SystemArray, SystemHandle, SystemListener, SystemManager};
