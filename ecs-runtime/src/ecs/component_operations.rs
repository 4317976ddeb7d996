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
//! Deferral of component add/remove notifications
//!
//! While the engine is busy (updating, or inside family listener dispatch)
//! an entity's component bits still change immediately, but the signal that
//! drives family membership is queued here and replayed at the next safe
//! point.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

use tracing::trace;

use crate::ecs::component::ComponentType;
use crate::ecs::Entity;

/// Kind of a queued component notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentOperationKind {
    /// A component was added
    Add,
    /// A component was removed
    Remove,
}

/// A component notification waiting for a safe point
#[derive(Debug, Clone)]
pub struct ComponentOperation {
    /// Whether the component was added or removed
    pub kind: ComponentOperationKind,
    /// Entity whose component set changed
    pub entity: Entity,
    /// The component type involved
    pub component_type: ComponentType,
}

/// Routes component notifications, deferring them while the engine is busy
pub struct ComponentOperationHandler {
    busy: Box<dyn Fn() -> bool>,
    operations: RefCell<VecDeque<ComponentOperation>>,
}

impl ComponentOperationHandler {
    /// Create a handler that defers whenever `busy` returns `true`.
    ///
    /// The predicate is evaluated at each call, never cached.
    pub fn new(busy: impl Fn() -> bool + 'static) -> Self {
        ComponentOperationHandler {
            busy: Box::new(busy),
            operations: RefCell::new(VecDeque::new()),
        }
    }

    /// Report that `entity` gained a component
    pub fn add(&self, entity: &Entity, component_type: ComponentType) {
        self.route(ComponentOperationKind::Add, entity, component_type);
    }

    /// Report that `entity` lost a component
    pub fn remove(&self, entity: &Entity, component_type: ComponentType) {
        self.route(ComponentOperationKind::Remove, entity, component_type);
    }

    fn route(&self, kind: ComponentOperationKind, entity: &Entity, component_type: ComponentType) {
        if (self.busy)() {
            trace!(?kind, entity = %entity, component = %component_type, "deferring component operation");
            self.operations.borrow_mut().push_back(ComponentOperation {
                kind,
                entity: entity.clone(),
                component_type,
            });
        } else {
            Self::apply(kind, entity);
        }
    }

    fn apply(kind: ComponentOperationKind, entity: &Entity) {
        match kind {
            ComponentOperationKind::Add => entity.dispatch_component_added(),
            ComponentOperationKind::Remove => entity.dispatch_component_removed(),
        }
    }

    /// Whether any notification is queued
    pub fn has_operations_to_process(&self) -> bool {
        !self.operations.borrow().is_empty()
    }

    /// Number of queued notifications
    pub fn pending_count(&self) -> usize {
        self.operations.borrow().len()
    }

    /// Replay queued notifications in FIFO order until the queue is empty,
    /// including any queued while replaying.
    pub fn process_operations(&self) {
        loop {
            let next = self.operations.borrow_mut().pop_front();
            let Some(operation) = next else { break };
            Self::apply(operation.kind, &operation.entity);
        }
    }
}

impl fmt::Debug for ComponentOperationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentOperationHandler")
            .field("pending", &self.pending_count())
            .finish()
    }
}
