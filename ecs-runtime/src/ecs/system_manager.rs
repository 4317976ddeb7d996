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
//! System registry with deterministic priority ordering
//!
//! At most one system of each concrete type is registered. Systems are kept
//! sorted by priority with a stable sort, so systems of equal priority run
//! in the order they were added. A system's priority is read when it is
//! added; changing it later takes effect on the next [`SystemManager::sort`]
//! or when the system is added again.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::ecs::EntitySystem;

/// Shared handle to a type-erased system
pub type SystemHandle = Rc<RefCell<dyn EntitySystem>>;

/// Receives system registration changes
pub trait SystemListener {
    /// A system was registered
    fn system_added(&self, system: &SystemHandle);
    /// A system was unregistered
    fn system_removed(&self, system: &SystemHandle);
}

#[derive(Clone)]
pub(crate) struct SystemEntry {
    pub(crate) system: SystemHandle,
    handle: Rc<dyn Any>,
    type_id: TypeId,
    priority: i32,
    pub(crate) name: String,
}

impl SystemEntry {
    fn same_system(&self, other: &SystemEntry) -> bool {
        Rc::as_ptr(&self.handle) as *const () == Rc::as_ptr(&other.handle) as *const ()
    }
}

/// Live, read-only view of the registered systems in execution order
#[derive(Clone, Default)]
pub struct SystemArray {
    inner: Rc<RefCell<Vec<SystemEntry>>>,
}

impl SystemArray {
    /// Number of systems
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Whether no system is registered
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// System at `index` in execution order
    pub fn get(&self, index: usize) -> Option<SystemHandle> {
        self.inner.borrow().get(index).map(|e| e.system.clone())
    }

    /// Names of the systems in execution order
    pub fn names(&self) -> Vec<String> {
        self.inner.borrow().iter().map(|e| e.name.clone()).collect()
    }

    /// Iterate the live list by index
    pub fn iter(&self) -> impl Iterator<Item = SystemHandle> + '_ {
        (0..).map_while(move |i| self.get(i))
    }

    fn snapshot(&self) -> Vec<SystemEntry> {
        self.inner.borrow().clone()
    }
}

impl fmt::Debug for SystemArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Owns the registered systems and their execution order
pub struct SystemManager {
    systems: SystemArray,
    by_type: RefCell<HashMap<TypeId, SystemEntry>>,
    listener: Rc<dyn SystemListener>,
}

impl SystemManager {
    /// Create a manager that reports registration changes to `listener`
    pub fn new(listener: Rc<dyn SystemListener>) -> Self {
        SystemManager {
            systems: SystemArray::default(),
            by_type: RefCell::new(HashMap::new()),
            listener,
        }
    }

    /// Register a system, replacing any registered system of the same type
    pub fn add_system<S: EntitySystem>(&self, system: Rc<RefCell<S>>) {
        let type_id = TypeId::of::<S>();
        let replaced = self.by_type.borrow().get(&type_id).cloned();
        if let Some(old) = replaced {
            self.remove_entry(&old);
        }

        let (priority, name) = match system.try_borrow() {
            Ok(s) => (s.priority(), s.name().to_string()),
            Err(_) => {
                warn!(system = std::any::type_name::<S>(), "system busy, adding at priority 0");
                (0, std::any::type_name::<S>().to_string())
            }
        };
        let entry = SystemEntry {
            system: system.clone(),
            handle: system,
            type_id,
            priority,
            name,
        };
        debug!(system = %entry.name, priority, "adding system");
        {
            let mut systems = self.systems.inner.borrow_mut();
            systems.push(entry.clone());
            systems.sort_by_key(|e| e.priority);
        }
        self.by_type.borrow_mut().insert(type_id, entry.clone());
        self.listener.system_added(&entry.system);
    }

    /// Unregister `system` if it is the registered instance of its type
    pub fn remove_system<S: EntitySystem>(&self, system: &Rc<RefCell<S>>) -> bool {
        let target = Rc::as_ptr(system) as *const ();
        let entry = self
            .by_type
            .borrow()
            .get(&TypeId::of::<S>())
            .filter(|e| Rc::as_ptr(&e.handle) as *const () == target)
            .cloned();
        match entry {
            Some(entry) => {
                self.remove_entry(&entry);
                true
            }
            None => false,
        }
    }

    /// Unregister the system of type `S`, if any
    pub fn remove_system_of<S: EntitySystem>(&self) -> bool {
        let entry = self.by_type.borrow().get(&TypeId::of::<S>()).cloned();
        match entry {
            Some(entry) => {
                self.remove_entry(&entry);
                true
            }
            None => false,
        }
    }

    /// Unregister every system, first to last
    pub fn remove_all_systems(&self) {
        loop {
            let first = self.systems.inner.borrow().first().cloned();
            match first {
                Some(entry) => self.remove_entry(&entry),
                None => break,
            }
        }
    }

    fn remove_entry(&self, entry: &SystemEntry) {
        let removed = {
            let mut systems = self.systems.inner.borrow_mut();
            let before = systems.len();
            systems.retain(|e| !e.same_system(entry));
            systems.len() != before
        };
        if !removed {
            return;
        }
        self.by_type.borrow_mut().remove(&entry.type_id);
        debug!(system = %entry.name, "removing system");
        self.listener.system_removed(&entry.system);
    }

    /// The registered system of type `S`
    pub fn get_system<S: EntitySystem>(&self) -> Option<Rc<RefCell<S>>> {
        let handle = self
            .by_type
            .borrow()
            .get(&TypeId::of::<S>())
            .map(|e| e.handle.clone())?;
        handle.downcast::<RefCell<S>>().ok()
    }

    /// Live view of the systems in execution order
    pub fn systems(&self) -> SystemArray {
        self.systems.clone()
    }

    /// Re-read every system's priority and re-sort, keeping the relative
    /// order of equal priorities
    pub fn sort(&self) {
        let mut systems = self.systems.inner.borrow_mut();
        for entry in systems.iter_mut() {
            match entry.system.try_borrow() {
                Ok(system) => entry.priority = system.priority(),
                Err(_) => warn!(system = %entry.name, "system busy, keeping cached priority"),
            }
        }
        systems.sort_by_key(|e| e.priority);
        let mut by_type = self.by_type.borrow_mut();
        for entry in systems.iter() {
            by_type.insert(entry.type_id, entry.clone());
        }
    }

    pub(crate) fn entries(&self) -> Vec<SystemEntry> {
        self.systems.snapshot()
    }

    pub(crate) fn contains(&self, entry: &SystemEntry) -> bool {
        self.systems
            .inner
            .borrow()
            .iter()
            .any(|e| e.same_system(entry))
    }
}

impl fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemManager")
            .field("systems", &self.systems)
            .finish()
    }
}
