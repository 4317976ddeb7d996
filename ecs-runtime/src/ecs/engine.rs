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
//! The engine: entities, systems, families and the update loop
//!
//! [`Engine`] is a cheap, cloneable handle. All structural mutation
//! (adding or removing entities and components) is safe to request from
//! anywhere, including from inside a system's step or a family listener:
//! while the engine is updating or dispatching family listeners the
//! mutation is queued, and queued work is drained to a fixed point at the
//! next safe point (after each system's step, and after any top-level
//! operation).
//!
//! ```
//! use ecs_runtime::ecs::{Component, Engine, EntitySystem, Family};
//!
//! struct Position(f64);
//! impl Component for Position {}
//!
//! struct Drift;
//! impl EntitySystem for Drift {
//!     fn step(&mut self, engine: &Engine, dt: f64) -> anyhow::Result<()> {
//!         for entity in &engine.get_entities_for(&Family::all::<(Position,)>().get()) {
//!             if let Some(mut p) = entity.get_mut::<Position>() {
//!                 p.0 += dt;
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let engine = Engine::new();
//! engine.add_system(Drift);
//! let entity = engine.create_entity();
//! entity.add(Position(0.0));
//! engine.add_entity(&entity).unwrap();
//! engine.update(0.5).unwrap();
//! assert_eq!(entity.get::<Position>().unwrap().0, 0.5);
//! ```

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::panic;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace, warn};

use crate::ecs::component::{Component, Poolable};
use crate::ecs::component_operations::ComponentOperationHandler;
use crate::ecs::entity_manager::{EntityArray, EntityManager};
use crate::ecs::family_manager::{EntityListener, FamilyManager};
use crate::ecs::system_manager::{SystemArray, SystemEntry, SystemHandle, SystemListener, SystemManager};
use crate::ecs::{Entity, EntitySystem, Family};
use crate::error::{EcsError, Result};
use crate::pool::{EnginePoolConfig, EnginePools, PoolStats};
use crate::signal::{Listener, Signal};

// Raises a flag for the lifetime of the guard, including on unwind.
struct FlagGuard<'a>(&'a Cell<bool>);

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        FlagGuard(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct EngineCore {
    entity_manager: EntityManager,
    family_manager: FamilyManager,
    system_manager: SystemManager,
    component_operations: Rc<ComponentOperationHandler>,
    membership_listener: Rc<dyn Listener<Entity>>,
    pools: Option<Rc<EnginePools>>,
    updating: Cell<bool>,
    settling: Cell<bool>,
    initialized: Cell<bool>,
    start_time: f64,
    current_time: Cell<f64>,
    step_number: Cell<u64>,
    realtime_factor: Cell<f64>,
}

impl EngineCore {
    fn is_busy(&self) -> bool {
        self.updating.get() || self.family_manager.notifying()
    }

    fn attach(&self, entity: &Entity) {
        entity.component_added().add(self.membership_listener.clone());
        entity.component_removed().add(self.membership_listener.clone());
        entity.set_operation_handler(Some(self.component_operations.clone()));
        self.family_manager.update_family_membership(entity);
    }

    fn detach(&self, entity: &Entity) {
        self.family_manager.update_family_membership(entity);
        entity.component_added().remove(&self.membership_listener);
        entity.component_removed().remove(&self.membership_listener);
        entity.set_operation_handler(None);
        if let Some(pools) = &self.pools {
            pools.entities.free(entity.clone());
        }
    }

    fn drain(&self) -> Result<()> {
        let mut outcome = Ok(());
        while self.component_operations.has_operations_to_process()
            || self.entity_manager.has_pending_operations()
        {
            trace!("draining deferred operations");
            self.component_operations.process_operations();
            if let Err(err) = self.entity_manager.process_pending_operations() {
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        outcome
    }

    /// Drain queued work if nothing up the stack is already responsible
    /// for it.
    fn settle(&self) -> Result<()> {
        if self.is_busy() || self.settling.get() {
            return Ok(());
        }
        let _settling = FlagGuard::raise(&self.settling);
        self.drain()
    }

    fn settle_logged(&self) {
        if let Err(err) = self.settle() {
            error!(%err, "deferred entity operation failed");
        }
    }
}

// Back-channel from the managers and entity signals into the engine.
struct EngineHooks {
    core: Weak<EngineCore>,
}

impl EngineHooks {
    fn engine(&self) -> Option<Engine> {
        self.core.upgrade().map(|core| Engine { core })
    }
}

impl EntityListener for EngineHooks {
    fn entity_added(&self, entity: &Entity) {
        if let Some(core) = self.core.upgrade() {
            core.attach(entity);
        }
    }

    fn entity_removed(&self, entity: &Entity) {
        if let Some(core) = self.core.upgrade() {
            core.detach(entity);
        }
    }
}

impl SystemListener for EngineHooks {
    fn system_added(&self, system: &SystemHandle) {
        let Some(engine) = self.engine() else { return };
        match system.try_borrow_mut() {
            Ok(mut system) => system.added_to_engine(&engine),
            Err(_) => warn!("system is borrowed, added_to_engine skipped"),
        }
    }

    fn system_removed(&self, system: &SystemHandle) {
        let Some(engine) = self.engine() else { return };
        match system.try_borrow_mut() {
            Ok(mut system) => system.removed_from_engine(&engine),
            Err(_) => warn!("system is borrowed, removed_from_engine skipped"),
        }
    }
}

impl Listener<Entity> for EngineHooks {
    fn receive(&self, _signal: &Signal<Entity>, entity: &Entity) {
        if let Some(core) = self.core.upgrade() {
            // A dispatch snapshot can still reach us after the entity left.
            let owned = entity
                .operation_handler()
                .is_some_and(|handler| Rc::ptr_eq(&handler, &core.component_operations));
            if !owned {
                return;
            }
            core.family_manager.update_family_membership(entity);
            core.settle_logged();
        }
    }
}

/// Handle to an entity-component-system engine
///
/// Clones share the same engine.
#[derive(Clone)]
pub struct Engine {
    core: Rc<EngineCore>,
}

/// Non-owning handle to an [`Engine`]
#[derive(Clone, Default)]
pub struct WeakEngine {
    core: Weak<EngineCore>,
}

impl WeakEngine {
    /// The engine, if it is still alive
    pub fn upgrade(&self) -> Option<Engine> {
        self.core.upgrade().map(|core| Engine { core })
    }
}

impl fmt::Debug for WeakEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEngine")
            .field("alive", &(self.core.strong_count() > 0))
            .finish()
    }
}

impl Engine {
    /// Create an engine whose clock starts at zero
    pub fn new() -> Self {
        Self::build(0.0, None)
    }

    /// Create an engine whose clock starts at `start_time`
    pub fn with_start_time(start_time: f64) -> Self {
        Self::build(start_time, None)
    }

    fn build(start_time: f64, pools: Option<Rc<EnginePools>>) -> Self {
        let core = Rc::new_cyclic(|weak: &Weak<EngineCore>| {
            let hooks = Rc::new(EngineHooks { core: weak.clone() });
            let busy_core = weak.clone();
            let component_operations = Rc::new(ComponentOperationHandler::new(move || {
                busy_core.upgrade().map_or(false, |core| core.is_busy())
            }));
            let entity_manager = EntityManager::new(hooks.clone());
            let family_manager = FamilyManager::new(entity_manager.entities());
            EngineCore {
                entity_manager,
                family_manager,
                system_manager: SystemManager::new(hooks.clone()),
                component_operations,
                membership_listener: hooks,
                pools,
                updating: Cell::new(false),
                settling: Cell::new(false),
                initialized: Cell::new(false),
                start_time,
                current_time: Cell::new(start_time),
                step_number: Cell::new(0),
                realtime_factor: Cell::new(1.0),
            }
        });
        Engine { core }
    }

    /// Non-owning handle to this engine
    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            core: Rc::downgrade(&self.core),
        }
    }

    /// Whether both handles refer to the same engine
    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    /// Create a new entity. It is not registered until passed to
    /// [`Engine::add_entity`].
    pub fn create_entity(&self) -> Entity {
        match &self.core.pools {
            Some(pools) => pools.entities.obtain(),
            None => Entity::new(),
        }
    }

    /// Create a component of type `T`, from its pool when one is
    /// registered.
    ///
    /// On a [`PooledEngine`] a [`Poolable`] kind is only pooled once
    /// [`PooledEngine::register_component_pool`] or
    /// [`PooledEngine::obtain_component`] has run for it; before that the
    /// component is built fresh and is not recycled on removal.
    ///
    /// Returns `None` if constructing the component panics.
    pub fn create_component<T: Component + Default>(&self) -> Option<Box<T>> {
        if let Some(component) = self
            .core
            .pools
            .as_ref()
            .and_then(|pools| pools.components.obtain::<T>())
        {
            return Some(component);
        }
        match panic::catch_unwind(T::default) {
            Ok(component) => Some(Box::new(component)),
            Err(_) => {
                error!(component = type_name::<T>(), "component construction failed");
                None
            }
        }
    }

    /// Register an entity.
    ///
    /// Fails if the entity is already registered with this engine or still
    /// belongs to another one. While the engine is busy the registration
    /// takes effect at the next safe point.
    pub fn add_entity(&self, entity: &Entity) -> Result<()> {
        let core = &self.core;
        if let Some(handler) = entity.operation_handler() {
            if !Rc::ptr_eq(&handler, &core.component_operations) {
                warn!(entity = %entity, "entity belongs to another engine");
                return Err(EcsError::EntityOwnedByAnotherEngine(entity.id()));
            }
        }
        core.entity_manager.add_entity(entity, core.is_busy())?;
        core.settle()
    }

    /// Unregister an entity. Does nothing if it is not registered.
    pub fn remove_entity(&self, entity: &Entity) {
        let core = &self.core;
        core.entity_manager.remove_entity(entity, core.is_busy());
        core.settle_logged();
    }

    /// Unregister every entity
    pub fn remove_all_entities(&self) {
        let core = &self.core;
        core.entity_manager.remove_all_entities(core.is_busy());
        core.settle_logged();
    }

    /// Unregister every entity in `family`
    pub fn remove_all_entities_for(&self, family: &Family) {
        let core = &self.core;
        let entities = core.family_manager.get_entities_for(family);
        core.entity_manager
            .remove_all_entities_in(entities, core.is_busy());
        core.settle_logged();
    }

    /// Live view of every registered entity
    pub fn entities(&self) -> EntityArray {
        self.core.entity_manager.entities()
    }

    /// Live view of the registered entities matching `family`
    pub fn get_entities_for(&self, family: &Family) -> EntityArray {
        self.core.family_manager.get_entities_for(family)
    }

    /// Add a system and return the shared handle the engine keeps.
    ///
    /// A previously added system of the same type is removed first.
    pub fn add_system<S: EntitySystem>(&self, system: S) -> Rc<RefCell<S>> {
        let handle = Rc::new(RefCell::new(system));
        self.add_shared_system(handle.clone());
        handle
    }

    /// Add a system the caller already shares
    pub fn add_shared_system<S: EntitySystem>(&self, system: Rc<RefCell<S>>) {
        self.core.system_manager.add_system(system);
    }

    /// Remove `system` if it is the registered instance of its type
    pub fn remove_system<S: EntitySystem>(&self, system: &Rc<RefCell<S>>) -> bool {
        self.core.system_manager.remove_system(system)
    }

    /// Remove the system of type `S`, if any
    pub fn remove_system_of<S: EntitySystem>(&self) -> bool {
        self.core.system_manager.remove_system_of::<S>()
    }

    /// Remove every system
    pub fn remove_all_systems(&self) {
        self.core.system_manager.remove_all_systems();
    }

    /// The registered system of type `S`
    pub fn get_system<S: EntitySystem>(&self) -> Option<Rc<RefCell<S>>> {
        self.core.system_manager.get_system::<S>()
    }

    /// Live view of the systems in execution order
    pub fn systems(&self) -> SystemArray {
        self.core.system_manager.systems()
    }

    /// Re-read every system's priority and re-sort
    pub fn sort_systems(&self) {
        self.core.system_manager.sort();
    }

    /// Listen for entities added to or removed from the engine
    pub fn add_entity_listener(&self, listener: Rc<dyn EntityListener>) {
        self.add_entity_listener_for(&Family::everything(), 0, listener);
    }

    /// Listen for entities added to or removed from the engine, ordered by
    /// `priority` among listeners
    pub fn add_entity_listener_with_priority(&self, priority: i32, listener: Rc<dyn EntityListener>) {
        self.add_entity_listener_for(&Family::everything(), priority, listener);
    }

    /// Listen for entities entering or leaving `family`
    pub fn add_entity_listener_for(
        &self,
        family: &Family,
        priority: i32,
        listener: Rc<dyn EntityListener>,
    ) {
        self.core
            .family_manager
            .add_entity_listener(family, priority, listener);
    }

    /// Remove every registration of `listener`
    pub fn remove_entity_listener<L: EntityListener + ?Sized>(&self, listener: &Rc<L>) {
        self.core.family_manager.remove_entity_listener(listener);
    }

    /// Whether `update` is running
    pub fn is_updating(&self) -> bool {
        self.core.updating.get()
    }

    /// Whether family listeners are being dispatched
    pub fn is_notifying(&self) -> bool {
        self.core.family_manager.notifying()
    }

    /// Simulated time at construction
    pub fn start_time(&self) -> f64 {
        self.core.start_time
    }

    /// Simulated time: start time plus every scaled step delta so far
    pub fn current_time(&self) -> f64 {
        self.core.current_time.get()
    }

    /// Number of completed steps
    pub fn step_number(&self) -> u64 {
        self.core.step_number.get()
    }

    /// Multiplier applied to every step's delta
    pub fn realtime_factor(&self) -> f64 {
        self.core.realtime_factor.get()
    }

    /// Set the multiplier applied to every step's delta
    pub fn set_realtime_factor(&self, factor: f64) {
        self.core.realtime_factor.set(factor);
    }

    fn run_hook(
        &self,
        entry: &SystemEntry,
        hook: impl FnOnce(&mut dyn EntitySystem) -> anyhow::Result<()>,
    ) -> Result<()> {
        let mut system = match entry.system.try_borrow_mut() {
            Ok(system) => system,
            Err(_) => {
                warn!(system = %entry.name, "system is borrowed, skipping");
                return Ok(());
            }
        };
        if !system.is_enabled() {
            return Ok(());
        }
        hook(&mut *system).map_err(|source| EcsError::SystemFailed {
            system: entry.name.clone(),
            source,
        })
    }

    /// Run `pre_init` then `post_init` on every enabled system. Only the
    /// first call has any effect; `update` calls it implicitly.
    pub fn init(&self) -> Result<()> {
        if self.core.initialized.replace(true) {
            return Ok(());
        }
        debug!(systems = self.core.system_manager.systems().len(), "initializing engine");
        for entry in self.core.system_manager.entries() {
            self.run_hook(&entry, |system| system.pre_init(self))?;
        }
        for entry in self.core.system_manager.entries() {
            self.run_hook(&entry, |system| system.post_init(self))?;
        }
        self.core.settle()
    }

    /// Advance the simulation by one step.
    ///
    /// Every enabled system steps in priority order with `delta_time`
    /// scaled by the realtime factor; deferred work is drained after each
    /// system. The clock then advances and every enabled system's
    /// `post_step` runs.
    ///
    /// Fails without doing anything if called re-entrantly. A failing
    /// system aborts the step; the engine is left idle and work the system
    /// queued is applied at the next safe point.
    pub fn update(&self, delta_time: f64) -> Result<()> {
        let core = &self.core;
        if core.updating.get() {
            warn!("update called while already updating");
            return Err(EcsError::NestedUpdate);
        }
        if core.family_manager.notifying() {
            warn!("update called from a family listener");
            return Err(EcsError::UpdateWhileNotifying);
        }
        self.init()?;

        let delta = delta_time * core.realtime_factor.get();
        let _updating = FlagGuard::raise(&core.updating);
        // Leftovers from a step that failed part way.
        core.drain()?;
        for entry in core.system_manager.entries() {
            if !core.system_manager.contains(&entry) {
                continue;
            }
            self.run_hook(&entry, |system| system.step(self, delta))?;
            core.drain()?;
        }

        core.current_time.set(core.current_time.get() + delta);
        core.step_number.set(core.step_number.get() + 1);

        for entry in core.system_manager.entries() {
            if !core.system_manager.contains(&entry) {
                continue;
            }
            self.run_hook(&entry, |system| system.post_step(self))?;
            core.drain()?;
        }
        Ok(())
    }

    /// Call `terminate` on every enabled system
    pub fn terminate(&self) -> Result<()> {
        if self.core.updating.get() {
            return Err(EcsError::TerminateWhileUpdating);
        }
        debug!("terminating engine");
        for entry in self.core.system_manager.entries() {
            self.run_hook(&entry, |system| {
                system.terminate(self);
                Ok(())
            })?;
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("entities", &self.core.entity_manager.entities().len())
            .field("systems", &self.core.system_manager.systems())
            .field("families", &self.core.family_manager.family_count())
            .field("step_number", &self.step_number())
            .field("current_time", &self.current_time())
            .field("pooled", &self.core.pools.is_some())
            .finish()
    }
}

/// An [`Engine`] that recycles entities and [`Poolable`] components
///
/// Removed entities are reset and returned to the entity pool once their
/// removal has fully propagated; their poolable components go back to the
/// component pools. Dereferences to [`Engine`] for everything else.
pub struct PooledEngine {
    engine: Engine,
    pools: Rc<EnginePools>,
}

impl PooledEngine {
    /// Create a pooled engine with default pool sizes
    pub fn new() -> Self {
        Self::with_config(EnginePoolConfig::default())
    }

    /// Create a pooled engine with custom pool sizes
    pub fn with_config(config: EnginePoolConfig) -> Self {
        let pools = Rc::new(EnginePools::new(&config));
        PooledEngine {
            engine: Engine::build(0.0, Some(pools.clone())),
            pools,
        }
    }

    /// The underlying engine handle
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Pool instances of `T` from now on
    pub fn register_component_pool<T: Poolable + Default>(&self) {
        self.pools.components.register::<T>();
    }

    /// Take a `T` from its pool, registering the pool on first use
    pub fn obtain_component<T: Poolable + Default>(&self) -> Box<T> {
        self.register_component_pool::<T>();
        self.pools
            .components
            .obtain::<T>()
            .unwrap_or_else(|| Box::new(T::default()))
    }

    /// Drop every free entity and component held by the pools
    pub fn clear_pools(&self) {
        self.pools.clear();
    }

    /// Statistics of the entity pool
    pub fn entity_pool_stats(&self) -> PoolStats {
        self.pools.entities.stats()
    }

    /// Statistics of `T`'s component pool
    pub fn component_pool_stats<T: Component>(&self) -> Option<PoolStats> {
        self.pools.components.stats::<T>()
    }
}

impl Default for PooledEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for PooledEngine {
    type Target = Engine;

    fn deref(&self) -> &Engine {
        &self.engine
    }
}

impl fmt::Debug for PooledEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledEngine")
            .field("engine", &self.engine)
            .field("free_entities", &self.pools.entities.len())
            .finish()
    }
}
