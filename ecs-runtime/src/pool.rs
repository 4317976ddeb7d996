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
//! Object pooling for entities and components
//!
//! A pooled engine recycles removed entities and, for component types that
//! opt in through [`Poolable`], removed components. Pools hold at most
//! `max_pool_size` free instances; anything returned beyond that is reset
//! and dropped.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ecs::{AsAny, Component, Entity, Poolable};

/// Configuration for one pool
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Free-list capacity reserved up front
    pub initial_capacity: usize,
    /// Maximum number of free instances kept for reuse
    pub max_pool_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            initial_capacity: 10,
            max_pool_size: 100,
        }
    }
}

impl PoolConfig {
    /// Create a pool configuration with custom settings
    pub fn new(initial_capacity: usize, max_pool_size: usize) -> Self {
        PoolConfig {
            initial_capacity,
            max_pool_size,
        }
    }

    /// Set the maximum number of free instances kept
    pub fn with_max_pool_size(mut self, max_pool_size: usize) -> Self {
        self.max_pool_size = max_pool_size;
        self
    }
}

/// Pool settings for a [`PooledEngine`](crate::ecs::PooledEngine)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnginePoolConfig {
    /// Entity pool settings
    pub entities: PoolConfig,
    /// Settings applied to every component pool
    pub components: PoolConfig,
}

impl EnginePoolConfig {
    /// Replace the entity pool settings
    pub fn with_entities(mut self, config: PoolConfig) -> Self {
        self.entities = config;
        self
    }

    /// Replace the component pool settings
    pub fn with_components(mut self, config: PoolConfig) -> Self {
        self.components = config;
        self
    }
}

/// Statistics for monitoring pool performance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of times an instance was reused from the pool
    pub hits: usize,
    /// Number of times a new instance had to be created
    pub misses: usize,
    /// Number of returned instances dropped because the pool was full
    pub discarded: usize,
    /// Current number of free instances
    pub pool_size: usize,
    /// Peak number of free instances
    pub peak_size: usize,
}

impl PoolStats {
    /// Calculate the hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// A bounded free list with creation and reset hooks
pub struct Pool<T> {
    free: RefCell<Vec<T>>,
    max_pool_size: usize,
    stats: RefCell<PoolStats>,
    create: Box<dyn Fn() -> T>,
    reset: Box<dyn Fn(&mut T)>,
}

impl<T> Pool<T> {
    /// Create a pool
    ///
    /// `create` builds a fresh instance when the pool is empty; `reset` runs
    /// once on every instance handed back through [`Pool::free`].
    pub fn new(
        config: &PoolConfig,
        create: impl Fn() -> T + 'static,
        reset: impl Fn(&mut T) + 'static,
    ) -> Self {
        Pool {
            free: RefCell::new(Vec::with_capacity(config.initial_capacity)),
            max_pool_size: config.max_pool_size,
            stats: RefCell::new(PoolStats::default()),
            create: Box::new(create),
            reset: Box::new(reset),
        }
    }

    /// Take a free instance, or create one if none is available
    pub fn obtain(&self) -> T {
        let reused = self.free.borrow_mut().pop();
        let mut stats = self.stats.borrow_mut();
        stats.pool_size = self.free.borrow().len();
        match reused {
            Some(object) => {
                stats.hits += 1;
                object
            }
            None => {
                stats.misses += 1;
                drop(stats);
                (self.create)()
            }
        }
    }

    /// Reset an instance and keep it for reuse, or drop it if the pool is
    /// full
    pub fn free(&self, mut object: T) {
        (self.reset)(&mut object);
        let mut free = self.free.borrow_mut();
        let mut stats = self.stats.borrow_mut();
        if free.len() < self.max_pool_size {
            free.push(object);
            stats.pool_size = free.len();
            stats.peak_size = stats.peak_size.max(free.len());
        } else {
            stats.discarded += 1;
            trace!(max = self.max_pool_size, "pool full, discarding instance");
        }
    }

    /// Drop every free instance
    pub fn clear(&self) {
        self.free.borrow_mut().clear();
        self.stats.borrow_mut().pool_size = 0;
    }

    /// Number of free instances
    pub fn len(&self) -> usize {
        self.free.borrow().len()
    }

    /// Whether no free instance is available
    pub fn is_empty(&self) -> bool {
        self.free.borrow().is_empty()
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        self.stats.borrow().clone()
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("free", &self.len())
            .field("max_pool_size", &self.max_pool_size)
            .finish()
    }
}

type ComponentPool = Pool<Box<dyn Component>>;

/// Per-type pools for [`Poolable`] components
pub struct ComponentPools {
    config: PoolConfig,
    pools: RefCell<HashMap<TypeId, Rc<ComponentPool>>>,
}

impl ComponentPools {
    /// Create an empty set of pools sharing one configuration
    pub fn new(config: PoolConfig) -> Self {
        ComponentPools {
            config,
            pools: RefCell::new(HashMap::new()),
        }
    }

    /// Create the pool for `T` if it does not exist yet
    pub fn register<T: Poolable + Default>(&self) {
        let mut pools = self.pools.borrow_mut();
        if pools.contains_key(&TypeId::of::<T>()) {
            return;
        }
        debug!(component = std::any::type_name::<T>(), "creating component pool");
        let pool = Pool::new(
            &self.config,
            || Box::new(T::default()) as Box<dyn Component>,
            |component: &mut Box<dyn Component>| {
                if let Some(component) = (**component).downcast_mut::<T>() {
                    component.reset();
                }
            },
        );
        pools.insert(TypeId::of::<T>(), Rc::new(pool));
    }

    /// Whether `T` has a pool
    pub fn is_registered<T: Component>(&self) -> bool {
        self.pools.borrow().contains_key(&TypeId::of::<T>())
    }

    fn pool_for(&self, type_id: TypeId) -> Option<Rc<ComponentPool>> {
        self.pools.borrow().get(&type_id).cloned()
    }

    /// Take a `T` from its pool; `None` if `T` has no pool
    pub fn obtain<T: Component>(&self) -> Option<Box<T>> {
        self.pool_for(TypeId::of::<T>())?.obtain().downcast::<T>()
    }

    /// Return a component to its type's pool; components without a pool
    /// are dropped
    pub fn free(&self, component: Box<dyn Component>) {
        let type_id = AsAny::as_any(&*component).type_id();
        if let Some(pool) = self.pool_for(type_id) {
            pool.free(component);
        }
    }

    /// Statistics of `T`'s pool
    pub fn stats<T: Component>(&self) -> Option<PoolStats> {
        self.pool_for(TypeId::of::<T>()).map(|p| p.stats())
    }

    /// Drop every free component in every pool
    pub fn clear(&self) {
        let pools: Vec<Rc<ComponentPool>> = self.pools.borrow().values().cloned().collect();
        for pool in pools {
            pool.clear();
        }
    }
}

impl fmt::Debug for ComponentPools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentPools")
            .field("pools", &self.pools.borrow().len())
            .field("config", &self.config)
            .finish()
    }
}

/// The entity pool and component pools of a pooled engine
pub(crate) struct EnginePools {
    pub(crate) entities: Pool<Entity>,
    pub(crate) components: Rc<ComponentPools>,
}

impl EnginePools {
    pub(crate) fn new(config: &EnginePoolConfig) -> Self {
        let components = Rc::new(ComponentPools::new(config.components.clone()));
        let recycler = Rc::downgrade(&components);
        let entities = Pool::new(
            &config.entities,
            move || Entity::with_recycler(recycler.clone()),
            |entity: &mut Entity| entity.reset(),
        );
        EnginePools {
            entities,
            components,
        }
    }

    pub(crate) fn clear(&self) {
        self.entities.clear();
        self.components.clear();
    }
}
