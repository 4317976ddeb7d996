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
//! # ECS Runtime
//!
//! A single-threaded entity-component-system runtime for simulation loops.
//!
//! ## Features
//!
//! - **Entities and components**: entities are bags of at most one component
//!   per kind and announce component changes through signals
//! - **Families**: interned component-set predicates with live, cached
//!   membership lists and prioritized family listeners
//! - **Deferred mutation**: structural changes requested while systems run or
//!   listeners fire are queued and applied at the next safe point
//! - **Systems**: prioritized, enable-able systems with init, step, post-step
//!   and terminate hooks, plus iterating, interval and sorted building blocks
//! - **Pooling**: [`PooledEngine`](ecs::PooledEngine) recycles entities and
//!   poolable components to reduce allocation churn
//!
//! ## Example
//!
//! ```rust
//! use ecs_runtime::ecs::{Component, Engine, Family};
//!
//! struct Position(f64, f64);
//! impl Component for Position {}
//! struct Velocity(f64, f64);
//! impl Component for Velocity {}
//!
//! let engine = Engine::new();
//! let moving = engine.get_entities_for(&Family::all::<(Position, Velocity)>().get());
//!
//! let entity = engine.create_entity();
//! entity.add(Position(0.0, 0.0)).add(Velocity(1.0, 0.0));
//! engine.add_entity(&entity).unwrap();
//! assert!(moving.contains(&entity));
//!
//! entity.remove::<Velocity>();
//! assert!(moving.is_empty());
//! ```

#![warn(missing_docs)]

/// Growable bitset used for component and family masks
pub mod bits;

/// Entity Component System implementation
pub mod ecs;

/// Error types
pub mod error;

/// Memory pooling for reducing allocation churn
pub mod pool;

/// Typed signals and listeners
pub mod signal;

/// Reusable system building blocks
pub mod systems;

pub use ecs::{Component, Engine, Entity, EntitySystem, Family, PooledEngine};
pub use error::{EcsError, Result};
