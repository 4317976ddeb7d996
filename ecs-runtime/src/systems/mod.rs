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
//! Reusable system building blocks
//!
//! Each system here wraps a small user-supplied strategy object and
//! implements [`EntitySystem`](crate::ecs::EntitySystem) for it:
//!
//! - [`IteratingSystem`] runs an [`EntityProcessor`] on every entity of a
//!   family each step
//! - [`IntervalSystem`] runs an [`IntervalTask`] at a fixed interval
//! - [`IntervalIteratingSystem`] combines the two
//! - [`SortedIteratingSystem`] processes a family in comparator order
//!
//! ```
//! use ecs_runtime::ecs::{Component, Engine, Entity, Family};
//! use ecs_runtime::systems::{EntityProcessor, IteratingSystem};
//!
//! struct Velocity(f64);
//! impl Component for Velocity {}
//!
//! struct Damping;
//! impl EntityProcessor for Damping {
//!     fn process_entity(&mut self, _: &Engine, entity: &Entity, _: f64) -> anyhow::Result<()> {
//!         if let Some(mut v) = entity.get_mut::<Velocity>() {
//!             v.0 *= 0.5;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let engine = Engine::new();
//! engine.add_system(IteratingSystem::new(Family::all::<(Velocity,)>().get(), Damping));
//! let entity = engine.create_entity();
//! entity.add(Velocity(8.0));
//! engine.add_entity(&entity).unwrap();
//! engine.update(1.0).unwrap();
//! assert_eq!(entity.get::<Velocity>().unwrap().0, 4.0);
//! ```

mod interval;
mod iterating;
mod sorted;

pub use interval::{IntervalAccumulator, IntervalSystem, IntervalTask};
pub use iterating::{
    EntityProcessor, FamilyCursor, IntervalEntityProcessor, IntervalIteratingSystem, IteratingSystem,
};
pub use sorted::{SortedFamily, SortedIteratingSystem};
