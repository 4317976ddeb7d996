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
//! System trait
//!
//! Systems hold the per-step logic of the simulation. The engine owns each
//! system behind `Rc<RefCell<_>>` and hands it a reference to itself on
//! every hook, so a system needs no stored back-reference to reach the
//! engine. A system that wants one between hooks keeps a
//! [`WeakEngine`](crate::ecs::WeakEngine) obtained in
//! [`EntitySystem::added_to_engine`].
//!
//! A system must not hold a strong [`Engine`] clone: the engine owns the
//! system, and the cycle would never be freed.

use std::any::type_name;

use crate::ecs::Engine;

/// Trait for systems driven by an [`Engine`]
///
/// Every hook except [`EntitySystem::step`] has an empty default. Fallible
/// hooks return `anyhow::Result` and the engine reports a failure as
/// [`EcsError::SystemFailed`](crate::error::EcsError::SystemFailed).
pub trait EntitySystem: 'static {
    /// Execution order; lower runs first. Read when the system is added and
    /// again on [`Engine::sort_systems`].
    fn priority(&self) -> i32 {
        0
    }

    /// Disabled systems are skipped by every lifecycle hook and by `step`
    fn is_enabled(&self) -> bool {
        true
    }

    /// Called once when the system is added to `engine`
    fn added_to_engine(&mut self, _engine: &Engine) {}

    /// Called once when the system is removed from `engine`
    fn removed_from_engine(&mut self, _engine: &Engine) {}

    /// First initialization pass, before any step
    fn pre_init(&mut self, _engine: &Engine) -> anyhow::Result<()> {
        Ok(())
    }

    /// Second initialization pass, after every system's `pre_init`
    fn post_init(&mut self, _engine: &Engine) -> anyhow::Result<()> {
        Ok(())
    }

    /// Per-step logic
    fn step(&mut self, engine: &Engine, delta_time: f64) -> anyhow::Result<()>;

    /// Called after every system has stepped and the clock has advanced
    fn post_step(&mut self, _engine: &Engine) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the engine terminates
    fn terminate(&mut self, _engine: &Engine) {}

    /// Get the name of this system for diagnostics
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}
