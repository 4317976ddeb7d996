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
//! Families: component-set predicates over entities
//!
//! A family matches an entity that has **all** of one set of component
//! types, **at least one** of a second set (when that set is non-empty) and
//! **none** of a third. Families are interned process-wide: building the
//! same three sets twice yields the same family with the same dense index.
//!
//! ```
//! use ecs_runtime::ecs::{Component, Family};
//!
//! struct Position;
//! impl Component for Position {}
//! struct Velocity;
//! impl Component for Velocity {}
//! struct Frozen;
//! impl Component for Frozen {}
//!
//! let moving = Family::all::<(Position, Velocity)>().exclude::<(Frozen,)>().get();
//! let again = Family::all::<(Position, Velocity)>().exclude::<(Frozen,)>().get();
//! assert_eq!(moving, again);
//! assert_eq!(moving.index(), again.index());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::debug;

use crate::bits::Bits;
use crate::ecs::component::{ComponentSet, ComponentType};
use crate::ecs::Entity;

struct FamilyInner {
    all: Bits,
    one: Bits,
    exclude: Bits,
    index: usize,
}

/// An interned component-set predicate
#[derive(Clone)]
pub struct Family {
    inner: Arc<FamilyInner>,
}

#[derive(Default)]
struct FamilyRegistry {
    families: HashMap<(Bits, Bits, Bits), Family>,
}

fn registry() -> MutexGuard<'static, FamilyRegistry> {
    static REGISTRY: OnceLock<Mutex<FamilyRegistry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| Mutex::new(FamilyRegistry::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

impl Family {
    /// Start a builder requiring every type in `S`
    pub fn all<S: ComponentSet>() -> FamilyBuilder {
        FamilyBuilder::new().all::<S>()
    }

    /// Start a builder requiring at least one type in `S`
    pub fn one<S: ComponentSet>() -> FamilyBuilder {
        FamilyBuilder::new().one::<S>()
    }

    /// Start a builder rejecting every type in `S`
    pub fn exclude<S: ComponentSet>() -> FamilyBuilder {
        FamilyBuilder::new().exclude::<S>()
    }

    /// The family matching every entity
    pub fn everything() -> Family {
        FamilyBuilder::new().get()
    }

    /// Dense, process-wide index of this family
    pub fn index(&self) -> usize {
        self.inner.index
    }

    /// Whether the entity's current components satisfy this family
    pub fn matches(&self, entity: &Entity) -> bool {
        self.matches_bits(&entity.component_bits())
    }

    /// Whether a component bitset satisfies this family
    pub fn matches_bits(&self, components: &Bits) -> bool {
        let inner = &*self.inner;
        components.contains_all(&inner.all)
            && (inner.one.is_empty() || inner.one.intersects(components))
            && !inner.exclude.intersects(components)
    }

    /// Types that must all be present
    pub fn all_bits(&self) -> &Bits {
        &self.inner.all
    }

    /// Types of which at least one must be present
    pub fn one_bits(&self) -> &Bits {
        &self.inner.one
    }

    /// Types that must be absent
    pub fn exclude_bits(&self) -> &Bits {
        &self.inner.exclude
    }
}

impl PartialEq for Family {
    fn eq(&self, other: &Self) -> bool {
        self.inner.index == other.inner.index
    }
}

impl Eq for Family {}

impl Hash for Family {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.index.hash(state);
    }
}

impl fmt::Debug for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Family")
            .field("index", &self.inner.index)
            .field("all", &self.inner.all)
            .field("one", &self.inner.one)
            .field("exclude", &self.inner.exclude)
            .finish()
    }
}

/// Builder for [`Family`]
///
/// Each setter replaces the corresponding set; [`FamilyBuilder::get`]
/// returns the interned family.
#[derive(Debug, Clone, Default)]
pub struct FamilyBuilder {
    all: Bits,
    one: Bits,
    exclude: Bits,
}

impl FamilyBuilder {
    /// An empty builder, equivalent to [`Family::everything`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require every type in `S`
    pub fn all<S: ComponentSet>(mut self) -> Self {
        self.all = ComponentType::bits_for::<S>();
        self
    }

    /// Require at least one type in `S`
    pub fn one<S: ComponentSet>(mut self) -> Self {
        self.one = ComponentType::bits_for::<S>();
        self
    }

    /// Reject every type in `S`
    pub fn exclude<S: ComponentSet>(mut self) -> Self {
        self.exclude = ComponentType::bits_for::<S>();
        self
    }

    /// Require every listed type
    pub fn all_of(mut self, types: &[ComponentType]) -> Self {
        self.all = ComponentType::bits_for_types(types);
        self
    }

    /// Require at least one listed type
    pub fn one_of(mut self, types: &[ComponentType]) -> Self {
        self.one = ComponentType::bits_for_types(types);
        self
    }

    /// Reject every listed type
    pub fn exclude_of(mut self, types: &[ComponentType]) -> Self {
        self.exclude = ComponentType::bits_for_types(types);
        self
    }

    /// The interned family for the configured sets
    pub fn get(self) -> Family {
        let mut registry = registry();
        let next_index = registry.families.len();
        let key = (self.all, self.one, self.exclude);
        if let Some(family) = registry.families.get(&key) {
            return family.clone();
        }
        let family = Family {
            inner: Arc::new(FamilyInner {
                all: key.0.clone(),
                one: key.1.clone(),
                exclude: key.2.clone(),
                index: next_index,
            }),
        };
        debug!(index = next_index, "registered family");
        registry.families.insert(key, family.clone());
        family
    }
}
