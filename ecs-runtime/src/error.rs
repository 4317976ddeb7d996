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
//! Error types for the runtime

use thiserror::Error;

use crate::ecs::EntityId;

/// Usage violations and system failures reported by the engine
#[derive(Debug, Error)]
pub enum EcsError {
    /// The entity is already registered with this engine
    #[error("{0} is already registered with this engine")]
    EntityAlreadyAdded(EntityId),

    /// The entity is currently registered with a different engine
    #[error("{0} is registered with another engine")]
    EntityOwnedByAnotherEngine(EntityId),

    /// `update` was called while the engine was already updating
    #[error("cannot update an engine that is already updating")]
    NestedUpdate,

    /// `update` was called from inside a family listener
    #[error("cannot update an engine while it is notifying family listeners")]
    UpdateWhileNotifying,

    /// `terminate` was called while the engine was updating
    #[error("cannot terminate an engine while it is updating")]
    TerminateWhileUpdating,

    /// A system hook returned an error
    #[error("system `{system}` failed")]
    SystemFailed {
        /// Name of the failing system
        system: String,
        /// The error returned by the system
        #[source]
        source: anyhow::Error,
    },
}

/// Result alias used throughout the crate
pub type Result<T, E = EcsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_messages_name_the_entity() {
        let err = EcsError::EntityAlreadyAdded(EntityId::new(12));
        assert_eq!(err.to_string(), "Entity(12) is already registered with this engine");
    }

    #[test]
    fn test_system_failure_keeps_source() {
        let err = EcsError::SystemFailed {
            system: "MovementSystem".to_string(),
            source: anyhow::anyhow!("velocity missing"),
        };
        assert_eq!(err.to_string(), "system `MovementSystem` failed");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("velocity missing"));
    }
}
