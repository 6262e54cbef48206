// Copyright 2024 Saptak Santra
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

//! Error types

use std::fmt;

use crate::component::ComponentId;

/// ECS error type
#[derive(Debug, Clone, PartialEq)]
pub enum EcsError {
    /// Entity not found (dead or never spawned)
    EntityNotFound,

    /// Component name was never registered in this world
    ComponentNotRegistered(String),

    /// Component id is not bound to any column
    UnknownComponentId(ComponentId),

    /// Component name or id is bound to a different Rust type
    ComponentTypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The same component appears twice in one query
    ConflictingAccess(ComponentId),

    /// Column is already locked by an enclosing query
    ComponentBorrowConflict(ComponentId),

    /// Event name was never registered
    EventNotRegistered(String),

    /// Resource not found
    ResourceNotFound(&'static str),

    /// Required asset missing at startup
    AssetNotFound(String),

    /// Invalid engine configuration
    ConfigError(String),

    /// A system reported failure
    SystemError { system: String, message: String },

    /// Execution-unit pool could not be built
    WorkerPoolError(String),

    /// IO error (file operations, etc.)
    IoError(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityNotFound => write!(f, "Entity not found"),
            EcsError::ComponentNotRegistered(name) => {
                write!(f, "Component not registered: {name}")
            }
            EcsError::UnknownComponentId(id) => write!(f, "Unknown component id: {}", id.index()),
            EcsError::ComponentTypeMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "Component '{name}' is bound to {expected}, requested as {found}"
            ),
            EcsError::ConflictingAccess(id) => write!(
                f,
                "Component {} requested more than once in a single query",
                id.index()
            ),
            EcsError::ComponentBorrowConflict(id) => write!(
                f,
                "Component {} is already borrowed by an enclosing query",
                id.index()
            ),
            EcsError::EventNotRegistered(name) => write!(f, "Event not registered: {name}"),
            EcsError::ResourceNotFound(name) => write!(f, "Resource not found: {name}"),
            EcsError::AssetNotFound(name) => write!(f, "Asset not found: {name}"),
            EcsError::ConfigError(msg) => write!(f, "Config error: {msg}"),
            EcsError::SystemError { system, message } => {
                write!(f, "System '{system}' failed: {message}")
            }
            EcsError::WorkerPoolError(msg) => write!(f, "Worker pool error: {msg}"),
            EcsError::IoError(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for EcsError {}

impl From<std::io::Error> for EcsError {
    fn from(err: std::io::Error) -> Self {
        EcsError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for EcsError {
    fn from(err: serde_json::Error) -> Self {
        EcsError::ConfigError(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
