//! # Mosaic ECS
//!
//! In-memory structured-record store built around archetypes:
//! - **Entities**: stable handles with generation-style version counters
//! - **Components**: registered once, identified by dense numeric ids
//! - **Archetypes**: one columnar storage node per distinct component set,
//!   connected by a memoized add/remove transition graph
//! - **Queries**: cached all/any/none filters with incrementally maintained
//!   archetype match lists
//!
//! The store is single-threaded and cooperative: query iteration runs in
//! descending row order so handlers may mutate the world mid-pass without
//! skipping or revisiting rows.

pub mod archetype;
pub mod component;
pub mod entity;
pub mod event;
pub mod query;
pub mod schedule;
pub mod world;

pub use archetype::{ArchetypeId, ArchetypeInfo};
pub use component::{Component, ComponentTypeId};
pub use entity::Entity;
pub use event::{ListenerId, WorldEvent};
pub use query::{QueryBuilder, QueryDescriptor, QueryId};
pub use schedule::{Schedule, System};
pub use world::{ComponentBundle, World, WorldConfig};

use thiserror::Error;

/// Errors surfaced by per-entity and query operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    #[error("Invalid entity handle {0:?}")]
    InvalidEntity(Entity),

    #[error("Component type `{0}` is not registered")]
    UnknownComponentType(&'static str),

    #[error("Entity {entity:?} already has component `{name}`")]
    DuplicateComponent { entity: Entity, name: &'static str },

    #[error("Entity {entity:?} does not have component `{name}`")]
    MissingComponent { entity: Entity, name: &'static str },
}

/// Result type for store operations
pub type EcsResult<T> = Result<T, EcsError>;
