//! World facade
//!
//! Composes the component registry, entity table, archetype graph, query
//! cache, and event listeners into the public record/component/query API.
//! Every per-entity operation validates its handle up front and performs all
//! precondition checks before touching storage, so a failed operation never
//! leaves an entity partially migrated.

use std::any::type_name;

use crate::archetype::{ArchetypeGraph, ArchetypeId, ArchetypeInfo};
use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::entity::{Entity, EntityTable};
use crate::event::{EventListeners, ListenerId, WorldEvent};
use crate::query::{QueryBuilder, QueryCache, QueryDescriptor, QueryId};
use crate::{EcsError, EcsResult};

/// Initial capacities for the world's internal tables
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub entity_capacity: usize,
    pub archetype_capacity: usize,
    pub query_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 512,
            archetype_capacity: 512,
            query_capacity: 512,
        }
    }
}

/// The store: all entities, components, archetypes, and cached queries
pub struct World {
    pub(crate) registry: ComponentRegistry,
    entities: EntityTable,
    graph: ArchetypeGraph,
    queries: QueryCache,
    events: EventListeners,
}

impl World {
    /// Create a world with default capacities
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create a world with explicit capacities
    pub fn with_config(config: WorldConfig) -> Self {
        let registry = ComponentRegistry::new();
        let graph = ArchetypeGraph::with_capacity(config.archetype_capacity, &registry);
        Self {
            registry,
            entities: EntityTable::with_capacity(config.entity_capacity),
            graph,
            queries: QueryCache::with_capacity(config.query_capacity),
            events: EventListeners::new(),
        }
    }

    fn ensure_valid(&self, entity: Entity) -> EcsResult<()> {
        if self.entities.is_valid(entity) {
            Ok(())
        } else {
            Err(EcsError::InvalidEntity(entity))
        }
    }

    // ---- component types ----

    /// Register a component type, returning its stable dense id.
    /// Registering the same type again returns the existing id.
    pub fn register_component<T: Component>(&mut self) -> ComponentTypeId {
        let id = self.registry.register::<T>();
        tracing::trace!(
            component = id.index(),
            name = self.registry.info(id).name,
            "registered component type"
        );
        id
    }

    /// Resolve a registered component type to its id
    pub fn component_id<T: Component>(&self) -> EcsResult<ComponentTypeId> {
        self.registry.lookup::<T>()
    }

    /// Number of registered component types
    pub fn component_type_count(&self) -> usize {
        self.registry.len()
    }

    // ---- entities ----

    /// Create an entity with no components
    pub fn spawn(&mut self) -> Entity {
        let entity = self.entities.create();
        let row = self.graph.archetype_mut(ArchetypeId::EMPTY).push_entity(entity);
        self.entities.set_location(entity, ArchetypeId::EMPTY, row);
        self.events.emit(&WorldEvent::EntityCreated(entity));
        entity
    }

    /// Create an entity and add every component of the bundle.
    ///
    /// If any component type is unregistered the entity is despawned again
    /// and the error returned.
    pub fn spawn_with<B: ComponentBundle>(&mut self, bundle: B) -> EcsResult<Entity> {
        let entity = self.spawn();
        if let Err(err) = bundle.insert(self, entity) {
            let _ = self.despawn(entity);
            return Err(err);
        }
        Ok(entity)
    }

    /// Destroy an entity, removing its row from its archetype and recycling
    /// the handle's index under a newer version
    pub fn despawn(&mut self, entity: Entity) -> EcsResult<()> {
        self.ensure_valid(entity)?;
        let (archetype, row) = self.entities.location(entity);
        if let Some(displaced) = self.graph.archetype_mut(archetype).swap_remove_row(row) {
            self.entities.set_row(displaced, row);
        }
        self.entities.destroy(entity);
        self.events.emit(&WorldEvent::EntityDestroyed(entity));
        Ok(())
    }

    /// Check handle validity (stale or out-of-range handles are invalid)
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.entities.is_valid(entity)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.live_count()
    }

    // ---- components on entities ----

    /// Add a component, migrating the entity to the archetype reached by the
    /// add edge. Fails with `DuplicateComponent` if already present; the
    /// entity is left untouched on any error.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        let comp = self.registry.lookup::<T>()?;
        self.ensure_valid(entity)?;
        let (src, row) = self.entities.location(entity);
        if self.graph.archetype(src).has_component(comp) {
            return Err(EcsError::DuplicateComponent {
                entity,
                name: type_name::<T>(),
            });
        }
        let dst = self.graph.edge_add(src, comp, &self.registry);
        let (new_row, displaced) = self.graph.migrate(src, dst, row, None);
        if let Some(displaced) = displaced {
            self.entities.set_row(displaced, row);
        }
        self.graph.archetype_mut(dst).push_value(comp, value);
        self.entities.set_location(entity, dst, new_row);
        self.events.emit(&WorldEvent::ComponentAdded {
            entity,
            component: comp,
        });
        Ok(())
    }

    /// Remove a component, migrating the entity to the archetype reached by
    /// the remove edge. Fails with `MissingComponent` if absent; the entity
    /// is left untouched on any error.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> EcsResult<()> {
        let comp = self.registry.lookup::<T>()?;
        self.ensure_valid(entity)?;
        let (src, row) = self.entities.location(entity);
        if !self.graph.archetype(src).has_component(comp) {
            return Err(EcsError::MissingComponent {
                entity,
                name: type_name::<T>(),
            });
        }
        let dst = self.graph.edge_remove(src, comp, &self.registry);
        let (new_row, displaced) = self.graph.migrate(src, dst, row, Some(comp));
        if let Some(displaced) = displaced {
            self.entities.set_row(displaced, row);
        }
        self.entities.set_location(entity, dst, new_row);
        self.events.emit(&WorldEvent::ComponentRemoved {
            entity,
            component: comp,
        });
        Ok(())
    }

    /// Overwrite an existing component value in place
    pub fn set_component<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        *self.get_component_mut::<T>(entity)? = value;
        Ok(())
    }

    /// Shared reference to a component value
    pub fn get_component<T: Component>(&self, entity: Entity) -> EcsResult<&T> {
        let comp = self.registry.lookup::<T>()?;
        self.ensure_valid(entity)?;
        let (archetype, row) = self.entities.location(entity);
        self.graph
            .archetype(archetype)
            .column::<T>(comp)
            .and_then(|column| column.data.get(row))
            .ok_or(EcsError::MissingComponent {
                entity,
                name: type_name::<T>(),
            })
    }

    /// Mutable reference directly into the owning column; valid until the
    /// next structural change to that archetype
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        let comp = self.registry.lookup::<T>()?;
        self.ensure_valid(entity)?;
        let (archetype, row) = self.entities.location(entity);
        self.graph
            .archetype_mut(archetype)
            .column_mut::<T>(comp)
            .and_then(|column| column.data.get_mut(row))
            .ok_or(EcsError::MissingComponent {
                entity,
                name: type_name::<T>(),
            })
    }

    /// Whether the entity's archetype contains the component
    pub fn has_component<T: Component>(&self, entity: Entity) -> EcsResult<bool> {
        let comp = self.registry.lookup::<T>()?;
        self.ensure_valid(entity)?;
        let (archetype, _) = self.entities.location(entity);
        Ok(self.graph.archetype(archetype).has_component(comp))
    }

    // ---- archetypes ----

    /// Summary of the archetype currently holding the entity
    pub fn archetype_info(&self, entity: Entity) -> EcsResult<ArchetypeInfo> {
        self.ensure_valid(entity)?;
        let (id, _) = self.entities.location(entity);
        let archetype = self.graph.archetype(id);
        Ok(ArchetypeInfo {
            id,
            component_count: archetype.component_count(),
            entity_count: archetype.entity_count(),
        })
    }

    /// Resolve a component set to its canonical archetype, creating nodes as
    /// needed. Input order and duplicates do not affect the result.
    pub fn get_or_create_archetype(&mut self, ids: &[ComponentTypeId]) -> ArchetypeId {
        let mut sorted: smallvec::SmallVec<[ComponentTypeId; 8]> = ids.iter().copied().collect();
        sorted.sort_unstable();
        sorted.dedup();
        self.graph.get_or_create(&sorted, &self.registry)
    }

    /// Number of archetype nodes, including the empty one
    pub fn archetype_count(&self) -> usize {
        self.graph.len()
    }

    // ---- queries ----

    /// Start building a query descriptor against this world's registry
    pub fn query_builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    /// Intern a descriptor: semantically equal descriptors return the same
    /// query for the world's lifetime
    pub fn get_query(&mut self, descriptor: QueryDescriptor) -> QueryId {
        let (id, created) = self.queries.get_or_insert(descriptor);
        if created {
            self.events.emit(&WorldEvent::QueryCreated(id));
        }
        id
    }

    /// Number of cached queries
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Whether the entity's current archetype satisfies the query
    pub fn query_matches(&self, query: QueryId, entity: Entity) -> EcsResult<bool> {
        self.ensure_valid(entity)?;
        let (archetype, _) = self.entities.location(entity);
        Ok(self
            .queries
            .state(query)
            .descriptor()
            .matches(self.graph.archetype(archetype)))
    }

    /// Number of live entities in matching archetypes (refreshes first)
    pub fn query_entity_count(&mut self, query: QueryId) -> usize {
        self.queries.refresh(query, &self.graph);
        self.queries
            .state(query)
            .archetypes()
            .iter()
            .map(|&id| self.graph.archetype(id).entity_count())
            .sum()
    }

    /// Visit every matching row, iterating each archetype's rows in
    /// descending index order.
    ///
    /// The handler may mutate the world freely. Row removal is
    /// swap-with-last, so removing the currently visited row never skips or
    /// revisits a not-yet-visited row. Rows appended to a matching archetype
    /// during the pass land above the cursor and are not visited until the
    /// next pass; the same holds for archetypes created during the pass.
    pub fn for_each<F>(&mut self, query: QueryId, mut handler: F)
    where
        F: FnMut(&mut World, Entity),
    {
        self.queries.refresh(query, &self.graph);
        let matched: Vec<ArchetypeId> = self.queries.state(query).archetypes().to_vec();
        for archetype in matched {
            let mut row = self.graph.archetype(archetype).entity_count();
            while row > 0 {
                row -= 1;
                // The handler may have removed rows; clamp before indexing.
                let len = self.graph.archetype(archetype).entity_count();
                if row >= len {
                    row = len;
                    continue;
                }
                let entity = self.graph.archetype(archetype).entities()[row];
                handler(self, entity);
            }
        }
    }

    /// Materialize the handles of every matching row into `out`
    pub fn collect_entities(&mut self, query: QueryId, out: &mut Vec<Entity>) {
        self.queries.refresh(query, &self.graph);
        out.clear();
        for &archetype in self.queries.state(query).archetypes() {
            out.extend_from_slice(self.graph.archetype(archetype).entities());
        }
    }

    /// Materialize one component's values across every matching row into
    /// `out`; archetypes lacking the component are skipped
    pub fn collect_components<T: Component + Clone>(
        &mut self,
        query: QueryId,
        out: &mut Vec<T>,
    ) -> EcsResult<()> {
        let comp = self.registry.lookup::<T>()?;
        self.queries.refresh(query, &self.graph);
        out.clear();
        for &archetype in self.queries.state(query).archetypes() {
            if let Some(column) = self.graph.archetype(archetype).column::<T>(comp) {
                out.extend_from_slice(&column.data);
            }
        }
        Ok(())
    }

    // ---- events ----

    /// Attach a lifecycle listener; fires synchronously after each mutation
    pub fn add_event_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&WorldEvent) + 'static,
    {
        self.events.add(Box::new(listener))
    }

    /// Detach a listener; returns false if it was already removed
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.events.remove(id)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of component values inserted together at spawn
pub trait ComponentBundle {
    fn insert(self, world: &mut World, entity: Entity) -> EcsResult<()>;
}

macro_rules! impl_bundle {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentBundle for ($($name,)+) {
            #[allow(non_snake_case)]
            fn insert(self, world: &mut World, entity: Entity) -> EcsResult<()> {
                let ($($name,)+) = self;
                $(world.add_component(entity, $name)?;)+
                Ok(())
            }
        }
    };
}

impl_bundle!(T0);
impl_bundle!(T0, T1);
impl_bundle!(T0, T1, T2);
impl_bundle!(T0, T1, T2, T3);
