//! Query descriptors, the query cache, and incremental matching
//!
//! A query is compiled once from its all/any/none component-id sets. The
//! sets are canonicalized (sorted, deduplicated) and hashed by content, so
//! semantically equal descriptors intern to the same cached query. Each
//! cached query keeps the list of matching archetypes and a marker of how
//! many archetypes it has examined; archetypes are append-only, so catching
//! up is a suffix scan that never rescans old nodes.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::archetype::{Archetype, ArchetypeGraph, ArchetypeId};
use crate::component::{Component, ComponentTypeId};
use crate::world::World;
use crate::{EcsError, EcsResult};

/// Canonicalized all/any/none filter over component sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    all: SmallVec<[ComponentTypeId; 8]>,
    any: SmallVec<[ComponentTypeId; 8]>,
    none: SmallVec<[ComponentTypeId; 8]>,
    hash: u64,
}

impl QueryDescriptor {
    pub(crate) fn new(
        mut all: SmallVec<[ComponentTypeId; 8]>,
        mut any: SmallVec<[ComponentTypeId; 8]>,
        mut none: SmallVec<[ComponentTypeId; 8]>,
    ) -> Self {
        all.sort_unstable();
        all.dedup();
        any.sort_unstable();
        any.dedup();
        none.sort_unstable();
        none.dedup();
        let hash = content_hash(&all, &any, &none);
        Self {
            all,
            any,
            none,
            hash,
        }
    }

    /// Content hash; equal for descriptors with equal canonical sets
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// An archetype matches iff it contains every `all` id, none of the
    /// `none` ids, and at least one `any` id when `any` is non-empty.
    pub(crate) fn matches(&self, archetype: &Archetype) -> bool {
        for &comp in &self.all {
            if !archetype.has_component(comp) {
                return false;
            }
        }
        for &comp in &self.none {
            if archetype.has_component(comp) {
                return false;
            }
        }
        if self.any.is_empty() {
            return true;
        }
        self.any.iter().any(|&comp| archetype.has_component(comp))
    }
}

fn content_hash(
    all: &[ComponentTypeId],
    any: &[ComponentTypeId],
    none: &[ComponentTypeId],
) -> u64 {
    let mut hash = (all.len() + any.len() + none.len()) as u64;
    for comp in all {
        hash = hash.wrapping_mul(13).wrapping_add(comp.0 as u64);
    }
    for comp in any {
        hash = hash.wrapping_mul(17).wrapping_add(comp.0 as u64);
    }
    for comp in none {
        hash = hash.wrapping_mul(23).wrapping_sub(comp.0 as u64);
    }
    hash
}

/// Builder resolving component types against a world's registry
pub struct QueryBuilder<'w> {
    world: &'w World,
    all: SmallVec<[ComponentTypeId; 8]>,
    any: SmallVec<[ComponentTypeId; 8]>,
    none: SmallVec<[ComponentTypeId; 8]>,
    error: Option<EcsError>,
}

impl<'w> QueryBuilder<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            all: SmallVec::new(),
            any: SmallVec::new(),
            none: SmallVec::new(),
            error: None,
        }
    }

    fn resolve<T: Component>(&mut self) -> Option<ComponentTypeId> {
        match self.world.component_id::<T>() {
            Ok(id) => Some(id),
            Err(err) => {
                self.error.get_or_insert(err);
                None
            }
        }
    }

    /// Require the component to be present
    pub fn with_all<T: Component>(mut self) -> Self {
        if let Some(id) = self.resolve::<T>() {
            self.all.push(id);
        }
        self
    }

    /// Require at least one of the `any` components to be present
    pub fn with_any<T: Component>(mut self) -> Self {
        if let Some(id) = self.resolve::<T>() {
            self.any.push(id);
        }
        self
    }

    /// Require the component to be absent
    pub fn with_none<T: Component>(mut self) -> Self {
        if let Some(id) = self.resolve::<T>() {
            self.none.push(id);
        }
        self
    }

    /// Id-based variant of [`Self::with_all`]
    pub fn with_all_ids(mut self, ids: &[ComponentTypeId]) -> Self {
        self.all.extend_from_slice(ids);
        self
    }

    /// Id-based variant of [`Self::with_any`]
    pub fn with_any_ids(mut self, ids: &[ComponentTypeId]) -> Self {
        self.any.extend_from_slice(ids);
        self
    }

    /// Id-based variant of [`Self::with_none`]
    pub fn with_none_ids(mut self, ids: &[ComponentTypeId]) -> Self {
        self.none.extend_from_slice(ids);
        self
    }

    /// Canonicalize into a descriptor; fails if any named type was never
    /// registered.
    pub fn build(self) -> EcsResult<QueryDescriptor> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(QueryDescriptor::new(self.all, self.any, self.none)),
        }
    }
}

/// Handle to a cached query, stable for the world's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(pub(crate) u32);

impl QueryId {
    /// Get the id as a dense array index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One cached query: descriptor, match list, and catch-up marker
pub(crate) struct QueryState {
    descriptor: QueryDescriptor,
    archetypes: Vec<ArchetypeId>,
    /// Number of archetypes examined so far
    seen_archetypes: usize,
}

impl QueryState {
    pub(crate) fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub(crate) fn archetypes(&self) -> &[ArchetypeId] {
        &self.archetypes
    }
}

/// Interns descriptors by content hash and owns the cached match lists
pub(crate) struct QueryCache {
    states: Vec<QueryState>,
    /// Hash buckets; almost always one entry, but the content hash is weak
    /// enough to collide across different descriptors
    by_hash: AHashMap<u64, SmallVec<[QueryId; 1]>>,
}

impl QueryCache {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            states: Vec::with_capacity(capacity),
            by_hash: AHashMap::new(),
        }
    }

    /// Return the cached query for the descriptor, or allocate one.
    /// The boolean is true when a new query was created.
    ///
    /// A hash hit is confirmed by comparing descriptors, so two descriptors
    /// whose weak content hashes collide still get distinct queries.
    pub(crate) fn get_or_insert(&mut self, descriptor: QueryDescriptor) -> (QueryId, bool) {
        if let Some(ids) = self.by_hash.get(&descriptor.hash) {
            for &id in ids {
                if self.states[id.index()].descriptor == descriptor {
                    return (id, false);
                }
            }
        }
        let id = QueryId(self.states.len() as u32);
        self.by_hash.entry(descriptor.hash).or_default().push(id);
        self.states.push(QueryState {
            descriptor,
            archetypes: Vec::new(),
            seen_archetypes: 0,
        });
        tracing::debug!(query = id.0, "compiled query");
        (id, true)
    }

    /// Examine archetypes created since the last refresh and append the
    /// matching ones. Strictly incremental; already-listed archetypes are
    /// never revisited.
    pub(crate) fn refresh(&mut self, query: QueryId, graph: &ArchetypeGraph) {
        let state = &mut self.states[query.index()];
        if state.seen_archetypes >= graph.len() {
            return;
        }
        for index in state.seen_archetypes..graph.len() {
            let archetype = graph.archetype(ArchetypeId(index as u32));
            if state.descriptor.matches(archetype) {
                state.archetypes.push(archetype.id());
            }
        }
        state.seen_archetypes = graph.len();
    }

    pub(crate) fn state(&self, query: QueryId) -> &QueryState {
        &self.states[query.index()]
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }
}
