//! Archetype nodes and the transition graph
//!
//! One archetype exists per distinct component set, holding one dense column
//! per component plus an entity list parallel to the rows. Archetypes are
//! append-only and never deleted. Add/remove transitions between archetypes
//! are memoized as bidirectional edges, so after first use a component
//! add/remove resolves its target node in O(1).

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::component::{Column, Component, ComponentRegistry, ComponentTypeId, TypedColumn};
use crate::entity::Entity;

/// Identifier of an archetype node; 0 is always the empty component set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchetypeId(pub(crate) u32);

impl ArchetypeId {
    /// The canonical empty archetype, created at world construction
    pub const EMPTY: ArchetypeId = ArchetypeId(0);

    /// Get the id as a dense array index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Read-only summary of an archetype, as reported by the world facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchetypeInfo {
    pub id: ArchetypeId,
    pub component_count: usize,
    pub entity_count: usize,
}

/// Columnar storage node for one component set
pub(crate) struct Archetype {
    id: ArchetypeId,
    /// Sorted ascending, duplicate-free
    comp_ids: SmallVec<[ComponentTypeId; 8]>,
    /// Parallel to `comp_ids`
    columns: Vec<Box<dyn Column>>,
    /// Parallel to rows: row i belongs to entities[i]
    entities: Vec<Entity>,
    /// Archetype reached by adding a component to this set
    edges_add: AHashMap<ComponentTypeId, ArchetypeId>,
    /// Archetype reached by removing a component from this set
    edges_remove: AHashMap<ComponentTypeId, ArchetypeId>,
}

impl Archetype {
    fn new(id: ArchetypeId, comp_ids: &[ComponentTypeId], registry: &ComponentRegistry) -> Self {
        let columns = comp_ids
            .iter()
            .map(|&comp| (registry.info(comp).new_column)())
            .collect();
        Self {
            id,
            comp_ids: SmallVec::from_slice(comp_ids),
            columns,
            entities: Vec::new(),
            edges_add: AHashMap::new(),
            edges_remove: AHashMap::new(),
        }
    }

    pub(crate) fn id(&self) -> ArchetypeId {
        self.id
    }

    pub(crate) fn component_count(&self) -> usize {
        self.comp_ids.len()
    }

    pub(crate) fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub(crate) fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub(crate) fn has_component(&self, comp: ComponentTypeId) -> bool {
        self.comp_ids.binary_search(&comp).is_ok()
    }

    fn column_index(&self, comp: ComponentTypeId) -> Option<usize> {
        self.comp_ids.binary_search(&comp).ok()
    }

    pub(crate) fn column<T: Component>(&self, comp: ComponentTypeId) -> Option<&TypedColumn<T>> {
        let index = self.column_index(comp)?;
        self.columns[index].as_any().downcast_ref::<TypedColumn<T>>()
    }

    pub(crate) fn column_mut<T: Component>(
        &mut self,
        comp: ComponentTypeId,
    ) -> Option<&mut TypedColumn<T>> {
        let index = self.column_index(comp)?;
        self.columns[index]
            .as_any_mut()
            .downcast_mut::<TypedColumn<T>>()
    }

    /// Append a value to the column that migration left one row short
    pub(crate) fn push_value<T: Component>(&mut self, comp: ComponentTypeId, value: T) {
        self.column_mut::<T>(comp)
            .expect("column type mismatch")
            .data
            .push(value);
    }

    pub(crate) fn push_entity(&mut self, entity: Entity) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        row
    }

    /// Swap-remove a row across every column and the entity list.
    ///
    /// Returns the entity displaced into `row` (the former last row), if any,
    /// so the caller can fix up its location.
    pub(crate) fn swap_remove_row(&mut self, row: usize) -> Option<Entity> {
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }
}

/// The set of archetype nodes plus the memoized transition edges
pub(crate) struct ArchetypeGraph {
    archetypes: Vec<Archetype>,
}

impl ArchetypeGraph {
    /// Create the graph with the empty archetype preallocated at id 0
    pub(crate) fn with_capacity(capacity: usize, registry: &ComponentRegistry) -> Self {
        let mut archetypes = Vec::with_capacity(capacity.max(1));
        archetypes.push(Archetype::new(ArchetypeId::EMPTY, &[], registry));
        Self { archetypes }
    }

    pub(crate) fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub(crate) fn archetype(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.index()]
    }

    pub(crate) fn archetype_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.index()]
    }

    /// Walk from the empty node following add edges, creating any missing
    /// node along the way. `comp_ids` must be sorted ascending without
    /// duplicates; equal sets always resolve to the same node.
    pub(crate) fn get_or_create(
        &mut self,
        comp_ids: &[ComponentTypeId],
        registry: &ComponentRegistry,
    ) -> ArchetypeId {
        debug_assert!(comp_ids.windows(2).all(|pair| pair[0] < pair[1]));
        let mut current = ArchetypeId::EMPTY;
        for (prefix_len, &comp) in comp_ids.iter().enumerate() {
            let next = self.archetype(current).edges_add.get(&comp).copied();
            current = match next {
                Some(next) => next,
                None => self.create_node(current, &comp_ids[..=prefix_len], comp, registry),
            };
        }
        current
    }

    fn create_node(
        &mut self,
        prev: ArchetypeId,
        comp_ids: &[ComponentTypeId],
        added: ComponentTypeId,
        registry: &ComponentRegistry,
    ) -> ArchetypeId {
        let id = ArchetypeId(self.archetypes.len() as u32);
        let mut node = Archetype::new(id, comp_ids, registry);
        node.edges_remove.insert(added, prev);
        self.archetypes.push(node);
        self.archetype_mut(prev).edges_add.insert(added, id);
        tracing::debug!(
            archetype = id.0,
            components = comp_ids.len(),
            "created archetype node"
        );
        id
    }

    /// Archetype reached by adding `comp` to `src`'s set, memoized.
    ///
    /// The caller must have verified that `src` does not contain `comp`.
    pub(crate) fn edge_add(
        &mut self,
        src: ArchetypeId,
        comp: ComponentTypeId,
        registry: &ComponentRegistry,
    ) -> ArchetypeId {
        if let Some(&target) = self.archetype(src).edges_add.get(&comp) {
            return target;
        }
        debug_assert!(!self.archetype(src).has_component(comp));
        let src_ids = &self.archetype(src).comp_ids;
        let mut comp_ids: SmallVec<[ComponentTypeId; 8]> = SmallVec::with_capacity(src_ids.len() + 1);
        let mut added = false;
        for &existing in src_ids {
            if !added && comp < existing {
                comp_ids.push(comp);
                added = true;
            }
            comp_ids.push(existing);
        }
        if !added {
            comp_ids.push(comp);
        }
        let target = self.get_or_create(&comp_ids, registry);
        self.archetype_mut(src).edges_add.insert(comp, target);
        self.archetype_mut(target).edges_remove.insert(comp, src);
        target
    }

    /// Archetype reached by removing `comp` from `src`'s set, memoized.
    ///
    /// The caller must have verified that `src` contains `comp`.
    pub(crate) fn edge_remove(
        &mut self,
        src: ArchetypeId,
        comp: ComponentTypeId,
        registry: &ComponentRegistry,
    ) -> ArchetypeId {
        if let Some(&target) = self.archetype(src).edges_remove.get(&comp) {
            return target;
        }
        debug_assert!(self.archetype(src).has_component(comp));
        let comp_ids: SmallVec<[ComponentTypeId; 8]> = self
            .archetype(src)
            .comp_ids
            .iter()
            .copied()
            .filter(|&existing| existing != comp)
            .collect();
        let target = self.get_or_create(&comp_ids, registry);
        self.archetype_mut(src).edges_remove.insert(comp, target);
        self.archetype_mut(target).edges_add.insert(comp, src);
        target
    }

    /// Move one row from `src` to a fresh row appended at `dst`.
    ///
    /// Every column shared by both archetypes transfers its value with one
    /// virtual call; a column named by `skip` is dropped instead (component
    /// removal). Returns the new row index in `dst` and the entity displaced
    /// into `row` at the source, if any.
    pub(crate) fn migrate(
        &mut self,
        src_id: ArchetypeId,
        dst_id: ArchetypeId,
        row: usize,
        skip: Option<ComponentTypeId>,
    ) -> (usize, Option<Entity>) {
        let (src, dst) = self.pair_mut(src_id, dst_id);
        let comp_ids = src.comp_ids.clone();
        for (index, &comp) in comp_ids.iter().enumerate() {
            if Some(comp) == skip {
                src.columns[index].swap_remove(row);
                continue;
            }
            let dst_index = dst.column_index(comp).expect("target archetype missing column");
            src.columns[index].move_row(row, dst.columns[dst_index].as_mut());
        }
        let entity = src.entities.swap_remove(row);
        let displaced = src.entities.get(row).copied();
        let new_row = dst.push_entity(entity);
        (new_row, displaced)
    }

    /// Disjoint mutable borrows of two distinct archetypes
    fn pair_mut(&mut self, a: ArchetypeId, b: ArchetypeId) -> (&mut Archetype, &mut Archetype) {
        debug_assert_ne!(a, b);
        let (a, b) = (a.index(), b.index());
        if a < b {
            let (lo, hi) = self.archetypes.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.archetypes.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Health(u32);
    struct Mana(u32);
    struct Stamina(u32);

    fn registry_with_three() -> (ComponentRegistry, ComponentTypeId, ComponentTypeId, ComponentTypeId)
    {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<Health>();
        let b = registry.register::<Mana>();
        let c = registry.register::<Stamina>();
        (registry, a, b, c)
    }

    #[test]
    fn test_empty_archetype_is_id_zero() {
        let registry = ComponentRegistry::new();
        let graph = ArchetypeGraph::with_capacity(8, &registry);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.archetype(ArchetypeId::EMPTY).component_count(), 0);
    }

    #[test]
    fn test_get_or_create_is_canonical() {
        let (registry, a, b, c) = registry_with_three();
        let mut graph = ArchetypeGraph::with_capacity(8, &registry);

        let first = graph.get_or_create(&[a, b, c], &registry);
        let second = graph.get_or_create(&[a, b, c], &registry);

        assert_eq!(first, second);
        // Walk created the {a} and {a,b} prefixes as well.
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_edge_add_reaches_walked_node() {
        let (registry, a, b, _) = registry_with_three();
        let mut graph = ArchetypeGraph::with_capacity(8, &registry);

        let ab = graph.get_or_create(&[a, b], &registry);
        let only_b = graph.get_or_create(&[b], &registry);

        // Adding `a` to {b} must land on the same canonical {a,b} node even
        // though the walk reaches it through the {a} prefix.
        let via_edge = graph.edge_add(only_b, a, &registry);
        assert_eq!(via_edge, ab);
        // Memoized on second use.
        assert_eq!(graph.edge_add(only_b, a, &registry), ab);
    }

    #[test]
    fn test_edge_remove_links_back() {
        let (registry, a, b, _) = registry_with_three();
        let mut graph = ArchetypeGraph::with_capacity(8, &registry);

        let ab = graph.get_or_create(&[a, b], &registry);
        let only_a = graph.get_or_create(&[a], &registry);

        assert_eq!(graph.edge_remove(ab, b, &registry), only_a);
        // The reverse edge was recorded too.
        assert_eq!(graph.edge_add(only_a, b, &registry), ab);
    }

    #[test]
    fn test_migrate_moves_values_and_reports_displaced() {
        let (registry, a, b, _) = registry_with_three();
        let mut graph = ArchetypeGraph::with_capacity(8, &registry);
        let only_a = graph.get_or_create(&[a], &registry);
        let ab = graph.get_or_create(&[a, b], &registry);

        let mut table = crate::entity::EntityTable::with_capacity(4);
        let e0 = table.create();
        let e1 = table.create();

        {
            let src = graph.archetype_mut(only_a);
            src.push_entity(e0);
            src.push_value(a, Health(10));
            src.push_entity(e1);
            src.push_value(a, Health(20));
        }

        let (new_row, displaced) = graph.migrate(only_a, ab, 0, None);
        assert_eq!(new_row, 0);
        // e1 was swapped into row 0 of the source.
        assert_eq!(displaced, Some(e1));
        assert_eq!(graph.archetype(only_a).entity_count(), 1);
        assert_eq!(graph.archetype(ab).entity_count(), 1);
        assert_eq!(graph.archetype(ab).column::<Health>(a).unwrap().data[0].0, 10);
    }

    #[test]
    fn test_migrate_with_skip_drops_column_value() {
        let (registry, a, b, _) = registry_with_three();
        let mut graph = ArchetypeGraph::with_capacity(8, &registry);
        let only_a = graph.get_or_create(&[a], &registry);
        let ab = graph.get_or_create(&[a, b], &registry);

        let mut table = crate::entity::EntityTable::with_capacity(4);
        let entity = table.create();
        {
            let dst = graph.archetype_mut(ab);
            dst.push_entity(entity);
            dst.push_value(a, Health(5));
            dst.push_value(b, Mana(9));
        }

        let (new_row, displaced) = graph.migrate(ab, only_a, 0, Some(b));
        assert_eq!(new_row, 0);
        assert_eq!(displaced, None);
        assert_eq!(graph.archetype(only_a).column::<Health>(a).unwrap().data[0].0, 5);
        assert_eq!(graph.archetype(ab).entity_count(), 0);
    }

    #[test]
    fn test_swap_remove_row_keeps_columns_parallel() {
        let (registry, a, b, _) = registry_with_three();
        let mut graph = ArchetypeGraph::with_capacity(8, &registry);
        let ab = graph.get_or_create(&[a, b], &registry);

        let mut table = crate::entity::EntityTable::with_capacity(4);
        let e0 = table.create();
        let e1 = table.create();
        {
            let node = graph.archetype_mut(ab);
            node.push_entity(e0);
            node.push_value(a, Health(1));
            node.push_value(b, Mana(2));
            node.push_entity(e1);
            node.push_value(a, Health(3));
            node.push_value(b, Mana(4));
        }

        let displaced = graph.archetype_mut(ab).swap_remove_row(0);
        assert_eq!(displaced, Some(e1));
        let node = graph.archetype(ab);
        assert_eq!(node.entity_count(), 1);
        assert_eq!(node.column::<Health>(a).unwrap().data[0].0, 3);
        assert_eq!(node.column::<Mana>(b).unwrap().data[0].0, 4);
    }
}
