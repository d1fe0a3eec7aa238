//! Component registration and columnar storage
//!
//! Each component type is registered once and assigned a dense numeric id.
//! Registration captures a column factory for the type; per-row transfer
//! between archetypes goes through the type-erased [`Column`] trait, so the
//! hot migration path never consults runtime type identity.

use std::any::{Any, TypeId, type_name};

use ahash::AHashMap;

use crate::{EcsError, EcsResult};

/// Marker trait for component types
pub trait Component: 'static {}

impl<T: 'static> Component for T {}

/// Dense identifier assigned at registration, starting at 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeId(pub(crate) u16);

impl ComponentTypeId {
    /// Get the id as a dense array index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Type-erased storage for one component column inside an archetype
pub(crate) trait Column {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn len(&self) -> usize;

    /// Remove a row by overwriting it with the last row
    fn swap_remove(&mut self, row: usize);

    /// Move one row's value into the matching column of another archetype.
    ///
    /// Removes `row` from `self` (swap-with-last) and appends the value to
    /// `dst`, which must be a column of the same concrete type.
    fn move_row(&mut self, row: usize, dst: &mut dyn Column);
}

/// Dense `Vec<T>` column
pub(crate) struct TypedColumn<T: Component> {
    pub(crate) data: Vec<T>,
}

impl<T: Component> TypedColumn<T> {
    fn new() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T: Component> Column for TypedColumn<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn swap_remove(&mut self, row: usize) {
        self.data.swap_remove(row);
    }

    fn move_row(&mut self, row: usize, dst: &mut dyn Column) {
        let value = self.data.swap_remove(row);
        dst.as_any_mut()
            .downcast_mut::<TypedColumn<T>>()
            .expect("column type mismatch")
            .data
            .push(value);
    }
}

fn new_column<T: Component>() -> Box<dyn Column> {
    Box::new(TypedColumn::<T>::new())
}

/// Per-type data captured at registration
pub(crate) struct ComponentInfo {
    pub(crate) name: &'static str,
    pub(crate) new_column: fn() -> Box<dyn Column>,
}

/// Assigns stable dense ids to component types
pub(crate) struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_type: AHashMap<TypeId, ComponentTypeId>,
}

impl ComponentRegistry {
    pub(crate) fn new() -> Self {
        Self {
            infos: Vec::new(),
            by_type: AHashMap::new(),
        }
    }

    /// Register a component type, returning the existing id if already known
    pub(crate) fn register<T: Component>(&mut self) -> ComponentTypeId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.by_type.get(&type_id) {
            return id;
        }
        let id = ComponentTypeId(self.infos.len() as u16);
        self.infos.push(ComponentInfo {
            name: type_name::<T>(),
            new_column: new_column::<T>,
        });
        self.by_type.insert(type_id, id);
        id
    }

    /// Resolve a type to its id without registering it
    pub(crate) fn lookup<T: Component>(&self) -> EcsResult<ComponentTypeId> {
        self.by_type
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or(EcsError::UnknownComponentType(type_name::<T>()))
    }

    pub(crate) fn info(&self, id: ComponentTypeId) -> &ComponentInfo {
        &self.infos[id.index()]
    }

    pub(crate) fn len(&self) -> usize {
        self.infos.len()
    }
}
