//! Entity handles and the slot table
//!
//! An entity is an opaque `{index, version}` pair. The table owns one slot
//! per index holding the signed version counter and the entity's current
//! storage location (archetype + row). Destroyed indices are recycled; the
//! version's sign marks liveness and its magnitude grows on every destroy so
//! stale handles can never validate again.

use crate::archetype::ArchetypeId;

/// Handle identifying one record in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    index: u32,
    version: i32,
}

impl Entity {
    /// Get the slot index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Get the version counter (positive while the handle was live)
    pub fn version(&self) -> i32 {
        self.version
    }
}

/// One slot per entity index
#[derive(Debug)]
struct Slot {
    version: i32,
    archetype: ArchetypeId,
    row: usize,
}

/// Owns the handle-to-location mapping and the recycle pool
#[derive(Debug)]
pub(crate) struct EntityTable {
    slots: Vec<Slot>,
    recycled: Vec<u32>,
}

impl EntityTable {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            recycled: Vec::new(),
        }
    }

    /// Allocate a fresh handle, reusing a recycled index when available.
    ///
    /// The new handle starts located in the empty archetype; the caller is
    /// responsible for inserting the row and setting the location.
    pub(crate) fn create(&mut self) -> Entity {
        if let Some(index) = self.recycled.pop() {
            let slot = &mut self.slots[index as usize];
            slot.version = -slot.version;
            slot.archetype = ArchetypeId::EMPTY;
            slot.row = 0;
            Entity {
                index,
                version: slot.version,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                version: 1,
                archetype: ArchetypeId::EMPTY,
                row: 0,
            });
            Entity { index, version: 1 }
        }
    }

    /// Flip the slot dead and return the index to the recycle pool.
    ///
    /// The magnitude keeps growing so the recycled slot hands out a higher
    /// version next time; at `i32::MAX` it wraps to -1 instead of
    /// overflowing. The caller must have removed the archetype row first.
    pub(crate) fn destroy(&mut self, entity: Entity) {
        let slot = &mut self.slots[entity.index as usize];
        slot.version = if slot.version == i32::MAX {
            -1
        } else {
            -(slot.version + 1)
        };
        self.recycled.push(entity.index);
    }

    /// A handle is valid iff its index is in range and the stored version is
    /// positive and equal to the handle's.
    pub(crate) fn is_valid(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|slot| slot.version > 0 && slot.version == entity.version)
    }

    /// Current storage location of a valid handle
    pub(crate) fn location(&self, entity: Entity) -> (ArchetypeId, usize) {
        let slot = &self.slots[entity.index as usize];
        (slot.archetype, slot.row)
    }

    pub(crate) fn set_location(&mut self, entity: Entity, archetype: ArchetypeId, row: usize) {
        let slot = &mut self.slots[entity.index as usize];
        slot.archetype = archetype;
        slot.row = row;
    }

    /// Fix up the row of an entity displaced by a swap-remove
    pub(crate) fn set_row(&mut self, entity: Entity, row: usize) {
        self.slots[entity.index as usize].row = row;
    }

    /// Number of live entities
    pub(crate) fn live_count(&self) -> usize {
        self.slots.len() - self.recycled.len()
    }
}
