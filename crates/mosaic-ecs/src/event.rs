//! Lifecycle notifications
//!
//! Optional observer callbacks attached to a world. Listeners fire
//! synchronously after the triggering mutation has completed; they are not
//! required for correctness of the store.

use crate::component::ComponentTypeId;
use crate::entity::Entity;
use crate::query::QueryId;

/// A lifecycle notification emitted by the world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    EntityCreated(Entity),
    EntityDestroyed(Entity),
    ComponentAdded {
        entity: Entity,
        component: ComponentTypeId,
    },
    ComponentRemoved {
        entity: Entity,
        component: ComponentTypeId,
    },
    QueryCreated(QueryId),
}

/// Handle for detaching a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered list of listener callbacks
pub(crate) struct EventListeners {
    entries: Vec<(ListenerId, Box<dyn FnMut(&WorldEvent)>)>,
    next_id: u64,
}

impl EventListeners {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub(crate) fn add(&mut self, listener: Box<dyn FnMut(&WorldEvent)>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Detach a listener; returns false if it was already removed
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Invoke every listener in registration order
    pub(crate) fn emit(&mut self, event: &WorldEvent) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
