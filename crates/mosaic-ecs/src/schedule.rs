//! Update units and the schedule that drives them
//!
//! A system is set up once against a world (typically compiling the queries
//! it will reuse) and then updated once per tick. The schedule owns an
//! ordered list of systems; systems added after the first run are
//! initialized before their first update.

use crate::world::World;

/// One update-able unit driven by a [`Schedule`]
pub trait System {
    /// One-time setup; compile and retain queries here
    fn init(&mut self, _world: &mut World) {}

    /// Per-tick update
    fn update(&mut self, world: &mut World);
}

struct Entry {
    system: Box<dyn System>,
    initialized: bool,
}

/// Ordered list of systems, driven once per frame
pub struct Schedule {
    entries: Vec<Entry>,
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a system; it runs after every previously added system
    pub fn add_system(&mut self, system: impl System + 'static) {
        self.entries.push(Entry {
            system: Box::new(system),
            initialized: false,
        });
    }

    /// Run pending one-time setups without updating
    pub fn init(&mut self, world: &mut World) {
        for entry in &mut self.entries {
            if !entry.initialized {
                entry.system.init(world);
                entry.initialized = true;
            }
        }
    }

    /// Run one tick: initialize any system that has not been set up yet,
    /// then update every system in order.
    pub fn update(&mut self, world: &mut World) {
        for entry in &mut self.entries {
            if !entry.initialized {
                entry.system.init(world);
                entry.initialized = true;
            }
            entry.system.update(world);
        }
    }

    /// Number of systems in the schedule
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the schedule holds no systems
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}
