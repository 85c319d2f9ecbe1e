use std::collections::BTreeMap;

use crate::id::{EntityId, IdGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Alive,
    /// Marked for destruction; swept at the end of the tick.
    Doomed,
}

/// Entity arena. Only live and doomed ids are kept; any issued id missing
/// from `slots` is dead. Ids are never reused, so a dead id stays dead
/// forever and stale lookups are detectable.
#[derive(Debug, Clone, Default)]
pub struct Entities {
    id_gen: IdGenerator,
    slots: BTreeMap<EntityId, Slot>,
    doomed: Vec<EntityId>,
}

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> EntityId {
        let id = self.id_gen.next_id();
        self.slots.insert(id, Slot::Alive);
        id
    }

    /// Mark `id` for end-of-tick removal. Returns false if it was already
    /// doomed or dead.
    ///
    /// # Panics
    /// Panics if `id` was never allocated.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        assert!(
            self.id_gen.has_issued(id),
            "destroy: entity {id} was never allocated"
        );
        match self.slots.get_mut(&id) {
            Some(slot @ Slot::Alive) => {
                *slot = Slot::Doomed;
                self.doomed.push(id);
                true
            }
            _ => false,
        }
    }

    /// Alive and not marked for destruction.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.slots.get(&id) == Some(&Slot::Alive)
    }

    /// Marked for destruction this tick but not yet swept.
    pub fn is_doomed(&self, id: EntityId) -> bool {
        self.slots.get(&id) == Some(&Slot::Doomed)
    }

    pub fn alive(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots
            .iter()
            .filter(|(_, s)| **s == Slot::Alive)
            .map(|(id, _)| *id)
    }

    pub fn alive_count(&self) -> usize {
        self.slots.values().filter(|s| **s == Slot::Alive).count()
    }

    pub fn doomed(&self) -> &[EntityId] {
        &self.doomed
    }

    pub fn next_id(&self) -> EntityId {
        self.id_gen.peek()
    }

    /// Tombstone every doomed entity and return them in destruction order.
    pub fn sweep(&mut self) -> Vec<EntityId> {
        let doomed = std::mem::take(&mut self.doomed);
        for id in &doomed {
            self.slots.remove(id);
        }
        doomed
    }

    /// Rebuild the arena from a snapshot. Nothing is sized from `next_id`,
    /// so a corrupt counter is rejected rather than allocated.
    pub fn from_parts(
        next_id: EntityId,
        alive: &[EntityId],
        doomed: &[EntityId],
    ) -> Result<Self, String> {
        if next_id == 0 || next_id == EntityId::MAX {
            return Err(format!("next_entity_id {next_id} is outside the id space"));
        }
        let mut slots = BTreeMap::new();
        let listed = alive
            .iter()
            .map(|&id| (id, Slot::Alive))
            .chain(doomed.iter().map(|&id| (id, Slot::Doomed)));
        for (id, slot) in listed {
            if id == 0 || id >= next_id {
                return Err(format!(
                    "entity {id} is outside the allocated range 1..{next_id}"
                ));
            }
            if slots.insert(id, slot).is_some() {
                return Err(format!("entity {id} listed twice"));
            }
        }
        Ok(Self {
            id_gen: IdGenerator::starting_from(next_id),
            slots,
            doomed: doomed.to_vec(),
        })
    }
}
