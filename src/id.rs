/// Entity identifier. `0` is never allocated, so it is free to mean "none"
/// in external payloads.
pub type EntityId = u64;

/// Team identifier. Team `0` is reserved for neutral/leaderless entities.
pub type TeamId = u32;

pub const NEUTRAL_TEAM: TeamId = 0;

/// Monotonic ID generator for entities.
/// Guarantees ids are never reused within a match, including across snapshots.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    next: EntityId,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn starting_from(start: EntityId) -> Self {
        assert!(start >= 1, "IdGenerator: ids start at 1, got {start}");
        Self { next: start }
    }

    pub fn next_id(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next call to [`next_id`](Self::next_id) will return.
    pub fn peek(&self) -> EntityId {
        self.next
    }

    /// True if `id` has been handed out by this generator.
    pub fn has_issued(&self, id: EntityId) -> bool {
        id >= 1 && id < self.next
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
