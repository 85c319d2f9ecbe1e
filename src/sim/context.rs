use crate::bus::EventBus;
use crate::config::ArenaConfig;
use crate::id::EntityId;
use crate::model::{Component, Components, Entities, GameEvent, Vec2};
use crate::rng::SimRng;

/// Everything a system may touch during one call, borrowed from the world.
///
/// Systems never see the `World` itself, so a test can fabricate a context
/// from loose parts (see `testutil`).
pub struct TickContext<'a> {
    pub entities: &'a mut Entities,
    pub components: &'a mut Components,
    pub rng: &'a mut SimRng,
    pub events: &'a mut EventBus,
    pub config: &'a ArenaConfig,
    pub tick: u64,
    /// Scaled seconds for this tick.
    pub dt: f64,
    pub match_time: f64,
}

impl TickContext<'_> {
    pub fn spawn(&mut self) -> EntityId {
        self.entities.create()
    }

    /// Deferred destroy. Returns false if already doomed.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        self.entities.destroy(id)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.is_alive(id)
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.emit(event);
    }

    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.components.get::<T>(id)
    }

    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.components.get_mut::<T>(id)
    }

    /// # Panics
    /// Panics if `id` is not alive.
    pub fn insert<T: Component>(&mut self, id: EntityId, value: T) {
        assert!(
            self.entities.is_alive(id),
            "insert {}: entity {id} is not alive",
            T::STORE.as_str()
        );
        self.components.insert(id, value);
    }

    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        self.components.position(id)
    }

    /// Live ids holding a `T`, ascending.
    pub fn alive_with<T: Component>(&self) -> Vec<EntityId> {
        self.components
            .store::<T>()
            .iter()
            .map(|(id, _)| id)
            .filter(|&id| self.entities.is_alive(id))
            .collect()
    }
}
