use std::fmt;

use super::components::{BannerLeader, FormationType};
use super::entities::Entities;
use super::event::GameEvent;
use super::store::{Component, ComponentStore, Components};
use super::vec2::Vec2;
use crate::bus::EventBus;
use crate::config::ArenaConfig;
use crate::id::{EntityId, TeamId};
use crate::rng::SimRng;
use crate::sim::context::TickContext;
use crate::sim::helpers;
use crate::sim::spawn::{self, LeaderSpec};
use crate::sim::system::SimSystem;

/// The entity/component/system container.
///
/// Owns every piece of simulation state: the entity arena, the component
/// tables, the RNG, the clock and the ordered system list. Systems run in
/// registration order and only ever see a [`TickContext`] borrowed from here.
pub struct World {
    pub(crate) entities: Entities,
    pub(crate) components: Components,
    pub(crate) rng: SimRng,
    pub(crate) events: EventBus,
    pub(crate) config: ArenaConfig,
    pub(crate) systems: Vec<Box<dyn SimSystem>>,
    pub(crate) tick: u64,
    pub(crate) match_time: f64,
    pub(crate) paused: bool,
    pub(crate) time_scale: f64,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("match_time", &self.match_time)
            .field("alive", &self.entities.alive_count())
            .field("systems", &self.system_names())
            .field("paused", &self.paused)
            .finish()
    }
}

impl World {
    pub fn new(config: ArenaConfig, seed: u64) -> Self {
        Self {
            entities: Entities::new(),
            components: Components::default(),
            rng: SimRng::new(seed),
            events: EventBus::new(),
            config,
            systems: Vec::new(),
            tick: 0,
            match_time: 0.0,
            paused: false,
            time_scale: 1.0,
        }
    }

    // -- Systems and clock --

    /// Append `system` to the run order and call its `init` hook.
    pub fn add_system(&mut self, mut system: Box<dyn SimSystem>) {
        tracing::debug!(system = system.name(), "add_system");
        let mut ctx = self.context(0.0);
        system.init(&mut ctx);
        self.systems.push(system);
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    /// Advance one tick of `dt` seconds (before time scaling). No-op while paused.
    pub fn update(&mut self, dt: f64) {
        if self.paused {
            return;
        }
        let dt = dt * self.time_scale;
        self.tick += 1;
        self.match_time += dt;

        let mut systems = std::mem::take(&mut self.systems);
        for system in systems.iter_mut() {
            let mut ctx = self.context(dt);
            system.update(&mut ctx);
        }
        self.systems = systems;

        self.sweep();
    }

    /// Remove every doomed entity from the arena and all tables, then let each
    /// system release whatever it tracked for it.
    fn sweep(&mut self) {
        let doomed = self.entities.sweep();
        if doomed.is_empty() {
            return;
        }
        for &id in &doomed {
            self.components.remove_entity(id);
            for system in self.systems.iter_mut() {
                system.on_entity_destroyed(id);
            }
        }
        tracing::trace!(tick = self.tick, count = doomed.len(), "swept entities");
    }

    /// Run `f` with a zero-length context, for spawning from outside a tick.
    pub fn with_context<R>(&mut self, f: impl FnOnce(&mut TickContext) -> R) -> R {
        let mut ctx = self.context(0.0);
        f(&mut ctx)
    }

    fn context(&mut self, dt: f64) -> TickContext<'_> {
        TickContext {
            entities: &mut self.entities,
            components: &mut self.components,
            rng: &mut self.rng,
            events: &mut self.events,
            config: &self.config,
            tick: self.tick,
            dt,
            match_time: self.match_time,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn match_time(&self) -> f64 {
        self.match_time
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Negative, NaN and infinite scales clamp to zero.
    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = if scale.is_finite() { scale.max(0.0) } else { 0.0 };
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    // -- Entities and components --

    pub fn create_entity(&mut self) -> EntityId {
        self.entities.create()
    }

    /// Mark `id` for removal at the end of the current (or next) tick.
    ///
    /// # Panics
    /// Panics if `id` was never allocated.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        self.entities.destroy(id)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.is_alive(id)
    }

    pub fn alive_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.alive()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// # Panics
    /// Panics if `id` is stale (already swept) or was never allocated.
    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.assert_not_stale(id, "get");
        self.components.get::<T>(id)
    }

    /// # Panics
    /// Panics if `id` is stale (already swept) or was never allocated.
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.assert_not_stale(id, "get_mut");
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

    pub fn remove<T: Component>(&mut self, id: EntityId) -> Option<T> {
        self.assert_not_stale(id, "remove");
        self.components.remove::<T>(id)
    }

    pub fn store<T: Component>(&self) -> &ComponentStore<T> {
        self.components.store::<T>()
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Raw table access for setup code. Bypasses the liveness checks.
    pub fn components_mut(&mut self) -> &mut Components {
        &mut self.components
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    fn assert_not_stale(&self, id: EntityId, op: &str) {
        assert!(
            self.entities.is_alive(id) || self.entities.is_doomed(id),
            "{op}: entity {id} not found"
        );
    }

    // -- Events, RNG, config --

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn rng(&self) -> &SimRng {
        &self.rng
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    // -- Leaders --

    /// Live leaders in id order.
    pub fn leaders(&self) -> Vec<EntityId> {
        self.components
            .banner_leader
            .ids()
            .into_iter()
            .filter(|&id| self.entities.is_alive(id))
            .collect()
    }

    pub fn leader_of_team(&self, team: TeamId) -> Option<EntityId> {
        self.components
            .banner_leader
            .iter()
            .find(|(id, leader)| leader.team == team && self.entities.is_alive(*id))
            .map(|(id, _)| id)
    }

    /// Live warriors currently following `leader`.
    pub fn army_size(&self, leader: EntityId) -> u32 {
        helpers::army_size(&self.components, &self.entities, leader)
    }

    /// Point `leader` at `target`, clamped to the map.
    ///
    /// # Panics
    /// Panics if `leader` is not a live leader.
    pub fn set_leader_target(&mut self, leader: EntityId, target: Vec2) {
        self.assert_leader(leader, "set_leader_target");
        let target = self.config.map.clamp(target);
        if let Some(movable) = self.components.movable.get_mut(leader) {
            movable.target = Some(target);
            movable.arrived = false;
        }
    }

    /// # Panics
    /// Panics if `leader` is not a live leader.
    pub fn clear_leader_target(&mut self, leader: EntityId) {
        self.assert_leader(leader, "clear_leader_target");
        if let Some(movable) = self.components.movable.get_mut(leader) {
            movable.target = None;
            movable.arrived = true;
        }
    }

    /// Switch formation and emit `formation_changed`.
    ///
    /// # Panics
    /// Panics if `leader` is not a live leader.
    pub fn set_formation(&mut self, leader: EntityId, formation: FormationType) {
        self.assert_leader(leader, "set_formation");
        if let Some(banner) = self.components.banner_leader.get_mut(leader) {
            banner.formation = formation;
        }
        self.events.emit(GameEvent::FormationChanged { leader, formation });
    }

    fn assert_leader(&self, id: EntityId, op: &str) {
        assert!(
            self.entities.is_alive(id) && self.components.has::<BannerLeader>(id),
            "{op}: entity {id} is not a live leader"
        );
    }

    // -- Spawning --

    pub fn spawn_leader(&mut self, spec: LeaderSpec) -> EntityId {
        self.with_context(|ctx| spawn::leader(ctx, &spec))
    }

    /// New warrior at `leader`'s position in its lowest free slot.
    ///
    /// # Panics
    /// Panics if `leader` is not a live leader.
    pub fn spawn_warrior(&mut self, leader: EntityId) -> EntityId {
        self.assert_leader(leader, "spawn_warrior");
        self.with_context(|ctx| spawn::warrior(ctx, leader))
    }

    pub fn spawn_ambient_shard(&mut self, position: Vec2) -> EntityId {
        self.with_context(|ctx| {
            let position = ctx.config.map.clamp(position);
            spawn::shard(ctx, position, super::ShardOrigin::Ambient)
        })
    }

    pub fn spawn_fountain(
        &mut self,
        position: Vec2,
        interval: u32,
        radius: f64,
        max_active: u32,
    ) -> EntityId {
        self.with_context(|ctx| spawn::fountain(ctx, position, interval, radius, max_active))
    }
}
