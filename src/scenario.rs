use std::cell::RefCell;
use std::rc::Rc;

use crate::config::ArenaConfig;
use crate::id::{EntityId, TeamId};
use crate::model::*;
use crate::sim::runner::{FixedTimestep, standard_systems};
use crate::sim::spawn::{self, LeaderSpec};

/// IDs returned by [`Scenario::add_warband`].
#[derive(Debug, Clone, PartialEq)]
pub struct WarbandIds {
    pub leader: EntityId,
    pub warriors: Vec<EntityId>,
}

/// Shared log of every event delivered after [`Scenario::record_events`].
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<GameEvent>>>,
}

impl EventLog {
    pub fn all(&self) -> Vec<GameEvent> {
        self.events.borrow().clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<GameEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|ev| ev.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|ev| ev.kind() == kind).count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

// -- Builder-style ref types --

/// Typed reference to a leader in a [`Scenario`], enabling chained setup.
///
/// Created by [`Scenario::leader`] (creation) or [`Scenario::leader_mut`].
/// Call [`.id()`](LeaderRef::id) to end the chain.
pub struct LeaderRef<'a> {
    scenario: &'a mut Scenario,
    id: EntityId,
}

impl LeaderRef<'_> {
    pub fn health(self, v: f64) -> Self {
        if let Some(h) = self.scenario.world.components.health.get_mut(self.id) {
            h.current = v.min(h.max);
        }
        self
    }

    pub fn formation(self, v: FormationType) -> Self {
        if let Some(b) = self.scenario.world.components.banner_leader.get_mut(self.id) {
            b.formation = v;
        }
        self
    }

    pub fn target(self, v: Vec2) -> Self {
        self.scenario.world.set_leader_target(self.id, v);
        self
    }

    pub fn facing(self, rotation: f64) -> Self {
        if let Some(t) = self.scenario.world.components.transform.get_mut(self.id) {
            t.rotation = rotation;
        }
        self
    }

    /// Add `n` warriors in formation slots.
    pub fn warriors(self, n: u32) -> Self {
        for _ in 0..n {
            self.scenario.world.spawn_warrior(self.id);
        }
        self
    }

    /// Escape hatch: edit the world directly around this leader.
    pub fn with(self, f: impl FnOnce(&mut World, EntityId)) -> Self {
        f(&mut self.scenario.world, self.id);
        self
    }

    pub fn id(self) -> EntityId {
        self.id
    }
}

/// Typed reference to a warrior in a [`Scenario`].
pub struct WarriorRef<'a> {
    scenario: &'a mut Scenario,
    id: EntityId,
}

impl WarriorRef<'_> {
    pub fn position(self, v: Vec2) -> Self {
        if let Some(t) = self.scenario.world.components.transform.get_mut(self.id) {
            t.position = v;
        }
        self
    }

    pub fn health(self, v: f64) -> Self {
        if let Some(h) = self.scenario.world.components.health.get_mut(self.id) {
            h.current = v.min(h.max);
        }
        self
    }

    pub fn morale(self, v: f64) -> Self {
        if let Some(c) = self.scenario.world.components.cohesion.get_mut(self.id) {
            c.current = v.clamp(0.0, c.max);
        }
        self
    }

    pub fn with(self, f: impl FnOnce(&mut World, EntityId)) -> Self {
        f(&mut self.scenario.world, self.id);
        self
    }

    pub fn id(self) -> EntityId {
        self.id
    }
}

/// Fluent builder for arena setups.
///
/// Entities are placed before the standard systems are registered, so a
/// scenario fully controls the opening state; set `shard.initial_count` in
/// the config to zero for a board with no random shards.
pub struct Scenario {
    world: World,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    /// Default tuning, seed 1.
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::default(), 1)
    }

    pub fn with_config(config: ArenaConfig, seed: u64) -> Self {
        Self {
            world: World::new(config, seed),
        }
    }

    // -- Entity creation --

    /// Player-driven leader (no AI).
    pub fn leader(&mut self, team: TeamId, position: Vec2) -> LeaderRef<'_> {
        let id = self.world.spawn_leader(LeaderSpec::new(team, position));
        LeaderRef { scenario: self, id }
    }

    /// Leader driven by an AI of the given aggression.
    pub fn ai_leader(&mut self, team: TeamId, position: Vec2, aggression: f64) -> LeaderRef<'_> {
        let id = self
            .world
            .spawn_leader(LeaderSpec::new(team, position).ai(aggression));
        LeaderRef { scenario: self, id }
    }

    pub fn leader_mut(&mut self, id: EntityId) -> LeaderRef<'_> {
        assert!(
            self.world.leaders().contains(&id),
            "leader_mut: entity {id} is not a live leader"
        );
        LeaderRef { scenario: self, id }
    }

    /// Leader plus `warriors` followers, all at `position`.
    pub fn add_warband(&mut self, team: TeamId, position: Vec2, warriors: u32) -> WarbandIds {
        let leader = self.leader(team, position).id();
        let warriors = (0..warriors).map(|_| self.world.spawn_warrior(leader)).collect();
        WarbandIds { leader, warriors }
    }

    pub fn warrior(&mut self, leader: EntityId) -> WarriorRef<'_> {
        let id = self.world.spawn_warrior(leader);
        WarriorRef { scenario: self, id }
    }

    pub fn leaderless_warrior(&mut self, team: TeamId, position: Vec2) -> WarriorRef<'_> {
        let id = self
            .world
            .with_context(|ctx| spawn::leaderless_warrior(ctx, team, position));
        WarriorRef { scenario: self, id }
    }

    pub fn warrior_mut(&mut self, id: EntityId) -> WarriorRef<'_> {
        assert!(
            self.world.is_alive(id) && self.world.components.has::<Unit>(id),
            "warrior_mut: entity {id} is not a live warrior"
        );
        WarriorRef { scenario: self, id }
    }

    pub fn add_shard(&mut self, position: Vec2) -> EntityId {
        self.world.spawn_ambient_shard(position)
    }

    pub fn add_fountain(
        &mut self,
        position: Vec2,
        interval: u32,
        radius: f64,
        max_active: u32,
    ) -> EntityId {
        self.world.spawn_fountain(position, interval, radius, max_active)
    }

    /// Start capturing events. Earlier setup events are not included.
    pub fn record_events(&mut self) -> EventLog {
        let log = EventLog::default();
        let sink = log.events.clone();
        self.world
            .events_mut()
            .subscribe_all(move |ev, _| sink.borrow_mut().push(ev.clone()));
        log
    }

    // -- Running --

    /// Register the standard systems and hand back the world.
    pub fn build(mut self) -> World {
        for system in standard_systems() {
            self.world.add_system(system);
        }
        self.world
    }

    /// Build and advance `ticks` fixed steps.
    pub fn run(self, ticks: u32) -> World {
        let mut world = self.build();
        for _ in 0..ticks {
            world.update(FixedTimestep::DEFAULT_STEP);
        }
        world
    }

    /// Borrow the world for inspection.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Borrow the world mutably for additional modifications.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}
