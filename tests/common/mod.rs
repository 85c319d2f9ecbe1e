#![allow(dead_code)]

use std::f64::consts::TAU;

use warband_arena::model::{Cohesion, Health};
use warband_arena::{ArenaConfig, EntityId, FixedTimestep, LeaderSpec, Vec2, World, standard_world};

/// Default tuning with no random opening shards.
pub fn quiet_config() -> ArenaConfig {
    let mut config = ArenaConfig::default();
    config.shard.initial_count = 0;
    config
}

/// `teams` AI warbands on a ring around the centre, three warriors each.
pub fn ai_skirmish(config: ArenaConfig, seed: u64, teams: u32) -> World {
    let mut world = standard_world(config, seed);
    let radius = 30.0;
    for i in 0..teams {
        let angle = TAU * f64::from(i) / f64::from(teams);
        let aggression = (f64::from(i) + 0.5) / f64::from(teams);
        let spec = LeaderSpec::new(i + 1, Vec2::from_angle(angle) * radius).ai(aggression);
        let leader = world.spawn_leader(spec);
        for _ in 0..3 {
            world.spawn_warrior(leader);
        }
    }
    world
}

pub fn run_ticks(world: &mut World, ticks: u32) {
    for _ in 0..ticks {
        world.update(FixedTimestep::DEFAULT_STEP);
    }
}

/// Panics with a tick-stamped message if any per-entity invariant is broken.
pub fn assert_invariants(world: &World) {
    let tick = world.tick();
    for (id, hp) in world.store::<Health>().iter() {
        assert!(world.is_alive(id), "tick {tick}: health on dead entity {id}");
        assert!(
            hp.current > 0.0 && hp.current <= hp.max,
            "tick {tick}: entity {id} health {} outside (0, {}]",
            hp.current,
            hp.max
        );
    }
    for (id, c) in world.store::<Cohesion>().iter() {
        assert!(
            (0.0..=c.max).contains(&c.current),
            "tick {tick}: entity {id} morale {} outside [0, {}]",
            c.current,
            c.max
        );
    }
    let cap = world.config().shard.army_cap;
    for leader in world.leaders() {
        assert!(
            world.army_size(leader) <= cap,
            "tick {tick}: leader {leader} army {} over cap {cap}",
            world.army_size(leader)
        );
    }
}

pub fn alive_count_of<T: warband_arena::model::Component>(world: &World) -> usize {
    world
        .store::<T>()
        .iter()
        .filter(|(id, _)| world.is_alive(*id))
        .count()
}

pub fn position(world: &World, id: EntityId) -> Vec2 {
    world.components().position(id).unwrap()
}
