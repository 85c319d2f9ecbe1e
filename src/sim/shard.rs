use std::f64::consts::TAU;

use serde_json::Value;

use super::context::TickContext;
use super::helpers;
use super::spawn;
use super::system::{SimSystem, parse_state};
use crate::id::{EntityId, TeamId};
use crate::model::{EssenceShard, GameEvent, ShardFountain, ShardOrigin, Transform, Vec2};

/// Peak bob height of a spinning shard.
const BOB_HEIGHT: f64 = 0.3;

/// Resource economy: initial batch, magnet pull, pickup into new warriors,
/// timed respawns and fountains.
#[derive(Debug, Default)]
pub struct ShardSystem {
    /// Ticks left for each pending ambient respawn, in queue order.
    respawn: Vec<u32>,
}

impl ShardSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_respawns(&self) -> usize {
        self.respawn.len()
    }

    fn tick_respawns(&mut self, ctx: &mut TickContext) {
        let mut due = 0;
        self.respawn.retain_mut(|left| {
            *left = left.saturating_sub(1);
            if *left == 0 {
                due += 1;
                false
            } else {
                true
            }
        });
        for _ in 0..due {
            spawn_ambient_shard(ctx);
        }
    }

    fn collect(&mut self, ctx: &mut TickContext) {
        let config = ctx.config;
        let cfg = &config.shard;

        for leader in helpers::live_leaders(ctx.components, ctx.entities) {
            for shard in ctx.alive_with::<EssenceShard>() {
                let Some(mut position) = ctx.position(shard) else {
                    continue;
                };
                let mut distance = position.distance(leader.position);
                if distance > cfg.magnet_radius {
                    continue;
                }

                let pull = (1.0 - distance / cfg.magnet_radius) * cfg.magnet_speed * ctx.dt;
                let toward = (leader.position - position).normalize_or_zero();
                position = position + toward * pull.min(distance);
                if let Some(t) = ctx.get_mut::<Transform>(shard) {
                    t.position = position;
                }
                distance = position.distance(leader.position);
                if distance > cfg.pickup_radius {
                    continue;
                }

                let Some(&EssenceShard { value, origin, .. }) = ctx.get::<EssenceShard>(shard) else {
                    continue;
                };
                let granted = grant_warriors(ctx, leader.id, leader.team, value);
                if origin == ShardOrigin::Ambient {
                    self.respawn.push(cfg.respawn_delay.max(1));
                }
                ctx.destroy(shard);
                tracing::trace!(shard, leader = leader.id, granted, "shard collected");
                ctx.emit(GameEvent::ShardCollected {
                    shard,
                    leader: leader.id,
                    team: leader.team,
                    granted,
                });
            }
        }
    }
}

impl SimSystem for ShardSystem {
    fn name(&self) -> &str {
        "shard"
    }

    fn init(&mut self, ctx: &mut TickContext) {
        for _ in 0..ctx.config.shard.initial_count {
            spawn_ambient_shard(ctx);
        }
    }

    fn update(&mut self, ctx: &mut TickContext) {
        animate(ctx);
        run_fountains(ctx);
        self.tick_respawns(ctx);
        self.collect(ctx);
    }

    fn save_state(&self) -> Option<Value> {
        serde_json::to_value(&self.respawn).ok()
    }

    fn load_state(&mut self, state: Option<&Value>) -> Result<(), serde_json::Error> {
        self.respawn = parse_state(state)?;
        Ok(())
    }
}

/// Spawn up to `value` warriors for `leader`, stopping at the army cap.
/// Returns whether any were created.
fn grant_warriors(ctx: &mut TickContext, leader: EntityId, team: TeamId, value: u32) -> bool {
    let cap = ctx.config.shard.army_cap;
    let mut army = helpers::army_size(ctx.components, ctx.entities, leader);
    let mut granted = false;
    for _ in 0..value {
        if army >= cap {
            break;
        }
        let warrior = spawn::warrior(ctx, leader);
        army += 1;
        granted = true;
        ctx.emit(GameEvent::WarriorJoined {
            leader,
            warrior,
            team,
            army_size: army,
        });
    }
    granted
}

fn spawn_ambient_shard(ctx: &mut TickContext) -> EntityId {
    let config = ctx.config;
    let position = spawn::random_point(ctx.rng, &config.map, config.shard.spawn_margin);
    spawn::shard(ctx, position, ShardOrigin::Ambient)
}

/// Drop one death shard in a ring around `position`, clamped to the map and
/// never on the exact death spot.
pub fn spawn_death_shard(ctx: &mut TickContext, position: Vec2) -> EntityId {
    let config = ctx.config;
    let cfg = &config.combat;
    let direction = ctx.rng.direction();
    let radius = ctx
        .rng
        .range_f64(cfg.death_shard_min_offset, cfg.death_shard_max_offset);
    let offset = direction * radius;

    let mut placed = config.map.clamp(position + offset);
    if placed.distance(position) < cfg.death_shard_min_offset * 0.5 {
        // Pinned against a corner; throw it the other way.
        placed = config.map.clamp(position - offset);
    }
    spawn::shard(ctx, placed, ShardOrigin::Death)
}

fn animate(ctx: &mut TickContext) {
    let step = ctx.config.shard.spin_speed * ctx.dt;
    for id in ctx.alive_with::<EssenceShard>() {
        let Some(shard) = ctx.get_mut::<EssenceShard>(id) else {
            continue;
        };
        shard.phase = (shard.phase + step).rem_euclid(TAU);
        let bob = BOB_HEIGHT * 0.5 * (1.0 + shard.phase.sin());
        if let Some(t) = ctx.get_mut::<Transform>(id) {
            t.elevation = bob;
            t.rotation = (t.rotation + step).rem_euclid(TAU);
        }
    }
}

fn run_fountains(ctx: &mut TickContext) {
    for fountain in ctx.alive_with::<ShardFountain>() {
        let Some(f) = ctx.get_mut::<ShardFountain>(fountain) else {
            continue;
        };
        f.countdown = f.countdown.saturating_sub(1);
        if f.countdown > 0 {
            continue;
        }
        f.countdown = f.interval;
        let (radius, max_active) = (f.radius, f.max_active);

        let active = ctx
            .alive_with::<EssenceShard>()
            .into_iter()
            .filter(|&s| {
                ctx.get::<EssenceShard>(s)
                    .is_some_and(|e| e.origin == ShardOrigin::Fountain { fountain })
            })
            .count() as u32;
        if active >= max_active {
            continue;
        }
        let Some(center) = ctx.position(fountain) else {
            continue;
        };
        let angle = ctx.rng.angle();
        let r = radius * ctx.rng.range_f64(0.0, 1.0).sqrt();
        let position = ctx.config.map.clamp(center + Vec2::from_angle(angle) * r);
        spawn::shard(ctx, position, ShardOrigin::Fountain { fountain });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::model::WarbandMember;
    use crate::sim::spawn::LeaderSpec;
    use crate::testutil::{Harness, events_named};

    fn bare() -> Harness {
        let mut config = ArenaConfig::default();
        config.shard.initial_count = 0;
        Harness::with_config(config)
    }

    fn shard_count(h: &Harness) -> usize {
        h.components
            .essence_shard
            .ids()
            .into_iter()
            .filter(|&id| h.entities.is_alive(id))
            .count()
    }

    #[test]
    fn initial_batch_respects_the_margin() {
        let mut h = Harness::new();
        let mut sys = ShardSystem::new();
        sys.init(&mut h.ctx());
        let cfg = h.config.clone();
        assert_eq!(shard_count(&h), cfg.shard.initial_count as usize);
        for (_, t) in h.components.transform.iter() {
            assert!(t.position.x.abs() <= cfg.map.half_width - cfg.shard.spawn_margin);
            assert!(t.position.y.abs() <= cfg.map.half_height - cfg.shard.spawn_margin);
        }
    }

    #[test]
    fn magnet_pulls_shards_in() {
        let mut h = bare();
        spawn::leader(&mut h.ctx(), &LeaderSpec::new(1, Vec2::ZERO));
        let shard = spawn::shard(&mut h.ctx(), Vec2::new(6.0, 0.0), ShardOrigin::Ambient);
        h.step(&mut ShardSystem::new());
        let x = h.components.transform.get(shard).unwrap().position.x;
        assert!(x < 6.0 && x > 5.0, "{x}");
    }

    #[test]
    fn pickup_spawns_a_warrior_and_queues_respawn() {
        let mut h = bare();
        let log = h.record_events();
        let leader = spawn::leader(&mut h.ctx(), &LeaderSpec::new(1, Vec2::ZERO));
        let shard = spawn::shard(&mut h.ctx(), Vec2::new(1.0, 0.0), ShardOrigin::Ambient);
        let mut sys = ShardSystem::new();
        h.step(&mut sys);

        assert!(!h.entities.is_alive(shard));
        assert_eq!(sys.pending_respawns(), 1);
        let joined = events_named(&log, "warrior_joined");
        assert_eq!(joined.len(), 1);
        let GameEvent::WarriorJoined { warrior, army_size, .. } = joined[0] else {
            panic!("unexpected event");
        };
        assert_eq!(army_size, 1);
        assert_eq!(
            h.components.warband_member.get(warrior),
            Some(&WarbandMember {
                leader: Some(leader),
                slot: 0,
                team: 1
            })
        );
        assert_eq!(
            events_named(&log, "shard_collected"),
            vec![GameEvent::ShardCollected {
                shard,
                leader,
                team: 1,
                granted: true
            }]
        );

        let delay = h.config.shard.respawn_delay;
        h.run(&mut sys, delay - 1);
        assert_eq!(shard_count(&h), 0);
        h.step(&mut sys);
        assert_eq!(shard_count(&h), 1);
        assert_eq!(sys.pending_respawns(), 0);
    }

    #[test]
    fn collecting_at_cap_creates_no_warrior() {
        let mut config = ArenaConfig::default();
        config.shard.initial_count = 0;
        config.shard.army_cap = 2;
        let mut h = Harness::with_config(config);
        let log = h.record_events();
        let leader = spawn::leader(&mut h.ctx(), &LeaderSpec::new(1, Vec2::ZERO));
        spawn::warrior(&mut h.ctx(), leader);
        spawn::warrior(&mut h.ctx(), leader);
        let shard = spawn::shard(&mut h.ctx(), Vec2::new(0.5, 0.0), ShardOrigin::Ambient);

        h.step(&mut ShardSystem::new());

        assert!(!h.entities.is_alive(shard));
        assert_eq!(helpers::army_size(&h.components, &h.entities, leader), 2);
        assert!(events_named(&log, "warrior_joined").is_empty());
        assert!(matches!(
            events_named(&log, "shard_collected")[..],
            [GameEvent::ShardCollected { granted: false, .. }]
        ));
    }

    #[test]
    fn death_shards_are_not_respawned() {
        let mut h = bare();
        spawn::leader(&mut h.ctx(), &LeaderSpec::new(1, Vec2::ZERO));
        spawn::shard(&mut h.ctx(), Vec2::new(0.5, 0.0), ShardOrigin::Death);
        let mut sys = ShardSystem::new();
        h.step(&mut sys);
        assert_eq!(sys.pending_respawns(), 0);
    }

    #[test]
    fn death_shard_lands_in_the_ring_on_the_map() {
        let mut h = bare();
        let (lo, hi) = (
            h.config.combat.death_shard_min_offset,
            h.config.combat.death_shard_max_offset,
        );
        for _ in 0..200 {
            let id = spawn_death_shard(&mut h.ctx(), Vec2::new(10.0, -10.0));
            let p = h.components.transform.get(id).unwrap().position;
            let d = p.distance(Vec2::new(10.0, -10.0));
            assert!(d >= lo - 1e-9 && d <= hi + 1e-9, "{d}");
        }
        let corner = Vec2::new(100.0, 100.0);
        for _ in 0..200 {
            let id = spawn_death_shard(&mut h.ctx(), corner);
            let p = h.components.transform.get(id).unwrap().position;
            assert!(p.distance(corner) > 0.0);
            assert!(p.x <= 100.0 && p.y <= 100.0);
        }
    }

    #[test]
    fn fountain_refills_up_to_its_cap() {
        let mut h = bare();
        let fountain = spawn::fountain(&mut h.ctx(), Vec2::new(20.0, 20.0), 10, 5.0, 3);
        let log = h.record_events();
        let mut sys = ShardSystem::new();
        h.run(&mut sys, 100);

        let spawned = events_named(&log, "shard_spawned");
        assert_eq!(spawned.len(), 3);
        for ev in spawned {
            let GameEvent::ShardSpawned { origin, position, .. } = ev else {
                unreachable!()
            };
            assert_eq!(origin, ShardOrigin::Fountain { fountain });
            assert!(position.distance(Vec2::new(20.0, 20.0)) <= 5.0 + 1e-9);
        }
    }

    #[test]
    fn state_round_trips() {
        let mut sys = ShardSystem::new();
        sys.respawn = vec![5, 9];
        let saved = sys.save_state();
        let mut other = ShardSystem::new();
        other.load_state(saved.as_ref()).unwrap();
        assert_eq!(other.respawn, vec![5, 9]);
        other.load_state(None).unwrap();
        assert!(other.respawn.is_empty());
    }
}
