//! Personality-driven leader AI.
//!
//! Each AI leader runs a small state machine on its own decision cadence.
//! Aggression is fixed per controller, so personality thresholds are a pure
//! function of it and never re-rolled.

use std::collections::BTreeMap;

use super::context::TickContext;
use super::helpers::{self, LeaderInfo};
use super::spawn;
use super::system::SimSystem;
use crate::config::AiConfig;
use crate::id::EntityId;
use crate::model::{
    AiController, AiState, BannerLeader, EssenceShard, GameEvent, Movable, Stance, Transform,
    Vec2,
};

#[derive(Debug, Default)]
pub struct AiSystem;

impl AiSystem {
    pub fn new() -> Self {
        Self
    }
}

/// The nearest rival leader as seen at decision time.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Enemy {
    id: EntityId,
    position: Vec2,
    facing: Vec2,
    army: u32,
    distance: f64,
}

#[derive(Debug, Clone, Copy)]
struct Situation {
    position: Vec2,
    army: u32,
    enemy: Option<Enemy>,
    threshold: f64,
    retreat_ratio: f64,
    aggression: f64,
    state_ticks: u32,
}

impl Situation {
    fn at_threshold(&self) -> bool {
        f64::from(self.army) >= self.threshold
    }

    /// Own army over the enemy's. Unbounded against an empty army.
    fn strength_ratio(&self, enemy: &Enemy) -> f64 {
        if enemy.army == 0 {
            f64::INFINITY
        } else {
            f64::from(self.army) / f64::from(enemy.army)
        }
    }
}

impl SimSystem for AiSystem {
    fn name(&self) -> &str {
        "ai"
    }

    fn update(&mut self, ctx: &mut TickContext) {
        let config = ctx.config;
        let cfg = &config.ai;
        let leaders = helpers::live_leaders(ctx.components, ctx.entities);
        let armies = helpers::army_sizes(ctx.components, ctx.entities);
        let shards: Vec<Vec2> = ctx
            .alive_with::<EssenceShard>()
            .into_iter()
            .filter_map(|id| ctx.position(id))
            .collect();

        for id in ctx.alive_with::<AiController>() {
            let Some(me) = leaders.iter().find(|l| l.id == id).copied() else {
                continue;
            };
            let Some(ctrl) = ctx.get_mut::<AiController>(id) else {
                continue;
            };
            ctrl.state_ticks = ctrl.state_ticks.saturating_add(1);
            ctrl.decision_cooldown = ctrl.decision_cooldown.saturating_sub(1);
            if ctrl.decision_cooldown > 0 {
                continue;
            }
            ctrl.decision_cooldown = decision_interval(cfg.decision_interval, ctrl.aggression);

            let (state, aggression, state_ticks) = (ctrl.state, ctrl.aggression, ctrl.state_ticks);
            let factor = personality_factor(cfg.personality_variance, aggression);
            let situation = Situation {
                position: me.position,
                army: armies.get(&id).copied().unwrap_or(0),
                enemy: nearest_enemy(ctx, &me, &leaders, &armies),
                threshold: cfg.aggression_threshold * factor,
                retreat_ratio: cfg.retreat_ratio * factor,
                aggression,
                state_ticks,
            };

            let next = next_state(state, &situation, cfg);
            let target = steer(ctx, id, next, &situation, &shards);
            apply(ctx, id, state, next, &situation, target);
        }
    }
}

/// Ticks between decisions. Aggressive personalities decide faster, which
/// also keeps different AIs out of lockstep.
pub fn decision_interval(base: u32, aggression: f64) -> u32 {
    let scaled = f64::from(base) * (1.5 - aggression.clamp(0.0, 1.0));
    (scaled.round() as u32).max(1)
}

/// Multiplier on base thresholds: `1 - variance` at full aggression,
/// `1 + variance` at none.
pub fn personality_factor(variance: f64, aggression: f64) -> f64 {
    1.0 + variance * (0.5 - aggression.clamp(0.0, 1.0)) * 2.0
}

fn nearest_enemy(
    ctx: &TickContext,
    me: &LeaderInfo,
    leaders: &[LeaderInfo],
    armies: &BTreeMap<EntityId, u32>,
) -> Option<Enemy> {
    let rivals = leaders
        .iter()
        .filter(|l| l.team != me.team)
        .map(|l| (*l, l.position));
    let (rival, distance) = helpers::nearest(me.position, rivals)?;
    Some(Enemy {
        id: rival.id,
        position: rival.position,
        facing: ctx
            .get::<Transform>(rival.id)
            .map_or(Vec2::ZERO, Transform::facing),
        army: armies.get(&rival.id).copied().unwrap_or(0),
        distance,
    })
}

fn next_state(state: AiState, s: &Situation, cfg: &AiConfig) -> AiState {
    match state {
        AiState::Idle => {
            if s.at_threshold() {
                AiState::Hunt
            } else {
                AiState::Farm
            }
        }
        AiState::Farm => {
            let threatened = s.enemy.is_some_and(|e| {
                e.distance < cfg.threat_distance && e.army >= cfg.threat_min_army
            });
            let restless = s.aggression >= cfg.aggressive_personality
                && s.state_ticks >= cfg.aggressive_farm_dwell;
            if s.at_threshold() || threatened || restless {
                AiState::Hunt
            } else {
                AiState::Farm
            }
        }
        AiState::Hunt => {
            let Some(enemy) = s.enemy else {
                return AiState::Farm;
            };
            let ratio = s.strength_ratio(&enemy);
            if ratio < s.retreat_ratio && s.army < cfg.small_army {
                AiState::Retreat
            } else if f64::from(s.army) > f64::from(enemy.army) * cfg.flank_advantage
                && (cfg.flank_band_min..=cfg.flank_band_max).contains(&enemy.distance)
            {
                AiState::Flank
            } else if enemy.distance <= cfg.engage_distance {
                AiState::Engage
            } else if s.state_ticks >= cfg.hunt_timeout {
                AiState::Farm
            } else {
                AiState::Hunt
            }
        }
        AiState::Engage => {
            let Some(enemy) = s.enemy else {
                return AiState::Farm;
            };
            if s.strength_ratio(&enemy) < s.retreat_ratio * cfg.badly_outnumbered_factor {
                AiState::Retreat
            } else if enemy.distance > cfg.disengage_distance {
                AiState::Hunt
            } else if s.state_ticks >= cfg.engage_flank_after
                && s.aggression >= cfg.engage_flank_aggression
                && s.army > enemy.army
            {
                AiState::Flank
            } else {
                AiState::Engage
            }
        }
        AiState::Retreat => {
            if s.at_threshold() {
                AiState::Hunt
            } else if s.state_ticks >= cfg.retreat_dwell {
                AiState::Farm
            } else {
                AiState::Retreat
            }
        }
        AiState::Flank => match s.enemy {
            None => AiState::Farm,
            Some(enemy)
                if enemy.distance <= cfg.flank_close_distance
                    || s.state_ticks >= cfg.flank_dwell =>
            {
                AiState::Engage
            }
            Some(_) => AiState::Flank,
        },
    }
}

/// Movement target for a leader acting in `state`, if it should move.
fn steer(
    ctx: &mut TickContext,
    id: EntityId,
    state: AiState,
    s: &Situation,
    shards: &[Vec2],
) -> Option<Vec2> {
    let config = ctx.config;
    let cfg = &config.ai;
    match state {
        AiState::Idle => None,
        AiState::Farm => {
            if let Some(cluster) = densest_cluster(shards, s.position, cfg) {
                return Some(cluster);
            }
            // Keep wandering toward the last random point until it is reached.
            if let Some(m) = ctx.get::<Movable>(id)
                && let Some(target) = m.target
                && !m.arrived
            {
                return Some(target);
            }
            Some(spawn::random_point(ctx.rng, &config.map, config.shard.spawn_margin))
        }
        AiState::Hunt | AiState::Engage => s.enemy.map(|e| e.position),
        AiState::Retreat => {
            let cluster = densest_cluster(shards, s.position, cfg)
                .filter(|c| c.distance(s.position) < cfg.flee_cluster_distance);
            match (cluster, s.enemy) {
                (Some(cluster), _) => Some(cluster),
                (None, Some(enemy)) => {
                    let mut away = (s.position - enemy.position).normalize_or_zero();
                    if away == Vec2::ZERO {
                        away = ctx.rng.direction();
                    }
                    Some(s.position + away * cfg.retreat_distance)
                }
                (None, None) => None,
            }
        }
        AiState::Flank => s
            .enemy
            .map(|e| flank_point(e.position, e.facing, s.position, cfg.flank_offset)),
    }
}

fn apply(
    ctx: &mut TickContext,
    id: EntityId,
    from: AiState,
    to: AiState,
    s: &Situation,
    target: Option<Vec2>,
) {
    if let Some(ctrl) = ctx.get_mut::<AiController>(id) {
        if from != to {
            ctrl.state = to;
            ctrl.state_ticks = 0;
        }
        ctrl.target = match to {
            AiState::Hunt | AiState::Engage | AiState::Retreat | AiState::Flank => {
                s.enemy.map(|e| e.id)
            }
            AiState::Idle | AiState::Farm => None,
        };
    }
    if let Some(banner) = ctx.get_mut::<BannerLeader>(id) {
        banner.stance = stance_for(to);
    }
    if let Some(point) = target {
        let point = ctx.config.map.clamp(point);
        if let Some(m) = ctx.get_mut::<Movable>(id) {
            m.target = Some(point);
            m.arrived = false;
        }
    }
    if from != to {
        tracing::debug!(leader = id, from = %from, to = %to, army = s.army, "ai state changed");
        ctx.emit(GameEvent::AiStateChanged {
            leader: id,
            from,
            to,
        });
    }
}

fn stance_for(state: AiState) -> Stance {
    match state {
        AiState::Hunt | AiState::Engage | AiState::Flank => Stance::Aggressive,
        AiState::Retreat => Stance::Defensive,
        AiState::Idle | AiState::Farm => Stance::Balanced,
    }
}

/// Centroid of the best-scoring shard cluster near `from`.
///
/// Shards are bucketed into square grid cells; a cell with at least
/// `cluster_min_size` shards scores its size minus its centroid distance
/// times `cluster_distance_penalty`. Ties keep the earlier cell.
pub fn densest_cluster(shards: &[Vec2], from: Vec2, cfg: &AiConfig) -> Option<Vec2> {
    let mut cells: BTreeMap<(i64, i64), Vec<Vec2>> = BTreeMap::new();
    for &p in shards {
        let cell = (
            (p.x / cfg.cluster_cell_size).floor() as i64,
            (p.y / cfg.cluster_cell_size).floor() as i64,
        );
        cells.entry(cell).or_default().push(p);
    }

    let mut best: Option<(f64, Vec2)> = None;
    for members in cells.values() {
        if members.len() < cfg.cluster_min_size {
            continue;
        }
        let sum = members.iter().fold(Vec2::ZERO, |acc, &p| acc + p);
        let n = members.len() as f64;
        let centroid = Vec2::new(sum.x / n, sum.y / n);
        let distance = centroid.distance(from);
        if distance > cfg.cluster_search_radius {
            continue;
        }
        let score = members.len() as f64 - distance * cfg.cluster_distance_penalty;
        if best.is_none_or(|(top, _)| score > top) {
            best = Some((score, centroid));
        }
    }
    best.map(|(_, centroid)| centroid)
}

/// A point `offset` to the side of an enemy, on whichever side of its facing
/// `from` already stands.
pub fn flank_point(enemy: Vec2, enemy_facing: Vec2, from: Vec2, offset: f64) -> Vec2 {
    let right = if enemy_facing == Vec2::ZERO {
        (from - enemy).normalize_or_zero().perp_right()
    } else {
        enemy_facing.perp_right()
    };
    let side = if (from - enemy).dot(right) >= 0.0 {
        1.0
    } else {
        -1.0
    };
    enemy + right * (side * offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::id::TeamId;
    use crate::model::ShardOrigin;
    use crate::sim::spawn::LeaderSpec;
    use crate::testutil::{Harness, events_named};

    fn situation(army: u32, enemy: Option<Enemy>) -> Situation {
        Situation {
            position: Vec2::ZERO,
            army,
            enemy,
            threshold: 8.0,
            retreat_ratio: 0.6,
            aggression: 0.5,
            state_ticks: 1,
        }
    }

    fn enemy(army: u32, distance: f64) -> Enemy {
        Enemy {
            id: 99,
            position: Vec2::new(distance, 0.0),
            facing: Vec2::new(-1.0, 0.0),
            army,
            distance,
        }
    }

    fn ai_leader(h: &mut Harness, team: TeamId, pos: Vec2, aggression: f64) -> EntityId {
        spawn::leader(&mut h.ctx(), &LeaderSpec::new(team, pos).ai(aggression))
    }

    #[test]
    fn cadence_shortens_with_aggression() {
        assert_eq!(decision_interval(30, 0.5), 30);
        assert_eq!(decision_interval(30, 1.0), 15);
        assert_eq!(decision_interval(30, 0.0), 45);
        assert_eq!(decision_interval(0, 1.0), 1);
    }

    #[test]
    fn personality_is_symmetric_around_balanced() {
        assert_eq!(personality_factor(0.4, 0.5), 1.0);
        assert!((personality_factor(0.4, 1.0) - 0.6).abs() < 1e-12);
        assert!((personality_factor(0.4, 0.0) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn idle_splits_on_threshold() {
        let cfg = AiConfig::default();
        assert_eq!(next_state(AiState::Idle, &situation(2, None), &cfg), AiState::Farm);
        assert_eq!(next_state(AiState::Idle, &situation(8, None), &cfg), AiState::Hunt);
    }

    #[test]
    fn farm_breaks_off_for_threats_and_restlessness() {
        let cfg = AiConfig::default();
        let near = Some(enemy(cfg.threat_min_army, cfg.threat_distance - 1.0));
        assert_eq!(next_state(AiState::Farm, &situation(1, near), &cfg), AiState::Hunt);
        let weak = Some(enemy(0, 5.0));
        assert_eq!(next_state(AiState::Farm, &situation(1, weak), &cfg), AiState::Farm);

        let mut restless = situation(1, None);
        restless.aggression = cfg.aggressive_personality;
        restless.state_ticks = cfg.aggressive_farm_dwell;
        assert_eq!(next_state(AiState::Farm, &restless, &cfg), AiState::Hunt);
    }

    #[test]
    fn hunt_transitions() {
        let cfg = AiConfig::default();
        assert_eq!(next_state(AiState::Hunt, &situation(8, None), &cfg), AiState::Farm);
        assert_eq!(
            next_state(AiState::Hunt, &situation(2, Some(enemy(10, 100.0))), &cfg),
            AiState::Retreat
        );
        assert_eq!(
            next_state(AiState::Hunt, &situation(20, Some(enemy(10, 40.0))), &cfg),
            AiState::Flank
        );
        assert_eq!(
            next_state(AiState::Hunt, &situation(10, Some(enemy(10, 12.0))), &cfg),
            AiState::Engage
        );
        assert_eq!(
            next_state(AiState::Hunt, &situation(10, Some(enemy(10, 100.0))), &cfg),
            AiState::Hunt
        );
        let mut stale = situation(10, Some(enemy(10, 100.0)));
        stale.state_ticks = cfg.hunt_timeout;
        assert_eq!(next_state(AiState::Hunt, &stale, &cfg), AiState::Farm);
    }

    #[test]
    fn engage_transitions() {
        let cfg = AiConfig::default();
        assert_eq!(
            next_state(AiState::Engage, &situation(4, Some(enemy(10, 5.0))), &cfg),
            AiState::Retreat
        );
        assert_eq!(
            next_state(AiState::Engage, &situation(10, Some(enemy(10, 50.0))), &cfg),
            AiState::Hunt
        );
        let mut long = situation(12, Some(enemy(10, 5.0)));
        long.state_ticks = cfg.engage_flank_after;
        long.aggression = cfg.engage_flank_aggression;
        assert_eq!(next_state(AiState::Engage, &long, &cfg), AiState::Flank);
        long.aggression = 0.1;
        assert_eq!(next_state(AiState::Engage, &long, &cfg), AiState::Engage);
    }

    #[test]
    fn retreat_and_flank_transitions() {
        let cfg = AiConfig::default();
        assert_eq!(next_state(AiState::Retreat, &situation(9, None), &cfg), AiState::Hunt);
        let mut rested = situation(1, None);
        rested.state_ticks = cfg.retreat_dwell;
        assert_eq!(next_state(AiState::Retreat, &rested, &cfg), AiState::Farm);

        let close = Some(enemy(5, cfg.flank_close_distance));
        assert_eq!(next_state(AiState::Flank, &situation(9, close), &cfg), AiState::Engage);
        let far = Some(enemy(5, 40.0));
        assert_eq!(next_state(AiState::Flank, &situation(9, far), &cfg), AiState::Flank);
        assert_eq!(next_state(AiState::Flank, &situation(9, None), &cfg), AiState::Farm);
    }

    #[test]
    fn cluster_scoring_prefers_dense_then_near() {
        let cfg = AiConfig::default();
        let shards = [
            Vec2::new(1.0, 1.0),
            Vec2::new(3.0, 3.0),
            Vec2::new(41.0, 1.0),
            Vec2::new(42.0, 2.0),
            Vec2::new(43.0, 3.0),
            Vec2::new(-30.0, -30.0),
        ];
        let best = densest_cluster(&shards, Vec2::ZERO, &cfg).unwrap();
        assert_eq!(best, Vec2::new(42.0, 2.0));

        // A lone shard never forms a cluster.
        assert_eq!(densest_cluster(&shards[5..], Vec2::ZERO, &cfg), None);
    }

    #[test]
    fn flank_point_sits_beside_the_enemy() {
        let facing = Vec2::new(1.0, 0.0);
        let right = flank_point(Vec2::ZERO, facing, Vec2::new(5.0, -1.0), 20.0);
        assert_eq!(right, Vec2::new(0.0, -20.0));
        let left = flank_point(Vec2::ZERO, facing, Vec2::new(5.0, 1.0), 20.0);
        assert_eq!(left, Vec2::new(0.0, 20.0));
    }

    #[test]
    fn first_decision_farms_toward_a_cluster() {
        let mut config = ArenaConfig::default();
        config.shard.initial_count = 0;
        let mut h = Harness::with_config(config);
        let leader = ai_leader(&mut h, 1, Vec2::ZERO, 0.5);
        spawn::shard(&mut h.ctx(), Vec2::new(11.0, 11.0), ShardOrigin::Ambient);
        spawn::shard(&mut h.ctx(), Vec2::new(13.0, 13.0), ShardOrigin::Ambient);
        let log = h.record_events();
        h.step(&mut AiSystem::new());

        let ctrl = h.components.ai_controller.get(leader).unwrap();
        assert_eq!(ctrl.state, AiState::Farm);
        assert_eq!(ctrl.decision_cooldown, 30);
        let m = h.components.movable.get(leader).unwrap();
        assert_eq!(m.target, Some(Vec2::new(12.0, 12.0)));
        assert!(!m.arrived);
        assert_eq!(
            events_named(&log, "ai_state_changed"),
            vec![GameEvent::AiStateChanged {
                leader,
                from: AiState::Idle,
                to: AiState::Farm,
            }]
        );
    }

    #[test]
    fn decisions_wait_for_the_cooldown() {
        let mut config = ArenaConfig::default();
        config.ai.aggression_threshold = 0.0;
        let mut h = Harness::with_config(config);
        let leader = ai_leader(&mut h, 1, Vec2::ZERO, 0.5);
        ai_leader(&mut h, 2, Vec2::new(50.0, 0.0), 0.5);
        let log = h.record_events();
        let mut sys = AiSystem::new();

        h.step(&mut sys);
        let ctrl = h.components.ai_controller.get(leader).unwrap();
        assert_eq!(ctrl.state, AiState::Hunt);
        assert_eq!(ctrl.target, Some(2));
        let banner = h.components.banner_leader.get(leader).unwrap();
        assert_eq!(banner.stance, Stance::Aggressive);

        // Nothing more until the cooldown runs out.
        h.run(&mut sys, 29);
        assert_eq!(events_named(&log, "ai_state_changed").len(), 2);
        assert_eq!(h.components.ai_controller.get(leader).unwrap().state_ticks, 29);
    }

    #[test]
    fn retreat_runs_directly_away() {
        let mut h = Harness::new();
        let leader = ai_leader(&mut h, 1, Vec2::ZERO, 0.5);
        let s = Situation {
            enemy: Some(enemy(10, 10.0)),
            ..situation(1, None)
        };
        let target = steer(&mut h.ctx(), leader, AiState::Retreat, &s, &[]).unwrap();
        assert_eq!(target, Vec2::new(-AiConfig::default().retreat_distance, 0.0));
    }
}
