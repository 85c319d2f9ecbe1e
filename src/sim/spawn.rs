//! Archetype builders. Every entity the simulation creates comes from here,
//! whether a system spawns it mid-tick or setup code does before the match.

use std::f64::consts::TAU;

use super::context::TickContext;
use super::helpers;
use crate::config::MapConfig;
use crate::id::{EntityId, TeamId};
use crate::model::{
    AiController, BannerLeader, Cohesion, Combatant, Crown, CrownBearer, EssenceShard,
    FormationType, GameEvent, Health, MeshTag, Movable, Renderable, ShardFountain, ShardOrigin,
    Team, Transform, Unit, UnitKind, Vec2, WarbandMember,
};
use crate::rng::SimRng;

/// Initial setup for a leader.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderSpec {
    pub team: TeamId,
    pub position: Vec2,
    pub formation: FormationType,
    /// `Some(aggression)` puts the leader under AI control.
    pub ai: Option<f64>,
}

impl LeaderSpec {
    pub fn new(team: TeamId, position: Vec2) -> Self {
        Self {
            team,
            position,
            formation: FormationType::Column,
            ai: None,
        }
    }

    pub fn formation(mut self, formation: FormationType) -> Self {
        self.formation = formation;
        self
    }

    pub fn ai(mut self, aggression: f64) -> Self {
        self.ai = Some(aggression);
        self
    }
}

pub fn leader(ctx: &mut TickContext, spec: &LeaderSpec) -> EntityId {
    let config = ctx.config;
    let units = &config.units;
    let position = config.map.clamp(spec.position);
    let id = ctx.spawn();

    let mut banner = BannerLeader::new(spec.team, spec.formation, units.leader_history);
    banner.record_position(position, 0.0);

    ctx.insert(id, Transform::at(position));
    ctx.insert(id, Health::new(units.leader_health));
    ctx.insert(id, Team { id: spec.team });
    ctx.insert(id, banner);
    ctx.insert(id, Movable::new(units.leader_speed));
    ctx.insert(id, CrownBearer::default());
    ctx.insert(id, Renderable::new(MeshTag::Leader));
    if let Some(aggression) = spec.ai {
        ctx.insert(id, AiController::new(aggression));
    }

    tracing::debug!(leader = id, team = spec.team, ai = spec.ai.is_some(), "leader spawned");
    id
}

/// New warrior at `leader`'s position in the lowest free formation slot.
///
/// # Panics
/// Panics if `leader` has no `BannerLeader`.
pub fn warrior(ctx: &mut TickContext, leader: EntityId) -> EntityId {
    let team = ctx
        .get::<BannerLeader>(leader)
        .map(|b| b.team)
        .unwrap_or_else(|| panic!("spawn warrior: entity {leader} is not a leader"));
    let transform = ctx
        .get::<Transform>(leader)
        .cloned()
        .unwrap_or_else(|| panic!("spawn warrior: leader {leader} has no transform"));
    let slot = helpers::free_slot(ctx.components, ctx.entities, leader);

    let id = ctx.spawn();
    insert_warrior_body(ctx, id, team, transform);
    ctx.insert(
        id,
        WarbandMember {
            leader: Some(leader),
            slot,
            team,
        },
    );
    id
}

/// Warrior with no leader, holding position until a crown absorbs it.
pub fn leaderless_warrior(ctx: &mut TickContext, team: TeamId, position: Vec2) -> EntityId {
    let id = ctx.spawn();
    insert_warrior_body(ctx, id, team, Transform::at(position));
    ctx.insert(
        id,
        WarbandMember {
            leader: None,
            slot: 0,
            team,
        },
    );
    id
}

fn insert_warrior_body(ctx: &mut TickContext, id: EntityId, team: TeamId, transform: Transform) {
    let config = ctx.config;
    let units = &config.units;
    ctx.insert(id, transform);
    ctx.insert(id, Health::new(units.warrior_health));
    ctx.insert(id, Team { id: team });
    ctx.insert(
        id,
        Unit {
            kind: UnitKind::Warrior,
            speed: units.warrior_speed,
            attack_damage: units.warrior_damage,
            attack_range: units.warrior_attack_range,
            attack_cooldown: units.warrior_attack_cooldown,
            last_attack_tick: None,
        },
    );
    ctx.insert(id, Combatant::new(units.warrior_engagement_range));
    ctx.insert(id, Movable::new(units.warrior_speed));
    ctx.insert(
        id,
        Cohesion::new(units.warrior_cohesion, units.warrior_cohesion_regen),
    );
    ctx.insert(id, Renderable::new(MeshTag::Warrior));
}

/// Create a shard and announce it with `shard_spawned`.
pub fn shard(ctx: &mut TickContext, position: Vec2, origin: ShardOrigin) -> EntityId {
    let id = ctx.spawn();
    ctx.insert(id, Transform::at(position));
    ctx.insert(
        id,
        EssenceShard {
            value: 1,
            // Spread bob phases without touching the RNG.
            phase: (id as f64 * 0.618_034).fract() * TAU,
            origin,
        },
    );
    ctx.insert(id, Renderable::new(MeshTag::Shard));
    ctx.emit(GameEvent::ShardSpawned {
        shard: id,
        origin,
        position,
    });
    id
}

pub fn crown(ctx: &mut TickContext, position: Vec2, origin_team: TeamId) -> EntityId {
    let id = ctx.spawn();
    ctx.insert(id, Transform::at(position));
    ctx.insert(
        id,
        Crown {
            origin_team,
            dropped: true,
            ticks_since_drop: 0,
        },
    );
    ctx.insert(id, Renderable::new(MeshTag::Crown));
    id
}

pub fn fountain(
    ctx: &mut TickContext,
    position: Vec2,
    interval: u32,
    radius: f64,
    max_active: u32,
) -> EntityId {
    let position = ctx.config.map.clamp(position);
    let id = ctx.spawn();
    ctx.insert(id, Transform::at(position));
    ctx.insert(
        id,
        ShardFountain {
            interval: interval.max(1),
            countdown: interval.max(1),
            radius,
            max_active,
        },
    );
    ctx.insert(id, Renderable::new(MeshTag::Fountain));
    id
}

/// Uniform point at least `margin` away from every map edge.
pub fn random_point(rng: &mut SimRng, map: &MapConfig, margin: f64) -> Vec2 {
    let hw = (map.half_width - margin).max(0.0);
    let hh = (map.half_height - margin).max(0.0);
    Vec2::new(rng.range_f64(-hw, hw), rng.range_f64(-hh, hh))
}
