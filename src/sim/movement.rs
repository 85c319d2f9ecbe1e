use std::collections::VecDeque;

use super::context::TickContext;
use super::helpers;
use super::system::SimSystem;
use crate::config::MovementConfig;
use crate::id::EntityId;
use crate::model::{
    BannerLeader, Cohesion, Combatant, FormationType, Movable, Transform, Unit, Vec2, WarbandMember,
};

/// Leader target-seeking and warband flocking.
///
/// Leaders walk straight at their target. Members are in exactly one mode per
/// tick: scattered (broken morale), combat (hold a battle line against the
/// current target) or formation (steer to their slot around the leader).
#[derive(Debug, Default)]
pub struct MovementSystem;

impl MovementSystem {
    pub fn new() -> Self {
        Self
    }
}

impl SimSystem for MovementSystem {
    fn name(&self) -> &str {
        "movement"
    }

    fn update(&mut self, ctx: &mut TickContext) {
        move_leaders(ctx);
        move_members(ctx);
    }
}

fn move_leaders(ctx: &mut TickContext) {
    let config = ctx.config;
    let cfg = &config.movement;

    for id in ctx.alive_with::<BannerLeader>() {
        let Some(movable) = ctx.get::<Movable>(id) else {
            continue;
        };
        let (Some(target), false) = (movable.target, movable.arrived) else {
            continue;
        };
        let Some(position) = ctx.position(id) else {
            continue;
        };

        let army = helpers::army_size(ctx.components, ctx.entities, id);
        let penalty =
            (f64::from(army) / 10.0 * cfg.army_penalty_per_ten).min(cfg.army_penalty_cap);
        let step = movable.speed * (1.0 - penalty) * ctx.dt;

        let to_target = target - position;
        let distance = to_target.length();
        let direction = to_target.normalize_or_zero();
        let travelled = step.min(distance);
        let next = config.map.clamp(position + direction * travelled);
        let arrived = distance - travelled <= cfg.arrive_distance;

        if let Some(t) = ctx.get_mut::<Transform>(id) {
            t.position = next;
            if direction != Vec2::ZERO {
                t.rotation = direction.angle();
            }
        }
        if let Some(m) = ctx.get_mut::<Movable>(id) {
            m.arrived = arrived;
        }
        if let Some(banner) = ctx.get_mut::<BannerLeader>(id) {
            banner.record_position(next, cfg.history_min_distance);
        }
    }
}

fn move_members(ctx: &mut TickContext) {
    let config = ctx.config;
    let cfg = &config.movement;
    let members = ctx.alive_with::<WarbandMember>();

    // Positions as of the start of the pass, so separation is order independent.
    let positions: Vec<(EntityId, Vec2)> = members
        .iter()
        .filter_map(|&id| Some((id, ctx.position(id)?)))
        .collect();

    for &(id, position) in &positions {
        let Some(speed) = ctx.get::<Movable>(id).map(|m| m.speed) else {
            continue;
        };

        if let Some(cohesion) = ctx.get::<Cohesion>(id)
            && cohesion.broken
        {
            let direction = cohesion.scatter_direction;
            let next = config
                .map
                .clamp(position + direction * (speed * cfg.scatter_speed_fraction * ctx.dt));
            if let Some(t) = ctx.get_mut::<Transform>(id) {
                t.position = next;
                if direction != Vec2::ZERO {
                    t.rotation = direction.angle();
                }
            }
            continue;
        }

        let separation = separation_force(id, position, &positions, cfg);

        if let Some((steering, facing)) = combat_steering(ctx, id, position, speed, cfg) {
            let jitter = wobble(ctx.tick, id, cfg.combat_jitter_amplitude);
            let velocity =
                (steering + separation + jitter).clamp_length(speed * cfg.max_speed_multiplier);
            let next = config.map.clamp(position + velocity * ctx.dt);
            if let Some(t) = ctx.get_mut::<Transform>(id) {
                t.position = next;
                t.rotation = facing;
            }
            continue;
        }

        let slot_target = formation_target_for(ctx, id);
        let steering = match slot_target {
            Some(target) => {
                let to_target = target - position;
                let urgency =
                    (to_target.length() / cfg.urgency_distance).clamp(0.0, cfg.max_urgency);
                let magnitude = (speed * urgency).min(speed * cfg.formation_speed);
                to_target.normalize_or_zero() * magnitude
            }
            // Leaderless: hold position.
            None => Vec2::ZERO,
        };
        let jitter = wobble(ctx.tick, id, cfg.jitter_amplitude);
        let velocity =
            (steering + separation + jitter).clamp_length(speed * cfg.max_speed_multiplier);
        let next = config.map.clamp(position + velocity * ctx.dt);

        if let Some(t) = ctx.get_mut::<Transform>(id) {
            t.position = next;
            if velocity.length_squared() > 1e-12 {
                t.rotation = velocity.angle();
            }
        }
        if let Some(m) = ctx.get_mut::<Movable>(id) {
            m.target = slot_target;
            m.arrived = slot_target.is_none_or(|t| t.distance(next) <= cfg.arrive_distance);
        }
    }
}

/// Battle-line steering toward the current combat target: advance beyond the
/// outer band, back off inside the inner band, hold in between. Returns the
/// steering vector and the facing toward the target.
fn combat_steering(
    ctx: &TickContext,
    id: EntityId,
    position: Vec2,
    speed: f64,
    cfg: &MovementConfig,
) -> Option<(Vec2, f64)> {
    let combatant = ctx.get::<Combatant>(id)?;
    if !combatant.in_combat {
        return None;
    }
    let target = combatant.target.filter(|&t| ctx.is_alive(t))?;
    let target_pos = ctx.position(target)?;
    let range = ctx.get::<Unit>(id)?.attack_range;

    let to_target = target_pos - position;
    let distance = to_target.length();
    let direction = to_target.normalize_or_zero();
    let steering = if distance > range * cfg.combat_advance_fraction {
        direction * speed
    } else if distance < range * cfg.combat_retreat_fraction {
        -direction * speed
    } else {
        Vec2::ZERO
    };
    let facing = if direction == Vec2::ZERO {
        ctx.get::<Transform>(id).map_or(0.0, |t| t.rotation)
    } else {
        direction.angle()
    };
    Some((steering, facing))
}

fn formation_target_for(ctx: &TickContext, id: EntityId) -> Option<Vec2> {
    let member = ctx.get::<WarbandMember>(id)?;
    let leader = member.leader.filter(|&l| ctx.is_alive(l))?;
    let banner = ctx.get::<BannerLeader>(leader)?;
    let transform = ctx.get::<Transform>(leader)?;
    Some(formation_slot_target(
        transform.position,
        transform.rotation,
        &banner.history,
        banner.formation,
        member.slot,
        &ctx.config.movement,
    ))
}

/// Where formation slot `slot` sits for a leader at `leader_pos` facing
/// `rotation`. Pure: the same inputs always give the same point.
///
/// - Column walks back along `history` (newest at the back) until the
///   accumulated path length reaches `(slot + 1) * spacing`, falling back to a
///   point straight behind the leader when the trail is too short.
/// - Line places slots abreast, alternating right/left by parity.
/// - Wedge places rows behind the leader that widen into a V.
pub fn formation_slot_target(
    leader_pos: Vec2,
    rotation: f64,
    history: &VecDeque<Vec2>,
    formation: FormationType,
    slot: u32,
    cfg: &MovementConfig,
) -> Vec2 {
    let forward = Vec2::from_angle(rotation);
    let right = forward.perp_right();
    let rank = f64::from(slot / 2 + 1);
    let side = if slot % 2 == 0 { 1.0 } else { -1.0 };

    match formation {
        FormationType::Column => {
            let wanted = f64::from(slot + 1) * cfg.formation_spacing;
            let mut walked = 0.0;
            let mut prev = leader_pos;
            for &point in history.iter().rev() {
                let segment = prev.distance(point);
                if segment <= f64::EPSILON {
                    continue;
                }
                if walked + segment >= wanted {
                    return prev.lerp(point, (wanted - walked) / segment);
                }
                walked += segment;
                prev = point;
            }
            leader_pos - forward * wanted
        }
        FormationType::Line => leader_pos + right * (side * rank * cfg.formation_spacing),
        FormationType::Wedge => {
            leader_pos - forward * (rank * cfg.wedge_row_spacing)
                + right * (side * rank * cfg.wedge_side_spacing)
        }
    }
}

/// Push away from every other member closer than the separation radius,
/// stronger the deeper the overlap.
fn separation_force(
    id: EntityId,
    position: Vec2,
    others: &[(EntityId, Vec2)],
    cfg: &MovementConfig,
) -> Vec2 {
    let radius = cfg.separation_radius;
    let mut force = Vec2::ZERO;
    for &(other, other_pos) in others {
        if other == id {
            continue;
        }
        let offset = position - other_pos;
        let distance = offset.length();
        if distance >= radius {
            continue;
        }
        // Stacked units split along a fixed per-id direction.
        let away = if distance > 1e-9 {
            offset * (1.0 / distance)
        } else {
            Vec2::from_angle(id as f64 * 2.399_963)
        };
        force += away * ((radius - distance) / radius * cfg.separation_strength);
    }
    force
}

/// Time-based wobble seeded by tick and id. Does not touch the RNG.
fn wobble(tick: u64, id: EntityId, amplitude: f64) -> Vec2 {
    let t = tick as f64;
    let i = id as f64;
    Vec2::new((t * 0.07 + i * 1.37).sin(), (t * 0.05 + i * 2.11).cos()) * amplitude
}
