use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::context::TickContext;
use super::crown;
use super::helpers;
use super::shard;
use super::system::{SimSystem, parse_state};
use crate::config::CombatConfig;
use crate::id::{EntityId, NEUTRAL_TEAM, TeamId};
use crate::model::{
    BannerLeader, Cohesion, Combatant, GameEvent, Health, Team, Transform, Unit, Vec2,
    WarbandMember,
};

/// Auto-attack, morale and death processing.
///
/// Deaths are queued during the scan and processed once afterwards, so no
/// entity disappears while others are still choosing targets.
#[derive(Debug, Default)]
pub struct CombatSystem {
    /// Tick of each attacker's last charge hit.
    last_charge_hit: BTreeMap<EntityId, u64>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: EntityId,
    team: TeamId,
    position: Vec2,
    is_leader: bool,
}

#[derive(Debug, Clone, Copy)]
struct Death {
    entity: EntityId,
    team: TeamId,
    killer_team: TeamId,
    was_leader: bool,
    position: Vec2,
}

impl CombatSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attackers currently inside a charge window.
    pub fn tracked_charges(&self) -> usize {
        self.last_charge_hit.len()
    }

    fn scan(&mut self, ctx: &mut TickContext, deaths: &mut Vec<Death>) {
        let config = ctx.config;
        let cfg = &config.combat;
        let strengths = helpers::team_strengths(ctx.components, ctx.entities);
        let candidates = candidates(ctx);

        for id in ctx.alive_with::<Combatant>() {
            if ctx.get::<Health>(id).is_none_or(Health::is_dead)
                || ctx.get::<Cohesion>(id).is_some_and(|c| c.broken)
            {
                continue;
            }
            let (Some(team), Some(position), Some(engagement)) = (
                ctx.get::<Team>(id).map(|t| t.id),
                ctx.position(id),
                ctx.get::<Combatant>(id).map(|c| c.engagement_range),
            ) else {
                continue;
            };
            if team == NEUTRAL_TEAM {
                if let Some(c) = ctx.get_mut::<Combatant>(id) {
                    c.disengage();
                }
                if let Some(c) = ctx.get_mut::<Cohesion>(id) {
                    c.regenerate();
                }
                continue;
            }

            let Some(target) = select_target(ctx, &candidates, team, position, engagement, cfg)
            else {
                if let Some(c) = ctx.get_mut::<Combatant>(id) {
                    c.disengage();
                }
                if let Some(c) = ctx.get_mut::<Cohesion>(id) {
                    c.regenerate();
                }
                continue;
            };

            if let Some(c) = ctx.get_mut::<Combatant>(id) {
                c.in_combat = true;
                c.target = Some(target.id);
            }
            if let Some(t) = ctx.get_mut::<Transform>(id) {
                let toward = target.position - position;
                if toward != Vec2::ZERO {
                    t.rotation = toward.angle();
                }
            }

            if let Some(death) = self.try_attack(ctx, id, team, position, &target, cfg) {
                deaths.push(death);
            }

            // Outnumbered units lose heart while fighting.
            let enemies = f64::from(strengths.get(&target.team).copied().unwrap_or(0));
            let own = f64::from(strengths.get(&team).copied().unwrap_or(0).max(1));
            let ratio = enemies / own;
            if ratio > cfg.outnumber_ratio
                && let Some(c) = ctx.get_mut::<Cohesion>(id)
            {
                c.drain(cfg.outnumber_drain * ratio);
            }
        }
    }

    fn try_attack(
        &mut self,
        ctx: &mut TickContext,
        attacker: EntityId,
        team: TeamId,
        position: Vec2,
        target: &Candidate,
        cfg: &CombatConfig,
    ) -> Option<Death> {
        let tick = ctx.tick;
        let unit = ctx.get::<Unit>(attacker)?;
        if position.distance(target.position) > unit.attack_range || !unit.cooldown_ready(tick) {
            return None;
        }
        let mut amount = unit.attack_damage;

        let charged = self
            .last_charge_hit
            .get(&attacker)
            .is_none_or(|&last| tick.saturating_sub(last) >= cfg.charge_cooldown);
        if charged {
            amount *= cfg.charge_multiplier;
            self.last_charge_hit.insert(attacker, tick);
        }

        let flanked = ctx
            .get::<Transform>(target.id)
            .is_some_and(|t| is_flanking(t.facing(), target.position, position, cfg.flank_half_arc));
        if flanked {
            amount *= cfg.flank_multiplier;
            if let Some(c) = ctx.get_mut::<Cohesion>(target.id) {
                c.drain(cfg.flank_morale_damage);
            }
        }

        if let Some(u) = ctx.get_mut::<Unit>(attacker) {
            u.last_attack_tick = Some(tick);
        }
        let remaining = ctx.get_mut::<Health>(target.id)?.apply_damage(amount);
        ctx.emit(GameEvent::UnitDamaged {
            attacker,
            target: target.id,
            amount,
            remaining,
            charged,
            flanked,
        });

        if target.is_leader {
            let followers: Vec<EntityId> = ctx
                .alive_with::<WarbandMember>()
                .into_iter()
                .filter(|&m| {
                    ctx.get::<WarbandMember>(m)
                        .is_some_and(|wm| wm.leader == Some(target.id))
                })
                .collect();
            for member in followers {
                if let Some(c) = ctx.get_mut::<Cohesion>(member) {
                    c.drain(cfg.leader_hit_morale_damage);
                }
            }
        }

        (remaining <= 0.0).then_some(Death {
            entity: target.id,
            team: target.team,
            killer_team: team,
            was_leader: target.is_leader,
            position: target.position,
        })
    }
}

impl SimSystem for CombatSystem {
    fn name(&self) -> &str {
        "combat"
    }

    fn update(&mut self, ctx: &mut TickContext) {
        let mut deaths = Vec::new();
        self.scan(ctx, &mut deaths);
        regenerate_leaders(ctx);
        process_deaths(ctx, &deaths);
        update_morale(ctx);
    }

    fn on_entity_destroyed(&mut self, id: EntityId) {
        self.last_charge_hit.remove(&id);
    }

    fn save_state(&self) -> Option<Value> {
        serde_json::to_value(&self.last_charge_hit).ok()
    }

    fn load_state(&mut self, state: Option<&Value>) -> Result<(), serde_json::Error> {
        self.last_charge_hit = parse_state(state)?;
        Ok(())
    }
}

/// Every live, non-neutral warrior or leader that can be targeted.
fn candidates(ctx: &TickContext) -> Vec<Candidate> {
    ctx.components
        .team
        .iter()
        .filter(|&(id, team)| team.id != NEUTRAL_TEAM && ctx.is_alive(id))
        .filter_map(|(id, team)| {
            let is_leader = ctx.components.has::<BannerLeader>(id);
            if !is_leader && !ctx.components.has::<Unit>(id) {
                return None;
            }
            Some(Candidate {
                id,
                team: team.id,
                position: ctx.position(id)?,
                is_leader,
            })
        })
        .collect()
}

/// Nearest enemy warrior inside engagement range, else the nearest enemy
/// leader inside the shorter leader reach.
fn select_target(
    ctx: &TickContext,
    candidates: &[Candidate],
    team: TeamId,
    position: Vec2,
    engagement: f64,
    cfg: &CombatConfig,
) -> Option<Candidate> {
    let enemies = candidates.iter().filter(|c| {
        c.team != team && ctx.get::<Health>(c.id).is_some_and(|h| !h.is_dead())
    });
    let (warriors, leaders): (Vec<&Candidate>, Vec<&Candidate>) =
        enemies.partition(|c| !c.is_leader);

    if let Some((warrior, d)) = helpers::nearest(position, warriors.iter().map(|c| (**c, c.position)))
        && d <= engagement
    {
        return Some(warrior);
    }
    helpers::nearest(position, leaders.iter().map(|c| (**c, c.position)))
        .filter(|&(_, d)| d <= engagement * cfg.leader_reach_fraction)
        .map(|(leader, _)| leader)
}

/// True when `attacker` stands inside the rear arc of a target at
/// `target_pos` facing `facing`.
pub fn is_flanking(facing: Vec2, target_pos: Vec2, attacker: Vec2, half_arc: f64) -> bool {
    let to_attacker = (attacker - target_pos).normalize_or_zero();
    if to_attacker == Vec2::ZERO {
        return false;
    }
    facing.dot(to_attacker) < -half_arc.cos()
}

/// Leaders heal while no live combatant is targeting them.
fn regenerate_leaders(ctx: &mut TickContext) {
    let targeted: BTreeSet<EntityId> = ctx
        .alive_with::<Combatant>()
        .into_iter()
        .filter_map(|id| {
            let c = ctx.get::<Combatant>(id)?;
            c.target.filter(|_| c.in_combat)
        })
        .collect();
    let regen = ctx.config.combat.leader_regen;
    for leader in ctx.alive_with::<BannerLeader>() {
        if targeted.contains(&leader) {
            continue;
        }
        if let Some(h) = ctx.get_mut::<Health>(leader)
            && !h.is_dead()
        {
            h.heal(regen);
        }
    }
}

fn process_deaths(ctx: &mut TickContext, deaths: &[Death]) {
    for death in deaths {
        // Two attackers may have queued the same victim.
        if !ctx.is_alive(death.entity) {
            continue;
        }
        tracing::debug!(
            entity = death.entity,
            team = death.team,
            killer_team = death.killer_team,
            leader = death.was_leader,
            "unit died"
        );
        if death.was_leader {
            crown::handle_leader_death(ctx, death.entity, death.killer_team);
        } else {
            shard::spawn_death_shard(ctx, death.position);
            ctx.destroy(death.entity);
        }
        ctx.emit(GameEvent::UnitDied {
            entity: death.entity,
            team: death.team,
            killer_team: death.killer_team,
            was_leader: death.was_leader,
            position: death.position,
        });
    }
}

/// Break units whose morale hit zero; recover those whose scatter ran out.
fn update_morale(ctx: &mut TickContext) {
    let duration = ctx.config.combat.scatter_duration;
    for id in ctx.alive_with::<Cohesion>() {
        let team = ctx.get::<Team>(id).map_or(NEUTRAL_TEAM, |t| t.id);
        let Some(c) = ctx.get::<Cohesion>(id) else {
            continue;
        };

        if c.broken {
            let left = c.scatter_ticks.saturating_sub(1);
            let recovered = left == 0;
            if let Some(c) = ctx.get_mut::<Cohesion>(id) {
                c.scatter_ticks = left;
                if recovered {
                    c.broken = false;
                    c.current = c.max * 0.5;
                }
            }
            if recovered {
                tracing::debug!(entity = id, team, "morale recovered");
                ctx.emit(GameEvent::MoraleRecovered { entity: id, team });
            }
        } else if c.current <= 0.0 {
            let direction = ctx.rng.direction();
            if let Some(c) = ctx.get_mut::<Cohesion>(id) {
                c.current = 0.0;
                c.broken = true;
                c.scatter_ticks = duration;
                c.scatter_direction = direction;
            }
            if let Some(c) = ctx.get_mut::<Combatant>(id) {
                c.disengage();
            }
            tracing::debug!(entity = id, team, "morale broken");
            ctx.emit(GameEvent::MoraleBroken { entity: id, team });
        }
    }
}
