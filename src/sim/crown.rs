use serde_json::Value;

use super::context::TickContext;
use super::helpers;
use super::shard;
use super::spawn;
use super::system::{SimSystem, parse_state};
use crate::id::{EntityId, TeamId};
use crate::model::{
    BannerLeader, Combatant, Crown, CrownBearer, GameEvent, MatchEndReason, Team, Vec2,
    WarbandMember,
};

/// Crown pickup, army absorption and the victory latch.
#[derive(Debug, Default)]
pub struct CrownSystem {
    winner: Option<TeamId>,
}

impl CrownSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn winner(&self) -> Option<TeamId> {
        self.winner
    }

    fn try_pickup(&mut self, ctx: &mut TickContext, crown_id: EntityId) {
        let config = ctx.config;
        let Some(crown_pos) = ctx.position(crown_id) else {
            return;
        };
        let Some(origin_team) = ctx.get::<Crown>(crown_id).map(|c| c.origin_team) else {
            return;
        };

        let leaders = helpers::live_leaders(ctx.components, ctx.entities);
        let Some(collector) = leaders.iter().find(|l| {
            l.team != origin_team && l.position.distance(crown_pos) <= config.crown.pickup_radius
        }) else {
            return;
        };

        let gained = absorb(ctx, collector.id, collector.team, origin_team);

        let crowns = match ctx.get_mut::<CrownBearer>(collector.id) {
            Some(bearer) => {
                bearer.crowns += 1;
                bearer.glow = (f64::from(bearer.crowns) * config.crown.glow_per_crown).min(1.0);
                bearer.crowns
            }
            None => {
                let bearer = CrownBearer {
                    crowns: 1,
                    glow: config.crown.glow_per_crown.min(1.0),
                };
                ctx.insert(collector.id, bearer);
                1
            }
        };

        ctx.destroy(crown_id);
        tracing::info!(
            collector = collector.id,
            team = collector.team,
            absorbed_team = origin_team,
            gained,
            crowns,
            "crown picked up"
        );
        ctx.emit(GameEvent::CrownPickedUp {
            crown: crown_id,
            collector: collector.id,
            team: collector.team,
            original_team: origin_team,
        });
        ctx.emit(GameEvent::ArmyAbsorbed {
            collector: collector.id,
            team: collector.team,
            absorbed_team: origin_team,
            warriors_gained: gained,
        });

        let rivals = leaders.iter().any(|l| l.id != collector.id);
        if !rivals && self.winner.is_none() {
            self.winner = Some(collector.team);
            let army_size = helpers::army_size(ctx.components, ctx.entities, collector.id);
            tracing::info!(winner = collector.team, army_size, "match ended");
            ctx.emit(GameEvent::MatchEnded {
                winner: collector.team,
                reason: MatchEndReason::CrownVictory,
                army_size,
            });
        }
    }
}

impl SimSystem for CrownSystem {
    fn name(&self) -> &str {
        "crown"
    }

    fn update(&mut self, ctx: &mut TickContext) {
        for crown_id in ctx.alive_with::<Crown>() {
            let Some(crown) = ctx.get_mut::<Crown>(crown_id) else {
                continue;
            };
            if !crown.dropped {
                continue;
            }
            // A crown dropped earlier this tick waits for the next one.
            let age = crown.ticks_since_drop;
            crown.ticks_since_drop = age.saturating_add(1);
            if age > 0 {
                self.try_pickup(ctx, crown_id);
            }
        }
    }

    fn save_state(&self) -> Option<Value> {
        // Always present so a restored world never silently drops the latch.
        Some(serde_json::to_value(self.winner).unwrap_or(Value::Null))
    }

    fn load_state(&mut self, state: Option<&Value>) -> Result<(), serde_json::Error> {
        self.winner = parse_state(state)?;
        Ok(())
    }
}

/// Leaderless members of `from_team` join `collector`, up to the army cap.
/// Returns how many joined.
fn absorb(ctx: &mut TickContext, collector: EntityId, team: TeamId, from_team: TeamId) -> u32 {
    let cap = ctx.config.shard.army_cap;
    let orphans: Vec<EntityId> = ctx
        .alive_with::<WarbandMember>()
        .into_iter()
        .filter(|&id| {
            ctx.get::<WarbandMember>(id)
                .is_some_and(|m| m.leader.is_none() && m.team == from_team)
        })
        .collect();

    let mut gained = 0;
    for id in orphans {
        if helpers::army_size(ctx.components, ctx.entities, collector) >= cap {
            break;
        }
        let slot = helpers::appended_slot(ctx.components, ctx.entities, collector);
        if let Some(m) = ctx.get_mut::<WarbandMember>(id) {
            m.leader = Some(collector);
            m.team = team;
            m.slot = slot;
        }
        if let Some(t) = ctx.get_mut::<Team>(id) {
            t.id = team;
        }
        if let Some(c) = ctx.get_mut::<Combatant>(id) {
            c.disengage();
        }
        gained += 1;
    }
    gained
}

/// Drop the crown and a burst of shards where `leader` fell, orphan its
/// warband and destroy it.
pub fn handle_leader_death(ctx: &mut TickContext, leader: EntityId, killer_team: TeamId) {
    let position = ctx.position(leader).unwrap_or(Vec2::ZERO);
    let Some(team) = ctx.get::<BannerLeader>(leader).map(|b| b.team) else {
        ctx.destroy(leader);
        return;
    };

    let crown = spawn::crown(ctx, position, team);
    for _ in 0..ctx.config.crown.shard_burst {
        shard::spawn_death_shard(ctx, position);
    }

    let followers: Vec<EntityId> = ctx
        .alive_with::<WarbandMember>()
        .into_iter()
        .filter(|&id| {
            ctx.get::<WarbandMember>(id)
                .is_some_and(|m| m.leader == Some(leader))
        })
        .collect();
    for id in &followers {
        if let Some(m) = ctx.get_mut::<WarbandMember>(*id) {
            m.leader = None;
        }
    }

    tracing::info!(
        leader,
        team,
        killer_team,
        orphans = followers.len(),
        "leader killed"
    );
    ctx.emit(GameEvent::CrownDropped {
        crown,
        team,
        position,
    });
    ctx.emit(GameEvent::LeaderKilled {
        leader,
        team,
        killer_team,
    });
    ctx.destroy(leader);
}
