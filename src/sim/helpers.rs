use std::collections::{BTreeMap, BTreeSet};

use crate::id::{EntityId, NEUTRAL_TEAM, TeamId};
use crate::model::{Components, Entities, Vec2};

/// A live leader as seen by a neighbour scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeaderInfo {
    pub id: EntityId,
    pub team: TeamId,
    pub position: Vec2,
}

/// All live leaders with a position, in id order.
pub fn live_leaders(components: &Components, entities: &Entities) -> Vec<LeaderInfo> {
    components
        .banner_leader
        .iter()
        .filter(|(id, _)| entities.is_alive(*id))
        .filter_map(|(id, banner)| {
            Some(LeaderInfo {
                id,
                team: banner.team,
                position: components.position(id)?,
            })
        })
        .collect()
}

/// Live warriors whose leader is `leader`.
pub fn army_size(components: &Components, entities: &Entities, leader: EntityId) -> u32 {
    components
        .warband_member
        .iter()
        .filter(|(id, m)| m.leader == Some(leader) && entities.is_alive(*id))
        .count() as u32
}

/// Army size of every leader that has at least one live follower.
pub fn army_sizes(components: &Components, entities: &Entities) -> BTreeMap<EntityId, u32> {
    let mut sizes = BTreeMap::new();
    for (id, member) in components.warband_member.iter() {
        if let Some(leader) = member.leader
            && entities.is_alive(id)
        {
            *sizes.entry(leader).or_insert(0) += 1;
        }
    }
    sizes
}

/// Live warband members per non-neutral team, led or not.
pub fn team_strengths(components: &Components, entities: &Entities) -> BTreeMap<TeamId, u32> {
    let mut counts = BTreeMap::new();
    for (id, member) in components.warband_member.iter() {
        if member.team != NEUTRAL_TEAM && entities.is_alive(id) {
            *counts.entry(member.team).or_insert(0) += 1;
        }
    }
    counts
}

/// Lowest formation slot not held by a live follower of `leader`.
pub fn free_slot(components: &Components, entities: &Entities, leader: EntityId) -> u32 {
    let taken: BTreeSet<u32> = components
        .warband_member
        .iter()
        .filter(|(id, m)| m.leader == Some(leader) && entities.is_alive(*id))
        .map(|(_, m)| m.slot)
        .collect();
    (0..).find(|slot| !taken.contains(slot)).unwrap_or(0)
}

/// One past the highest slot held by a live follower of `leader`.
pub fn appended_slot(components: &Components, entities: &Entities, leader: EntityId) -> u32 {
    components
        .warband_member
        .iter()
        .filter(|(id, m)| m.leader == Some(leader) && entities.is_alive(*id))
        .map(|(_, m)| m.slot + 1)
        .max()
        .unwrap_or(0)
}

/// Nearest entry of `candidates` to `from`, ties going to the earlier entry.
pub fn nearest<T: Copy>(
    from: Vec2,
    candidates: impl IntoIterator<Item = (T, Vec2)>,
) -> Option<(T, f64)> {
    let mut best: Option<(T, f64)> = None;
    for (item, pos) in candidates {
        let d = from.distance(pos);
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((item, d));
        }
    }
    best
}
