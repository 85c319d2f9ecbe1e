use serde::{Deserialize, Serialize};

use super::components::{AiState, FormationType, ShardOrigin};
use super::vec2::Vec2;
use crate::id::{EntityId, TeamId};

/// Why a match ended. Part of the `match_ended` payload contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MatchEndReason {
    CrownVictory,
}

string_enum!(MatchEndReason {
    CrownVictory => "crown_victory",
});

/// A gameplay event published on the [`EventBus`](crate::bus::EventBus).
///
/// Variant names and payload shapes are a stable contract with UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// An attack landed.
    UnitDamaged {
        attacker: EntityId,
        target: EntityId,
        amount: f64,
        remaining: f64,
        charged: bool,
        flanked: bool,
    },

    /// A unit or leader died this tick.
    UnitDied {
        entity: EntityId,
        team: TeamId,
        killer_team: TeamId,
        was_leader: bool,
        position: Vec2,
    },

    /// A shard pickup produced a new warrior.
    WarriorJoined {
        leader: EntityId,
        warrior: EntityId,
        team: TeamId,
        army_size: u32,
    },

    ShardSpawned {
        shard: EntityId,
        origin: ShardOrigin,
        position: Vec2,
    },

    /// A leader picked up a shard. `granted` is false when the army was at cap.
    ShardCollected {
        shard: EntityId,
        leader: EntityId,
        team: TeamId,
        granted: bool,
    },

    MoraleBroken {
        entity: EntityId,
        team: TeamId,
    },

    MoraleRecovered {
        entity: EntityId,
        team: TeamId,
    },

    LeaderKilled {
        leader: EntityId,
        team: TeamId,
        killer_team: TeamId,
    },

    CrownDropped {
        crown: EntityId,
        team: TeamId,
        position: Vec2,
    },

    CrownPickedUp {
        crown: EntityId,
        collector: EntityId,
        team: TeamId,
        original_team: TeamId,
    },

    ArmyAbsorbed {
        collector: EntityId,
        team: TeamId,
        absorbed_team: TeamId,
        warriors_gained: u32,
    },

    MatchEnded {
        winner: TeamId,
        reason: MatchEndReason,
        army_size: u32,
    },

    AiStateChanged {
        leader: EntityId,
        from: AiState,
        to: AiState,
    },

    FormationChanged {
        leader: EntityId,
        formation: FormationType,
    },
}

/// Subscription key: the name of a [`GameEvent`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EventKind {
    UnitDamaged,
    UnitDied,
    WarriorJoined,
    ShardSpawned,
    ShardCollected,
    MoraleBroken,
    MoraleRecovered,
    LeaderKilled,
    CrownDropped,
    CrownPickedUp,
    ArmyAbsorbed,
    MatchEnded,
    AiStateChanged,
    FormationChanged,
}

string_enum!(EventKind {
    UnitDamaged => "unit_damaged",
    UnitDied => "unit_died",
    WarriorJoined => "warrior_joined",
    ShardSpawned => "shard_spawned",
    ShardCollected => "shard_collected",
    MoraleBroken => "morale_broken",
    MoraleRecovered => "morale_recovered",
    LeaderKilled => "leader_killed",
    CrownDropped => "crown_dropped",
    CrownPickedUp => "crown_picked_up",
    ArmyAbsorbed => "army_absorbed",
    MatchEnded => "match_ended",
    AiStateChanged => "ai_state_changed",
    FormationChanged => "formation_changed",
});

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::UnitDamaged { .. } => EventKind::UnitDamaged,
            GameEvent::UnitDied { .. } => EventKind::UnitDied,
            GameEvent::WarriorJoined { .. } => EventKind::WarriorJoined,
            GameEvent::ShardSpawned { .. } => EventKind::ShardSpawned,
            GameEvent::ShardCollected { .. } => EventKind::ShardCollected,
            GameEvent::MoraleBroken { .. } => EventKind::MoraleBroken,
            GameEvent::MoraleRecovered { .. } => EventKind::MoraleRecovered,
            GameEvent::LeaderKilled { .. } => EventKind::LeaderKilled,
            GameEvent::CrownDropped { .. } => EventKind::CrownDropped,
            GameEvent::CrownPickedUp { .. } => EventKind::CrownPickedUp,
            GameEvent::ArmyAbsorbed { .. } => EventKind::ArmyAbsorbed,
            GameEvent::MatchEnded { .. } => EventKind::MatchEnded,
            GameEvent::AiStateChanged { .. } => EventKind::AiStateChanged,
            GameEvent::FormationChanged { .. } => EventKind::FormationChanged,
        }
    }
}
