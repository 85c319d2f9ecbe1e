use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::vec2::Vec2;
use crate::id::{EntityId, TeamId};

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// Ground-plane placement. Present on everything that is simulated or drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    /// Facing angle in radians, `atan2(y, x)` convention.
    pub rotation: f64,
    /// Vertical offset, used by the renderer for bobbing pickups.
    #[serde(default)]
    pub elevation: f64,
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            rotation: 0.0,
            elevation: 0.0,
        }
    }

    pub fn facing(&self) -> Vec2 {
        Vec2::from_angle(self.rotation)
    }
}

// ---------------------------------------------------------------------------
// Vitals and allegiance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f64,
    pub max: f64,
}

impl Health {
    pub fn new(max: f64) -> Self {
        Self { current: max, max }
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }

    pub fn ratio(&self) -> f64 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    /// Subtract `amount`, never dropping below zero. Returns the remaining health.
    pub fn apply_damage(&mut self, amount: f64) -> f64 {
        self.current = (self.current - amount).max(0.0);
        self.current
    }

    /// Add `amount`, never exceeding max.
    pub fn heal(&mut self, amount: f64) {
        self.current = (self.current + amount).min(self.max);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
}

// ---------------------------------------------------------------------------
// Fighting units
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum UnitKind {
    Warrior,
}

string_enum!(UnitKind {
    Warrior => "warrior",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub kind: UnitKind,
    pub speed: f64,
    pub attack_damage: f64,
    pub attack_range: f64,
    /// Minimum ticks between two attacks.
    pub attack_cooldown: u64,
    #[serde(default)]
    pub last_attack_tick: Option<u64>,
}

impl Unit {
    pub fn cooldown_ready(&self, tick: u64) -> bool {
        match self.last_attack_tick {
            None => true,
            Some(last) => tick.saturating_sub(last) >= self.attack_cooldown,
        }
    }
}

/// Auto-attack state. Leaders deliberately never carry this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub in_combat: bool,
    pub target: Option<EntityId>,
    pub engagement_range: f64,
}

impl Combatant {
    pub fn new(engagement_range: f64) -> Self {
        Self {
            in_combat: false,
            target: None,
            engagement_range,
        }
    }

    pub fn disengage(&mut self) {
        self.in_combat = false;
        self.target = None;
    }
}

// ---------------------------------------------------------------------------
// Warbands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FormationType {
    Column,
    Line,
    Wedge,
}

string_enum!(FormationType {
    Column => "column",
    Line => "line",
    Wedge => "wedge",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Stance {
    Aggressive,
    Balanced,
    Defensive,
}

string_enum!(Stance {
    Aggressive => "aggressive",
    Balanced => "balanced",
    Defensive => "defensive",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BannerLeader {
    pub team: TeamId,
    pub formation: FormationType,
    pub stance: Stance,
    /// Recent positions, newest at the back. Column formations walk this trail.
    pub history: VecDeque<Vec2>,
    pub max_history: usize,
}

impl BannerLeader {
    pub fn new(team: TeamId, formation: FormationType, max_history: usize) -> Self {
        Self {
            team,
            formation,
            stance: Stance::Balanced,
            history: VecDeque::new(),
            max_history,
        }
    }

    /// Append `position` to the trail if it is farther than `min_distance`
    /// from the last recorded point. Drops the oldest point when full.
    pub fn record_position(&mut self, position: Vec2, min_distance: f64) -> bool {
        if let Some(last) = self.history.back()
            && last.distance(position) <= min_distance
        {
            return false;
        }
        self.history.push_back(position);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarbandMember {
    /// `None` once the leader has died and before a crown absorbs the member.
    pub leader: Option<EntityId>,
    pub slot: u32,
    pub team: TeamId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movable {
    pub target: Option<Vec2>,
    pub speed: f64,
    pub arrived: bool,
}

impl Movable {
    pub fn new(speed: f64) -> Self {
        Self {
            target: None,
            speed,
            arrived: true,
        }
    }
}

/// Cohesion doubles as morale. Reaching zero breaks the unit and scatters it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cohesion {
    pub current: f64,
    pub max: f64,
    /// Recovered per tick while out of combat.
    pub regen_rate: f64,
    pub broken: bool,
    pub scatter_ticks: u32,
    pub scatter_direction: Vec2,
}

impl Cohesion {
    pub fn new(max: f64, regen_rate: f64) -> Self {
        Self {
            current: max,
            max,
            regen_rate,
            broken: false,
            scatter_ticks: 0,
            scatter_direction: Vec2::ZERO,
        }
    }

    /// Remove `amount` of morale. Frozen while broken.
    pub fn drain(&mut self, amount: f64) {
        if self.broken {
            return;
        }
        self.current = (self.current - amount).max(0.0);
    }

    /// Regenerate one tick's worth of morale. Frozen while broken.
    pub fn regenerate(&mut self) {
        if self.broken {
            return;
        }
        self.current = (self.current + self.regen_rate).min(self.max);
    }
}

// ---------------------------------------------------------------------------
// AI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AiState {
    Idle,
    Farm,
    Hunt,
    Engage,
    Retreat,
    Flank,
}

string_enum!(AiState {
    Idle => "idle",
    Farm => "farm",
    Hunt => "hunt",
    Engage => "engage",
    Retreat => "retreat",
    Flank => "flank",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiController {
    pub state: AiState,
    pub target: Option<EntityId>,
    /// Ticks spent in the current state.
    pub state_ticks: u32,
    /// Ticks until the next decision.
    pub decision_cooldown: u32,
    /// Personality in `[0, 1]`; higher commits sooner and decides faster.
    pub aggression: f64,
}

impl AiController {
    pub fn new(aggression: f64) -> Self {
        Self {
            state: AiState::Idle,
            target: None,
            state_ticks: 0,
            decision_cooldown: 0,
            aggression: aggression.clamp(0.0, 1.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Economy
// ---------------------------------------------------------------------------

/// Where a shard came from. Decides whether collecting it queues a respawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShardOrigin {
    Ambient,
    Death,
    Fountain { fountain: EntityId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssenceShard {
    /// Warriors granted on pickup.
    pub value: u32,
    pub phase: f64,
    pub origin: ShardOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardFountain {
    pub interval: u32,
    pub countdown: u32,
    pub radius: f64,
    pub max_active: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crown {
    pub origin_team: TeamId,
    pub dropped: bool,
    pub ticks_since_drop: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrownBearer {
    pub crowns: u32,
    pub glow: f64,
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MeshTag {
    Leader,
    Warrior,
    Shard,
    Crown,
    Fountain,
}

string_enum!(MeshTag {
    Leader => "leader",
    Warrior => "warrior",
    Shard => "shard",
    Crown => "crown",
    Fountain => "fountain",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Renderable {
    pub mesh: MeshTag,
    pub visible: bool,
}

impl Renderable {
    pub fn new(mesh: MeshTag) -> Self {
        Self {
            mesh,
            visible: true,
        }
    }
}
