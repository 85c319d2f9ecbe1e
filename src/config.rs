//! Tuning tables for a match.
//!
//! Every section deserializes with defaults, so a config file only needs the
//! values it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::Vec2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub map: MapConfig,
    pub units: UnitConfig,
    pub movement: MovementConfig,
    pub combat: CombatConfig,
    pub ai: AiConfig,
    pub shard: ShardConfig,
    pub crown: CrownConfig,
}

/// Arena extents. The map is centred on the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub half_width: f64,
    pub half_height: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            half_width: 100.0,
            half_height: 100.0,
        }
    }
}

impl MapConfig {
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(-self.half_width, self.half_width),
            p.y.clamp(-self.half_height, self.half_height),
        )
    }

    /// Clamp to the map shrunk by `margin` on every side.
    pub fn clamp_inset(&self, p: Vec2, margin: f64) -> Vec2 {
        let hw = (self.half_width - margin).max(0.0);
        let hh = (self.half_height - margin).max(0.0);
        Vec2::new(p.x.clamp(-hw, hw), p.y.clamp(-hh, hh))
    }
}

/// Stat templates for spawned units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    pub warrior_health: f64,
    pub warrior_speed: f64,
    pub warrior_damage: f64,
    pub warrior_attack_range: f64,
    pub warrior_attack_cooldown: u64,
    pub warrior_engagement_range: f64,
    pub warrior_cohesion: f64,
    pub warrior_cohesion_regen: f64,
    pub leader_health: f64,
    pub leader_speed: f64,
    pub leader_history: usize,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            warrior_health: 30.0,
            warrior_speed: 8.0,
            warrior_damage: 5.0,
            warrior_attack_range: 2.0,
            warrior_attack_cooldown: 45,
            warrior_engagement_range: 12.0,
            warrior_cohesion: 100.0,
            warrior_cohesion_regen: 0.1,
            leader_health: 200.0,
            leader_speed: 6.0,
            leader_history: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Leader slowdown per ten warriors.
    pub army_penalty_per_ten: f64,
    pub army_penalty_cap: f64,
    pub arrive_distance: f64,
    /// Minimum travel before a new trail point is recorded.
    pub history_min_distance: f64,
    pub formation_spacing: f64,
    pub wedge_row_spacing: f64,
    pub wedge_side_spacing: f64,
    /// Distance at which formation steering reaches full urgency.
    pub urgency_distance: f64,
    pub max_urgency: f64,
    /// Formation steering cap, as a multiple of unit speed.
    pub formation_speed: f64,
    pub separation_radius: f64,
    pub separation_strength: f64,
    pub jitter_amplitude: f64,
    pub combat_jitter_amplitude: f64,
    /// Total velocity cap, as a multiple of unit speed.
    pub max_speed_multiplier: f64,
    /// Stop advancing at this fraction of attack range.
    pub combat_advance_fraction: f64,
    /// Back off when closer than this fraction of attack range.
    pub combat_retreat_fraction: f64,
    pub scatter_speed_fraction: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            army_penalty_per_ten: 0.05,
            army_penalty_cap: 0.4,
            arrive_distance: 0.1,
            history_min_distance: 0.5,
            formation_spacing: 2.0,
            wedge_row_spacing: 2.0,
            wedge_side_spacing: 1.5,
            urgency_distance: 4.0,
            max_urgency: 2.0,
            formation_speed: 1.5,
            separation_radius: 1.5,
            separation_strength: 6.0,
            jitter_amplitude: 0.3,
            combat_jitter_amplitude: 0.02,
            max_speed_multiplier: 1.6,
            combat_advance_fraction: 0.95,
            combat_retreat_fraction: 0.5,
            scatter_speed_fraction: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Leaders are only targeted within this fraction of engagement range.
    pub leader_reach_fraction: f64,
    pub charge_multiplier: f64,
    /// Ticks after a charge hit before the same attacker can charge again.
    pub charge_cooldown: u64,
    pub flank_multiplier: f64,
    /// Half-angle (radians) of the rear arc that counts as flanking.
    pub flank_half_arc: f64,
    pub flank_morale_damage: f64,
    /// Morale lost by every follower when their leader is hit.
    pub leader_hit_morale_damage: f64,
    /// Enemy/own head-count ratio above which morale drains.
    pub outnumber_ratio: f64,
    /// Morale drained per tick per unit of outnumber ratio.
    pub outnumber_drain: f64,
    /// Health regained per tick by an untargeted leader.
    pub leader_regen: f64,
    pub scatter_duration: u32,
    pub death_shard_min_offset: f64,
    pub death_shard_max_offset: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            leader_reach_fraction: 0.7,
            charge_multiplier: 2.0,
            charge_cooldown: 180,
            flank_multiplier: 1.5,
            flank_half_arc: std::f64::consts::FRAC_PI_3,
            flank_morale_damage: 8.0,
            leader_hit_morale_damage: 3.0,
            outnumber_ratio: 1.5,
            outnumber_drain: 0.05,
            leader_regen: 0.05,
            scatter_duration: 120,
            death_shard_min_offset: 1.5,
            death_shard_max_offset: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub decision_interval: u32,
    /// Army size at which a balanced personality stops farming.
    pub aggression_threshold: f64,
    /// Own/enemy strength ratio below which a balanced personality retreats.
    pub retreat_ratio: f64,
    /// Symmetric personality spread applied to thresholds.
    pub personality_variance: f64,
    pub small_army: u32,
    pub cluster_cell_size: f64,
    pub cluster_min_size: usize,
    pub cluster_search_radius: f64,
    pub cluster_distance_penalty: f64,
    pub threat_distance: f64,
    pub threat_min_army: u32,
    pub aggressive_personality: f64,
    pub aggressive_farm_dwell: u32,
    pub flank_advantage: f64,
    pub flank_band_min: f64,
    pub flank_band_max: f64,
    pub engage_distance: f64,
    pub hunt_timeout: u32,
    pub badly_outnumbered_factor: f64,
    pub disengage_distance: f64,
    pub engage_flank_after: u32,
    pub engage_flank_aggression: f64,
    pub flee_cluster_distance: f64,
    pub retreat_distance: f64,
    pub retreat_dwell: u32,
    pub flank_offset: f64,
    pub flank_dwell: u32,
    pub flank_close_distance: f64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            decision_interval: 30,
            aggression_threshold: 8.0,
            retreat_ratio: 0.6,
            personality_variance: 0.4,
            small_army: 5,
            cluster_cell_size: 20.0,
            cluster_min_size: 2,
            cluster_search_radius: 80.0,
            cluster_distance_penalty: 0.02,
            threat_distance: 25.0,
            threat_min_army: 3,
            aggressive_personality: 0.7,
            aggressive_farm_dwell: 600,
            flank_advantage: 1.3,
            flank_band_min: 25.0,
            flank_band_max: 60.0,
            engage_distance: 15.0,
            hunt_timeout: 900,
            badly_outnumbered_factor: 0.8,
            disengage_distance: 30.0,
            engage_flank_after: 300,
            engage_flank_aggression: 0.6,
            flee_cluster_distance: 40.0,
            retreat_distance: 50.0,
            retreat_dwell: 300,
            flank_offset: 20.0,
            flank_dwell: 240,
            flank_close_distance: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    pub initial_count: u32,
    pub spawn_margin: f64,
    pub magnet_radius: f64,
    pub magnet_speed: f64,
    pub pickup_radius: f64,
    pub respawn_delay: u32,
    /// Hard cap on warriors following a single leader.
    pub army_cap: u32,
    /// Radians per second of the idle spin animation.
    pub spin_speed: f64,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            initial_count: 40,
            spawn_margin: 10.0,
            magnet_radius: 8.0,
            magnet_speed: 10.0,
            pickup_radius: 1.5,
            respawn_delay: 300,
            army_cap: 50,
            spin_speed: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrownConfig {
    pub pickup_radius: f64,
    /// Death shards spawned where a leader falls.
    pub shard_burst: u32,
    pub glow_per_crown: f64,
}

impl Default for CrownConfig {
    fn default() -> Self {
        Self {
            pickup_radius: 2.5,
            shard_burst: 5,
            glow_per_crown: 0.25,
        }
    }
}

impl ArenaConfig {
    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: ArenaConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.map.half_width <= 0.0 || self.map.half_height <= 0.0 {
            return invalid("map extents must be positive");
        }
        if self.shard.spawn_margin >= self.map.half_width
            || self.shard.spawn_margin >= self.map.half_height
        {
            return invalid("shard spawn margin leaves no room on the map");
        }
        if self.shard.pickup_radius > self.shard.magnet_radius {
            return invalid("shard pickup radius must not exceed magnet radius");
        }
        if self.combat.death_shard_min_offset <= 0.0
            || self.combat.death_shard_max_offset < self.combat.death_shard_min_offset
        {
            return invalid("death shard offsets must be positive and ordered");
        }
        if self.movement.combat_retreat_fraction >= self.movement.combat_advance_fraction {
            return invalid("combat retreat fraction must be below advance fraction");
        }
        if self.units.leader_history == 0 {
            return invalid("leader history must hold at least one point");
        }
        if self.ai.cluster_cell_size <= 0.0 {
            return invalid("cluster cell size must be positive");
        }
        Ok(())
    }
}
