//! Deterministic simulation core for a real-time warband arena.
//!
//! A [`World`] owns typed component tables, a seeded RNG and an event bus,
//! and advances a fixed list of systems once per tick. Everything a match
//! needs to resume is captured by [`World::serialize`].

pub mod bus;
pub mod config;
pub mod id;
pub mod model;
pub mod rng;
pub mod scenario;
pub mod sim;

#[cfg(test)]
mod testutil;

pub use bus::{Emitter, EventBus, SubscriptionId};
pub use config::{ArenaConfig, ConfigError};
pub use id::{EntityId, NEUTRAL_TEAM, TeamId};
pub use model::{EventKind, GameEvent, RenderEntry, SnapshotError, Vec2, World};
pub use rng::SimRng;
pub use scenario::{EventLog, Scenario};
pub use sim::{FixedTimestep, LeaderSpec, SimSystem, standard_world};
