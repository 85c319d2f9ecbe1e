pub mod ai;
pub mod combat;
pub mod context;
pub mod crown;
pub mod helpers;
pub mod movement;
pub mod runner;
pub mod shard;
pub mod spawn;
pub mod system;

pub use ai::AiSystem;
pub use combat::CombatSystem;
pub use context::TickContext;
pub use crown::CrownSystem;
pub use movement::{MovementSystem, formation_slot_target};
pub use runner::{FixedTimestep, standard_systems, standard_world};
pub use shard::ShardSystem;
pub use spawn::LeaderSpec;
pub use system::SimSystem;
