#[macro_use]
mod macros;

pub mod components;
pub mod entities;
pub mod event;
pub mod snapshot;
pub mod store;
pub mod vec2;
pub mod view;
pub mod world;

pub use components::*;
pub use entities::Entities;
pub use event::{EventKind, GameEvent, MatchEndReason};
pub use snapshot::{SNAPSHOT_VERSION, SnapshotError, WorldSnapshot};
pub use store::{Component, ComponentStore, Components, StoreKey, StoreSnapshot};
pub use vec2::Vec2;
pub use view::RenderEntry;
pub use world::World;
