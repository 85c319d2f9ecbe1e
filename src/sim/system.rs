use serde_json::Value;

use super::context::TickContext;
use crate::id::EntityId;

/// A pluggable simulation system that runs once per tick.
///
/// Object-safe so systems can be stored as `Box<dyn SimSystem>`. Systems own
/// no component data; anything they keep between ticks (respawn timers,
/// charge windows, latches) must round-trip through `save_state`/`load_state`
/// or a restored world would diverge.
pub trait SimSystem {
    fn name(&self) -> &str;

    /// Called once when the system is added to a world.
    fn init(&mut self, ctx: &mut TickContext) {
        let _ = ctx;
    }

    fn update(&mut self, ctx: &mut TickContext);

    /// Called by the end-of-tick sweep for every destroyed entity, after its
    /// components are gone. Systems holding per-entity side tables release
    /// them here.
    fn on_entity_destroyed(&mut self, id: EntityId) {
        let _ = id;
    }

    /// System-owned state for the snapshot. `None` for stateless systems.
    fn save_state(&self) -> Option<Value> {
        None
    }

    /// Replace system-owned state from a snapshot. `None` means the snapshot
    /// carried nothing for this system, which resets it to a fresh state.
    ///
    /// Implementations must parse fully before assigning so a failed load
    /// leaves the system untouched.
    fn load_state(&mut self, state: Option<&Value>) -> Result<(), serde_json::Error> {
        let _ = state;
        Ok(())
    }
}

/// Parse an optional state blob, falling back to `T::default()` when absent.
pub fn parse_state<T>(state: Option<&Value>) -> Result<T, serde_json::Error>
where
    T: serde::de::DeserializeOwned + Default,
{
    match state {
        Some(value) => T::deserialize(value),
        None => Ok(T::default()),
    }
}
