use super::ai::AiSystem;
use super::combat::CombatSystem;
use super::crown::CrownSystem;
use super::movement::MovementSystem;
use super::shard::ShardSystem;
use super::system::SimSystem;
use crate::config::ArenaConfig;
use crate::model::World;

/// Systems in the order they must run: positions settle first, shards may
/// add warriors before anyone fights, and crowns go last so a crown dropped
/// this tick cannot be picked up until the next one.
pub fn standard_systems() -> Vec<Box<dyn SimSystem>> {
    vec![
        Box::new(MovementSystem::new()),
        Box::new(ShardSystem::new()),
        Box::new(CombatSystem::new()),
        Box::new(AiSystem::new()),
        Box::new(CrownSystem::new()),
    ]
}

/// A world with the standard systems registered.
pub fn standard_world(config: ArenaConfig, seed: u64) -> World {
    let mut world = World::new(config, seed);
    for system in standard_systems() {
        world.add_system(system);
    }
    world
}

/// Fixed-timestep accumulator decoupling wall-clock frames from ticks.
///
/// Real time accumulates; the world advances in whole steps and the remainder
/// carries to the next frame. At most `max_steps` run per frame; time beyond
/// that is dropped so a stalled host cannot spiral.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedTimestep {
    step: f64,
    accumulator: f64,
    max_steps: u32,
}

impl FixedTimestep {
    pub const DEFAULT_STEP: f64 = 1.0 / 60.0;
    pub const DEFAULT_MAX_STEPS: u32 = 8;

    /// # Panics
    /// Panics if `step` is not a positive finite number.
    pub fn new(step: f64) -> Self {
        assert!(
            step.is_finite() && step > 0.0,
            "FixedTimestep: step must be positive, got {step}"
        );
        Self {
            step,
            accumulator: 0.0,
            max_steps: Self::DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Feed `real_dt` seconds of wall time and run every whole step it
    /// covers. Returns the number of ticks run.
    pub fn advance(&mut self, world: &mut World, real_dt: f64) -> u32 {
        if !real_dt.is_finite() || real_dt <= 0.0 {
            return 0;
        }
        self.accumulator += real_dt;

        let mut steps = 0;
        while self.accumulator >= self.step {
            if steps == self.max_steps {
                let dropped = self.accumulator - self.accumulator % self.step;
                tracing::warn!(dropped, steps, "frame budget exceeded, dropping time");
                self.accumulator %= self.step;
                break;
            }
            world.update(self.step);
            self.accumulator -= self.step;
            steps += 1;
        }
        steps
    }

    /// Fraction of a step left in the accumulator, for render interpolation.
    pub fn alpha(&self) -> f64 {
        self.accumulator / self.step
    }
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STEP)
    }
}
