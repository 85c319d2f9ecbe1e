use std::cell::RefCell;
use std::rc::Rc;

use crate::bus::EventBus;
use crate::config::ArenaConfig;
use crate::model::{Components, Entities, GameEvent};
use crate::rng::SimRng;
use crate::sim::{SimSystem, TickContext};

pub const DT: f64 = 1.0 / 60.0;

// ---------------------------------------------------------------------------
// Fabricated tick context
// ---------------------------------------------------------------------------

/// Loose world parts for driving a single system without a `World`.
pub struct Harness {
    pub entities: Entities,
    pub components: Components,
    pub rng: SimRng,
    pub events: EventBus,
    pub config: ArenaConfig,
    pub tick: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::default())
    }

    pub fn with_config(config: ArenaConfig) -> Self {
        Self {
            entities: Entities::new(),
            components: Components::default(),
            rng: SimRng::new(7),
            events: EventBus::new(),
            config,
            tick: 0,
        }
    }

    pub fn ctx(&mut self) -> TickContext<'_> {
        TickContext {
            entities: &mut self.entities,
            components: &mut self.components,
            rng: &mut self.rng,
            events: &mut self.events,
            config: &self.config,
            tick: self.tick,
            dt: DT,
            match_time: self.tick as f64 * DT,
        }
    }

    /// Capture every event emitted from now on.
    pub fn record_events(&mut self) -> Rc<RefCell<Vec<GameEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        self.events
            .subscribe_all(move |ev, _| sink.borrow_mut().push(ev.clone()));
        log
    }

    /// Advance one tick through `system` and sweep, like `World::update`.
    pub fn step(&mut self, system: &mut dyn SimSystem) {
        self.tick += 1;
        let mut ctx = self.ctx();
        system.update(&mut ctx);
        for id in self.entities.sweep() {
            self.components.remove_entity(id);
            system.on_entity_destroyed(id);
        }
    }

    pub fn run(&mut self, system: &mut dyn SimSystem, ticks: u32) {
        for _ in 0..ticks {
            self.step(system);
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Events of one kind from a recorded log.
pub fn events_named(log: &Rc<RefCell<Vec<GameEvent>>>, name: &str) -> Vec<GameEvent> {
    log.borrow()
        .iter()
        .filter(|ev| ev.kind().as_str() == name)
        .cloned()
        .collect()
}
