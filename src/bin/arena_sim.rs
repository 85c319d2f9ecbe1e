//! Headless match runner.
//!
//! ```text
//! arena_sim [--seed N] [--ticks N] [--teams N] [--config PATH] [--snapshot PATH]
//! ```
//!
//! Spawns one AI warband per team around the map centre, runs until a crown
//! victory or the tick limit, and optionally writes the final snapshot.

use std::f64::consts::TAU;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use warband_arena::model::MatchEndReason;
use warband_arena::{
    ArenaConfig, ConfigError, EventKind, GameEvent, LeaderSpec, SnapshotError, Vec2, World,
    standard_world,
};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[derive(Parser, Debug)]
#[command(name = "arena_sim")]
#[command(about = "Run a headless warband arena match between AI teams")]
struct Options {
    /// RNG seed for the match
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Stop after this many fixed ticks if nobody has won
    #[arg(long, default_value_t = 60 * 60 * 5)]
    ticks: u64,

    /// Number of AI warbands
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(2..))]
    teams: u32,

    /// JSON tuning file; defaults are used when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final world snapshot here
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

/// One AI leader per team on a ring, aggression spread across the teams.
fn setup(world: &mut World, teams: u32) {
    let radius = world.config().map.half_width.min(world.config().map.half_height) * 0.6;
    for i in 0..teams {
        let angle = TAU * f64::from(i) / f64::from(teams);
        let aggression = (f64::from(i) + 0.5) / f64::from(teams);
        let spec = LeaderSpec::new(i + 1, Vec2::from_angle(angle) * radius).ai(aggression);
        let leader = world.spawn_leader(spec);
        for _ in 0..3 {
            world.spawn_warrior(leader);
        }
    }
}

fn run(opts: &Options) -> Result<(), CliError> {
    let config = match &opts.config {
        Some(path) => ArenaConfig::load(path)?,
        None => ArenaConfig::default(),
    };
    let mut world = standard_world(config, opts.seed);
    setup(&mut world, opts.teams);

    let ended = std::rc::Rc::new(std::cell::Cell::new(None));
    let sink = ended.clone();
    world
        .events_mut()
        .once(EventKind::MatchEnded, move |ev, _| {
            if let GameEvent::MatchEnded {
                winner,
                reason: MatchEndReason::CrownVictory,
                army_size,
            } = ev
            {
                sink.set(Some((*winner, *army_size)));
            }
        });

    info!(seed = opts.seed, teams = opts.teams, "match started");
    let step = warband_arena::FixedTimestep::DEFAULT_STEP;
    while world.tick() < opts.ticks && ended.get().is_none() {
        world.update(step);
    }

    match ended.get() {
        Some((winner, army_size)) => {
            info!(tick = world.tick(), winner, army_size, "crown victory");
        }
        None => {
            let survivors: Vec<_> = world
                .leaders()
                .into_iter()
                .map(|l| (l, world.army_size(l)))
                .collect();
            info!(tick = world.tick(), ?survivors, "tick limit reached");
        }
    }

    if let Some(path) = &opts.snapshot {
        world.save_to_path(path)?;
        info!(path = %path.display(), "snapshot written");
    }
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let opts = Options::parse();
    if let Err(err) = run(&opts) {
        error!(error = %err, "arena_sim failed");
        std::process::exit(1);
    }
}
