//! detsim entry point
//!
//! Headless runner: builds a seeded demo scenario, drives it through the
//! fixed-step clock and prints the deterministic digest. Two runs with the
//! same arguments always print the same digest.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use detsim::consts::FIXED_TIMESTEP;
use detsim::math::Vector3;
use detsim::persistence::{self, ReproducibilityRecord};
use detsim::sim::{BroadPhaseKind, IntegratorKind, Subsystem};
use detsim::{Action, Entity, EntityKind, Result, SimConfig, Simulation};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Number of fixed steps to run
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Master seed (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Movers in the demo scenario
    #[arg(long, default_value_t = 24)]
    entities: usize,

    /// euler, semi-implicit-euler, verlet or rk4
    #[arg(long)]
    integrator: Option<IntegratorKind>,

    /// brute-force, spatial-hash or sweep-and-prune
    #[arg(long)]
    broadphase: Option<BroadPhaseKind>,

    /// JSON session config to start from
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a reproducibility record here after the run
    #[arg(long)]
    record: Option<PathBuf>,

    /// Fail on the first non-finite or runaway entity
    #[arg(long)]
    strict: bool,

    /// Print the final state snapshot as JSON
    #[arg(long)]
    snapshot: bool,
}

impl Args {
    /// Config file (or defaults) with the command-line overrides applied
    fn sim_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(integrator) = self.integrator {
            config.integrator = integrator;
        }
        if let Some(broadphase) = self.broadphase {
            config.broadphase = broadphase;
        }
        config.strict |= self.strict;
        Ok(config)
    }
}

/// Seeded demo population: a ring of obstacles and mixed movers heading for
/// random targets
fn populate(sim: &mut Simulation, count: usize) -> Result<Vec<Action>> {
    let mut obstacles = Vec::new();
    for i in 0..4 {
        let angle = i as f64 * std::f64::consts::FRAC_PI_2;
        obstacles.push(Entity::new(
            format!("obstacle-{i}").into(),
            EntityKind::Obstacle {
                half_extents: Vector3::new(4.0, 4.0, 4.0),
            },
            Vector3::new(40.0 * libm::cos(angle), 0.0, 40.0 * libm::sin(angle)),
        ));
    }
    sim.add_entities(obstacles)?;

    let kinds = [
        EntityKind::DRONE,
        EntityKind::Robot,
        EntityKind::Pedestrian,
        EntityKind::VEHICLE,
    ];
    let mut placements = Vec::with_capacity(count);
    {
        let rng = sim.seed_streams_mut().stream(Subsystem::Randomization);
        for _ in 0..count {
            let kind = rng.pick(&kinds).copied().unwrap_or(EntityKind::Robot);
            let mut position = rng.next_vector3(-60.0, 60.0);
            position.y = if kind.hovers() { rng.next_float(5.0, 30.0) } else { 0.0 };
            let mut target = rng.next_vector3(-60.0, 60.0);
            target.y = position.y;
            placements.push((kind, position, target));
        }
    }

    let mut actions = Vec::with_capacity(count);
    for (kind, position, target) in placements {
        let id = sim.spawn(kind, position);
        actions.push(Action::move_to(id, target));
    }
    Ok(actions)
}

fn run(args: Args) -> Result<()> {
    let mut sim = Simulation::new(args.sim_config()?)?;
    // Seed state before the scenario draws from it, so a replay can repopulate
    let seeds = sim.seed_streams().snapshot();
    let actions = populate(&mut sim, args.entities)?;

    // Frame deltas jitter around 60 Hz; the clock turns them into fixed steps
    let mut frame = 0u64;
    while sim.step_count() < args.ticks {
        let jitter = if frame % 3 == 0 { 0.004 } else { -0.002 };
        let pending: &[Action] = if frame == 0 { &actions } else { &[] };
        sim.advance(FIXED_TIMESTEP + jitter, pending)?;
        frame += 1;
    }

    let state = sim.state();
    log::info!(
        "Ran {} ticks ({:.2}s simulated), {} entities, {} collisions",
        sim.step_count(),
        sim.time(),
        state.world.active_entities,
        state.world.total_collisions
    );

    if args.snapshot {
        println!("{}", persistence::serialize(&state)?);
    }
    if let Some(path) = args.record {
        let record = ReproducibilityRecord {
            seeds,
            ..ReproducibilityRecord::capture(&sim)
        };
        record.save(path)?;
    }
    println!("{}", sim.deterministic_hash());
    Ok(())
}

fn main() -> ExitCode {
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Simulation failed: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["detsim"]).unwrap();
        assert_eq!(args.ticks, 600);
        assert_eq!(args.entities, 24);
        assert_eq!(args.sim_config().unwrap(), SimConfig::default());
    }

    #[test]
    fn test_overrides_reach_config() {
        let args = Args::try_parse_from([
            "detsim",
            "--seed",
            "9",
            "--integrator",
            "rk4",
            "--broadphase",
            "sweep_and_prune",
            "--strict",
        ])
        .unwrap();
        let config = args.sim_config().unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.integrator, IntegratorKind::Rk4);
        assert_eq!(config.broadphase, BroadPhaseKind::SweepAndPrune);
        assert!(config.strict);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(Args::try_parse_from(["detsim", "--broadphase", "octree"]).is_err());
        assert!(Args::try_parse_from(["detsim", "--integrator", "leapfrog"]).is_err());
        assert!(Args::try_parse_from(["detsim", "--ticks", "-3"]).is_err());
        assert!(Args::try_parse_from(["detsim", "--bogus"]).is_err());
    }
}
