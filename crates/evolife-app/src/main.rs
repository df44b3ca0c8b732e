use anyhow::{Context, Result};
use clap::Parser;
use evolife_app::{RunOptions, headless, terminal};
use evolife_core::{BotSeed, Genome, INITIAL_ENERGY, Opcode, SimConfig, Simulation};
use tracing::info;

/// EvoLife: genome-programmed bots evolving on an energy-driven grid.
#[derive(Debug, Parser)]
#[command(name = "evolife", version, about)]
struct Cli {
    /// Grid width in cells.
    #[arg(long, default_value_t = 80)]
    width: usize,
    /// Grid height in cells, wall rows included.
    #[arg(long, default_value_t = 30)]
    height: usize,
    /// Steps to run headless; in the terminal, the auto-stepping cap.
    #[arg(long, default_value_t = 2000)]
    steps: u64,
    /// Target frames per second for the terminal renderer.
    #[arg(long, default_value_t = 15)]
    fps: u32,
    /// RNG seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
    /// Run without a terminal UI and emit a summary report.
    #[arg(long)]
    headless: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = SimConfig {
        width: cli.width,
        height: cli.height,
        rng_seed: cli.seed,
    };
    let mut sim = Simulation::new(config).context("failed to build simulation")?;
    seed_first_organism(&mut sim)?;
    info!(
        width = cli.width,
        height = cli.height,
        seed = ?cli.seed,
        headless = cli.headless,
        "starting evolife"
    );

    if cli.headless {
        headless::run(&mut sim, cli.steps)?;
        Ok(())
    } else {
        terminal::run(
            &mut sim,
            RunOptions {
                steps: cli.steps,
                fps: cli.fps.max(1),
            },
        )
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// The primordial organism: a pure photosynthesiser near the light.
fn seed_first_organism(sim: &mut Simulation) -> Result<()> {
    let genome =
        Genome::uniform(Opcode::Photosynthesis.code()).context("failed to build seed genome")?;
    let x = sim.config().width / 2;
    sim.add_bot(BotSeed {
        genome,
        x,
        y: 2,
        energy: INITIAL_ENERGY,
    });
    Ok(())
}
