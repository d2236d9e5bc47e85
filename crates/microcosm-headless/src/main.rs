mod metrics;
mod snapshots;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use metrics::MetricsWriter;
use microcosm_core::{Engine, EngineOptions, GpuContext, Preset, SimulationConfig};
use snapshots::SnapshotWriter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path; defaults to the built-in configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for results
    #[arg(short, long, default_value = "results")]
    out: PathBuf,

    /// Scenario preset applied at tick 0
    #[arg(long, value_enum, default_value_t = PresetArg::PetriDish)]
    preset: PresetArg,

    /// Override the configured tick count
    #[arg(long)]
    ticks: Option<u32>,

    /// Override the configured grid edge (64/96/128, 256 for sparse)
    #[arg(long)]
    grid: Option<u32>,

    /// Write a PNG of the central Z slice every N ticks (0 = never)
    #[arg(long, default_value_t = 0)]
    snapshot_interval: u32,
}

#[derive(ValueEnum, Clone, Copy)]
enum PresetArg {
    PetriDish,
    Gradient,
    Arena,
    None,
}

impl PresetArg {
    fn preset(self) -> Option<Preset> {
        match self {
            Self::PetriDish => Some(Preset::PetriDish),
            Self::Gradient => Some(Preset::Gradient),
            Self::Arena => Some(Preset::Arena),
            Self::None => None,
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config: SimulationConfig = match &cli.config {
        Some(path) => {
            println!("Loading configuration from {}", path.display());
            serde_yaml::from_str(&std::fs::read_to_string(path)?)?
        }
        None => SimulationConfig::default(),
    };
    if let Some(ticks) = cli.ticks {
        config.world.ticks = ticks;
    }
    if let Some(grid) = cli.grid {
        config.world.grid_size = grid;
    }

    if config.world.ticks == 0 {
        anyhow::bail!("Tick count must be greater than 0.");
    }
    if config.world.grid_size < 8 {
        anyhow::bail!(
            "Grid edge too small ({}). Minimum supported is 8.",
            config.world.grid_size
        );
    }

    std::fs::create_dir_all(&cli.out)?;

    println!("Initializing GPU...");
    let ctx = pollster::block_on(GpuContext::new())?;
    println!("{}", ctx.info());

    let requested_grid = Some(config.world.grid_size);
    let ticks = config.world.ticks;
    let mut engine = pollster::block_on(Engine::new(
        &ctx,
        EngineOptions {
            config,
            requested_grid,
        },
    ))?;
    println!(
        "Engine ready: {:?} tier, {}^3 grid",
        engine.tier(),
        engine.grid_size()
    );

    if let Some(preset) = cli.preset.preset() {
        println!("Applying preset {preset:?}");
        engine.apply_preset(preset);
    }

    let mut metrics_writer = MetricsWriter::new(&cli.out)?;
    let snapshot_writer = SnapshotWriter::new(&cli.out)?;

    println!("Running {ticks} ticks...");
    let started = Instant::now();
    let mut window_start = Instant::now();
    let mut window_ticks = 0u32;
    let mut last_population = None;

    for tick in 0..ticks {
        engine.tick(&ctx);
        window_ticks += 1;

        if let Some(snapshot) = engine.try_take_stats(&ctx) {
            last_population = Some(snapshot.population);
            metrics_writer.write_snapshot(&snapshot)?;
        }

        if cli.snapshot_interval > 0 && tick % cli.snapshot_interval == 0 {
            snapshot_writer.write_slice(tick, &ctx, &engine)?;
        }

        if (tick + 1) % 500 == 0 {
            let window = window_start.elapsed().as_secs_f64().max(1e-6);
            println!(
                "Tick {}/{} | {:.0} ticks/s | population {}",
                tick + 1,
                ticks,
                window_ticks as f64 / window,
                last_population.map_or_else(|| "?".into(), |p| p.to_string()),
            );
            window_start = Instant::now();
            window_ticks = 0;
        }

        // give populations time to establish before calling an extinction
        if tick > 200 && last_population == Some(0) {
            println!("Warning: population extinct at tick {tick}");
            break;
        }
    }
    ctx.wait();

    if cli.snapshot_interval > 0 {
        snapshot_writer.write_slice(ticks, &ctx, &engine)?;
    }
    println!(
        "Completed {} metric rows in {:?}; results in {}",
        metrics_writer.rows_written(),
        started.elapsed(),
        cli.out.display()
    );
    Ok(())
}
