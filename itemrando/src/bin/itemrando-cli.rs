use anyhow::{bail, Result};
use clap::Parser;
use itemrando::randomize::{Randomization, Randomizer};
use itemrando::settings::FillSettings;
use itemrando_game::GameData;
use itemrando_logic::RequirementOracle;
use log::info;
use rand::{RngCore, SeedableRng};
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    catalog: PathBuf,

    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    random_seed: Option<usize>,

    #[arg(long)]
    item_placement_seed: Option<usize>,

    #[arg(long)]
    max_attempts: Option<usize>,

    #[arg(long)]
    output: Option<PathBuf>,
}

fn get_randomization(args: &Args, game_data: &GameData, settings: &FillSettings) -> Result<Randomization> {
    let oracle = RequirementOracle::new(game_data);
    let randomizer = Randomizer::new(game_data, &oracle, settings)?;
    let root_seed = match args.random_seed {
        Some(s) => s,
        None => (rand::rngs::StdRng::from_entropy().next_u64() & 0xFFFFFFFF) as usize,
    };
    let mut rng_seed = [0u8; 32];
    rng_seed[..8].copy_from_slice(&root_seed.to_le_bytes());
    let mut rng = rand::rngs::StdRng::from_seed(rng_seed);
    let max_attempts = if args.item_placement_seed.is_some() {
        1
    } else {
        args.max_attempts.unwrap_or(10000)
    };
    for attempt_num in 1..=max_attempts {
        let item_seed = match args.item_placement_seed {
            Some(s) => s,
            None => (rng.next_u64() & 0xFFFFFFFF) as usize,
        };
        info!("Attempt {attempt_num}/{max_attempts}: item placement seed={item_seed}");
        match randomizer.randomize(attempt_num, item_seed) {
            Ok(randomization) => {
                return Ok(randomization);
            }
            Err(e) if e.is_retryable() => {
                info!(
                    "Attempt {attempt_num}/{max_attempts}: Randomization failed: {}",
                    e
                );
            }
            Err(e) => {
                bail!("Attempt {attempt_num}/{max_attempts}: {}", e);
            }
        }
    }
    bail!("Exhausted randomization attempts");
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let game_data = GameData::load(&args.catalog)?;
    let settings = match &args.settings {
        Some(path) => FillSettings::load(path)?,
        None => FillSettings::all_pools(&game_data),
    };

    let randomization = get_randomization(&args, &game_data, &settings)?;
    info!(
        "Placed {} items over {} locations (seed {})",
        randomization.placements.item_count(),
        randomization.spoiler.len(),
        randomization.seed
    );

    let output_str = serde_json::to_string_pretty(&randomization)?;
    match &args.output {
        Some(output_path) => {
            println!("Writing placements to {}", output_path.display());
            std::fs::write(output_path, output_str)?;
        }
        None => println!("{output_str}"),
    }
    Ok(())
}
