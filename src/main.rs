use alns_evsp::config::Config;
use alns_evsp::problem::Problem;
use alns_evsp::utils::{save_schedule, SearchStatistics};
use alns_evsp::AlnsAlgorithm;
use clap::Parser;
use log::error;
use std::fs;
use std::path::PathBuf;
use std::process;

/// Solve an electric bus scheduling instance with ALNS.
#[derive(Parser, Debug)]
#[command(name = "alns_evsp", version, about)]
struct Args {
    /// Instance file (JSON)
    instance: PathBuf,

    /// Search configuration (JSON), defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the iteration cap
    #[arg(short, long)]
    iterations: Option<usize>,

    /// Seed for a reproducible run
    #[arg(short, long)]
    seed: Option<u64>,

    /// Charge overnight only
    #[arg(long)]
    night_charge: bool,

    /// Write the best schedule to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => Config::new(),
    };
    if let Some(iterations) = args.iterations {
        config = config.with_max_iterations(iterations);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if args.night_charge {
        config = config.with_night_charge_only(true);
    }
    Ok(config)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let problem = Problem::from_file(&args.instance)?;
    let config = load_config(&args)?;

    let mut algorithm = AlnsAlgorithm::new(problem, config)?;
    algorithm.run();
    algorithm.best_schedule.sort_by_start(&algorithm.problem);

    let statistics: SearchStatistics = algorithm.statistics();
    println!("{}", statistics.format());
    println!("{:?}", algorithm.best_schedule);

    if let Some(path) = &args.output {
        save_schedule(&algorithm.best_schedule, &algorithm.problem, path)?;
    }

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run(Args::parse()) {
        error!("{}", err);
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
