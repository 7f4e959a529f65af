#![warn(unused_extern_crates)]

use anyhow::Result;
use clap::Parser;
use nftcard::config::Config;
use nftcard::parts::GenerationParts;
use nftcard::CardGenerator;
use num_cpus::get as get_cpu_count;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON manifest naming the player, colors and pictures.
    #[arg(short, long)]
    parts: PathBuf,

    #[arg(short, long, default_value = "card.png")]
    output: PathBuf,

    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    max_threads: Option<usize>,

    /// Writes intermediate rasters here.
    #[arg(long)]
    debug_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_span_events(FmtSpan::CLOSE)
        .init();
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    let total_threads = get_cpu_count();
    let total_threads = args.max_threads.unwrap_or(total_threads).min(total_threads);
    config.models.threads = (total_threads / 2).max(1);
    debug!("Running models on {} threads", config.models.threads);

    let parts = GenerationParts::load(&args.parts)?;
    let mut generator = CardGenerator::from_config(&config)?;
    if let Some(dir) = args.debug_dir {
        generator = generator.with_debug_dir(dir);
    }

    let start = Instant::now();
    let card = generator.generate(&parts)?;
    debug!("Took {:?}", start.elapsed());

    fs::write(&args.output, card)?;
    info!("Card for player {} at {:?}", parts.player.code, args.output);

    Ok(())
}
