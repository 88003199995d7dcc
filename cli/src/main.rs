mod interactive;

use std::{
    fs::File,
    io::{stdin, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use cache_sim::{
    config::{CacheConfig, Geometry},
    io::parse_image,
    sim::Simulator,
};
use clap::Parser;

#[cfg(feature = "stat")]
use terminal_size::terminal_size;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File path to initial memory contents (one hex byte per line)
    input: PathBuf,
    /// File path to cache configuration in JSON (prompted for when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Seed of random replacement
    #[arg(long)]
    seed: Option<u64>,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let Cli {
        input,
        config,
        seed,
        verbose,
    } = Cli::parse();
    if verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }
    let image = read_image(&input)?;
    log::info!("loaded {} bytes from {}", image.len(), input.display());

    println!("*** Welcome to the cache simulator ***");
    let stdin = stdin();
    let mut stdin = stdin.lock();
    let config = match config {
        Some(path) => read_config(&path)?,
        None => interactive::configure(&mut stdin)?,
    };
    let mut sim = match seed {
        Some(seed) => Simulator::with_seed(config, &image, seed)?,
        None => Simulator::new(config, &image)?,
    };
    interactive::execute_interactive(&mut sim, &mut stdin)?;
    output_stat(&sim);
    Ok(())
}

#[cfg(not(feature = "stat"))]
fn output_stat(_: &Simulator) {}

#[cfg(feature = "stat")]
fn output_stat(sim: &Simulator) {
    let max_width = get_terminal_width().unwrap_or(120) as usize;
    log::info!("statistics:\n{}", sim.collect_stat().view(max_width));
}

#[cfg(feature = "stat")]
fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(20))
}

fn read_config(path: &Path) -> Result<CacheConfig> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let config = CacheConfig::deser(file)?;
    Geometry::new(&config).with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    let mut buf = String::new();
    let mut file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    file.read_to_string(&mut buf)?;
    Ok(parse_image(&buf).with_context(|| format!("malformed memory image {}", path.display()))?)
}
