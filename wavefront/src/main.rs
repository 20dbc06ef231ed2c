mod output;
mod sweep;

use clap::{Args, Parser, Subcommand};
use compute::{Parameters, Policy, Wavefront, WavefrontCreate};
use compute_selector::{Engine, SelectorArgs};
use data::Matrix;
use eyre::Result;
use log::info;
use std::{num::NonZeroUsize, path::PathBuf, time::Instant};

/// Fill the upper triangle of a matrix with a tiled wavefront computation
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Perform one computation, then report its duration and checksum
    Run(RunArgs),

    /// Measure many parameter combinations and append the results to a file
    Sweep(sweep::SweepArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Number of rows and columns of the matrix
    #[arg(short = 'n', long, env = "WAVEFRONT_SIZE", default_value_t = 2000)]
    size: usize,

    /// Number of workers
    ///
    /// Defaults to the amount of hardware parallelism available.
    #[arg(short = 'j', long, env = "WAVEFRONT_WORKERS")]
    workers: Option<NonZeroUsize>,

    /// Work distribution policy
    #[arg(short, long, env = "WAVEFRONT_POLICY", value_enum, default_value_t)]
    policy: Policy,

    /// Side length of the tiles that workers process
    #[arg(short, long, env = "WAVEFRONT_TILE_SIZE", default_value_t = NonZeroUsize::MIN)]
    tile_size: NonZeroUsize,

    /// Number of consecutive tiles per chunk, for the block-cyclic policy
    #[arg(short, long, env = "WAVEFRONT_CHUNK_SIZE", default_value_t = Parameters::default().chunk_size)]
    chunk_size: NonZeroUsize,

    #[command(flatten)]
    selector: SelectorArgs,

    /// Save the resulting matrix to this file
    ///
    /// Files with an .h5 extension are written in HDF5 format if HDF5 support
    /// was enabled at build time. Other files use a raw little-endian format.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Check the result against a matrix that was previously saved
    #[arg(long)]
    compare: Option<PathBuf>,

    /// Display the resulting matrix, only sensible for small sizes
    #[arg(long)]
    print: bool,
}

fn main() -> Result<()> {
    // Enable logging
    env_logger::init();

    match Cli::parse().command {
        Command::Run(args) => run(args),
        Command::Sweep(args) => sweep::sweep(args),
    }
}

/// Perform a single computation
fn run(args: RunArgs) -> Result<()> {
    // Set up the computation
    let params = Parameters {
        num_workers: args
            .workers
            .unwrap_or_else(|| Parameters::default().num_workers),
        policy: args.policy,
        tile_size: args.tile_size,
        chunk_size: args.chunk_size,
    };
    let engine = Engine::new(params, args.selector)?;
    let mut matrix = Matrix::new(args.size);

    // Run it
    let start = Instant::now();
    engine.compute(&mut matrix)?;
    let elapsed = start.elapsed();
    let checksum = matrix.checksum();
    info!(
        "Computed a {0}x{0} matrix in {elapsed:?} ({1} mode, {params:?})",
        args.size,
        sweep::mode_name(&engine)
    );

    // Report results
    println!("Time: {:.3} ms", elapsed.as_secs_f64() * 1e3);
    println!("Checksum: {checksum}");
    if args.print {
        print!("{matrix}");
    }
    if let Some(path) = args.output {
        output::save(&matrix, &path)?;
    }
    if let Some(path) = args.compare {
        output::compare(&matrix, &path)?;
    }
    Ok(())
}
