//! Benchmark sweep over sizes, execution modes and computation parameters

use clap::Args;
use compute::{Parameters, Policy, Wavefront, WavefrontCreate};
use compute_selector::{BackendArgs, Engine, Mode, SelectorArgs};
use data::Matrix;
use eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressFinish, ProgressIterator, ProgressStyle};
use log::{debug, warn};
use std::{
    collections::HashMap,
    fs::OpenOptions,
    io::{LineWriter, Write},
    num::NonZeroUsize,
    path::PathBuf,
    time::{Duration, Instant},
};

/// Header of the results file
const HEADER: &str = "N,mode,policy,workers,tile,chunk,ms,checksum";

#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Matrix sizes
    #[arg(short = 'n', long, value_delimiter = ',', default_values_t = [256, 512, 1024])]
    sizes: Vec<usize>,

    /// Execution modes
    #[arg(short, long, value_enum, value_delimiter = ',', default_values_t = Mode::ALL)]
    modes: Vec<Mode>,

    /// Work distribution policies
    #[arg(short, long, value_enum, value_delimiter = ',', default_values_t = Policy::ALL)]
    policies: Vec<Policy>,

    /// Worker counts
    #[arg(short = 'j', long, value_delimiter = ',', default_values_t = [1, 2, 4])]
    workers: Vec<usize>,

    /// Tile sizes
    #[arg(short, long, value_delimiter = ',', default_values_t = [1, 8, 32])]
    tile_sizes: Vec<usize>,

    /// Chunk sizes, only swept for the block-cyclic policy
    ///
    /// Other policies are only measured once, and the first chunk size is
    /// recorded for them.
    #[arg(short, long, value_delimiter = ',', default_values_t = [8])]
    chunk_sizes: Vec<usize>,

    /// Number of measurements per configuration, of which the fastest is kept
    #[arg(short, long, default_value_t = NonZeroUsize::MIN)]
    repetitions: NonZeroUsize,

    /// Results file, created if needed and appended to otherwise
    #[arg(short, long, default_value = "wavefront.csv")]
    output: PathBuf,

    #[command(flatten)]
    backends: BackendArgs,
}

/// One configuration to be measured
#[derive(Clone, Copy, Debug)]
struct Point {
    size: usize,
    mode: Mode,
    params: Parameters,
}

/// Name of the execution mode of an engine, as recorded in results
pub fn mode_name(engine: &Engine) -> String {
    engine
        .mode()
        .map_or_else(|| Policy::Sequential.to_string(), |mode| mode.to_string())
}

/// List the configurations to be measured
///
/// The sequential policy does not depend on the execution mode, worker count
/// or tiling, so it is only measured once per size.
fn points(args: &SweepArgs) -> Result<Vec<Point>> {
    let mut points = Vec::new();
    for &size in &args.sizes {
        for &policy in &args.policies {
            if policy == Policy::Sequential {
                points.push(Point {
                    size,
                    mode: Mode::default(),
                    params: Parameters::new(1, policy.id(), 1, 1)?,
                });
                continue;
            }
            let num_chunk_sizes = if policy.uses_chunk_size() {
                args.chunk_sizes.len()
            } else {
                1
            };
            for &mode in &args.modes {
                for &num_workers in &args.workers {
                    for &tile_size in &args.tile_sizes {
                        for &chunk_size in args.chunk_sizes.iter().take(num_chunk_sizes) {
                            let params =
                                Parameters::new(num_workers, policy.id(), tile_size, chunk_size)?;
                            points.push(Point { size, mode, params });
                        }
                    }
                }
            }
        }
    }
    Ok(points)
}

/// Measure the fastest of several runs of a configuration
fn measure(
    point: Point,
    backends: BackendArgs,
    repetitions: NonZeroUsize,
) -> Result<(Engine, Duration, u64)> {
    let args = SelectorArgs {
        mode: point.mode,
        backends,
    };
    let engine = Engine::new(point.params, args)?;
    let mut best = Duration::MAX;
    let mut checksum = 0;
    for _ in 0..repetitions.get() {
        let mut matrix = Matrix::new(point.size);
        let start = Instant::now();
        engine.compute(&mut matrix)?;
        best = best.min(start.elapsed());
        checksum = matrix.checksum();
    }
    Ok((engine, best, checksum))
}

/// Run the benchmark sweep
pub fn sweep(args: SweepArgs) -> Result<()> {
    let points = points(&args)?;
    debug!("Sweeping over {} configurations", points.len());

    // Open the results file, writing the header if it is new
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.output)
        .wrap_err_with(|| format!("failed to open {}", args.output.display()))?;
    let is_empty = file.metadata()?.len() == 0;
    let mut results = LineWriter::new(file);
    if is_empty {
        writeln!(results, "{HEADER}")?;
    }

    // Set up progress reporting
    let progress = ProgressBar::new(points.len() as u64)
        .with_message("Measuring configuration")
        .with_style(ProgressStyle::with_template(
            "{msg} {pos}/{len} {wide_bar} {elapsed}/~{duration}",
        )?)
        .with_finish(ProgressFinish::AndClear);
    progress.enable_steady_tick(Duration::from_millis(100));

    // Perform the measurements
    let mut checksums = HashMap::new();
    for point in points.into_iter().progress_with(progress) {
        let (engine, elapsed, checksum) = measure(point, args.backends, args.repetitions)?;
        let reference = *checksums.entry(point.size).or_insert(checksum);
        if checksum != reference {
            warn!(
                "Checksum {checksum} of {point:?} differs from the {reference} of earlier {0}x{0} runs",
                point.size
            );
        }
        let params = engine.parameters();
        writeln!(
            results,
            "{},{},{},{},{},{},{:.3},{checksum}",
            point.size,
            mode_name(&engine),
            params.policy,
            params.num_workers,
            params.tile_size,
            params.chunk_size,
            elapsed.as_secs_f64() * 1e3,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        sweep: SweepArgs,
    }

    fn parse(args: &[&str]) -> SweepArgs {
        Cli::parse_from(std::iter::once("sweep").chain(args.iter().copied())).sweep
    }

    #[test]
    fn default_grid() {
        let args = parse(&[]);
        let points = points(&args).unwrap();
        // 3 sizes x (1 sequential + 3 policies x 3 modes x 3 worker counts x 3 tile sizes)
        assert_eq!(points.len(), 3 * (1 + 3 * 3 * 3 * 3));
    }

    #[test]
    fn chunk_sizes_only_multiply_block_cyclic() {
        let args = parse(&[
            "-n", "10", "-m", "shared", "-p", "block,block-cyclic", "-j", "2", "-t", "1",
            "-c", "1,2,3",
        ]);
        let points = points(&args).unwrap();
        assert_eq!(points.len(), 1 + 3);
        assert_eq!(points[0].params.policy, Policy::Block);
        assert_eq!(points[0].params.chunk_size.get(), 1);
    }

    #[test]
    fn zero_workers_are_rejected() {
        let args = parse(&["-j", "0"]);
        assert!(points(&args).is_err());
    }

    #[test]
    fn measurement_is_reproducible() {
        let point = Point {
            size: 20,
            mode: Mode::Distributed,
            params: Parameters::new(3, Policy::Cyclic.id(), 2, 1).unwrap(),
        };
        let repetitions = NonZeroUsize::new(2).unwrap();
        let (_, _, first) = measure(point, BackendArgs::default(), repetitions).unwrap();
        let mut matrix = Matrix::new(20);
        compute_sequential_reference(&mut matrix);
        assert_eq!(first, matrix.checksum());
    }

    fn compute_sequential_reference(matrix: &mut Matrix) {
        let params = Parameters::new(1, Policy::Sequential.id(), 1, 1).unwrap();
        Engine::new(params, SelectorArgs::default())
            .unwrap()
            .compute(matrix)
            .unwrap();
    }
}
