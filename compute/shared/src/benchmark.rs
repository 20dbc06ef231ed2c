//! Benchmarking utilities
//!
//! Please consider using the macros provided by this crate instead of calling
//! these implementation details directly.

use crate::{Parameters, Policy, Wavefront, WavefrontCreate};
use clap::{Args, Command, FromArgMatches};
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput};
use data::Matrix;
use std::{hint::black_box, num::NonZeroUsize, sync::Once};

/// Re-export criterion for the criterion_benchmark macro
pub use criterion;

// Make sure env_logger is only initialized once
fn init_logger() {
    static INIT_LOGGER: Once = Once::new();
    INIT_LOGGER.call_once(env_logger::init);
}

/// Common criterion benchmark for all wavefront computations
/// Use via the criterion_benchmark macro
pub fn criterion_benchmark<Engine: WavefrontCreate + Wavefront>(
    c: &mut Criterion,
    backend_name: &str,
) {
    init_logger();

    let make_args = || {
        Engine::CliArgs::from_arg_matches(
            &Engine::CliArgs::augment_args(Command::default().no_binary_name(true))
                .get_matches_from(None::<&str>),
        )
        .expect("Failed to parse arguments from defaults & environment")
    };

    let mut group = c.benchmark_group(backend_name.to_owned());
    for policy in [Policy::Block, Policy::Cyclic, Policy::BlockCyclic] {
        for tile_size in [1, 8, 32] {
            let params = Parameters {
                policy,
                tile_size: NonZeroUsize::new(tile_size).expect("Tile sizes are nonzero"),
                ..Parameters::default()
            };
            let engine = Engine::new(black_box(params), black_box(make_args())).unwrap();
            for size_pow2 in 6..=10 {
                let size = 2usize.pow(size_pow2);
                let num_cells = (size * (size - 1) / 2) as u64;

                group.throughput(Throughput::Elements(num_cells));
                group.bench_function(
                    BenchmarkId::from_parameter(format!("{policy},tile{tile_size},{size}x{size}")),
                    |b| {
                        b.iter_batched_ref(
                            || Matrix::new(size),
                            |matrix| engine.compute(matrix).unwrap(),
                            BatchSize::LargeInput,
                        );
                    },
                );
            }
        }
    }
    group.finish();
}
