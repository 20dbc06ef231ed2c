//! Common facilities shared by all compute backends
//!
//! The wavefront computation fills the upper triangle of a square matrix,
//! one diagonal after another, using a recurrence in which each cell depends
//! on a run of cells to its left and below it (see [`recurrence`]). Backends
//! differ in how they spread this work across compute units, but they all
//! build upon the tiling scheme of [`tiling`] and the tile-to-worker mappings
//! of [`distribution`].

#[cfg(feature = "criterion")]
pub mod benchmark;
pub mod distribution;
pub mod parameters;
pub mod recurrence;
pub mod shared;
pub mod tiling;

use clap::Args;
use data::Matrix;
use std::{error::Error, fmt::Debug};

pub use parameters::{ConfigError, Parameters, Policy};

/// Commonalities between all wavefront compute backends
pub trait WavefrontBase: Sized {
    /// Tuning parameters that are specific to this backend
    ///
    /// Should be `NoArgs` for backends that don't have such parameters.
    type CliArgs: Args + Debug;

    /// Things that can go wrong during setup or computation
    type Error: Error + From<ConfigError> + Send + Sync + 'static;
}

/// Backend creation interface
pub trait WavefrontCreate: WavefrontBase {
    /// Set up the compute backend
    ///
    /// Configuration errors are reported here, before any computation has
    /// taken place.
    fn new(params: Parameters, args: Self::CliArgs) -> Result<Self, Self::Error>;
}

/// Wavefront computation interface expected by the "wavefront" CLI program
pub trait Wavefront: WavefrontBase {
    /// Parameters with which this backend was set up
    fn parameters(&self) -> &Parameters;

    /// Fill the upper triangle of a freshly seeded matrix
    ///
    /// `matrix` must have been initialized with [`Matrix::new()`]. On success,
    /// every cell above the main diagonal has been computed. On failure, the
    /// matrix is left in an unspecified partially computed state and must not
    /// be used.
    ///
    /// This is the point at which callers should measure elapsed time.
    fn compute(&self, matrix: &mut Matrix) -> Result<(), Self::Error>;
}

/// Placeholder for backends that don't have tuning parameters
#[derive(Args, Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct NoArgs {}

/// Macro that generates a complete criterion benchmark harness for you
#[macro_export]
#[cfg(feature = "criterion")]
macro_rules! criterion_benchmark {
    ($backend:ident) => {
        fn criterion_benchmark(c: &mut $crate::benchmark::criterion::Criterion) {
            $crate::benchmark::criterion_benchmark::<$backend::Engine>(c, stringify!($backend))
        }
        $crate::benchmark::criterion::criterion_group!(benches, criterion_benchmark);
        $crate::benchmark::criterion::criterion_main!(benches);
    };
}
