//! Shared-memory parallel implementation of the wavefront computation
//!
//! A fixed pool of worker threads is spawned for each run. All workers operate
//! on the same matrix: on each tile-diagonal, every worker evaluates the tiles
//! that the distribution policy assigns to it, then waits for the others at a
//! barrier before moving on to the next tile-diagonal. The barrier is what
//! guarantees that all inputs of a tile-diagonal are computed and visible
//! before any worker starts reading them.

mod args;
mod barrier;

pub use args::ParallelArgs;

use crate::barrier::{Aborted, PhaseBarrier};
use compute::{
    distribution::Distribution,
    shared::SharedMatrix,
    tiling::{self, Tile, Tiling},
    ConfigError, Parameters, Policy, Wavefront, WavefrontBase, WavefrontCreate,
};
use data::Matrix;
use log::{debug, trace};
use std::{io, num::NonZeroUsize, thread};
use thiserror::Error;

/// Multithreaded wavefront computation
#[derive(Debug)]
pub struct Engine {
    /// Computation parameters
    params: Parameters,

    /// Backend-specific parameters
    args: ParallelArgs,
}
//
impl WavefrontBase for Engine {
    type CliArgs = ParallelArgs;

    type Error = Error;
}
//
impl WavefrontCreate for Engine {
    fn new(params: Parameters, args: ParallelArgs) -> Result<Self, Error> {
        Ok(Self { params, args })
    }
}
//
impl Wavefront for Engine {
    fn parameters(&self) -> &Parameters {
        &self.params
    }

    fn compute(&self, matrix: &mut Matrix) -> Result<(), Error> {
        self.compute_with(matrix, |_, _| {})
    }
}
//
impl Engine {
    /// Run the computation, calling `before_tile` with the worker identifier
    /// and the tile every time a worker thread is about to evaluate a tile
    fn compute_with(
        &self,
        matrix: &mut Matrix,
        before_tile: impl Fn(usize, &Tile) + Sync,
    ) -> Result<(), Error> {
        let tiling = self.params.tiling(matrix.size());
        let num_workers = self.num_workers();
        debug!(
            "Running {} wavefront on a {1}x{1} matrix with {num_workers} threads and tiles of size {2}",
            self.params.policy,
            matrix.size(),
            tiling.tile_size()
        );

        // A single worker needs neither threads nor synchronization
        if num_workers.get() == 1 {
            for diagonal in tiling.diagonals() {
                for tile in diagonal.tiles() {
                    tiling::evaluate_tile(matrix, &tile, |_| {});
                }
            }
            return Ok(());
        }

        let shared = SharedMatrix::new(matrix);
        let barrier = PhaseBarrier::new(num_workers.get());
        thread::scope(|s| {
            // Spawn the workers
            let mut workers = Vec::with_capacity(num_workers.get());
            let mut spawn_error = None;
            for worker in 0..num_workers.get() {
                let mut builder = thread::Builder::new().name(format!("wavefront-{worker}"));
                if let Some(stack_size) = self.args.stack_size {
                    builder = builder.stack_size(stack_size.get());
                }
                let (shared, barrier, before_tile) = (&shared, &barrier, &before_tile);
                match builder.spawn_scoped(s, move || {
                    self.run_worker(worker, num_workers, tiling, shared, barrier, before_tile)
                }) {
                    Ok(handle) => workers.push(handle),
                    Err(source) => {
                        // Workers that are already running must not wait forever
                        barrier.abort();
                        spawn_error = Some(Error::Spawn { worker, source });
                        break;
                    }
                }
            }

            // Wait for them to finish
            let mut panicked = None;
            for (worker, handle) in workers.into_iter().enumerate() {
                if handle.join().is_err() {
                    panicked.get_or_insert(worker);
                }
            }
            match (spawn_error, panicked) {
                (Some(error), _) => Err(error),
                (None, Some(worker)) => Err(Error::WorkerPanicked(worker)),
                (None, None) => Ok(()),
            }
        })
    }

    /// Number of worker threads to be used
    fn num_workers(&self) -> NonZeroUsize {
        if self.params.policy == Policy::Sequential {
            NonZeroUsize::MIN
        } else {
            self.params.num_workers
        }
    }

    /// Work performed by one worker thread
    fn run_worker(
        &self,
        worker: usize,
        num_workers: NonZeroUsize,
        tiling: Tiling,
        shared: &SharedMatrix<'_>,
        barrier: &PhaseBarrier,
        before_tile: &impl Fn(usize, &Tile),
    ) -> Result<(), Aborted> {
        let _abort_on_panic = barrier.abort_on_panic();
        let distribution = self.params.distribution();

        // SAFETY: Within a tile-diagonal, the distribution gives each tile to
        //         exactly one worker, tiles cover disjoint cells, and a tile
        //         only reads its own cells and those of earlier
        //         tile-diagonals. The barrier separates tile-diagonals.
        let mut cells = unsafe { shared.worker() };

        for diagonal in tiling.diagonals() {
            let num_tiles = diagonal.num_tiles();
            for index in distribution.owned_tiles(worker, num_tiles, num_workers) {
                if let Some(tile) = diagonal.tile(index) {
                    before_tile(worker, &tile);
                    tiling::evaluate_tile(&mut cells, &tile, |_| {});
                }
            }
            trace!(
                "Worker {worker} done with tile-diagonal K={}",
                diagonal.start()
            );
            barrier.wait()?;
        }
        Ok(())
    }
}

/// Things that can go wrong when performing parallel computation
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid computation parameters
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to start a worker thread
    #[error("failed to spawn worker thread {worker}")]
    Spawn {
        /// Identifier of the worker that could not be spawned
        worker: usize,

        /// Underlying OS error
        source: io::Error,
    },

    /// A worker thread panicked, leaving the matrix partially computed
    #[error("worker thread {0} panicked")]
    WorkerPanicked(usize),
}
