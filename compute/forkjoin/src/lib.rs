//! Fork-join implementation of the wavefront computation
//!
//! Each tile-diagonal is processed by one data-parallel loop on a rayon thread
//! pool. The end of the loop acts as the synchronization point between
//! tile-diagonals, so no explicit barrier is needed.
//!
//! Tiles are either grouped by owner according to the distribution policy,
//! with one parallel task per worker, or handed out to the thread pool one by
//! one and balanced dynamically by work stealing.

use clap::Args;
use compute::{
    distribution::Distribution,
    shared::SharedMatrix,
    tiling::{self, TileDiagonal},
    ConfigError, Parameters, Policy, Wavefront, WavefrontBase, WavefrontCreate,
};
use data::Matrix;
use log::{debug, trace};
use rayon::{prelude::*, ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::num::NonZeroUsize;
use thiserror::Error;

/// CLI parameters for the fork-join implementation
#[derive(Args, Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct ForkJoinArgs {
    /// Balance tiles dynamically instead of following the distribution policy
    ///
    /// Every tile of a tile-diagonal becomes an independent parallel task,
    /// which lets the thread pool balance the load by work stealing.
    #[arg(long, env)]
    pub dynamic: bool,
}

/// Fork-join wavefront computation
#[derive(Debug)]
pub struct Engine {
    /// Computation parameters
    params: Parameters,

    /// Backend-specific parameters
    args: ForkJoinArgs,

    /// Thread pool on which parallel loops are executed
    pool: ThreadPool,
}
//
impl WavefrontBase for Engine {
    type CliArgs = ForkJoinArgs;

    type Error = Error;
}
//
impl WavefrontCreate for Engine {
    fn new(params: Parameters, args: ForkJoinArgs) -> Result<Self, Error> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(params.num_workers.get())
            .thread_name(|idx| format!("wavefront-{idx}"))
            .build()
            .map_err(Error::ThreadPool)?;
        Ok(Self { params, args, pool })
    }
}
//
impl Wavefront for Engine {
    fn parameters(&self) -> &Parameters {
        &self.params
    }

    fn compute(&self, matrix: &mut Matrix) -> Result<(), Error> {
        let tiling = self.params.tiling(matrix.size());
        debug!(
            "Running fork-join {} wavefront on a {1}x{1} matrix with {2} threads and tiles of size {3}",
            if self.args.dynamic { "dynamic".to_owned() } else { self.params.policy.to_string() },
            matrix.size(),
            self.pool.current_num_threads(),
            tiling.tile_size()
        );

        let shared = SharedMatrix::new(matrix);
        self.pool.install(|| {
            for diagonal in tiling.diagonals() {
                if self.args.dynamic {
                    Self::dynamic_step(&shared, diagonal);
                } else {
                    self.static_step(&shared, diagonal);
                }
                trace!("Done with tile-diagonal K={}", diagonal.start());
            }
        });
        Ok(())
    }
}
//
impl Engine {
    /// Number of tile sets that the distribution policy should produce
    fn num_workers(&self) -> NonZeroUsize {
        if self.params.policy == Policy::Sequential {
            NonZeroUsize::MIN
        } else {
            self.params.num_workers
        }
    }

    /// Process a tile-diagonal with one parallel task per worker
    fn static_step(&self, shared: &SharedMatrix<'_>, diagonal: TileDiagonal) {
        let num_workers = self.num_workers();
        let distribution = self.params.distribution();
        let num_tiles = diagonal.num_tiles();
        (0..num_workers.get()).into_par_iter().for_each(|worker| {
            // SAFETY: Each tile of the tile-diagonal belongs to one worker, and
            //         the parallel loop ends before the next tile-diagonal
            let mut cells = unsafe { shared.worker() };
            for index in distribution.owned_tiles(worker, num_tiles, num_workers) {
                if let Some(tile) = diagonal.tile(index) {
                    tiling::evaluate_tile(&mut cells, &tile, |_| {});
                }
            }
        });
    }

    /// Process a tile-diagonal with one parallel task per tile
    fn dynamic_step(shared: &SharedMatrix<'_>, diagonal: TileDiagonal) {
        (0..diagonal.num_tiles()).into_par_iter().for_each(|index| {
            // SAFETY: Each tile is processed by one task, and the parallel
            //         loop ends before the next tile-diagonal
            let mut cells = unsafe { shared.worker() };
            if let Some(tile) = diagonal.tile(index) {
                tiling::evaluate_tile(&mut cells, &tile, |_| {});
            }
        });
    }
}

/// Things that can go wrong when performing fork-join computation
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid computation parameters
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to configure thread pool
    #[error("failed to configure thread pool")]
    ThreadPool(#[source] ThreadPoolBuildError),
}
