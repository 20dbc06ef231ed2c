//! Layout of the buffers that carry tile-diagonal results

use compute::{
    distribution::{AnyDistribution, Distribution},
    recurrence::Cells,
    tiling::{Tile, TileDiagonal},
};
use data::Precision;
use std::{num::NonZeroUsize, ops::Range};

/// Where each worker's results go in the buffers of one tile-diagonal
///
/// A worker's buffer lists the live cells of the tiles it owns, by ascending
/// tile index, and in evaluation order within each tile (see
/// [`Tile::cells()`]). The full tile-diagonal buffer that the coordinator
/// broadcasts is the concatenation of all worker buffers by ascending worker
/// identifier.
///
/// Every participant can compute this layout on its own, so buffer sizes never
/// need to be transmitted.
#[derive(Clone, Debug)]
pub struct DiagonalLayout {
    /// Tile-diagonal being exchanged
    diagonal: TileDiagonal,

    /// Tile-to-worker mapping
    distribution: AnyDistribution,

    /// Number of workers
    num_workers: NonZeroUsize,

    /// Start of each worker's data within the full buffer, plus the end
    offsets: Box<[usize]>,
}
//
impl DiagonalLayout {
    /// Compute the layout of a tile-diagonal
    pub fn new(
        diagonal: TileDiagonal,
        distribution: AnyDistribution,
        num_workers: NonZeroUsize,
    ) -> Self {
        let num_tiles = diagonal.num_tiles();
        let offsets = std::iter::once(0)
            .chain((0..num_workers.get()).scan(0, |offset, worker| {
                *offset += diagonal
                    .live_cells(distribution.owned_tiles(worker, num_tiles, num_workers));
                Some(*offset)
            }))
            .collect();
        Self {
            diagonal,
            distribution,
            num_workers,
            offsets,
        }
    }

    /// Number of values that a worker contributes
    pub fn worker_len(&self, worker: usize) -> usize {
        self.worker_range(worker).len()
    }

    /// Number of values in the full tile-diagonal buffer
    pub fn total_len(&self) -> usize {
        self.offsets[self.num_workers.get()]
    }

    /// Location of a worker's values within the full buffer
    pub fn worker_range(&self, worker: usize) -> Range<usize> {
        self.offsets[worker]..self.offsets[worker + 1]
    }

    /// Tiles owned by a worker, in buffer order
    pub fn worker_tiles(&self, worker: usize) -> impl Iterator<Item = Tile> + '_ {
        let num_tiles = self.diagonal.num_tiles();
        self.distribution
            .owned_tiles(worker, num_tiles, self.num_workers)
            .filter_map(|index| self.diagonal.tile(index))
    }

    /// Collect the already computed values of a worker's tiles
    pub fn pack(&self, cells: &impl Cells, worker: usize) -> Vec<Precision> {
        let mut buffer = Vec::with_capacity(self.worker_len(worker));
        for tile in self.worker_tiles(worker) {
            buffer.extend(
                tile.cells()
                    .map(|(row, offset)| cells.get([row, row + offset])),
            );
        }
        debug_assert_eq!(buffer.len(), self.worker_len(worker));
        buffer
    }

    /// Store the values of a worker's tiles
    ///
    /// `values` must have been produced by [`pack()`](Self::pack) or in the
    /// same order, and hold exactly [`worker_len()`](Self::worker_len) values.
    pub fn unpack(&self, cells: &mut impl Cells, worker: usize, values: &[Precision]) {
        assert_eq!(values.len(), self.worker_len(worker), "bad buffer length");
        let mut values = values.iter().copied();
        for tile in self.worker_tiles(worker) {
            for ((row, offset), value) in tile.cells().zip(&mut values) {
                cells.set([row, row + offset], value);
            }
        }
    }

    /// Store the values of every worker except one from a full buffer
    ///
    /// The skipped worker is typically the local participant, whose values are
    /// already in place.
    pub fn unpack_others(&self, cells: &mut impl Cells, skip: usize, buffer: &[Precision]) {
        assert_eq!(buffer.len(), self.total_len(), "bad buffer length");
        for worker in (0..self.num_workers.get()).filter(|&worker| worker != skip) {
            self.unpack(cells, worker, &buffer[self.worker_range(worker)]);
        }
    }
}
