//! Tiling of the upper triangle of the matrix
//!
//! The upper triangle is cut into square tiles of side `tile_size`, which are
//! grouped into tile-diagonals. Tile-diagonal `K` (a multiple of `tile_size`)
//! holds the tiles whose top-left corner sits on diagonal offset `K`:
//!
//! ```text
//! K = 0     K = t     K = 2t
//! ##....    ..##..    ....##
//! ##....    ..##..    ....##
//! ..##..    ....##    ......
//! ..##..    ....##    ......
//! ....##    ......    ......
//! ....##    ......    ......
//! ```
//!
//! Every cell of a tile only depends on cells of the same tile or of earlier
//! tile-diagonals, so the tiles of a tile-diagonal can be processed in any
//! order, including in parallel, once all previous tile-diagonals are done.

use crate::recurrence::{self, Cells};
use data::Precision;
use std::{num::NonZeroUsize, ops::RangeInclusive};

/// Tiling of an N×N matrix
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct Tiling {
    /// Size of the matrix
    size: usize,

    /// Side length of a tile
    tile_size: NonZeroUsize,
}
//
impl Tiling {
    /// Set up the tiling of a matrix of a certain size
    pub fn new(size: usize, tile_size: NonZeroUsize) -> Self {
        Self { size, tile_size }
    }

    /// Size of the matrix
    pub fn size(&self) -> usize {
        self.size
    }

    /// Side length of a tile
    pub fn tile_size(&self) -> NonZeroUsize {
        self.tile_size
    }

    /// Number of tile-diagonals
    pub fn num_diagonals(&self) -> usize {
        self.size.div_ceil(self.tile_size.get())
    }

    /// Tile-diagonal with a certain index
    ///
    /// Tile-diagonal `step` starts at diagonal offset `step * tile_size`.
    pub fn diagonal(&self, step: usize) -> Option<TileDiagonal> {
        (step < self.num_diagonals()).then(|| TileDiagonal {
            size: self.size,
            tile_size: self.tile_size.get(),
            step,
        })
    }

    /// Tile-diagonals in the order where they must be processed, going from
    /// the main diagonal outwards
    pub fn diagonals(&self) -> impl DoubleEndedIterator<Item = TileDiagonal> + Clone + '_ {
        (0..self.num_diagonals()).filter_map(move |step| self.diagonal(step))
    }
}

/// Set of tiles whose top-left corners sit on the same diagonal offset
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct TileDiagonal {
    /// Size of the matrix
    size: usize,

    /// Side length of a tile
    tile_size: usize,

    /// Position of this tile-diagonal in processing order
    step: usize,
}
//
impl TileDiagonal {
    /// Position of this tile-diagonal in processing order
    pub fn step(&self) -> usize {
        self.step
    }

    /// Diagonal offset of the top-left corner of the tiles (K)
    pub fn start(&self) -> usize {
        self.step * self.tile_size
    }

    /// Number of tiles on this tile-diagonal
    pub fn num_tiles(&self) -> usize {
        (self.size - self.start()).div_ceil(self.tile_size)
    }

    /// Geometry of a tile of this tile-diagonal
    ///
    /// Returns `None` if the tile would start outside of the matrix.
    pub fn tile(&self, index: usize) -> Option<Tile> {
        let min_row = index.checked_mul(self.tile_size)?;
        let min_col = min_row.checked_add(self.start())?;
        if min_row >= self.size || min_col >= self.size {
            return None;
        }
        let last = self.size - 1;
        Some(Tile {
            min_row,
            max_row: (min_row + self.tile_size - 1).min(last),
            min_col,
            max_col: (min_col + self.tile_size - 1).min(last),
        })
    }

    /// Tiles of this tile-diagonal, in index order
    pub fn tiles(&self) -> impl DoubleEndedIterator<Item = Tile> + Clone + '_ {
        (0..self.num_tiles()).filter_map(move |index| self.tile(index))
    }

    /// Number of cells computed by a set of tiles from this tile-diagonal
    pub fn live_cells(&self, tiles: impl IntoIterator<Item = usize>) -> usize {
        tiles
            .into_iter()
            .filter_map(|index| self.tile(index))
            .map(|tile| tile.live_cells())
            .sum()
    }
}

/// Rectangular region of the matrix processed as a unit by one worker
///
/// Bounds are inclusive. Only cells strictly above the main diagonal are live,
/// other cells of the region are either seeds or unused.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct Tile {
    /// First row of the tile
    pub min_row: usize,

    /// Last row of the tile
    pub max_row: usize,

    /// First column of the tile
    pub min_col: usize,

    /// Last column of the tile
    pub max_col: usize,
}
//
impl Tile {
    /// Rows covered by the tile
    pub fn rows(&self) -> RangeInclusive<usize> {
        self.min_row..=self.max_row
    }

    /// Live cells of a row of the tile
    fn live_cols(&self, row: usize) -> RangeInclusive<usize> {
        self.min_col.max(row + 1)..=self.max_col
    }

    /// Number of live cells
    pub fn live_cells(&self) -> usize {
        self.rows()
            .map(|row| {
                let cols = self.live_cols(row);
                (cols.end() + 1).saturating_sub(*cols.start())
            })
            .sum()
    }

    /// Live cells as `(row, diagonal offset)` pairs, in evaluation order
    ///
    /// Rows are visited from bottom to top, and columns from left to right
    /// within each row. Every dependency of a cell that lies inside of the
    /// tile is visited before the cell itself: cells to its left come earlier
    /// in the same row, and cells below it come from rows visited earlier.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + Clone + '_ {
        self.rows()
            .rev()
            .flat_map(move |row| self.live_cols(row).map(move |col| (row, col - row)))
    }
}

/// Compute all live cells of a tile
///
/// `sink` receives the newly computed values in evaluation order (see
/// [`Tile::cells()`]), which is convenient when results need to be shipped
/// elsewhere.
///
/// All cells of earlier tile-diagonals must have been computed beforehand.
#[inline]
pub fn evaluate_tile(cells: &mut impl Cells, tile: &Tile, mut sink: impl FnMut(Precision)) {
    for (row, offset) in tile.cells() {
        sink(recurrence::update_cell(cells, row, offset));
    }
}
