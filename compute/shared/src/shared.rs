//! Matrix storage that multiple threads can write concurrently
//!
//! Within a tile-diagonal, the tiles assigned to different workers cover
//! disjoint sets of cells, and they only read cells from earlier
//! tile-diagonals or from themselves. So as long as workers synchronize
//! between tile-diagonals, they can all operate on one matrix without any
//! locking. Rust cannot check this partitioning statically, which is why
//! access goes through the `unsafe` [`SharedMatrix::worker()`] entry point.

use crate::recurrence::Cells;
use data::{Matrix, Precision};
use std::marker::PhantomData;

/// Matrix that is exclusively borrowed for the duration of a parallel run,
/// and can be written by several workers under a partitioning contract
#[derive(Debug)]
pub struct SharedMatrix<'matrix> {
    /// Start of the row-major cell storage
    cells: *mut Precision,

    /// Number of rows and columns
    size: usize,

    /// Keeps the matrix borrowed as long as this exists
    _borrow: PhantomData<&'matrix mut Matrix>,
}
//
// SAFETY: Cell accesses only happen via WorkerView, whose creation requires
//         callers to uphold the partitioning contract that rules out data races
unsafe impl Send for SharedMatrix<'_> {}
unsafe impl Sync for SharedMatrix<'_> {}
//
impl<'matrix> SharedMatrix<'matrix> {
    /// Prepare a matrix for shared access
    pub fn new(matrix: &'matrix mut Matrix) -> Self {
        let size = matrix.size();
        Self {
            cells: matrix.as_slice_mut().as_mut_ptr(),
            size,
            _borrow: PhantomData,
        }
    }

    /// Number of rows and columns
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get a handle that a worker can use to read and write cells
    ///
    /// # Safety
    ///
    /// Between two synchronization points that establish a happens-before
    /// relationship across all workers (e.g. a `std::sync::Barrier`):
    ///
    /// - A cell that is written through one view must not be read or written
    ///   through any other view.
    /// - A cell that is read through a view must either have been written
    ///   through that same view, or have been written before the last
    ///   synchronization point, or not be written by anyone.
    ///
    /// The wavefront engines uphold this by having each tile of a
    /// tile-diagonal evaluated by exactly one worker, and synchronizing all
    /// workers between consecutive tile-diagonals.
    pub unsafe fn worker(&self) -> WorkerView<'_> {
        WorkerView {
            cells: self.cells,
            size: self.size,
            _shared: PhantomData,
        }
    }
}

/// Per-worker access to a [`SharedMatrix`]
#[derive(Debug)]
pub struct WorkerView<'shared> {
    /// Start of the row-major cell storage
    cells: *mut Precision,

    /// Number of rows and columns
    size: usize,

    /// Keeps the shared matrix alive as long as this exists
    _shared: PhantomData<&'shared SharedMatrix<'shared>>,
}
//
impl WorkerView<'_> {
    /// Compute the linear index of a cell, checking bounds
    #[inline]
    fn linear_index(&self, [row, col]: [usize; 2]) -> usize {
        assert!(row < self.size && col < self.size, "cell is outside of the matrix");
        row * self.size + col
    }
}
//
impl Cells for WorkerView<'_> {
    #[inline]
    fn size(&self) -> usize {
        self.size
    }

    #[inline]
    fn get(&self, pos: [usize; 2]) -> Precision {
        let idx = self.linear_index(pos);
        // SAFETY: In bounds per linear_index, race-free per worker() contract
        unsafe { self.cells.add(idx).read() }
    }

    #[inline]
    fn set(&mut self, pos: [usize; 2], value: Precision) {
        let idx = self.linear_index(pos);
        // SAFETY: In bounds per linear_index, race-free per worker() contract
        unsafe { self.cells.add(idx).write(value) }
    }
}
