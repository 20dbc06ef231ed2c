//! Recurrence that defines the value of each matrix cell
//!
//! Cell `(i, i + k)`, at diagonal offset `k >= 1`, is the cube root of the dot
//! product of the `k` cells on its left, `M[i, i..i + k]`, with the `k` cells
//! below it taken in reverse order, `M[i + k..i, i + k]`:
//!
//! ```text
//! M[i, i+k] = cbrt(sum(h = 0..k) M[i, i+h] * M[i+k-h, i+k])
//! ```
//!
//! All of these inputs sit at smaller diagonal offsets than the output, which
//! is what makes a diagonal-by-diagonal (wavefront) evaluation order work.

use data::{Matrix, Precision};

/// Storage that the recurrence can read and write
///
/// Coordinates are `[row, column]`, and must be smaller than `size()`.
pub trait Cells {
    /// Number of rows and columns
    fn size(&self) -> usize;

    /// Read a cell
    fn get(&self, pos: [usize; 2]) -> Precision;

    /// Write a cell
    fn set(&mut self, pos: [usize; 2], value: Precision);
}
//
impl Cells for Matrix {
    #[inline]
    fn size(&self) -> usize {
        Matrix::size(self)
    }

    #[inline]
    fn get(&self, pos: [usize; 2]) -> Precision {
        self[pos]
    }

    #[inline]
    fn set(&mut self, pos: [usize; 2], value: Precision) {
        self[pos] = value;
    }
}

/// Compute the value of cell `(row, row + offset)`
///
/// Every cell at a smaller diagonal offset on the same row, and every cell at
/// a smaller diagonal offset on the same column, must already be computed.
/// The summation order is fixed, so results are reproducible bit for bit.
#[inline]
pub fn compute_cell(cells: &impl Cells, row: usize, offset: usize) -> Precision {
    debug_assert!(offset >= 1, "main diagonal cells are seeds, not outputs");
    debug_assert!(row + offset < cells.size(), "cell is outside of the matrix");
    let col = row + offset;
    (0..offset)
        .fold(0.0, |acc, h| {
            acc + cells.get([row, row + h]) * cells.get([col - h, col])
        })
        .cbrt()
}

/// Compute cell `(row, row + offset)`, store it, and return its value
///
/// Has the same preconditions as [`compute_cell()`].
#[inline]
pub fn update_cell(cells: &mut impl Cells, row: usize, offset: usize) -> Precision {
    let value = compute_cell(cells, row, offset);
    cells.set([row, row + offset], value);
    value
}
