//! Square matrix on which the wavefront computation operates

use crate::Precision;
use ndarray::{Array2, ArrayView2};
use std::{
    fmt,
    ops::{Index, IndexMut},
};

/// Dense N×N matrix of computation results, stored in row-major order
///
/// Only the upper triangle (column >= row) is meaningful. The main diagonal
/// holds the seed values, everything above it is produced by the wavefront
/// computation, and everything below it stays at zero.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix(Array2<Precision>);
//
impl Matrix {
    /// Set up a matrix with a seeded main diagonal
    ///
    /// Cell `(i, i)` is initialized to `(i + 1) / size`, all other cells are
    /// zero, which is the initial state expected by every compute backend.
    pub fn new(size: usize) -> Self {
        let mut result = Self::zeros(size);
        for i in 0..size {
            result.0[[i, i]] = (i as Precision + 1.0) / size as Precision;
        }
        result
    }

    /// Set up an all-zeros matrix
    ///
    /// This is mostly useful as a target buffer for matrices that are
    /// reassembled from other data sources.
    pub fn zeros(size: usize) -> Self {
        Self(Array2::zeros([size, size]))
    }

    /// Wrap a pre-existing square array
    ///
    /// Returns `None` if the array is not square.
    pub fn from_array(array: Array2<Precision>) -> Option<Self> {
        (array.nrows() == array.ncols()).then(|| {
            // Make sure the row-major slice accessors are usable
            if array.is_standard_layout() {
                Self(array)
            } else {
                Self(array.as_standard_layout().into_owned())
            }
        })
    }

    /// Number of rows (and columns) of the matrix
    pub fn size(&self) -> usize {
        self.0.nrows()
    }

    /// View the matrix as a 2D array
    pub fn view(&self) -> ArrayView2<'_, Precision> {
        self.0.view()
    }

    /// Access the matrix as a row-major slice
    pub fn as_slice(&self) -> &[Precision] {
        self.0
            .as_slice()
            .expect("Matrix storage is always in standard layout")
    }

    /// Access the matrix as a mutable row-major slice
    pub fn as_slice_mut(&mut self) -> &mut [Precision] {
        self.0
            .as_slice_mut()
            .expect("Matrix storage is always in standard layout")
    }

    /// Fold the matrix into a scalar that can be compared across runs
    ///
    /// Each cell is truncated to an integer, cells of a row are combined with
    /// a bitwise XOR, and the per-row results are summed up. This is a cheap
    /// way to check that two runs produced the same result, but it is not
    /// sensitive to small floating-point deviations: compare matrices directly
    /// when bit-for-bit equality matters.
    pub fn checksum(&self) -> u64 {
        self.0
            .rows()
            .into_iter()
            .map(|row| row.iter().fold(0u64, |acc, &cell| acc ^ cell as u64))
            .fold(0u64, u64::wrapping_add)
    }

    /// Locate the first cell, in row-major order, where two matrices differ
    ///
    /// Matrices of different sizes are reported as differing at `[0, 0]`.
    pub fn first_difference(&self, other: &Self) -> Option<[usize; 2]> {
        if self.size() != other.size() {
            return Some([0, 0]);
        }
        self.0
            .indexed_iter()
            .zip(other.0.iter())
            .find(|((_, left), right)| left.to_bits() != right.to_bits())
            .map(|(((row, col), _), _)| [row, col])
    }
}
//
impl Index<[usize; 2]> for Matrix {
    type Output = Precision;

    #[inline]
    fn index(&self, index: [usize; 2]) -> &Precision {
        &self.0[index]
    }
}
//
impl IndexMut<[usize; 2]> for Matrix {
    #[inline]
    fn index_mut(&mut self, index: [usize; 2]) -> &mut Precision {
        &mut self.0[index]
    }
}
//
impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.0.rows() {
            for cell in row {
                write!(f, "{cell:.4}  ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
