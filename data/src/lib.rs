//! Data format used by the upper-triangular wavefront computation

#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod io;
pub mod matrix;

pub use matrix::Matrix;

/// Computation precision
pub type Precision = f64;
