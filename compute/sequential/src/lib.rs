//! Sequential implementation of the wavefront computation
//!
//! This version computes one cell at a time, one diagonal after another, on a
//! single thread. It is slow, but simple enough to serve as a reference that
//! other backends are checked against.

use compute::{
    recurrence::{self, Cells},
    ConfigError, NoArgs, Parameters, Wavefront, WavefrontBase, WavefrontCreate,
};
use data::Matrix;
use log::debug;

/// Sequential wavefront computation
#[derive(Debug)]
pub struct Engine {
    /// Computation parameters (only kept for reporting purposes)
    params: Parameters,
}
//
impl WavefrontBase for Engine {
    type CliArgs = NoArgs;

    type Error = ConfigError;
}
//
impl WavefrontCreate for Engine {
    fn new(params: Parameters, _args: NoArgs) -> Result<Self, ConfigError> {
        Ok(Self { params })
    }
}
//
impl Wavefront for Engine {
    fn parameters(&self) -> &Parameters {
        &self.params
    }

    fn compute(&self, matrix: &mut Matrix) -> Result<(), ConfigError> {
        debug!("Running sequential wavefront on a {0}x{0} matrix", matrix.size());
        wavefront(matrix);
        Ok(())
    }
}

/// Compute every cell above the main diagonal, one diagonal at a time
pub fn wavefront(cells: &mut impl Cells) {
    let size = cells.size();
    for offset in 1..size {
        for row in 0..size - offset {
            recurrence::update_cell(cells, row, offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_matrix() {
        let mut matrix = Matrix::new(4);
        Engine::new(Parameters::default(), NoArgs {})
            .unwrap()
            .compute(&mut matrix)
            .unwrap();

        assert_eq!(matrix[[0, 1]], 0.5);
        let m = |row, col| matrix[[row, col]];
        assert_eq!(m(1, 2), (0.5f64 * 0.75).cbrt());
        assert_eq!(m(0, 3), (m(0, 0) * m(3, 3) + m(0, 1) * m(2, 3) + m(0, 2) * m(1, 3)).cbrt());

        // Lower triangle is untouched
        for row in 1..4 {
            for col in 0..row {
                assert_eq!(m(row, col), 0.0);
            }
        }
    }

    #[test]
    fn degenerate_sizes() {
        let mut empty = Matrix::new(0);
        wavefront(&mut empty);
        assert_eq!(empty.size(), 0);

        let mut single = Matrix::new(1);
        wavefront(&mut single);
        assert_eq!(single, Matrix::new(1));
    }

    #[test]
    fn reruns_are_identical() {
        let mut first = Matrix::new(50);
        let mut second = Matrix::new(50);
        wavefront(&mut first);
        wavefront(&mut second);
        assert_eq!(first.checksum(), second.checksum());
        assert_eq!(first, second);
    }
}
