//! Moving matrices to and from raw binary files
//!
//! The file format is a little-endian `u64` matrix size `N`, followed by the
//! `N * N` cells of the matrix as little-endian `f64`, in row-major order.

use crate::{Matrix, Precision};
use ndarray::Array2;
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};
use thiserror::Error;

/// Number of cells that are allocated before any of them has been read
const MAX_PREALLOCATED_CELLS: usize = 1 << 20;

/// Result type of matrix I/O operations
pub type Result<T> = std::result::Result<T, Error>;

impl Matrix {
    /// Serialize the matrix into a byte stream
    pub fn write_to(&self, mut output: impl Write) -> Result<()> {
        output.write_all(&(self.size() as u64).to_le_bytes())?;
        for cell in self.as_slice() {
            output.write_all(&cell.to_le_bytes())?;
        }
        output.flush()?;
        Ok(())
    }

    /// Deserialize a matrix from a byte stream
    ///
    /// Storage grows as cells are read, so a corrupt size header results in
    /// an error rather than a huge up-front allocation.
    pub fn read_from(mut input: impl Read) -> Result<Self> {
        let mut size_bytes = [0; 8];
        input.read_exact(&mut size_bytes)?;
        let size = u64::from_le_bytes(size_bytes);
        let (size, num_cells) = usize::try_from(size)
            .ok()
            .and_then(|size| Some((size, size.checked_mul(size)?)))
            .filter(|(_, num_cells)| {
                num_cells
                    .checked_mul(std::mem::size_of::<Precision>())
                    .is_some_and(|num_bytes| num_bytes <= isize::MAX as usize)
            })
            .ok_or(Error::TooLarge(size))?;

        let mut cells = Vec::with_capacity(num_cells.min(MAX_PREALLOCATED_CELLS));
        let mut cell_bytes = [0; std::mem::size_of::<Precision>()];
        for _ in 0..num_cells {
            input.read_exact(&mut cell_bytes)?;
            cells.push(Precision::from_le_bytes(cell_bytes));
        }
        let array = Array2::from_shape_vec([size, size], cells)
            .expect("Cell count was computed from the matrix size");
        Ok(Matrix::from_array(array).expect("Array was built square"))
    }

    /// Create or truncate a file and save the matrix into it
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_to(BufWriter::new(File::create(path)?))
    }

    /// Load a matrix from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::read_from(BufReader::new(File::open(path)?))
    }
}

/// Things that can go wrong when moving matrices to and from files
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O error, including truncated input
    #[error("matrix I/O failed")]
    Io(#[from] io::Error),

    /// Matrix size that cannot be represented in memory
    #[error("matrix size {0} is too large for this platform")]
    TooLarge(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip() -> Result<()> {
        let mut matrix = Matrix::new(3);
        matrix[[0, 2]] = 0.123;
        let mut bytes = Vec::new();
        matrix.write_to(&mut bytes)?;
        assert_eq!(bytes.len(), 8 + 9 * 8);
        assert_eq!(&bytes[..8], &3u64.to_le_bytes());
        assert_eq!(Matrix::read_from(&bytes[..])?, matrix);
        Ok(())
    }

    #[test]
    fn truncated_input() {
        let mut bytes = Vec::new();
        Matrix::new(2).write_to(&mut bytes).unwrap();
        bytes.pop();
        assert!(matches!(
            Matrix::read_from(&bytes[..]),
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof
        ));
    }

    #[test]
    fn absurd_size() {
        let bytes = u64::MAX.to_le_bytes();
        assert!(matches!(
            Matrix::read_from(&bytes[..]),
            Err(Error::TooLarge(u64::MAX))
        ));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn size_header_without_data() {
        let bytes = (1u64 << 31).to_le_bytes();
        assert!(matches!(
            Matrix::read_from(&bytes[..]),
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof
        ));
    }

    #[test]
    fn unaddressable_size() {
        let size = 1u64 << 32;
        assert!(matches!(
            Matrix::read_from(&size.to_le_bytes()[..]),
            Err(Error::TooLarge(s)) if s == size
        ));
    }

    #[test]
    fn file_round_trip() -> Result<()> {
        let path = std::env::temp_dir().join(format!("wavefront-io-{}.bin", std::process::id()));
        let matrix = Matrix::new(5);
        matrix.save(&path)?;
        let loaded = Matrix::load(&path);
        std::fs::remove_file(&path)?;
        assert_eq!(loaded?, matrix);
        Ok(())
    }
}
