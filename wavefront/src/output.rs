//! Saving results and checking them against earlier ones

use data::Matrix;
use eyre::{bail, Result, WrapErr};
use log::info;
use std::path::Path;

/// Truth that a file should be accessed in HDF5 format
#[cfg(feature = "hdf5")]
fn is_hdf5(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "h5")
}

/// Save a matrix to a file
pub fn save(matrix: &Matrix, path: &Path) -> Result<()> {
    #[cfg(feature = "hdf5")]
    if is_hdf5(path) {
        data::hdf5::write(hdf5_config(path), matrix)
            .wrap_err_with(|| format!("failed to write HDF5 file {}", path.display()))?;
        info!("Saved result to HDF5 file {}", path.display());
        return Ok(());
    }
    matrix
        .save(path)
        .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    info!("Saved result to {}", path.display());
    Ok(())
}

/// Load a matrix from a file
pub fn load(path: &Path) -> Result<Matrix> {
    #[cfg(feature = "hdf5")]
    if is_hdf5(path) {
        return data::hdf5::read(hdf5_config(path))
            .wrap_err_with(|| format!("failed to read HDF5 file {}", path.display()));
    }
    Matrix::load(path).wrap_err_with(|| format!("failed to read {}", path.display()))
}

/// Check that a matrix is identical to one that was saved earlier
pub fn compare(matrix: &Matrix, path: &Path) -> Result<()> {
    let reference = load(path)?;
    if reference.size() != matrix.size() {
        bail!(
            "result is a {0}x{0} matrix, but {1} holds a {2}x{2} matrix",
            matrix.size(),
            path.display(),
            reference.size()
        );
    }
    if let Some(pos) = matrix.first_difference(&reference) {
        bail!(
            "result differs from {} at {pos:?}: got {}, expected {}",
            path.display(),
            matrix[pos],
            reference[pos]
        );
    }
    info!("Result matches {}", path.display());
    Ok(())
}

#[cfg(feature = "hdf5")]
fn hdf5_config(path: &Path) -> data::hdf5::Config<'static, &Path> {
    data::hdf5::Config {
        file_name: path,
        dataset_name: None,
    }
}
