//! Moving matrices to and from HDF5 files

use crate::{Matrix, Precision};
use hdf5::File;
use std::path::Path;

pub use hdf5::{Error, Result};

/// Common configuration for reading and writing to HDF5 files
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Config<'dsname, FileName: AsRef<Path>> {
    /// Name of the HDF5 file to be accessed
    pub file_name: FileName,

    /// Name of the dataset within the file
    pub dataset_name: Option<&'dsname str>,
}
//
impl<'dsname, FileName: AsRef<Path>> Config<'dsname, FileName> {
    fn dataset_name(&self) -> &'dsname str {
        self.dataset_name.unwrap_or("matrix")
    }
}

/// Create or truncate a file and store a matrix into it
pub fn write(config: Config<'_, impl AsRef<Path>>, matrix: &Matrix) -> Result<()> {
    let dataset_name = config.dataset_name();
    let file = File::create(config.file_name)?;
    let size = matrix.size();
    let dataset = file
        .new_dataset::<Precision>()
        .shape([size, size])
        .create(dataset_name)?;
    dataset.write(matrix.view())?;

    // This would happen on Drop, but doing it manually lets us catch errors
    file.close()
}

/// Read a matrix back from an HDF5 file
pub fn read(config: Config<'_, impl AsRef<Path>>) -> Result<Matrix> {
    let dataset_name = config.dataset_name();
    let file = File::open(config.file_name)?;
    let array = file.dataset(dataset_name)?.read_2d::<Precision>()?;
    Matrix::from_array(array).ok_or_else(|| Error::from("Dataset should be a square matrix"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let path = std::env::temp_dir().join(format!("wavefront-hdf5-{}.h5", std::process::id()));
        let mut matrix = Matrix::new(7);
        matrix[[1, 5]] = 0.125;
        write(
            Config {
                file_name: &path,
                dataset_name: Some("result"),
            },
            &matrix,
        )
        .unwrap();
        let loaded = read(Config {
            file_name: &path,
            dataset_name: Some("result"),
        })
        .unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, matrix);
    }
}
