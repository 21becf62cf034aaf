//! Typed access to the arrays of an npz archive.
//!
//! Arrays may be stored as f32 or f64 (and index arrays as any 4- or 8-byte
//! integer); whatever is found is cast to the engine scalar. Fortran-order
//! files are handled by `ndarray-npy` itself.

use crate::error::SmplError;
use ndarray as nd;
use ndarray::prelude::*;
use ndarray_npy::NpzReader;
use std::io::{Read, Seek};

/// An opened archive plus its entry names, so a missing field can be told
/// apart from one stored at an unreadable width.
pub struct NpzArchive<R: Read + Seek> {
    npz: NpzReader<R>,
    names: Vec<String>,
}

impl<R: Read + Seek> NpzArchive<R> {
    pub fn new(reader: R) -> Result<Self, SmplError> {
        let mut npz = NpzReader::new(reader)?;
        let names = npz.names()?;
        Ok(Self { npz, names })
    }

    pub fn has(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| n == name || n.strip_suffix(".npy") == Some(name))
    }

    /// Float array of any rank; f64 entries are cast down to f32.
    pub fn float_dyn(&mut self, name: &str) -> Result<nd::ArrayD<f32>, SmplError> {
        if !self.has(name) {
            return Err(SmplError::MissingField { name: name.into() });
        }
        if let Ok(arr) = self.npz.by_name::<nd::OwnedRepr<f32>, nd::IxDyn>(name) {
            return Ok(arr);
        }
        if let Ok(arr) = self.npz.by_name::<nd::OwnedRepr<f64>, nd::IxDyn>(name) {
            return Ok(arr.mapv(|x| x as f32));
        }
        Err(SmplError::UnsupportedScalarWidth { name: name.into() })
    }

    pub fn float1(&mut self, name: &str, expected: usize) -> Result<Array1<f32>, SmplError> {
        let arr = self.float_dyn(name)?;
        expect_shape(name, arr.shape(), &[expected])?;
        to_dim(name, arr)
    }

    pub fn float2(
        &mut self,
        name: &str,
        expected: (usize, usize),
    ) -> Result<Array2<f32>, SmplError> {
        let arr = self.float_dyn(name)?;
        expect_shape(name, arr.shape(), &[expected.0, expected.1])?;
        to_dim(name, arr)
    }

    pub fn float3(
        &mut self,
        name: &str,
        expected: (usize, usize, usize),
    ) -> Result<Array3<f32>, SmplError> {
        let arr = self.float_dyn(name)?;
        expect_shape(name, arr.shape(), &[expected.0, expected.1, expected.2])?;
        to_dim(name, arr)
    }

    /// A 2d float array whose leading dimension is free, e.g. per-frame data.
    pub fn float2_rows(&mut self, name: &str, ncols: usize) -> Result<Array2<f32>, SmplError> {
        let arr = self.float_dyn(name)?;
        if arr.ndim() != 2 || arr.shape()[1] != ncols {
            return Err(SmplError::ShapeMismatch {
                name: name.into(),
                expected: vec![0, ncols],
                got: arr.shape().to_vec(),
            });
        }
        to_dim(name, arr)
    }

    /// A scalar stored as a zero- or one-element array.
    pub fn float_scalar(&mut self, name: &str) -> Result<f32, SmplError> {
        let arr = self.float_dyn(name)?;
        arr.iter().next().copied().ok_or(SmplError::ShapeMismatch {
            name: name.into(),
            expected: vec![1],
            got: arr.shape().to_vec(),
        })
    }

    /// Index array; u32/u64/i32/i64 entries are all cast to u32.
    pub fn index2(
        &mut self,
        name: &str,
        expected: (usize, usize),
    ) -> Result<Array2<u32>, SmplError> {
        if !self.has(name) {
            return Err(SmplError::MissingField { name: name.into() });
        }
        let arr: nd::ArrayD<u32> =
            if let Ok(arr) = self.npz.by_name::<nd::OwnedRepr<u32>, nd::IxDyn>(name) {
                arr
            } else if let Ok(arr) = self.npz.by_name::<nd::OwnedRepr<u64>, nd::IxDyn>(name) {
                arr.mapv(|x| x as u32)
            } else if let Ok(arr) = self.npz.by_name::<nd::OwnedRepr<i32>, nd::IxDyn>(name) {
                arr.mapv(|x| x as u32)
            } else if let Ok(arr) = self.npz.by_name::<nd::OwnedRepr<i64>, nd::IxDyn>(name) {
                arr.mapv(|x| x as u32)
            } else {
                return Err(SmplError::UnsupportedScalarWidth { name: name.into() });
            };
        expect_shape(name, arr.shape(), &[expected.0, expected.1])?;
        to_dim(name, arr)
    }
}

fn expect_shape(name: &str, got: &[usize], expected: &[usize]) -> Result<(), SmplError> {
    if got != expected {
        return Err(SmplError::ShapeMismatch {
            name: name.into(),
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}

fn to_dim<A, D: nd::Dimension>(name: &str, arr: nd::ArrayD<A>) -> Result<nd::Array<A, D>, SmplError> {
    let shape = arr.shape().to_vec();
    arr.into_dimensionality::<D>()
        .map_err(|_| SmplError::ShapeMismatch {
            name: name.into(),
            expected: Vec::new(),
            got: shape,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::NpzWriter;
    use std::fs::File;

    fn sample_npz(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("sample.npz");
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("floats32", &array![[1.0f32, 2.0], [3.0, 4.0]])
            .unwrap();
        npz.add_array("floats64", &array![[1.5f64, 2.5], [3.5, 4.5]])
            .unwrap();
        npz.add_array("indices", &array![[0u64, 1, 2], [2, 1, 0]])
            .unwrap();
        npz.add_array("rate", &ndarray::arr0(120.0f64)).unwrap();
        npz.finish().unwrap();
        path
    }

    #[test]
    fn reads_both_float_widths() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_npz(dir.path());
        let mut npz = NpzArchive::new(File::open(path).unwrap()).unwrap();
        let a = npz.float2("floats32", (2, 2)).unwrap();
        assert_eq!(a[[1, 0]], 3.0);
        let b = npz.float2("floats64", (2, 2)).unwrap();
        assert_eq!(b[[0, 1]], 2.5);
    }

    #[test]
    fn casts_wide_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_npz(dir.path());
        let mut npz = NpzArchive::new(File::open(path).unwrap()).unwrap();
        let f = npz.index2("indices", (2, 3)).unwrap();
        assert_eq!(f[[0, 2]], 2);
    }

    #[test]
    fn reads_scalars() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_npz(dir.path());
        let mut npz = NpzArchive::new(File::open(path).unwrap()).unwrap();
        assert_eq!(npz.float_scalar("rate").unwrap(), 120.0);
    }

    #[test]
    fn missing_field_is_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_npz(dir.path());
        let mut npz = NpzArchive::new(File::open(path).unwrap()).unwrap();
        match npz.float2("absent", (2, 2)) {
            Err(SmplError::MissingField { name }) => assert_eq!(name, "absent"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_npz(dir.path());
        let mut npz = NpzArchive::new(File::open(path).unwrap()).unwrap();
        match npz.float2("floats32", (4, 4)) {
            Err(SmplError::ShapeMismatch { got, .. }) => assert_eq!(got, vec![2, 2]),
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }
}
