use ndarray as nd;

/// Compressed sparse row matrix over f32.
///
/// Built once from a dense array at model-load time; exact zeros are pruned.
/// Row-side storage serves products of the form `(n, m) * (m, k)` where the
/// left factor is the sparse one.
#[derive(Clone, Debug)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f32>,
}

impl CsrMatrix {
    pub fn from_dense(dense: &nd::ArrayView2<f32>) -> Self {
        let (nrows, ncols) = dense.dim();
        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for row in dense.outer_iter() {
            for (c, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    col_indices.push(c);
                    values.push(value);
                }
            }
            row_ptr.push(values.len());
        }
        Self {
            nrows,
            ncols,
            row_ptr,
            col_indices,
            values,
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Nonzero entries of row `r` as `(column, value)` pairs.
    pub fn row(&self, r: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let range = self.row_ptr[r]..self.row_ptr[r + 1];
        self.col_indices[range.clone()]
            .iter()
            .zip(&self.values[range])
            .map(|(&c, &v)| (c, v))
    }

    /// All nonzero entries as `(row, column, value)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        (0..self.nrows).flat_map(move |r| self.row(r).map(move |(c, v)| (r, c, v)))
    }

    /// `out = self * rhs` for a dense right factor of shape `(ncols, k)`.
    ///
    /// # Panics
    /// Panics if the operand shapes do not line up.
    pub fn mul_into(&self, rhs: &nd::ArrayView2<f32>, out: &mut nd::ArrayViewMut2<f32>) {
        assert_eq!(rhs.nrows(), self.ncols, "sparse * dense shape mismatch");
        assert_eq!(out.dim(), (self.nrows, rhs.ncols()), "output shape mismatch");
        let k = rhs.ncols();
        out.fill(0.0);
        for r in 0..self.nrows {
            for (c, value) in self.row(r) {
                for col in 0..k {
                    out[[r, col]] += value * rhs[[c, col]];
                }
            }
        }
    }
}

/// Compressed sparse column matrix over f32.
///
/// Column-side storage serves products where the dense right factor is
/// indexed by this matrix's columns, `(n, m) * (m, k)`, accumulating whole
/// output rows per nonzero.
#[derive(Clone, Debug)]
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    col_ptr: Vec<usize>,
    row_indices: Vec<usize>,
    values: Vec<f32>,
}

impl CscMatrix {
    pub fn from_dense(dense: &nd::ArrayView2<f32>) -> Self {
        let (nrows, ncols) = dense.dim();
        let mut col_ptr = Vec::with_capacity(ncols + 1);
        let mut row_indices = Vec::new();
        let mut values = Vec::new();
        col_ptr.push(0);
        for c in 0..ncols {
            for r in 0..nrows {
                let value = dense[[r, c]];
                if value != 0.0 {
                    row_indices.push(r);
                    values.push(value);
                }
            }
            col_ptr.push(values.len());
        }
        Self {
            nrows,
            ncols,
            col_ptr,
            row_indices,
            values,
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Nonzero entries of column `c` as `(row, value)` pairs.
    pub fn col(&self, c: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let range = self.col_ptr[c]..self.col_ptr[c + 1];
        self.row_indices[range.clone()]
            .iter()
            .zip(&self.values[range])
            .map(|(&r, &v)| (r, v))
    }

    /// All nonzero entries as `(row, column, value)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        (0..self.ncols).flat_map(move |c| self.col(c).map(move |(r, v)| (r, c, v)))
    }

    /// Per-row sums of the nonzero entries.
    pub fn row_sums(&self) -> Vec<f32> {
        let mut sums = vec![0.0f32; self.nrows];
        for (r, _, v) in self.iter() {
            sums[r] += v;
        }
        sums
    }

    /// `out = self * rhs` for a dense right factor of shape `(ncols, k)`.
    ///
    /// # Panics
    /// Panics if the operand shapes do not line up.
    pub fn mul_into(&self, rhs: &nd::ArrayView2<f32>, out: &mut nd::ArrayViewMut2<f32>) {
        assert_eq!(rhs.nrows(), self.ncols, "sparse * dense shape mismatch");
        assert_eq!(out.dim(), (self.nrows, rhs.ncols()), "output shape mismatch");
        let k = rhs.ncols();
        out.fill(0.0);
        for c in 0..self.ncols {
            for (r, value) in self.col(c) {
                for col in 0..k {
                    out[[r, col]] += value * rhs[[c, col]];
                }
            }
        }
    }
}
