use crate::error::CsrError;

/// Row-major square matrix used as the one-off dense input to
/// [`crate::CsrTopology::from_dense`].
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix<T> {
    size: usize,
    data: Vec<T>,
}

impl<T: Copy> DenseMatrix<T> {
    pub fn filled(size: usize, value: T) -> Self {
        Self { size, data: vec![value; size * size] }
    }

    /// Build from nested rows; every row must have `rows.len()` entries.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, CsrError> {
        let size = rows.len();
        let mut data = Vec::with_capacity(size * size);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != size {
                return Err(CsrError::NotSquare { row, expected: size, got: values.len() });
            }
            data.extend(values);
        }
        Ok(Self { size, data })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[i * self.size + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        self.data[i * self.size + j] = value;
    }

    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.size..(i + 1) * self.size]
    }

    /// Set `(i, j)` and `(j, i)`.
    pub fn set_symmetric(&mut self, i: usize, j: usize, value: T) {
        self.set(i, j, value);
        self.set(j, i, value);
    }
}

impl<T: Copy + PartialEq> DenseMatrix<T> {
    /// First off-diagonal pair `(i, j)` with `m[i][j] != m[j][i]`.
    pub fn first_asymmetry(&self) -> Option<(usize, usize)> {
        (0..self.size)
            .flat_map(|i| (i + 1..self.size).map(move |j| (i, j)))
            .find(|&(i, j)| self.get(i, j) != self.get(j, i))
    }
}
