//! Dense embedding types.
//!
//! An [`IndexMatrix`] keeps every row of a corpus in one contiguous
//! row-major buffer so scoring walks memory linearly.

/// A single embedding as produced by the model.
pub type EmbeddingVector = Vec<f32>;

/// Errors raised when a matrix cannot be assembled from its parts.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MatrixShapeError {
    #[error("Buffer of {len} values does not match {rows} rows x {dims} dimensions")]
    LengthMismatch { rows: usize, dims: usize, len: usize },

    #[error("Row {row} has {got} dimensions, expected {expected}")]
    RaggedRow { row: usize, expected: usize, got: usize },

    #[error("Matrix with {rows} rows cannot have zero dimensions")]
    ZeroDimensions { rows: usize },
}

/// Dense N x D matrix of `f32`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatrix {
    data: Vec<f32>,
    rows: usize,
    dims: usize,
}

impl IndexMatrix {
    /// Wrap a flat row-major buffer.
    pub fn from_flat(data: Vec<f32>, rows: usize, dims: usize) -> Result<Self, MatrixShapeError> {
        if dims == 0 && rows > 0 {
            return Err(MatrixShapeError::ZeroDimensions { rows });
        }

        let expected = rows.checked_mul(dims);
        if expected != Some(data.len()) {
            return Err(MatrixShapeError::LengthMismatch {
                rows,
                dims,
                len: data.len(),
            });
        }

        Ok(Self { data, rows, dims })
    }

    /// Stack individual embeddings into a matrix.
    ///
    /// Every row must have the length of the first one.
    pub fn from_rows(rows: Vec<EmbeddingVector>) -> Result<Self, MatrixShapeError> {
        let dims = rows.first().map(|r| r.len()).unwrap_or(0);
        let count = rows.len();

        let mut data = Vec::with_capacity(count * dims);
        for (row, embedding) in rows.into_iter().enumerate() {
            if embedding.len() != dims {
                return Err(MatrixShapeError::RaggedRow {
                    row,
                    expected: dims,
                    got: embedding.len(),
                });
            }
            data.extend(embedding);
        }

        Self::from_flat(data, count, dims)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Borrow row `i`. Panics if out of bounds, like slice indexing.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }

    /// Iterate over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on a zero chunk size; an empty matrix has no rows anyway
        self.data.chunks_exact(self.dims.max(1))
    }

    /// The underlying row-major buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Dot product over the common prefix of two vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let matrix = IndexMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]])
            .unwrap();

        assert_eq!(matrix.rows(), 3);
        assert_eq!(matrix.dims(), 2);
        assert_eq!(matrix.row(1), &[3.0, 4.0]);
        assert_eq!(matrix.iter_rows().count(), 3);
    }

    #[test]
    fn test_from_rows_ragged() {
        let result = IndexMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]);
        assert_eq!(
            result,
            Err(MatrixShapeError::RaggedRow {
                row: 1,
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn test_from_flat_length_mismatch() {
        let result = IndexMatrix::from_flat(vec![1.0; 5], 2, 3);
        assert!(matches!(result, Err(MatrixShapeError::LengthMismatch { .. })));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let result = IndexMatrix::from_flat(vec![], 4, 0);
        assert_eq!(result, Err(MatrixShapeError::ZeroDimensions { rows: 4 }));
    }

    #[test]
    fn test_empty_matrix() {
        let matrix = IndexMatrix::from_rows(vec![]).unwrap();
        assert!(matrix.is_empty());
        assert_eq!(matrix.iter_rows().count(), 0);
    }

    #[test]
    fn test_norm_and_dot() {
        assert!((l2_norm(&[3.0, 4.0]) - 5.0).abs() < f32::EPSILON);
        assert!((dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]) - 32.0).abs() < f32::EPSILON);
    }
}
