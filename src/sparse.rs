//! Compressed Sparse Row (CSR) matrix.
//!
//! Holds the MNA template and every per-step copy of it. Generic over value
//! type to support both f64 (DC, transient) and Complex64 (AC).

use num_complex::Complex64;
use std::ops::{AddAssign, Mul};

/// Sparse matrix in Compressed Sparse Row format.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T> {
    pub nrows: usize,
    pub ncols: usize,
    /// Non-zero values, stored row by row.
    pub values: Vec<T>,
    /// Column index for each non-zero value, ascending within a row.
    pub col_indices: Vec<usize>,
    /// `row_pointers[i]` is the index into values/col_indices where row i starts.
    /// `row_pointers[nrows]` = total number of stored entries.
    pub row_pointers: Vec<usize>,
}

impl<T: Copy + Default + AddAssign> CsrMatrix<T> {
    /// Create an empty matrix with no stored entries.
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            values: Vec::new(),
            col_indices: Vec::new(),
            row_pointers: vec![0; nrows + 1],
        }
    }

    /// Number of stored entries (explicit zeros included).
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Build CSR matrix from (row, col, value) triplets.
    /// Duplicate entries at the same (row, col) are summed. A triplet with a
    /// zero value still reserves its position in the structure.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, T)]) -> Self {
        if triplets.is_empty() {
            return Self::new(nrows, ncols);
        }

        // Sort indices by (row, col) without requiring T: Ord
        let mut indices: Vec<usize> = (0..triplets.len()).collect();
        indices.sort_by_key(|&i| (triplets[i].0, triplets[i].1));

        let mut values = Vec::with_capacity(triplets.len());
        let mut col_indices = Vec::with_capacity(triplets.len());
        let mut row_pointers = vec![0usize; nrows + 1];

        let first = indices[0];
        let (mut cur_row, mut cur_col, mut cur_val) = triplets[first];

        for &idx in &indices[1..] {
            let (row, col, val) = triplets[idx];
            if row == cur_row && col == cur_col {
                cur_val += val;
            } else {
                values.push(cur_val);
                col_indices.push(cur_col);
                row_pointers[cur_row + 1] += 1;
                cur_row = row;
                cur_col = col;
                cur_val = val;
            }
        }
        values.push(cur_val);
        col_indices.push(cur_col);
        row_pointers[cur_row + 1] += 1;

        for i in 1..=nrows {
            row_pointers[i] += row_pointers[i - 1];
        }

        Self {
            nrows,
            ncols,
            values,
            col_indices,
            row_pointers,
        }
    }

    /// Position of (row, col) in `values`, if the entry is stored.
    pub fn value_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_pointers[row];
        let end = self.row_pointers[row + 1];
        self.col_indices[start..end]
            .binary_search(&col)
            .ok()
            .map(|offset| start + offset)
    }

    /// Stored value at (row, col), or zero when the entry is structurally absent.
    pub fn get(&self, row: usize, col: usize) -> T {
        self.value_index(row, col)
            .map(|idx| self.values[idx])
            .unwrap_or_default()
    }

    /// Add `value` at (row, col), growing the structure if needed.
    pub fn add_at(&mut self, row: usize, col: usize, value: T) {
        if let Some(idx) = self.value_index(row, col) {
            self.values[idx] += value;
            return;
        }
        let start = self.row_pointers[row];
        let end = self.row_pointers[row + 1];
        let offset = self.col_indices[start..end].partition_point(|&c| c < col);
        let pos = start + offset;
        self.col_indices.insert(pos, col);
        self.values.insert(pos, value);
        for ptr in &mut self.row_pointers[row + 1..] {
            *ptr += 1;
        }
    }

    /// Drop row 0 and column 0 (the ground reference) and shift the
    /// remaining indices down by one.
    pub fn shed_ground(&self) -> Self {
        if self.nrows == 0 || self.ncols == 0 {
            return Self::new(0, 0);
        }
        let mut values = Vec::with_capacity(self.values.len());
        let mut col_indices = Vec::with_capacity(self.values.len());
        let mut row_pointers = Vec::with_capacity(self.nrows);
        row_pointers.push(0);
        for row in 1..self.nrows {
            for idx in self.row_pointers[row]..self.row_pointers[row + 1] {
                let col = self.col_indices[idx];
                if col > 0 {
                    values.push(self.values[idx]);
                    col_indices.push(col - 1);
                }
            }
            row_pointers.push(values.len());
        }
        Self {
            nrows: self.nrows - 1,
            ncols: self.ncols - 1,
            values,
            col_indices,
            row_pointers,
        }
    }

    /// Convert to dense matrix (row-major). For testing and small matrices only.
    pub fn to_dense(&self) -> Vec<Vec<T>> {
        let mut dense = vec![vec![T::default(); self.ncols]; self.nrows];
        for row in 0..self.nrows {
            for idx in self.row_pointers[row]..self.row_pointers[row + 1] {
                dense[row][self.col_indices[idx]] = self.values[idx];
            }
        }
        dense
    }
}

impl<T: Copy + Default + AddAssign + Mul<Output = T>> CsrMatrix<T> {
    /// Sparse matrix-vector multiply: y = A * x
    pub fn spmv(&self, x: &[T]) -> Vec<T> {
        assert_eq!(x.len(), self.ncols, "spmv dimension mismatch");
        let mut y = vec![T::default(); self.nrows];
        for (row, out) in y.iter_mut().enumerate() {
            let mut sum = T::default();
            for idx in self.row_pointers[row]..self.row_pointers[row + 1] {
                sum += self.values[idx] * x[self.col_indices[idx]];
            }
            *out = sum;
        }
        y
    }
}

impl CsrMatrix<f64> {
    /// Lift a real matrix into the complex plane with zero imaginary parts,
    /// keeping the sparsity structure.
    pub fn to_complex(&self) -> CsrMatrix<Complex64> {
        CsrMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            values: self
                .values
                .iter()
                .map(|&v| Complex64::new(v, 0.0))
                .collect(),
            col_indices: self.col_indices.clone(),
            row_pointers: self.row_pointers.clone(),
        }
    }
}

/// Remove the ground entry from a full-size vector.
pub fn shed_ground_vec<T: Copy>(v: &[T]) -> Vec<T> {
    v.iter().skip(1).copied().collect()
}

/// Put the ground voltage back in front of a reduced solution vector.
pub fn with_ground<T: Copy + Default>(reduced: &[T]) -> Vec<T> {
    let mut full = Vec::with_capacity(reduced.len() + 1);
    full.push(T::default());
    full.extend_from_slice(reduced);
    full
}

/// Read template index `idx` out of a ground-shed vector. Ground reads as zero.
pub fn template_value<T: Copy + Default>(reduced: &[T], idx: usize) -> T {
    if idx == 0 {
        T::default()
    } else {
        reduced[idx - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_matrix() {
        let m: CsrMatrix<f64> = CsrMatrix::new(3, 3);
        assert_eq!(m.nnz(), 0);
        assert_eq!(m.row_pointers, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_from_triplets_duplicates_summed() {
        let triplets = vec![(0, 0, 1.0), (0, 0, 2.0), (1, 1, 3.0)];
        let m = CsrMatrix::from_triplets(2, 2, &triplets);
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.to_dense(), vec![vec![3.0, 0.0], vec![0.0, 3.0]]);
    }

    #[test]
    fn test_explicit_zero_reserves_position() {
        let m = CsrMatrix::from_triplets(2, 2, &[(0, 1, 0.0), (1, 1, 1.0)]);
        assert_eq!(m.nnz(), 2);
        assert!(m.value_index(0, 1).is_some());
        assert!(m.value_index(1, 0).is_none());
    }

    #[test]
    fn test_add_at_existing_and_missing() {
        let mut m = CsrMatrix::from_triplets(3, 3, &[(0, 0, 1.0), (2, 2, 1.0)]);
        m.add_at(0, 0, 2.0);
        m.add_at(1, 2, 5.0);
        m.add_at(1, 0, -1.0);
        assert_eq!(m.nnz(), 4);
        assert_eq!(
            m.to_dense(),
            vec![
                vec![3.0, 0.0, 0.0],
                vec![-1.0, 0.0, 5.0],
                vec![0.0, 0.0, 1.0]
            ]
        );
        assert_eq!(m.col_indices, vec![0, 0, 2, 2]);
    }

    #[test]
    fn test_shed_ground() {
        // [[9, 9, 9], [9, 1, 2], [9, 3, 4]] -> [[1, 2], [3, 4]]
        let mut t = Vec::new();
        for r in 0..3 {
            t.push((r, 0, 9.0));
            t.push((0, r, 9.0));
        }
        t.extend([(1, 1, 1.0), (1, 2, 2.0), (2, 1, 3.0), (2, 2, 4.0)]);
        let m = CsrMatrix::from_triplets(3, 3, &t);
        let reduced = m.shed_ground();
        assert_eq!(reduced.nrows, 2);
        assert_eq!(reduced.to_dense(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_spmv() {
        // [[2, 1], [0, 3]] * [1, 2] = [4, 6]
        let triplets = vec![(0, 0, 2.0), (0, 1, 1.0), (1, 1, 3.0)];
        let m = CsrMatrix::from_triplets(2, 2, &triplets);
        let y = m.spmv(&[1.0, 2.0]);
        assert_eq!(y, vec![4.0, 6.0]);
    }

    #[test]
    fn test_to_complex_keeps_structure() {
        let g = CsrMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 0.0)]);
        let a = g.to_complex();
        assert_eq!(a.nnz(), 2);
        assert_eq!(a.get(0, 0), Complex64::new(1.0, 0.0));
        assert!(a.value_index(1, 1).is_some());
    }

    #[test]
    fn test_ground_vector_helpers() {
        let full = vec![0.0, 1.0, 2.0];
        let reduced = shed_ground_vec(&full);
        assert_eq!(reduced, vec![1.0, 2.0]);
        assert_eq!(with_ground(&reduced), full);
        assert_eq!(template_value(&reduced, 0), 0.0);
        assert_eq!(template_value(&reduced, 2), 2.0);
    }
}
