//! CPU direct solver using Gaussian elimination with partial pivoting.
//!
//! Converts CSR to dense and eliminates in place. Suitable for the small
//! circuits typical of hand-written netlists; `SparseLuSolver` handles
//! larger ones.

use crate::error::{Result, VoltaicError};
use crate::sparse::CsrMatrix;
use num_complex::Complex64;
use std::ops::{AddAssign, Div, Mul, Sub};

/// Pivots smaller than this fraction of the largest matrix entry are
/// treated as zero.
const RELATIVE_PIVOT_TOL: f64 = 1e-14;

/// CPU-based dense direct linear solver.
pub struct CpuSolver;

impl CpuSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpuSolver {
    fn default() -> Self {
        Self::new()
    }
}

fn check_dimensions<T>(a: &CsrMatrix<T>, b_len: usize) -> Result<()> {
    if a.ncols != a.nrows || b_len != a.nrows {
        return Err(VoltaicError::Solve(format!(
            "dimension mismatch: matrix is {}x{}, rhs length is {}",
            a.nrows, a.ncols, b_len
        )));
    }
    Ok(())
}

/// Solve `a * x = b` by elimination on an augmented dense copy.
/// `magnitude` ranks pivot candidates.
fn eliminate<T>(a: &CsrMatrix<T>, b: &[T], magnitude: fn(T) -> f64) -> Result<Vec<T>>
where
    T: Copy + Default + AddAssign + Sub<Output = T> + Mul<Output = T> + Div<Output = T>,
{
    check_dimensions(a, b.len())?;
    let n = a.nrows;
    if n == 0 {
        return Ok(Vec::new());
    }

    let scale = a.values.iter().map(|&v| magnitude(v)).fold(0.0, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        return Err(VoltaicError::Solve("singular matrix".into()));
    }
    let threshold = scale * RELATIVE_PIVOT_TOL;

    let mut aug = a.to_dense();
    for (row, &rhs) in aug.iter_mut().zip(b) {
        row.push(rhs);
    }

    for k in 0..n {
        let (max_row, max_val) = (k..n)
            .map(|i| (i, magnitude(aug[i][k])))
            .fold((k, -1.0), |best, cand| if cand.1 > best.1 { cand } else { best });

        if max_val < threshold {
            return Err(VoltaicError::Solve(format!(
                "singular matrix (pivot {max_val:.3e} in column {k})"
            )));
        }
        aug.swap(k, max_row);

        let pivot = aug[k][k];
        for i in (k + 1)..n {
            let factor = aug[i][k] / pivot;
            aug[i][k] = T::default();
            for j in (k + 1)..=n {
                let akj = aug[k][j];
                aug[i][j] = aug[i][j] - factor * akj;
            }
        }
    }

    let mut x = vec![T::default(); n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum = sum - aug[i][j] * x[j];
        }
        x[i] = sum / aug[i][i];
    }
    Ok(x)
}

impl super::LinearSolver for CpuSolver {
    fn solve_real(&self, a: &CsrMatrix<f64>, b: &[f64]) -> Result<Vec<f64>> {
        eliminate(a, b, f64::abs)
    }

    fn solve_complex(&self, a: &CsrMatrix<Complex64>, b: &[Complex64]) -> Result<Vec<Complex64>> {
        eliminate(a, b, |z| z.norm())
    }
}
