//! Sparse-direct solver based on faer's sparse LU factorization.
//!
//! Complex systems are solved through their real equivalent
//! `[[Re, -Im], [Im, Re]] * [xr; xi] = [br; bi]`, which keeps a single
//! real factorization path.
//!
//! faer aborts a factorization with a panic when it meets a zero pivot in a
//! structurally full matrix, so the factor-and-solve step runs under
//! `catch_unwind` and a panic becomes a `Solve` error. Every solution is
//! also checked against the original system before it is returned.

use crate::error::{Result, VoltaicError};
use crate::sparse::CsrMatrix;
use faer::prelude::*;
use faer::sparse::{SparseColMat, Triplet};
use num_complex::Complex64;
use std::ops::{AddAssign, Mul, Sub};
use std::panic::{self, AssertUnwindSafe};

/// Backward-error bound accepted for `A x = b`, relative to `|A| |x| + |b|`.
const RESIDUAL_TOL: f64 = 1e-6;

/// Sparse LU solver for circuits too large for dense elimination.
#[derive(Debug, Default)]
pub struct SparseLuSolver;

impl SparseLuSolver {
    pub fn new() -> Self {
        Self
    }
}

fn lu_solve(n: usize, triplets: &[Triplet<usize, usize, f64>], b: &[f64]) -> Result<Vec<f64>> {
    let a_sp = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, triplets)
        .map_err(|e| VoltaicError::Solve(format!("sparse matrix build failed: {e:?}")))?;

    let factored = panic::catch_unwind(AssertUnwindSafe(|| {
        a_sp.sp_lu().map(|lu| {
            let rhs = faer::Mat::<f64>::from_fn(n, 1, |i, _| b[i]);
            lu.solve(rhs)
        })
    }));
    let x = match factored {
        Ok(Ok(x)) => x,
        Ok(Err(e)) => {
            return Err(VoltaicError::Solve(format!(
                "singular matrix: LU factorization failed: {e:?}"
            )))
        }
        Err(_) => {
            return Err(VoltaicError::Solve(
                "singular matrix: zero pivot in sparse LU".into(),
            ))
        }
    };

    (0..n)
        .map(|i| {
            let xi = x[(i, 0)];
            if xi.is_finite() {
                Ok(xi)
            } else {
                Err(VoltaicError::Solve(
                    "singular matrix: sparse LU produced NaN/Inf solution".into(),
                ))
            }
        })
        .collect()
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

/// Reject a solution whose residual exceeds the backward-error bound.
fn check_residual<T>(a: &CsrMatrix<T>, x: &[T], b: &[T], abs: impl Fn(T) -> f64) -> Result<()>
where
    T: Copy + Default + AddAssign + Mul<Output = T> + Sub<Output = T>,
{
    let ax = a.spmv(x);
    let a_norm = a.values.iter().map(|&v| abs(v)).fold(0.0, f64::max);
    let x_norm = x.iter().map(|&v| abs(v)).fold(0.0, f64::max);
    let b_norm = b.iter().map(|&v| abs(v)).fold(0.0, f64::max);
    let residual = ax
        .iter()
        .zip(b)
        .map(|(&l, &r)| abs(l - r))
        .fold(0.0, f64::max);
    let bound = RESIDUAL_TOL * (a_norm * x_norm + b_norm);
    if residual > bound {
        return Err(VoltaicError::Solve(format!(
            "singular matrix: sparse LU residual {residual:.3e} exceeds {bound:.3e}"
        )));
    }
    Ok(())
}

impl super::LinearSolver for SparseLuSolver {
    fn solve_real(&self, a: &CsrMatrix<f64>, b: &[f64]) -> Result<Vec<f64>> {
        check_dimensions(a, b.len())?;
        let n = a.nrows;
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut triplets = Vec::with_capacity(a.nnz());
        for row in 0..n {
            for idx in a.row_pointers[row]..a.row_pointers[row + 1] {
                let val = a.values[idx];
                if !val.is_finite() {
                    return Err(VoltaicError::Solve("sparse LU input contains NaN/Inf".into()));
                }
                triplets.push(Triplet::new(row, a.col_indices[idx], val));
            }
        }
        let x = lu_solve(n, &triplets, b)?;
        check_residual(a, &x, b, f64::abs)?;
        Ok(x)
    }

    fn solve_complex(&self, a: &CsrMatrix<Complex64>, b: &[Complex64]) -> Result<Vec<Complex64>> {
        check_dimensions(a, b.len())?;
        let n = a.nrows;
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut triplets = Vec::with_capacity(4 * a.nnz());
        for row in 0..n {
            for idx in a.row_pointers[row]..a.row_pointers[row + 1] {
                let col = a.col_indices[idx];
                let z = a.values[idx];
                if !(z.re.is_finite() && z.im.is_finite()) {
                    return Err(VoltaicError::Solve("sparse LU input contains NaN/Inf".into()));
                }
                triplets.push(Triplet::new(row, col, z.re));
                triplets.push(Triplet::new(row, col + n, -z.im));
                triplets.push(Triplet::new(row + n, col, z.im));
                triplets.push(Triplet::new(row + n, col + n, z.re));
            }
        }
        let rhs: Vec<f64> = b.iter().map(|z| z.re).chain(b.iter().map(|z| z.im)).collect();
        let x = lu_solve(2 * n, &triplets, &rhs)?;
        let x: Vec<Complex64> = (0..n).map(|i| Complex64::new(x[i], x[i + n])).collect();
        check_residual(a, &x, b, |z| z.norm())?;
        Ok(x)
    }
}
