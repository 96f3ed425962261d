//! Linear system solvers and the Newton-Raphson driver built on them.

pub mod cpu;
pub mod newton;
pub mod sparse_direct;

use crate::error::Result;
use crate::sparse::{shed_ground_vec, CsrMatrix};
use num_complex::Complex64;

/// A solver for linear systems Ax = b.
pub trait LinearSolver {
    /// Solve a real-valued system Ax = b.
    fn solve_real(&self, a: &CsrMatrix<f64>, b: &[f64]) -> Result<Vec<f64>>;

    /// Solve a complex-valued system Ax = b.
    fn solve_complex(&self, a: &CsrMatrix<Complex64>, b: &[Complex64]) -> Result<Vec<Complex64>>;
}

/// Shed the ground row/column from a full template system and solve it.
/// The returned vector holds template index i at position i-1.
pub fn solve_template(
    solver: &dyn LinearSolver,
    matrix: &CsrMatrix<f64>,
    rhs: &[f64],
) -> Result<Vec<f64>> {
    solver.solve_real(&matrix.shed_ground(), &shed_ground_vec(rhs))
}

/// Complex counterpart of [`solve_template`].
pub fn solve_template_complex(
    solver: &dyn LinearSolver,
    matrix: &CsrMatrix<Complex64>,
    rhs: &[Complex64],
) -> Result<Vec<Complex64>> {
    solver.solve_complex(&matrix.shed_ground(), &shed_ground_vec(rhs))
}
