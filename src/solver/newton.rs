//! Newton-Raphson solver for circuits containing diodes.
//!
//! Each iteration linearizes every diode at its current bias, superimposes the
//! change from the template's V=0 companion onto a copy of the base system,
//! solves the linear system, and limits the new junction voltages before the
//! next linearization.

use crate::compiler::{stamp_diode, DiodeEntry};
use crate::error::{Result, VoltaicError};
use crate::sparse::{template_value, CsrMatrix};
use crate::stats::Stats;
use std::time::Instant;
use tracing::{debug, warn};

use super::{solve_template, LinearSolver};

/// Parameters for the Newton-Raphson iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonParams {
    pub max_iterations: usize,
    /// Absolute update tolerance (volts or amps).
    pub abs_tol: f64,
    /// Relative update tolerance.
    pub rel_tol: f64,
}

impl Default for NewtonParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            abs_tol: 5e-5,
            rel_tol: 1e-3,
        }
    }
}

/// Result of one operating-point solve.
#[derive(Debug, Clone)]
pub struct NewtonOutcome {
    /// Ground-shed solution vector.
    pub x: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// SplitMix64 stream used to jitter an iterate off a singular point.
/// Seeded with a constant so reruns are reproducible.
struct Jitter(u64);

impl Jitter {
    fn new() -> Self {
        Self(0x5eed_d10d_e000_0001)
    }

    /// Uniform value in [-1, 1).
    fn next_signed(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
    }
}

/// Voltage across a diode in a ground-shed vector.
pub fn diode_voltage(x: &[f64], d: &DiodeEntry) -> f64 {
    template_value(x, d.nplus) - template_value(x, d.nminus)
}

/// Elementwise update test: both the absolute and the relative bound must hold.
///
/// The relative bound is scaled by the larger of the two iterates, floored at
/// `abs_tol` so that unknowns sitting at zero can still converge.
pub fn is_converged(x: &[f64], x_prev: &[f64], params: &NewtonParams) -> bool {
    x.iter().zip(x_prev).all(|(&a, &b)| {
        let dx = (a - b).abs();
        let scale = a.abs().max(b.abs()).max(params.abs_tol);
        dx <= params.abs_tol && dx <= params.rel_tol * scale
    })
}

/// Solve one nonlinear operating point.
///
/// `matrix`/`rhs` are a full-size base system that already carries the
/// diodes' V=0 companions from the template. `x_seed` is the ground-shed
/// starting iterate. `at` identifies the sweep value or time point in logs.
///
/// Running out of iterations is not an error: the last iterate is returned
/// with `converged == false`. An error is returned only when no linear solve
/// succeeded at all.
#[allow(clippy::too_many_arguments)]
pub fn solve_operating_point(
    solver: &dyn LinearSolver,
    matrix: &CsrMatrix<f64>,
    rhs: &[f64],
    diodes: &[DiodeEntry],
    x_seed: &[f64],
    params: &NewtonParams,
    at: f64,
    mut stats: Option<&mut Stats>,
) -> Result<NewtonOutcome> {
    let mut x = x_seed.to_vec();
    let mut bias: Vec<f64> = diodes.iter().map(|d| diode_voltage(&x, d)).collect();
    let mut jitter = Jitter::new();
    let mut solved_once = false;

    for iter in 0..params.max_iterations {
        let _span = tracing::debug_span!("newton_iter", iter).entered();

        let t = Instant::now();
        let companions: Vec<_> = diodes
            .iter()
            .zip(&bias)
            .map(|(d, &v)| d.model.companion(v).delta(d.base))
            .collect();
        if let Some(ref mut s) = stats {
            s.device_eval += t.elapsed();
        }

        let t = Instant::now();
        let mut a = matrix.clone();
        let mut b = rhs.to_vec();
        for (d, c) in diodes.iter().zip(companions) {
            stamp_diode(&mut a, &mut b, d, c);
        }
        if let Some(ref mut s) = stats {
            s.assembly += t.elapsed();
        }

        let t = Instant::now();
        let solved = solve_template(solver, &a, &b);
        if let Some(ref mut s) = stats {
            s.linear_solve += t.elapsed();
            s.newton_iterations += 1;
            s.linear_solves += 1;
        }

        match solved {
            Ok(x_new) => {
                solved_once = true;
                let mut limited = false;
                for (d, v) in diodes.iter().zip(bias.iter_mut()) {
                    let (v_lim, hit) = d.model.limit_voltage(diode_voltage(&x_new, d), *v);
                    *v = v_lim;
                    limited |= hit;
                }
                let converged = !limited && is_converged(&x_new, &x, params);
                x = x_new;
                if converged {
                    debug!(at, iterations = iter + 1, "Newton converged");
                    return Ok(NewtonOutcome {
                        x,
                        iterations: iter + 1,
                        converged: true,
                    });
                }
            }
            Err(e) => {
                debug!(at, iter, error = %e, "linear solve failed, perturbing iterate");
                if let Some(ref mut s) = stats {
                    s.failed_solves += 1;
                }
                for xi in x.iter_mut() {
                    *xi += params.abs_tol * jitter.next_signed();
                }
                for (d, v) in diodes.iter().zip(bias.iter_mut()) {
                    *v = diode_voltage(&x, d);
                }
            }
        }
    }

    if !solved_once {
        return Err(VoltaicError::Solve(format!(
            "no Newton iteration produced a solution at {at}"
        )));
    }

    warn!(
        at,
        max_iterations = params.max_iterations,
        "Newton-Raphson did not converge; using last iterate"
    );
    if let Some(ref mut s) = stats {
        s.newton_unconverged += 1;
    }
    Ok(NewtonOutcome {
        x,
        iterations: params.max_iterations,
        converged: false,
    })
}
