//! Analysis engine: operating point, DC sweep, AC sweep and transient.
//!
//! Every driver starts from the same compiled template and clones it per
//! point; solution vectors are ground-shed (template index i at row i-1).

pub mod ac;
pub mod dc;
pub mod op;
pub mod transient;
pub mod transient_source;

use crate::compiler::MnaSystem;
use crate::error::Result;
use crate::ir::Analysis;
use crate::solver::newton::{solve_operating_point, NewtonParams};
use crate::solver::{solve_template, LinearSolver};
use crate::sparse::{shed_ground_vec, CsrMatrix};
use crate::stats::Stats;
use num_complex::Complex64;
use std::time::Instant;
use tracing::{debug, error};

pub use transient::TranParams;

/// DC operating point results.
#[derive(Debug, Clone)]
pub struct OpResult {
    pub solution: Vec<f64>,
}

/// DC sweep results, one solution per retained sweep value.
#[derive(Debug, Clone)]
pub struct DcResult {
    /// X-axis label, e.g. `voltage(V1)` or `current(I1)`.
    pub sweep_name: String,
    pub sweep_values: Vec<f64>,
    pub solutions: Vec<Vec<f64>>,
}

/// AC sweep results.
#[derive(Debug, Clone)]
pub struct AcResult {
    /// Frequency points (Hz) that solved.
    pub frequencies: Vec<f64>,
    pub solutions: Vec<Vec<Complex64>>,
}

/// Transient analysis results.
#[derive(Debug, Clone)]
pub struct TranResult {
    /// Time points where output was recorded.
    pub times: Vec<f64>,
    pub solutions: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub enum AnalysisResult {
    Op(OpResult),
    Dc(DcResult),
    Ac(AcResult),
    Tran(TranResult),
}

/// Run one analysis request against the compiled template.
pub fn run(
    system: &MnaSystem,
    analysis: &Analysis,
    solver: &dyn LinearSolver,
    tran_params: &TranParams,
    mut stats: Option<&mut Stats>,
) -> Result<AnalysisResult> {
    let newton = &tran_params.newton;
    let started = Instant::now();
    let (phase, result) = match analysis {
        Analysis::Op => (
            "Operating point",
            AnalysisResult::Op(op::run(system, solver, newton, stats.as_deref_mut())?),
        ),
        Analysis::Dc {
            source_kind,
            source,
            start,
            stop,
            increment,
        } => {
            let sweep = dc::DcSweep {
                source_kind: *source_kind,
                source: source.as_str(),
                start: *start,
                stop: *stop,
                increment: *increment,
            };
            (
                "DC sweep",
                AnalysisResult::Dc(dc::run(system, &sweep, solver, newton, stats.as_deref_mut())?),
            )
        }
        Analysis::Ac {
            sweep_type,
            n_points,
            f_start,
            f_stop,
        } => (
            "AC sweep",
            AnalysisResult::Ac(ac::run(
                system,
                solver,
                *sweep_type,
                *n_points,
                *f_start,
                *f_stop,
                newton,
                stats.as_deref_mut(),
            )?),
        ),
        Analysis::Tran {
            tstep,
            tstop,
            tstart,
        } => (
            "Transient",
            AnalysisResult::Tran(transient::run(
                system,
                solver,
                *tstep,
                *tstop,
                *tstart,
                tran_params,
                stats.as_deref_mut(),
            )?),
        ),
    };
    if let Some(s) = stats {
        s.add_phase(phase, started.elapsed());
    }
    Ok(result)
}

/// Run every analysis in order. A failed analysis is logged and leaves an
/// `Err` in its slot; the ones after it still run.
pub fn run_all(
    system: &MnaSystem,
    analyses: &[Analysis],
    solver: &dyn LinearSolver,
    tran_params: &TranParams,
    mut stats: Option<&mut Stats>,
) -> Vec<Result<AnalysisResult>> {
    analyses
        .iter()
        .map(|analysis| {
            let result = run(system, analysis, solver, tran_params, stats.as_deref_mut());
            if let Err(e) = &result {
                error!(analysis = ?analysis.kind(), error = %e, "analysis failed, skipping its output");
            }
            result
        })
        .collect()
}

/// Solve a real operating point from a full-size base system: plain linear
/// solve without diodes, Newton-Raphson seeded with `seed` otherwise.
#[allow(clippy::too_many_arguments)]
pub(crate) fn solve_point(
    system: &MnaSystem,
    matrix: &CsrMatrix<f64>,
    rhs: &[f64],
    solver: &dyn LinearSolver,
    seed: &[f64],
    newton: &NewtonParams,
    at: f64,
    mut stats: Option<&mut Stats>,
) -> Result<Vec<f64>> {
    if system.has_diodes() {
        solve_operating_point(
            solver,
            matrix,
            rhs,
            &system.diodes,
            seed,
            newton,
            at,
            stats,
        )
        .map(|out| out.x)
    } else {
        let t = Instant::now();
        let solved = solve_template(solver, matrix, rhs);
        if let Some(ref mut s) = stats {
            s.linear_solve += t.elapsed();
            s.linear_solves += 1;
            if solved.is_err() {
                s.failed_solves += 1;
            }
        }
        if let Err(e) = &solved {
            debug!(
                at,
                error = %e,
                matrix = ?matrix.shed_ground().to_dense(),
                rhs = ?shed_ground_vec(rhs),
                "singular system"
            );
        }
        solved
    }
}

/// Ground-shed seed whose diode junctions sit at their initial voltages.
pub(crate) fn diode_seed(system: &MnaSystem) -> Vec<f64> {
    let mut seed = vec![0.0; system.reduced_size()];
    for d in &system.diodes {
        if d.nplus != 0 {
            seed[d.nplus - 1] = d.initial_voltage;
        } else if d.nminus != 0 {
            seed[d.nminus - 1] = -d.initial_voltage;
        }
    }
    seed
}
