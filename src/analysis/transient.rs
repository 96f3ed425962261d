//! Transient (time-domain) analysis engine.
//!
//! Fixed-step Backward Euler. Every capacitor and inductor keeps a branch
//! row in the template; each step rewrites that row with the discretized
//! companion model:
//!
//! ```text
//! capacitor:  (C/h)(Vp - Vm) - I = (C/h)(Vp' - Vm')
//! inductor:   Vp - Vm - (L/h) I  = -(L/h) I'
//! ```
//!
//! where primes denote the previous accepted time point. Time-varying
//! sources are re-evaluated at each new time.
//!
//! The t=0 point pins every capacitor to its initial voltage and every
//! inductor to its initial current. Output is recorded at `tstart` and then
//! every `tstep` through `tstop`; each reporting interval is integrated in
//! `step_split` equal sub-steps.

use super::transient_source::{self, Timing};
use super::{diode_seed, solve_point, TranResult};
use crate::compiler::MnaSystem;
use crate::error::{Result, VoltaicError};
use crate::solver::newton::NewtonParams;
use crate::solver::LinearSolver;
use crate::sparse::template_value;
use crate::stats::Stats;
use tracing::warn;

/// Fraction of a step below which a leftover interval is treated as rounding.
const TIME_SLACK: f64 = 1e-9;

/// Transient integration settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranParams {
    /// Internal sub-steps per reported step.
    pub step_split: usize,
    pub newton: NewtonParams,
}

impl Default for TranParams {
    fn default() -> Self {
        Self {
            step_split: 1,
            newton: NewtonParams::default(),
        }
    }
}

/// Copy of the DC excitation with every time-varying source evaluated at `t`.
fn rhs_at_time(system: &MnaSystem, t: f64, timing: Timing) -> Vec<f64> {
    let mut rhs = system.rhs.clone();
    for src in &system.sources {
        if let Some(func) = &src.tran {
            src.restamp(&mut rhs, src.dc, transient_source::evaluate(func, t, timing));
        }
    }
    rhs
}

/// Solve the t=0 point with capacitor voltages and inductor currents pinned
/// to their initial conditions.
pub fn initial_condition(
    system: &MnaSystem,
    solver: &dyn LinearSolver,
    timing: Timing,
    newton: &NewtonParams,
    stats: Option<&mut Stats>,
) -> Result<Vec<f64>> {
    let mut a = system.matrix.clone();
    let mut rhs = rhs_at_time(system, 0.0, timing);

    for c in &system.capacitors {
        // Branch row becomes Vp - Vm = V0.
        a.add_at(c.branch, c.nplus, 1.0);
        a.add_at(c.branch, c.nminus, -1.0);
        a.add_at(c.branch, c.branch, 1.0);
        rhs[c.branch] = c.initial;
    }
    for l in &system.inductors {
        // Branch row becomes -I = -I0.
        a.add_at(l.branch, l.nplus, -1.0);
        a.add_at(l.branch, l.nminus, 1.0);
        a.add_at(l.branch, l.branch, -1.0);
        rhs[l.branch] = -l.initial;
    }

    solve_point(system, &a, &rhs, solver, &diode_seed(system), newton, 0.0, stats)
}

/// Advance one Backward Euler step of length `h`, ending at `time`.
///
/// Returns the solve error instead of falling back, so the caller decides
/// what a failed step means.
#[allow(clippy::too_many_arguments)]
pub fn back_euler_step(
    system: &MnaSystem,
    solver: &dyn LinearSolver,
    time: f64,
    h: f64,
    x_prev: &[f64],
    timing: Timing,
    newton: &NewtonParams,
    stats: Option<&mut Stats>,
) -> Result<Vec<f64>> {
    let mut a = system.matrix.clone();
    let mut rhs = rhs_at_time(system, time, timing);

    for c in &system.capacitors {
        let g = c.value / h;
        a.add_at(c.branch, c.nplus, g);
        a.add_at(c.branch, c.nminus, -g);
        let v_prev = template_value(x_prev, c.nplus) - template_value(x_prev, c.nminus);
        rhs[c.branch] = g * v_prev;
    }
    for l in &system.inductors {
        let r = l.value / h;
        a.add_at(l.branch, l.branch, -r);
        rhs[l.branch] = -r * template_value(x_prev, l.branch);
    }

    solve_point(system, &a, &rhs, solver, x_prev, newton, time, stats)
}

/// Run transient analysis from t=0 to `tstop`, recording from `tstart`.
#[allow(clippy::too_many_arguments)]
pub fn run(
    system: &MnaSystem,
    solver: &dyn LinearSolver,
    tstep: f64,
    tstop: f64,
    tstart: f64,
    params: &TranParams,
    mut stats: Option<&mut Stats>,
) -> Result<TranResult> {
    let _span = tracing::info_span!("transient_analysis", tstop, tstep).entered();

    if !(tstep.is_finite() && tstep > 0.0) || !tstop.is_finite() || tstop <= 0.0 {
        return Err(VoltaicError::Analysis(format!(
            "transient needs positive step and stop time, got tstep={tstep} tstop={tstop}"
        )));
    }
    if !(0.0..=tstop).contains(&tstart) {
        return Err(VoltaicError::Analysis(format!(
            "transient start {tstart} outside 0..{tstop}"
        )));
    }
    if params.step_split == 0 {
        return Err(VoltaicError::Analysis("step_split must be at least 1".into()));
    }

    let timing = Timing { tstep, tstop };
    let newton = &params.newton;
    let h = tstep / params.step_split as f64;

    let mut x = match initial_condition(system, solver, timing, newton, stats.as_deref_mut()) {
        Ok(x) => x,
        Err(e) => {
            warn!(error = %e, "initial condition solve failed, starting from zero");
            vec![0.0; system.reduced_size()]
        }
    };

    let advance = |x: &[f64], time: f64, h: f64, stats: Option<&mut Stats>| -> Vec<f64> {
        let mut stats = stats;
        match back_euler_step(system, solver, time, h, x, timing, newton, stats.as_deref_mut()) {
            Ok(x_new) => {
                if let Some(s) = stats {
                    s.timesteps_accepted += 1;
                }
                x_new
            }
            Err(e) => {
                warn!(time, error = %e, "transient step failed, holding previous state");
                if let Some(s) = stats {
                    s.timesteps_frozen += 1;
                }
                x.to_vec()
            }
        }
    };

    let mut result = TranResult {
        times: Vec::new(),
        solutions: Vec::new(),
    };

    // Settle up to tstart without recording.
    let mut t = 0.0;
    if tstart > 0.0 {
        let n_pre = (tstart / h * (1.0 + TIME_SLACK)).floor() as u64;
        for k in 1..=n_pre {
            let t_next = (k as f64 * h).min(tstart);
            x = advance(&x, t_next, t_next - t, stats.as_deref_mut());
            t = t_next;
        }
        if tstart - t > h * TIME_SLACK {
            x = advance(&x, tstart, tstart - t, stats.as_deref_mut());
        }
        t = tstart;
    }
    result.times.push(t);
    result.solutions.push(x.clone());

    // Reporting steps through tstop.
    let n_report = ((tstop - tstart) / tstep - TIME_SLACK).ceil().max(0.0) as u64;
    for r in 1..=n_report {
        let t_target = (tstart + r as f64 * tstep).min(tstop);
        let sub = (t_target - t) / params.step_split as f64;
        for s in 1..=params.step_split {
            let t_next = if s == params.step_split {
                t_target
            } else {
                t + s as f64 * sub
            };
            x = advance(&x, t_next, sub, stats.as_deref_mut());
        }
        t = t_target;
        result.times.push(t);
        result.solutions.push(x.clone());
    }

    Ok(result)
}
