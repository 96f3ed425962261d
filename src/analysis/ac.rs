//! AC frequency sweep analysis.
//!
//! 1. Solve the DC operating point and linearize every diode there once.
//! 2. Lift the real template into a complex one carrying those fixed
//!    small-signal conductances.
//! 3. For each frequency put jωC on each capacitor's branch row, so the
//!    branch carries `I = jωC (Vp - Vm)`, and -jωL on inductor branch
//!    diagonals, then solve against the AC excitation vector.
//!
//! Frequency points are generated according to sweep type:
//!   - DEC: logarithmic, n_points per decade, ratio 10^(1/n)
//!   - OCT: logarithmic, n_points per octave, ratio 8^(1/n)
//!   - LIN: n_points equal intervals, both endpoints included
//!
//! A range with `f_start == f_stop` yields the single point `f_stop`.

use super::{diode_seed, solve_point, AcResult};
use crate::compiler::{stamp_conductance, MnaSystem};
use crate::error::{Result, VoltaicError};
use crate::ir::AcSweepType;
use crate::solver::newton::{diode_voltage, NewtonParams};
use crate::solver::{solve_template_complex, LinearSolver};
use crate::sparse::CsrMatrix;
use crate::stats::Stats;
use num_complex::Complex64;
use std::f64::consts::PI;
use std::time::Instant;
use tracing::{debug, warn};

/// Relative margin below `f_stop` under which a generated point counts as
/// distinct from the appended endpoint.
const ENDPOINT_MARGIN: f64 = 1e-9;

/// Run AC frequency sweep analysis.
#[allow(clippy::too_many_arguments)]
pub fn run(
    system: &MnaSystem,
    solver: &dyn LinearSolver,
    sweep_type: AcSweepType,
    n_points: usize,
    f_start: f64,
    f_stop: f64,
    newton: &NewtonParams,
    mut stats: Option<&mut Stats>,
) -> Result<AcResult> {
    let frequencies = generate_frequencies(sweep_type, n_points, f_start, f_stop)?;
    let _span = tracing::info_span!("ac_analysis", n_points = frequencies.len()).entered();

    let template = small_signal_template(system, solver, newton, stats.as_deref_mut())?;

    let mut result = AcResult {
        frequencies: Vec::with_capacity(frequencies.len()),
        solutions: Vec::with_capacity(frequencies.len()),
    };

    for f in frequencies {
        let omega = 2.0 * PI * f;
        let mut a = template.clone();
        for c in &system.capacitors {
            let y = Complex64::new(0.0, omega * c.value);
            a.add_at(c.branch, c.nplus, y);
            a.add_at(c.branch, c.nminus, -y);
        }
        for l in &system.inductors {
            a.add_at(l.branch, l.branch, Complex64::new(0.0, -omega * l.value));
        }

        let t = Instant::now();
        let solved = solve_template_complex(solver, &a, &system.ac_rhs);
        if let Some(ref mut s) = stats {
            s.linear_solve += t.elapsed();
            s.linear_solves += 1;
        }
        match solved {
            Ok(x) => {
                result.frequencies.push(f);
                result.solutions.push(x);
            }
            Err(e) => {
                warn!(frequency = f, error = %e, "AC point failed, skipping");
                if let Some(ref mut s) = stats {
                    s.failed_solves += 1;
                    s.points_skipped += 1;
                }
            }
        }
    }

    Ok(result)
}

/// Complex template with each diode's conductance moved from its V=0 value
/// to the operating-point value. Only conductances are stamped: the
/// companion current source is a bias term with no small-signal part.
fn small_signal_template(
    system: &MnaSystem,
    solver: &dyn LinearSolver,
    newton: &NewtonParams,
    stats: Option<&mut Stats>,
) -> Result<CsrMatrix<Complex64>> {
    let mut template = system.matrix.to_complex();
    if !system.has_diodes() {
        return Ok(template);
    }

    let op = solve_point(
        system,
        &system.matrix,
        &system.rhs,
        solver,
        &diode_seed(system),
        newton,
        0.0,
        stats,
    )
    .map_err(|e| VoltaicError::Analysis(format!("AC operating point failed: {e}")))?;

    for d in &system.diodes {
        let v = diode_voltage(&op, d);
        let dg = d.model.conductance(v) - d.base.g;
        debug!(diode = %d.name, bias = v, g = dg + d.base.g, "small-signal diode");
        let dg = Complex64::new(dg, 0.0);
        stamp_conductance(&mut template, d.nplus, d.nminus, dg);
        template.add_at(d.branch, d.nplus, -dg);
        template.add_at(d.branch, d.nminus, dg);
    }
    Ok(template)
}

/// Generate frequency points for the given sweep type.
///
/// Logarithmic sweeps step by a constant ratio from `f_start` while below
/// `f_stop`, then append `f_stop` exactly.
pub fn generate_frequencies(
    sweep_type: AcSweepType,
    n_points: usize,
    f_start: f64,
    f_stop: f64,
) -> Result<Vec<f64>> {
    if n_points == 0 {
        return Err(VoltaicError::Analysis(
            "AC sweep needs at least one point".into(),
        ));
    }
    if !(f_start.is_finite() && f_stop.is_finite()) || f_stop < f_start {
        return Err(VoltaicError::Analysis(format!(
            "invalid AC frequency range {f_start}..{f_stop}"
        )));
    }

    if f_start == f_stop {
        return Ok(vec![f_stop]);
    }

    let log_base = match sweep_type {
        AcSweepType::Dec => 10.0_f64,
        AcSweepType::Oct => 8.0,
        AcSweepType::Lin => {
            let step = (f_stop - f_start) / n_points as f64;
            let mut freqs: Vec<f64> = (0..n_points).map(|i| f_start + step * i as f64).collect();
            freqs.push(f_stop);
            return Ok(freqs);
        }
    };

    if f_start <= 0.0 {
        return Err(VoltaicError::Analysis(format!(
            "logarithmic AC sweep needs a positive start frequency, got {f_start}"
        )));
    }
    let ratio = log_base.powf(1.0 / n_points as f64);
    let limit = f_stop * (1.0 - ENDPOINT_MARGIN);
    let mut freqs = Vec::new();
    let mut k = 0i32;
    loop {
        let f = f_start * ratio.powi(k);
        if f >= limit {
            break;
        }
        freqs.push(f);
        k += 1;
    }
    freqs.push(f_stop);
    Ok(freqs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::ir::{Component, Netlist};
    use crate::model::DiodeModel;
    use crate::solver::cpu::CpuSolver;
    use crate::sparse::template_value;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_decade_sweep_point_count() {
        let f = generate_frequencies(AcSweepType::Dec, 10, 10.0, 1000.0).unwrap();
        assert_eq!(f.len(), 21);
        assert_eq!(f[0], 10.0);
        assert_abs_diff_eq!(f[1], 10.0 * 10f64.powf(0.1), epsilon = 1e-9);
        assert_eq!(f[20], 1000.0);
    }

    #[test]
    fn test_octave_sweep() {
        // One point per octave with ratio 8: 1, 8, 64, then 100.
        let f = generate_frequencies(AcSweepType::Oct, 1, 1.0, 100.0).unwrap();
        assert_eq!(f.len(), 4);
        assert_abs_diff_eq!(f[1], 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f[2], 64.0, epsilon = 1e-9);
        assert_eq!(f[3], 100.0);
    }

    #[test]
    fn test_linear_sweep_is_inclusive() {
        let f = generate_frequencies(AcSweepType::Lin, 4, 100.0, 500.0).unwrap();
        assert_eq!(f, vec![100.0, 200.0, 300.0, 400.0, 500.0]);
    }

    #[test]
    fn test_degenerate_range_gives_single_endpoint() {
        let f = generate_frequencies(AcSweepType::Dec, 5, 50.0, 50.0).unwrap();
        assert_eq!(f, vec![50.0]);
        let f = generate_frequencies(AcSweepType::Lin, 5, 50.0, 50.0).unwrap();
        assert_eq!(f, vec![50.0]);
    }

    #[test]
    fn test_invalid_sweeps_rejected() {
        assert!(generate_frequencies(AcSweepType::Dec, 0, 1.0, 10.0).is_err());
        assert!(generate_frequencies(AcSweepType::Dec, 5, 0.0, 10.0).is_err());
        assert!(generate_frequencies(AcSweepType::Lin, 5, 10.0, 1.0).is_err());
    }

    fn rc_lowpass() -> Netlist {
        let mut n = Netlist::default();
        n.add_component(Component::VSource {
            name: "V1".into(),
            nodes: ("in".into(), "0".into()),
            dc: 0.0,
            ac: Some((1.0, 0.0)),
            tran: None,
        });
        n.add_component(Component::Resistor {
            name: "R1".into(),
            nodes: ("in".into(), "out".into()),
            resistance: 1e3,
        });
        n.add_component(Component::Capacitor {
            name: "C1".into(),
            nodes: ("out".into(), "0".into()),
            capacitance: 1e-6,
            initial_voltage: 0.0,
        });
        n
    }

    #[test]
    fn test_rc_lowpass_corner() {
        let sys = compile(&rc_lowpass()).unwrap();
        let fc = 1.0 / (2.0 * PI * 1e3 * 1e-6);
        let res = run(
            &sys,
            &CpuSolver::new(),
            AcSweepType::Lin,
            1,
            fc,
            fc,
            &NewtonParams::default(),
            None,
        )
        .unwrap();
        assert_eq!(res.frequencies, vec![fc]);
        let out = sys.node_index("out").unwrap();
        let v = template_value(&res.solutions[0], out);
        assert_abs_diff_eq!(v.norm(), 1.0 / 2f64.sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(v.arg(), -PI / 4.0, epsilon = 1e-9);

        // The capacitor branch carries the whole series current.
        let i_c = template_value(&res.solutions[0], sys.branch_index("C1").unwrap());
        let i_v = template_value(&res.solutions[0], sys.branch_index("V1").unwrap());
        assert_abs_diff_eq!(i_c.norm(), 1e-3 / 2f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(i_c.norm(), i_v.norm(), epsilon = 1e-12);
        // I = jωC V leads the capacitor voltage by 90 degrees.
        assert_abs_diff_eq!((i_c / v).arg(), PI / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rl_highpass_uses_inductor_reactance() {
        let mut n = Netlist::default();
        n.add_component(Component::VSource {
            name: "V1".into(),
            nodes: ("in".into(), "0".into()),
            dc: 0.0,
            ac: Some((1.0, 0.0)),
            tran: None,
        });
        n.add_component(Component::Resistor {
            name: "R1".into(),
            nodes: ("in".into(), "out".into()),
            resistance: 100.0,
        });
        n.add_component(Component::Inductor {
            name: "L1".into(),
            nodes: ("out".into(), "0".into()),
            inductance: 1e-3,
            initial_current: 0.0,
        });
        let sys = compile(&n).unwrap();
        // |Z_L| = R at f = R / (2 pi L).
        let f = 100.0 / (2.0 * PI * 1e-3);
        let res = run(
            &sys,
            &CpuSolver::new(),
            AcSweepType::Lin,
            1,
            f,
            f,
            &NewtonParams::default(),
            None,
        )
        .unwrap();
        let v = template_value(&res.solutions[0], sys.node_index("out").unwrap());
        assert_abs_diff_eq!(v.norm(), 1.0 / 2f64.sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(v.arg(), PI / 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_diode_small_signal_divider() {
        let mut n = Netlist::default();
        n.add_component(Component::VSource {
            name: "V1".into(),
            nodes: ("1".into(), "0".into()),
            dc: 5.0,
            ac: Some((1.0, 0.0)),
            tran: None,
        });
        n.add_component(Component::Resistor {
            name: "R1".into(),
            nodes: ("1".into(), "2".into()),
            resistance: 1e3,
        });
        n.add_component(Component::Diode {
            name: "D1".into(),
            nodes: ("2".into(), "0".into()),
            model: "DM".into(),
            initial_voltage: 0.6,
        });
        n.add_model(DiodeModel::new("DM", 1e-12, None, 300.0));
        let sys = compile(&n).unwrap();
        let newton = NewtonParams::default();

        let op = crate::analysis::op::run(&sys, &CpuSolver::new(), &newton, None).unwrap();
        let g = sys.diodes[0]
            .model
            .conductance(diode_voltage(&op.solution, &sys.diodes[0]));
        let expected = 1.0 / (1.0 + 1e3 * g);

        let res = run(&sys, &CpuSolver::new(), AcSweepType::Dec, 1, 1e3, 1e3, &newton, None)
            .unwrap();
        let v = template_value(&res.solutions[0], 2);
        assert_abs_diff_eq!(v.re, expected, epsilon = 1e-9);
        assert_abs_diff_eq!(v.im, 0.0, epsilon = 1e-12);
    }
}
