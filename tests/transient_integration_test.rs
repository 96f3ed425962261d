//! Integration tests for transient analysis.

use approx::assert_abs_diff_eq;
use voltaic::analysis::{self, TranParams, TranResult};
use voltaic::compiler::{self, MnaSystem};
use voltaic::ir::Analysis;
use voltaic::parser;
use voltaic::solver::cpu::CpuSolver;
use voltaic::solver::sparse_direct::SparseLuSolver;
use voltaic::sparse::template_value;
use voltaic::stats::Stats;

/// Helper: parse + compile + transient solve
fn tran_solve(
    netlist: &str,
    params: &TranParams,
    stats: Option<&mut Stats>,
) -> (MnaSystem, TranResult) {
    let circuit = parser::parse(netlist).expect("parse failed");
    let system = compiler::compile(&circuit).expect("compile failed");

    let (tstep, tstop, tstart) = circuit
        .analyses
        .iter()
        .find_map(|a| match a {
            Analysis::Tran {
                tstep,
                tstop,
                tstart,
            } => Some((*tstep, *tstop, *tstart)),
            _ => None,
        })
        .expect("no TRAN analysis in netlist");

    let result = analysis::transient::run(
        &system,
        &SparseLuSolver::new(),
        tstep,
        tstop,
        tstart,
        params,
        stats,
    )
    .expect("transient analysis failed");
    (system, result)
}

/// Voltage waveform of a node.
fn waveform(system: &MnaSystem, result: &TranResult, node: &str) -> Vec<f64> {
    let idx = system
        .node_index(node)
        .unwrap_or_else(|| panic!("node {} not found", node));
    result
        .solutions
        .iter()
        .map(|x| template_value(x, idx))
        .collect()
}

#[test]
fn test_capacitor_initial_condition_is_exact() {
    let netlist = "\
charged capacitor
C1 1 0 1u IC=3.0
R1 1 0 1MEG
.TRAN 1u 10u
";
    let (system, result) = tran_solve(netlist, &TranParams::default(), None);
    assert_eq!(result.times[0], 0.0);
    assert_abs_diff_eq!(waveform(&system, &result, "1")[0], 3.0, epsilon = 1e-12);
}

#[test]
fn test_rc_decay_matches_analytic() {
    let netlist = "\
rc discharge
C1 1 0 1u IC=1
R1 1 0 1k
.TRAN 1u 5m
";
    let (system, result) = tran_solve(netlist, &TranParams::default(), None);
    assert_eq!(result.times.len(), 5001);

    let v = waveform(&system, &result, "1");
    let tau = 1e-3;
    // Backward Euler global error stays below h / (2 tau) of the initial value.
    for (t, vt) in result.times.iter().zip(&v) {
        let exact = (-t / tau).exp();
        assert_abs_diff_eq!(*vt, exact, epsilon = 5e-4);
    }
    assert_abs_diff_eq!(*result.times.last().unwrap(), 5e-3, epsilon = 1e-15);
}

#[test]
fn test_rc_charging_from_step() {
    let netlist = "\
rc charge
V1 in 0 PULSE(0 1 0 1n 1n 1 2)
R1 in out 1k
C1 out 0 1u
.TRAN 10u 5m
";
    let params = TranParams {
        step_split: 10,
        ..TranParams::default()
    };
    let (system, result) = tran_solve(netlist, &params, None);
    let v = waveform(&system, &result, "out");
    assert_abs_diff_eq!(v[0], 0.0, epsilon = 1e-12);
    // One time constant in.
    let k = result.times.iter().position(|t| (t - 1e-3).abs() < 1e-9).unwrap();
    assert_abs_diff_eq!(v[k], 1.0 - (-1.0f64).exp(), epsilon = 2e-3);
    assert!(*v.last().unwrap() > 0.99);
}

#[test]
fn test_lc_tank_oscillates() {
    // f = 1 / (2 pi sqrt(LC)) ~ 5.03 kHz
    let netlist = "\
lc tank
L1 1 0 1m IC=0
C1 1 0 1u IC=1
.TRAN 1u 400u
";
    let params = TranParams {
        step_split: 10,
        ..TranParams::default()
    };
    let (system, result) = tran_solve(netlist, &params, None);
    let v = waveform(&system, &result, "1");
    assert_abs_diff_eq!(v[0], 1.0, epsilon = 1e-12);
    // Backward Euler damps but the first negative swing is still deep.
    let min = v.iter().cloned().fold(f64::MAX, f64::min);
    assert!(min < -0.8, "min {min}");
    assert!(v.iter().all(|x| x.abs() <= 1.0 + 1e-9));
}

#[test]
fn test_tstart_skips_early_output() {
    let netlist = "\
delayed output
V1 1 0 SIN(0 1 1k)
R1 1 0 1k
.TRAN 100u 1m 500u
";
    let (system, result) = tran_solve(netlist, &TranParams::default(), None);
    assert_abs_diff_eq!(result.times[0], 5e-4, epsilon = 1e-15);
    assert_eq!(result.times.len(), 6);
    let v = waveform(&system, &result, "1");
    for (t, vt) in result.times.iter().zip(&v) {
        let exact = (2.0 * std::f64::consts::PI * 1e3 * t).sin();
        assert_abs_diff_eq!(*vt, exact, epsilon = 1e-9);
    }
}

#[test]
fn test_floating_node_freezes_previous_state() {
    let netlist = "\
floating island
V1 1 0 PULSE(0 5 0 1u 1u 1 2)
R1 1 0 1k
R2 8 9 1k
.TRAN 10u 100u
";
    let mut stats = Stats::new();
    let (_, result) = tran_solve(netlist, &TranParams::default(), Some(&mut stats));
    assert_eq!(result.times.len(), 11);
    for x in &result.solutions[1..] {
        assert_eq!(x, &result.solutions[0]);
    }
    assert_eq!(stats.timesteps_frozen, 10);
}

#[test]
fn test_dense_and_sparse_agree() {
    let netlist = "\
rlc
V1 in 0 PULSE(0 1 0 1u 1u 50u 100u)
R1 in a 10
L1 a b 100u
C1 b 0 1u
.TRAN 1u 200u
";
    let circuit = parser::parse(netlist).unwrap();
    let system = compiler::compile(&circuit).unwrap();
    let params = TranParams::default();
    let dense =
        analysis::transient::run(&system, &CpuSolver::new(), 1e-6, 2e-4, 0.0, &params, None)
            .unwrap();
    let sparse =
        analysis::transient::run(&system, &SparseLuSolver::new(), 1e-6, 2e-4, 0.0, &params, None)
            .unwrap();
    assert_eq!(dense.times.len(), sparse.times.len());
    for (a, b) in dense.solutions.iter().zip(&sparse.solutions) {
        for (x, y) in a.iter().zip(b) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
    }
}
