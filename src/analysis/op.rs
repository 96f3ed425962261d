//! DC operating point analysis.
//!
//! Solves the DC template once. Capacitors are open and inductors short
//! through their template stamps; diodes go through Newton-Raphson seeded
//! with their initial voltages.

use super::{diode_seed, solve_point, OpResult};
use crate::compiler::MnaSystem;
use crate::error::Result;
use crate::solver::newton::NewtonParams;
use crate::solver::LinearSolver;
use crate::stats::Stats;

pub fn run(
    system: &MnaSystem,
    solver: &dyn LinearSolver,
    newton: &NewtonParams,
    stats: Option<&mut Stats>,
) -> Result<OpResult> {
    let _span = tracing::info_span!("op_analysis").entered();
    let solution = solve_point(
        system,
        &system.matrix,
        &system.rhs,
        solver,
        &diode_seed(system),
        newton,
        0.0,
        stats,
    )?;
    Ok(OpResult { solution })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::ir::{Component, Netlist};
    use crate::solver::cpu::CpuSolver;
    use crate::sparse::template_value;
    use approx::assert_abs_diff_eq;

    #[test]
    fn inductor_shorts_and_capacitor_opens() {
        let mut netlist = Netlist::default();
        netlist.add_component(Component::VSource {
            name: "V1".into(),
            nodes: ("1".into(), "0".into()),
            dc: 2.0,
            ac: None,
            tran: None,
        });
        netlist.add_component(Component::Inductor {
            name: "L1".into(),
            nodes: ("1".into(), "2".into()),
            inductance: 1e-3,
            initial_current: 0.0,
        });
        netlist.add_component(Component::Resistor {
            name: "R1".into(),
            nodes: ("2".into(), "0".into()),
            resistance: 100.0,
        });
        netlist.add_component(Component::Capacitor {
            name: "C1".into(),
            nodes: ("2".into(), "0".into()),
            capacitance: 1e-6,
            initial_voltage: 0.0,
        });
        let sys = compile(&netlist).unwrap();
        let op = run(&sys, &CpuSolver::new(), &NewtonParams::default(), None).unwrap();
        let x = &op.solution;
        assert_abs_diff_eq!(template_value(x, 2), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            template_value(x, sys.branch_index("L1").unwrap()),
            0.02,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            template_value(x, sys.branch_index("C1").unwrap()),
            0.0,
            epsilon = 1e-15
        );
    }
}
