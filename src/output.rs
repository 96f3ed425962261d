//! Result columns and CSV output.
//!
//! Every completed analysis is reduced to one x-axis column (sweep value,
//! frequency or time) plus one y column per requested variable.

use crate::analysis::AnalysisResult;
use crate::compiler::MnaSystem;
use crate::error::Result;
use crate::ir::{Quantity, Transform, Variable};
use crate::sparse::template_value;
use num_complex::Complex64;
use std::io::Write;
use tracing::warn;

/// Column-oriented view of one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnData {
    pub x_name: String,
    pub x_values: Vec<f64>,
    /// `(name, values)`, each as long as `x_values`.
    pub columns: Vec<(String, Vec<f64>)>,
}

/// Display name of a variable, e.g. `V(out)`, `VDB(a,b)` or `I(V1)`.
pub fn variable_name(var: &Variable) -> String {
    let prefix = match var.quantity {
        Quantity::Voltage => "V",
        Quantity::Current => "I",
    };
    let suffix = match var.transform {
        Transform::Mag => "",
        Transform::Real => "R",
        Transform::Imag => "I",
        Transform::Phase => "P",
        Transform::Db => "DB",
    };
    format!("{prefix}{suffix}({})", var.targets.join(","))
}

/// Every node voltage followed by every branch current.
pub fn default_variables(system: &MnaSystem) -> Vec<Variable> {
    let nodes = system.nodes.names_exgnd().iter().map(|n| Variable {
        quantity: Quantity::Voltage,
        transform: Transform::Mag,
        targets: vec![n.clone()],
    });
    let branches = system.branches.names().iter().map(|b| Variable {
        quantity: Quantity::Current,
        transform: Transform::Mag,
        targets: vec![b.clone()],
    });
    nodes.chain(branches).collect()
}

/// Template indices `(plus, minus)` a variable reads from. A single-node
/// voltage reads against ground.
fn resolve(system: &MnaSystem, var: &Variable) -> Option<(usize, usize)> {
    match (var.quantity, var.targets.as_slice()) {
        (Quantity::Voltage, [n]) => Some((system.node_index(n)?, 0)),
        (Quantity::Voltage, [a, b]) => Some((system.node_index(a)?, system.node_index(b)?)),
        (Quantity::Current, [b]) => Some((system.branch_index(b)?, 0)),
        _ => None,
    }
}

fn reduce(value: Complex64, transform: Transform) -> f64 {
    match transform {
        Transform::Real => value.re,
        Transform::Imag => value.im,
        Transform::Mag => value.norm(),
        Transform::Phase => value.arg(),
        Transform::Db => 20.0 * value.norm().log10(),
    }
}

/// Build output columns for `result`.
///
/// Variables naming an unknown node or branch are dropped with a warning, as
/// are real/imag/phase/dB transforms on real-valued (DC, OP, transient)
/// results.
pub fn collect_columns(
    system: &MnaSystem,
    result: &AnalysisResult,
    variables: &[Variable],
) -> ColumnData {
    let is_ac = matches!(result, AnalysisResult::Ac(_));

    let mut resolved = Vec::with_capacity(variables.len());
    for var in variables {
        let name = variable_name(var);
        if !is_ac && var.transform != Transform::Mag {
            warn!(variable = %name, "transform only defined for AC results, dropping");
            continue;
        }
        match resolve(system, var) {
            Some(idx) => resolved.push((name, var.transform, idx)),
            None => warn!(variable = %name, "unknown output variable, dropping"),
        }
    }

    let real_columns = |solutions: &[Vec<f64>]| -> Vec<(String, Vec<f64>)> {
        resolved
            .iter()
            .map(|(name, _, (p, m))| {
                let values = solutions
                    .iter()
                    .map(|x| template_value(x, *p) - template_value(x, *m))
                    .collect();
                (name.clone(), values)
            })
            .collect()
    };

    match result {
        AnalysisResult::Op(op) => ColumnData {
            x_name: "point".into(),
            x_values: vec![0.0],
            columns: real_columns(std::slice::from_ref(&op.solution)),
        },
        AnalysisResult::Dc(dc) => ColumnData {
            x_name: dc.sweep_name.clone(),
            x_values: dc.sweep_values.clone(),
            columns: real_columns(&dc.solutions),
        },
        AnalysisResult::Tran(tran) => ColumnData {
            x_name: "time".into(),
            x_values: tran.times.clone(),
            columns: real_columns(&tran.solutions),
        },
        AnalysisResult::Ac(ac) => ColumnData {
            x_name: "frequency".into(),
            x_values: ac.frequencies.clone(),
            columns: resolved
                .iter()
                .map(|(name, transform, (p, m))| {
                    let values = ac
                        .solutions
                        .iter()
                        .map(|x| reduce(template_value(x, *p) - template_value(x, *m), *transform))
                        .collect();
                    (name.clone(), values)
                })
                .collect(),
        },
    }
}

/// Write columns as CSV: a header row, then one row per x value.
///
/// ```csv
/// time,V(1),I(V1)
/// 0,5,-0.005
/// 0.001,4.9,-0.0049
/// ```
pub fn write_csv<W: Write>(writer: &mut W, data: &ColumnData) -> Result<()> {
    write!(writer, "{}", data.x_name)?;
    for (name, _) in &data.columns {
        write!(writer, ",{name}")?;
    }
    writeln!(writer)?;

    for (row, x) in data.x_values.iter().enumerate() {
        write!(writer, "{x}")?;
        for (_, values) in &data.columns {
            write!(writer, ",{}", values[row])?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write an operating point as `Variable,Value` rows.
pub fn write_op_csv<W: Write>(writer: &mut W, data: &ColumnData) -> Result<()> {
    writeln!(writer, "Variable,Value")?;
    for (name, values) in &data.columns {
        if let Some(v) = values.first() {
            writeln!(writer, "{name},{v}")?;
        }
    }
    Ok(())
}
