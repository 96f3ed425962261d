//! DC sweep analysis.
//!
//! Steps one independent source over `start..=stop` and re-solves the DC
//! template at each value. With diodes present every point runs
//! Newton-Raphson seeded from the previous point's solution, which follows
//! the sweep continuously instead of restarting from zero bias.

use super::{diode_seed, solve_point, DcResult};
use crate::compiler::MnaSystem;
use crate::error::{Result, VoltaicError};
use crate::ir::SweepSourceKind;
use crate::solver::newton::NewtonParams;
use crate::solver::LinearSolver;
use crate::stats::Stats;
use tracing::warn;

/// Sweep request resolved against a compiled system.
#[derive(Debug, Clone, Copy)]
pub struct DcSweep<'a> {
    pub source_kind: SweepSourceKind,
    pub source: &'a str,
    pub start: f64,
    pub stop: f64,
    pub increment: f64,
}

/// Relative slack that keeps `stop` in the sweep despite rounding.
const ENDPOINT_SLACK: f64 = 1e-9;

/// Sweep values `start, start + inc, ...` up to and including `stop`.
///
/// Values are computed as `start + k * inc` rather than by accumulation, and
/// a final value within `1e-9 * inc` past `stop` still counts as `stop`.
pub fn sweep_values(start: f64, stop: f64, increment: f64) -> Result<Vec<f64>> {
    if !increment.is_finite() || increment <= 0.0 {
        return Err(VoltaicError::Analysis(format!(
            "DC sweep increment must be positive, got {increment}"
        )));
    }
    if !(start.is_finite() && stop.is_finite()) {
        return Err(VoltaicError::Analysis(format!(
            "invalid DC sweep range {start}..{stop}"
        )));
    }
    let limit = stop + increment * ENDPOINT_SLACK;
    let mut values = Vec::new();
    let mut k = 0u64;
    loop {
        let v = start + k as f64 * increment;
        if v > limit {
            break;
        }
        values.push(v.min(stop));
        k += 1;
    }
    Ok(values)
}

/// Run a DC sweep.
///
/// A point whose solve fails is logged and dropped together with its sweep
/// value; the sweep always runs to completion.
pub fn run(
    system: &MnaSystem,
    sweep: &DcSweep<'_>,
    solver: &dyn LinearSolver,
    newton: &NewtonParams,
    mut stats: Option<&mut Stats>,
) -> Result<DcResult> {
    let _span = tracing::info_span!("dc_sweep", source = sweep.source).entered();

    let source = system.source(sweep.source).ok_or_else(|| {
        VoltaicError::Analysis(format!("DC sweep source '{}' not found", sweep.source))
    })?;
    if source.kind != sweep.source_kind {
        return Err(VoltaicError::Analysis(format!(
            "DC sweep source '{}' is not a {} source",
            sweep.source,
            match sweep.source_kind {
                SweepSourceKind::Voltage => "voltage",
                SweepSourceKind::Current => "current",
            }
        )));
    }

    let values = sweep_values(sweep.start, sweep.stop, sweep.increment)?;
    if values.is_empty() {
        warn!(
            start = sweep.start,
            stop = sweep.stop,
            "DC sweep stop lies below start; no points"
        );
    }

    let sweep_name = match source.kind {
        SweepSourceKind::Voltage => format!("voltage({})", source.name),
        SweepSourceKind::Current => format!("current({})", source.name),
    };

    let mut result = DcResult {
        sweep_name,
        sweep_values: Vec::with_capacity(values.len()),
        solutions: Vec::with_capacity(values.len()),
    };
    let mut x_prev = diode_seed(system);

    for value in values {
        let mut rhs = system.rhs.clone();
        source.restamp(&mut rhs, source.dc, value);
        match solve_point(
            system,
            &system.matrix,
            &rhs,
            solver,
            &x_prev,
            newton,
            value,
            stats.as_deref_mut(),
        ) {
            Ok(x) => {
                x_prev.clone_from(&x);
                result.sweep_values.push(value);
                result.solutions.push(x);
            }
            Err(e) => {
                warn!(value, error = %e, "DC sweep point failed, skipping");
                if let Some(ref mut s) = stats {
                    s.points_skipped += 1;
                }
            }
        }
    }

    Ok(result)
}
