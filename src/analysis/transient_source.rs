//! Transient source function evaluation.
//!
//! Evaluates SIN and PULSE waveforms at a given time t. Timing parameters
//! left at zero take their defaults from the transient analysis: `1/tstop`
//! for the SIN frequency, `tstep` for PULSE edges and `tstop` for PULSE
//! width and period.

use crate::ir::TransientFunc;
use std::f64::consts::PI;

/// Analysis timing that unspecified waveform parameters default to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub tstep: f64,
    pub tstop: f64,
}

fn or_default(value: f64, default: f64) -> f64 {
    if value > 0.0 {
        value
    } else {
        default
    }
}

/// Evaluate a transient source function at time t.
pub fn evaluate(func: &TransientFunc, t: f64, timing: Timing) -> f64 {
    match func {
        TransientFunc::Sin {
            vo,
            va,
            freq,
            td,
            theta,
            phase,
        } => {
            let freq = or_default(*freq, 1.0 / timing.tstop);
            eval_sin(*vo, *va, freq, *td, *theta, *phase, t)
        }
        TransientFunc::Pulse {
            v1,
            v2,
            td,
            tr,
            tf,
            pw,
            per,
        } => eval_pulse(
            *v1,
            *v2,
            *td,
            or_default(*tr, timing.tstep),
            or_default(*tf, timing.tstep),
            or_default(*pw, timing.tstop),
            or_default(*per, timing.tstop),
            t,
        ),
    }
}

fn eval_sin(vo: f64, va: f64, freq: f64, td: f64, theta: f64, phase_deg: f64, t: f64) -> f64 {
    let phase = phase_deg.to_radians();
    if t <= td {
        return vo + va * phase.sin();
    }
    let dt = t - td;
    vo + va * (-theta * dt).exp() * (2.0 * PI * freq * dt + phase).sin()
}

#[allow(clippy::too_many_arguments)]
fn eval_pulse(v1: f64, v2: f64, td: f64, tr: f64, tf: f64, pw: f64, per: f64, t: f64) -> f64 {
    if t <= td {
        return v1;
    }
    let t_rel = (t - td) % per;
    if t_rel < tr {
        v1 + (v2 - v1) * t_rel / tr
    } else if t_rel <= tr + pw {
        v2
    } else if t_rel < tr + pw + tf {
        v2 + (v1 - v2) * (t_rel - tr - pw) / tf
    } else {
        v1
    }
}
