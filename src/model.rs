//! Device models.
//!
//! The only nonlinear device is the junction diode, following the ideal
//! exponential law `I = Is * (exp(V / (n * Vt)) - 1)` with `Vt = kT/q`.

/// Elementary charge (C).
pub const ELECTRON_CHARGE: f64 = 1.602176634e-19;
/// Boltzmann constant (J/K).
pub const BOLTZMANN_CONSTANT: f64 = 1.380649e-23;
/// Default ambient temperature (K).
pub const DEFAULT_TEMPERATURE: f64 = 300.0;

/// Named diode model shared by any number of diode instances.
#[derive(Debug, Clone, PartialEq)]
pub struct DiodeModel {
    pub name: String,
    /// Saturation current (A).
    pub is: f64,
    /// Emission coefficient.
    pub n: f64,
    /// Ambient temperature (K).
    pub temperature: f64,
}

/// Linearized diode at one bias point: a conductance `g` in parallel with a
/// current source `j`, so that `i ≈ g * v + j` near the bias voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Companion {
    pub g: f64,
    pub j: f64,
}

impl Companion {
    /// Difference between two linearizations, used to move an already
    /// stamped companion to a new bias point.
    pub fn delta(self, from: Companion) -> Companion {
        Companion {
            g: self.g - from.g,
            j: self.j - from.j,
        }
    }
}

impl DiodeModel {
    /// Build a model. When `n` is `None` the emission coefficient is derived
    /// from the temperature as `q / (40 * k * T)`, which pins `n * Vt` to 25 mV.
    pub fn new(name: impl Into<String>, is: f64, n: Option<f64>, temperature: f64) -> Self {
        let n = n.unwrap_or(ELECTRON_CHARGE / (40.0 * BOLTZMANN_CONSTANT * temperature));
        Self {
            name: name.into(),
            is,
            n,
            temperature,
        }
    }

    /// `n * kT / q`.
    pub fn n_vt(&self) -> f64 {
        self.n * BOLTZMANN_CONSTANT * self.temperature / ELECTRON_CHARGE
    }

    pub fn current(&self, voltage: f64) -> f64 {
        self.is * ((voltage / self.n_vt()).exp() - 1.0)
    }

    /// Inverse of [`DiodeModel::current`]; currents at or below `-is` have no
    /// finite voltage and saturate to `-inf`.
    pub fn voltage(&self, current: f64) -> f64 {
        self.n_vt() * (current / self.is + 1.0).ln()
    }

    /// Small-signal conductance dI/dV.
    pub fn conductance(&self, voltage: f64) -> f64 {
        let n_vt = self.n_vt();
        self.is / n_vt * (voltage / n_vt).exp()
    }

    pub fn companion(&self, voltage: f64) -> Companion {
        let g = self.conductance(voltage);
        let i = self.current(voltage);
        Companion { g, j: i - g * voltage }
    }

    /// Junction voltage above which the exponential is steep enough that
    /// Newton updates need damping.
    pub fn critical_voltage(&self) -> f64 {
        let n_vt = self.n_vt();
        n_vt * (n_vt / (std::f64::consts::SQRT_2 * self.is)).ln()
    }

    /// SPICE `pnjlim`: compress a forward-biased voltage update logarithmically.
    ///
    /// Returns the limited voltage and whether limiting was applied.
    pub fn limit_voltage(&self, v_new: f64, v_old: f64) -> (f64, bool) {
        let n_vt = self.n_vt();
        let v_crit = self.critical_voltage();
        if v_new > v_crit && (v_new - v_old).abs() > 2.0 * n_vt {
            let limited = if v_old > 0.0 {
                let arg = 1.0 + (v_new - v_old) / n_vt;
                if arg > 0.0 {
                    v_old + n_vt * arg.ln()
                } else {
                    v_crit
                }
            } else {
                n_vt * (v_new / n_vt).ln()
            };
            (limited, true)
        } else {
            (v_new, false)
        }
    }
}
