//! MNA (Modified Nodal Analysis) compiler.
//!
//! Converts a `Netlist` into the linear MNA template shared by every analysis.
//!
//! # MNA System
//!
//! For n nodes (ground included at index 0) and m branch unknowns the
//! template is (n+m) x (n+m):
//!
//! ```text
//! [A] * [x] = [b]
//! ```
//!
//! where x = [node_voltages; branch_currents]. Row and column 0 belong to
//! ground and are shed before every solve, so solution vectors hold template
//! index i at position i-1.
//!
//! # Stamps
//!
//! - **Resistor** R between nodes i,j: A(i,i) += 1/R, A(j,j) += 1/R, A(i,j) -= 1/R, A(j,i) -= 1/R
//! - **Capacitor** between i,j (branch k): A(i,k) += 1, A(j,k) -= 1, A(k,k) = -1.
//!   At DC the branch row reads -I_k = 0, an open circuit.
//! - **Inductor** between i,j (branch k): A(i,k) += 1, A(j,k) -= 1, A(k,i) += 1,
//!   A(k,j) -= 1. At DC V_i - V_j = 0, a short circuit.
//! - **VCVS** (branch k, control cp,cm): voltage-source coupling plus
//!   A(k,cp) -= gain, A(k,cm) += gain
//! - **CCCS** (control branch c): A(i,c) += gain, A(j,c) -= gain
//! - **VCCS**: A(i,cp) += gain, A(i,cm) -= gain, A(j,cp) -= gain, A(j,cm) += gain
//! - **CCVS** (branch k, control branch c): voltage-source coupling plus A(k,c) -= gain
//! - **Voltage source** (branch k): coupling +1/-1 both ways, b(k) = V_dc
//! - **Current source** from i to j: b(i) -= I_dc, b(j) += I_dc
//! - **Diode** (branch k): companion (g0, j0) linearized at V=0. Resistor
//!   pattern with g0, b(i) -= j0, b(j) += j0, and the branch row
//!   A(k,k) = 1, A(k,i) = -g0, A(k,j) = g0, b(k) = j0 so that I_k reports
//!   the diode current.

use crate::error::{Result, VoltaicError};
use crate::ir::{Component, Netlist, SweepSourceKind, TransientFunc};
use crate::model::{Companion, DiodeModel};
use crate::registry::{BranchRegistry, NodeRegistry};
use crate::sparse::CsrMatrix;
use num_complex::Complex64;
use tracing::debug;

/// Capacitor or inductor with resolved template indices.
#[derive(Debug, Clone)]
pub struct ReactiveEntry {
    pub name: String,
    pub nplus: usize,
    pub nminus: usize,
    pub branch: usize,
    /// Capacitance (F) or inductance (H).
    pub value: f64,
    /// Initial voltage (capacitor) or initial current (inductor).
    pub initial: f64,
}

/// Diode with resolved indices and the linearization baked into the template.
#[derive(Debug, Clone)]
pub struct DiodeEntry {
    pub name: String,
    pub nplus: usize,
    pub nminus: usize,
    pub branch: usize,
    pub model: DiodeModel,
    pub initial_voltage: f64,
    /// Companion stamped into the template, i.e. the model at V=0.
    pub base: Companion,
}

/// Independent source with resolved indices.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub name: String,
    pub kind: SweepSourceKind,
    pub nplus: usize,
    pub nminus: usize,
    /// Present for voltage sources only.
    pub branch: Option<usize>,
    pub dc: f64,
    pub tran: Option<TransientFunc>,
}

impl SourceEntry {
    /// Overwrite this source's excitation in `rhs`, replacing `old` with `new`.
    ///
    /// Voltage sources own their branch entry outright. Current sources share
    /// node entries with other sources, so only the difference is applied.
    pub fn restamp(&self, rhs: &mut [f64], old: f64, new: f64) {
        match self.branch {
            Some(k) => rhs[k] = new,
            None => {
                let delta = new - old;
                rhs[self.nplus] -= delta;
                rhs[self.nminus] += delta;
            }
        }
    }
}

/// The compiled MNA template, ready for analysis.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    /// Linear template, ground row/column included.
    pub matrix: CsrMatrix<f64>,
    /// DC excitation vector.
    pub rhs: Vec<f64>,
    /// AC excitation vector (complex magnitude+phase from AC sources).
    pub ac_rhs: Vec<Complex64>,
    /// Template dimension, ground included.
    pub size: usize,
    pub nodes: NodeRegistry,
    pub branches: BranchRegistry,
    pub capacitors: Vec<ReactiveEntry>,
    pub inductors: Vec<ReactiveEntry>,
    pub diodes: Vec<DiodeEntry>,
    pub sources: Vec<SourceEntry>,
}

impl MnaSystem {
    /// Template index of a node.
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.index(name)
    }

    /// Template index of the branch owned by `name`.
    pub fn branch_index(&self, name: &str) -> Option<usize> {
        self.branches.index(name).map(|k| k + self.nodes.len())
    }

    pub fn source(&self, name: &str) -> Option<&SourceEntry> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn has_diodes(&self) -> bool {
        !self.diodes.is_empty()
    }

    /// Dimension of a ground-shed solution vector.
    pub fn reduced_size(&self) -> usize {
        self.size.saturating_sub(1)
    }
}

/// Convert AC (magnitude, phase_degrees) to Complex64.
pub fn ac_to_complex(mag: f64, phase_deg: f64) -> Complex64 {
    Complex64::from_polar(mag, phase_deg.to_radians())
}

/// Per-component template indices, kept beside the netlist rather than in it.
#[derive(Debug, Clone, Copy)]
struct Resolved {
    nplus: usize,
    nminus: usize,
    control: Option<(usize, usize)>,
    branch: Option<usize>,
    control_branch: Option<usize>,
}

/// Four-term conductance pattern shared by resistors, diodes and AC susceptances.
pub fn stamp_conductance<T>(matrix: &mut CsrMatrix<T>, i: usize, j: usize, g: T)
where
    T: Copy + Default + std::ops::AddAssign + std::ops::Neg<Output = T>,
{
    matrix.add_at(i, i, g);
    matrix.add_at(j, j, g);
    matrix.add_at(i, j, -g);
    matrix.add_at(j, i, -g);
}

/// Add a diode companion (or a change of companion) at its three rows.
pub fn stamp_diode(matrix: &mut CsrMatrix<f64>, rhs: &mut [f64], d: &DiodeEntry, c: Companion) {
    stamp_conductance(matrix, d.nplus, d.nminus, c.g);
    rhs[d.nplus] -= c.j;
    rhs[d.nminus] += c.j;
    matrix.add_at(d.branch, d.nplus, -c.g);
    matrix.add_at(d.branch, d.nminus, c.g);
    rhs[d.branch] += c.j;
}

/// Compile a Netlist into the MNA template.
///
/// 1. Intern every node, then every branch owner.
/// 2. Offset branch indices by the node count and resolve each component's
///    terminals into a side table.
/// 3. Stamp each component, including zero placeholders for every position
///    an analysis writes later.
/// 4. Assemble the CSR template from the accumulated triplets.
pub fn compile(netlist: &Netlist) -> Result<MnaSystem> {
    // Pass 1: interning.
    let mut nodes = NodeRegistry::new();
    let mut branches = BranchRegistry::new();
    for component in &netlist.components {
        let (p, m) = component.nodes();
        nodes.add(p);
        nodes.add(m);
        if let Some((cp, cm)) = component.control_nodes() {
            nodes.add(cp);
            nodes.add(cm);
        }
    }
    for component in &netlist.components {
        if component.owns_branch() {
            branches.add(component.name());
        }
    }

    let n_nodes = nodes.len();
    let size = n_nodes + branches.len();

    // Pass 2: side table of resolved indices.
    let node = |name: &str| -> Result<usize> {
        nodes
            .index(name)
            .ok_or_else(|| VoltaicError::Compile(format!("unknown node '{name}'")))
    };
    let mut resolved = Vec::with_capacity(netlist.components.len());
    for component in &netlist.components {
        let (p, m) = component.nodes();
        let control = match component.control_nodes() {
            Some((cp, cm)) => Some((node(cp)?, node(cm)?)),
            None => None,
        };
        let branch = if component.owns_branch() {
            branches.index(component.name()).map(|k| k + n_nodes)
        } else {
            None
        };
        let control_branch = match component {
            Component::Cccs { name, vsource, .. } | Component::Ccvs { name, vsource, .. } => {
                let k = branches.index(vsource).ok_or_else(|| {
                    VoltaicError::Compile(format!(
                        "{name} is controlled by '{vsource}', which has no branch current"
                    ))
                })?;
                Some(k + n_nodes)
            }
            _ => None,
        };
        resolved.push(Resolved {
            nplus: node(p)?,
            nminus: node(m)?,
            control,
            branch,
            control_branch,
        });
    }

    // Pass 3: stamping.
    let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
    let mut rhs = vec![0.0; size];
    let mut ac_rhs = vec![Complex64::new(0.0, 0.0); size];
    let mut capacitors = Vec::new();
    let mut inductors = Vec::new();
    let mut diodes = Vec::new();
    let mut sources = Vec::new();

    let conductance = |t: &mut Vec<(usize, usize, f64)>, i: usize, j: usize, g: f64| {
        t.push((i, i, g));
        t.push((j, j, g));
        t.push((i, j, -g));
        t.push((j, i, -g));
    };
    let coupling = |t: &mut Vec<(usize, usize, f64)>, i: usize, j: usize, k: usize| {
        t.push((i, k, 1.0));
        t.push((k, i, 1.0));
        t.push((j, k, -1.0));
        t.push((k, j, -1.0));
    };

    for (component, r) in netlist.components.iter().zip(&resolved) {
        let (i, j) = (r.nplus, r.nminus);
        let branch = || {
            r.branch.ok_or_else(|| {
                VoltaicError::Compile(format!("{} has no branch index", component.name()))
            })
        };
        match component {
            Component::Resistor {
                name, resistance, ..
            } => {
                if *resistance == 0.0 {
                    return Err(VoltaicError::Compile(format!(
                        "Resistor {name} has zero resistance"
                    )));
                }
                conductance(&mut triplets, i, j, 1.0 / resistance);
            }

            Component::Capacitor {
                name,
                capacitance,
                initial_voltage,
                ..
            } => {
                if *capacitance < 0.0 {
                    return Err(VoltaicError::Compile(format!(
                        "Capacitor {name} has negative capacitance"
                    )));
                }
                let k = branch()?;
                triplets.push((i, k, 1.0));
                triplets.push((j, k, -1.0));
                triplets.push((k, k, -1.0));
                // Filled by the transient companion and the AC susceptance.
                triplets.push((k, i, 0.0));
                triplets.push((k, j, 0.0));
                capacitors.push(ReactiveEntry {
                    name: name.clone(),
                    nplus: i,
                    nminus: j,
                    branch: k,
                    value: *capacitance,
                    initial: *initial_voltage,
                });
            }

            Component::Inductor {
                name,
                inductance,
                initial_current,
                ..
            } => {
                let k = branch()?;
                coupling(&mut triplets, i, j, k);
                triplets.push((k, k, 0.0));
                inductors.push(ReactiveEntry {
                    name: name.clone(),
                    nplus: i,
                    nminus: j,
                    branch: k,
                    value: *inductance,
                    initial: *initial_current,
                });
            }

            Component::Vcvs { gain, .. } => {
                let k = branch()?;
                coupling(&mut triplets, i, j, k);
                if let Some((cp, cm)) = r.control {
                    triplets.push((k, cp, -gain));
                    triplets.push((k, cm, *gain));
                }
            }

            Component::Cccs { gain, .. } => {
                if let Some(c) = r.control_branch {
                    triplets.push((i, c, *gain));
                    triplets.push((j, c, -gain));
                }
            }

            Component::Vccs { gain, .. } => {
                if let Some((cp, cm)) = r.control {
                    triplets.push((i, cp, *gain));
                    triplets.push((i, cm, -gain));
                    triplets.push((j, cp, -gain));
                    triplets.push((j, cm, *gain));
                }
            }

            Component::Ccvs { gain, .. } => {
                let k = branch()?;
                coupling(&mut triplets, i, j, k);
                if let Some(c) = r.control_branch {
                    triplets.push((k, c, -gain));
                }
            }

            Component::VSource {
                name, dc, ac, tran, ..
            } => {
                let k = branch()?;
                coupling(&mut triplets, i, j, k);
                rhs[k] = *dc;
                if let Some((mag, phase_deg)) = ac {
                    ac_rhs[k] = ac_to_complex(*mag, *phase_deg);
                }
                sources.push(SourceEntry {
                    name: name.clone(),
                    kind: SweepSourceKind::Voltage,
                    nplus: i,
                    nminus: j,
                    branch: Some(k),
                    dc: *dc,
                    tran: tran.clone(),
                });
            }

            Component::ISource {
                name, dc, ac, tran, ..
            } => {
                rhs[i] -= dc;
                rhs[j] += dc;
                if let Some((mag, phase_deg)) = ac {
                    let phasor = ac_to_complex(*mag, *phase_deg);
                    ac_rhs[i] -= phasor;
                    ac_rhs[j] += phasor;
                }
                sources.push(SourceEntry {
                    name: name.clone(),
                    kind: SweepSourceKind::Current,
                    nplus: i,
                    nminus: j,
                    branch: None,
                    dc: *dc,
                    tran: tran.clone(),
                });
            }

            Component::Diode {
                name,
                model,
                initial_voltage,
                ..
            } => {
                let diode_model = netlist.model(model).ok_or_else(|| {
                    VoltaicError::Compile(format!(
                        "Diode {name} references undefined model '{model}'"
                    ))
                })?;
                let k = branch()?;
                let base = diode_model.companion(0.0);
                conductance(&mut triplets, i, j, base.g);
                rhs[i] -= base.j;
                rhs[j] += base.j;
                triplets.push((k, k, 1.0));
                triplets.push((k, i, -base.g));
                triplets.push((k, j, base.g));
                rhs[k] += base.j;
                diodes.push(DiodeEntry {
                    name: name.clone(),
                    nplus: i,
                    nminus: j,
                    branch: k,
                    model: diode_model.clone(),
                    initial_voltage: *initial_voltage,
                    base,
                });
            }
        }
    }

    // Pass 4: assemble.
    let matrix = CsrMatrix::from_triplets(size, size, &triplets);
    debug!(
        nodes = n_nodes,
        branches = branches.len(),
        nnz = matrix.nnz(),
        "compiled MNA template"
    );

    Ok(MnaSystem {
        matrix,
        rhs,
        ac_rhs,
        size,
        nodes,
        branches,
        capacitors,
        inductors,
        diodes,
        sources,
    })
}
