//! Circuit intermediate representation.
//!
//! The parser produces a `Netlist` containing components, device models,
//! analysis commands and output requests. The compiler consumes it to build
//! the MNA template; nothing downstream mutates it.

use crate::model::DiodeModel;
use tracing::warn;

/// Node identifier in the netlist (e.g., "0", "1", "GND", "out").
/// Ground is "0" or "GND"; the registry maps both to the reference node.
pub type NodeId = String;

/// A circuit component parsed from the netlist.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Resistor {
        name: String,
        nodes: (NodeId, NodeId),
        resistance: f64,
    },
    Capacitor {
        name: String,
        nodes: (NodeId, NodeId),
        capacitance: f64,
        initial_voltage: f64,
    },
    Inductor {
        name: String,
        nodes: (NodeId, NodeId),
        inductance: f64,
        initial_current: f64,
    },
    /// Voltage-controlled voltage source (E).
    Vcvs {
        name: String,
        nodes: (NodeId, NodeId),
        control: (NodeId, NodeId),
        gain: f64,
    },
    /// Current-controlled current source (F). `vsource` names the component
    /// whose branch current is sensed.
    Cccs {
        name: String,
        nodes: (NodeId, NodeId),
        vsource: String,
        gain: f64,
    },
    /// Voltage-controlled current source (G).
    Vccs {
        name: String,
        nodes: (NodeId, NodeId),
        control: (NodeId, NodeId),
        gain: f64,
    },
    /// Current-controlled voltage source (H).
    Ccvs {
        name: String,
        nodes: (NodeId, NodeId),
        vsource: String,
        gain: f64,
    },
    /// Independent voltage source. DC value, optional AC (magnitude,
    /// phase_degrees) and optional transient waveform.
    VSource {
        name: String,
        nodes: (NodeId, NodeId),
        dc: f64,
        ac: Option<(f64, f64)>,
        tran: Option<TransientFunc>,
    },
    /// Independent current source, flowing from the first node through the
    /// source into the second.
    ISource {
        name: String,
        nodes: (NodeId, NodeId),
        dc: f64,
        ac: Option<(f64, f64)>,
        tran: Option<TransientFunc>,
    },
    Diode {
        name: String,
        nodes: (NodeId, NodeId),
        model: String,
        initial_voltage: f64,
    },
}

impl Component {
    pub fn name(&self) -> &str {
        match self {
            Component::Resistor { name, .. }
            | Component::Capacitor { name, .. }
            | Component::Inductor { name, .. }
            | Component::Vcvs { name, .. }
            | Component::Cccs { name, .. }
            | Component::Vccs { name, .. }
            | Component::Ccvs { name, .. }
            | Component::VSource { name, .. }
            | Component::ISource { name, .. }
            | Component::Diode { name, .. } => name,
        }
    }

    pub fn nodes(&self) -> &(NodeId, NodeId) {
        match self {
            Component::Resistor { nodes, .. }
            | Component::Capacitor { nodes, .. }
            | Component::Inductor { nodes, .. }
            | Component::Vcvs { nodes, .. }
            | Component::Cccs { nodes, .. }
            | Component::Vccs { nodes, .. }
            | Component::Ccvs { nodes, .. }
            | Component::VSource { nodes, .. }
            | Component::ISource { nodes, .. }
            | Component::Diode { nodes, .. } => nodes,
        }
    }

    /// Control-port nodes for voltage-controlled sources.
    pub fn control_nodes(&self) -> Option<&(NodeId, NodeId)> {
        match self {
            Component::Vcvs { control, .. } | Component::Vccs { control, .. } => Some(control),
            _ => None,
        }
    }

    /// Whether this component adds a branch current unknown.
    pub fn owns_branch(&self) -> bool {
        matches!(
            self,
            Component::Capacitor { .. }
                | Component::Inductor { .. }
                | Component::Vcvs { .. }
                | Component::Ccvs { .. }
                | Component::VSource { .. }
                | Component::Diode { .. }
        )
    }
}

/// Time-domain waveform of an independent source.
///
/// A zero timing parameter means "use the analysis default" and is resolved
/// at evaluation time against the transient step and stop time.
#[derive(Debug, Clone, PartialEq)]
pub enum TransientFunc {
    /// SIN(VO VA FREQ TD THETA PHASE)
    Sin {
        vo: f64,
        va: f64,
        freq: f64,
        td: f64,
        theta: f64,
        /// Degrees.
        phase: f64,
    },
    /// PULSE(V1 V2 TD TR TF PW PER)
    Pulse {
        v1: f64,
        v2: f64,
        td: f64,
        tr: f64,
        tf: f64,
        pw: f64,
        per: f64,
    },
}

/// AC sweep type matching SPICE syntax.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcSweepType {
    /// Decade sweep: n_points is points per decade
    Dec,
    /// Octave sweep: n_points is points per octave
    Oct,
    /// Linear sweep: n_points is the number of intervals
    Lin,
}

/// Which kind of independent source a DC sweep drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepSourceKind {
    Voltage,
    Current,
}

/// An analysis command from the netlist.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// DC operating point (.OP)
    Op,
    /// DC sweep of one independent source (.DC)
    Dc {
        source_kind: SweepSourceKind,
        source: String,
        start: f64,
        stop: f64,
        increment: f64,
    },
    /// AC frequency sweep (.AC)
    Ac {
        sweep_type: AcSweepType,
        n_points: usize,
        f_start: f64,
        f_stop: f64,
    },
    /// Fixed-step transient (.TRAN)
    Tran { tstep: f64, tstop: f64, tstart: f64 },
}

impl Analysis {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            Analysis::Op => AnalysisKind::Op,
            Analysis::Dc { .. } => AnalysisKind::Dc,
            Analysis::Ac { .. } => AnalysisKind::Ac,
            Analysis::Tran { .. } => AnalysisKind::Tran,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Op,
    Dc,
    Ac,
    Tran,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Print,
    Plot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Voltage,
    Current,
}

/// How a (possibly complex) value is reduced to a real column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Real,
    Imag,
    /// Plain `V(...)`/`I(...)`: magnitude for AC, the value itself otherwise.
    Mag,
    Phase,
    Db,
}

/// One requested signal, e.g. `VDB(out)` or `V(a,b)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub quantity: Quantity,
    pub transform: Transform,
    /// One node, a node pair for a differential voltage, or one branch owner.
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRequest {
    pub kind: OutputKind,
    pub analysis: AnalysisKind,
    pub variables: Vec<Variable>,
}

/// A parsed circuit: components, models, analyses and output requests.
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    pub title: String,
    pub components: Vec<Component>,
    pub models: Vec<DiodeModel>,
    pub analyses: Vec<Analysis>,
    pub outputs: Vec<OutputRequest>,
}

impl Netlist {
    /// Append a component. A repeated name replaces the earlier definition
    /// in place, keeping its position in stamping order.
    pub fn add_component(&mut self, component: Component) {
        if let Some(existing) = self
            .components
            .iter_mut()
            .find(|c| c.name() == component.name())
        {
            warn!(name = component.name(), "duplicate component, replacing earlier definition");
            *existing = component;
        } else {
            self.components.push(component);
        }
    }

    pub fn add_model(&mut self, model: DiodeModel) {
        if let Some(existing) = self.models.iter_mut().find(|m| m.name == model.name) {
            warn!(name = %model.name, "duplicate model, replacing earlier definition");
            *existing = model;
        } else {
            self.models.push(model);
        }
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name() == name)
    }

    pub fn model(&self, name: &str) -> Option<&DiodeModel> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn has_diodes(&self) -> bool {
        self.components
            .iter()
            .any(|c| matches!(c, Component::Diode { .. }))
    }
}
