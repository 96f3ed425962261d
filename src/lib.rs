//! Voltaic: a SPICE-style circuit simulator.
//!
//! A netlist is parsed into [`ir::Netlist`], compiled once into a
//! modified-nodal-analysis template ([`compiler::MnaSystem`]) and then solved
//! by the drivers in [`analysis`]: operating point, DC sweep, AC sweep and
//! Backward Euler transient.

pub mod analysis;
pub mod compiler;
pub mod error;
pub mod ir;
pub mod model;
pub mod output;
pub mod parser;
pub mod registry;
pub mod solver;
pub mod sparse;
pub mod stats;
