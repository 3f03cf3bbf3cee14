//! # gatesim
//!
//! A digital-logic circuit evaluation engine: a directed graph of gates and
//! wires goes in together with the current input stimuli, and a new
//! consistent signal state comes out, along with the value changes that
//! happened on a simulated timeline.
//!
//! ## Design Principles
//!
//! - **Closed gate set**: every gate type is a [`GateKind`] variant carrying
//!   its own internal state, dispatched through one exhaustive match.
//! - **Snapshot in, snapshot out**: [`Simulator::evaluate`] never mutates the
//!   caller's [`Circuit`]; it returns a new one.
//! - **Bounded settling**: feedback is resolved by iterating to a fixed point
//!   under an iteration cap. Running out of budget is flagged, not fatal.
//! - **DELAY breaks loops**: a DELAY samples once per evaluation and holds
//!   while the circuit settles, which turns NOT rings into oscillators.
//! - **Registers move together**: D flip-flops and counters hold while the
//!   circuit settles, then every clock edge is applied at once.
//!
//! ## Features
//!
//! - `parallel` - Derive truth tables on multiple threads using rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use gatesim::{Circuit, Endpoint, GateKind, GateType, Position, Simulator};
//!
//! // A three-inverter ring closed through a one-sample DELAY
//! let mut circuit = Circuit::new();
//! let nots: Vec<_> = (0..3)
//!     .map(|_| circuit.add_gate(GateType::Not, Position::default()))
//!     .collect();
//! let delay = circuit.add_gate_with(GateKind::delay(1), Position::default());
//! circuit.add_wire(Endpoint::primary(nots[0]), Endpoint::new(nots[1], 0)).unwrap();
//! circuit.add_wire(Endpoint::primary(nots[1]), Endpoint::new(nots[2], 0)).unwrap();
//! circuit.add_wire(Endpoint::primary(nots[2]), Endpoint::new(delay, 0)).unwrap();
//! circuit.add_wire(Endpoint::primary(delay), Endpoint::new(nots[0], 0)).unwrap();
//!
//! let mut sim = Simulator::default();
//! sim.start();
//! let mut seen = Vec::new();
//! for _ in 0..6 {
//!     let result = sim.evaluate(&circuit);
//!     circuit = result.circuit;
//!     seen.push(circuit.output_value(delay, 0).unwrap());
//! }
//! assert!(seen.contains(&true) && seen.contains(&false));
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use gatesim::{EngineConfig, Simulator};
//!
//! let config = EngineConfig::from_yaml_file("engine.yaml")?;
//! let mut sim = Simulator::new(config);
//! ```

pub mod types;
pub mod event;
pub mod gate;
pub mod gates;
pub mod wire;
pub mod validator;
pub mod circuit;
pub mod executor;
pub mod capture;
pub mod engine;
pub mod config;
pub mod registry;
pub mod truth_table;
pub mod stats;

// Re-export commonly used types
pub use types::{GateId, SimTime, SlotIndex, WireId, PRIMARY_OUTPUT, SECONDARY_OUTPUT};
pub use event::TimingEvent;
pub use gate::{
    ClockState, CounterState, CustomGate, DFlipFlopState, DelayLine, Gate, GateKind, GateType,
    Position, SrLatchState,
};
pub use wire::{Endpoint, Wire};
pub use validator::{ConnectPolicy, ConnectionError, ConnectionWarning};
pub use circuit::{Circuit, CircuitError, CircuitResult, WireAdded};
pub use executor::{EvalError, EventScheduler, LevelScheduler, Scheduler, Settlement, Strategy};
pub use capture::TimingCapture;
pub use engine::{EngineStats, Evaluation, Outcome, Simulator};
pub use config::{ConfigError, EngineConfig, EngineConfigBuilder};
pub use registry::{create_default_library, CustomGateLibrary, LibraryError};
pub use truth_table::{TruthTable, TruthTableError};
pub use stats::SessionStats;

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging. `RUST_LOG`
/// takes precedence over `level` when set.
///
/// # Example
///
/// ```rust,ignore
/// gatesim::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
