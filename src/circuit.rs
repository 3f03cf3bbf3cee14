//! Circuits and the editing API.
//!
//! A [`Circuit`] owns a gate collection and a wire collection. Every edit
//! keeps the structural invariants intact:
//!
//! - every wire endpoint references an existing gate and an in-range slot
//! - every input slot is driven by at most one wire
//! - removing a gate removes every wire touching it
//!
//! Circuits round-trip through JSON and YAML with all internal state needed
//! to resume simulation.
//!
//! # Example
//!
//! ```
//! use gatesim::circuit::Circuit;
//! use gatesim::gate::{GateType, Position};
//! use gatesim::wire::Endpoint;
//!
//! let mut circuit = Circuit::new();
//! let a = circuit.add_gate(GateType::Input, Position::new(0.0, 0.0));
//! let not = circuit.add_gate(GateType::Not, Position::new(50.0, 0.0));
//! circuit.add_wire(Endpoint::primary(a), Endpoint::new(not, 0)).unwrap();
//!
//! assert_eq!(circuit.gate_count(), 2);
//! assert_eq!(circuit.wire_count(), 1);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gate::{Gate, GateKind, GateType, Position, MAX_COUNTER_BITS, MAX_DELAY_CAPACITY};
use crate::types::{GateId, SlotIndex, WireId};
use crate::validator::{self, ConnectPolicy, ConnectionError, ConnectionWarning};
use crate::wire::{Endpoint, Wire};

/// Deepest custom-gate nesting accepted on load and during evaluation.
pub const MAX_NESTING_DEPTH: usize = 16;

/// Errors raised by editing operations and by loading circuits.
#[derive(Error, Debug)]
pub enum CircuitError {
    #[error("gate {0} does not exist")]
    UnknownGate(GateId),

    #[error("wire {0} does not exist")]
    UnknownWire(WireId),

    #[error("gate {gate} is {actual}, expected {expected}")]
    WrongGateType {
        gate: GateId,
        expected: GateType,
        actual: GateType,
    },

    #[error("clock frequency must be finite and positive, got {0}")]
    InvalidFrequency(f64),

    #[error("delay capacity must be within 1..={}", MAX_DELAY_CAPACITY)]
    InvalidCapacity,

    #[error("connection rejected: {0}")]
    Connection(#[from] ConnectionError),

    #[error("malformed circuit: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for circuit operations.
pub type CircuitResult<T> = Result<T, CircuitError>;

/// The result of committing a wire.
#[derive(Clone, Debug, PartialEq)]
pub struct WireAdded {
    /// The new wire's id
    pub id: WireId,
    /// Wire removed to make room (only under [`ConnectPolicy::Replace`])
    pub replaced: Option<Wire>,
    /// Non-fatal findings, e.g. a combinational loop
    pub warnings: Vec<ConnectionWarning>,
}

/// A gate collection plus a wire collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    #[serde(default)]
    gates: BTreeMap<GateId, Gate>,
    #[serde(default)]
    wires: BTreeMap<WireId, Wire>,
    #[serde(default)]
    next_gate_id: GateId,
    #[serde(default)]
    next_wire_id: WireId,
}

impl Circuit {
    /// Creates an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn gate(&self, id: GateId) -> Option<&Gate> {
        self.gates.get(&id)
    }

    pub(crate) fn gate_mut(&mut self, id: GateId) -> Option<&mut Gate> {
        self.gates.get_mut(&id)
    }

    /// Gates in ascending id order.
    pub fn gates(&self) -> impl Iterator<Item = &Gate> {
        self.gates.values()
    }

    pub(crate) fn gates_mut(&mut self) -> impl Iterator<Item = &mut Gate> {
        self.gates.values_mut()
    }

    pub fn gate_ids(&self) -> impl Iterator<Item = GateId> + '_ {
        self.gates.keys().copied()
    }

    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.get(&id)
    }

    /// Wires in ascending id order.
    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.wires.values()
    }

    pub(crate) fn wires_mut(&mut self) -> impl Iterator<Item = &mut Wire> {
        self.wires.values_mut()
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// The wire driving input slot `to`, if any.
    pub fn wire_into(&self, to: Endpoint) -> Option<&Wire> {
        self.wires.values().find(|wire| wire.to == to)
    }

    /// Wires leaving any output slot of `gate`.
    pub fn wires_from(&self, gate: GateId) -> impl Iterator<Item = &Wire> {
        self.wires.values().filter(move |wire| wire.from.gate == gate)
    }

    /// Ids of all gates of type `ty`, ascending.
    pub fn gate_ids_of(&self, ty: GateType) -> Vec<GateId> {
        self.gates
            .values()
            .filter(|gate| gate.gate_type() == ty)
            .map(|gate| gate.id)
            .collect()
    }

    /// Last evaluated value of output `slot` on gate `id`.
    pub fn output_value(&self, id: GateId, slot: SlotIndex) -> Option<bool> {
        self.gates.get(&id).and_then(|gate| gate.output(slot))
    }

    /// Value currently flowing into input slot `to`: the driving output's
    /// last value, or false when unconnected.
    pub fn resolve_input(&self, to: Endpoint) -> bool {
        self.wire_into(to)
            .and_then(|wire| self.output_value(wire.from.gate, wire.from.slot))
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Adds a gate of type `ty` with default internal state.
    pub fn add_gate(&mut self, ty: GateType, position: Position) -> GateId {
        self.add_gate_with(GateKind::with_defaults(ty), position)
    }

    /// Adds a gate with explicitly configured state.
    pub fn add_gate_with(&mut self, kind: GateKind, position: Position) -> GateId {
        let id = self.allocate_gate_id();
        self.gates.insert(id, Gate::new(id, kind, position));
        id
    }

    /// Adds a gate carrying a display label.
    pub fn add_labeled(&mut self, kind: GateKind, label: impl Into<String>) -> GateId {
        let id = self.allocate_gate_id();
        self.gates
            .insert(id, Gate::new(id, kind, Position::default()).with_label(label));
        id
    }

    /// Removes a gate and every wire touching it.
    pub fn remove_gate(&mut self, id: GateId) -> CircuitResult<Gate> {
        let gate = self.gates.remove(&id).ok_or(CircuitError::UnknownGate(id))?;

        let touching: Vec<Wire> = self
            .wires
            .values()
            .filter(|wire| wire.touches(id))
            .cloned()
            .collect();
        for wire in touching {
            self.wires.remove(&wire.id);
            self.mark_dirty(wire.to.gate);
        }

        tracing::debug!(gate = id, kind = %gate.gate_type(), "Removed gate");
        Ok(gate)
    }

    /// Connects `from` to `to`, rejecting an occupied destination slot.
    pub fn add_wire(&mut self, from: Endpoint, to: Endpoint) -> Result<WireAdded, ConnectionError> {
        self.connect_with(from, to, ConnectPolicy::Reject)
    }

    /// Connects `from` to `to` under the given occupancy policy.
    pub fn connect_with(
        &mut self,
        from: Endpoint,
        to: Endpoint,
        policy: ConnectPolicy,
    ) -> Result<WireAdded, ConnectionError> {
        let validation = validator::validate(self, from, to, policy)?;

        let replaced = validation
            .replaces
            .and_then(|wire_id| self.wires.remove(&wire_id));

        let id = self.allocate_wire_id();
        self.wires.insert(id, Wire::new(id, from, to));
        self.mark_dirty(to.gate);

        Ok(WireAdded {
            id,
            replaced,
            warnings: validation.warnings,
        })
    }

    /// Removes a wire.
    pub fn remove_wire(&mut self, id: WireId) -> CircuitResult<Wire> {
        let wire = self.wires.remove(&id).ok_or(CircuitError::UnknownWire(id))?;
        self.mark_dirty(wire.to.gate);
        Ok(wire)
    }

    /// Sets the externally driven value of an INPUT gate.
    pub fn set_input_value(&mut self, id: GateId, value: bool) -> CircuitResult<()> {
        let gate = self.expect_gate(id, GateType::Input)?;
        if let GateKind::Input { value: current } = &mut gate.kind {
            *current = value;
        }
        gate.dirty = true;
        Ok(())
    }

    /// Flips an INPUT gate and returns its new value.
    pub fn toggle_input(&mut self, id: GateId) -> CircuitResult<bool> {
        let gate = self.expect_gate(id, GateType::Input)?;
        let mut toggled = false;
        if let GateKind::Input { value } = &mut gate.kind {
            *value = !*value;
            toggled = *value;
        }
        gate.dirty = true;
        Ok(toggled)
    }

    /// Changes a CLOCK's frequency. The period restarts on the next
    /// evaluation so the phase does not jump mid-period.
    pub fn set_clock_frequency(&mut self, id: GateId, hz: f64) -> CircuitResult<()> {
        if !hz.is_finite() || hz <= 0.0 {
            return Err(CircuitError::InvalidFrequency(hz));
        }
        let gate = self.expect_gate(id, GateType::Clock)?;
        if let GateKind::Clock(clock) = &mut gate.kind {
            clock.frequency_hz = hz;
            clock.start_time = None;
        }
        gate.dirty = true;
        Ok(())
    }

    /// Starts or stops a CLOCK. A stopped clock holds its last level; a
    /// restarted one begins a fresh period.
    pub fn set_clock_running(&mut self, id: GateId, running: bool) -> CircuitResult<()> {
        let gate = self.expect_gate(id, GateType::Clock)?;
        if let GateKind::Clock(clock) = &mut gate.kind {
            if running && !clock.running {
                clock.start_time = None;
            }
            clock.running = running;
        }
        gate.dirty = true;
        Ok(())
    }

    /// Changes a DELAY's history length, keeping the newest samples.
    pub fn set_delay_capacity(&mut self, id: GateId, capacity: usize) -> CircuitResult<()> {
        if !(1..=MAX_DELAY_CAPACITY).contains(&capacity) {
            return Err(CircuitError::InvalidCapacity);
        }
        let gate = self.expect_gate(id, GateType::Delay)?;
        if let GateKind::Delay(line) = &mut gate.kind {
            line.set_capacity(capacity);
        }
        gate.dirty = true;
        Ok(())
    }

    /// Restores a gate's type-default internal state.
    pub fn reset_gate(&mut self, id: GateId) -> CircuitResult<()> {
        let gate = self.gates.get_mut(&id).ok_or(CircuitError::UnknownGate(id))?;
        gate.kind.reset();
        gate.outputs = gate.kind.resting_outputs();
        gate.dirty = true;
        Ok(())
    }

    /// Resets every gate, recursively.
    pub fn reset_all(&mut self) {
        for gate in self.gates.values_mut() {
            gate.kind.reset();
            gate.outputs = gate.kind.resting_outputs();
            gate.inputs.iter_mut().for_each(|v| *v = false);
            gate.dirty = true;
        }
        for wire in self.wires.values_mut() {
            wire.is_active = false;
        }
    }

    /// Sets a gate's display label.
    pub fn set_label(&mut self, id: GateId, label: impl Into<String>) -> CircuitResult<()> {
        let gate = self.gates.get_mut(&id).ok_or(CircuitError::UnknownGate(id))?;
        gate.label = Some(label.into());
        Ok(())
    }

    /// Moves a gate on the canvas.
    pub fn move_gate(&mut self, id: GateId, position: Position) -> CircuitResult<()> {
        let gate = self.gates.get_mut(&id).ok_or(CircuitError::UnknownGate(id))?;
        gate.position = position;
        Ok(())
    }

    fn expect_gate(&mut self, id: GateId, expected: GateType) -> CircuitResult<&mut Gate> {
        let gate = self.gates.get_mut(&id).ok_or(CircuitError::UnknownGate(id))?;
        let actual = gate.gate_type();
        if actual != expected {
            return Err(CircuitError::WrongGateType {
                gate: id,
                expected,
                actual,
            });
        }
        Ok(gate)
    }

    fn mark_dirty(&mut self, id: GateId) {
        if let Some(gate) = self.gates.get_mut(&id) {
            gate.dirty = true;
        }
    }

    fn allocate_gate_id(&mut self) -> GateId {
        let floor = self.gates.keys().next_back().map_or(0, |max| max + 1);
        let id = self.next_gate_id.max(floor);
        self.next_gate_id = id + 1;
        id
    }

    fn allocate_wire_id(&mut self) -> WireId {
        let floor = self.wires.keys().next_back().map_or(0, |max| max + 1);
        let id = self.next_wire_id.max(floor);
        self.next_wire_id = id + 1;
        id
    }

    // ------------------------------------------------------------------
    // Structural validation
    // ------------------------------------------------------------------

    /// Checks the structural invariants, recursing into custom gates.
    pub fn validate_structure(&self) -> CircuitResult<()> {
        self.validate_at_depth(0)
    }

    fn validate_at_depth(&self, depth: usize) -> CircuitResult<()> {
        if depth > MAX_NESTING_DEPTH {
            return Err(CircuitError::Malformed(format!(
                "custom gates nested deeper than {}",
                MAX_NESTING_DEPTH
            )));
        }

        for (&key, gate) in &self.gates {
            if key != gate.id {
                return Err(CircuitError::Malformed(format!(
                    "gate stored under id {} claims id {}",
                    key, gate.id
                )));
            }
            match &gate.kind {
                GateKind::Custom(custom) => custom.circuit.validate_at_depth(depth + 1)?,
                GateKind::BinaryCounter(counter)
                    if !(1..=MAX_COUNTER_BITS).contains(&counter.bit_count) =>
                {
                    return Err(CircuitError::Malformed(format!(
                        "counter {} has {} bits, outside 1..={}",
                        gate.id, counter.bit_count, MAX_COUNTER_BITS
                    )));
                }
                GateKind::Delay(line) if line.capacity() > MAX_DELAY_CAPACITY => {
                    return Err(CircuitError::Malformed(format!(
                        "delay {} has capacity {}, above {}",
                        gate.id,
                        line.capacity(),
                        MAX_DELAY_CAPACITY
                    )));
                }
                _ => {}
            }
        }

        let mut driven: HashSet<Endpoint> = HashSet::new();
        for (&key, wire) in &self.wires {
            if key != wire.id {
                return Err(CircuitError::Malformed(format!(
                    "wire stored under id {} claims id {}",
                    key, wire.id
                )));
            }
            let source = self.gates.get(&wire.from.gate).ok_or_else(|| {
                CircuitError::Malformed(format!(
                    "wire {} starts at missing gate {}",
                    wire.id, wire.from.gate
                ))
            })?;
            let dest = self.gates.get(&wire.to.gate).ok_or_else(|| {
                CircuitError::Malformed(format!(
                    "wire {} ends at missing gate {}",
                    wire.id, wire.to.gate
                ))
            })?;
            if wire.from.slot >= source.kind.output_count() {
                return Err(CircuitError::Malformed(format!(
                    "wire {} leaves output slot {} of gate {}, which has {}",
                    wire.id,
                    wire.from.slot,
                    source.id,
                    source.kind.output_count()
                )));
            }
            if wire.to.slot >= dest.kind.input_count() {
                return Err(CircuitError::Malformed(format!(
                    "wire {} enters input slot {} of gate {}, which has {}",
                    wire.id,
                    wire.to.slot,
                    dest.id,
                    dest.kind.input_count()
                )));
            }
            if !driven.insert(wire.to) {
                return Err(CircuitError::Malformed(format!(
                    "input slot {} of gate {} has more than one driver",
                    wire.to.slot, wire.to.gate
                )));
            }
        }

        Ok(())
    }

    /// Normalizes data loaded from storage: cached vectors sized to arity,
    /// delay histories at capacity, counter values below their modulus, id
    /// counters past the largest ids.
    fn normalize(&mut self) {
        for gate in self.gates.values_mut() {
            match &mut gate.kind {
                GateKind::Delay(line) => line.normalize(),
                GateKind::BinaryCounter(counter) => counter.normalize(),
                GateKind::Custom(custom) => custom.circuit.normalize(),
                _ => {}
            }
            gate.fit_arity();
        }
        let gate_floor = self.gates.keys().next_back().map_or(0, |max| max + 1);
        let wire_floor = self.wires.keys().next_back().map_or(0, |max| max + 1);
        self.next_gate_id = self.next_gate_id.max(gate_floor);
        self.next_wire_id = self.next_wire_id.max(wire_floor);
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Loads a circuit from a JSON string.
    pub fn from_json(json: &str) -> CircuitResult<Self> {
        let mut circuit: Circuit = serde_json::from_str(json)?;
        circuit.validate_structure()?;
        circuit.normalize();
        Ok(circuit)
    }

    /// Loads a circuit from a YAML string.
    pub fn from_yaml(yaml: &str) -> CircuitResult<Self> {
        let mut circuit: Circuit = serde_yaml::from_str(yaml)?;
        circuit.validate_structure()?;
        circuit.normalize();
        Ok(circuit)
    }

    /// Converts to a pretty-printed JSON string.
    pub fn to_json(&self) -> CircuitResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Converts to a YAML string.
    pub fn to_yaml(&self) -> CircuitResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Loads a circuit from a file, auto-detecting format by extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CircuitResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match extension(path).as_str() {
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            other => Err(CircuitError::UnknownFormat(other.to_string())),
        }
    }

    /// Saves the circuit to a file, choosing format by extension.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> CircuitResult<()> {
        let path = path.as_ref();
        let content = match extension(path).as_str() {
            "yaml" | "yml" => self.to_yaml()?,
            "json" => self.to_json()?,
            other => return Err(CircuitError::UnknownFormat(other.to_string())),
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
