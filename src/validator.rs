//! Connection validation.
//!
//! Every proposed wire passes through [`validate`] before it is committed to a
//! circuit. Malformed connections are rejected with a machine-readable
//! reason; feedback is never rejected, but a loop that no sequential element
//! interrupts is reported as a warning.
//!
//! # Rules
//!
//! Checked in this order:
//!
//! | Rule | Outcome |
//! |------|---------|
//! | Both gates exist | `unknown_gate` |
//! | Source slot within output count | `output_slot_out_of_range` |
//! | Destination slot within input arity | `input_slot_out_of_range` |
//! | No direct self-loop on a stateless gate | `self_loop` |
//! | Not an exact duplicate | `duplicate_connection` |
//! | Destination slot free (under [`ConnectPolicy::Reject`]) | `slot_occupied` |
//! | Loop through a DELAY, D_FF or counter | accepted, otherwise warned |

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::circuit::Circuit;
use crate::types::{GateId, SlotIndex, WireId};
use crate::wire::Endpoint;

/// Why a connection was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("gate {0} does not exist")]
    UnknownGate(GateId),

    #[error("gate {gate} has {outputs} output slot(s), slot {slot} is out of range")]
    OutputSlotOutOfRange {
        gate: GateId,
        slot: SlotIndex,
        outputs: usize,
    },

    #[error("gate {gate} has {inputs} input slot(s), slot {slot} is out of range")]
    InputSlotOutOfRange {
        gate: GateId,
        slot: SlotIndex,
        inputs: usize,
    },

    #[error("gate {0} cannot feed itself directly")]
    SelfLoop(GateId),

    #[error("identical connection already exists as wire {0}")]
    DuplicateConnection(WireId),

    #[error("input slot {slot} of gate {gate} is already driven by wire {wire}")]
    SlotOccupied {
        gate: GateId,
        slot: SlotIndex,
        wire: WireId,
    },
}

impl ConnectionError {
    /// Stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            ConnectionError::UnknownGate(_) => "unknown_gate",
            ConnectionError::OutputSlotOutOfRange { .. } => "output_slot_out_of_range",
            ConnectionError::InputSlotOutOfRange { .. } => "input_slot_out_of_range",
            ConnectionError::SelfLoop(_) => "self_loop",
            ConnectionError::DuplicateConnection(_) => "duplicate_connection",
            ConnectionError::SlotOccupied { .. } => "slot_occupied",
        }
    }
}

/// Non-fatal findings about an accepted connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionWarning {
    /// The wire closes a feedback loop with no DELAY, D_FF or counter on it.
    /// `path` lists the gates around the loop starting at the destination.
    CombinationalLoop { path: Vec<GateId> },
}

impl ConnectionWarning {
    pub fn reason(&self) -> &'static str {
        match self {
            ConnectionWarning::CombinationalLoop { .. } => "combinational_loop",
        }
    }
}

/// What to do when the destination slot is already driven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectPolicy {
    /// Refuse the new wire with `slot_occupied`.
    #[default]
    Reject,
    /// Drop the existing wire in favor of the new one.
    Replace,
}

/// The outcome of a successful validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Validation {
    /// Existing wire to remove before committing (only under `Replace`)
    pub replaces: Option<WireId>,
    /// Warnings about the accepted connection
    pub warnings: Vec<ConnectionWarning>,
}

/// Validates a proposed connection against `circuit`.
pub fn validate(
    circuit: &Circuit,
    from: Endpoint,
    to: Endpoint,
    policy: ConnectPolicy,
) -> Result<Validation, ConnectionError> {
    let source = circuit
        .gate(from.gate)
        .ok_or(ConnectionError::UnknownGate(from.gate))?;
    let dest = circuit
        .gate(to.gate)
        .ok_or(ConnectionError::UnknownGate(to.gate))?;

    let outputs = source.kind.output_count();
    if from.slot >= outputs {
        return Err(ConnectionError::OutputSlotOutOfRange {
            gate: from.gate,
            slot: from.slot,
            outputs,
        });
    }
    let inputs = dest.kind.input_count();
    if to.slot >= inputs {
        return Err(ConnectionError::InputSlotOutOfRange {
            gate: to.gate,
            slot: to.slot,
            inputs,
        });
    }

    if from.gate == to.gate && !source.kind.allows_self_feedback() {
        return Err(ConnectionError::SelfLoop(from.gate));
    }

    let mut validation = Validation::default();
    if let Some(existing) = circuit.wire_into(to) {
        if existing.same_route(from, to) {
            return Err(ConnectionError::DuplicateConnection(existing.id));
        }
        match policy {
            ConnectPolicy::Reject => {
                return Err(ConnectionError::SlotOccupied {
                    gate: to.gate,
                    slot: to.slot,
                    wire: existing.id,
                });
            }
            ConnectPolicy::Replace => validation.replaces = Some(existing.id),
        }
    }

    if let Some(path) = combinational_loop(circuit, from.gate, to.gate, validation.replaces) {
        tracing::warn!(
            from = from.gate,
            to = to.gate,
            "Connection closes a combinational loop through {:?}",
            path
        );
        validation
            .warnings
            .push(ConnectionWarning::CombinationalLoop { path });
    }

    Ok(validation)
}

/// Looks for a path `to -> ... -> from` that passes through no loop-breaking
/// gate. Such a path plus the proposed wire forms a combinational loop.
fn combinational_loop(
    circuit: &Circuit,
    from: GateId,
    to: GateId,
    ignoring: Option<WireId>,
) -> Option<Vec<GateId>> {
    let breaks = |id: GateId| {
        circuit
            .gate(id)
            .map(|gate| gate.kind.breaks_loops())
            .unwrap_or(true)
    };
    if breaks(from) || breaks(to) {
        return None;
    }
    if from == to {
        return Some(vec![to]);
    }

    let mut fanout: HashMap<GateId, Vec<GateId>> = HashMap::new();
    for wire in circuit.wires() {
        if Some(wire.id) == ignoring {
            continue;
        }
        fanout.entry(wire.from.gate).or_default().push(wire.to.gate);
    }

    let mut parent: HashMap<GateId, GateId> = HashMap::new();
    let mut seen: HashSet<GateId> = HashSet::from([to]);
    let mut queue: VecDeque<GateId> = VecDeque::from([to]);

    while let Some(gate) = queue.pop_front() {
        for &next in fanout.get(&gate).map(Vec::as_slice).unwrap_or(&[]) {
            if breaks(next) || !seen.insert(next) {
                continue;
            }
            parent.insert(next, gate);
            if next == from {
                let mut path = vec![from];
                let mut cursor = from;
                while let Some(&prev) = parent.get(&cursor) {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{GateKind, GateType, Position};

    fn gate(circuit: &mut Circuit, ty: GateType) -> GateId {
        circuit.add_gate(ty, Position::default())
    }

    #[test]
    fn test_unknown_gate() {
        let mut circuit = Circuit::new();
        let a = gate(&mut circuit, GateType::Input);

        let err = validate(&circuit, Endpoint::primary(a), Endpoint::new(99, 0), ConnectPolicy::Reject)
            .unwrap_err();
        assert_eq!(err, ConnectionError::UnknownGate(99));
        assert_eq!(err.reason(), "unknown_gate");
    }

    #[test]
    fn test_input_slot_out_of_range() {
        let mut circuit = Circuit::new();
        let a = gate(&mut circuit, GateType::Input);
        let not = gate(&mut circuit, GateType::Not);

        let err = validate(&circuit, Endpoint::primary(a), Endpoint::new(not, 1), ConnectPolicy::Reject)
            .unwrap_err();
        assert_eq!(err.reason(), "input_slot_out_of_range");
    }

    #[test]
    fn test_output_slot_out_of_range() {
        let mut circuit = Circuit::new();
        let a = gate(&mut circuit, GateType::Input);
        let not = gate(&mut circuit, GateType::Not);

        let err = validate(&circuit, Endpoint::secondary(a), Endpoint::new(not, 0), ConnectPolicy::Reject)
            .unwrap_err();
        assert_eq!(err.reason(), "output_slot_out_of_range");
    }

    #[test]
    fn test_latch_secondary_output_accepted() {
        let mut circuit = Circuit::new();
        let latch = gate(&mut circuit, GateType::SrLatch);
        let out = gate(&mut circuit, GateType::Output);

        let ok = validate(&circuit, Endpoint::secondary(latch), Endpoint::new(out, 0), ConnectPolicy::Reject);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_self_loop_rules() {
        let mut circuit = Circuit::new();
        let not = gate(&mut circuit, GateType::Not);
        let delay = gate(&mut circuit, GateType::Delay);

        let err = validate(&circuit, Endpoint::primary(not), Endpoint::new(not, 0), ConnectPolicy::Reject)
            .unwrap_err();
        assert_eq!(err.reason(), "self_loop");

        let ok = validate(&circuit, Endpoint::primary(delay), Endpoint::new(delay, 0), ConnectPolicy::Reject)
            .unwrap();
        assert!(ok.warnings.is_empty());
    }

    #[test]
    fn test_occupied_and_duplicate() {
        let mut circuit = Circuit::new();
        let a = gate(&mut circuit, GateType::Input);
        let b = gate(&mut circuit, GateType::Input);
        let not = gate(&mut circuit, GateType::Not);
        circuit.add_wire(Endpoint::primary(a), Endpoint::new(not, 0)).unwrap();

        let dup = validate(&circuit, Endpoint::primary(a), Endpoint::new(not, 0), ConnectPolicy::Reject)
            .unwrap_err();
        assert_eq!(dup.reason(), "duplicate_connection");

        let occupied = validate(&circuit, Endpoint::primary(b), Endpoint::new(not, 0), ConnectPolicy::Reject)
            .unwrap_err();
        assert_eq!(occupied.reason(), "slot_occupied");

        let replace = validate(&circuit, Endpoint::primary(b), Endpoint::new(not, 0), ConnectPolicy::Replace)
            .unwrap();
        assert!(replace.replaces.is_some());
    }

    #[test]
    fn test_combinational_loop_warns() {
        let mut circuit = Circuit::new();
        let n1 = gate(&mut circuit, GateType::Not);
        let n2 = gate(&mut circuit, GateType::Not);
        circuit.add_wire(Endpoint::primary(n1), Endpoint::new(n2, 0)).unwrap();

        let result = validate(&circuit, Endpoint::primary(n2), Endpoint::new(n1, 0), ConnectPolicy::Reject)
            .unwrap();
        assert_eq!(
            result.warnings,
            vec![ConnectionWarning::CombinationalLoop { path: vec![n1, n2] }]
        );
    }

    #[test]
    fn test_delay_loop_is_silent() {
        let mut circuit = Circuit::new();
        let not = gate(&mut circuit, GateType::Not);
        let delay = circuit.add_gate_with(GateKind::delay(1), Position::default());
        circuit.add_wire(Endpoint::primary(not), Endpoint::new(delay, 0)).unwrap();

        let result = validate(&circuit, Endpoint::primary(delay), Endpoint::new(not, 0), ConnectPolicy::Reject)
            .unwrap();
        assert!(result.warnings.is_empty());
    }
}
