//! Wire definitions.
//!
//! A wire carries the value of one gate output slot into one gate input
//! slot. Output slots fan out freely; input slots accept a single driver.

use serde::{Deserialize, Serialize};

use crate::types::{GateId, SlotIndex, WireId, PRIMARY_OUTPUT, SECONDARY_OUTPUT};

/// One end of a wire: a gate and a slot on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub gate: GateId,
    pub slot: SlotIndex,
}

impl Endpoint {
    pub fn new(gate: GateId, slot: SlotIndex) -> Self {
        Self { gate, slot }
    }

    /// The gate's primary output.
    pub fn primary(gate: GateId) -> Self {
        Self::new(gate, PRIMARY_OUTPUT)
    }

    /// The gate's secondary output (Q̄ on dual-output gates).
    pub fn secondary(gate: GateId) -> Self {
        Self::new(gate, SECONDARY_OUTPUT)
    }
}

/// A directed connection from an output slot to an input slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    pub id: WireId,
    /// Source output slot
    pub from: Endpoint,
    /// Destination input slot
    pub to: Endpoint,
    /// Value carried on the last evaluation, cached for display
    #[serde(default)]
    pub is_active: bool,
}

impl Wire {
    pub fn new(id: WireId, from: Endpoint, to: Endpoint) -> Self {
        Self {
            id,
            from,
            to,
            is_active: false,
        }
    }

    /// Returns true if either end touches `gate`.
    pub fn touches(&self, gate: GateId) -> bool {
        self.from.gate == gate || self.to.gate == gate
    }

    /// Returns true if this wire connects the same two slots as `other`.
    pub fn same_route(&self, from: Endpoint, to: Endpoint) -> bool {
        self.from == from && self.to == to
    }
}
