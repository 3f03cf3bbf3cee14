//! Core type definitions for the evaluation engine.
//!
//! This module defines the fundamental identifiers and slot conventions used
//! throughout the engine.

/// Simulated time in milliseconds.
///
/// Simulated time is independent of wall-clock time: it only advances when
/// the engine is asked to evaluate a circuit, which keeps timing charts
/// reproducible regardless of how often the caller polls.
pub type SimTime = u64;

/// Unique identifier for a gate within one circuit.
pub type GateId = u64;

/// Unique identifier for a wire within one circuit.
pub type WireId = u64;

/// Index of an input or output slot on a gate.
pub type SlotIndex = usize;

/// Reserved output slot for a gate's primary output.
pub const PRIMARY_OUTPUT: SlotIndex = 0;

/// Reserved output slot for the secondary output of dual-output gates
/// (the complementary Q̄ of an SR latch).
pub const SECONDARY_OUTPUT: SlotIndex = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_slots_are_distinct() {
        assert_eq!(PRIMARY_OUTPUT, 0);
        assert_eq!(SECONDARY_OUTPUT, 1);
        assert_ne!(PRIMARY_OUTPUT, SECONDARY_OUTPUT);
    }

    #[test]
    fn test_type_aliases() {
        let time: SimTime = 1000;
        let gate: GateId = 42;
        let wire: WireId = 7;
        let slot: SlotIndex = 2;

        assert_eq!(time, 1000);
        assert_eq!(gate, 42);
        assert_eq!(wire, 7);
        assert_eq!(slot, 2);
    }
}
