//! Timing event definitions.
//!
//! Timing events are the engine's output stream for waveform displays: each
//! one records that a gate output slot took a new value at a simulated time.

use serde::{Deserialize, Serialize};

use crate::types::{GateId, SimTime, SlotIndex};

/// A recorded value change on one gate output slot.
///
/// Events are append-only and ordered by `time`, then by `seq` (insertion
/// order within the capture session). Gate, slot and value break any
/// remaining tie so the ordering agrees with equality.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingEvent {
    /// The gate whose output changed
    pub gate: GateId,
    /// The output slot that changed
    pub slot: SlotIndex,
    /// Simulated time of the change
    pub time: SimTime,
    /// The new value
    pub value: bool,
    /// Insertion sequence number within the capture session
    pub seq: u64,
}

impl TimingEvent {
    /// Creates a new timing event.
    pub fn new(gate: GateId, slot: SlotIndex, time: SimTime, value: bool, seq: u64) -> Self {
        Self {
            gate,
            slot,
            time,
            value,
            seq,
        }
    }

    /// Returns true if this is a rising transition.
    pub fn is_rising(&self) -> bool {
        self.value
    }
}

impl PartialOrd for TimingEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimingEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
            .then_with(|| self.gate.cmp(&other.gate))
            .then_with(|| self.slot.cmp(&other.slot))
            .then_with(|| self.value.cmp(&other.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = TimingEvent::new(3, 1, 250, true, 0);

        assert_eq!(event.gate, 3);
        assert_eq!(event.slot, 1);
        assert_eq!(event.time, 250);
        assert!(event.is_rising());
    }

    #[test]
    fn test_event_ordering() {
        let early = TimingEvent::new(9, 0, 10, true, 5);
        let late = TimingEvent::new(1, 0, 20, false, 0);
        let tie = TimingEvent::new(2, 0, 10, false, 6);

        let mut events = vec![late.clone(), tie.clone(), early.clone()];
        events.sort();

        assert_eq!(events, vec![early, tie, late]);
    }

    #[test]
    fn test_ordering_agrees_with_equality() {
        let a = TimingEvent::new(1, 0, 10, true, 4);
        let b = TimingEvent::new(2, 0, 10, true, 4);
        let c = TimingEvent::new(1, 1, 10, true, 4);

        assert_ne!(a, b);
        assert_eq!(a.cmp(&b), std::cmp::Ordering::Less);
        assert_eq!(a.cmp(&c), std::cmp::Ordering::Less);
        assert_eq!(a.cmp(&a.clone()), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_event_serialization() {
        let event = TimingEvent::new(1, 0, 100, true, 3);
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: TimingEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event, deserialized);
    }
}
