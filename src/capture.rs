//! Timing capture sessions.
//!
//! A [`TimingCapture`] owns a simulated clock and an append-only history of
//! [`TimingEvent`]s. The clock only moves when the engine evaluates, never on
//! its own, so waveforms are reproducible regardless of how often a caller
//! polls.

use std::collections::VecDeque;

use crate::circuit::Circuit;
use crate::event::TimingEvent;
use crate::types::{GateId, SimTime, SlotIndex};

/// Simulated timeline plus recorded value changes.
#[derive(Clone, Debug, Default)]
pub struct TimingCapture {
    /// Current simulated time
    time: SimTime,
    /// Next insertion sequence number
    next_seq: u64,
    /// Recorded events, oldest first
    history: VecDeque<TimingEvent>,
    /// Oldest events are dropped past this many
    history_limit: Option<usize>,
    /// Events dropped because of the limit
    dropped: u64,
}

impl TimingCapture {
    /// Creates a capture with unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a capture that keeps at most `limit` events.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            history_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Begins a new session: clock back to zero, history cleared.
    pub fn start(&mut self) {
        self.reset();
        tracing::info!("Timing capture session started");
    }

    /// Clears the clock and history.
    pub fn reset(&mut self) {
        self.time = 0;
        self.next_seq = 0;
        self.history.clear();
        self.dropped = 0;
    }

    /// Current simulated time.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Advances the simulated clock by `step` and returns the new time.
    pub fn advance(&mut self, step: SimTime) -> SimTime {
        self.time = self.time.saturating_add(step);
        self.time
    }

    /// Diffs two snapshots and appends one event per output slot whose value
    /// changed, stamped with the current time.
    ///
    /// Slots with no previous value are compared against false. Returned
    /// events are ordered by gate id, then slot.
    pub fn record(&mut self, prev: &Circuit, next: &Circuit) -> Vec<TimingEvent> {
        let mut events = Vec::new();
        for gate in next.gates() {
            let before = prev.gate(gate.id).map(|g| g.outputs.as_slice()).unwrap_or(&[]);
            for (slot, &value) in gate.outputs.iter().enumerate() {
                let old = before.get(slot).copied().unwrap_or(false);
                if old != value {
                    events.push(TimingEvent::new(gate.id, slot, self.time, value, self.next_seq));
                    self.next_seq += 1;
                }
            }
        }

        self.history.extend(events.iter().cloned());
        if let Some(limit) = self.history_limit {
            while self.history.len() > limit {
                self.history.pop_front();
                self.dropped += 1;
            }
        }
        events
    }

    /// All retained events, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TimingEvent> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Events dropped by the history limit since the last reset.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn history_limit(&self) -> Option<usize> {
        self.history_limit
    }

    /// Retained events for one gate.
    pub fn events_for(&self, gate: GateId) -> Vec<&TimingEvent> {
        self.history.iter().filter(|e| e.gate == gate).collect()
    }

    /// `(time, value)` transitions for one output slot, as a waveform.
    pub fn waveform(&self, gate: GateId, slot: SlotIndex) -> Vec<(SimTime, bool)> {
        self.history
            .iter()
            .filter(|e| e.gate == gate && e.slot == slot)
            .map(|e| (e.time, e.value))
            .collect()
    }
}
