//! Gates with memory: D flip-flop, SR latch and binary counter.
//!
//! Edges are detected against the clock level stored from the previous
//! computation, so recomputing a gate with unchanged inputs never produces a
//! second edge.

use crate::gate::{CounterState, DFlipFlopState, SrLatchState};

/// Captures `d` into Q on a rising edge of `clock`; holds otherwise.
pub fn d_flip_flop(state: &DFlipFlopState, d: bool, clock: bool) -> DFlipFlopState {
    let rising = clock && !state.prev_clock;
    DFlipFlopState {
        q: if rising { d } else { state.q },
        prev_clock: clock,
    }
}

/// SR latch. S=1,R=1 is treated as invalid and holds the previous state.
pub fn sr_latch(state: &SrLatchState, set: bool, reset: bool) -> SrLatchState {
    match (set, reset) {
        (true, false) => SrLatchState { q: true, q_bar: false },
        (false, true) => SrLatchState { q: false, q_bar: true },
        (false, false) => state.clone(),
        (true, true) => {
            tracing::trace!("SR latch saw S=1,R=1; holding previous state");
            state.clone()
        }
    }
}

/// Increments modulo `2^bit_count` on a rising edge of `clock`.
pub fn counter(state: &CounterState, clock: bool) -> CounterState {
    let rising = clock && !state.prev_clock;
    let modulus = state.modulus();
    let value = if rising {
        (state.value % modulus + 1) % modulus
    } else {
        state.value
    };
    CounterState {
        bit_count: state.bit_count,
        value,
        prev_clock: clock,
    }
}
