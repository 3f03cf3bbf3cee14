//! Periodic clock sources.
//!
//! A running clock emits `floor((time - start) / half_period) mod 2`, where
//! `half_period = 1000 / (2 * hz)` simulated milliseconds. The start time is
//! latched on the first evaluation after creation or a frequency change, so
//! a new period always begins low.

use crate::gate::ClockState;
use crate::types::SimTime;

/// Level of `state` at `time`, and the updated state.
pub fn tick(state: &ClockState, time: SimTime) -> ClockState {
    let mut next = state.clone();
    if !state.running || !state.frequency_hz.is_finite() || state.frequency_hz <= 0.0 {
        return next;
    }

    let start = *next.start_time.get_or_insert(time);
    let elapsed = time.saturating_sub(start) as f64;
    let phase = (elapsed / state.half_period_ms()).floor() as u64;
    next.level = phase % 2 == 1;
    next
}

/// Time of the next level change after `time`, if the clock is running.
pub fn next_edge(state: &ClockState, time: SimTime) -> Option<SimTime> {
    if !state.running || !state.frequency_hz.is_finite() || state.frequency_hz <= 0.0 {
        return None;
    }
    let start = state.start_time.unwrap_or(time);
    let half = state.half_period_ms();
    let elapsed = time.saturating_sub(start) as f64;
    let next_phase = (elapsed / half).floor() + 1.0;
    Some(start + (next_phase * half).ceil() as SimTime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_latches_start() {
        let state = ClockState::new(1.0);
        let next = tick(&state, 250);
        assert_eq!(next.start_time, Some(250));
        assert!(!next.level);
    }

    #[test]
    fn test_clock_period() {
        // 1 Hz: 500ms high/low halves
        let mut state = ClockState::new(1.0);
        state.start_time = Some(0);

        assert!(!tick(&state, 0).level);
        assert!(!tick(&state, 499).level);
        assert!(tick(&state, 500).level);
        assert!(tick(&state, 999).level);
        assert!(!tick(&state, 1000).level);
    }

    #[test]
    fn test_stopped_clock_holds() {
        let mut state = ClockState::new(10.0);
        state.start_time = Some(0);
        state.level = true;
        state.running = false;

        let next = tick(&state, 50);
        assert!(next.level);
        assert_eq!(next, state);
    }

    #[test]
    fn test_next_edge() {
        let mut state = ClockState::new(2.0);
        state.start_time = Some(100);
        assert_eq!(next_edge(&state, 100), Some(350));
        assert_eq!(next_edge(&state, 360), Some(600));

        state.running = false;
        assert_eq!(next_edge(&state, 100), None);
    }
}
