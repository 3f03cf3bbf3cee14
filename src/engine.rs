//! Simulation engine (evaluation API).
//!
//! The `Simulator` is the top-level coordinator: it takes a circuit
//! snapshot, advances the simulated clock, runs one evaluation with the
//! chosen scheduler, diffs the result into timing events, and hands back a
//! new snapshot. The caller's circuit is never mutated.

use serde::{Deserialize, Serialize};

use crate::capture::TimingCapture;
use crate::circuit::Circuit;
use crate::config::EngineConfig;
use crate::event::TimingEvent;
use crate::executor::{
    self, EvalContext, EvalError, EventScheduler, LevelScheduler, Scheduler, Settlement, Strategy,
};
use crate::gate::GateKind;
use crate::stats::SessionStats;
use crate::types::SimTime;

/// Bounds for the clock-derived time step, in simulated milliseconds.
pub const MIN_POLL_INTERVAL: SimTime = 1;
pub const MAX_POLL_INTERVAL: SimTime = 100;

/// How an evaluation ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A fixed point was reached
    Settled,
    /// The iteration budget ran out; the snapshot is the last one computed
    NonConverged,
    /// Evaluation failed; the snapshot is the caller's, unchanged
    FellBack { reason: String },
}

/// The result of one evaluate call.
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// The new snapshot
    pub circuit: Circuit,
    /// Value changes recorded by this call
    pub events: Vec<TimingEvent>,
    /// How the call ended
    pub outcome: Outcome,
    /// Scheduler report; absent on fallback
    pub settlement: Option<Settlement>,
    /// Simulated time of this evaluation
    pub time: SimTime,
}

impl Evaluation {
    pub fn is_settled(&self) -> bool {
        self.outcome == Outcome::Settled
    }

    pub fn fell_back(&self) -> bool {
        matches!(self.outcome, Outcome::FellBack { .. })
    }
}

/// Statistics collected by the simulator.
#[derive(Clone, Debug, Default)]
pub struct EngineStats {
    /// Total evaluate calls
    pub evaluations: u64,
    /// Calls that settled
    pub settled: u64,
    /// Calls that hit the iteration budget
    pub non_converged: u64,
    /// Calls that fell back to the input snapshot
    pub fallbacks: u64,
    /// Timing events produced
    pub events_emitted: u64,
}

/// The evaluation engine.
///
/// # Example
///
/// ```ignore
/// let mut sim = Simulator::new(EngineConfig::default());
/// sim.start();
/// let result = sim.evaluate(&circuit);
/// for event in &result.events {
///     println!("{} slot {} -> {} at {}", event.gate, event.slot, event.value, event.time);
/// }
/// ```
pub struct Simulator {
    /// Engine settings
    config: EngineConfig,
    /// Simulated clock and event history
    capture: TimingCapture,
    /// Level-ordered scheduler
    level: LevelScheduler,
    /// Event-driven scheduler
    event: EventScheduler,
    /// Statistics
    stats: EngineStats,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Simulator {
    /// Creates a new simulator.
    pub fn new(config: EngineConfig) -> Self {
        let capture = match config.history_limit {
            Some(limit) => TimingCapture::with_history_limit(limit),
            None => TimingCapture::new(),
        };
        Self {
            level: LevelScheduler::new(config.max_iterations),
            event: EventScheduler::new(config.max_iterations),
            config,
            capture,
            stats: EngineStats::default(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the timing capture session.
    pub fn capture(&self) -> &TimingCapture {
        &self.capture
    }

    /// Returns the current simulated time.
    pub fn current_time(&self) -> SimTime {
        self.capture.time()
    }

    /// Returns the engine statistics.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Starts a new session: the simulated clock returns to zero and the
    /// event history and statistics are cleared.
    pub fn start(&mut self) {
        self.reset();
        self.capture.start();
    }

    /// Clears the simulated clock, event history and statistics.
    pub fn reset(&mut self) {
        self.capture.reset();
        self.level.reset_stats();
        self.event.reset_stats();
        self.stats = EngineStats::default();
    }

    /// Recommended polling interval for `circuit`: a quarter of the fastest
    /// running clock's period, clamped to `[1, 100]` ms. Circuits with no
    /// running clock poll at the upper bound.
    pub fn poll_interval(circuit: &Circuit) -> SimTime {
        match fastest_clock_hz(circuit) {
            Some(hz) => {
                let quarter = (1000.0 / (4.0 * hz)).floor();
                (quarter as SimTime).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
            }
            None => MAX_POLL_INTERVAL,
        }
    }

    /// Simulated time step used for evaluating `circuit`.
    pub fn time_step_for(&self, circuit: &Circuit) -> SimTime {
        self.config
            .time_step
            .unwrap_or_else(|| Self::poll_interval(circuit))
    }

    /// Evaluates `circuit` with the configured strategy.
    pub fn evaluate(&mut self, circuit: &Circuit) -> Evaluation {
        self.evaluate_with(circuit, self.config.strategy)
    }

    /// Evaluates `circuit` with an explicit strategy.
    ///
    /// Never fails: evaluation errors are logged and the input snapshot is
    /// returned with a [`Outcome::FellBack`] outcome and no events.
    pub fn evaluate_with(&mut self, circuit: &Circuit, strategy: Strategy) -> Evaluation {
        let step = self.time_step_for(circuit);
        let time = self.capture.advance(step);
        let ctx = EvalContext::new(time, strategy, self.config.max_iterations);
        self.stats.evaluations += 1;

        let mut next = circuit.clone();
        match self.run(&mut next, &ctx) {
            Ok(settlement) => {
                let events = self.capture.record(circuit, &next);
                self.stats.events_emitted += events.len() as u64;

                let outcome = if settlement.converged {
                    self.stats.settled += 1;
                    Outcome::Settled
                } else {
                    self.stats.non_converged += 1;
                    tracing::warn!(
                        time,
                        strategy = settlement.strategy.name(),
                        evaluations = settlement.gate_evaluations,
                        "Circuit did not settle within the iteration budget"
                    );
                    Outcome::NonConverged
                };
                tracing::debug!(
                    time,
                    strategy = settlement.strategy.name(),
                    passes = settlement.passes,
                    events = events.len(),
                    "Evaluated circuit"
                );

                Evaluation {
                    circuit: next,
                    events,
                    outcome,
                    settlement: Some(settlement),
                    time,
                }
            }
            Err(err) => {
                self.stats.fallbacks += 1;
                tracing::error!(time, error = %err, "Evaluation failed; keeping previous snapshot");
                Evaluation {
                    circuit: circuit.clone(),
                    events: Vec::new(),
                    outcome: Outcome::FellBack {
                        reason: err.to_string(),
                    },
                    settlement: None,
                    time,
                }
            }
        }
    }

    /// Evaluates `circuit` `steps` times, feeding each result into the next.
    ///
    /// Returns the final evaluation with the events of every step.
    pub fn run_steps(&mut self, circuit: &Circuit, steps: usize) -> Evaluation {
        let mut current = circuit.clone();
        let mut events = Vec::new();
        let mut last = None;
        for _ in 0..steps {
            let evaluation = self.evaluate(&current);
            current = evaluation.circuit.clone();
            events.extend(evaluation.events.iter().cloned());
            last = Some(evaluation);
        }

        match last {
            Some(mut evaluation) => {
                evaluation.events = events;
                evaluation
            }
            None => Evaluation {
                circuit: current,
                events,
                outcome: Outcome::Settled,
                settlement: None,
                time: self.capture.time(),
            },
        }
    }

    fn run(&mut self, circuit: &mut Circuit, ctx: &EvalContext) -> Result<Settlement, EvalError> {
        let scheduler: &mut dyn Scheduler = match executor::resolve_strategy(circuit, ctx.strategy)? {
            Strategy::Level => &mut self.level,
            _ => &mut self.event,
        };
        executor::step(circuit, scheduler, ctx)
    }

    /// Exports statistics from the engine and both schedulers.
    pub fn export_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "engine": {
                "current_time": self.capture.time(),
                "evaluations": self.stats.evaluations,
                "settled": self.stats.settled,
                "non_converged": self.stats.non_converged,
                "fallbacks": self.stats.fallbacks,
                "events_emitted": self.stats.events_emitted,
                "events_retained": self.capture.len(),
                "events_dropped": self.capture.dropped(),
                "max_iterations": self.config.max_iterations,
                "strategy": self.config.strategy.name(),
            },
            "schedulers": {
                "level": self.level.export_stats(),
                "event": self.event.export_stats(),
            },
        })
    }

    /// Builds a report of the current session.
    pub fn session_stats(&self, name: impl Into<String>) -> SessionStats {
        let mut stats = SessionStats::new().with_name(name);
        stats.update_from_json(&self.export_stats());
        stats
    }
}

/// Highest frequency among running clocks, including those inside custom
/// gates.
fn fastest_clock_hz(circuit: &Circuit) -> Option<f64> {
    circuit
        .gates()
        .filter_map(|gate| match &gate.kind {
            GateKind::Clock(clock)
                if clock.running && clock.frequency_hz.is_finite() && clock.frequency_hz > 0.0 =>
            {
                Some(clock.frequency_hz)
            }
            GateKind::Custom(custom) => fastest_clock_hz(&custom.circuit),
            _ => None,
        })
        .fold(None, |best: Option<f64>, hz| Some(best.map_or(hz, |b| b.max(hz))))
}
