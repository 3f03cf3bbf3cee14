//! Event-driven scheduler implementation.
//!
//! The `EventScheduler` only recomputes gates that may have changed. A gate
//! whose output moves pushes its fan-out onto a FIFO work queue; the settle
//! ends when the queue drains or the evaluation budget
//! (`max_iterations * gate_count`) is spent.

use std::collections::{HashSet, VecDeque};

use crate::circuit::Circuit;
use crate::executor::{evaluate_gate, EvalContext, EvalError, Netlist, Scheduler, Settlement, Strategy};
use crate::types::GateId;

/// Statistics collected by the event scheduler.
#[derive(Clone, Debug, Default)]
pub struct EventSchedulerStats {
    /// Total number of settles
    pub settles: u64,
    /// Gates placed on the queue before propagation
    pub seeded: u64,
    /// Total number of gate recomputations
    pub gate_evaluations: u64,
    /// Recomputations that changed an output
    pub output_changes: u64,
    /// Largest queue length observed
    pub peak_queue: usize,
    /// Settles that ran out of budget
    pub non_converged: u64,
}

/// An event-driven scheduler.
///
/// This scheduler:
/// - Seeds the queue with dirty gates, source gates, and gates whose
///   resolved inputs differ from the inputs they were last computed with
/// - Processes the queue first in, first out, never queueing a gate twice
/// - Enqueues a gate's fan-out only when one of its outputs changed
pub struct EventScheduler {
    /// Budget factor per gate
    max_iterations: usize,
    /// Statistics
    stats: EventSchedulerStats,
}

impl EventScheduler {
    /// Creates a new event-driven scheduler.
    ///
    /// # Arguments
    /// * `max_iterations` - Recomputations allowed per gate (minimum 1)
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            stats: EventSchedulerStats::default(),
        }
    }

    /// Returns collected statistics.
    pub fn stats(&self) -> &EventSchedulerStats {
        &self.stats
    }

    fn seeds(circuit: &Circuit, netlist: &Netlist) -> Vec<GateId> {
        circuit
            .gates()
            .filter(|gate| {
                gate.dirty
                    || gate.kind.is_source()
                    || netlist.resolve(circuit, gate.id) != gate.inputs
            })
            .map(|gate| gate.id)
            .collect()
    }
}

impl Scheduler for EventScheduler {
    fn strategy(&self) -> Strategy {
        Strategy::EventDriven
    }

    fn settle(&mut self, circuit: &mut Circuit, ctx: &EvalContext) -> Result<Settlement, EvalError> {
        let netlist = Netlist::build(circuit)?;
        let budget = (self.max_iterations * circuit.gate_count().max(1)) as u64;

        let seeds = Self::seeds(circuit, &netlist);
        self.stats.seeded += seeds.len() as u64;

        let mut in_queue: HashSet<GateId> = seeds.iter().copied().collect();
        let mut queue: VecDeque<GateId> = seeds.into();
        let mut evaluations = 0u64;
        let mut unsettled = HashSet::new();

        while let Some(id) = queue.pop_front() {
            if evaluations >= budget {
                queue.push_front(id);
                break;
            }
            in_queue.remove(&id);

            let update = evaluate_gate(circuit, &netlist, id, ctx)?;
            evaluations += 1;
            if update.settled {
                unsettled.remove(&id);
            } else {
                unsettled.insert(id);
            }
            if update.changed {
                self.stats.output_changes += 1;
                for &next in netlist.fanout(id) {
                    if in_queue.insert(next) {
                        queue.push_back(next);
                    }
                }
                self.stats.peak_queue = self.stats.peak_queue.max(queue.len());
            }
        }

        let converged = queue.is_empty() && unsettled.is_empty();
        self.stats.settles += 1;
        self.stats.gate_evaluations += evaluations;
        if !converged {
            self.stats.non_converged += 1;
            tracing::debug!(
                budget,
                pending = queue.len(),
                nested = unsettled.len(),
                "Event scheduler did not settle"
            );
        }

        Ok(Settlement {
            strategy: Strategy::EventDriven,
            converged,
            passes: 1,
            gate_evaluations: evaluations,
        })
    }

    fn export_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "strategy": Strategy::EventDriven.name(),
            "max_iterations": self.max_iterations,
            "settles": self.stats.settles,
            "seeded": self.stats.seeded,
            "gate_evaluations": self.stats.gate_evaluations,
            "output_changes": self.stats.output_changes,
            "peak_queue": self.stats.peak_queue,
            "non_converged": self.stats.non_converged,
        })
    }

    fn reset_stats(&mut self) {
        self.stats = EventSchedulerStats::default();
    }
}
