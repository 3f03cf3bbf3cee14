//! Level-ordered scheduler implementation.
//!
//! The `LevelScheduler` recomputes every gate in topological order, pass
//! after pass, until a pass produces no output change or the pass cap is
//! reached.

use std::collections::HashSet;

use crate::circuit::Circuit;
use crate::executor::{evaluate_gate, EvalContext, EvalError, Netlist, Scheduler, Settlement, Strategy};

/// Statistics collected by the level scheduler.
#[derive(Clone, Debug, Default)]
pub struct LevelSchedulerStats {
    /// Total number of settles
    pub settles: u64,
    /// Total number of full passes
    pub passes: u64,
    /// Total number of gate recomputations
    pub gate_evaluations: u64,
    /// Settles that hit the pass cap
    pub non_converged: u64,
}

/// A level-ordered scheduler.
///
/// This scheduler:
/// - Orders gates topologically, treating inputs of DELAY and
///   edge-triggered gates as cut
/// - Appends gates on combinational cycles in ascending id order
/// - Treats an acyclic circuit as settled after a single pass
/// - Otherwise repeats full passes until nothing changes
pub struct LevelScheduler {
    /// Pass cap per settle
    max_passes: usize,
    /// Statistics
    stats: LevelSchedulerStats,
}

impl LevelScheduler {
    /// Creates a new level scheduler.
    ///
    /// # Arguments
    /// * `max_passes` - Full passes allowed before giving up (minimum 1)
    pub fn new(max_passes: usize) -> Self {
        Self {
            max_passes: max_passes.max(1),
            stats: LevelSchedulerStats::default(),
        }
    }

    /// Returns the pass cap.
    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Returns collected statistics.
    pub fn stats(&self) -> &LevelSchedulerStats {
        &self.stats
    }
}

impl Scheduler for LevelScheduler {
    fn strategy(&self) -> Strategy {
        Strategy::Level
    }

    fn settle(&mut self, circuit: &mut Circuit, ctx: &EvalContext) -> Result<Settlement, EvalError> {
        let netlist = Netlist::build(circuit)?;
        let (order, cyclic) = netlist.order(circuit, false);

        let mut passes = 0;
        let mut evaluations = 0u64;
        let mut converged = false;
        // Custom gates whose latest recomputation left the body unsettled
        let mut unsettled = HashSet::new();

        while passes < self.max_passes {
            passes += 1;
            let mut changed = false;
            for &id in &order {
                let update = evaluate_gate(circuit, &netlist, id, ctx)?;
                changed |= update.changed;
                if update.settled {
                    unsettled.remove(&id);
                } else {
                    unsettled.insert(id);
                }
                evaluations += 1;
            }
            if cyclic == 0 || !changed {
                converged = true;
                break;
            }
        }
        if !unsettled.is_empty() {
            tracing::debug!(gates = unsettled.len(), "Nested circuits did not settle");
            converged = false;
        }

        self.stats.settles += 1;
        self.stats.passes += passes as u64;
        self.stats.gate_evaluations += evaluations;
        if !converged {
            self.stats.non_converged += 1;
            tracing::debug!(passes, cyclic, "Level scheduler hit its pass cap");
        }

        Ok(Settlement {
            strategy: Strategy::Level,
            converged,
            passes,
            gate_evaluations: evaluations,
        })
    }

    fn export_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "strategy": Strategy::Level.name(),
            "max_passes": self.max_passes,
            "settles": self.stats.settles,
            "passes": self.stats.passes,
            "gate_evaluations": self.stats.gate_evaluations,
            "non_converged": self.stats.non_converged,
        })
    }

    fn reset_stats(&mut self) {
        self.stats = LevelSchedulerStats::default();
    }
}
