//! Session statistics and export.
//!
//! [`SessionStats`] is a serializable report built from
//! [`Simulator::export_stats`](crate::engine::Simulator::export_stats), with
//! JSON, CSV and plain-text renderings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::circuit::Circuit;
use crate::types::SimTime;

/// Aggregate statistics for a simulation session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session metadata
    pub metadata: SessionMetadata,

    /// Engine-level counters
    pub engine: EngineSummary,

    /// Per-strategy scheduler counters
    pub schedulers: BTreeMap<String, SchedulerSummary>,

    /// Shape of the evaluated circuit, if recorded
    pub circuit: Option<CircuitSummary>,
}

/// Metadata about the session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Session name
    pub name: String,

    /// Crate version that produced the report
    pub version: String,
}

/// Engine-level counters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineSummary {
    /// Simulated time at the end of the session
    pub final_time: SimTime,
    /// Evaluate calls
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

/// Counters for one scheduler.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchedulerSummary {
    /// Settles run
    pub settles: u64,
    /// Gate recomputations
    pub gate_evaluations: u64,
    /// Settles that ran out of budget
    pub non_converged: u64,
}

/// Gate and wire counts of a circuit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CircuitSummary {
    pub gate_count: usize,
    pub wire_count: usize,
    /// Gate count per type name
    pub gates_by_type: BTreeMap<String, usize>,
}

impl CircuitSummary {
    pub fn of(circuit: &Circuit) -> Self {
        let mut gates_by_type = BTreeMap::new();
        for gate in circuit.gates() {
            *gates_by_type
                .entry(gate.gate_type().name().to_string())
                .or_insert(0) += 1;
        }
        Self {
            gate_count: circuit.gate_count(),
            wire_count: circuit.wire_count(),
            gates_by_type,
        }
    }
}

impl SessionStats {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self {
            metadata: SessionMetadata {
                name: String::new(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            ..Self::default()
        }
    }

    /// Sets the session name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self
    }

    /// Records the shape of `circuit`.
    pub fn record_circuit(&mut self, circuit: &Circuit) {
        self.circuit = Some(CircuitSummary::of(circuit));
    }

    /// Fills counters from exported engine statistics.
    pub fn update_from_json(&mut self, json: &serde_json::Value) {
        let field = |v: &serde_json::Value, key: &str| v.get(key).and_then(|x| x.as_u64()).unwrap_or(0);

        if let Some(engine) = json.get("engine") {
            self.engine.final_time = field(engine, "current_time");
            self.engine.evaluations = field(engine, "evaluations");
            self.engine.settled = field(engine, "settled");
            self.engine.non_converged = field(engine, "non_converged");
            self.engine.fallbacks = field(engine, "fallbacks");
            self.engine.events_emitted = field(engine, "events_emitted");
        }

        if let Some(schedulers) = json.get("schedulers").and_then(|s| s.as_object()) {
            for (name, stats) in schedulers {
                self.schedulers.insert(
                    name.clone(),
                    SchedulerSummary {
                        settles: field(stats, "settles"),
                        gate_evaluations: field(stats, "gate_evaluations"),
                        non_converged: field(stats, "non_converged"),
                    },
                );
            }
        }
    }

    /// Exports statistics to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports statistics to JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Exports summary statistics to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("metric,value\n");

        csv.push_str(&format!("final_time,{}\n", self.engine.final_time));
        csv.push_str(&format!("evaluations,{}\n", self.engine.evaluations));
        csv.push_str(&format!("settled,{}\n", self.engine.settled));
        csv.push_str(&format!("non_converged,{}\n", self.engine.non_converged));
        csv.push_str(&format!("fallbacks,{}\n", self.engine.fallbacks));
        csv.push_str(&format!("events_emitted,{}\n", self.engine.events_emitted));

        for (name, stats) in &self.schedulers {
            csv.push_str(&format!("{}.settles,{}\n", name, stats.settles));
            csv.push_str(&format!("{}.gate_evaluations,{}\n", name, stats.gate_evaluations));
            csv.push_str(&format!("{}.non_converged,{}\n", name, stats.non_converged));
        }

        if let Some(circuit) = &self.circuit {
            csv.push_str(&format!("gate_count,{}\n", circuit.gate_count));
            csv.push_str(&format!("wire_count,{}\n", circuit.wire_count));
        }

        csv
    }

    /// Exports summary statistics to CSV file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Session Statistics ===")?;
        writeln!(f)?;

        if !self.metadata.name.is_empty() {
            writeln!(f, "Name: {}", self.metadata.name)?;
        }
        writeln!(f, "Version: {}", self.metadata.version)?;
        writeln!(f)?;

        writeln!(f, "--- Engine ---")?;
        writeln!(f, "Final simulated time: {} ms", self.engine.final_time)?;
        writeln!(f, "Evaluations: {}", self.engine.evaluations)?;
        writeln!(f, "Settled: {}", self.engine.settled)?;
        writeln!(f, "Non-converged: {}", self.engine.non_converged)?;
        writeln!(f, "Fallbacks: {}", self.engine.fallbacks)?;
        writeln!(f, "Timing events: {}", self.engine.events_emitted)?;

        if !self.schedulers.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Schedulers ---")?;
            for (name, stats) in &self.schedulers {
                writeln!(
                    f,
                    "{}: {} settles, {} gate evaluations, {} non-converged",
                    name, stats.settles, stats.gate_evaluations, stats.non_converged
                )?;
            }
        }

        if let Some(circuit) = &self.circuit {
            writeln!(f)?;
            writeln!(f, "--- Circuit ---")?;
            writeln!(f, "Gates: {}, Wires: {}", circuit.gate_count, circuit.wire_count)?;
            for (ty, count) in &circuit.gates_by_type {
                writeln!(f, "  {}: {}", ty, count)?;
            }
        }

        Ok(())
    }
}
