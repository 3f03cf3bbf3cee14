//! Evaluation scheduler trait and implementations.
//!
//! A [`Scheduler`] drives repeated application of the gate behavior library
//! over a circuit until signals stop changing or an iteration budget runs
//! out. Running out of budget is not an error: the circuit is left in its
//! last computed state and the [`Settlement`] is flagged as not converged.
//!
//! # Implementation Notes
//!
//! ## Level scheduler
//! - Orders gates topologically (Kahn), ignoring edges into DELAY, D_FF and
//!   BINARY_COUNTER gates since their outputs do not depend on their inputs
//!   while settling
//! - Gates left on combinational cycles follow in ascending id order
//! - Recomputes every gate per pass until a pass changes nothing
//!
//! ## Event scheduler
//! - Seeds a FIFO work queue with dirty gates, sources, and gates whose
//!   resolved inputs moved since they were last computed
//! - Enqueues fan-out only when a gate's output actually changes
//!
//! One full evaluation ([`step`]) is: advance DELAY lines, settle, apply
//! clock edges and settle again until no edge-triggered output moves, then
//! refresh the wires' cached values.

pub mod event;
pub mod level;

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::circuit::{Circuit, MAX_NESTING_DEPTH};
use crate::gate::GateKind;
use crate::gates::{self, delay};
use crate::types::{GateId, SimTime, SlotIndex, WireId};
use crate::wire::Endpoint;

pub use event::EventScheduler;
pub use level::LevelScheduler;

/// Evaluation strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Full passes over every gate until a fixed point
    Level,
    /// Dirty propagation through a work queue
    #[serde(rename = "event")]
    EventDriven,
    /// Level for acyclic circuits, event-driven when the wiring has feedback
    #[default]
    Auto,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Level => "level",
            Strategy::EventDriven => "event",
            Strategy::Auto => "auto",
        }
    }
}

/// Errors that abort an evaluation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("wire {wire} references missing gate {gate}")]
    DanglingWire { wire: WireId, gate: GateId },

    #[error("wire {wire} enters slot {slot} of gate {gate}, beyond its arity")]
    SlotOutOfRange {
        wire: WireId,
        gate: GateId,
        slot: SlotIndex,
    },

    #[error("gate {0} vanished during evaluation")]
    MissingGate(GateId),

    #[error("custom gates nested deeper than {0}")]
    NestingTooDeep(usize),
}

/// Per-evaluation parameters passed down to every gate.
#[derive(Clone, Copy, Debug)]
pub struct EvalContext {
    /// Simulated time of this evaluation
    pub time: SimTime,
    /// Requested strategy
    pub strategy: Strategy,
    /// Pass cap (level) and per-gate budget factor (event)
    pub max_iterations: usize,
    /// Custom-gate nesting depth, 0 at the top level
    pub depth: usize,
}

impl EvalContext {
    pub fn new(time: SimTime, strategy: Strategy, max_iterations: usize) -> Self {
        Self {
            time,
            strategy,
            max_iterations: max_iterations.max(1),
            depth: 0,
        }
    }

    /// Context for a circuit nested one level deeper.
    pub fn nested(&self) -> Result<Self, EvalError> {
        let depth = self.depth + 1;
        if depth > MAX_NESTING_DEPTH {
            return Err(EvalError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        Ok(Self { depth, ..*self })
    }
}

/// The outcome of settling a circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Strategy that actually ran
    pub strategy: Strategy,
    /// Whether a fixed point was reached within budget
    pub converged: bool,
    /// Full passes (level) or queue drains (event), summed over clock-edge
    /// rounds
    pub passes: usize,
    /// Individual gate recomputations
    pub gate_evaluations: u64,
}

/// The core trait for evaluation strategies.
pub trait Scheduler {
    /// The strategy this scheduler implements.
    fn strategy(&self) -> Strategy;

    /// Recomputes gates until the circuit reaches a fixed point or the
    /// budget is spent.
    fn settle(&mut self, circuit: &mut Circuit, ctx: &EvalContext) -> Result<Settlement, EvalError>;

    /// Export statistics collected across settles.
    fn export_stats(&self) -> serde_json::Value;

    /// Clear collected statistics.
    fn reset_stats(&mut self);
}

/// Wiring index built once per settle.
#[derive(Debug, Default)]
pub(crate) struct Netlist {
    /// Driving output per input slot
    drivers: HashMap<GateId, Vec<Option<Endpoint>>>,
    /// Distinct destination gates per source gate, in wire order
    fanout: HashMap<GateId, Vec<GateId>>,
}

impl Netlist {
    pub(crate) fn build(circuit: &Circuit) -> Result<Self, EvalError> {
        let mut netlist = Netlist::default();
        for gate in circuit.gates() {
            netlist
                .drivers
                .insert(gate.id, vec![None; gate.kind.input_count()]);
        }

        for wire in circuit.wires() {
            if circuit.gate(wire.from.gate).is_none() {
                return Err(EvalError::DanglingWire {
                    wire: wire.id,
                    gate: wire.from.gate,
                });
            }
            let slots = netlist
                .drivers
                .get_mut(&wire.to.gate)
                .ok_or(EvalError::DanglingWire {
                    wire: wire.id,
                    gate: wire.to.gate,
                })?;
            let slot = slots.get_mut(wire.to.slot).ok_or(EvalError::SlotOutOfRange {
                wire: wire.id,
                gate: wire.to.gate,
                slot: wire.to.slot,
            })?;
            *slot = Some(wire.from);

            let targets = netlist.fanout.entry(wire.from.gate).or_default();
            if !targets.contains(&wire.to.gate) {
                targets.push(wire.to.gate);
            }
        }

        Ok(netlist)
    }

    /// Current values on `id`'s input slots; unconnected slots read false.
    pub(crate) fn resolve(&self, circuit: &Circuit, id: GateId) -> Vec<bool> {
        self.drivers
            .get(&id)
            .map(|slots| {
                slots
                    .iter()
                    .map(|driver| {
                        driver
                            .and_then(|from| circuit.output_value(from.gate, from.slot))
                            .unwrap_or(false)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn fanout(&self, id: GateId) -> &[GateId] {
        self.fanout.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Kahn's algorithm over the wire graph.
    ///
    /// Returns the order and the number of gates that sit on cycles; those
    /// gates are appended in ascending id order. With `through_state`
    /// false, edges into gates that hold while settling are ignored.
    pub(crate) fn order(&self, circuit: &Circuit, through_state: bool) -> (Vec<GateId>, usize) {
        let follows = |dest: GateId| {
            through_state || !circuit.gate(dest).is_some_and(|g| g.kind.breaks_loops())
        };

        let mut in_degree: HashMap<GateId, usize> = circuit.gate_ids().map(|id| (id, 0)).collect();
        for (&src, targets) in &self.fanout {
            if !in_degree.contains_key(&src) {
                continue;
            }
            for &dest in targets {
                if follows(dest) {
                    if let Some(deg) = in_degree.get_mut(&dest) {
                        *deg += 1;
                    }
                }
            }
        }

        let mut queue: VecDeque<GateId> = circuit
            .gate_ids()
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();

        let mut order = Vec::with_capacity(circuit.gate_count());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for &next in self.fanout(id) {
                if !follows(next) {
                    continue;
                }
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        let cyclic = circuit.gate_count() - order.len();
        if cyclic > 0 {
            let placed: std::collections::HashSet<GateId> = order.iter().copied().collect();
            order.extend(circuit.gate_ids().filter(|id| !placed.contains(id)));
        }
        (order, cyclic)
    }
}

/// What recomputing a single gate did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct GateUpdate {
    /// Any output slot took a new value
    pub changed: bool,
    /// False when the gate's nested circuit did not settle
    pub settled: bool,
}

/// Recomputes one gate in place.
pub(crate) fn evaluate_gate(
    circuit: &mut Circuit,
    netlist: &Netlist,
    id: GateId,
    ctx: &EvalContext,
) -> Result<GateUpdate, EvalError> {
    let inputs = netlist.resolve(circuit, id);
    let gate = circuit.gate(id).ok_or(EvalError::MissingGate(id))?;
    let computed = gates::compute(&gate.kind, &inputs, ctx)?;

    let gate = circuit.gate_mut(id).ok_or(EvalError::MissingGate(id))?;
    let changed = gate.outputs != computed.outputs;
    gate.inputs = inputs;
    gate.outputs = computed.outputs;
    gate.kind = computed.kind;
    gate.dirty = false;
    Ok(GateUpdate {
        changed,
        settled: computed.settled,
    })
}

/// Applies pending clock edges to every D_FF and BINARY_COUNTER.
///
/// Inputs are resolved for all of them before any one moves, so a chain of
/// flip-flops on a shared clock shifts by exactly one stage per edge.
/// Returns true if any output changed.
pub fn clock_edges(circuit: &mut Circuit) -> Result<bool, EvalError> {
    let netlist = Netlist::build(circuit)?;
    let samples: Vec<(GateId, Vec<bool>)> = circuit
        .gates()
        .filter(|gate| gate.kind.is_edge_triggered())
        .map(|gate| (gate.id, netlist.resolve(circuit, gate.id)))
        .collect();

    let mut changed = false;
    for (id, inputs) in samples {
        let gate = circuit.gate_mut(id).ok_or(EvalError::MissingGate(id))?;
        if let Some(computed) = gates::clock_edge(&gate.kind, &inputs) {
            changed |= gate.outputs != computed.outputs;
            gate.inputs = inputs;
            gate.outputs = computed.outputs;
            gate.kind = computed.kind;
        }
    }
    Ok(changed)
}

/// Returns true if the wire graph contains any cycle, including cycles
/// through DELAY gates.
pub fn has_feedback(circuit: &Circuit) -> Result<bool, EvalError> {
    let netlist = Netlist::build(circuit)?;
    let (_, cyclic) = netlist.order(circuit, true);
    Ok(cyclic > 0)
}

/// Resolves [`Strategy::Auto`] for `circuit`.
pub fn resolve_strategy(circuit: &Circuit, requested: Strategy) -> Result<Strategy, EvalError> {
    match requested {
        Strategy::Auto => Ok(if has_feedback(circuit)? {
            Strategy::EventDriven
        } else {
            Strategy::Level
        }),
        other => Ok(other),
    }
}

/// Settles `circuit` with a fresh scheduler for the context's strategy.
pub fn settle(circuit: &mut Circuit, ctx: &EvalContext) -> Result<Settlement, EvalError> {
    match resolve_strategy(circuit, ctx.strategy)? {
        Strategy::Level => settle_with(circuit, &mut LevelScheduler::new(ctx.max_iterations), ctx),
        _ => settle_with(circuit, &mut EventScheduler::new(ctx.max_iterations), ctx),
    }
}

/// Settles, then alternates clock edges and settles until no edge moves an
/// output. More than `max_iterations` edge rounds counts as not converged.
pub fn settle_with(
    circuit: &mut Circuit,
    scheduler: &mut dyn Scheduler,
    ctx: &EvalContext,
) -> Result<Settlement, EvalError> {
    let mut settlement = scheduler.settle(circuit, ctx)?;
    let mut rounds = 0;
    while clock_edges(circuit)? {
        if rounds == ctx.max_iterations {
            tracing::debug!(rounds, "Clock edges kept rippling");
            settlement.converged = false;
            break;
        }
        rounds += 1;
        let next = scheduler.settle(circuit, ctx)?;
        settlement.converged &= next.converged;
        settlement.passes += next.passes;
        settlement.gate_evaluations += next.gate_evaluations;
    }
    Ok(settlement)
}

/// Shifts every DELAY line by one sample, recursing into custom gates.
///
/// All lines sample before any of them moves, so chained delays behave as
/// registers. Returns the top-level DELAY gates whose output changed.
pub fn advance(circuit: &mut Circuit) -> Result<Vec<GateId>, EvalError> {
    advance_at(circuit, 0)
}

fn advance_at(circuit: &mut Circuit, depth: usize) -> Result<Vec<GateId>, EvalError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(EvalError::NestingTooDeep(MAX_NESTING_DEPTH));
    }
    let netlist = Netlist::build(circuit)?;

    let samples: Vec<(GateId, bool)> = circuit
        .gates()
        .filter(|gate| matches!(gate.kind, GateKind::Delay(_)))
        .map(|gate| (gate.id, gates::input(&netlist.resolve(circuit, gate.id), 0)))
        .collect();

    let mut moved = Vec::new();
    for (id, sample) in samples {
        let gate = circuit.gate_mut(id).ok_or(EvalError::MissingGate(id))?;
        if let GateKind::Delay(line) = &gate.kind {
            let (next, output) = delay::shift(line, sample);
            if gate.outputs != [output] {
                moved.push(id);
            }
            gate.kind = GateKind::Delay(next);
            gate.inputs = vec![sample];
            gate.outputs = vec![output];
        }
    }

    for gate in circuit.gates_mut() {
        if let GateKind::Custom(custom) = &mut gate.kind {
            advance_at(&mut custom.circuit, depth + 1)?;
        }
    }

    Ok(moved)
}

/// Copies each wire's source value into its cached `is_active` flag.
pub fn refresh_wires(circuit: &mut Circuit) {
    let values: Vec<bool> = circuit
        .wires()
        .map(|wire| {
            circuit
                .output_value(wire.from.gate, wire.from.slot)
                .unwrap_or(false)
        })
        .collect();
    for (wire, value) in circuit.wires_mut().zip(values) {
        wire.is_active = value;
    }
}

/// One complete evaluation: advance, settle through clock edges, refresh
/// wires, clear dirty flags.
pub fn step(
    circuit: &mut Circuit,
    scheduler: &mut dyn Scheduler,
    ctx: &EvalContext,
) -> Result<Settlement, EvalError> {
    advance(circuit)?;
    let settlement = settle_with(circuit, scheduler, ctx)?;
    refresh_wires(circuit);
    for gate in circuit.gates_mut() {
        gate.dirty = false;
    }
    Ok(settlement)
}
