//! Gate definitions.
//!
//! A gate is identified by its [`GateKind`], a closed enumeration with one
//! variant per gate type. Stateful variants carry their own internal-state
//! record, so every gate type's behavior is reached through one exhaustive
//! match in [`crate::gates`].

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::circuit::Circuit;
use crate::types::{GateId, SimTime};

/// Default bit width for a freshly created binary counter.
pub const DEFAULT_COUNTER_BITS: u8 = 4;

/// Widest supported binary counter.
pub const MAX_COUNTER_BITS: u8 = 32;

/// Default history length for a freshly created delay line.
pub const DEFAULT_DELAY_CAPACITY: usize = 3;

/// Longest supported delay line.
pub const MAX_DELAY_CAPACITY: usize = 4096;

/// Default clock frequency in Hz.
pub const DEFAULT_CLOCK_HZ: f64 = 1.0;

/// Field-less gate type tag, as used by editing operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateType {
    Input,
    Output,
    And,
    Or,
    Not,
    Xor,
    Nand,
    Nor,
    Xnor,
    Clock,
    #[serde(rename = "D_FF")]
    DFlipFlop,
    SrLatch,
    #[serde(rename = "MUX_2TO1")]
    Mux2To1,
    Delay,
    BinaryCounter,
    Custom,
}

impl GateType {
    /// All gate types, in declaration order.
    pub const ALL: [GateType; 16] = [
        GateType::Input,
        GateType::Output,
        GateType::And,
        GateType::Or,
        GateType::Not,
        GateType::Xor,
        GateType::Nand,
        GateType::Nor,
        GateType::Xnor,
        GateType::Clock,
        GateType::DFlipFlop,
        GateType::SrLatch,
        GateType::Mux2To1,
        GateType::Delay,
        GateType::BinaryCounter,
        GateType::Custom,
    ];

    /// Returns the canonical upper-case name of this type.
    pub fn name(&self) -> &'static str {
        match self {
            GateType::Input => "INPUT",
            GateType::Output => "OUTPUT",
            GateType::And => "AND",
            GateType::Or => "OR",
            GateType::Not => "NOT",
            GateType::Xor => "XOR",
            GateType::Nand => "NAND",
            GateType::Nor => "NOR",
            GateType::Xnor => "XNOR",
            GateType::Clock => "CLOCK",
            GateType::DFlipFlop => "D_FF",
            GateType::SrLatch => "SR_LATCH",
            GateType::Mux2To1 => "MUX_2TO1",
            GateType::Delay => "DELAY",
            GateType::BinaryCounter => "BINARY_COUNTER",
            GateType::Custom => "CUSTOM",
        }
    }

    /// Returns true for the stateless boolean gates.
    pub fn is_combinational(&self) -> bool {
        matches!(
            self,
            GateType::And
                | GateType::Or
                | GateType::Not
                | GateType::Xor
                | GateType::Nand
                | GateType::Nor
                | GateType::Xnor
                | GateType::Mux2To1
                | GateType::Output
        )
    }
}

impl fmt::Display for GateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position on the editing canvas. Carried for display only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Internal state of a CLOCK gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClockState {
    /// Frequency in Hz
    pub frequency_hz: f64,
    /// Whether the clock is currently toggling
    pub running: bool,
    /// Simulated time the current period started at; latched on the first
    /// evaluation after creation or reset
    #[serde(default)]
    pub start_time: Option<SimTime>,
    /// Last emitted level, held while stopped
    #[serde(default)]
    pub level: bool,
}

impl ClockState {
    pub fn new(frequency_hz: f64) -> Self {
        Self {
            frequency_hz,
            running: true,
            start_time: None,
            level: false,
        }
    }

    /// Half period in simulated milliseconds: `1000 / (2 * hz)`.
    pub fn half_period_ms(&self) -> f64 {
        1000.0 / (2.0 * self.frequency_hz)
    }
}

impl Default for ClockState {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_HZ)
    }
}

/// Internal state of a D flip-flop.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DFlipFlopState {
    /// Latched output
    pub q: bool,
    /// Clock level seen on the previous evaluation
    pub prev_clock: bool,
}

/// Internal state of an SR latch.
///
/// Q̄ is stored rather than derived so that a reader of the snapshot always
/// sees the pair the latch last produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrLatchState {
    pub q: bool,
    pub q_bar: bool,
}

impl Default for SrLatchState {
    fn default() -> Self {
        Self { q: false, q_bar: true }
    }
}

/// Fixed-capacity history of sampled input values.
///
/// The history always holds exactly `capacity` entries, oldest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayLine {
    capacity: usize,
    history: VecDeque<bool>,
}

impl DelayLine {
    /// Creates a delay line pre-filled with `capacity` false values.
    /// The capacity is clamped to `1..=MAX_DELAY_CAPACITY`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_DELAY_CAPACITY);
        Self {
            capacity,
            history: std::iter::repeat(false).take(capacity).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest retained entry, which is the line's current output.
    pub fn output(&self) -> bool {
        self.history.front().copied().unwrap_or(false)
    }

    /// Pushes `input`, evicts the oldest entry once over capacity, and
    /// returns the new output.
    pub fn shift(&mut self, input: bool) -> bool {
        self.history.push_back(input);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        self.output()
    }

    /// Snapshot of the history, oldest first.
    pub fn history(&self) -> impl Iterator<Item = bool> + '_ {
        self.history.iter().copied()
    }

    /// Changes the capacity, keeping the newest entries.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.clamp(1, MAX_DELAY_CAPACITY);
        self.normalize();
    }

    /// Refills the history with false values.
    pub fn clear(&mut self) {
        self.history = std::iter::repeat(false).take(self.capacity).collect();
    }

    /// Re-normalizes a history loaded from storage to exactly `capacity`
    /// entries, padding with false at the old end.
    pub(crate) fn normalize(&mut self) {
        self.capacity = self.capacity.clamp(1, MAX_DELAY_CAPACITY);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        while self.history.len() < self.capacity {
            self.history.push_front(false);
        }
    }
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_CAPACITY)
    }
}

/// Internal state of a binary counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    /// Width in bits (1..=32)
    pub bit_count: u8,
    /// Current value, always below `2^bit_count`
    pub value: u64,
    /// Clock level seen on the previous evaluation
    pub prev_clock: bool,
}

impl CounterState {
    pub fn new(bit_count: u8) -> Self {
        Self {
            bit_count: bit_count.clamp(1, MAX_COUNTER_BITS),
            value: 0,
            prev_clock: false,
        }
    }

    /// Effective width. A `bit_count` outside `1..=MAX_COUNTER_BITS` read
    /// from storage is treated as the nearest bound.
    pub fn width(&self) -> u8 {
        self.bit_count.clamp(1, MAX_COUNTER_BITS)
    }

    pub fn modulus(&self) -> u64 {
        1u64 << self.width()
    }

    /// Output bits, least-significant bit first.
    pub fn bits(&self) -> Vec<bool> {
        (0..self.width())
            .map(|bit| (self.value >> bit) & 1 == 1)
            .collect()
    }

    /// Brings a counter loaded from storage back within its bounds.
    pub(crate) fn normalize(&mut self) {
        self.bit_count = self.width();
        self.value %= self.modulus();
    }
}

impl Default for CounterState {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTER_BITS)
    }
}

/// A gate whose behavior is a nested circuit.
///
/// External input slots map to the nested circuit's INPUT gates and output
/// slots to its OUTPUT gates, each in ascending gate-id order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomGate {
    /// Definition name
    pub name: String,
    /// The owned nested circuit
    pub circuit: Circuit,
}

impl CustomGate {
    pub fn new(name: impl Into<String>, circuit: Circuit) -> Self {
        Self {
            name: name.into(),
            circuit,
        }
    }

    /// Nested INPUT gates, in slot order.
    pub fn input_gates(&self) -> Vec<GateId> {
        self.circuit.gate_ids_of(GateType::Input)
    }

    /// Nested OUTPUT gates, in slot order.
    pub fn output_gates(&self) -> Vec<GateId> {
        self.circuit.gate_ids_of(GateType::Output)
    }

    /// Returns true if this gate's nested circuit contains, at any depth, a
    /// custom gate called `name`.
    pub fn contains_definition(&self, name: &str) -> bool {
        self.circuit.gates().any(|gate| match &gate.kind {
            GateKind::Custom(inner) => inner.name == name || inner.contains_definition(name),
            _ => false,
        })
    }

    /// Maximum nesting depth below this gate (1 for a flat nested circuit).
    pub fn depth(&self) -> usize {
        1 + self
            .circuit
            .gates()
            .filter_map(|gate| match &gate.kind {
                GateKind::Custom(inner) => Some(inner.depth()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }
}

/// A gate's type together with its internal state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateKind {
    Input { value: bool },
    Output,
    And,
    Or,
    Not,
    Xor,
    Nand,
    Nor,
    Xnor,
    Clock(ClockState),
    #[serde(rename = "D_FF")]
    DFlipFlop(DFlipFlopState),
    SrLatch(SrLatchState),
    #[serde(rename = "MUX_2TO1")]
    Mux2To1,
    Delay(DelayLine),
    BinaryCounter(CounterState),
    Custom(Box<CustomGate>),
}

impl GateKind {
    /// Creates a gate kind with type-specific default state.
    pub fn with_defaults(ty: GateType) -> Self {
        match ty {
            GateType::Input => GateKind::Input { value: false },
            GateType::Output => GateKind::Output,
            GateType::And => GateKind::And,
            GateType::Or => GateKind::Or,
            GateType::Not => GateKind::Not,
            GateType::Xor => GateKind::Xor,
            GateType::Nand => GateKind::Nand,
            GateType::Nor => GateKind::Nor,
            GateType::Xnor => GateKind::Xnor,
            GateType::Clock => GateKind::Clock(ClockState::default()),
            GateType::DFlipFlop => GateKind::DFlipFlop(DFlipFlopState::default()),
            GateType::SrLatch => GateKind::SrLatch(SrLatchState::default()),
            GateType::Mux2To1 => GateKind::Mux2To1,
            GateType::Delay => GateKind::Delay(DelayLine::default()),
            GateType::BinaryCounter => GateKind::BinaryCounter(CounterState::default()),
            GateType::Custom => GateKind::Custom(Box::default()),
        }
    }

    /// A delay line with the given capacity.
    pub fn delay(capacity: usize) -> Self {
        GateKind::Delay(DelayLine::new(capacity))
    }

    /// A clock running at `frequency_hz`.
    pub fn clock(frequency_hz: f64) -> Self {
        GateKind::Clock(ClockState::new(frequency_hz))
    }

    /// A binary counter with `bit_count` output bits.
    pub fn counter(bit_count: u8) -> Self {
        GateKind::BinaryCounter(CounterState::new(bit_count))
    }

    /// A custom gate wrapping `circuit`.
    pub fn custom(name: impl Into<String>, circuit: Circuit) -> Self {
        GateKind::Custom(Box::new(CustomGate::new(name, circuit)))
    }

    /// Returns the field-less type tag.
    pub fn gate_type(&self) -> GateType {
        match self {
            GateKind::Input { .. } => GateType::Input,
            GateKind::Output => GateType::Output,
            GateKind::And => GateType::And,
            GateKind::Or => GateType::Or,
            GateKind::Not => GateType::Not,
            GateKind::Xor => GateType::Xor,
            GateKind::Nand => GateType::Nand,
            GateKind::Nor => GateType::Nor,
            GateKind::Xnor => GateType::Xnor,
            GateKind::Clock(_) => GateType::Clock,
            GateKind::DFlipFlop(_) => GateType::DFlipFlop,
            GateKind::SrLatch(_) => GateType::SrLatch,
            GateKind::Mux2To1 => GateType::Mux2To1,
            GateKind::Delay(_) => GateType::Delay,
            GateKind::BinaryCounter(_) => GateType::BinaryCounter,
            GateKind::Custom(_) => GateType::Custom,
        }
    }

    /// Number of input slots.
    pub fn input_count(&self) -> usize {
        match self {
            GateKind::Input { .. } | GateKind::Clock(_) => 0,
            GateKind::Output | GateKind::Not | GateKind::Delay(_) | GateKind::BinaryCounter(_) => 1,
            GateKind::And
            | GateKind::Or
            | GateKind::Xor
            | GateKind::Nand
            | GateKind::Nor
            | GateKind::Xnor
            | GateKind::DFlipFlop(_)
            | GateKind::SrLatch(_) => 2,
            GateKind::Mux2To1 => 3,
            GateKind::Custom(custom) => custom.input_gates().len(),
        }
    }

    /// Number of output slots.
    pub fn output_count(&self) -> usize {
        match self {
            GateKind::SrLatch(_) => 2,
            GateKind::BinaryCounter(state) => state.width() as usize,
            GateKind::Custom(custom) => custom.output_gates().len(),
            _ => 1,
        }
    }

    /// Output values implied by the internal state alone, used for freshly
    /// created or reset gates before their first evaluation.
    pub fn resting_outputs(&self) -> Vec<bool> {
        match self {
            GateKind::Input { value } => vec![*value],
            GateKind::Clock(clock) => vec![clock.level],
            GateKind::DFlipFlop(ff) => vec![ff.q],
            GateKind::SrLatch(latch) => vec![latch.q, latch.q_bar],
            GateKind::Delay(line) => vec![line.output()],
            GateKind::BinaryCounter(counter) => counter.bits(),
            GateKind::Custom(custom) => custom
                .output_gates()
                .into_iter()
                .map(|id| custom.circuit.output_value(id, 0).unwrap_or(false))
                .collect(),
            other => vec![false; other.output_count()],
        }
    }

    /// Restores type-default internal state, keeping configuration such as
    /// clock frequency, delay capacity and counter width.
    pub fn reset(&mut self) {
        match self {
            GateKind::Input { value } => *value = false,
            GateKind::Clock(clock) => *clock = ClockState::new(clock.frequency_hz),
            GateKind::DFlipFlop(ff) => *ff = DFlipFlopState::default(),
            GateKind::SrLatch(latch) => *latch = SrLatchState::default(),
            GateKind::Delay(line) => line.clear(),
            GateKind::BinaryCounter(counter) => *counter = CounterState::new(counter.bit_count),
            GateKind::Custom(custom) => custom.circuit.reset_all(),
            GateKind::Output
            | GateKind::And
            | GateKind::Or
            | GateKind::Not
            | GateKind::Xor
            | GateKind::Nand
            | GateKind::Nor
            | GateKind::Xnor
            | GateKind::Mux2To1 => {}
        }
    }

    /// Gates that may be wired directly into themselves.
    pub fn allows_self_feedback(&self) -> bool {
        matches!(
            self,
            GateKind::Delay(_)
                | GateKind::DFlipFlop(_)
                | GateKind::SrLatch(_)
                | GateKind::BinaryCounter(_)
        )
    }

    /// Gates whose presence turns a feedback loop into a well-defined
    /// sequential loop rather than a combinational one.
    pub fn breaks_loops(&self) -> bool {
        matches!(
            self,
            GateKind::Delay(_) | GateKind::DFlipFlop(_) | GateKind::BinaryCounter(_)
        )
    }

    /// Gates that hold their outputs while a circuit settles and move only
    /// on a rising clock edge.
    pub fn is_edge_triggered(&self) -> bool {
        matches!(self, GateKind::DFlipFlop(_) | GateKind::BinaryCounter(_))
    }

    /// Gates that produce values without any input: seeds for event-driven
    /// evaluation.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            GateKind::Input { .. } | GateKind::Clock(_) | GateKind::Custom(_)
        )
    }
}

/// A gate instance in a circuit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    /// Unique identifier within the owning circuit
    pub id: GateId,
    /// Type and internal state
    pub kind: GateKind,
    /// Canvas position (display only)
    #[serde(default)]
    pub position: Position,
    /// Optional display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Input values resolved on the last evaluation
    #[serde(default)]
    pub inputs: Vec<bool>,
    /// Output values produced by the last evaluation
    #[serde(default)]
    pub outputs: Vec<bool>,
    /// Set by edits; cleared once the gate has been evaluated
    #[serde(default)]
    pub dirty: bool,
}

impl Gate {
    /// Creates a gate with resting outputs, marked dirty.
    pub fn new(id: GateId, kind: GateKind, position: Position) -> Self {
        let inputs = vec![false; kind.input_count()];
        let outputs = kind.resting_outputs();
        Self {
            id,
            kind,
            position,
            label: None,
            inputs,
            outputs,
            dirty: true,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn gate_type(&self) -> GateType {
        self.kind.gate_type()
    }

    /// Value of output `slot`, or `None` if the slot does not exist.
    pub fn output(&self, slot: usize) -> Option<bool> {
        self.outputs.get(slot).copied()
    }

    /// Re-sizes the cached input and output vectors to the kind's arity.
    pub(crate) fn fit_arity(&mut self) {
        self.inputs.resize(self.kind.input_count(), false);
        let outputs = self.kind.output_count();
        if self.outputs.len() != outputs {
            self.outputs = self.kind.resting_outputs();
        }
    }
}
