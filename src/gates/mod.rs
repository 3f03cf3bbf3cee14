//! Gate behavior library.
//!
//! [`compute`] maps a gate's kind (type plus internal state) and its resolved
//! input values to new output values and a new internal state. It is pure:
//! simulated time arrives through [`EvalContext`], never from a wall clock.
//!
//! # Families
//!
//! - [`combinational`] - AND/OR/NOT/XOR/NAND/NOR/XNOR, MUX, OUTPUT
//! - [`clock`] - periodic CLOCK sources
//! - [`sequential`] - D flip-flop, SR latch, binary counter
//! - [`delay`] - DELAY lines
//! - [`custom`] - nested circuits
//!
//! A DELAY line holds its output while a circuit settles; it only moves when
//! the evaluation advances (see [`delay::shift`]). That is what lets DELAY
//! break feedback loops into well-defined oscillators.
//!
//! Edge-triggered gates (D flip-flop, binary counter) also hold while
//! settling. Their edges are applied by [`clock_edge`] once the circuit is
//! stable, for every such gate at the same instant.

pub mod clock;
pub mod combinational;
pub mod custom;
pub mod delay;
pub mod sequential;

use crate::executor::{EvalContext, EvalError};
use crate::gate::GateKind;

/// The result of computing one gate.
#[derive(Clone, Debug, PartialEq)]
pub struct Computed {
    /// New output values, one per output slot
    pub outputs: Vec<bool>,
    /// New type and internal state
    pub kind: GateKind,
    /// False when a nested circuit ran out of budget before settling
    pub settled: bool,
}

impl Computed {
    fn new(outputs: Vec<bool>, kind: GateKind) -> Self {
        Self {
            outputs,
            kind,
            settled: true,
        }
    }

    fn stateless(kind: &GateKind, output: bool) -> Self {
        Self::new(vec![output], kind.clone())
    }
}

/// Value of input slot `slot`; missing slots read as false.
pub fn input(inputs: &[bool], slot: usize) -> bool {
    inputs.get(slot).copied().unwrap_or(false)
}

/// Computes a gate's outputs and next internal state.
pub fn compute(kind: &GateKind, inputs: &[bool], ctx: &EvalContext) -> Result<Computed, EvalError> {
    let computed = match kind {
        GateKind::Input { value } => Computed::stateless(kind, *value),
        GateKind::Output => Computed::stateless(kind, input(inputs, 0)),
        GateKind::And
        | GateKind::Or
        | GateKind::Not
        | GateKind::Xor
        | GateKind::Nand
        | GateKind::Nor
        | GateKind::Xnor => {
            Computed::stateless(kind, combinational::boolean(kind.gate_type(), inputs))
        }
        GateKind::Mux2To1 => Computed::stateless(kind, combinational::mux(inputs)),
        GateKind::Clock(state) => {
            let next = clock::tick(state, ctx.time);
            Computed::new(vec![next.level], GateKind::Clock(next))
        }
        GateKind::DFlipFlop(state) => Computed::stateless(kind, state.q),
        GateKind::SrLatch(state) => {
            let next = sequential::sr_latch(state, input(inputs, 0), input(inputs, 1));
            Computed::new(vec![next.q, next.q_bar], GateKind::SrLatch(next))
        }
        GateKind::Delay(line) => Computed::stateless(kind, line.output()),
        GateKind::BinaryCounter(state) => Computed::new(state.bits(), kind.clone()),
        GateKind::Custom(custom) => custom::evaluate(custom, inputs, ctx)?,
    };
    Ok(computed)
}

/// Applies the clock input of an edge-triggered gate.
///
/// `inputs` must be the values present at the edge, resolved before any
/// other edge-triggered gate moved. Returns `None` for every other kind.
pub fn clock_edge(kind: &GateKind, inputs: &[bool]) -> Option<Computed> {
    match kind {
        GateKind::DFlipFlop(state) => {
            let next = sequential::d_flip_flop(state, input(inputs, 0), input(inputs, 1));
            Some(Computed::new(vec![next.q], GateKind::DFlipFlop(next)))
        }
        GateKind::BinaryCounter(state) => {
            let next = sequential::counter(state, input(inputs, 0));
            Some(Computed::new(next.bits(), GateKind::BinaryCounter(next)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Strategy;
    use crate::gate::{GateType, SrLatchState};

    fn ctx() -> EvalContext {
        EvalContext::new(0, Strategy::Auto, 10)
    }

    #[test]
    fn test_missing_inputs_read_false() {
        let out = compute(&GateKind::Or, &[], &ctx()).unwrap();
        assert_eq!(out.outputs, vec![false]);

        let out = compute(&GateKind::Not, &[], &ctx()).unwrap();
        assert_eq!(out.outputs, vec![true]);
    }

    #[test]
    fn test_input_mirrors_external_value() {
        let out = compute(&GateKind::Input { value: true }, &[], &ctx()).unwrap();
        assert_eq!(out.outputs, vec![true]);
    }

    #[test]
    fn test_output_mirrors_input() {
        let out = compute(&GateKind::Output, &[true], &ctx()).unwrap();
        assert_eq!(out.outputs, vec![true]);
    }

    #[test]
    fn test_latch_exposes_both_outputs() {
        let kind = GateKind::SrLatch(SrLatchState::default());
        let out = compute(&kind, &[true, false], &ctx()).unwrap();
        assert_eq!(out.outputs, vec![true, false]);
    }

    #[test]
    fn test_delay_holds_while_settling() {
        let kind = GateKind::with_defaults(GateType::Delay);
        let out = compute(&kind, &[true], &ctx()).unwrap();
        assert_eq!(out.outputs, vec![false]);
        assert_eq!(out.kind, kind);
    }

    #[test]
    fn test_flip_flop_holds_while_settling() {
        let kind = GateKind::with_defaults(GateType::DFlipFlop);
        let out = compute(&kind, &[true, true], &ctx()).unwrap();
        assert_eq!(out.outputs, vec![false]);
        assert_eq!(out.kind, kind);

        let edged = clock_edge(&kind, &[true, true]).unwrap();
        assert_eq!(edged.outputs, vec![true]);
        assert!(clock_edge(&GateKind::Not, &[true]).is_none());
    }

    #[test]
    fn test_every_type_produces_declared_outputs() {
        for ty in GateType::ALL {
            let kind = GateKind::with_defaults(ty);
            let inputs = vec![false; kind.input_count()];
            let out = compute(&kind, &inputs, &ctx()).unwrap();
            assert_eq!(out.outputs.len(), kind.output_count(), "{}", ty);
        }
    }
}
