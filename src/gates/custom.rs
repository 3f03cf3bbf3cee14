//! Custom gates backed by a nested circuit.
//!
//! The gate's input slots drive the nested INPUT gates and its output slots
//! read the nested OUTPUT gates, both in ascending gate-id order. The nested
//! circuit settles through the same scheduler as the outer one.

use crate::executor::{self, EvalContext, EvalError};
use crate::gate::{CustomGate, GateKind};

use super::{input, Computed};

/// Drives `custom`'s nested circuit with `inputs` and settles it.
///
/// The returned kind carries the updated nested circuit. `settled` is false
/// when the nested circuit did not reach a fixed point.
pub fn evaluate(
    custom: &CustomGate,
    inputs: &[bool],
    ctx: &EvalContext,
) -> Result<Computed, EvalError> {
    let nested_ctx = ctx.nested()?;
    let mut next = custom.clone();

    for (slot, id) in next.input_gates().into_iter().enumerate() {
        let value = input(inputs, slot);
        if let Some(gate) = next.circuit.gate_mut(id) {
            if let GateKind::Input { value: current } = &mut gate.kind {
                if *current != value {
                    *current = value;
                    gate.dirty = true;
                }
            }
        }
    }

    let settlement = executor::settle(&mut next.circuit, &nested_ctx)?;
    if !settlement.converged {
        tracing::debug!(
            name = %next.name,
            depth = nested_ctx.depth,
            "Nested circuit did not settle"
        );
    }
    executor::refresh_wires(&mut next.circuit);

    let outputs = next
        .output_gates()
        .into_iter()
        .map(|id| next.circuit.output_value(id, 0).unwrap_or(false))
        .collect();

    Ok(Computed {
        outputs,
        kind: GateKind::Custom(Box::new(next)),
        settled: settlement.converged,
    })
}
