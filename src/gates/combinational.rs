//! Stateless boolean gates.

use crate::gate::GateType;

use super::input;

/// Evaluates a two-input (or, for NOT, one-input) boolean gate.
///
/// Non-boolean types evaluate to false.
pub fn boolean(ty: GateType, inputs: &[bool]) -> bool {
    let a = input(inputs, 0);
    let b = input(inputs, 1);
    match ty {
        GateType::And => a && b,
        GateType::Or => a || b,
        GateType::Not => !a,
        GateType::Xor => a ^ b,
        GateType::Nand => !(a && b),
        GateType::Nor => !(a || b),
        GateType::Xnor => !(a ^ b),
        _ => false,
    }
}

/// 2:1 multiplexer over inputs `[A, B, SEL]`: A when SEL is low, B when high.
pub fn mux(inputs: &[bool]) -> bool {
    if input(inputs, 2) {
        input(inputs, 1)
    } else {
        input(inputs, 0)
    }
}
