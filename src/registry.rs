//! Named custom-gate definitions.
//!
//! The library stores nested circuits by name so they can be instantiated as
//! CUSTOM gates. Every instance owns its own copy of the nested circuit;
//! the library is only consulted when a gate is created.
//!
//! # Example
//!
//! ```
//! use gatesim::registry::create_default_library;
//! use gatesim::{Circuit, Position};
//!
//! let library = create_default_library().unwrap();
//! let mut circuit = Circuit::new();
//! let adder = circuit.add_gate_with(library.instantiate("FULL_ADDER").unwrap(), Position::default());
//! assert_eq!(circuit.gate(adder).unwrap().kind.input_count(), 3);
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

use crate::circuit::{Circuit, CircuitError, MAX_NESTING_DEPTH};
use crate::gate::{CustomGate, GateKind, GateType};
use crate::validator::ConnectionError;
use crate::wire::Endpoint;

/// Errors raised while defining or instantiating custom gates.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("custom gate name must not be empty")]
    EmptyName,

    #[error("custom gate {0} is already defined")]
    Duplicate(String),

    #[error("custom gate {0} contains itself")]
    SelfReference(String),

    #[error("custom gate {name} nests {depth} levels deep (limit {limit})")]
    TooDeep {
        name: String,
        depth: usize,
        limit: usize,
    },

    #[error("unknown custom gate {0}")]
    Unknown(String),

    #[error("invalid nested circuit: {0}")]
    Circuit(#[from] CircuitError),

    #[error("invalid wiring: {0}")]
    Connection(#[from] ConnectionError),
}

/// A library of custom gate definitions, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct CustomGateLibrary {
    definitions: BTreeMap<String, CustomGate>,
}

impl CustomGateLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `circuit` under `name`.
    ///
    /// Rejects empty and duplicate names, structurally invalid circuits, and
    /// circuits that contain (at any depth) a custom gate of the same name.
    pub fn define(&mut self, name: impl Into<String>, circuit: Circuit) -> Result<(), LibraryError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LibraryError::EmptyName);
        }
        if self.definitions.contains_key(&name) {
            return Err(LibraryError::Duplicate(name));
        }
        circuit.validate_structure()?;

        let mut definition = CustomGate::new(name.clone(), circuit);
        if definition.contains_definition(&name) {
            return Err(LibraryError::SelfReference(name));
        }
        let depth = definition.depth();
        if depth > MAX_NESTING_DEPTH {
            return Err(LibraryError::TooDeep {
                name,
                depth,
                limit: MAX_NESTING_DEPTH,
            });
        }

        definition.circuit.reset_all();
        tracing::debug!(
            name = %name,
            inputs = definition.input_gates().len(),
            outputs = definition.output_gates().len(),
            "Defined custom gate"
        );
        self.definitions.insert(name, definition);
        Ok(())
    }

    /// Creates a fresh CUSTOM gate kind from a definition.
    pub fn instantiate(&self, name: &str) -> Result<GateKind, LibraryError> {
        self.definitions
            .get(name)
            .map(|definition| GateKind::Custom(Box::new(definition.clone())))
            .ok_or_else(|| LibraryError::Unknown(name.to_string()))
    }

    /// Returns a definition by name.
    pub fn get(&self, name: &str) -> Option<&CustomGate> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Defined names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.definitions.keys()
    }

    /// Removes a definition. Existing instances keep their own copy.
    pub fn remove(&mut self, name: &str) -> bool {
        self.definitions.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.definitions.clear();
    }
}

/// Creates a library with the built-in definitions.
///
/// Includes:
/// - `HALF_ADDER` - inputs A, B; outputs SUM, CARRY
/// - `FULL_ADDER` - inputs A, B, CIN; outputs SUM, COUT (two half adders)
pub fn create_default_library() -> Result<CustomGateLibrary, LibraryError> {
    let mut library = CustomGateLibrary::new();
    library.define("HALF_ADDER", half_adder()?)?;
    let half = library.instantiate("HALF_ADDER")?;
    library.define("FULL_ADDER", full_adder(half)?)?;
    Ok(library)
}

fn half_adder() -> Result<Circuit, LibraryError> {
    let mut circuit = Circuit::new();
    let a = circuit.add_labeled(GateKind::Input { value: false }, "A");
    let b = circuit.add_labeled(GateKind::Input { value: false }, "B");
    let xor = circuit.add_labeled(GateKind::with_defaults(GateType::Xor), "XOR");
    let and = circuit.add_labeled(GateKind::with_defaults(GateType::And), "AND");
    let sum = circuit.add_labeled(GateKind::Output, "SUM");
    let carry = circuit.add_labeled(GateKind::Output, "CARRY");

    circuit.add_wire(Endpoint::primary(a), Endpoint::new(xor, 0))?;
    circuit.add_wire(Endpoint::primary(b), Endpoint::new(xor, 1))?;
    circuit.add_wire(Endpoint::primary(a), Endpoint::new(and, 0))?;
    circuit.add_wire(Endpoint::primary(b), Endpoint::new(and, 1))?;
    circuit.add_wire(Endpoint::primary(xor), Endpoint::new(sum, 0))?;
    circuit.add_wire(Endpoint::primary(and), Endpoint::new(carry, 0))?;
    Ok(circuit)
}

fn full_adder(half: GateKind) -> Result<Circuit, LibraryError> {
    let mut circuit = Circuit::new();
    let a = circuit.add_labeled(GateKind::Input { value: false }, "A");
    let b = circuit.add_labeled(GateKind::Input { value: false }, "B");
    let cin = circuit.add_labeled(GateKind::Input { value: false }, "CIN");
    let first = circuit.add_labeled(half.clone(), "HA1");
    let second = circuit.add_labeled(half, "HA2");
    let or = circuit.add_labeled(GateKind::with_defaults(GateType::Or), "OR");
    let sum = circuit.add_labeled(GateKind::Output, "SUM");
    let cout = circuit.add_labeled(GateKind::Output, "COUT");

    circuit.add_wire(Endpoint::primary(a), Endpoint::new(first, 0))?;
    circuit.add_wire(Endpoint::primary(b), Endpoint::new(first, 1))?;
    circuit.add_wire(Endpoint::primary(first), Endpoint::new(second, 0))?;
    circuit.add_wire(Endpoint::primary(cin), Endpoint::new(second, 1))?;
    circuit.add_wire(Endpoint::secondary(first), Endpoint::new(or, 0))?;
    circuit.add_wire(Endpoint::secondary(second), Endpoint::new(or, 1))?;
    circuit.add_wire(Endpoint::primary(second), Endpoint::new(sum, 0))?;
    circuit.add_wire(Endpoint::primary(or), Endpoint::new(cout, 0))?;
    Ok(circuit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Position;

    fn passthrough() -> Circuit {
        let mut circuit = Circuit::new();
        let a = circuit.add_gate(GateType::Input, Position::default());
        let out = circuit.add_gate(GateType::Output, Position::default());
        circuit.add_wire(Endpoint::primary(a), Endpoint::new(out, 0)).unwrap();
        circuit
    }

    #[test]
    fn test_define_and_instantiate() {
        let mut library = CustomGateLibrary::new();
        library.define("BUF", passthrough()).unwrap();

        assert!(library.contains("BUF"));
        assert_eq!(library.len(), 1);

        let kind = library.instantiate("BUF").unwrap();
        assert_eq!(kind.gate_type(), GateType::Custom);
        assert_eq!(kind.input_count(), 1);
        assert_eq!(kind.output_count(), 1);
    }

    #[test]
    fn test_rejects_bad_names() {
        let mut library = CustomGateLibrary::new();
        assert!(matches!(
            library.define("  ", passthrough()),
            Err(LibraryError::EmptyName)
        ));

        library.define("BUF", passthrough()).unwrap();
        assert!(matches!(
            library.define("BUF", passthrough()),
            Err(LibraryError::Duplicate(_))
        ));
    }

    #[test]
    fn test_rejects_self_containing_definition() {
        let mut library = CustomGateLibrary::new();
        library.define("LOOP", passthrough()).unwrap();

        // A new LOOP that embeds the old LOOP contains itself by name
        let mut outer = Circuit::new();
        outer.add_gate_with(library.instantiate("LOOP").unwrap(), Position::default());
        library.remove("LOOP");

        assert!(matches!(
            library.define("LOOP", outer),
            Err(LibraryError::SelfReference(_))
        ));
    }

    #[test]
    fn test_unknown_definition() {
        let library = CustomGateLibrary::new();
        assert!(matches!(
            library.instantiate("NOPE"),
            Err(LibraryError::Unknown(_))
        ));
    }

    #[test]
    fn test_default_library() {
        let library = create_default_library().unwrap();
        let names: Vec<&String> = library.names().collect();
        assert_eq!(names, vec!["FULL_ADDER", "HALF_ADDER"]);

        let full = library.get("FULL_ADDER").unwrap();
        assert_eq!(full.input_gates().len(), 3);
        assert_eq!(full.output_gates().len(), 2);
        assert_eq!(full.depth(), 2);
    }
}
