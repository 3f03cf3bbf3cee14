//! Integration tests for saving and reloading circuits mid-simulation.

use std::collections::BTreeMap;

use gatesim::gate::MAX_DELAY_CAPACITY;
use gatesim::{
    Circuit, CircuitError, Endpoint, GateId, GateKind, GateType, Position, Simulator,
};

/// INPUT -> DELAY(3) -> OUTPUT, plus a D flip-flop clocked by a second INPUT.
struct Fixture {
    circuit: Circuit,
    data: GateId,
    clock: GateId,
    delay: GateId,
    ff: GateId,
}

fn fixture() -> Fixture {
    let mut circuit = Circuit::new();
    let data = circuit.add_labeled(GateKind::Input { value: false }, "DATA");
    let clock = circuit.add_labeled(GateKind::Input { value: false }, "CLK");
    let delay = circuit.add_gate_with(GateKind::delay(3), Position::new(120.0, 40.0));
    let out = circuit.add_gate(GateType::Output, Position::new(240.0, 40.0));
    let ff = circuit.add_gate(GateType::DFlipFlop, Position::new(120.0, 160.0));

    circuit.add_wire(Endpoint::primary(data), Endpoint::new(delay, 0)).unwrap();
    circuit.add_wire(Endpoint::primary(delay), Endpoint::new(out, 0)).unwrap();
    circuit.add_wire(Endpoint::primary(data), Endpoint::new(ff, 0)).unwrap();
    circuit.add_wire(Endpoint::primary(clock), Endpoint::new(ff, 1)).unwrap();

    Fixture {
        circuit,
        data,
        clock,
        delay,
        ff,
    }
}

/// Runs the fixture into a state where DELAY history is mixed and the
/// flip-flop has seen a high clock.
fn primed() -> Fixture {
    let mut f = fixture();
    let mut sim = Simulator::default();
    for (data, clock) in [(true, false), (true, true), (false, true)] {
        f.circuit.set_input_value(f.data, data).unwrap();
        f.circuit.set_input_value(f.clock, clock).unwrap();
        f.circuit = sim.evaluate(&f.circuit).circuit;
    }
    f
}

fn outputs(circuit: &Circuit) -> BTreeMap<GateId, Vec<bool>> {
    circuit.gates().map(|g| (g.id, g.outputs.clone())).collect()
}

/// Evaluates once on a fresh simulator.
fn step(circuit: &Circuit) -> Circuit {
    Simulator::default().evaluate(circuit).circuit
}

#[test]
fn test_json_round_trip_resumes_identically() {
    let f = primed();
    let json = f.circuit.to_json().unwrap();
    let restored = Circuit::from_json(&json).unwrap();

    assert_eq!(restored, f.circuit);
    assert_eq!(outputs(&step(&restored)), outputs(&step(&f.circuit)));
}

#[test]
fn test_yaml_round_trip_resumes_identically() {
    let f = primed();
    let yaml = f.circuit.to_yaml().unwrap();
    let restored = Circuit::from_yaml(&yaml).unwrap();

    assert_eq!(outputs(&step(&restored)), outputs(&step(&f.circuit)));
}

#[test]
fn test_delay_history_survives_reload() {
    let f = primed();
    let restored = Circuit::from_json(&f.circuit.to_json().unwrap()).unwrap();

    let history = |c: &Circuit| match &c.gate(f.delay).unwrap().kind {
        GateKind::Delay(line) => line.history().collect::<Vec<_>>(),
        other => panic!("unexpected kind {:?}", other),
    };
    assert_eq!(history(&restored), history(&f.circuit));
    assert!(history(&restored).contains(&true));
}

#[test]
fn test_flip_flop_clock_memory_survives_reload() {
    let f = primed();
    let restored = Circuit::from_json(&f.circuit.to_json().unwrap()).unwrap();

    match &restored.gate(f.ff).unwrap().kind {
        GateKind::DFlipFlop(state) => {
            assert!(state.prev_clock);
            assert!(state.q);
        }
        other => panic!("unexpected kind {:?}", other),
    }

    // The clock is still high with D low: no new edge after reload
    let next = step(&restored);
    assert_eq!(next.output_value(f.ff, 0), Some(true));
}

#[test]
fn test_json_shape() {
    let f = fixture();
    let value: serde_json::Value = serde_json::from_str(&f.circuit.to_json().unwrap()).unwrap();

    let delay = &value["gates"][f.delay.to_string()];
    assert_eq!(delay["kind"]["type"], "DELAY");
    assert_eq!(delay["kind"]["state"]["capacity"], 3);
    assert_eq!(delay["position"]["x"], 120.0);

    let ff = &value["gates"][f.ff.to_string()];
    assert_eq!(ff["kind"]["type"], "D_FF");
    assert_eq!(ff["kind"]["state"]["prev_clock"], false);

    let data = &value["gates"][f.data.to_string()];
    assert_eq!(data["label"], "DATA");

    let wire = &value["wires"]["0"];
    assert_eq!(wire["from"]["gate"], f.data);
    assert_eq!(wire["is_active"], false);
}

#[test]
fn test_rejects_dangling_wire_on_load() {
    let f = fixture();
    let mut value: serde_json::Value =
        serde_json::from_str(&f.circuit.to_json().unwrap()).unwrap();
    value["wires"]["0"]["to"]["gate"] = serde_json::json!(99);

    let result = Circuit::from_json(&value.to_string());
    assert!(matches!(result, Err(CircuitError::Malformed(_))));
}

#[test]
fn test_rejects_double_driven_slot_on_load() {
    let f = fixture();
    let mut value: serde_json::Value =
        serde_json::from_str(&f.circuit.to_json().unwrap()).unwrap();
    // Point the DELAY->OUTPUT wire at the DELAY's own input, already driven
    value["wires"]["1"]["to"] = serde_json::json!({ "gate": f.delay, "slot": 0 });

    assert!(Circuit::from_json(&value.to_string()).is_err());
}

#[test]
fn test_file_round_trip() {
    let f = primed();
    let dir = std::env::temp_dir();
    let json_path = dir.join(format!("gatesim-{}.json", std::process::id()));
    let yaml_path = dir.join(format!("gatesim-{}.yaml", std::process::id()));

    f.circuit.to_file(&json_path).unwrap();
    f.circuit.to_file(&yaml_path).unwrap();
    let from_json = Circuit::from_file(&json_path).unwrap();
    let from_yaml = Circuit::from_file(&yaml_path).unwrap();
    std::fs::remove_file(&json_path).ok();
    std::fs::remove_file(&yaml_path).ok();

    assert_eq!(outputs(&from_json), outputs(&f.circuit));
    assert_eq!(outputs(&from_yaml), outputs(&f.circuit));

    assert!(matches!(
        f.circuit.to_file(dir.join("circuit.txt")),
        Err(CircuitError::UnknownFormat(_))
    ));
}

#[test]
fn test_ids_continue_after_reload() {
    let f = fixture();
    let mut restored = Circuit::from_json(&f.circuit.to_json().unwrap()).unwrap();
    let new_gate = restored.add_gate(GateType::Not, Position::default());
    assert!(f.circuit.gate(new_gate).is_none());
}

/// A clocked counter saved to JSON, ready for tampering.
fn counter_json() -> (serde_json::Value, GateId) {
    let mut circuit = Circuit::new();
    let clock = circuit.add_gate(GateType::Input, Position::default());
    let counter = circuit.add_gate_with(GateKind::counter(4), Position::default());
    circuit
        .add_wire(Endpoint::primary(clock), Endpoint::new(counter, 0))
        .unwrap();
    let value = serde_json::from_str(&circuit.to_json().unwrap()).unwrap();
    (value, counter)
}

#[test]
fn test_rejects_oversized_counter_on_load() {
    for bits in [0, 33, 64, 70] {
        let (mut value, counter) = counter_json();
        value["gates"][counter.to_string()]["kind"]["state"]["bit_count"] = serde_json::json!(bits);

        let result = Circuit::from_json(&value.to_string());
        assert!(matches!(result, Err(CircuitError::Malformed(_))), "{} bits", bits);
    }
}

#[test]
fn test_counter_value_wrapped_on_load() {
    let (mut value, counter) = counter_json();
    value["gates"][counter.to_string()]["kind"]["state"]["value"] = serde_json::json!(21);

    let restored = Circuit::from_json(&value.to_string()).unwrap();
    match &restored.gate(counter).unwrap().kind {
        GateKind::BinaryCounter(state) => assert_eq!(state.value, 5),
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn test_oversized_counter_snapshot_evaluates() {
    let (mut value, counter) = counter_json();
    value["gates"][counter.to_string()]["kind"]["state"]["bit_count"] = serde_json::json!(64);

    // Bypass load-time validation
    let snapshot: Circuit = serde_json::from_value(value).unwrap();
    let result = Simulator::default().evaluate(&snapshot);
    assert!(result.is_settled());
    assert_eq!(result.circuit.gate(counter).unwrap().outputs.len(), 32);
}

#[test]
fn test_rejects_oversized_delay_on_load() {
    let f = fixture();
    let mut value: serde_json::Value =
        serde_json::from_str(&f.circuit.to_json().unwrap()).unwrap();
    value["gates"][f.delay.to_string()]["kind"]["state"]["capacity"] =
        serde_json::json!(MAX_DELAY_CAPACITY + 1);

    let result = Circuit::from_json(&value.to_string());
    assert!(matches!(result, Err(CircuitError::Malformed(_))));

    // Zero is raised to a single sample
    value["gates"][f.delay.to_string()]["kind"]["state"]["capacity"] = serde_json::json!(0);
    let restored = Circuit::from_json(&value.to_string()).unwrap();
    match &restored.gate(f.delay).unwrap().kind {
        GateKind::Delay(line) => assert_eq!(line.capacity(), 1),
        other => panic!("unexpected kind {:?}", other),
    }
}
