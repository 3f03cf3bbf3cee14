//! End-to-end tests: library gates, configuration, reporting, fallback.

use gatesim::{
    create_default_library, Circuit, Endpoint, EngineConfig, EngineConfigBuilder, GateId,
    GateKind, GateType, Outcome, Position, Simulator, Strategy, TruthTable,
};

/// Three INPUT gates feeding a FULL_ADDER, whose outputs drive two OUTPUT gates.
fn adder_circuit() -> (Circuit, [GateId; 3], GateId, GateId) {
    let library = create_default_library().unwrap();
    let mut circuit = Circuit::new();

    let a = circuit.add_gate(GateType::Input, Position::new(0.0, 0.0));
    let b = circuit.add_gate(GateType::Input, Position::new(0.0, 40.0));
    let cin = circuit.add_gate(GateType::Input, Position::new(0.0, 80.0));
    let adder = circuit.add_gate_with(
        library.instantiate("FULL_ADDER").unwrap(),
        Position::new(100.0, 40.0),
    );
    let sum = circuit.add_gate(GateType::Output, Position::new(200.0, 20.0));
    let cout = circuit.add_gate(GateType::Output, Position::new(200.0, 60.0));

    for (slot, input) in [a, b, cin].into_iter().enumerate() {
        circuit
            .add_wire(Endpoint::primary(input), Endpoint::new(adder, slot))
            .unwrap();
    }
    circuit
        .add_wire(Endpoint::new(adder, 0), Endpoint::new(sum, 0))
        .unwrap();
    circuit
        .add_wire(Endpoint::new(adder, 1), Endpoint::new(cout, 0))
        .unwrap();

    (circuit, [a, b, cin], sum, cout)
}

#[test]
fn test_full_adder_through_engine() {
    for strategy in [Strategy::Level, Strategy::EventDriven, Strategy::Auto] {
        let (mut circuit, inputs, sum, cout) = adder_circuit();
        let mut sim = Simulator::default();

        for row in 0..8u8 {
            let bits = [row & 4 != 0, row & 2 != 0, row & 1 != 0];
            for (id, bit) in inputs.iter().zip(bits) {
                circuit.set_input_value(*id, bit).unwrap();
            }
            let result = sim.evaluate_with(&circuit, strategy);
            assert!(result.is_settled(), "row {} under {:?}", row, strategy);
            circuit = result.circuit;

            let total = bits.iter().filter(|b| **b).count();
            assert_eq!(circuit.output_value(sum, 0), Some(total % 2 == 1), "row {}", row);
            assert_eq!(circuit.output_value(cout, 0), Some(total >= 2), "row {}", row);
        }
    }
}

#[test]
fn test_auto_uses_level_order_without_feedback() {
    let (circuit, _, _, _) = adder_circuit();
    let mut sim = Simulator::default();
    let settlement = sim.evaluate(&circuit).settlement.unwrap();
    assert_eq!(settlement.strategy, Strategy::Level);
    assert!(settlement.converged);
}

#[test]
fn test_unchanged_circuit_emits_no_events() {
    let (mut circuit, [a, b, _], sum, _) = adder_circuit();
    circuit.set_input_value(a, true).unwrap();
    circuit.set_input_value(b, false).unwrap();

    let mut sim = Simulator::default();
    let first = sim.evaluate(&circuit);
    assert!(first.events.iter().any(|e| e.gate == sum && e.value));

    let second = sim.evaluate(&first.circuit);
    assert!(second.events.is_empty());
    assert_eq!(second.circuit.output_value(sum, 0), Some(true));
    assert!(second.time > first.time);
}

#[test]
fn test_full_adder_truth_table_from_library() {
    let library = create_default_library().unwrap();
    let adder = library.get("FULL_ADDER").unwrap();

    let table = TruthTable::derive(adder, &EngineConfig::default()).unwrap();
    assert_eq!(table.rows.len(), 8);
    assert_eq!(table.input_names, vec!["A", "B", "CIN"]);
    assert_eq!(table.output_names, vec!["SUM", "COUT"]);

    assert_eq!(table.lookup(&[true, true, false]), Some(&[false, true][..]));
    assert_eq!(table.lookup(&[true, true, true]), Some(&[true, true][..]));

    let csv = table.to_csv();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "A,B,CIN,SUM,COUT");
    assert_eq!(lines[4], "0,1,1,0,1");
}

#[test]
fn test_config_from_yaml_drives_simulator() {
    let yaml = r#"
max_iterations: 4
strategy: level
time_step: 15
history_limit: 100
"#;
    let config = EngineConfig::from_yaml(yaml).unwrap();
    let mut sim = Simulator::new(config);

    let (circuit, _, _, _) = adder_circuit();
    let result = sim.run_steps(&circuit, 3);
    assert_eq!(result.time, 45);
    assert_eq!(result.settlement.unwrap().strategy, Strategy::Level);
    assert_eq!(sim.capture().history_limit(), Some(100));
}

#[test]
fn test_history_limit_drops_oldest_events() {
    // NOT ring through a one-sample DELAY: every gate toggles each call
    let mut circuit = Circuit::new();
    let mut chain: Vec<GateId> = (0..3)
        .map(|_| circuit.add_gate(GateType::Not, Position::default()))
        .collect();
    chain.push(circuit.add_gate_with(GateKind::delay(1), Position::default()));
    for i in 0..chain.len() {
        circuit
            .add_wire(
                Endpoint::primary(chain[i]),
                Endpoint::new(chain[(i + 1) % chain.len()], 0),
            )
            .unwrap();
    }

    let config = EngineConfigBuilder::new()
        .time_step(5)
        .history_limit(4)
        .build()
        .unwrap();
    let mut sim = Simulator::new(config);
    sim.run_steps(&circuit, 10);

    let capture = sim.capture();
    assert_eq!(capture.len(), 4);
    assert!(capture.dropped() > 0);
    assert_eq!(
        capture.dropped() + capture.len() as u64,
        sim.stats().events_emitted
    );

    // Retained events are the newest ones
    let times: Vec<u64> = capture.history().map(|e| e.time).collect();
    assert!(times.iter().all(|&t| t == 50));
}

#[test]
fn test_malformed_snapshot_falls_back() {
    let (circuit, _, _, _) = adder_circuit();
    let mut value: serde_json::Value = serde_json::from_str(&circuit.to_json().unwrap()).unwrap();
    value["wires"]["0"]["from"]["gate"] = serde_json::json!(999);

    // Bypass load-time validation to hand the engine a broken snapshot
    let broken: Circuit = serde_json::from_value(value).unwrap();

    let mut sim = Simulator::default();
    let result = sim.evaluate(&broken);
    assert!(matches!(result.outcome, Outcome::FellBack { .. }));
    assert!(result.events.is_empty());
    assert!(result.settlement.is_none());
    assert_eq!(result.circuit, broken);

    // The engine stays usable afterwards
    let ok = sim.evaluate(&circuit);
    assert!(ok.is_settled());
    assert_eq!(sim.stats().fallbacks, 1);
}

#[test]
fn test_session_report() {
    let (circuit, _, _, _) = adder_circuit();
    let mut sim = Simulator::default();
    sim.start();
    sim.run_steps(&circuit, 2);

    let mut report = sim.session_stats("adder");
    report.record_circuit(&circuit);

    assert_eq!(report.engine.evaluations, 2);
    assert_eq!(report.engine.settled, 2);
    assert_eq!(report.schedulers["level"].settles, 2);
    assert_eq!(report.schedulers["event"].settles, 0);

    let csv = report.to_csv();
    assert!(csv.starts_with("metric,value\n"));
    assert!(csv.contains("evaluations,2\n"));
    assert!(csv.contains("level.settles,2\n"));
    assert!(csv.contains("gate_count,6\n"));

    let summary = report.summary();
    assert!(summary.contains("Name: adder"));
    assert!(summary.contains("--- Circuit ---"));

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["metadata"]["name"], "adder");
    assert_eq!(json["circuit"]["wire_count"], 5);
}

/// An outer INPUT driving a custom gate whose body is INPUT -> DELAY -> OUTPUT.
fn delayed_custom(capacity: usize) -> (Circuit, GateId, GateId) {
    let mut body = Circuit::new();
    let inner = body.add_gate(GateType::Input, Position::default());
    let delay = body.add_gate_with(GateKind::delay(capacity), Position::default());
    let out = body.add_gate(GateType::Output, Position::default());
    body.add_wire(Endpoint::primary(inner), Endpoint::new(delay, 0)).unwrap();
    body.add_wire(Endpoint::primary(delay), Endpoint::new(out, 0)).unwrap();

    let mut circuit = Circuit::new();
    let a = circuit.add_gate(GateType::Input, Position::default());
    let custom = circuit.add_gate_with(GateKind::custom("LAG", body), Position::default());
    let sink = circuit.add_gate(GateType::Output, Position::default());
    circuit.add_wire(Endpoint::primary(a), Endpoint::new(custom, 0)).unwrap();
    circuit.add_wire(Endpoint::primary(custom), Endpoint::new(sink, 0)).unwrap();
    (circuit, a, sink)
}

#[test]
fn test_delay_inside_custom_gate_lags() {
    for strategy in [Strategy::Auto, Strategy::EventDriven] {
        let (mut circuit, a, sink) = delayed_custom(2);
        let mut sim = Simulator::default();

        let mut seen = Vec::new();
        for value in [true, true, true, false, false, false, false] {
            circuit.set_input_value(a, value).unwrap();
            let result = sim.evaluate_with(&circuit, strategy);
            assert!(result.is_settled(), "{:?}", strategy);
            circuit = result.circuit;
            seen.push(circuit.output_value(sink, 0).unwrap());
        }

        // The nested line advances once per evaluate call: two calls of lag
        assert_eq!(
            seen,
            vec![false, false, true, true, true, false, false],
            "{:?}",
            strategy
        );
    }
}

#[test]
fn test_configured_gate_defaults() {
    let yaml = "default_delay_capacity: 2\ndefault_counter_bits: 6";
    let config = EngineConfig::from_yaml(yaml).unwrap();

    let mut circuit = Circuit::new();
    let a = circuit.add_gate(GateType::Input, Position::default());
    let delay = circuit.add_gate_with(config.gate_kind(GateType::Delay), Position::default());
    let counter =
        circuit.add_gate_with(config.gate_kind(GateType::BinaryCounter), Position::default());
    circuit.add_wire(Endpoint::primary(a), Endpoint::new(delay, 0)).unwrap();
    assert_eq!(circuit.gate(counter).unwrap().outputs.len(), 6);

    let mut sim = Simulator::new(config);
    circuit.set_input_value(a, true).unwrap();
    let mut seen = Vec::new();
    for _ in 0..3 {
        circuit = sim.evaluate(&circuit).circuit;
        seen.push(circuit.output_value(delay, 0).unwrap());
    }
    assert_eq!(seen, vec![false, false, true]);
}
