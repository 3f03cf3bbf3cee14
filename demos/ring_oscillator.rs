//! Ring oscillator example.
//!
//! Three inverters are closed into a ring through a DELAY gate. Each
//! evaluation the DELAY releases the value it sampled earlier, so the ring
//! toggles at a rate set by the DELAY capacity. A 10 Hz clock drives a
//! binary counter alongside it. The waveforms recorded by the timing
//! capture are printed at the end, followed by the session statistics.

use gatesim::{
    Circuit, Endpoint, EngineConfig, EngineConfigBuilder, GateId, GateKind, GateType, Position,
    Simulator,
};

const RING_LENGTH: usize = 3;
const DELAY_CAPACITY: usize = 2;
const CLOCK_HZ: f64 = 10.0;
const COUNTER_BITS: u8 = 3;
const EVALUATIONS: usize = 24;

// -----------------------------------------------------------------------------
// Circuit construction
// -----------------------------------------------------------------------------

struct Demo {
    circuit: Circuit,
    tap: GateId,
    clock: GateId,
    counter: GateId,
}

fn build(config: &EngineConfig) -> Demo {
    let mut circuit = Circuit::new();

    let mut ring: Vec<GateId> = (0..RING_LENGTH)
        .map(|i| circuit.add_gate(GateType::Not, Position::new(80.0 * i as f64, 0.0)))
        .collect();
    let delay = circuit.add_labeled(config.gate_kind(GateType::Delay), "DELAY");
    ring.push(delay);
    for i in 0..ring.len() {
        let next = ring[(i + 1) % ring.len()];
        circuit
            .add_wire(Endpoint::primary(ring[i]), Endpoint::new(next, 0))
            .expect("ring wiring");
    }

    let clock = circuit.add_labeled(GateKind::clock(CLOCK_HZ), "CLK");
    let counter = circuit.add_labeled(config.gate_kind(GateType::BinaryCounter), "COUNT");
    circuit
        .add_wire(Endpoint::primary(clock), Endpoint::new(counter, 0))
        .expect("clock wiring");

    Demo {
        circuit,
        tap: delay,
        clock,
        counter,
    }
}

fn render(waveform: &[(u64, bool)], until: u64, step: u64) -> String {
    let mut level = false;
    let mut events = waveform.iter().peekable();
    let mut line = String::new();
    let mut t = step;
    while t <= until {
        while let Some((_, value)) = events.next_if(|(time, _)| *time <= t) {
            level = *value;
        }
        line.push(if level { '#' } else { '_' });
        t += step;
    }
    line
}

// -----------------------------------------------------------------------------
// Main simulation
// -----------------------------------------------------------------------------

fn main() {
    gatesim::init_logging("info");

    println!("==== Ring oscillator example ====");
    println!(
        "{} inverters through a DELAY({}), plus a {} Hz clock into a {}-bit counter.\n",
        RING_LENGTH, DELAY_CAPACITY, CLOCK_HZ, COUNTER_BITS
    );

    let mut config = EngineConfigBuilder::new()
        .default_delay_capacity(DELAY_CAPACITY)
        .default_counter_bits(COUNTER_BITS)
        .build()
        .expect("valid config");
    let Demo {
        mut circuit,
        tap,
        clock,
        counter,
    } = build(&config);

    let step = Simulator::poll_interval(&circuit);
    config.time_step = Some(step);
    let mut sim = Simulator::new(config);
    sim.start();

    for _ in 0..EVALUATIONS {
        let result = sim.evaluate(&circuit);
        if !result.is_settled() {
            println!("time {:>4}: {:?}", result.time, result.outcome);
        }
        circuit = result.circuit;
    }

    let until = sim.current_time();
    let capture = sim.capture();
    println!("time step {} ms, {} evaluations\n", step, EVALUATIONS);
    println!("DELAY  {}", render(&capture.waveform(tap, 0), until, step));
    println!("CLK    {}", render(&capture.waveform(clock, 0), until, step));
    for bit in 0..COUNTER_BITS as usize {
        println!(
            "Q{}     {}",
            bit,
            render(&capture.waveform(counter, bit), until, step)
        );
    }

    let mut report = sim.session_stats("ring_oscillator");
    report.record_circuit(&circuit);
    println!("\n{}", report.summary());
}
