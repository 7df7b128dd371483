use collsim::{
    generators, sampling, EventTrace, GammaNoise, InstrumentId, LatencyBandwidth, Machine,
    NoisyNetwork, Pipelined, SimResult, TaskEvent,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,collsim=info")),
        )
        .init();

    println!("═══════════════════════════════════════════════════════");
    println!("  collsim: Deterministic Dataflow Machine Simulator");
    println!("  Ping-pong latency + replay verification demo");
    println!("═══════════════════════════════════════════════════════");
    println!();

    if let Err(e) = run() {
        eprintln!("  ✗ {}", e);
        std::process::exit(1);
    }
}

fn run() -> SimResult<()> {
    // ── Latency-only round trip ───────────────────────────────
    let program = generators::pingpong(0, 1)?;
    let mut machine = Machine::builder()
        .nodes(2)
        .network(LatencyBandwidth::new(1000, 0.0)?)
        .build()?;
    let report = machine.run(&program)?;
    println!("  Round trip (latency 1000): {}", report.maximum_time);
    println!();

    // ── Message-size sweep under network noise ────────────────
    println!("  Ping-pong sweep, 10 noisy samples per size:");
    for log2 in (3..=21).step_by(3) {
        let size = 1u64 << log2;
        let program = generators::pingpong(size, 1)?;
        let samples = sampling::sample(&program, 10, |seed| {
            let network = NoisyNetwork::new(
                Pipelined::new(1000, 0.09, 400)?,
                GammaNoise::relative(2.0, 0.05, seed)?,
            );
            Machine::builder().nodes(2).network(network).build()
        })?;
        println!(
            "    {:>8} B  min {:>10}  mean {:>12.1}  max {:>10}",
            size,
            samples.min().map_or(0, |t| t.ticks()),
            samples.mean().unwrap_or(0.0),
            samples.max().map_or(0, |t| t.ticks()),
        );
    }
    println!();

    // ── Replay verification ───────────────────────────────────
    let hash_1 = traced_run("Run 1")?;
    let hash_2 = traced_run("Run 2")?;
    println!("  Verification:");
    println!("    Run 1 trace hash: {:016x}", hash_1);
    println!("    Run 2 trace hash: {:016x}", hash_2);
    if hash_1 == hash_2 {
        println!("    ✓ Traces are IDENTICAL, deterministic replay confirmed.");
    } else {
        println!("    ✗ MISMATCH, determinism violation detected!");
    }
    Ok(())
}

fn traced_run(label: &str) -> SimResult<u64> {
    let program = generators::multicast(4096, 8, false)?;
    let mut machine = Machine::builder()
        .nodes(8)
        .processes(2)
        .network(NoisyNetwork::new(
            Pipelined::new(1000, 0.09, 400)?,
            GammaNoise::absolute(2.0, 50.0, 42)?,
        ))
        .instrument(TaskEvent::ALL, EventTrace::new())
        .build()?;
    let report = machine.run(&program)?;

    let trace = machine
        .instrument::<EventTrace>(InstrumentId::from_index(0))
        .map(|t| (t.len(), t.trace_hash()))
        .unwrap_or_default();
    info!(label, events = trace.0, "traced run done");
    println!(
        "  {}: {} events, maximum time {}",
        label, report.events_processed, report.maximum_time
    );
    Ok(trace.1)
}
