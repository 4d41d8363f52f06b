//! Joint age/income histogram over two parties' secret columns

use std::time::Instant;

use tracing_subscriber::EnvFilter;
use xtabs::{BinEdges, ClearRuntime, Histogram2DBuilder, Party, SecureRuntime, XorSharedRuntime};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Oblivious 2D Histogram Demo ===\n");

    // Party 0 holds ages, party 1 holds incomes (in thousands) for the same people
    let ages = [23.0, 35.0, 41.0, 29.0, 52.0, 67.0, 38.0, 45.0, 19.0, 58.0, 31.0, 74.0];
    let incomes = [28.0, 54.0, 71.0, 39.0, 88.0, 42.0, 61.0, 95.0, 12.0, 77.0, 47.0, 33.0];

    let age_edges = BinEdges::new(vec![18.0, 30.0, 45.0, 60.0, 80.0]).expect("Invalid edges");
    let income_edges = BinEdges::new(vec![0.0, 40.0, 70.0, 100.0]).expect("Invalid edges");
    println!("Age bins:    {}", age_edges);
    println!("Income bins: {}", income_edges);

    let runtime = ClearRuntime::with_trace();
    let age_col = runtime.input_column(Party::Alice, &ages).expect("Input failed");
    let income_col = runtime
        .input_column(Party::Bob, &incomes)
        .expect("Input failed");

    let start = Instant::now();
    let hist = Histogram2DBuilder::new(&runtime)
        .with_shards(2)
        .build(&age_col, &income_col, &age_edges, &income_edges)
        .expect("Histogram failed");
    println!("\n--- Counts (rows: age, columns: income) --- {:?}", start.elapsed());
    for (i, row) in hist.counts().iter_rows().enumerate() {
        let range = &age_edges.as_slice()[i..i + 2];
        println!("  ({:>4}, {:>4}]  {:?}", range[0], range[1], row);
    }
    println!("  total: {}", hist.total());
    println!(
        "  serialized: {}",
        serde_json::to_string(&hist).expect("Serialization failed")
    );

    // Edges from the revealed extremes; the binary backend spaces them on integers
    println!("\n--- Automatic Edges (XOR-shared backend) ---");
    let shared = XorSharedRuntime::seeded(7);
    let age_col = shared.input_column(Party::Alice, &ages).expect("Input failed");
    let income_col = shared
        .input_column(Party::Bob, &incomes)
        .expect("Input failed");

    let start = Instant::now();
    let hist = Histogram2DBuilder::new(&shared)
        .build_auto(&age_col, &income_col, 3, 3)
        .expect("Histogram failed");
    println!("  x edges: {:?}", hist.edges_x.as_slice());
    println!("  y edges: {:?}", hist.edges_y.as_slice());
    for row in hist.counts().iter_rows() {
        println!("  {:?}", row);
    }
    println!("  AND gates: {}, time: {:?}", shared.and_gates(), start.elapsed());

    let tally = shared.tally();
    println!("\n--- Disclosure ---");
    println!("  reveals: {} (2 extremes per column + one per cell)", tally.reveal);
}
