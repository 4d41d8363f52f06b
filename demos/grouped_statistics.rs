//! Grouped salary statistics over secret columns
//!
//! Run with `RUST_LOG=xtabs=debug` to see the public query parameters logged.

use std::time::Instant;

use tracing_subscriber::EnvFilter;
use xtabs::{
    Aggregation, ClearRuntime, GroupKeys, ObliviousAggregator, Party, SecureRuntime,
    XorSharedRuntime, XtabsConfig,
};

const DEPARTMENTS: [&str; 3] = ["Engineering", "Sales", "Support"];
const LEVELS: [&str; 3] = ["Junior", "Mid", "Senior"];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Oblivious Group-By Demo ===\n");
    println!("Computing per-department statistics without revealing any row\n");

    // Party 0 (HR) knows departments and levels, party 1 (payroll) knows salaries
    let employees = vec![
        ("Alice", 0, 2, 91),
        ("Bob", 0, 1, 82),
        ("Charlie", 1, 0, 58),
        ("Diana", 0, 2, 95),
        ("Eve", 2, 0, 47),
        ("Frank", 1, 1, 70),
        ("Grace", 0, 0, 64),
        ("Henry", 2, 1, 55),
        ("Ivy", 1, 1, 73),
    ];

    println!("Scenario: salary statistics per department (in thousands)");
    println!("{}", "-".repeat(50));
    for (name, dept, level, salary) in &employees {
        println!(
            "  {:<8} {:<12} {:<7} ${}k (secret)",
            name, DEPARTMENTS[*dept], LEVELS[*level], salary
        );
    }

    let departments: Vec<f64> = employees.iter().map(|e| e.1 as f64).collect();
    let levels: Vec<f64> = employees.iter().map(|e| e.2 as f64).collect();
    let salaries: Vec<f64> = employees.iter().map(|e| e.3 as f64).collect();

    let runtime = ClearRuntime::new();
    let dept_col = runtime
        .input_column(Party::Alice, &departments)
        .expect("Input failed");
    let salary_col = runtime
        .input_column(Party::Bob, &salaries)
        .expect("Input failed");

    println!("\n--- Per-Department Statistics ---");
    for aggregation in [Aggregation::Sum, Aggregation::Average, Aggregation::StdDev] {
        let mut config = XtabsConfig::new(aggregation).with_categories(DEPARTMENTS.len(), 0);
        if aggregation == Aggregation::StdDev {
            config = config.with_ddof(1);
        }

        let start = Instant::now();
        let result = ObliviousAggregator::new(&runtime, config)
            .aggregate(GroupKeys::Single(&dept_col), Some(&salary_col))
            .expect("Aggregation failed");
        let elapsed = start.elapsed();

        println!("{} ({:?}):", aggregation, elapsed);
        if let Some(sums) = result.as_sums() {
            for (dept, sum) in DEPARTMENTS.iter().zip(sums.cells()) {
                println!("  {:<12} ${}k", dept, sum);
            }
        }
        let guarded = result.as_averages().or_else(|| result.as_std_devs());
        if let Some(grid) = guarded {
            for (dept, cell) in DEPARTMENTS.iter().zip(grid.cells()) {
                match cell {
                    Some(v) => println!("  {:<12} {:.2}", dept, v),
                    None => println!("  {:<12} (too few rows)", dept),
                }
            }
        }
    }

    // Counts and modes run on XOR shares: integer arithmetic only
    println!("\n--- Level Distribution (XOR-shared backend) ---");
    let shared = XorSharedRuntime::seeded(2024);
    let dept_col = shared
        .input_column(Party::Alice, &departments)
        .expect("Input failed");
    let level_col = shared
        .input_column(Party::Alice, &levels)
        .expect("Input failed");

    let config = XtabsConfig::new(Aggregation::Frequency)
        .with_categories(DEPARTMENTS.len(), LEVELS.len());
    let freq = ObliviousAggregator::new(&shared, config.clone())
        .aggregate(GroupKeys::Pair(&dept_col, &level_col), None)
        .expect("Aggregation failed");
    let modes = ObliviousAggregator::new(
        &shared,
        XtabsConfig {
            aggregation: Aggregation::Mode,
            ..config
        },
    )
    .aggregate(GroupKeys::Pair(&dept_col, &level_col), None)
    .expect("Aggregation failed");

    if let (Some(freq), Some(modes)) = (freq.as_frequencies(), modes.as_modes()) {
        println!("  {:<12} {:>6} {:>6} {:>6}  most common", "", LEVELS[0], LEVELS[1], LEVELS[2]);
        for (d, row) in freq.iter_rows().enumerate() {
            println!(
                "  {:<12} {:>6} {:>6} {:>6}  {}",
                DEPARTMENTS[d], row[0], row[1], row[2], LEVELS[modes[d] as usize]
            );
        }
    }
    println!("  AND gates evaluated: {}", shared.and_gates());

    let spent = runtime.tally();
    println!("\n--- Primitive Accounting (clear backend) ---");
    println!("  equal: {}  select: {}  add: {}", spent.equal, spent.select, spent.add);
    println!("  divide: {}  sqrt: {}  reveal: {}", spent.divide, spent.sqrt, spent.reveal);

    println!("\n--- Privacy Guarantees ---");
    println!("✓ Every row is compared against every group");
    println!("✓ Only the final per-group aggregates are revealed");
    println!("✓ Groups with too few rows are reported as excluded, not divided by zero");
}
