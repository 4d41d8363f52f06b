//! Integration tests for the oblivious aggregation library

mod common;

use common::{assert_close, reference_histogram, Dataset, ReferenceOracle};
use xtabs::backend::ClearValue;
use xtabs::{
    Aggregation, BinEdges, ClearRuntime, GmwConfig, GroupKeys, Histogram2DBuilder,
    ObliviousAggregator, Party, SecureRuntime, XorSharedRuntime, XtabsConfig, XtabsError,
    XtabsResult,
};

fn run(
    runtime: &ClearRuntime,
    config: XtabsConfig,
    keys: GroupKeys<'_, ClearValue>,
    values: Option<&[ClearValue]>,
) -> XtabsResult {
    ObliviousAggregator::new(runtime, config)
        .aggregate(keys, values)
        .unwrap()
}

#[test]
fn test_end_to_end_sum_and_average() {
    let runtime = ClearRuntime::new();
    let groups = runtime
        .input_column(Party::Alice, &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0])
        .expect("input failed");
    let values = runtime
        .input_column(Party::Bob, &[10.0, 1.0, 20.0, 2.0, 30.0, 3.0, 40.0, 4.0])
        .expect("input failed");

    let sums = ObliviousAggregator::new(
        &runtime,
        XtabsConfig::new(Aggregation::Sum).with_categories(2, 0),
    )
    .aggregate(GroupKeys::Single(&groups), Some(&values))
    .unwrap();
    assert_eq!(sums.as_sums().unwrap().cells(), &[100.0, 10.0]);

    let averages = ObliviousAggregator::new(
        &runtime,
        XtabsConfig::new(Aggregation::Average).with_categories(2, 0),
    )
    .aggregate(GroupKeys::Single(&groups), Some(&values))
    .unwrap();
    assert_eq!(
        averages.as_averages().unwrap().cells(),
        &[Some(25.0), Some(2.5)]
    );
}

#[test]
fn test_every_aggregation_matches_reference() {
    let (k1, k2) = (3, 4);
    let data = Dataset::random(7, 60, k1, k2);
    let runtime = ClearRuntime::new();
    let outer = runtime.input_column(Party::Alice, &data.outer).unwrap();
    let inner = runtime.input_column(Party::Alice, &data.inner).unwrap();
    let values = runtime.input_column(Party::Bob, &data.values).unwrap();

    let single = ReferenceOracle::single(&data.outer, &data.values, k1);
    let pair = ReferenceOracle::pair(&data.outer, &data.inner, &data.values, k1, k2);

    let one = XtabsConfig::new(Aggregation::Sum).with_categories(k1, 0);
    let result = run(&runtime, one.clone(), GroupKeys::Single(&outer), Some(&values[..]));
    assert_eq!(result.as_sums().unwrap().cells(), single.sums().as_slice());

    let two = one.clone().with_categories(k1, k2);
    let result = run(&runtime, two.clone(), GroupKeys::Pair(&outer, &inner), Some(&values[..]));
    assert_eq!(result.as_sums().unwrap().cells(), pair.sums().as_slice());

    let result = run(
        &runtime,
        XtabsConfig { aggregation: Aggregation::Average, ..two.clone() },
        GroupKeys::Pair(&outer, &inner),
        Some(&values[..]),
    );
    assert_close(result.as_averages().unwrap().cells(), &pair.averages());

    for ddof in [0u8, 1] {
        let result = run(
            &runtime,
            XtabsConfig::new(Aggregation::StdDev)
                .with_categories(k1, 0)
                .with_ddof(ddof),
            GroupKeys::Single(&outer),
            Some(&values[..]),
        );
        assert_close(
            result.as_std_devs().unwrap().cells(),
            &single.std_devs(ddof as usize),
        );

        let result = run(
            &runtime,
            XtabsConfig::new(Aggregation::StdDev)
                .with_categories(k1, k2)
                .with_ddof(ddof),
            GroupKeys::Pair(&outer, &inner),
            Some(&values[..]),
        );
        assert_close(
            result.as_std_devs().unwrap().cells(),
            &pair.std_devs(ddof as usize),
        );
    }

    let result = run(
        &runtime,
        XtabsConfig { aggregation: Aggregation::Frequency, ..two.clone() },
        GroupKeys::Pair(&outer, &inner),
        None,
    );
    assert_eq!(result.as_frequencies().unwrap().cells(), pair.counts().as_slice());

    let result = run(
        &runtime,
        XtabsConfig { aggregation: Aggregation::Mode, ..two },
        GroupKeys::Pair(&outer, &inner),
        None,
    );
    assert_eq!(result.as_modes().unwrap(), pair.modes().as_slice());
}

#[test]
fn test_xor_shared_backend_matches_clear_backend() {
    let (k1, k2) = (2, 3);
    let data = Dataset::random(21, 24, k1, k2);
    let clear = ClearRuntime::new();
    let shared = XorSharedRuntime::seeded(21);

    for aggregation in [Aggregation::Sum, Aggregation::Frequency, Aggregation::Mode] {
        let config = XtabsConfig::new(aggregation).with_categories(k1, k2);
        let values = aggregation.uses_values().then_some(&data.values[..]);

        let expected = {
            let outer = clear.input_column(Party::Alice, &data.outer).unwrap();
            let inner = clear.input_column(Party::Bob, &data.inner).unwrap();
            let values = values.map(|v| clear.input_column(Party::Bob, v).unwrap());
            ObliviousAggregator::new(&clear, config.clone())
                .aggregate(GroupKeys::Pair(&outer, &inner), values.as_deref())
                .unwrap()
        };
        let actual = {
            let outer = shared.input_column(Party::Alice, &data.outer).unwrap();
            let inner = shared.input_column(Party::Bob, &data.inner).unwrap();
            let values = values.map(|v| shared.input_column(Party::Bob, v).unwrap());
            ObliviousAggregator::new(&shared, config)
                .aggregate(GroupKeys::Pair(&outer, &inner), values.as_deref())
                .unwrap()
        };
        assert_eq!(actual, expected, "{} differs between backends", aggregation);
    }
}

#[test]
fn test_histogram_matches_reference() {
    let a: Vec<f64> = (0..40).map(|i| ((i * 7) % 23) as f64 - 3.0).collect();
    let b: Vec<f64> = (0..40).map(|i| ((i * 5) % 17) as f64).collect();
    let edges_x = BinEdges::new(vec![0.0, 5.0, 10.0, 15.0]).unwrap();
    let edges_y = BinEdges::new(vec![2.0, 8.0, 12.0]).unwrap();

    let runtime = ClearRuntime::new();
    let col_a = runtime.input_column(Party::Alice, &a).unwrap();
    let col_b = runtime.input_column(Party::Bob, &b).unwrap();
    let hist = Histogram2DBuilder::new(&runtime)
        .with_shards(3)
        .build(&col_a, &col_b, &edges_x, &edges_y)
        .unwrap();

    assert_eq!(
        hist.counts().cells(),
        reference_histogram(&a, &b, edges_x.as_slice(), edges_y.as_slice()).as_slice()
    );
    assert_eq!(hist.total(), 40);
}

#[test]
fn test_scenario_histogram_on_both_backends() {
    let edges = BinEdges::new(vec![1.0, 3.0, 5.0]).unwrap();

    let clear = ClearRuntime::new();
    let a = clear.input_column(Party::Alice, &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    let b = clear.input_column(Party::Bob, &[5.0, 4.0, 3.0, 2.0, 1.0]).unwrap();
    let from_clear = Histogram2DBuilder::new(&clear)
        .build(&a, &b, &edges, &edges)
        .unwrap();

    let shared = XorSharedRuntime::seeded(1);
    let a = shared.input_column(Party::Alice, &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    let b = shared.input_column(Party::Bob, &[5.0, 4.0, 3.0, 2.0, 1.0]).unwrap();
    let from_shared = Histogram2DBuilder::new(&shared)
        .build(&a, &b, &edges, &edges)
        .unwrap();

    assert_eq!(from_clear.counts().cells(), &[1, 2, 2, 0]);
    assert_eq!(from_clear, from_shared);
}

#[test]
fn test_trace_is_independent_of_data() {
    let fingerprint = |seed: u64| {
        let data = Dataset::random(seed, 16, 3, 2);
        let runtime = XorSharedRuntime::with_config(GmwConfig {
            seed: Some(seed),
            trace: true,
        });
        let outer = runtime.input_column(Party::Alice, &data.outer).unwrap();
        let inner = runtime.input_column(Party::Bob, &data.inner).unwrap();
        ObliviousAggregator::new(
            &runtime,
            XtabsConfig::new(Aggregation::Mode).with_categories(3, 2),
        )
        .aggregate(GroupKeys::Pair(&outer, &inner), None)
        .unwrap();
        (
            runtime.tally(),
            runtime.and_gates(),
            runtime.audit().fingerprint().unwrap(),
        )
    };

    let first = fingerprint(100);
    let second = fingerprint(200);
    assert!(first.2.is_some());
    assert_eq!(first, second);
}

#[test]
fn test_integer_backend_rejects_fractions() {
    let runtime = XorSharedRuntime::seeded(0);
    assert_eq!(
        runtime.input(Party::Alice, 1.5).err(),
        Some(XtabsError::NonIntegral(1.5))
    );

    let groups = runtime.input_column(Party::Alice, &[0.0, 1.0]).unwrap();
    let values = runtime.input_column(Party::Bob, &[2.0, 4.0]).unwrap();
    let err = ObliviousAggregator::new(
        &runtime,
        XtabsConfig::new(Aggregation::StdDev).with_categories(2, 0),
    )
    .aggregate(GroupKeys::Single(&groups), Some(&values))
    .unwrap_err();
    assert!(err.to_string().contains("std"));
}

#[test]
fn test_auto_histogram_on_integer_backend() {
    let runtime = XorSharedRuntime::seeded(77);
    let a = runtime
        .input_column(Party::Alice, &[0.0, 3.0, 9.0, 12.0, 6.0, 1.0])
        .unwrap();
    let b = runtime
        .input_column(Party::Bob, &[10.0, 20.0, 30.0, 40.0, 10.0, 40.0])
        .unwrap();

    let hist = Histogram2DBuilder::new(&runtime).build_auto(&a, &b, 3, 3).unwrap();
    assert_eq!(hist.edges_x.as_slice(), &[0.0, 4.0, 8.0, 12.0]);
    assert_eq!(hist.edges_y.as_slice(), &[10.0, 20.0, 30.0, 40.0]);
    assert_eq!(hist.total(), 6);
}
