//! Device reduction tests across every strategy.

use cubek_reduction_bench::backend::{ProgramSource, build_program};
use cubek_reduction_bench::launch::DeviceContext;
use cubek_reduction_bench::{Platform, ReductionStrategy, reduce_on_device};
use proptest::prelude::*;

const GROUP: usize = 8;

fn context() -> DeviceContext<f64> {
    let platform = Platform::host(1, 64).unwrap();
    let program = build_program(&platform, ProgramSource::VECTOR_DOT, "-D REAL=double").unwrap();
    let mut context = DeviceContext::new(&platform.devices()[0]).unwrap();
    context.load_program(&program).unwrap();
    context
}

#[test]
fn test_boundary_sizes_for_every_strategy() {
    let mut context = context();
    for strategy in ReductionStrategy::ALL {
        for count in [0, 1, 3, GROUP, GROUP + 1, 2 * GROUP + 1, 1000] {
            let values: Vec<f64> = (0..count).map(|i| i as f64).collect();
            let expected = (count * count.saturating_sub(1) / 2) as f64;
            let sum = reduce_on_device(&mut context, strategy, &values, GROUP).unwrap();
            assert_eq!(sum, expected, "{strategy} over {count} elements");
        }
    }
}

#[test]
fn test_repeated_reductions_agree() {
    let mut context = context();
    let values: Vec<f64> = (0..777).map(|i| (i % 13) as f64).collect();
    for strategy in ReductionStrategy::ALL {
        let first = reduce_on_device(&mut context, strategy, &values, GROUP).unwrap();
        let second = reduce_on_device(&mut context, strategy, &values, GROUP).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_group_of_one_is_rejected_where_it_cannot_shrink() {
    let mut context = context();
    let values = vec![1.0; 10];
    assert!(reduce_on_device(&mut context, ReductionStrategy::LocalCopy, &values, 1).is_err());
    assert!(reduce_on_device(&mut context, ReductionStrategy::FusedLoad, &values, 1).is_err());
    assert_eq!(
        reduce_on_device(&mut context, ReductionStrategy::HalvedLaunch, &values, 1).unwrap(),
        10.0
    );
}

#[test]
fn test_non_power_of_two_group_is_rejected() {
    let mut context = context();
    let values = vec![1.0; 10];
    assert!(reduce_on_device(&mut context, ReductionStrategy::BitShift, &values, 6).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_every_strategy_matches_sequential_sum(
        values in proptest::collection::vec(-1000i32..1000, 0..600),
        group_shift in 1u32..6,
    ) {
        let values: Vec<f64> = values.into_iter().map(f64::from).collect();
        let expected: f64 = values.iter().sum();
        let mut context = context();
        for strategy in ReductionStrategy::ALL {
            let sum = reduce_on_device(&mut context, strategy, &values, 1 << group_shift).unwrap();
            prop_assert_eq!(sum, expected);
        }
    }
}
