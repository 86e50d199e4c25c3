//! Partition plan tests.

use cubek_reduction_bench::PartitionPlan;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn test_shortfall_lands_on_tail() {
    let plan = PartitionPlan::new(10, 4).unwrap();
    assert_eq!(plan.counts(), &[3, 3, 2, 2]);
    assert_eq!(plan.offsets(), &[0, 3, 6, 8]);
    assert_eq!(plan.max_count(), 3);
}

#[test]
fn test_more_units_than_elements() {
    let plan = PartitionPlan::new(2, 3).unwrap();
    assert_eq!(plan.counts(), &[1, 1, 0]);
    let active: Vec<usize> = plan.active_units().map(|(unit, _)| unit).collect();
    assert_eq!(active, vec![0, 1]);
}

#[test]
fn test_empty_inputs_are_rejected() {
    assert!(PartitionPlan::new(0, 2).is_err());
    assert!(PartitionPlan::new(5, 0).is_err());
}

proptest! {
    #[test]
    fn prop_ranges_tile_the_input(total in 1usize..10_000, units in 1usize..17) {
        let plan = PartitionPlan::new(total, units).unwrap();

        prop_assert_eq!(plan.counts().iter().sum::<usize>(), total);
        let max = plan.max_count();
        prop_assert!(plan.counts().iter().all(|&count| max - count <= 1));

        let mut next = 0;
        for unit in 0..plan.unit_count() {
            let range = plan.range(unit);
            prop_assert_eq!(range.start, next);
            next = range.end;
        }
        prop_assert_eq!(next, total);

        // Larger counts come first.
        prop_assert!(plan.counts().windows(2).all(|pair| pair[0] >= pair[1]));
    }
}
