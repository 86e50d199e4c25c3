//! Kernels on the cubecl test runtime, checked against the host reference.

use cubecl::TestRuntime;
use cubecl::prelude::*;
use cubek_reduction_bench::ReductionStrategy;
use cubek_reduction_bench::cube::{verify_add, verify_dot, verify_matvec};
use cubek_reduction_bench::problem::{BandSelector, EllMatrix, MatvecProblem};

fn client() -> ComputeClient<TestRuntime> {
    TestRuntime::client(&Default::default())
}

#[test]
fn test_dot_every_strategy() {
    let client = client();
    for strategy in ReductionStrategy::ALL {
        for count in [1, 63, 1000] {
            let verification = verify_dot::<TestRuntime, f32>(&client, strategy, count, 64).unwrap();
            assert!(verification.passed(), "{strategy} on {count}: {verification:?}");
        }
    }
}

#[test]
fn test_add_with_partial_last_cube() {
    let verification = verify_add::<TestRuntime, f32>(&client(), 1000).unwrap();
    assert!(verification.passed(), "{verification:?}");
    assert_eq!(verification.checked, 1000);
}

#[test]
fn test_matvec_tridiagonal() {
    let rows = vec![
        vec![(0, 1.0f32), (1, 1.0)],
        vec![(1, 2.0), (0, 1.0), (2, 1.0)],
        vec![(2, 2.0), (1, 1.0), (3, 1.0)],
        vec![(3, 1.0), (2, 1.0)],
    ];
    let matrix = EllMatrix::from_rows(3, &rows).unwrap();
    let problem = MatvecProblem::new(matrix, vec![1.0, 2.0, 3.0, 4.0]).unwrap();

    let verification = verify_matvec::<TestRuntime, f32>(&client(), &problem).unwrap();
    assert!(verification.passed(), "{verification:?}");
}

#[test]
fn test_matvec_banded() {
    let problem = MatvecProblem::<f32>::generate(300, 8, BandSelector::OddOffset).unwrap();
    let verification = verify_matvec::<TestRuntime, f32>(&client(), &problem).unwrap();
    assert!(verification.passed(), "{verification:?}");
    assert_eq!(verification.checked, 300);
}
