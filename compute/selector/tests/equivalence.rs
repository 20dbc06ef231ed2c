//! Every backend must produce the sequential reference's matrix, bit for bit

use compute::{Parameters, Policy, Wavefront, WavefrontCreate};
use compute_selector::{Engine, Mode, SelectorArgs};
use data::Matrix;
use std::sync::Once;

fn init_logger() {
    static INIT_LOGGER: Once = Once::new();
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn reference(size: usize) -> Matrix {
    let mut matrix = Matrix::new(size);
    compute_sequential::wavefront(&mut matrix);
    matrix
}

fn run(size: usize, mode: Mode, params: Parameters) -> Matrix {
    let args = SelectorArgs {
        mode,
        ..Default::default()
    };
    compute_selector::run(size, params, args).unwrap()
}

#[test]
fn all_modes_match_reference() {
    init_logger();
    for size in [1, 2, 5, 18] {
        let expected = reference(size);
        for mode in Mode::ALL {
            for policy in Policy::ALL {
                for num_workers in [1, 3, 4] {
                    for tile_size in [1, 2, 4, 32] {
                        for chunk_size in [1, 2] {
                            let params =
                                Parameters::new(num_workers, policy.id(), tile_size, chunk_size)
                                    .unwrap();
                            let matrix = run(size, mode, params);
                            assert_eq!(
                                matrix.first_difference(&expected),
                                None,
                                "N={size}, {mode}, {params:?}"
                            );
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn unit_tiles_reproduce_the_literal_value() {
    init_logger();
    for mode in Mode::ALL {
        for policy in Policy::ALL {
            let params = Parameters::new(2, policy.id(), 1, 1).unwrap();
            let matrix = run(4, mode, params);
            assert_eq!(matrix[[0, 1]], 0.5, "{mode}, {policy}");
            assert_eq!(matrix[[0, 0]], 0.25);
            assert_eq!(matrix[[3, 3]], 1.0);
            assert_eq!(matrix[[3, 0]], 0.0);
        }
    }
}

#[test]
fn reruns_have_the_same_checksum() {
    init_logger();
    let size = 60;
    for mode in Mode::ALL {
        let params = Parameters::new(3, Policy::BlockCyclic.id(), 4, 2).unwrap();
        let args = SelectorArgs {
            mode,
            ..Default::default()
        };
        let engine = Engine::new(params, args).unwrap();
        let mut first = Matrix::new(size);
        let mut second = Matrix::new(size);
        engine.compute(&mut first).unwrap();
        engine.compute(&mut second).unwrap();
        assert_eq!(first.checksum(), second.checksum(), "{mode}");
        assert_eq!(first, second);
    }
}

#[test]
fn single_worker_policies_agree() {
    init_logger();
    let size = 33;
    let expected = reference(size);
    for mode in Mode::ALL {
        for policy in [Policy::Block, Policy::Cyclic, Policy::BlockCyclic] {
            for tile_size in [1, 5] {
                let params = Parameters::new(1, policy.id(), tile_size, 3).unwrap();
                assert_eq!(run(size, mode, params), expected, "{mode}, {policy}");
            }
        }
    }
}

#[test]
fn large_tiles_and_many_workers() {
    init_logger();
    let size = 50;
    let expected = reference(size);
    for mode in Mode::ALL {
        let params = Parameters::new(12, Policy::Block.id(), 64, 1).unwrap();
        assert_eq!(run(size, mode, params), expected, "{mode}");
    }
}
