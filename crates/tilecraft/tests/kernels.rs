use std::sync::Arc;

use tilecraft::expert::test_expert;
use tilecraft::advisor::{CandidateSizeList, TwoLevelCandidates};
use tilecraft::kernels::{
    get_benchmark, list_benchmarks, matvec_experts, register_benchmark, Benchmark, Copy2d,
    CustomizedBenchmark, KernelParams, MatVec, TransposeNd,
};
use tilecraft::problem::{ProblemError, ProblemShape};
use tilecraft::transform::{Lower, LoweringOverrides, TransformStep, TransposeLowering};
use tilecraft::TilingSummary;

fn shape(benchmark: &dyn Benchmark, sizes: &[usize]) -> ProblemShape {
    ProblemShape::new(benchmark.problem_keys(), sizes).expect("matching rank")
}

fn lowering_of(step: &TransformStep) -> Option<&tilecraft::LowerVectorsOptions> {
    match step {
        TransformStep::Lower(Lower::Vectors { options, .. }) => Some(options),
        _ => None,
    }
}

#[test]
fn builtin_benchmarks_are_registered() {
    let names = list_benchmarks();
    for name in ["copy_2d", "matvec", "transpose_2d"] {
        assert!(names.iter().any(|n| n == name), "{name} missing from {names:?}");
        let benchmark = get_benchmark(name).expect("registered");
        assert_eq!(benchmark.name(), name);
    }
    assert!(get_benchmark("conv_2d").is_none());
}

fn register_tiles() -> TwoLevelCandidates {
    let outer = CandidateSizeList::new(vec![32, 64]).expect("valid sizes");
    let inner = CandidateSizeList::new(vec![4, 8]).expect("valid sizes");
    TwoLevelCandidates::new(vec![outer; 3], vec![inner; 3])
}

#[test]
fn registering_again_returns_displaced_benchmark() {
    let partial = TransposeNd::new(vec![0, 2, 1], register_tiles()).expect("permutation");
    assert!(register_benchmark(Arc::new(partial.clone())).is_none());

    let found = get_benchmark("transpose_3d_021").expect("registered");
    assert_eq!(found.problem_keys(), ["M", "N", "K"]);
    assert_eq!(
        found.params(),
        KernelParams {
            permutation: Some(vec![0, 2, 1])
        }
    );
    let names = list_benchmarks();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);

    let displaced = register_benchmark(Arc::new(partial)).expect("already registered");
    assert_eq!(displaced.name(), "transpose_3d_021");
}

#[test]
fn transpose_rejects_invalid_permutations() {
    assert_eq!(
        TransposeNd::new((0..7).rev().collect(), register_tiles()).map(|t| t.name().to_string()),
        Err(ProblemError::RankTooLarge { rank: 7, max: 6 })
    );
    for bad in [vec![0, 0], vec![], vec![0, 2]] {
        assert_eq!(
            TransposeNd::new(bad.clone(), register_tiles()).map(|t| t.name().to_string()),
            Err(ProblemError::InvalidPermutation(bad))
        );
    }
}

#[test]
fn transpose_names_follow_permutation() {
    let name = |perm: Vec<usize>| {
        TransposeNd::new(perm, register_tiles())
            .expect("permutation")
            .name()
            .to_string()
    };
    assert_eq!(name(vec![1, 0]), "transpose_2d");
    assert_eq!(name(vec![0, 1]), "transpose_2d_01");
    assert_eq!(name(vec![2, 1, 0]), "transpose_3d");
    assert_eq!(name(vec![1, 2, 0]), "transpose_3d_120");
    assert_eq!(TransposeNd::default().params().permutation, Some(vec![1, 0]));
    assert_eq!(MatVec::default().params(), KernelParams::default());
}

#[test]
fn copy_target_function_spells_out_layout() {
    let copy = Copy2d::default();
    let name = copy.target_function(&shape(&copy, &[32, 64]));
    assert_eq!(name, "copy_2d_on_tensors_offset_0_sizes_32_64_strides_64_1");
    let name = copy.target_function(&shape(&copy, &[100, 7]));
    assert_eq!(name, "copy_2d_on_tensors_offset_0_sizes_100_7_strides_7_1");
}

#[test]
fn copy_expert_vectorizes_copy_after_bufferization() {
    let copy = Copy2d::default();
    let problem = shape(&copy, &[32, 64]);
    let fun = copy.target_function(&problem);
    let experts = copy.experts(&fun, &problem);
    assert_eq!(experts.len(), 1);

    let expert = &experts[0];
    assert_eq!(expert.name(), "SingleTilingExpert");
    assert!(matches!(
        expert.tiling(),
        TilingSummary::SingleLevel { sizes } if sizes.as_slice() == [8, 16]
    ));
    let steps = expert.steps();
    let bufferize = steps
        .iter()
        .position(|s| *s == TransformStep::Bufferize)
        .expect("bufferize step");
    match &steps[bufferize + 1] {
        TransformStep::Vectorize(v) => {
            assert_eq!(v.target.op_name, "linalg.copy");
            assert_eq!(v.target.fun_name, fun);
        }
        other => panic!("expected copy vectorization, got {other}"),
    }
}

#[test]
fn copy_default_configuration_matches_benchmark_setup() {
    let config = Copy2d::default().default_configuration();
    assert_eq!(config.problem_sizes, vec![vec![32, 64]]);
    assert_eq!(config.n_iters, 10_000);
    assert_eq!(config.element_types[0].to_string(), "[f32, f32]");
    assert!(config.dump_ir.is_some() && config.dump_obj.is_some());
}

#[test]
fn matvec_catalog_is_fixed_and_ordered() {
    let names: Vec<_> = matvec_experts()
        .iter()
        .map(|e| e.name().to_string())
        .collect();
    assert_eq!(
        names,
        [
            "no_tiling",
            "tile_1",
            "tile_and_interchange_1",
            "tile_1_and_generalize_interchange",
            "tile_1_peel_scalarize",
            "tile_1_pad",
            "tile_1_pad_hoist",
            "tile_2_pad_hoist",
            "tile_3_pad_hoist_peel",
            "tile_3_pad_hoist_peel_scalarize",
            "fuse_2_tile_1",
            "fuse_and_pad",
        ]
    );

    let matvec = MatVec::default();
    let small = matvec.experts("matvec_on_tensors", &shape(&matvec, &[24, 32]));
    let odd = matvec.experts("matvec_on_tensors", &shape(&matvec, &[27, 37]));
    assert_eq!(small, odd);
    assert_eq!(matvec.default_configuration().trial_count(small.len()), 24);
}

#[test]
fn matvec_tile_and_pad_parameters() {
    let experts = matvec_experts();
    let hoist = experts
        .iter()
        .find(|e| e.name() == "tile_1_pad_hoist")
        .expect("tile_1_pad_hoist");
    let TransformStep::Tile(tile) = &hoist.steps()[0] else {
        panic!("expected tile step");
    };
    assert_eq!(tile.tile_sizes.as_slice(), &[8, 24]);
    assert!(tile.pad);
    assert_eq!(tile.pack_paddings, vec![true, true, true]);
    assert_eq!(tile.hoist_paddings, vec![3, 3, 3]);

    let peel = experts
        .iter()
        .find(|e| e.name() == "tile_1_peel_scalarize")
        .expect("tile_1_peel_scalarize");
    let TransformStep::Tile(scalarize) = &peel.steps()[1] else {
        panic!("expected scalarizing tile step");
    };
    assert!(scalarize.scalarize_dyn_dims);
}

#[test]
fn transpose_tries_single_then_double_with_and_without_avx2() {
    let transpose = TransposeNd::default();
    assert_eq!(transpose.name(), "transpose_2d");
    let problem = shape(&transpose, &[260, 280]);
    let fun = transpose.target_function(&problem);
    assert_eq!(fun, "transpose_2d_on_tensors");

    let experts = transpose.experts(&fun, &problem);
    let names: Vec<_> = experts.iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        [
            "SingleTilingExpert",
            "DoubleTilingExpert",
            "SingleTilingExpert",
            "DoubleTilingExpert",
        ]
    );

    for (idx, expert) in experts.iter().enumerate() {
        let avx2 = idx >= 2;
        for options in expert.steps().iter().filter_map(lowering_of) {
            assert_eq!(options.transpose_lowering, TransposeLowering::Shuffle);
            assert_eq!(options.transpose_avx2_lowering, avx2);
        }
    }

    // 260 = 4 * 65 has no outer divisor; 280 = 8 * 35 has outer tile 40.
    assert_eq!(
        experts[1].tiling(),
        &TilingSummary::DoubleLevel {
            sizes1: vec![0, 40].into(),
            sizes2: vec![4, 8].into(),
        }
    );
    assert!(matches!(
        experts[0].tiling(),
        TilingSummary::SingleLevel { sizes } if sizes.as_slice() == [4, 8]
    ));
}

#[test]
fn transpose_default_configuration_has_thirty_problems() {
    let config = TransposeNd::default().default_configuration();
    assert_eq!(config.problem_sizes.len(), 30);
    assert_eq!(config.n_iters, 1000);
    assert!(config.problem_sizes.iter().all(|p| p.len() == 2));
    assert!(config.problem_sizes.contains(&vec![16 * 16, 256]));
    assert!(config.problem_sizes.contains(&vec![12 * 85, 8 * 145]));
}

#[test]
fn customized_benchmark_layers_lowering_overrides() {
    let base: Arc<dyn Benchmark> = Arc::new(TransposeNd::default());
    let overrides =
        LoweringOverrides::parse(["transpose_avx2_lowering=true"]).expect("known option");
    let custom = CustomizedBenchmark::new(base.clone()).with_lowering(overrides);
    assert_eq!(custom.name(), "transpose_2d");

    let problem = shape(&custom, &[256, 256]);
    let fun = custom.target_function(&problem);
    for expert in custom.experts(&fun, &problem) {
        for options in expert.steps().iter().filter_map(lowering_of) {
            // The kernel's own shuffle choice survives.
            assert_eq!(options.transpose_lowering, TransposeLowering::Shuffle);
            assert!(options.transpose_avx2_lowering);
        }
    }
}

#[test]
fn customized_benchmark_replaces_expert_catalog() {
    let base: Arc<dyn Benchmark> = Arc::new(MatVec::default());
    let custom =
        CustomizedBenchmark::new(base).with_experts(vec![
        test_expert("no_tiling", vec![]).expect("empty prefix"),
    ]);
    let problem = shape(&custom, &[24, 32]);
    let experts = custom.experts("matvec_on_tensors", &problem);
    assert_eq!(experts.len(), 1);
    assert_eq!(custom.entry_point(), "matvec_main");
    assert_eq!(custom.default_configuration().problem_sizes.len(), 2);
}

#[test]
fn lowering_overrides_reject_unknown_options() {
    assert!(LoweringOverrides::parse(["contraction_lowering=dot"]).is_ok());
    assert!(LoweringOverrides::parse(["contraction_lowering=sparse"]).is_err());
    assert!(LoweringOverrides::parse(["unroll=4"]).is_err());
    assert!(LoweringOverrides::parse(Vec::<String>::new())
        .expect("empty")
        .is_empty());
}
