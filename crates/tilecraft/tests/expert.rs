use tilecraft::advisor::TileSizeVector;
use tilecraft::expert::{
    double_tiling_expert, single_tiling_expert, test_expert, test_experts_from_json,
    ExpertBuilder, ExpertError, ExpertOptions, TilingLevel, TilingSummary, LOWER_VECTORS_STAGES,
};
use tilecraft::transform::{
    Lower, LowerVectorsOptions, OpTarget, OptionError, Tile, TransformStep, TransposeLowering,
    Vectorize,
};

fn target() -> OpTarget {
    OpTarget::new("transpose_2d_on_tensors", "linalg.generic")
}

fn suffix_len(post_bufferization: usize) -> usize {
    1 + post_bufferization + LOWER_VECTORS_STAGES + 1
}

fn assert_suffix(steps: &[TransformStep], post_bufferization: usize) {
    let suffix = &steps[steps.len() - suffix_len(post_bufferization)..];
    assert_eq!(suffix[0], TransformStep::Bufferize);
    let lowering = &suffix[1 + post_bufferization..];
    for (stage, step) in lowering[..LOWER_VECTORS_STAGES].iter().enumerate() {
        match step {
            TransformStep::Lower(Lower::Vectors { stage: got, .. }) => assert_eq!(*got, stage),
            other => panic!("expected vector lowering stage {stage}, got {other}"),
        }
    }
    assert_eq!(lowering.last(), Some(&TransformStep::Lower(Lower::Llvm)));
}

#[test]
fn single_tiling_expert_orders_steps() {
    let expert = single_tiling_expert(
        target(),
        TilingLevel::new(vec![8, 16]),
        ExpertOptions::default(),
    );
    let steps = expert.steps();
    assert_eq!(steps.len(), 2 + suffix_len(0));
    match &steps[0] {
        TransformStep::Tile(tile) => {
            assert_eq!(tile.tile_sizes.as_slice(), &[8, 16]);
            assert_eq!(tile.target, target());
            assert!(!tile.pad);
        }
        other => panic!("expected tile, got {other}"),
    }
    assert_eq!(steps[1], TransformStep::Vectorize(Vectorize::new(target())));
    assert_suffix(steps, 0);
    assert_eq!(
        expert.tiling(),
        &TilingSummary::SingleLevel {
            sizes: TileSizeVector::new(vec![8, 16])
        }
    );
}

#[test]
fn double_tiling_expert_keeps_levels_independent() {
    let level2 = TilingLevel {
        pack_paddings: vec![false, true],
        hoist_paddings: vec![2, 2],
        ..TilingLevel::new(vec![4, 8])
    };
    let expert = double_tiling_expert(
        target(),
        TilingLevel::new(vec![32, 64]),
        level2,
        ExpertOptions::default(),
    );
    let steps = expert.steps();
    assert_eq!(steps.len(), 3 + suffix_len(0));
    let (TransformStep::Tile(first), TransformStep::Tile(second)) = (&steps[0], &steps[1]) else {
        panic!("expected two tile steps");
    };
    assert_eq!(first.tile_sizes.as_slice(), &[32, 64]);
    assert!(first.hoist_paddings.is_empty());
    assert_eq!(second.tile_sizes.as_slice(), &[4, 8]);
    assert_eq!(second.pack_paddings, vec![false, true]);
    assert_eq!(second.hoist_paddings, vec![2, 2]);
    assert!(matches!(steps[2], TransformStep::Vectorize(_)));
    assert_suffix(steps, 0);
}

#[test]
fn post_bufferization_steps_follow_bufferize() {
    let copy = target().with_op("linalg.copy");
    let options = ExpertOptions::default()
        .with_post_bufferization(vec![Vectorize::new(copy.clone()).into()])
        .expect("vectorize is not a suffix step");
    let expert = single_tiling_expert(target(), TilingLevel::new(vec![8, 16]), options);
    let steps = expert.steps();
    assert_suffix(steps, 1);
    let bufferize = steps
        .iter()
        .position(|s| *s == TransformStep::Bufferize)
        .expect("bufferize step");
    assert_eq!(steps[bufferize + 1], TransformStep::Vectorize(Vectorize::new(copy)));
}

#[test]
fn lowering_options_reach_every_stage() {
    let options = ExpertOptions::default().with_lower_vectors(LowerVectorsOptions {
        transpose_lowering: TransposeLowering::Shuffle,
        transpose_avx2_lowering: true,
        ..LowerVectorsOptions::default()
    });
    let expert = single_tiling_expert(target(), TilingLevel::new(vec![8, 16]), options);
    let stages: Vec<_> = expert
        .steps()
        .iter()
        .filter_map(|step| match step {
            TransformStep::Lower(Lower::Vectors { options, .. }) => Some(options),
            _ => None,
        })
        .collect();
    assert_eq!(stages.len(), LOWER_VECTORS_STAGES);
    assert!(stages
        .iter()
        .all(|o| o.transpose_avx2_lowering && o.transpose_lowering == TransposeLowering::Shuffle));
}

#[test]
fn print_ir_flag_travels_with_the_expert() {
    let quiet = single_tiling_expert(target(), TilingLevel::new(vec![8]), ExpertOptions::default());
    assert!(!quiet.print_ir_after_all());
    let loud = single_tiling_expert(
        target(),
        TilingLevel::new(vec![8]),
        ExpertOptions::default().with_print_ir_after_all(true),
    );
    assert!(loud.print_ir_after_all());
    assert_eq!(quiet.steps(), loud.steps());
}

#[test]
fn identical_arguments_build_identical_experts() {
    let build = || {
        double_tiling_expert(
            target(),
            TilingLevel::new(vec![32, 64]),
            TilingLevel::new(vec![8, 16]),
            ExpertOptions::default(),
        )
    };
    assert_eq!(build(), build());
}

#[test]
fn test_expert_always_ends_with_suffix() {
    let matvec = OpTarget::new("matvec_on_tensors", "linalg.matvec");
    let prefixes: Vec<Vec<TransformStep>> = vec![
        vec![],
        vec![Tile::new(matvec.clone(), vec![8, 24]).into()],
        vec![
            Tile::new(matvec.clone(), vec![8]).peel(vec![0]).into(),
            Tile::scalarize(matvec.clone()).into(),
            Vectorize::new(matvec.clone()).into(),
        ],
    ];
    for prefix in prefixes {
        let prefix_len = prefix.len();
        let expert = test_expert("case", prefix).expect("prefix without suffix steps");
        assert_eq!(expert.steps().len(), prefix_len + suffix_len(0));
        assert_suffix(expert.steps(), 0);
        assert_eq!(expert.tiling(), &TilingSummary::Custom);
    }
}

#[test]
fn test_expert_takes_target_from_prefix() {
    let matvec = OpTarget::new("matvec_on_tensors", "linalg.matvec");
    let expert = test_expert("tile", vec![Tile::new(matvec.clone(), vec![8, 24]).into()])
        .expect("tile prefix");
    assert_eq!(expert.target(), Some(&matvec));
    assert_eq!(expert.to_string(), "tile on matvec_on_tensors::linalg.matvec");

    let bare = test_expert("no_tiling", vec![]).expect("empty prefix");
    assert_eq!(bare.target(), None);
    assert_eq!(bare.to_string(), "no_tiling");
}

#[test]
fn builder_appends_suffix_once() {
    let mut builder = ExpertBuilder::new("manual").target(target());
    builder.step(Tile::new(target(), vec![4, 4]));
    let expert = builder
        .finish(ExpertOptions::default())
        .expect("no suffix steps yet");
    let bufferizes = expert
        .steps()
        .iter()
        .filter(|s| **s == TransformStep::Bufferize)
        .count();
    assert_eq!(bufferizes, 1);
    assert_suffix(expert.steps(), 0);
}

#[test]
fn prefix_may_not_bufferize_or_lower() {
    let err = test_expert("early", vec![TransformStep::Bufferize]).expect_err("bufferizes");
    assert!(matches!(
        &err,
        ExpertError::SuffixStep { expert, .. } if expert == "early"
    ));

    let mut builder = ExpertBuilder::new("manual").target(target());
    builder.step(Tile::new(target(), vec![4, 4]));
    builder.step(TransformStep::Lower(Lower::Llvm));
    assert!(matches!(
        builder.finish(ExpertOptions::default()),
        Err(ExpertError::SuffixStep { .. })
    ));
}

#[test]
fn post_bufferization_steps_may_not_bufferize_or_lower() {
    for step in [TransformStep::Bufferize, TransformStep::Lower(Lower::Llvm)] {
        let err = ExpertOptions::default()
            .with_post_bufferization(vec![step])
            .expect_err("suffix step");
        assert!(matches!(err, ExpertError::PostBufferizationSuffixStep(_)));
    }
}

#[test]
fn lowering_options_reject_unknown_names() {
    let mut options = LowerVectorsOptions::default();
    options.apply("transpose_lowering=shuffle").expect("known option");
    assert_eq!(options.transpose_lowering, TransposeLowering::Shuffle);
    options.apply("transpose_avx2_lowering=true").expect("known option");
    assert!(options.transpose_avx2_lowering);

    assert_eq!(
        options.apply("transpose_lowerin=shuffle"),
        Err(OptionError::UnknownOption("transpose_lowerin".to_string()))
    );
    assert!(matches!(
        options.apply("transpose_lowering=sideways"),
        Err(OptionError::InvalidValue { .. })
    ));
    assert!(matches!(
        options.apply("transpose_lowering"),
        Err(OptionError::Malformed(_))
    ));
}

#[test]
fn test_experts_load_from_json() {
    let json = r#"
[
  {"name": "no_tiling"},
  {
    "name": "tile_1",
    "prefix": [
      {"tile": {
        "target": {"fun_name": "matvec_on_tensors", "op_name": "linalg.matvec"},
        "tile_sizes": [8, 24]
      }},
      {"vectorize": {"target": {"fun_name": "matvec_on_tensors", "op_name": "linalg.matvec"}}}
    ]
  }
]
"#;
    let experts = test_experts_from_json(json).expect("valid experts");
    assert_eq!(experts.len(), 2);
    assert_eq!(experts[0].steps().len(), suffix_len(0));
    assert_eq!(experts[1].name(), "tile_1");
    assert_eq!(experts[1].steps().len(), 2 + suffix_len(0));
}

#[test]
fn test_experts_reject_unknown_step_fields() {
    let json = r#"
[
  {
    "name": "typo",
    "prefix": [
      {"tile": {
        "target": {"fun_name": "matvec_on_tensors", "op_name": "linalg.matvec"},
        "tile_size": [8, 24]
      }}
    ]
  }
]
"#;
    assert!(test_experts_from_json(json).is_err());
}

#[test]
fn test_experts_reject_suffix_steps_in_prefix() {
    let json = r#"[{"name": "x", "prefix": [{"lower": "llvm"}, "bufferize"]}]"#;
    let err = test_experts_from_json(json).expect_err("prefix lowers");
    assert!(matches!(err, ExpertError::SuffixStep { .. }));

    let err = test_experts_from_json("{}").expect_err("not a list");
    assert!(matches!(err, ExpertError::Json(_)));
}
