use crate::expert::{catalog_expert, Expert};
use crate::problem::{ElementType, ElementTypes, ProblemShape, SweepConfiguration};
use crate::transform::{Fuse, Generalize, OpTarget, Tile, TransformStep, Vectorize};

use super::Benchmark;

const FUN_NAME: &str = "matvec_on_tensors";
const KEYS: [&str; 2] = ["M", "N"];

/// Matrix-vector product swept against a fixed list of hand-written experts.
///
/// The experts favour coverage of codegen paths (peeling, padding, hoisting,
/// fusion) over speed; they do not depend on the problem size.
#[derive(Debug, Clone)]
pub struct MatVec {
    experts: Vec<Expert>,
}

impl Default for MatVec {
    fn default() -> Self {
        Self {
            experts: matvec_experts(),
        }
    }
}

fn matvec() -> OpTarget {
    OpTarget::new(FUN_NAME, "linalg.matvec")
}

fn fill() -> OpTarget {
    OpTarget::new(FUN_NAME, "linalg.fill")
}

fn vectorize_matvec() -> TransformStep {
    Vectorize::new(matvec()).into()
}

fn outer_tile() -> Tile {
    Tile::new(matvec(), vec![8, 24])
}

fn padded_hoisted(sizes: Vec<usize>, hoist: usize) -> TransformStep {
    Tile::new(matvec(), sizes)
        .pad(vec![true; 3], vec![hoist; 3])
        .into()
}

pub fn matvec_experts() -> Vec<Expert> {
    vec![
        catalog_expert("no_tiling", vec![]),
        catalog_expert("tile_1", vec![outer_tile().into(), vectorize_matvec()]),
        catalog_expert(
            "tile_and_interchange_1",
            vec![outer_tile().interchange(vec![1, 0]).into(), vectorize_matvec()],
        ),
        catalog_expert(
            "tile_1_and_generalize_interchange",
            vec![
                outer_tile().interchange(vec![1, 0]).into(),
                Generalize {
                    target: matvec(),
                    iterator_interchange: vec![0, 1],
                }
                .into(),
                Vectorize::new(matvec().with_op("linalg.generic")).into(),
            ],
        ),
        catalog_expert(
            "tile_1_peel_scalarize",
            vec![
                Tile::new(matvec(), vec![8]).peel(vec![0]).into(),
                Tile::scalarize(matvec()).into(),
                vectorize_matvec(),
            ],
        ),
        catalog_expert(
            "tile_1_pad",
            vec![
                outer_tile().pad(vec![true; 3], Vec::new()).into(),
                vectorize_matvec(),
            ],
        ),
        catalog_expert(
            "tile_1_pad_hoist",
            vec![padded_hoisted(vec![8, 24], 3), vectorize_matvec()],
        ),
        catalog_expert(
            "tile_2_pad_hoist",
            vec![
                outer_tile().into(),
                padded_hoisted(vec![4, 12], 6),
                vectorize_matvec(),
            ],
        ),
        catalog_expert(
            "tile_3_pad_hoist_peel",
            vec![
                outer_tile().into(),
                padded_hoisted(vec![4, 12], 6),
                Tile::new(matvec(), vec![2, 7]).peel(vec![0, 1]).into(),
                vectorize_matvec(),
            ],
        ),
        catalog_expert(
            "tile_3_pad_hoist_peel_scalarize",
            vec![
                outer_tile().into(),
                padded_hoisted(vec![4, 12], 6),
                Tile::new(matvec(), vec![2, 7]).peel(vec![0, 1]).into(),
                Tile::scalarize(matvec()).into(),
                vectorize_matvec(),
            ],
        ),
        catalog_expert(
            "fuse_2_tile_1",
            vec![
                Fuse::new(matvec(), vec![8, 16]).into(),
                Fuse::new(matvec(), vec![4, 4]).into(),
                Tile::new(matvec(), vec![2, 3]).into(),
                vectorize_matvec(),
                Vectorize::new(fill()).into(),
            ],
        ),
        catalog_expert(
            "fuse_and_pad",
            vec![
                Fuse::new(matvec(), vec![16, 16]).into(),
                padded_hoisted(vec![8, 12], 3),
                vectorize_matvec(),
                Tile::new(fill(), vec![8, 8]).into(),
                Vectorize::new(fill()).into(),
            ],
        ),
    ]
}

impl Benchmark for MatVec {
    fn name(&self) -> &str {
        "matvec"
    }

    fn problem_keys(&self) -> &[&'static str] {
        &KEYS
    }

    fn entry_point(&self) -> &str {
        "matvec_main"
    }

    fn target_function(&self, _shape: &ProblemShape) -> String {
        FUN_NAME.to_string()
    }

    fn experts(&self, _target_function: &str, _shape: &ProblemShape) -> Vec<Expert> {
        self.experts.clone()
    }

    fn default_configuration(&self) -> SweepConfiguration {
        SweepConfiguration::new(
            vec![ElementTypes(vec![ElementType::F32; 3])],
            vec![vec![24, 32], vec![27, 37]],
            1,
        )
    }
}
