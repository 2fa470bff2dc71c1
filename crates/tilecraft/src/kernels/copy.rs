use crate::advisor::{CandidateSizeList, TwoLevelCandidates};
use crate::expert::{single_tiling_expert, Expert, ExpertOptions, TilingLevel};
use crate::problem::{ElementType, ElementTypes, ProblemShape, SweepConfiguration};
use crate::transform::OpTarget;

use super::{Benchmark, OUTER_TILE_CANDIDATES};

const BASE_FUN_NAME: &str = "copy_2d_on_tensors";
const OP_NAME: &str = "linalg.generic";
const KEYS: [&str; 2] = ["M", "N"];

/// 2-D elementwise copy.
#[derive(Debug, Clone)]
pub struct Copy2d {
    candidates: TwoLevelCandidates,
}

impl Default for Copy2d {
    fn default() -> Self {
        Self {
            candidates: TwoLevelCandidates::new(
                vec![
                    CandidateSizeList::fixed(&OUTER_TILE_CANDIDATES),
                    CandidateSizeList::fixed(&OUTER_TILE_CANDIDATES),
                ],
                vec![
                    CandidateSizeList::fixed(&[1, 2, 4, 8]),
                    CandidateSizeList::fixed(&[1, 2, 4, 6, 8, 12, 16]),
                ],
            ),
        }
    }
}

/// Row-major strides of a dense buffer with the given extents.
fn row_major_strides(extents: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; extents.len()];
    for dim in (0..extents.len().saturating_sub(1)).rev() {
        strides[dim] = strides[dim + 1] * extents[dim + 1];
    }
    strides
}

impl Benchmark for Copy2d {
    fn name(&self) -> &str {
        "copy_2d"
    }

    fn problem_keys(&self) -> &[&'static str] {
        &KEYS
    }

    fn entry_point(&self) -> &str {
        "main"
    }

    /// The copy is specialized per layout, so its name spells out offset,
    /// sizes and strides.
    fn target_function(&self, shape: &ProblemShape) -> String {
        let extents = shape.extents();
        let join = |values: &[usize]| {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("_")
        };
        format!(
            "{BASE_FUN_NAME}_offset_0_sizes_{}_strides_{}",
            join(&extents),
            join(&row_major_strides(&extents))
        )
    }

    fn experts(&self, target_function: &str, shape: &ProblemShape) -> Vec<Expert> {
        let cascade = self.candidates.cascade(&shape.extents());
        let target = OpTarget::new(target_function, OP_NAME);

        // Bufferization turns the extract/insert slice pair into `linalg.copy`,
        // which only exists after that point.
        let options =
            ExpertOptions::default().vectorize_after_bufferization(target.with_op("linalg.copy"));

        vec![single_tiling_expert(
            target,
            TilingLevel::new(cascade.inner),
            options,
        )]
    }

    fn default_configuration(&self) -> SweepConfiguration {
        SweepConfiguration::new(
            vec![ElementTypes(vec![ElementType::F32, ElementType::F32])],
            vec![vec![32, 64]],
            10_000,
        )
        .with_dumps("/tmp/abc.mlir", "/tmp/abc.o")
    }
}
