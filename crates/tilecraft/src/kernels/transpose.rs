use crate::advisor::{CandidateSizeList, TwoLevelCandidates};
use crate::expert::{double_tiling_expert, single_tiling_expert, Expert, ExpertOptions, TilingLevel};
use crate::problem::{ElementType, ElementTypes, ProblemError, ProblemShape, SweepConfiguration};
use crate::transform::{LowerVectorsOptions, OpTarget, TransposeLowering};

use super::{Benchmark, KernelParams, OUTER_TILE_CANDIDATES};

const OP_NAME: &str = "linalg.generic";
const DIM_KEYS: [&str; 6] = ["M", "N", "K", "L", "P", "Q"];

/// Transpose of a dense tensor by a fixed permutation.
#[derive(Debug, Clone)]
pub struct TransposeNd {
    name: String,
    permutation: Vec<usize>,
    candidates: TwoLevelCandidates,
}

impl Default for TransposeNd {
    /// 2-D transpose with register tiles sized to stress `vector.transpose`
    /// lowerings.
    fn default() -> Self {
        Self::from_parts(
            vec![1, 0],
            TwoLevelCandidates::new(
                vec![
                    CandidateSizeList::fixed(&OUTER_TILE_CANDIDATES),
                    CandidateSizeList::fixed(&OUTER_TILE_CANDIDATES),
                ],
                vec![
                    CandidateSizeList::fixed(&[1, 2, 4, 6, 8]),
                    CandidateSizeList::fixed(&[1, 2, 4, 6, 8, 16]),
                ],
            ),
        )
    }
}

impl TransposeNd {
    /// The full reversal is named `transpose_<rank>d`; any other permutation
    /// spells itself out, e.g. `transpose_3d_021`.
    pub fn new(
        permutation: Vec<usize>,
        candidates: TwoLevelCandidates,
    ) -> Result<Self, ProblemError> {
        if permutation.len() > DIM_KEYS.len() {
            return Err(ProblemError::RankTooLarge {
                rank: permutation.len(),
                max: DIM_KEYS.len(),
            });
        }
        let mut seen = vec![false; permutation.len()];
        for &axis in &permutation {
            match seen.get_mut(axis) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(ProblemError::InvalidPermutation(permutation.clone())),
            }
        }
        if permutation.is_empty() {
            return Err(ProblemError::InvalidPermutation(permutation));
        }
        Ok(Self::from_parts(permutation, candidates))
    }

    fn from_parts(permutation: Vec<usize>, candidates: TwoLevelCandidates) -> Self {
        let rank = permutation.len();
        let reversed = permutation.iter().copied().eq((0..rank).rev());
        let name = if reversed {
            format!("transpose_{rank}d")
        } else {
            let axes: String = permutation.iter().map(|axis| axis.to_string()).collect();
            format!("transpose_{rank}d_{axes}")
        };
        Self {
            name,
            permutation,
            candidates,
        }
    }

    fn experts_with(&self, target: &OpTarget, shape: &ProblemShape, avx2: bool) -> [Expert; 2] {
        let cascade = self.candidates.cascade(&shape.extents());
        let options = ExpertOptions::default().with_lower_vectors(LowerVectorsOptions {
            transpose_lowering: TransposeLowering::Shuffle,
            transpose_avx2_lowering: avx2,
            ..LowerVectorsOptions::default()
        });

        let single = single_tiling_expert(
            target.clone(),
            TilingLevel::new(cascade.inner.clone()),
            options.clone(),
        );
        let double = double_tiling_expert(
            target.clone(),
            TilingLevel::new(cascade.outer),
            TilingLevel {
                pack_paddings: vec![false, true],
                hoist_paddings: vec![2, 2],
                ..TilingLevel::new(cascade.inner)
            },
            options,
        );
        [single, double]
    }
}

impl Benchmark for TransposeNd {
    fn name(&self) -> &str {
        &self.name
    }

    fn problem_keys(&self) -> &[&'static str] {
        &DIM_KEYS[..self.permutation.len()]
    }

    fn entry_point(&self) -> &str {
        "main"
    }

    fn params(&self) -> KernelParams {
        KernelParams {
            permutation: Some(self.permutation.clone()),
        }
    }

    fn target_function(&self, _shape: &ProblemShape) -> String {
        format!("{}_on_tensors", self.name)
    }

    fn experts(&self, target_function: &str, shape: &ProblemShape) -> Vec<Expert> {
        let target = OpTarget::new(target_function, OP_NAME);
        let mut experts = Vec::with_capacity(4);
        for avx2 in [false, true] {
            experts.extend(self.experts_with(&target, shape, avx2));
        }
        experts
    }

    /// Volumes close to 256^2, 512^2 and 1024^2, with the first dimension a
    /// multiple of exactly one of 4, 6, 8, 12 or 16 and the second a multiple
    /// of 8 but not 16, or of 16.
    fn default_configuration(&self) -> SweepConfiguration {
        let mut problems = Vec::new();
        for (firsts, second_by_8, second_by_16) in [
            ([4 * 65, 6 * 45, 8 * 35, 12 * 25, 16 * 16], 8 * 35, 256),
            ([4 * 145, 6 * 95, 8 * 65, 12 * 55, 16 * 32], 8 * 65, 512),
            ([4 * 275, 6 * 175, 8 * 145, 12 * 85, 16 * 65], 8 * 145, 1024),
        ] {
            for second in [second_by_8, second_by_16] {
                problems.extend(firsts.iter().map(|&first| vec![first, second]));
            }
        }

        SweepConfiguration::new(
            vec![ElementTypes(vec![ElementType::F32, ElementType::F32])],
            problems,
            1000,
        )
        .with_dumps("/tmp/abc.mlir", "/tmp/abc.o")
    }
}
