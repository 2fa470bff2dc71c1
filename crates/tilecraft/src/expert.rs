//! Expert pipelines: ordered transformation steps plus the target they apply to.
//!
//! Every expert ends with the same suffix: bufferize, then the staged vector
//! lowering, then the final lowering. [`ExpertBuilder::finish`] appends it, so
//! callers only describe the steps in front of it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::advisor::TileSizeVector;
use crate::transform::{
    Lower, LowerVectorsOptions, LoweringOverrides, OpTarget, Tile, TransformStep, Vectorize,
};

/// Number of staged vector-lowering steps in the suffix.
pub const LOWER_VECTORS_STAGES: usize = 7;

#[derive(Debug, Error)]
pub enum ExpertError {
    /// Bufferization and lowering belong to the sealed suffix only.
    #[error("expert `{expert}` supplies suffix step `{step}` before the suffix")]
    SuffixStep { expert: String, step: String },
    #[error("post-bufferization steps may not contain `{0}`")]
    PostBufferizationSuffixStep(String),
    #[error("malformed expert list: {0}")]
    Json(#[from] serde_json::Error),
}

fn is_suffix_step(step: &TransformStep) -> bool {
    matches!(step, TransformStep::Bufferize | TransformStep::Lower(_))
}

/// Which tile-size vectors an expert was built from, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TilingSummary {
    SingleLevel {
        sizes: TileSizeVector,
    },
    DoubleLevel {
        sizes1: TileSizeVector,
        sizes2: TileSizeVector,
    },
    Custom,
}

/// Parameters of one tiling level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TilingLevel {
    pub sizes: TileSizeVector,
    pub interchange: Vec<usize>,
    pub peel: Vec<usize>,
    pub pad: bool,
    pub pack_paddings: Vec<bool>,
    pub hoist_paddings: Vec<usize>,
}

impl TilingLevel {
    pub fn new(sizes: impl Into<TileSizeVector>) -> Self {
        Self {
            sizes: sizes.into(),
            ..Self::default()
        }
    }

    fn tile(&self, target: &OpTarget) -> Tile {
        Tile {
            target: target.clone(),
            tile_sizes: self.sizes.clone(),
            interchange: self.interchange.clone(),
            peel: self.peel.clone(),
            pad: self.pad,
            pack_paddings: self.pack_paddings.clone(),
            hoist_paddings: self.hoist_paddings.clone(),
            scalarize_dyn_dims: false,
        }
    }
}

/// Extras forwarded into the fixed suffix of an expert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExpertOptions {
    post_bufferization: Vec<TransformStep>,
    lower_vectors: LowerVectorsOptions,
    print_ir_after_all: bool,
}

impl ExpertOptions {
    /// Steps run right after bufferization, e.g. vectorizing copies that only
    /// exist once buffers do.
    pub fn with_post_bufferization(
        mut self,
        steps: Vec<TransformStep>,
    ) -> Result<Self, ExpertError> {
        if let Some(step) = steps.iter().find(|step| is_suffix_step(step)) {
            return Err(ExpertError::PostBufferizationSuffixStep(step.to_string()));
        }
        self.post_bufferization = steps;
        Ok(self)
    }

    pub fn vectorize_after_bufferization(mut self, target: OpTarget) -> Self {
        self.post_bufferization.push(Vectorize::new(target).into());
        self
    }

    pub fn with_lower_vectors(mut self, options: LowerVectorsOptions) -> Self {
        self.lower_vectors = options;
        self
    }

    pub fn with_print_ir_after_all(mut self, enabled: bool) -> Self {
        self.print_ir_after_all = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Expert {
    name: String,
    target: Option<OpTarget>,
    tiling: TilingSummary,
    steps: Vec<TransformStep>,
    print_ir_after_all: bool,
}

impl Expert {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Option<&OpTarget> {
        self.target.as_ref()
    }

    pub fn tiling(&self) -> &TilingSummary {
        &self.tiling
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    pub fn print_ir_after_all(&self) -> bool {
        self.print_ir_after_all
    }

    /// Options of the staged vector lowering; every stage carries the same.
    pub fn lower_vectors_options(&self) -> Option<&LowerVectorsOptions> {
        self.steps.iter().find_map(|step| match step {
            TransformStep::Lower(Lower::Vectors { options, .. }) => Some(options),
            _ => None,
        })
    }

    /// Layers `overrides` over every staged vector-lowering step.
    pub fn override_lowering(&mut self, overrides: &LoweringOverrides) {
        for step in &mut self.steps {
            if let TransformStep::Lower(Lower::Vectors { options, .. }) = step {
                overrides.apply_to(options);
            }
        }
    }
}

impl fmt::Display for Expert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{} on {}", self.name, target),
            None => f.write_str(&self.name),
        }
    }
}

pub struct ExpertBuilder {
    name: String,
    target: Option<OpTarget>,
    tiling: TilingSummary,
    steps: Vec<TransformStep>,
}

impl ExpertBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
            tiling: TilingSummary::Custom,
            steps: Vec::new(),
        }
    }

    pub fn target(mut self, target: OpTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn tiling(mut self, tiling: TilingSummary) -> Self {
        self.tiling = tiling;
        self
    }

    pub fn step(&mut self, step: impl Into<TransformStep>) {
        self.steps.push(step.into());
    }

    pub fn steps<I>(&mut self, steps: I)
    where
        I: IntoIterator<Item = TransformStep>,
    {
        self.steps.extend(steps);
    }

    /// Seals the pipeline with bufferize, post-bufferization steps, the staged
    /// vector lowering and the final lowering. Steps already added may not
    /// bufferize or lower.
    pub fn finish(self, options: ExpertOptions) -> Result<Expert, ExpertError> {
        if let Some(step) = self.steps.iter().find(|step| is_suffix_step(step)) {
            return Err(ExpertError::SuffixStep {
                expert: self.name,
                step: step.to_string(),
            });
        }
        Ok(self.seal(options))
    }

    fn seal(self, options: ExpertOptions) -> Expert {
        let ExpertOptions {
            post_bufferization,
            lower_vectors,
            print_ir_after_all,
        } = options;

        let mut steps = self.steps;
        steps.push(TransformStep::Bufferize);
        steps.extend(post_bufferization);
        steps.extend((0..LOWER_VECTORS_STAGES).map(|stage| {
            TransformStep::Lower(Lower::Vectors {
                stage,
                options: lower_vectors.clone(),
            })
        }));
        steps.push(TransformStep::Lower(Lower::Llvm));

        Expert {
            name: self.name,
            target: self.target,
            tiling: self.tiling,
            steps,
            print_ir_after_all,
        }
    }
}

/// Tile once, vectorize, then the common suffix.
pub fn single_tiling_expert(target: OpTarget, level: TilingLevel, options: ExpertOptions) -> Expert {
    let mut builder = ExpertBuilder::new("SingleTilingExpert")
        .target(target.clone())
        .tiling(TilingSummary::SingleLevel {
            sizes: level.sizes.clone(),
        });
    builder.step(level.tile(&target));
    builder.step(Vectorize::new(target));
    builder.seal(options)
}

/// Tile twice with independent parameters, vectorize, then the common suffix.
pub fn double_tiling_expert(
    target: OpTarget,
    level1: TilingLevel,
    level2: TilingLevel,
    options: ExpertOptions,
) -> Expert {
    let mut builder = ExpertBuilder::new("DoubleTilingExpert")
        .target(target.clone())
        .tiling(TilingSummary::DoubleLevel {
            sizes1: level1.sizes.clone(),
            sizes2: level2.sizes.clone(),
        });
    builder.step(level1.tile(&target));
    builder.step(level2.tile(&target));
    builder.step(Vectorize::new(target));
    builder.seal(options)
}

fn prefixed(name: impl Into<String>, prefix: Vec<TransformStep>) -> ExpertBuilder {
    let target = prefix.iter().find_map(|step| step.target().cloned());
    let mut builder = ExpertBuilder::new(name);
    if let Some(target) = target {
        builder = builder.target(target);
    }
    builder.steps(prefix);
    builder
}

/// Caller-authored prefix followed by the common suffix with default lowering.
pub fn test_expert(
    name: impl Into<String>,
    prefix: Vec<TransformStep>,
) -> Result<Expert, ExpertError> {
    prefixed(name, prefix).finish(ExpertOptions::default())
}

/// Built-in catalog entry whose prefix holds no suffix steps.
pub(crate) fn catalog_expert(name: &str, prefix: Vec<TransformStep>) -> Expert {
    debug_assert!(!prefix.iter().any(is_suffix_step), "{name} prefix bufferizes or lowers");
    prefixed(name, prefix).seal(ExpertOptions::default())
}

/// Hand-authored test expert as read from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestExpertSpec {
    pub name: String,
    #[serde(default)]
    pub prefix: Vec<TransformStep>,
}

impl TestExpertSpec {
    pub fn build(self) -> Result<Expert, ExpertError> {
        test_expert(self.name, self.prefix)
    }
}

/// Parses a JSON array of `{"name", "prefix"}` records into test experts.
pub fn test_experts_from_json(text: &str) -> Result<Vec<Expert>, ExpertError> {
    let specs: Vec<TestExpertSpec> = serde_json::from_str(text)?;
    specs.into_iter().map(TestExpertSpec::build).collect()
}
