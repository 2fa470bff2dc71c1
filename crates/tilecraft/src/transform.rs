//! Transformation steps handed to the external compiler.
//!
//! Each step kind carries a closed, statically typed parameter record. JSON
//! input rejects fields a record does not declare, and lowering options reject
//! names they do not know.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::advisor::TileSizeVector;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("unknown lowering option `{0}`")]
    UnknownOption(String),
    #[error("invalid value `{value}` for lowering option `{key}`")]
    InvalidValue { key: String, value: String },
    #[error("malformed option `{0}`, expected key=value")]
    Malformed(String),
}

/// Function and operation a step applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpTarget {
    pub fun_name: String,
    pub op_name: String,
}

impl OpTarget {
    pub fn new(fun_name: impl Into<String>, op_name: impl Into<String>) -> Self {
        Self {
            fun_name: fun_name.into(),
            op_name: op_name.into(),
        }
    }

    /// Same function, different operation.
    pub fn with_op(&self, op_name: impl Into<String>) -> Self {
        Self::new(self.fun_name.clone(), op_name)
    }
}

impl fmt::Display for OpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.fun_name, self.op_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tile {
    pub target: OpTarget,
    #[serde(default)]
    pub tile_sizes: TileSizeVector,
    #[serde(default)]
    pub interchange: Vec<usize>,
    #[serde(default)]
    pub peel: Vec<usize>,
    #[serde(default)]
    pub pad: bool,
    #[serde(default)]
    pub pack_paddings: Vec<bool>,
    #[serde(default)]
    pub hoist_paddings: Vec<usize>,
    #[serde(default)]
    pub scalarize_dyn_dims: bool,
}

impl Tile {
    pub fn new(target: OpTarget, tile_sizes: impl Into<TileSizeVector>) -> Self {
        Self {
            target,
            tile_sizes: tile_sizes.into(),
            interchange: Vec::new(),
            peel: Vec::new(),
            pad: false,
            pack_paddings: Vec::new(),
            hoist_paddings: Vec::new(),
            scalarize_dyn_dims: false,
        }
    }

    /// Tiles every remaining dynamic dimension by one.
    pub fn scalarize(target: OpTarget) -> Self {
        Self {
            scalarize_dyn_dims: true,
            ..Self::new(target, Vec::new())
        }
    }

    pub fn interchange(mut self, interchange: Vec<usize>) -> Self {
        self.interchange = interchange;
        self
    }

    pub fn peel(mut self, loops: Vec<usize>) -> Self {
        self.peel = loops;
        self
    }

    pub fn pad(mut self, pack_paddings: Vec<bool>, hoist_paddings: Vec<usize>) -> Self {
        self.pad = true;
        self.pack_paddings = pack_paddings;
        self.hoist_paddings = hoist_paddings;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fuse {
    pub target: OpTarget,
    pub tile_sizes: TileSizeVector,
    #[serde(default)]
    pub interchange: Vec<usize>,
}

impl Fuse {
    pub fn new(target: OpTarget, tile_sizes: impl Into<TileSizeVector>) -> Self {
        Self {
            target,
            tile_sizes: tile_sizes.into(),
            interchange: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pad {
    pub target: OpTarget,
    #[serde(default)]
    pub pack_paddings: Vec<bool>,
    #[serde(default)]
    pub hoist_paddings: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Peel {
    pub target: OpTarget,
    pub loops: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Generalize {
    pub target: OpTarget,
    #[serde(default)]
    pub iterator_interchange: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Vectorize {
    pub target: OpTarget,
}

impl Vectorize {
    pub fn new(target: OpTarget) -> Self {
        Self { target }
    }
}

macro_rules! lowering_choice {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? } default $default:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, ()> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(()),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

lowering_choice!(
    ContractionLowering {
        OuterProduct => "outerproduct",
        Dot => "dot",
        Matmul => "matmulintrinsics",
    } default OuterProduct
);

lowering_choice!(
    MultiReductionLowering {
        InnerParallel => "innerparallel",
        InnerReduction => "innerreduction",
    } default InnerParallel
);

lowering_choice!(
    TransposeLowering {
        EltWise => "eltwise",
        Flat => "flat_transpose",
        Shuffle => "shuffle",
    } default EltWise
);

lowering_choice!(
    TransferSplit {
        Disabled => "none",
        LinalgCopy => "linalg-copy",
        VectorTransfers => "vector-transfers",
    } default LinalgCopy
);

/// Knobs forwarded to every staged vector-lowering step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LowerVectorsOptions {
    pub contraction_lowering: ContractionLowering,
    pub multi_reduction_lowering: MultiReductionLowering,
    pub transpose_lowering: TransposeLowering,
    pub transpose_avx2_lowering: bool,
    pub vector_transfer_split: TransferSplit,
}

impl LowerVectorsOptions {
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), OptionError> {
        let mut overrides = LoweringOverrides::default();
        overrides.set(key, value)?;
        overrides.apply_to(self);
        Ok(())
    }

    /// Applies a `key=value` assignment.
    pub fn apply(&mut self, assignment: &str) -> Result<(), OptionError> {
        let (key, value) = split_assignment(assignment)?;
        self.set(key, value)
    }
}

fn split_assignment(assignment: &str) -> Result<(&str, &str), OptionError> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| OptionError::Malformed(assignment.to_string()))?;
    Ok((key.trim(), value.trim()))
}

/// Parsed lowering knobs layered over an expert's own choices. Unset knobs
/// leave the expert's value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoweringOverrides {
    pub contraction_lowering: Option<ContractionLowering>,
    pub multi_reduction_lowering: Option<MultiReductionLowering>,
    pub transpose_lowering: Option<TransposeLowering>,
    pub transpose_avx2_lowering: Option<bool>,
    pub vector_transfer_split: Option<TransferSplit>,
}

impl LoweringOverrides {
    /// Parses a list of `key=value` assignments; later ones win.
    pub fn parse<I, S>(assignments: I) -> Result<Self, OptionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = Self::default();
        for assignment in assignments {
            let (key, value) = split_assignment(assignment.as_ref())?;
            overrides.set(key, value)?;
        }
        Ok(overrides)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), OptionError> {
        let invalid = || OptionError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "contraction_lowering" => {
                self.contraction_lowering = Some(value.parse().map_err(|_| invalid())?)
            }
            "multi_reduction_lowering" => {
                self.multi_reduction_lowering = Some(value.parse().map_err(|_| invalid())?)
            }
            "transpose_lowering" => {
                self.transpose_lowering = Some(value.parse().map_err(|_| invalid())?)
            }
            "transpose_avx2_lowering" => {
                self.transpose_avx2_lowering = Some(parse_bool(value).ok_or_else(invalid)?)
            }
            "vector_transfer_split" => {
                self.vector_transfer_split = Some(value.parse().map_err(|_| invalid())?)
            }
            other => return Err(OptionError::UnknownOption(other.to_string())),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, options: &mut LowerVectorsOptions) {
        if let Some(value) = self.contraction_lowering {
            options.contraction_lowering = value;
        }
        if let Some(value) = self.multi_reduction_lowering {
            options.multi_reduction_lowering = value;
        }
        if let Some(value) = self.transpose_lowering {
            options.transpose_lowering = value;
        }
        if let Some(value) = self.transpose_avx2_lowering {
            options.transpose_avx2_lowering = value;
        }
        if let Some(value) = self.vector_transfer_split {
            options.vector_transfer_split = value;
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lower {
    /// One stage of the progressive vector lowering.
    Vectors {
        stage: usize,
        options: LowerVectorsOptions,
    },
    /// Final lowering to the executable form.
    Llvm,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformStep {
    Tile(Tile),
    Fuse(Fuse),
    Pad(Pad),
    Peel(Peel),
    Generalize(Generalize),
    Vectorize(Vectorize),
    Bufferize,
    Lower(Lower),
}

impl TransformStep {
    pub fn kind(&self) -> &'static str {
        match self {
            TransformStep::Tile(_) => "tile",
            TransformStep::Fuse(_) => "fuse",
            TransformStep::Pad(_) => "pad",
            TransformStep::Peel(_) => "peel",
            TransformStep::Generalize(_) => "generalize",
            TransformStep::Vectorize(_) => "vectorize",
            TransformStep::Bufferize => "bufferize",
            TransformStep::Lower(_) => "lower",
        }
    }

    pub fn target(&self) -> Option<&OpTarget> {
        match self {
            TransformStep::Tile(t) => Some(&t.target),
            TransformStep::Fuse(t) => Some(&t.target),
            TransformStep::Pad(t) => Some(&t.target),
            TransformStep::Peel(t) => Some(&t.target),
            TransformStep::Generalize(t) => Some(&t.target),
            TransformStep::Vectorize(t) => Some(&t.target),
            TransformStep::Bufferize | TransformStep::Lower(_) => None,
        }
    }
}

impl From<Tile> for TransformStep {
    fn from(step: Tile) -> Self {
        TransformStep::Tile(step)
    }
}

impl From<Fuse> for TransformStep {
    fn from(step: Fuse) -> Self {
        TransformStep::Fuse(step)
    }
}

impl From<Pad> for TransformStep {
    fn from(step: Pad) -> Self {
        TransformStep::Pad(step)
    }
}

impl From<Peel> for TransformStep {
    fn from(step: Peel) -> Self {
        TransformStep::Peel(step)
    }
}

impl From<Generalize> for TransformStep {
    fn from(step: Generalize) -> Self {
        TransformStep::Generalize(step)
    }
}

impl From<Vectorize> for TransformStep {
    fn from(step: Vectorize) -> Self {
        TransformStep::Vectorize(step)
    }
}

impl fmt::Display for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformStep::Tile(t) if t.scalarize_dyn_dims => {
                write!(f, "tile {} scalarize_dyn_dims", t.target)
            }
            TransformStep::Tile(t) => write!(f, "tile {} sizes={}", t.target, t.tile_sizes),
            TransformStep::Fuse(t) => write!(f, "fuse {} sizes={}", t.target, t.tile_sizes),
            TransformStep::Lower(Lower::Vectors { stage, .. }) => {
                write!(f, "lower vectors stage={stage}")
            }
            TransformStep::Lower(Lower::Llvm) => f.write_str("lower llvm"),
            TransformStep::Bufferize => f.write_str("bufferize"),
            other => match other.target() {
                Some(target) => write!(f, "{} {target}", other.kind()),
                None => f.write_str(other.kind()),
            },
        }
    }
}
