use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::advisor::write_list;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProblemError {
    #[error("problem has {sizes} sizes but the kernel names {keys} dimensions")]
    RankMismatch { keys: usize, sizes: usize },
    #[error("unknown element type `{0}`")]
    UnknownElementType(String),
    #[error("malformed problem size `{0}`, expected extents separated by `x`")]
    MalformedSizes(String),
    #[error("{0:?} is not a permutation of its own indices")]
    InvalidPermutation(Vec<usize>),
    #[error("rank {rank} exceeds the {max} named dimensions")]
    RankTooLarge { rank: usize, max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    F16,
    F32,
    F64,
    I8,
    I32,
    I64,
}

impl ElementType {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::F16 => "f16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::I8 => "i8",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = ProblemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f16" | "float16" => Ok(ElementType::F16),
            "f32" | "float32" => Ok(ElementType::F32),
            "f64" | "float64" => Ok(ElementType::F64),
            "i8" | "int8" => Ok(ElementType::I8),
            "i32" | "int32" => Ok(ElementType::I32),
            "i64" | "int64" => Ok(ElementType::I64),
            other => Err(ProblemError::UnknownElementType(other.to_string())),
        }
    }
}

/// Element types bound to the kernel's operand slots, in slot order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementTypes(pub Vec<ElementType>);

impl fmt::Display for ElementTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub extent: usize,
}

/// Named problem extents in kernel dimension order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProblemShape {
    dims: Vec<Dimension>,
}

impl ProblemShape {
    pub fn new(keys: &[&str], sizes: &[usize]) -> Result<Self, ProblemError> {
        if keys.len() != sizes.len() {
            return Err(ProblemError::RankMismatch {
                keys: keys.len(),
                sizes: sizes.len(),
            });
        }
        let dims = keys
            .iter()
            .zip(sizes)
            .map(|(name, &extent)| Dimension {
                name: (*name).to_string(),
                extent,
            })
            .collect();
        Ok(Self { dims })
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn extents(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.extent).collect()
    }

    pub fn bindings(&self) -> SizeBindings {
        SizeBindings(
            self.dims
                .iter()
                .map(|d| (d.name.clone(), d.extent))
                .collect(),
        )
    }
}

/// Ordered `name -> extent` map handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SizeBindings(Vec<(String, usize)>);

impl SizeBindings {
    pub fn get(&self, name: &str) -> Option<usize> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, extent)| *extent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(key, extent)| (key.as_str(), *extent))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SizeBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (key, extent)) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {extent}")?;
        }
        f.write_str("}")
    }
}

impl Serialize for SizeBindings {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, extent) in &self.0 {
            map.serialize_entry(key, extent)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SizeBindings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct BindingsVisitor;

        impl<'de> serde::de::Visitor<'de> for BindingsVisitor {
            type Value = SizeBindings;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of dimension names to extents")
            }

            fn visit_map<A>(self, mut access: A) -> Result<SizeBindings, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((key, extent)) = access.next_entry::<String, usize>()? {
                    entries.push((key, extent));
                }
                Ok(SizeBindings(entries))
            }
        }

        deserializer.deserialize_map(BindingsVisitor)
    }
}

/// Parses `24x32` style problem sizes.
pub fn parse_sizes(text: &str) -> Result<Vec<usize>, ProblemError> {
    let malformed = || ProblemError::MalformedSizes(text.to_string());
    if text.trim().is_empty() {
        return Err(malformed());
    }
    text.split(['x', 'X', ','])
        .map(|part| part.trim().parse::<usize>().map_err(|_| malformed()))
        .collect()
}

/// Cross product of element-type tuples and problem sizes driving one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfiguration {
    pub element_types: Vec<ElementTypes>,
    pub problem_sizes: Vec<Vec<usize>>,
    pub n_iters: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_ir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_obj: Option<PathBuf>,
}

impl SweepConfiguration {
    pub fn new(element_types: Vec<ElementTypes>, problem_sizes: Vec<Vec<usize>>, n_iters: usize) -> Self {
        Self {
            element_types,
            problem_sizes,
            n_iters,
            dump_ir: None,
            dump_obj: None,
        }
    }

    pub fn with_dumps(mut self, dump_ir: impl Into<PathBuf>, dump_obj: impl Into<PathBuf>) -> Self {
        self.dump_ir = Some(dump_ir.into());
        self.dump_obj = Some(dump_obj.into());
        self
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Number of compile/run trials when every problem yields `experts_per_problem` experts.
    pub fn trial_count(&self, experts_per_problem: usize) -> usize {
        self.element_types.len() * self.problem_sizes.len() * experts_per_problem
    }
}
