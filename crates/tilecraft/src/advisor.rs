//! Tile-size heuristics.
//!
//! Every heuristic here picks from a small hand-tuned candidate list. A result
//! of `0` means "do not tile this dimension" and is a normal outcome.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdvisorError {
    #[error("candidate tile size must be positive")]
    ZeroCandidate,
    #[error("candidate tile size {0} appears more than once")]
    DuplicateCandidate(usize),
}

/// Ordered set of distinct, positive tile sizes for one tiling level of one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CandidateSizeList(Vec<usize>);

impl CandidateSizeList {
    pub fn new(candidates: Vec<usize>) -> Result<Self, AdvisorError> {
        for (idx, &candidate) in candidates.iter().enumerate() {
            if candidate == 0 {
                return Err(AdvisorError::ZeroCandidate);
            }
            if candidates[..idx].contains(&candidate) {
                return Err(AdvisorError::DuplicateCandidate(candidate));
            }
        }
        Ok(Self(candidates))
    }

    /// Builds a hand-written table whose entries are known to be distinct and positive.
    pub(crate) fn fixed(candidates: &[usize]) -> Self {
        debug_assert!(Self::new(candidates.to_vec()).is_ok());
        Self(candidates.to_vec())
    }
}

impl Deref for CandidateSizeList {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CandidateSizeList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Vec::<usize>::deserialize(deserializer)?;
        CandidateSizeList::new(raw).map_err(serde::de::Error::custom)
    }
}

/// One tile size per problem dimension; `0` leaves the dimension untiled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileSizeVector(Vec<usize>);

impl TileSizeVector {
    pub fn new(sizes: Vec<usize>) -> Self {
        Self(sizes)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<usize>> for TileSizeVector {
    fn from(sizes: Vec<usize>) -> Self {
        Self(sizes)
    }
}

impl fmt::Display for TileSizeVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.0)
    }
}

pub(crate) fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

/// Largest candidate that divides `n` evenly, or `0` when none does.
pub fn max_divisor(candidates: &[usize], n: usize) -> usize {
    candidates
        .iter()
        .copied()
        .filter(|&c| c > 0 && n % c == 0)
        .max()
        .unwrap_or(0)
}

/// Largest candidate not exceeding `upper_bound`, or `0` when none does.
pub fn max_at_most(candidates: &[usize], upper_bound: usize) -> usize {
    candidates
        .iter()
        .copied()
        .filter(|&c| c <= upper_bound)
        .max()
        .unwrap_or(0)
}

/// Largest multiple of `n` not exceeding the smallest of `upper_bounds`.
///
/// No pipeline consults this heuristic.
pub fn max_multiple_below(n: usize, upper_bounds: &[usize]) -> usize {
    match upper_bounds.iter().copied().min() {
        Some(bound) if n > 0 => bound - bound % n,
        _ => 0,
    }
}

/// Candidate tables for a two-level (outer, then register) tiling cascade.
///
/// `outer[d]` and `inner[d]` hold the candidates of dimension `d`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoLevelCandidates {
    pub outer: Vec<CandidateSizeList>,
    pub inner: Vec<CandidateSizeList>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileCascade {
    pub outer: TileSizeVector,
    pub inner: TileSizeVector,
}

impl TwoLevelCandidates {
    pub fn new(outer: Vec<CandidateSizeList>, inner: Vec<CandidateSizeList>) -> Self {
        Self { outer, inner }
    }

    /// Picks outer sizes against the raw extents, then inner sizes against the
    /// outer tile wherever one was chosen.
    ///
    /// A dimension with no candidate list at some level gets `0` at that level,
    /// so both vectors always have one entry per extent.
    pub fn cascade(&self, extents: &[usize]) -> TileCascade {
        let outer: Vec<usize> = extents
            .iter()
            .enumerate()
            .map(|(dim, &extent)| pick(&self.outer, dim, extent))
            .collect();

        let inner = extents
            .iter()
            .zip(&outer)
            .enumerate()
            .map(|(dim, (&extent, &tile))| {
                let effective = if tile > 0 { tile } else { extent };
                pick(&self.inner, dim, effective)
            })
            .collect();

        TileCascade {
            outer: TileSizeVector(outer),
            inner: TileSizeVector(inner),
        }
    }
}

fn pick(table: &[CandidateSizeList], dim: usize, extent: usize) -> usize {
    table
        .get(dim)
        .map(|candidates| max_divisor(candidates, extent))
        .unwrap_or(0)
}
