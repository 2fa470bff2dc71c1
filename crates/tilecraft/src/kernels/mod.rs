//! Kernel benchmarks: candidate tables, expert catalogs and default sweeps.

mod copy;
mod custom;
mod matvec;
mod registry;
mod transpose;

use serde::Serialize;

use crate::expert::Expert;
use crate::problem::{ProblemShape, SweepConfiguration};

pub use copy::Copy2d;
pub use custom::CustomizedBenchmark;
pub use matvec::{matvec_experts, MatVec};
pub use registry::{get_benchmark, list_benchmarks, register_benchmark};
pub use transpose::TransposeNd;

/// Outer tile candidates shared by the copy and transpose kernels.
pub(crate) const OUTER_TILE_CANDIDATES: [usize; 14] =
    [24, 30, 32, 36, 40, 42, 48, 54, 60, 64, 80, 96, 120, 128];

/// Kernel parameters the compiler needs beyond names and problem sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KernelParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permutation: Option<Vec<usize>>,
}

/// A kernel that can be swept: the names it is compiled under and the experts
/// tried on each problem.
///
/// The kernel body and its reference computation belong to the external
/// compiler; this side only knows names and strategies.
pub trait Benchmark: Send + Sync {
    fn name(&self) -> &str;

    /// Dimension names, in the order problem sizes are given.
    fn problem_keys(&self) -> &[&'static str];

    fn entry_point(&self) -> &str;

    fn params(&self) -> KernelParams {
        KernelParams::default()
    }

    /// Function the experts transform for this problem.
    fn target_function(&self, shape: &ProblemShape) -> String;

    /// Experts to try on one problem, in trial order.
    fn experts(&self, target_function: &str, shape: &ProblemShape) -> Vec<Expert>;

    fn default_configuration(&self) -> SweepConfiguration;
}
