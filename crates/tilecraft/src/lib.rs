//! Tile-size heuristics and transformation experts for benchmarking an
//! external kernel compiler.
//!
//! - [`advisor`] picks tile sizes from hand-tuned candidate tables.
//! - [`transform`] and [`expert`] assemble those sizes into ordered pipelines.
//! - [`sweep`] drives a [`compiler::Compiler`] over problem sizes and element types.
//! - [`kernels`] holds the copy, matvec and transpose benchmarks.

pub mod advisor;
pub mod compiler;
mod env;
pub mod expert;
pub mod kernels;
pub mod problem;
pub mod sweep;
pub mod transform;

pub use advisor::{CandidateSizeList, TileSizeVector, TwoLevelCandidates};
pub use compiler::{CompilationError, Compiler, ExecutionError, Timings};
pub use env::{compiler_program, n_iters_override};
pub use expert::{Expert, ExpertBuilder, ExpertError, ExpertOptions, TilingLevel, TilingSummary};
pub use kernels::{Benchmark, KernelParams};
pub use problem::{ElementType, ElementTypes, ProblemShape, SizeBindings, SweepConfiguration};
pub use sweep::{SweepDriver, SweepError, SweepReport};
pub use transform::{LowerVectorsOptions, LoweringOverrides, TransformStep};
