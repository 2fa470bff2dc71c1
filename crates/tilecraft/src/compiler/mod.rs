//! Contract with the external compiler/runtime.
//!
//! The compiler takes an [`Expert`] bound to concrete problem sizes and
//! produces an artifact; the runtime executes that artifact and reports
//! per-iteration timings. Nothing here validates an expert against the kernel:
//! a malformed pipeline surfaces as a [`CompilationError`] from the compiler.

mod dry_run;
mod process;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expert::Expert;
use crate::kernels::KernelParams;
use crate::problem::{ElementTypes, SizeBindings};

pub use dry_run::{DryRunArtifact, DryRunCall, DryRunCompiler};
pub use process::{ProcessArtifact, ProcessCompiler};

#[derive(Debug, Error)]
pub enum CompilationError {
    /// The pipeline does not fit the kernel, e.g. a size vector of the wrong
    /// rank or an operation the kernel does not contain.
    #[error("{message}")]
    Configuration { message: String },
    #[error("target function `{name}` could not be resolved")]
    UnresolvedTarget { name: String },
    #[error("{message}")]
    Rejected { message: String },
    #[error("failed to invoke compiler: {0}")]
    Invocation(#[source] io::Error),
    #[error("malformed compiler response: {0}")]
    Protocol(String),
}

impl CompilationError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{message}")]
    Fault { message: String },
    #[error("malformed artifact: {message}")]
    MalformedArtifact { message: String },
    #[error("failed to invoke runtime: {0}")]
    Invocation(#[source] io::Error),
    #[error("malformed runtime response: {0}")]
    Protocol(String),
}

impl ExecutionError {
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileRequest<'a> {
    pub kernel: &'a str,
    pub entry_point: &'a str,
    pub target_function: &'a str,
    pub params: &'a KernelParams,
    pub bindings: &'a SizeBindings,
    pub element_types: &'a ElementTypes,
    pub expert: &'a Expert,
    pub print_ir_after_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_ir: Option<&'a PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRequest<'a> {
    pub n_iters: usize,
    pub entry_point: &'a str,
    pub bindings: &'a SizeBindings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_obj: Option<&'a PathBuf>,
}

/// Per-iteration wall-clock times in seconds, as reported by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    pub elapsed_s: Vec<f64>,
}

impl Timings {
    pub fn new(elapsed_s: Vec<f64>) -> Self {
        Self { elapsed_s }
    }

    pub fn iterations(&self) -> usize {
        self.elapsed_s.len()
    }

    pub fn min(&self) -> Option<f64> {
        self.elapsed_s.iter().copied().reduce(f64::min)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.elapsed_s.is_empty() {
            return None;
        }
        Some(self.elapsed_s.iter().sum::<f64>() / self.elapsed_s.len() as f64)
    }

    pub fn median(&self) -> Option<f64> {
        if self.elapsed_s.is_empty() {
            return None;
        }
        let mut sorted = self.elapsed_s.clone();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }
}

/// External compiler and runtime driven by a sweep.
///
/// Calls are strictly sequential: a sweep waits for each compile and each run
/// before issuing the next request.
pub trait Compiler {
    type Artifact;

    fn compile(&mut self, request: &CompileRequest<'_>) -> Result<Self::Artifact, CompilationError>;

    fn run(
        &mut self,
        artifact: &Self::Artifact,
        request: &RunRequest<'_>,
    ) -> Result<Timings, ExecutionError>;
}

impl<C: Compiler + ?Sized> Compiler for &mut C {
    type Artifact = C::Artifact;

    fn compile(&mut self, request: &CompileRequest<'_>) -> Result<Self::Artifact, CompilationError> {
        (**self).compile(request)
    }

    fn run(
        &mut self,
        artifact: &Self::Artifact,
        request: &RunRequest<'_>,
    ) -> Result<Timings, ExecutionError> {
        (**self).run(artifact, request)
    }
}
