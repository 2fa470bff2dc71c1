//! Sweep driver: every expert on every problem for every element-type tuple.
//!
//! Trials run strictly in order: element types (outer), problem sizes, then
//! experts (inner). Each trial compiles its own artifact and runs it once; the
//! first failure ends the sweep.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compiler::{
    CompilationError, CompileRequest, Compiler, ExecutionError, RunRequest, Timings,
};
use crate::expert::{Expert, TilingSummary};
use crate::kernels::{Benchmark, KernelParams};
use crate::problem::{ElementTypes, ProblemError, ProblemShape, SizeBindings, SweepConfiguration};
use crate::transform::LowerVectorsOptions;

/// Text a caller greps for in the trace to detect a failed trial. A successful
/// sweep never prints it.
pub const FAILURE_SENTINEL: &str = "FAILURE";

const BANNER: &str = "#############################################################";

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("failed to write sweep trace: {0}")]
    Trace(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub element_types: ElementTypes,
    pub bindings: SizeBindings,
    pub target_function: String,
    pub expert: String,
    /// Position of the expert among those tried on this problem.
    pub expert_index: usize,
    pub tiling: TilingSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowering: Option<LowerVectorsOptions>,
    pub timings: Timings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub kernel: String,
    pub trials: Vec<TrialRecord>,
}

impl SweepReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One expert on one problem.
struct Trial<'a> {
    benchmark: &'a dyn Benchmark,
    params: &'a KernelParams,
    target_function: &'a str,
    bindings: &'a SizeBindings,
    element_types: &'a ElementTypes,
    expert: &'a Expert,
}

pub struct SweepDriver<C, W> {
    compiler: C,
    trace: W,
}

impl<C: Compiler, W: Write> SweepDriver<C, W> {
    pub fn new(compiler: C, trace: W) -> Self {
        Self { compiler, trace }
    }

    pub fn into_parts(self) -> (C, W) {
        (self.compiler, self.trace)
    }

    /// Runs the whole sweep, stopping at the first failing trial.
    pub fn run(
        &mut self,
        benchmark: &dyn Benchmark,
        config: &SweepConfiguration,
    ) -> Result<SweepReport, SweepError> {
        let params = benchmark.params();
        let mut report = SweepReport {
            kernel: benchmark.name().to_string(),
            trials: Vec::new(),
        };

        for element_types in &config.element_types {
            for sizes in &config.problem_sizes {
                let shape = ProblemShape::new(benchmark.problem_keys(), sizes)?;
                let bindings = shape.bindings();
                self.write_banner(&bindings, element_types)?;
                tracing::info!(
                    kernel = benchmark.name(),
                    problem = %bindings,
                    types = %element_types,
                    "sweeping problem"
                );

                let target_function = benchmark.target_function(&shape);
                let experts = benchmark.experts(&target_function, &shape);
                for (expert_index, expert) in experts.iter().enumerate() {
                    self.write_expert(expert)?;
                    let trial = Trial {
                        benchmark,
                        params: &params,
                        target_function: &target_function,
                        bindings: &bindings,
                        element_types,
                        expert,
                    };
                    let timings = self.trial(&trial, config)?;
                    report.trials.push(TrialRecord {
                        element_types: element_types.clone(),
                        bindings: bindings.clone(),
                        target_function: target_function.clone(),
                        expert: expert.name().to_string(),
                        expert_index,
                        tiling: expert.tiling().clone(),
                        lowering: expert.lower_vectors_options().cloned(),
                        timings,
                    });
                }
            }
        }

        self.trace.flush()?;
        Ok(report)
    }

    fn trial(
        &mut self,
        trial: &Trial<'_>,
        config: &SweepConfiguration,
    ) -> Result<Timings, SweepError> {
        let expert = trial.expert;
        let span = tracing::info_span!("trial", expert = expert.name(), problem = %trial.bindings);
        let _entered = span.enter();

        let compile = CompileRequest {
            kernel: trial.benchmark.name(),
            entry_point: trial.benchmark.entry_point(),
            target_function: trial.target_function,
            params: trial.params,
            bindings: trial.bindings,
            element_types: trial.element_types,
            expert,
            print_ir_after_all: expert.print_ir_after_all() || crate::env::print_ir_after_all(),
            dump_ir: config.dump_ir.as_ref(),
        };
        tracing::debug!(steps = expert.steps().len(), "compiling");
        let artifact = self.compiler.compile(&compile)?;

        let run = RunRequest {
            n_iters: config.n_iters,
            entry_point: trial.benchmark.entry_point(),
            bindings: trial.bindings,
            dump_obj: config.dump_obj.as_ref(),
        };
        tracing::debug!(n_iters = config.n_iters, "running");
        let timings = self.compiler.run(&artifact, &run)?;
        tracing::debug!(
            iterations = timings.iterations(),
            min_s = timings.min().unwrap_or_default(),
            "trial finished"
        );
        Ok(timings)
    }

    fn write_banner(&mut self, bindings: &SizeBindings, element_types: &ElementTypes) -> io::Result<()> {
        writeln!(self.trace)?;
        writeln!(self.trace, "{BANNER}")?;
        writeln!(self.trace, "Compile-time problem sizes {bindings}")?;
        writeln!(self.trace, "Runtime problem sizes {bindings}")?;
        writeln!(self.trace, "Problem types {element_types}")
    }

    fn write_expert(&mut self, expert: &Expert) -> io::Result<()> {
        writeln!(self.trace)?;
        writeln!(self.trace, "Compilation expert {expert}")?;
        match expert.tiling() {
            TilingSummary::SingleLevel { sizes } => writeln!(self.trace, "\t sizes = {sizes}"),
            TilingSummary::DoubleLevel { sizes1, sizes2 } => {
                writeln!(self.trace, "\t sizes1 = {sizes1} sizes2 = {sizes2}")
            }
            TilingSummary::Custom => Ok(()),
        }
    }
}
