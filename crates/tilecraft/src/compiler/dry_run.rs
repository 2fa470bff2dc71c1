use super::{CompilationError, CompileRequest, Compiler, ExecutionError, RunRequest, Timings};
use crate::kernels::KernelParams;
use crate::problem::SizeBindings;

/// One request observed by a [`DryRunCompiler`], in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DryRunCall {
    Compile {
        target_function: String,
        params: KernelParams,
        expert: String,
        bindings: SizeBindings,
        steps: usize,
    },
    Run {
        artifact: usize,
        n_iters: usize,
        bindings: SizeBindings,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DryRunArtifact {
    pub id: usize,
}

/// Accepts every pipeline without compiling anything and records the calls.
#[derive(Debug, Default)]
pub struct DryRunCompiler {
    calls: Vec<DryRunCall>,
    compiled: usize,
}

impl DryRunCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[DryRunCall] {
        &self.calls
    }

    pub fn compile_count(&self) -> usize {
        self.compiled
    }

    pub fn run_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, DryRunCall::Run { .. }))
            .count()
    }
}

impl Compiler for DryRunCompiler {
    type Artifact = DryRunArtifact;

    fn compile(&mut self, request: &CompileRequest<'_>) -> Result<DryRunArtifact, CompilationError> {
        self.calls.push(DryRunCall::Compile {
            target_function: request.target_function.to_string(),
            params: request.params.clone(),
            expert: request.expert.name().to_string(),
            bindings: request.bindings.clone(),
            steps: request.expert.steps().len(),
        });
        let artifact = DryRunArtifact { id: self.compiled };
        self.compiled += 1;
        Ok(artifact)
    }

    fn run(
        &mut self,
        artifact: &DryRunArtifact,
        request: &RunRequest<'_>,
    ) -> Result<Timings, ExecutionError> {
        if artifact.id >= self.compiled {
            return Err(ExecutionError::MalformedArtifact {
                message: format!("artifact {} was never compiled", artifact.id),
            });
        }
        self.calls.push(DryRunCall::Run {
            artifact: artifact.id,
            n_iters: request.n_iters,
            bindings: request.bindings.clone(),
        });
        Ok(Timings::default())
    }
}
