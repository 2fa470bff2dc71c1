use std::sync::Arc;

use crate::expert::Expert;
use crate::problem::{ProblemShape, SweepConfiguration};
use crate::transform::LoweringOverrides;

use super::{Benchmark, KernelParams};

/// A registered benchmark with its expert catalog and lowering knobs
/// replaced. Names, entry point and default sweep come from the base.
#[derive(Clone)]
pub struct CustomizedBenchmark {
    base: Arc<dyn Benchmark>,
    experts: Option<Vec<Expert>>,
    lowering: LoweringOverrides,
}

impl CustomizedBenchmark {
    pub fn new(base: Arc<dyn Benchmark>) -> Self {
        Self {
            base,
            experts: None,
            lowering: LoweringOverrides::default(),
        }
    }

    /// Tries `experts` on every problem instead of the base catalog.
    pub fn with_experts(mut self, experts: Vec<Expert>) -> Self {
        self.experts = Some(experts);
        self
    }

    pub fn with_lowering(mut self, lowering: LoweringOverrides) -> Self {
        self.lowering = lowering;
        self
    }
}

impl Benchmark for CustomizedBenchmark {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn problem_keys(&self) -> &[&'static str] {
        self.base.problem_keys()
    }

    fn entry_point(&self) -> &str {
        self.base.entry_point()
    }

    fn params(&self) -> KernelParams {
        self.base.params()
    }

    fn target_function(&self, shape: &ProblemShape) -> String {
        self.base.target_function(shape)
    }

    fn experts(&self, target_function: &str, shape: &ProblemShape) -> Vec<Expert> {
        let mut experts = match &self.experts {
            Some(experts) => experts.clone(),
            None => self.base.experts(target_function, shape),
        };
        if !self.lowering.is_empty() {
            for expert in &mut experts {
                expert.override_lowering(&self.lowering);
            }
        }
        experts
    }

    fn default_configuration(&self) -> SweepConfiguration {
        self.base.default_configuration()
    }
}
