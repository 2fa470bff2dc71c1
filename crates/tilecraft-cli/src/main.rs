//! Command-line driver: list kernels, print expert pipelines, run sweeps and
//! summarize their reports.

mod benchmark;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tilecraft::compiler::{DryRunCompiler, ProcessCompiler};
use tilecraft::expert::test_experts_from_json;
use tilecraft::kernels::{get_benchmark, list_benchmarks, Benchmark, CustomizedBenchmark};
use tilecraft::problem::{parse_sizes, ProblemError};
use tilecraft::sweep::FAILURE_SENTINEL;
use tilecraft::{
    Compiler, LoweringOverrides, ProblemShape, SweepConfiguration, SweepDriver, SweepReport,
};
use tracing_subscriber::EnvFilter;

use benchmark::report::{fastest_per_problem, kernel_name};
use benchmark::settings::resolve_n_iters;

#[derive(Parser)]
#[command(name = "tilecraft")]
#[command(version)]
#[command(about = "Sweep tiling and vectorization experts over an external kernel compiler")]
#[command(long_about = r#"
Builds transformation pipelines ("experts") for the copy, matvec and transpose
kernels, hands them to an external compiler/runtime and reports per-iteration
timings for every expert, problem size and element-type tuple.

Example usage:
  tilecraft list
  tilecraft experts transpose_2d --problem 256x256
  tilecraft sweep matvec --compiler ./mlir-bench --report matvec.json
  tilecraft summarize matvec.json
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered kernels
    List,

    /// Print the experts a kernel tries on one problem, as JSON
    Experts {
        /// Kernel name, see `tilecraft list`
        kernel: String,

        /// Problem sizes, e.g. 32x64
        #[arg(long)]
        problem: Sizes,

        #[command(flatten)]
        custom: Customization,
    },

    /// Compile and run every expert on every problem
    Sweep {
        /// Kernel name, see `tilecraft list`
        kernel: String,

        /// Sweep configuration as JSON (default: the kernel's own)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Replace the configured problem sizes; repeatable
        #[arg(long = "problem")]
        problems: Vec<Sizes>,

        /// Iterations per run (default: $TILECRAFT_N_ITERS, else the configuration)
        #[arg(long)]
        n_iters: Option<usize>,

        #[command(flatten)]
        custom: Customization,

        /// External compiler program (default: $TILECRAFT_COMPILER, else a dry run)
        #[arg(long)]
        compiler: Option<String>,

        /// Extra argument passed to the compiler before the subcommand; repeatable
        #[arg(long = "compiler-arg", allow_hyphen_values = true)]
        compiler_args: Vec<String>,

        /// Write the sweep report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the fastest expert per problem from a sweep report
    Summarize {
        /// Report written by `tilecraft sweep --report`
        report: PathBuf,
    },
}

#[derive(clap::Args)]
struct Customization {
    /// Lowering override applied to every expert, e.g. transpose_lowering=shuffle; repeatable
    #[arg(long = "lowering", value_name = "KEY=VALUE")]
    lowering: Vec<String>,

    /// Hand-authored experts as JSON: [{"name", "prefix"}]
    #[arg(long)]
    experts: Option<PathBuf>,
}

#[derive(Clone, Debug)]
struct Sizes(Vec<usize>);

impl FromStr for Sizes {
    type Err = ProblemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_sizes(s).map(Sizes)
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{FAILURE_SENTINEL}: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::List => {
            for name in list_benchmarks() {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Experts {
            kernel,
            problem,
            custom,
        } => {
            let benchmark = customized(&kernel, &custom)?;
            let shape = ProblemShape::new(benchmark.problem_keys(), &problem.0)
                .with_context(|| format!("problem for kernel `{kernel}`"))?;
            let target_function = benchmark.target_function(&shape);
            let experts = benchmark.experts(&target_function, &shape);
            println!("{}", serde_json::to_string_pretty(&experts)?);
            Ok(())
        }
        Commands::Sweep {
            kernel,
            config,
            problems,
            n_iters,
            custom,
            compiler,
            compiler_args,
            report,
        } => {
            let benchmark = customized(&kernel, &custom)?;
            let mut config = match config {
                Some(path) => load_configuration(&path)?,
                None => benchmark.default_configuration(),
            };
            if !problems.is_empty() {
                config.problem_sizes = problems.into_iter().map(|sizes| sizes.0).collect();
            }
            config.n_iters =
                resolve_n_iters(n_iters, tilecraft::n_iters_override(), config.n_iters);

            let sweep_report = match compiler.or_else(tilecraft::compiler_program) {
                Some(program) => {
                    let compiler = compiler_args
                        .iter()
                        .fold(ProcessCompiler::new(program), |compiler, arg| {
                            compiler.arg(arg)
                        });
                    tracing::info!(program = ?compiler.program(), "using external compiler");
                    sweep(compiler, &benchmark, &config)?
                }
                None => {
                    tracing::info!("no compiler configured, dry run");
                    sweep(DryRunCompiler::new(), &benchmark, &config)?
                }
            };

            if let Some(path) = report {
                fs::write(&path, sweep_report.to_json()?)
                    .with_context(|| format!("failed to write report {}", path.display()))?;
            }
            Ok(())
        }
        Commands::Summarize { report } => {
            let text = fs::read_to_string(&report)
                .with_context(|| format!("failed to read report {}", report.display()))?;
            let winners = fastest_per_problem(&text)
                .ok_or_else(|| anyhow!("{} is not a sweep report", report.display()))?;
            if let Some(kernel) = kernel_name(&text) {
                println!("kernel {kernel}");
            }
            for winner in winners {
                let expert = match winner.expert_index {
                    Some(index) => format!("{} #{index}", winner.expert),
                    None => winner.expert,
                };
                match winner.lowering {
                    Some(lowering) => println!(
                        "{} {}: {expert} [{lowering}] min {:.6}s",
                        winner.element_types, winner.bindings, winner.min_s
                    ),
                    None => println!(
                        "{} {}: {expert} min {:.6}s",
                        winner.element_types, winner.bindings, winner.min_s
                    ),
                }
            }
            Ok(())
        }
    }
}

fn customized(kernel: &str, custom: &Customization) -> Result<CustomizedBenchmark> {
    let base = get_benchmark(kernel).ok_or_else(|| {
        anyhow!(
            "unknown kernel `{kernel}`, expected one of: {}",
            list_benchmarks().join(", ")
        )
    })?;
    let lowering = LoweringOverrides::parse(&custom.lowering).context("invalid --lowering")?;
    let mut benchmark = CustomizedBenchmark::new(base).with_lowering(lowering);
    if let Some(path) = &custom.experts {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read experts {}", path.display()))?;
        let experts = test_experts_from_json(&text)
            .with_context(|| format!("invalid experts in {}", path.display()))?;
        benchmark = benchmark.with_experts(experts);
    }
    Ok(benchmark)
}

fn load_configuration(path: &Path) -> Result<SweepConfiguration> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration {}", path.display()))?;
    SweepConfiguration::from_json(&text)
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

fn sweep<C: Compiler>(
    compiler: C,
    benchmark: &dyn Benchmark,
    config: &SweepConfiguration,
) -> Result<SweepReport> {
    let stdout = io::stdout();
    let mut driver = SweepDriver::new(compiler, stdout.lock());
    Ok(driver.run(benchmark, config)?)
}
