use std::ffi::OsString;
use std::io::{self, Write};
use std::process::{Command, Output, Stdio};
use std::thread;

use serde::{Deserialize, Serialize};

use super::{CompilationError, CompileRequest, Compiler, ExecutionError, RunRequest, Timings};

/// Handle returned by the external tool for a compiled pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessArtifact {
    pub artifact: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    kind: String,
    message: String,
}

#[derive(Serialize)]
struct RunEnvelope<'a> {
    artifact: &'a str,
    #[serde(flatten)]
    request: &'a RunRequest<'a>,
}

/// Drives an external program speaking JSON over stdin/stdout.
///
/// The program is invoked as `<program> <args..> compile` or
/// `<program> <args..> run`. A nonzero exit fails the call; when stdout then
/// holds `{"error": {"kind", "message"}}` the kind selects the error variant,
/// otherwise stderr becomes the diagnostic.
#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    program: OsString,
    args: Vec<OsString>,
}

impl ProcessCompiler {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    /// Feeds `payload` from a helper thread while the output drains, so a
    /// child that answers before reading all of stdin is still heard.
    fn invoke(&self, subcommand: &str, payload: &[u8]) -> io::Result<Output> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(subcommand)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdin = child.stdin.take();

        thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(payload),
                None => Ok(()),
            });
            let output = child.wait_with_output()?;
            match writer.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => {
                    tracing::debug!(subcommand, "external tool closed stdin early");
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => return Err(io::Error::other("stdin writer panicked")),
            }
            Ok(output)
        })
    }
}

fn failure_detail(output: &Output) -> Option<ErrorDetail> {
    serde_json::from_slice::<ErrorBody>(&output.stdout)
        .ok()
        .map(|body| body.error)
}

fn stderr_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("external tool exited with {}", output.status)
    } else {
        trimmed.to_string()
    }
}

impl Compiler for ProcessCompiler {
    type Artifact = ProcessArtifact;

    fn compile(&mut self, request: &CompileRequest<'_>) -> Result<ProcessArtifact, CompilationError> {
        let payload =
            serde_json::to_vec(request).map_err(|err| CompilationError::Protocol(err.to_string()))?;
        let output = self
            .invoke("compile", &payload)
            .map_err(CompilationError::Invocation)?;

        if !output.status.success() {
            return Err(match failure_detail(&output) {
                Some(detail) => match detail.kind.as_str() {
                    "configuration" => CompilationError::configuration(detail.message),
                    "unresolved_target" => CompilationError::UnresolvedTarget {
                        name: request.target_function.to_string(),
                    },
                    _ => CompilationError::rejected(detail.message),
                },
                None => CompilationError::rejected(stderr_text(&output)),
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|err| CompilationError::Protocol(err.to_string()))
    }

    fn run(
        &mut self,
        artifact: &ProcessArtifact,
        request: &RunRequest<'_>,
    ) -> Result<Timings, ExecutionError> {
        let envelope = RunEnvelope {
            artifact: &artifact.artifact,
            request,
        };
        let payload =
            serde_json::to_vec(&envelope).map_err(|err| ExecutionError::Protocol(err.to_string()))?;
        let output = self
            .invoke("run", &payload)
            .map_err(ExecutionError::Invocation)?;

        if !output.status.success() {
            return Err(match failure_detail(&output) {
                Some(detail) if detail.kind == "malformed_artifact" => {
                    ExecutionError::MalformedArtifact {
                        message: detail.message,
                    }
                }
                Some(detail) => ExecutionError::fault(detail.message),
                None => ExecutionError::fault(stderr_text(&output)),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|err| ExecutionError::Protocol(err.to_string()))
    }
}
