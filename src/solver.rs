//! The solver adapter (spec.md §4.8): a black-box oracle behind
//! [`SolverBackend`], isolating the engine from how hybrid probabilistic
//! logic is actually evaluated.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;
use tracing::{error, instrument};

use crate::config::SolverSettings;

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("failed to spawn solver process '{command}': {source}")]
    Spawn { command: String, #[source] source: std::io::Error },
    #[error("failed to communicate with solver process: {0}")]
    Io(#[from] std::io::Error),
    #[error("solver exited with status {status}: {stderr}\nprogram excerpt: {excerpt}")]
    Process { status: String, stderr: String, excerpt: String },
    #[error("solver produced an unparseable probability '{line}' on output line {index}")]
    Parse { index: usize, line: String },
}

fn excerpt(program: &str) -> String {
    program.chars().take(EXCERPT_CHARS).collect()
}

/// A hybrid probabilistic-logic inference backend: feed it a program, get
/// back one probability per `query(...)` atom, in program order. The core
/// never implements inference itself (spec.md §1 Non-goals) — this trait
/// is the seam a real solver plugs into.
pub trait SolverBackend: Send + Sync {
    fn inference(&self, program: &str) -> Result<Vec<f64>, SolverError>;
}

/// Invokes a configured external command, feeding `program` on stdin and
/// reading one probability per line from stdout — the default, and only
/// concrete, `SolverBackend` this crate ships (spec.md §6).
pub struct ExternalProcessSolver {
    settings: SolverSettings,
}

impl ExternalProcessSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }
}

impl SolverBackend for ExternalProcessSolver {
    #[instrument(skip(self, program), fields(command = %self.settings.command))]
    fn inference(&self, program: &str) -> Result<Vec<f64>, SolverError> {
        let mut child = Command::new(&self.settings.command)
            .arg("--n-samples")
            .arg(self.settings.n_samples.to_string())
            .arg("--dtype")
            .arg(&self.settings.dtype)
            .arg("--device")
            .arg(&self.settings.device)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SolverError::Spawn { command: self.settings.command.clone(), source })?;

        // Write stdin from a separate thread, concurrently with reading
        // stdout/stderr below: the program can be large enough that the
        // solver starts emitting output before it has finished reading it,
        // and writing the whole thing first would deadlock against a full
        // stdout pipe nobody is draining yet.
        let mut stdin = child.stdin.take().expect("stdin was piped");
        let program_bytes = program.as_bytes().to_vec();
        let writer = thread::spawn(move || stdin.write_all(&program_bytes));

        let output = child.wait_with_output()?;
        writer.join().expect("solver stdin writer thread panicked")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!(status = %output.status, %stderr, "solver process failed");
            return Err(SolverError::Process {
                status: output.status.to_string(),
                stderr,
                excerpt: excerpt(program),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(index, line)| {
                line.trim().parse::<f64>().map_err(|_| SolverError::Parse {
                    index,
                    line: line.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_truncates_long_programs() {
        let program = "a".repeat(1000);
        assert_eq!(excerpt(&program).len(), EXCERPT_CHARS);
    }

    #[test]
    fn unreachable_command_surfaces_spawn_error() {
        let solver = ExternalProcessSolver::new(SolverSettings {
            command: "/no/such/promis-solver-binary".to_string(),
            ..SolverSettings::default()
        });

        let result = solver.inference("query(landscape(x_0)).\n");
        assert!(matches!(result, Err(SolverError::Spawn { .. })));
    }
}
