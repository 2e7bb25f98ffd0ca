//! External-process seam. Every engine invocation goes through
//! [`ProcessRunner`] so tests can drive the pipeline with scripted stubs.

use crate::domain::{MdError, MdResult};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// One fully described external invocation: program, arguments, working
/// directory, per-invocation environment and optional piped stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Single-line rendering for logs and diagnostics.
    pub fn render(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured result of one invocation; stdout and stderr are merged into a
/// single diagnostic text in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub combined: String,
}

impl CommandOutput {
    pub fn ok(combined: impl Into<String>) -> Self {
        Self {
            success: true,
            combined: combined.into(),
        }
    }

    pub fn failed(combined: impl Into<String>) -> Self {
        Self {
            success: false,
            combined: combined.into(),
        }
    }
}

pub trait ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> MdResult<CommandOutput>;
}

/// Production runner over [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> MdResult<CommandOutput> {
        tracing::debug!(command = %spec.render(), "spawning external process");
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| {
            MdError::io_system(
                "IO.PROCESS_SPAWN",
                format!("failed to spawn '{}': {}", spec.render(), source),
            )
        })?;

        if let Some(input) = &spec.stdin {
            if let Some(mut handle) = child.stdin.take() {
                handle.write_all(input.as_bytes()).map_err(|source| {
                    MdError::io_system(
                        "IO.PROCESS_STDIN",
                        format!("failed to feed stdin to '{}': {}", spec.program, source),
                    )
                })?;
            }
        }

        let output = child.wait_with_output().map_err(|source| {
            MdError::io_system(
                "IO.PROCESS_WAIT",
                format!("failed to collect output of '{}': {}", spec.program, source),
            )
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        Ok(CommandOutput {
            success: output.status.success(),
            combined,
        })
    }
}
