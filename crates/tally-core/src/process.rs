//! Blocking-from-the-engine's-view invocation of external tools.
//!
//! Build, deploy, list and delete operations all go through a
//! [`CommandRunner`]; the engine only ever looks at the exit code and the raw
//! text the tool printed.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;

/// Tracing target for process invocation.
const TRACING_TARGET: &str = "tally_core::process";

/// Errors raised before a tool produced an exit code.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started (usually: not installed).
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        #[source]
        source: io::Error,
    },

    /// The program ran longer than its timeout and was killed.
    #[error("`{program}` timed out after {}ms", .timeout.as_millis())]
    TimedOut {
        /// Program that timed out.
        program: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

impl ProcessError {
    /// Returns whether the program could not be found or started.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }
}

/// An external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a command spec does nothing until it is run"]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
    /// Working directory, defaults to the current one.
    pub current_dir: Option<PathBuf>,
    /// Kill the program if it runs longer than this.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Creates a command for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
            timeout: None,
        }
    }

    /// Creates a command that runs `line` through `sh -c`.
    pub fn shell(line: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(line)
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the timeout when one is given.
    pub fn maybe_timeout(mut self, timeout: Option<Duration>) -> Self {
        if timeout.is_some() {
            self.timeout = timeout;
        }
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// What an external command produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock time the command took.
    pub duration: Duration,
}

impl CommandOutput {
    /// Creates a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Creates a failed output with the given exit code and stderr.
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// Returns whether the command exited with code zero.
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// Returns the last `lines` non-empty lines of the combined output.
    pub fn tail(&self, lines: usize) -> String {
        let combined = self.combined();
        let kept: Vec<&str> = combined
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();
        let start = kept.len().saturating_sub(lines);
        kept[start..].join("\n")
    }

    /// Describes a failed exit for error messages.
    pub fn describe_failure(&self, spec: &CommandSpec) -> String {
        let status = self
            .exit_code
            .map_or_else(|| "was terminated by a signal".to_owned(), |code| {
                format!("exited with code {code}")
            });
        let tail = self.tail(5);
        if tail.is_empty() {
            format!("`{spec}` {status}")
        } else {
            format!("`{spec}` {status}:\n{tail}")
        }
    }
}

/// Runs external commands.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion and captures its output.
    ///
    /// A non-zero exit code is not an error at this level.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError>;
}

#[async_trait::async_trait]
impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        (**self).run(spec).await
    }
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    default_timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Creates a runner without a default timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `timeout` to commands that do not set their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }
}

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        tracing::debug!(target: TRACING_TARGET, command = %spec, "Running command");

        let started = Instant::now();
        let output = command.output();
        let output = match spec.timeout.or(self.default_timeout) {
            Some(timeout) => tokio::time::timeout(timeout, output).await.map_err(|_| {
                ProcessError::TimedOut {
                    program: spec.program.clone(),
                    timeout,
                }
            })?,
            None => output.await,
        }
        .map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        };

        tracing::debug!(
            target: TRACING_TARGET,
            command = %spec,
            exit_code = ?result.exit_code,
            duration_ms = result.duration.as_millis(),
            "Command finished"
        );

        Ok(result)
    }
}
