//! Scripted [`CommandRunner`] for tests.

use std::sync::{Mutex, PoisonError};

use crate::process::{CommandOutput, CommandRunner, CommandSpec, ProcessError};

/// What a scripted rule answers with.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// The command ran and produced this output.
    Output(CommandOutput),
    /// The program could not be started.
    SpawnFailure,
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: ScriptedReply,
}

/// Answers commands by substring match on their rendered command line.
///
/// Rules are checked in insertion order; the first rule whose needle occurs in
/// the rendered command wins. Unmatched commands succeed with empty output.
/// Every invocation is recorded.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    /// Creates a runner where every command succeeds silently.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers commands containing `needle` with `output`.
    pub fn on(mut self, needle: impl Into<String>, output: CommandOutput) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: ScriptedReply::Output(output),
        });
        self
    }

    /// Fails to start commands containing `needle`.
    pub fn missing(mut self, needle: impl Into<String>) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: ScriptedReply::SpawnFailure,
        });
        self
    }

    /// Returns every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the rendered command lines run so far.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }
}

#[async_trait::async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(spec.clone());

        let line = spec.to_string();
        let reply = self
            .rules
            .iter()
            .find(|rule| line.contains(&rule.needle))
            .map(|rule| rule.reply.clone());

        match reply {
            Some(ScriptedReply::Output(output)) => Ok(output),
            Some(ScriptedReply::SpawnFailure) => Err(ProcessError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
            None => Ok(CommandOutput::success("")),
        }
    }
}
