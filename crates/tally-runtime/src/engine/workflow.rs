//! An ordered list of phases plus the finalizer that closes the run.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::TRACING_TARGET;
use super::phase::{PhaseDefinition, RunFinalizer};

/// Reason recorded on phases skipped by configuration.
pub const SKIPPED_BY_CONFIGURATION: &str = "skipped by configuration";

/// Phases to run in order, which of them to skip, and the finalizer.
pub struct Workflow<S> {
    phases: Vec<PhaseDefinition<S>>,
    skip: BTreeSet<String>,
    finalizer: Option<Arc<dyn RunFinalizer<S>>>,
}

impl<S> std::fmt::Debug for Workflow<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("phases", &self.phases)
            .field("skip", &self.skip)
            .field("finalizer", &self.finalizer.as_ref().map(|f| f.name().to_owned()))
            .finish()
    }
}

impl<S> Default for Workflow<S> {
    fn default() -> Self {
        Self {
            phases: Vec::new(),
            skip: BTreeSet::new(),
            finalizer: None,
        }
    }
}

impl<S: Send> Workflow<S> {
    /// Creates an empty workflow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a phase.
    pub fn phase(mut self, phase: PhaseDefinition<S>) -> Self {
        self.phases.push(phase);
        self
    }

    /// Requests that the named phase is not run.
    pub fn skip(mut self, name: impl Into<String>) -> Self {
        self.skip.insert(name.into());
        self
    }

    /// Requests that each of the named phases is not run.
    pub fn skip_all<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.skip.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets the finalizer.
    pub fn finalizer(mut self, finalizer: impl RunFinalizer<S> + 'static) -> Self {
        self.finalizer = Some(Arc::new(finalizer));
        self
    }

    /// Returns the phases in execution order.
    pub fn phases(&self) -> &[PhaseDefinition<S>] {
        &self.phases
    }

    /// Returns the finalizer.
    pub fn finalizer_ref(&self) -> Option<&dyn RunFinalizer<S>> {
        self.finalizer.as_deref()
    }

    /// Resolves skip requests against the phases.
    ///
    /// Requests for non-skippable or unknown phases are ignored with a warning.
    pub fn pre_skipped(&self) -> Vec<bool> {
        for name in &self.skip {
            if !self.phases.iter().any(|phase| phase.name() == name) {
                tracing::warn!(target: TRACING_TARGET, phase = %name, "Ignoring skip request for unknown phase");
            }
        }

        self.phases
            .iter()
            .map(|phase| {
                let requested = self.skip.contains(phase.name());
                if requested && !phase.is_skippable() {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        phase = phase.name(),
                        "Ignoring skip request for a phase that cannot be skipped"
                    );
                }
                requested && phase.is_skippable()
            })
            .collect()
    }
}
