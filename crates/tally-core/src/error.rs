//! Structured error handling for workflow phases.

use std::any::Any;
use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with [`WorkflowError`].
pub type WorkflowResult<T, E = WorkflowError> = std::result::Result<T, E>;

/// Closed set of failure categories a phase can report.
///
/// Each category maps to a fixed recovery suggestion, see [`ErrorCategory::suggestion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[derive(AsRefStr, Display, EnumString, EnumIter, IntoStaticStr)]
#[derive(Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A required tool or package is missing.
    Dependency,
    /// The hosting CLI is not logged in or the token expired.
    Authentication,
    /// Lint, type-check, test or another quality gate failed.
    QualityCheck,
    /// The build tool exited with a failure.
    Build,
    /// A hosting operation (deploy, list, delete) failed.
    Deployment,
    /// Anything that escaped classification, including panics.
    #[default]
    Unknown,
}

impl ErrorCategory {
    /// Returns the fixed recovery suggestion for this category.
    #[must_use]
    pub const fn suggestion(self) -> &'static str {
        match self {
            Self::Dependency => {
                "Install missing packages (npm ci) and make sure the hosting CLI is on PATH"
            }
            Self::Authentication => {
                "Re-authenticate with the hosting CLI (firebase login) or refresh the CI token"
            }
            Self::QualityCheck => "Fix the reported lint, type or test failures and re-run the checks",
            Self::Build => "Inspect the build output, fix the compilation errors and rebuild",
            Self::Deployment => {
                "Check hosting quotas and the preview channel limit, then retry the deploy"
            }
            Self::Unknown => "Re-run with RUST_LOG=debug and inspect the full log output",
        }
    }

    /// Returns a short human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Dependency => "Dependency",
            Self::Authentication => "Authentication",
            Self::QualityCheck => "Quality check",
            Self::Build => "Build",
            Self::Deployment => "Deployment",
            Self::Unknown => "Unknown",
        }
    }
}

/// A failure raised by a phase or one of its sub-operations.
///
/// Errors are never mutated once recorded; the builder methods are meant to be
/// chained right where the error is created.
#[must_use]
#[derive(Debug, Error)]
#[error(
    "[{category}]{}: {message}",
    .phase.as_ref().map(|p| format!(" {p}")).unwrap_or_default()
)]
pub struct WorkflowError {
    /// The category of the failure.
    pub category: ErrorCategory,
    /// Primary error message.
    pub message: String,
    /// Name of the phase the error originated in.
    pub phase: Option<String>,
    /// Underlying cause, if any.
    #[source]
    pub source: Option<BoxedError>,
    /// Overrides the category's default suggestion.
    pub suggestion: Option<Cow<'static, str>>,
}

impl WorkflowError {
    /// Creates a new error with the given category and message.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            phase: None,
            source: None,
            suggestion: None,
        }
    }

    /// Creates a new dependency error.
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Dependency, message)
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Authentication, message)
    }

    /// Creates a new quality check error.
    pub fn quality_check(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::QualityCheck, message)
    }

    /// Creates a new build error.
    pub fn build(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Build, message)
    }

    /// Creates a new deployment error.
    pub fn deployment(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Deployment, message)
    }

    /// Creates a new unknown error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unknown, message)
    }

    /// Wraps a panic payload caught at a phase boundary.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());

        Self::unknown(format!("phase panicked: {detail}"))
    }

    /// Sets the originating phase.
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Sets the originating phase only if none was set yet.
    pub fn or_phase(mut self, phase: &str) -> Self {
        if self.phase.is_none() {
            self.phase = Some(phase.to_owned());
        }
        self
    }

    /// Sets the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Overrides the recovery suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<Cow<'static, str>>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Returns the recovery suggestion, falling back to the category template.
    #[must_use]
    pub fn suggestion(&self) -> &str {
        self.suggestion
            .as_deref()
            .unwrap_or_else(|| self.category.suggestion())
    }

    /// Returns the phase name or `"run"` for errors raised outside any phase.
    #[must_use]
    pub fn phase_or_run(&self) -> &str {
        self.phase.as_deref().unwrap_or(crate::RUN_SCOPE)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_category_has_a_suggestion() {
        for category in ErrorCategory::iter() {
            assert!(!category.suggestion().is_empty(), "{category} has no suggestion");
        }
    }

    #[test]
    fn category_round_trips_through_str() {
        assert_eq!(
            ErrorCategory::from_str("quality_check").unwrap(),
            ErrorCategory::QualityCheck
        );
        assert_eq!(ErrorCategory::Authentication.to_string(), "authentication");
        assert!(ErrorCategory::from_str("network").is_err());
    }

    #[test]
    fn display_includes_phase_and_category() {
        let error = WorkflowError::build("vite exited with 1").with_phase("build");
        assert_eq!(error.to_string(), "[build] build: vite exited with 1");

        let unscoped = WorkflowError::unknown("boom");
        assert_eq!(unscoped.to_string(), "[unknown]: boom");
        assert_eq!(unscoped.phase_or_run(), "run");
    }

    #[test]
    fn suggestion_override_wins() {
        let error = WorkflowError::authentication("token expired");
        assert_eq!(error.suggestion(), ErrorCategory::Authentication.suggestion());

        let error = error.with_suggestion("set FIREBASE_TOKEN");
        assert_eq!(error.suggestion(), "set FIREBASE_TOKEN");
    }

    #[test]
    fn or_phase_keeps_existing_phase() {
        let error = WorkflowError::deployment("quota").with_phase("deploy");
        assert_eq!(error.or_phase("cleanup").phase.as_deref(), Some("deploy"));
    }

    #[test]
    fn panic_payloads_become_unknown() {
        let error = WorkflowError::from_panic(Box::new("index out of bounds"));
        assert_eq!(error.category, ErrorCategory::Unknown);
        assert!(error.message.contains("index out of bounds"));

        let error = WorkflowError::from_panic(Box::new(String::from("owned")));
        assert!(error.message.contains("owned"));

        let error = WorkflowError::from_panic(Box::new(42_u8));
        assert!(error.message.contains("non-string"));
    }
}
