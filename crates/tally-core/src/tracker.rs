//! Append-only error tracking for a single workflow run.
//!
//! The [`ErrorTracker`] is the only piece of state shared between fan-out
//! sub-operations of a phase, so appends go through a mutex. Nothing is ever
//! removed: every recorded error shows up in [`ErrorTracker::summarize`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCategory, WorkflowError};

/// Tracing target for error tracking.
const TRACING_TARGET: &str = "tally_core::tracker";

/// Position of an error inside its tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorId(usize);

impl ErrorId {
    /// Returns the zero-based index of the error.
    pub fn index(self) -> usize {
        self.0
    }
}

/// An error together with the bookkeeping the tracker adds to it.
#[derive(Debug)]
pub struct RecordedError {
    /// Position inside the tracker.
    pub id: ErrorId,
    /// The recorded error.
    pub error: WorkflowError,
    /// Whether the error halted the run.
    pub fatal: bool,
    /// When the error was recorded.
    pub recorded_at: Timestamp,
}

/// Serializable copy of a recorded error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Position inside the tracker.
    pub id: ErrorId,
    /// Category of the error.
    pub category: ErrorCategory,
    /// Phase the error originated in.
    pub phase: String,
    /// Error message.
    pub message: String,
    /// Rendered cause chain, if the error had a source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Recovery suggestion.
    pub suggestion: String,
    /// Whether the error halted the run.
    pub fatal: bool,
}

impl From<&RecordedError> for ErrorEntry {
    fn from(recorded: &RecordedError) -> Self {
        let error = &recorded.error;
        Self {
            id: recorded.id,
            category: error.category,
            phase: error.phase_or_run().to_owned(),
            message: error.message.clone(),
            cause: error.source.as_ref().map(|source| source.to_string()),
            suggestion: error.suggestion().to_owned(),
            fatal: recorded.fatal,
        }
    }
}

/// Append-only multiset of [`WorkflowError`]s owned by one run.
///
/// Cloning the tracker yields another handle to the same storage, which is how
/// concurrent sub-operations of a phase append their individual failures.
#[derive(Debug, Clone, Default)]
pub struct ErrorTracker {
    inner: Arc<Mutex<Vec<RecordedError>>>,
}

impl ErrorTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedError>> {
        // Entries are only ever pushed, so a poisoned guard still holds a
        // consistent vector.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a non-fatal error.
    pub fn record(&self, error: WorkflowError) -> ErrorId {
        self.push(error, false)
    }

    /// Records an error that halted the run.
    pub fn record_fatal(&self, error: WorkflowError) -> ErrorId {
        self.push(error, true)
    }

    fn push(&self, error: WorkflowError, fatal: bool) -> ErrorId {
        tracing::debug!(
            target: TRACING_TARGET,
            category = %error.category,
            phase = error.phase_or_run(),
            fatal,
            message = %error.message,
            "Error recorded"
        );

        let mut entries = self.lock();
        let id = ErrorId(entries.len());
        entries.push(RecordedError {
            id,
            error,
            fatal,
            recorded_at: Timestamp::now(),
        });
        id
    }

    /// Returns the number of recorded errors.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether no error was recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns whether at least one fatal error was recorded.
    pub fn has_fatal(&self) -> bool {
        self.lock().iter().any(|recorded| recorded.fatal)
    }

    /// Returns the number of errors attributed to `phase`.
    pub fn count_for_phase(&self, phase: &str) -> usize {
        self.lock()
            .iter()
            .filter(|recorded| recorded.error.phase_or_run() == phase)
            .count()
    }

    /// Returns a serializable copy of every entry in recording order.
    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.lock().iter().map(ErrorEntry::from).collect()
    }

    /// Returns the entry with the given id.
    pub fn get(&self, id: ErrorId) -> Option<ErrorEntry> {
        self.lock().get(id.0).map(ErrorEntry::from)
    }

    /// Groups entries by category in order of first appearance.
    pub fn by_category(&self) -> Vec<(ErrorCategory, Vec<ErrorEntry>)> {
        let mut groups: Vec<(ErrorCategory, Vec<ErrorEntry>)> = Vec::new();
        for entry in self.entries() {
            match groups.iter_mut().find(|(category, _)| *category == entry.category) {
                Some((_, entries)) => entries.push(entry),
                None => groups.push((entry.category, vec![entry])),
            }
        }
        groups
    }

    /// Groups entries by phase in order of first appearance.
    pub fn by_phase(&self) -> Vec<(String, Vec<ErrorEntry>)> {
        let mut groups: Vec<(String, Vec<ErrorEntry>)> = Vec::new();
        for entry in self.entries() {
            match groups.iter_mut().find(|(phase, _)| *phase == entry.phase) {
                Some((_, entries)) => entries.push(entry),
                None => groups.push((entry.phase.clone(), vec![entry])),
            }
        }
        groups
    }

    /// Builds the end-of-run summary: grouped by phase, then by category.
    pub fn summarize(&self) -> ErrorSummary {
        let entries = self.entries();
        let total = entries.len();
        let fatal = entries.iter().filter(|entry| entry.fatal).count();

        let mut groups: Vec<PhaseErrorGroup> = Vec::new();
        for entry in entries {
            let group = match groups.iter().position(|group| group.phase == entry.phase) {
                Some(index) => &mut groups[index],
                None => {
                    groups.push(PhaseErrorGroup {
                        phase: entry.phase.clone(),
                        categories: Vec::new(),
                    });
                    let last = groups.len() - 1;
                    &mut groups[last]
                }
            };
            group.absorb(entry);
        }

        ErrorSummary {
            groups,
            total,
            fatal,
        }
    }
}

/// Errors of one phase, split by category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseErrorGroup {
    /// Phase name.
    pub phase: String,
    /// Category groups in order of first appearance.
    pub categories: Vec<CategoryErrorGroup>,
}

impl PhaseErrorGroup {
    fn absorb(&mut self, entry: ErrorEntry) {
        match self
            .categories
            .iter_mut()
            .find(|group| group.category == entry.category)
        {
            Some(group) => {
                group.count += 1;
                group.fatal |= entry.fatal;
                if !group.messages.contains(&entry.message) {
                    group.messages.push(entry.message);
                }
            }
            None => self.categories.push(CategoryErrorGroup {
                category: entry.category,
                count: 1,
                messages: vec![entry.message],
                suggestion: entry.suggestion,
                fatal: entry.fatal,
            }),
        }
    }

    /// Returns the total number of errors in this phase.
    pub fn count(&self) -> usize {
        self.categories.iter().map(|group| group.count).sum()
    }
}

/// Errors of one category inside one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryErrorGroup {
    /// Error category.
    pub category: ErrorCategory,
    /// Number of errors in the group.
    pub count: usize,
    /// Distinct messages in order of first appearance.
    pub messages: Vec<String>,
    /// Suggestion of the first error in the group.
    pub suggestion: String,
    /// Whether any error in the group was fatal.
    pub fatal: bool,
}

/// Grouped, de-duplicated view of every error recorded during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// Phase groups in order of first appearance.
    pub groups: Vec<PhaseErrorGroup>,
    /// Total number of recorded errors.
    pub total: usize,
    /// Number of fatal errors.
    pub fatal: usize,
}

impl ErrorSummary {
    /// Returns whether the run recorded no error at all.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Returns the group for the given phase.
    pub fn phase(&self, phase: &str) -> Option<&PhaseErrorGroup> {
        self.groups.iter().find(|group| group.phase == phase)
    }
}

impl fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "no errors recorded");
        }

        writeln!(f, "{} error(s), {} fatal", self.total, self.fatal)?;
        for group in &self.groups {
            writeln!(f, "{} ({}):", group.phase, group.count())?;
            for category in &group.categories {
                let marker = if category.fatal { " [fatal]" } else { "" };
                writeln!(
                    f,
                    "  {} x{}{marker}",
                    category.category.label(),
                    category.count
                )?;
                for message in &category.messages {
                    writeln!(f, "    - {message}")?;
                }
                writeln!(f, "    suggestion: {}", category.suggestion)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn record_returns_sequential_ids() {
        let tracker = ErrorTracker::new();
        let first = tracker.record(WorkflowError::build("a").with_phase("build"));
        let second = tracker.record_fatal(WorkflowError::build("b").with_phase("build"));

        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);
        assert_eq!(tracker.len(), 2);
        assert!(tracker.has_fatal());
        assert_eq!(tracker.get(second).map(|e| e.fatal), Some(true));
    }

    #[test]
    fn summary_groups_by_phase_then_category_in_first_seen_order() {
        let tracker = ErrorTracker::new();
        tracker.record(WorkflowError::deployment("admin failed").with_phase("deploy"));
        tracker.record(WorkflowError::quality_check("lint").with_phase("quality-checks"));
        tracker.record(WorkflowError::authentication("expired").with_phase("deploy"));
        tracker.record(WorkflowError::deployment("hours failed").with_phase("deploy"));
        tracker.record(WorkflowError::deployment("admin failed").with_phase("deploy"));

        let summary = tracker.summarize();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.fatal, 0);

        let phases: Vec<_> = summary.groups.iter().map(|g| g.phase.as_str()).collect();
        assert_eq!(phases, ["deploy", "quality-checks"]);

        let deploy = summary.phase("deploy").unwrap();
        assert_eq!(deploy.count(), 4);
        assert_eq!(deploy.categories[0].category, ErrorCategory::Deployment);
        assert_eq!(deploy.categories[0].count, 3);
        assert_eq!(deploy.categories[0].messages, ["admin failed", "hours failed"]);
        assert_eq!(deploy.categories[1].category, ErrorCategory::Authentication);
    }

    #[test]
    fn summary_keeps_first_suggestion_per_category() {
        let tracker = ErrorTracker::new();
        tracker.record(
            WorkflowError::deployment("quota")
                .with_phase("deploy")
                .with_suggestion("delete old channels"),
        );
        tracker.record(WorkflowError::deployment("timeout").with_phase("deploy"));

        let summary = tracker.summarize();
        let group = &summary.phase("deploy").unwrap().categories[0];
        assert_eq!(group.suggestion, "delete old channels");
    }

    #[test]
    fn unscoped_errors_land_in_run_group() {
        let tracker = ErrorTracker::new();
        tracker.record(WorkflowError::unknown("outside"));

        let summary = tracker.summarize();
        assert_eq!(summary.groups[0].phase, "run");
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let tracker = ErrorTracker::new();
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let tracker = tracker.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        tracker.record(
                            WorkflowError::deployment(format!("{n}-{i}")).with_phase("deploy"),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.len(), 200);
        let ids: Vec<_> = tracker.entries().iter().map(|e| e.id.index()).collect();
        assert_eq!(ids, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn display_lists_groups_and_suggestions() {
        let tracker = ErrorTracker::new();
        tracker.record_fatal(WorkflowError::build("exit 2").with_phase("build"));

        let text = tracker.summarize().to_string();
        assert!(text.contains("1 error(s), 1 fatal"));
        assert!(text.contains("build (1):"));
        assert!(text.contains("Build x1 [fatal]"));
        assert!(text.contains(ErrorCategory::Build.suggestion()));
    }

    #[test]
    fn by_category_and_by_phase_views() {
        let tracker = ErrorTracker::new();
        tracker.record(WorkflowError::build("a").with_phase("build"));
        tracker.record(WorkflowError::deployment("b").with_phase("deploy"));
        tracker.record(WorkflowError::build("c").with_phase("deploy"));

        let categories: Vec<_> = tracker
            .by_category()
            .into_iter()
            .map(|(category, entries)| (category, entries.len()))
            .collect();
        assert_eq!(
            categories,
            [(ErrorCategory::Build, 2), (ErrorCategory::Deployment, 1)]
        );

        let phases: Vec<_> = tracker
            .by_phase()
            .into_iter()
            .map(|(phase, entries)| (phase, entries.len()))
            .collect();
        assert_eq!(phases, [("build".to_owned(), 1), ("deploy".to_owned(), 2)]);
        assert_eq!(tracker.count_for_phase("deploy"), 2);
    }
}
