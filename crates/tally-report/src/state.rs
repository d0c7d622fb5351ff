//! Presence of a report.

use serde::{Deserialize, Serialize};

/// A report slot: the payload, or why there is none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum ReportState<T> {
    /// The report was loaded.
    Available(T),
    /// The checker produced no artifact.
    #[default]
    Missing,
    /// The artifact exists but could not be read or parsed.
    Unreadable(String),
}

impl<T> ReportState<T> {
    /// Returns whether a payload is present.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Returns the payload, if present.
    pub fn available(&self) -> Option<&T> {
        match self {
            Self::Available(report) => Some(report),
            Self::Missing | Self::Unreadable(_) => None,
        }
    }

    /// Applies `f` to the payload, or returns the default when there is none.
    pub fn map_or_default<U, F>(&self, f: F) -> U
    where
        U: Default,
        F: FnOnce(&T) -> U,
    {
        self.available().map(f).unwrap_or_default()
    }

    /// Returns why no payload is present.
    pub fn unavailable_reason(&self) -> Option<String> {
        match self {
            Self::Available(_) => None,
            Self::Missing => Some("no report produced".to_owned()),
            Self::Unreadable(reason) => Some(reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_reports_degrade_to_defaults() {
        let missing: ReportState<Vec<u32>> = ReportState::Missing;
        assert_eq!(missing.map_or_default(|v| v.len()), 0);
        assert_eq!(missing.unavailable_reason().as_deref(), Some("no report produced"));

        let unreadable: ReportState<Vec<u32>> = ReportState::Unreadable("bad json".into());
        assert_eq!(unreadable.unavailable_reason().as_deref(), Some("bad json"));

        let available = ReportState::Available(vec![1, 2]);
        assert_eq!(available.map_or_default(|v| v.len()), 2);
        assert!(available.unavailable_reason().is_none());
    }
}
