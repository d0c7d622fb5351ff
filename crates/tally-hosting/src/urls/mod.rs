//! Preview URL extraction from deployment output.
//!
//! Deployment tools print their URLs in formats that drift between versions.
//! The extractor strips terminal escapes, runs an ordered chain of
//! [`PatternFamily`] matchers where the first family with a hit wins, and
//! assigns the resulting URLs to site slots.

mod assign;
mod pattern;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use url::Url;

pub use self::assign::{Assignment, assign_urls};
pub use self::pattern::{
    FamilyMatch, MatchHandler, PatternFamily, default_families, first_match, strip_ansi,
};
use crate::error::{HostingError, HostingResult};

/// Tracing target for URL extraction.
pub const TRACING_TARGET: &str = "tally_hosting::urls";

/// Preview URLs found in deployment output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedUrls {
    /// Site name to preview URL.
    pub sites: BTreeMap<String, Url>,
    /// URLs that could not be placed into a site slot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overflow: Vec<Url>,
    /// Name of the pattern family that matched.
    pub pattern: String,
    /// Where the text came from, when it was read from a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ExtractedUrls {
    /// Returns the URL of a site.
    pub fn get(&self, site: &str) -> Option<&Url> {
        self.sites.get(site)
    }

    /// Returns the number of URLs, including overflow.
    pub fn len(&self) -> usize {
        self.sites.len() + self.overflow.len()
    }

    /// Returns whether no URL was found. Never true for extractor results.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses `text` without caching.
pub fn parse_urls(
    text: &str,
    sites: &[String],
    families: &[PatternFamily],
) -> Option<ExtractedUrls> {
    let text = strip_ansi(text);
    let matched = first_match(families, &text)?;
    let Assignment { sites, overflow } = assign_urls(&matched.urls, sites);

    Some(ExtractedUrls {
        sites,
        overflow,
        pattern: matched.family.name().to_owned(),
        source: None,
    })
}

/// Memoizing URL extractor for one run.
///
/// The first successful extraction is kept; later calls return it without
/// parsing again.
#[derive(Debug, Clone)]
pub struct UrlExtractor {
    sites: Vec<String>,
    families: Vec<PatternFamily>,
    cached: Option<ExtractedUrls>,
}

impl UrlExtractor {
    /// Creates an extractor for the given site slots using the default families.
    pub fn new<I, S>(sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sites: sites.into_iter().map(Into::into).collect(),
            families: default_families(),
            cached: None,
        }
    }

    /// Replaces the pattern families.
    pub fn with_families(mut self, families: Vec<PatternFamily>) -> Self {
        self.families = families;
        self.cached = None;
        self
    }

    /// Seeds the cache, e.g. with a result loaded from disk.
    pub fn with_cached(mut self, urls: ExtractedUrls) -> Self {
        self.cached = Some(urls);
        self
    }

    /// Returns the configured site slots.
    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    /// Returns the memoized result.
    pub fn cached(&self) -> Option<&ExtractedUrls> {
        self.cached.as_ref()
    }

    /// Extracts URLs from one or more text blobs, treated as one document.
    pub fn extract<'a, I>(&mut self, blobs: I) -> Option<ExtractedUrls>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if let Some(cached) = &self.cached {
            return Some(cached.clone());
        }

        let text = blobs.into_iter().collect::<Vec<_>>().join("\n");
        let extracted = parse_urls(&text, &self.sites, &self.families);
        self.remember(extracted)
    }

    /// Extracts URLs from candidate log files, most recently modified first.
    ///
    /// Files that cannot be read are skipped; the first file with any match
    /// wins.
    pub async fn extract_from_files(&mut self, paths: &[PathBuf]) -> Option<ExtractedUrls> {
        if let Some(cached) = &self.cached {
            return Some(cached.clone());
        }

        for path in newest_first(paths).await {
            let text = match tokio::fs::read(&path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(error) => {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        path = %path.display(),
                        error = %error,
                        "Skipping unreadable log file"
                    );
                    continue;
                }
            };

            if let Some(mut extracted) = parse_urls(&text, &self.sites, &self.families) {
                extracted.source = Some(path.display().to_string());
                return self.remember(Some(extracted));
            }
        }

        tracing::debug!(
            target: TRACING_TARGET,
            candidates = paths.len(),
            "No preview URLs found in log files"
        );
        None
    }

    fn remember(&mut self, extracted: Option<ExtractedUrls>) -> Option<ExtractedUrls> {
        if let Some(extracted) = &extracted {
            tracing::info!(
                target: TRACING_TARGET,
                pattern = %extracted.pattern,
                sites = extracted.sites.len(),
                overflow = extracted.overflow.len(),
                "Extracted preview URLs"
            );
            self.cached = Some(extracted.clone());
        }
        extracted
    }

    /// Writes the memoized result as JSON, creating parent directories.
    ///
    /// Does nothing when nothing was extracted.
    pub async fn persist(&self, path: &Path) -> HostingResult<()> {
        let Some(cached) = &self.cached else {
            return Ok(());
        };

        let io_error = |source: std::io::Error| HostingError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let json = serde_json::to_vec_pretty(cached).map_err(|source| HostingError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        tokio::fs::write(path, json).await.map_err(io_error)
    }

    /// Reads a result written by [`UrlExtractor::persist`].
    ///
    /// A missing file is not an error.
    pub async fn load(path: &Path) -> HostingResult<Option<ExtractedUrls>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(HostingError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| HostingError::Json {
                path: path.to_path_buf(),
                source,
            })
    }
}

async fn newest_first(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut dated = Vec::with_capacity(paths.len());
    for path in paths {
        let modified = tokio::fs::metadata(path)
            .await
            .and_then(|metadata| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        dated.push((modified, path.clone()));
    }
    dated.sort_by(|a, b| b.0.cmp(&a.0));
    dated.into_iter().map(|(_, path)| path).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const DEPLOY_OUTPUT: &str = "\
i  hosting[admin-x]: finalizing version...
✔  Deploy complete!
  - https://admin-x--ch1.example.web.app
  - https://hours-x--ch1.example.web.app
";

    #[test]
    fn admin_and_hours_are_assigned_by_substring() {
        let mut extractor = UrlExtractor::new(["admin", "hours"]);
        let urls = extractor.extract([DEPLOY_OUTPUT]).unwrap();

        assert_eq!(urls.pattern, "dash_prefixed");
        assert_eq!(
            urls.get("admin").map(Url::as_str),
            Some("https://admin-x--ch1.example.web.app/")
        );
        assert_eq!(
            urls.get("hours").map(Url::as_str),
            Some("https://hours-x--ch1.example.web.app/")
        );
    }

    #[test]
    fn no_match_returns_none() {
        let mut extractor = UrlExtractor::new(["admin", "hours"]);
        assert!(extractor.extract(["Error: HTTP 403", ""]).is_none());
        assert!(extractor.cached().is_none());
    }

    #[test]
    fn results_are_memoized() {
        let mut extractor = UrlExtractor::new(["admin"]);
        let first = extractor.extract([DEPLOY_OUTPUT]).unwrap();
        let second = extractor
            .extract(["- https://admin-y--other.web.app"])
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn newest_log_file_is_tried_first() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.log");
        let new = dir.path().join("new.log");
        let missing = dir.path().join("missing.log");

        tokio::fs::write(&old, "Channel URL (admin): https://admin-x--old.web.app")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::fs::write(&new, "Channel URL (admin): https://admin-x--new.web.app")
            .await
            .unwrap();

        let mut extractor = UrlExtractor::new(["admin"]);
        let urls = extractor
            .extract_from_files(&[missing, old, new.clone()])
            .await
            .unwrap();

        assert_eq!(
            urls.get("admin").map(Url::as_str),
            Some("https://admin-x--new.web.app/")
        );
        assert_eq!(urls.source, Some(new.display().to_string()));
    }

    #[tokio::test]
    async fn persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("urls.json");

        let mut extractor = UrlExtractor::new(["admin", "hours"]);
        extractor.extract([DEPLOY_OUTPUT]).unwrap();
        extractor.persist(&path).await.unwrap();

        let loaded = UrlExtractor::load(&path).await.unwrap();
        assert_eq!(loaded.as_ref(), extractor.cached());
        assert!(UrlExtractor::load(&dir.path().join("absent.json")).await.unwrap().is_none());
    }
}
