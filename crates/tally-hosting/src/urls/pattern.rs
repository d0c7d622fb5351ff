//! Pattern families recognised in deployment output.
//!
//! Families are tried in order and the first one that yields at least one
//! valid URL wins; later families are not consulted. Supporting a new log
//! format means adding a family, not another branch in the extractor.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// Pulls the URL candidate out of one regex match.
pub type MatchHandler = for<'h> fn(&Captures<'h>) -> Option<&'h str>;

/// Characters that are never part of a URL when they end a match.
const TRAILING_PUNCTUATION: &[char] = &[',', '.', ';', ':', ')', ']', '}', '>', '\'', '"', '`'];

static ANSI_ESCAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").ok());

static DEFAULT_FAMILIES: LazyLock<Vec<PatternFamily>> = LazyLock::new(|| {
    [
        (
            "dash_prefixed",
            r"(?m)^[ \t]*-[ \t]+(?P<url>https?://\S+)",
        ),
        (
            "labeled",
            r"(?i)\b(?:channel|hosting|live)[ \t]+url(?:[ \t]*\([^)\n]*\))?[ \t]*:[ \t]*(?P<url>https?://\S+)",
        ),
        (
            "bare_hosting_domain",
            r"(?i)(?P<url>https?://[a-z0-9][a-z0-9.-]*\.(?:web\.app|firebaseapp\.com)(?:[/?#]\S*)?)",
        ),
    ]
    .into_iter()
    .filter_map(|(name, pattern)| PatternFamily::new(name, pattern, url_group).ok())
    .collect()
});

fn url_group<'h>(captures: &Captures<'h>) -> Option<&'h str> {
    captures.name("url").map(|m| m.as_str())
}

/// A named regex plus the handler that turns its matches into URL candidates.
#[derive(Debug, Clone)]
pub struct PatternFamily {
    name: &'static str,
    regex: Regex,
    handler: MatchHandler,
}

impl PatternFamily {
    /// Compiles a family from a pattern and a match handler.
    pub fn new(
        name: &'static str,
        pattern: &str,
        handler: MatchHandler,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            regex: Regex::new(pattern)?,
            handler,
        })
    }

    /// Compiles a family whose URL is the `url` named group.
    pub fn with_url_group(name: &'static str, pattern: &str) -> Result<Self, regex::Error> {
        Self::new(name, pattern, url_group)
    }

    /// Returns the family name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns every valid, distinct URL this family finds, in order of appearance.
    pub fn find_all(&self, text: &str) -> Vec<Url> {
        let mut urls: Vec<Url> = Vec::new();
        for captures in self.regex.captures_iter(text) {
            let Some(url) = (self.handler)(&captures).and_then(clean_candidate) else {
                continue;
            };
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }
}

/// Returns the built-in families: dash-prefixed lines, labeled lines, bare
/// hosting-domain tokens.
pub fn default_families() -> Vec<PatternFamily> {
    DEFAULT_FAMILIES.clone()
}

/// The family that matched and what it found.
#[derive(Debug, Clone)]
pub struct FamilyMatch<'a> {
    /// The winning family.
    pub family: &'a PatternFamily,
    /// URLs found by that family, never empty.
    pub urls: Vec<Url>,
}

/// Returns the first family that finds at least one URL in `text`.
pub fn first_match<'a>(families: &'a [PatternFamily], text: &str) -> Option<FamilyMatch<'a>> {
    families.iter().find_map(|family| {
        let urls = family.find_all(text);
        (!urls.is_empty()).then_some(FamilyMatch { family, urls })
    })
}

/// Removes terminal colour and cursor escape sequences.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    match ANSI_ESCAPE.as_ref() {
        Some(regex) => regex.replace_all(text, ""),
        None => Cow::Borrowed(text),
    }
}

fn clean_candidate(raw: &str) -> Option<Url> {
    let trimmed = raw.trim_end_matches(TRAILING_PUNCTUATION);
    let url = Url::parse(trimmed).ok()?;
    let web = matches!(url.scheme(), "http" | "https");
    (web && url.host_str().is_some_and(|host| !host.is_empty())).then_some(url)
}
