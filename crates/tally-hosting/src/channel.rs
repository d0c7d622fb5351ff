//! Preview channels and their identifiers.

use std::collections::BTreeMap;

use derive_more::{AsRef, Deref, Display, From};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use url::Url;

/// Maximum length of a channel identifier accepted by the hosting backend.
pub const MAX_CHANNEL_ID_LEN: usize = 36;

/// Identifier used when a branch name sanitizes to nothing.
const FALLBACK_BRANCH: &str = "preview";

/// Layout of the timestamp suffix, 14 characters.
const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Opaque identifier of a preview channel, unique per site.
///
/// Identifiers read back from the hosting backend are never parsed; only
/// [`ChannelId::for_branch`] imposes a grammar, and only on identifiers this
/// tool creates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, AsRef, Deref, From)]
#[derive(Serialize, Deserialize)]
#[as_ref(forward)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Wraps an existing identifier as-is.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives a subdomain-safe identifier from a branch name and a creation time.
    ///
    /// The result is `<branch>-<yyyymmddhhmmss>` (UTC), made of lowercase ASCII
    /// alphanumerics and single dashes, and never longer than
    /// [`MAX_CHANNEL_ID_LEN`].
    pub fn for_branch(branch: &str, created_at: Timestamp) -> Self {
        let stamp = created_at.strftime(STAMP_FORMAT).to_string();
        let budget = MAX_CHANNEL_ID_LEN.saturating_sub(stamp.len() + 1);

        let mut slug = sanitize(branch);
        slug.truncate(budget);
        let slug = slug.trim_end_matches('-');
        let slug = if slug.is_empty() { FALLBACK_BRANCH } else { slug };

        Self(format!("{slug}-{stamp}"))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Lowercases and collapses every run of non-alphanumerics into one dash.
fn sanitize(branch: &str) -> String {
    let mut slug = String::with_capacity(branch.len());
    for c in branch.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_owned()
}

/// An ephemeral hosting environment for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewChannel {
    /// Channel identifier.
    pub id: ChannelId,
    /// Logical hosting target, e.g. `admin` or `hours`.
    pub site: String,
    /// When the channel was created.
    pub created_at: Timestamp,
    /// When the backend will delete the channel on its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    /// Site name to preview URL, once known.
    #[serde(default)]
    pub urls: BTreeMap<String, Url>,
}

impl PreviewChannel {
    /// Creates a channel without known URLs.
    pub fn new(id: impl Into<ChannelId>, site: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            site: site.into(),
            created_at,
            expires_at: None,
            urls: BTreeMap::new(),
        }
    }

    /// Sets the expiry time.
    pub fn with_expires_at(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Adds the URL of the channel's site.
    pub fn with_url(mut self, url: Url) -> Self {
        self.urls.insert(self.site.clone(), url);
        self
    }

    /// Returns the URL of the channel's own site.
    pub fn url(&self) -> Option<&Url> {
        self.urls.get(&self.site)
    }
}
