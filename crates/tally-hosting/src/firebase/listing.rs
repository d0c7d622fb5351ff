//! Parsing of `hosting:channel:list --json` output.

use jiff::Timestamp;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::TRACING_TARGET;
use crate::channel::{ChannelId, PreviewChannel};
use crate::error::{HostingError, HostingResult};

/// Channel that always exists and serves production traffic.
const LIVE_CHANNEL: &str = "live";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChannel {
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    create_time: Option<String>,
    #[serde(default)]
    expire_time: Option<String>,
}

/// Parses the channel listing of one site.
///
/// Anything printed before the JSON document (update notices, warnings) is
/// ignored. Entries that cannot be understood are skipped with a warning; only
/// a listing that is not JSON at all is an error.
pub(super) fn parse_channel_list(site: &str, stdout: &str) -> HostingResult<Vec<PreviewChannel>> {
    let start = stdout.find('{').unwrap_or(0);
    let document: Value =
        serde_json::from_str(&stdout[start..]).map_err(|source| HostingError::InvalidOutput {
            operation: "list channels",
            source,
        })?;

    let entries = match &document["result"] {
        Value::Array(entries) => entries.as_slice(),
        result => result["channels"].as_array().map_or(&[][..], Vec::as_slice),
    };

    let mut channels = Vec::with_capacity(entries.len());
    for entry in entries {
        let raw = match RawChannel::deserialize(entry) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    site,
                    error = %error,
                    "Skipping malformed channel entry"
                );
                continue;
            }
        };

        if let Some(channel) = convert(site, raw) {
            channels.push(channel);
        }
    }

    Ok(channels)
}

fn convert(site: &str, raw: RawChannel) -> Option<PreviewChannel> {
    let id = raw.name.rsplit('/').next().unwrap_or(&raw.name);
    if id == LIVE_CHANNEL || id.is_empty() {
        return None;
    }

    let created_at = match raw.create_time.as_deref().map(str::parse::<Timestamp>) {
        Some(Ok(created_at)) => created_at,
        other => {
            tracing::warn!(
                target: TRACING_TARGET,
                site,
                channel = id,
                create_time = ?raw.create_time,
                error = ?other.and_then(Result::err).map(|e| e.to_string()),
                "Skipping channel without a usable creation time"
            );
            return None;
        }
    };

    let mut channel = PreviewChannel::new(ChannelId::new(id), site, created_at);
    if let Some(expires_at) = raw
        .expire_time
        .as_deref()
        .and_then(|value| value.parse::<Timestamp>().ok())
    {
        channel = channel.with_expires_at(expires_at);
    }
    if let Some(url) = raw.url.as_deref().and_then(|value| Url::parse(value).ok()) {
        channel = channel.with_url(url);
    }

    Some(channel)
}
