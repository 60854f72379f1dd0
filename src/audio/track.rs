use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque catalog identifier - whatever the storefront API hands out
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for TrackId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Everything `play_track` needs: identity, resolved URL and display label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRequest {
    pub id: TrackId,
    pub url: String,
    pub title: String,
}

/// The slice of a catalog beat the player cares about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogBeat {
    pub id: TrackId,
    pub title: String,
    pub demo_url: Option<String>,
}

impl TrackRequest {
    pub fn new(id: impl Into<TrackId>, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: title.into(),
        }
    }

    /// Resolve a beat's demo path against the API base URL.
    /// Beats without a demo can't be previewed.
    pub fn from_beat(beat: &CatalogBeat, api_base: &str) -> Option<Self> {
        let demo = beat.demo_url.as_deref()?.trim();
        if demo.is_empty() {
            return None;
        }

        Some(Self {
            id: beat.id.clone(),
            url: resolve_url(api_base, demo),
            title: beat.title.clone(),
        })
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled beat"
        } else {
            &self.title
        }
    }
}

/// Demo paths come back from the API as `/static/demos/x.mp3`; absolute URLs
/// pass through untouched.
pub fn resolve_url(api_base: &str, path: &str) -> String {
    if path.contains("://") {
        return path.to_string();
    }

    let base = api_base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// `m:ss`, the way the mini-player shows positions. Garbage in gives `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }

    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
