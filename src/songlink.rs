//! Client for the Songlink/Odesli link-aggregation API.
//!
//! One GET per lookup, no caching and no retries. The response maps a single
//! music URL to its equivalents on every platform Songlink knows about.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DEFAULT_SONGLINK_BASE;

// ---------------------------------------------------------------------------
// Response model
// ---------------------------------------------------------------------------

/// Top-level object returned by `GET /links`.
///
/// Platform and entity maps are `BTreeMap`s so iteration order is stable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    /// The unique ID for the input entity that was supplied in the request.
    #[serde(default)]
    pub entity_unique_id: String,
    #[serde(default)]
    pub user_country: String,
    /// A URL that renders the Songlink page for this entity.
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub links_by_platform: BTreeMap<String, PlatformLink>,
    #[serde(default)]
    pub entities_by_unique_id: BTreeMap<String, Entity>,
}

impl LinkResponse {
    /// The entity the looked-up URL resolved to, if Songlink included it.
    pub fn input_entity(&self) -> Option<&Entity> {
        self.entities_by_unique_id.get(&self.entity_unique_id)
    }
}

/// Data for linking to a match on one platform.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformLink {
    #[serde(default)]
    pub entity_unique_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_app_uri_mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_app_uri_desktop: Option<String>,
}

/// Metadata for a streaming entity (song, album, …).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub title: Option<String>,
    pub artist_name: Option<String>,
    pub thumbnail_url: Option<String>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
    #[serde(default)]
    pub api_provider: String,
    /// Platforms "powered" by this entity.
    #[serde(default)]
    pub platforms: Vec<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SonglinkError {
    #[error("songlink transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-success status; the body is kept for diagnostics.
    #[error("songlink returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("failed to decode songlink response: {0}")]
    Decode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Lookup seam
// ---------------------------------------------------------------------------

/// Anything that can resolve a music URL into a [`LinkResponse`].
#[async_trait]
pub trait LinkLookup: Send + Sync {
    async fn lookup(&self, url: &str) -> Result<LinkResponse, SonglinkError>;
}

// ---------------------------------------------------------------------------
// SonglinkClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SonglinkClient {
    client: reqwest::Client,
    base_url: String,
    user_country: Option<String>,
}

impl Default for SonglinkClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SonglinkClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_SONGLINK_BASE.to_string(),
            user_country: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Ask Songlink to resolve links for a specific storefront country.
    pub fn with_user_country(mut self, country: Option<String>) -> Self {
        self.user_country = country;
        self
    }

    /// Resolve `input_url` into its cross-platform links.
    pub async fn links(&self, input_url: &str) -> Result<LinkResponse, SonglinkError> {
        let endpoint = format!("{}/links", self.base_url);

        let mut query: Vec<(&str, &str)> = vec![("url", input_url)];
        if let Some(country) = self.user_country.as_deref() {
            query.push(("userCountry", country));
        }

        debug!(url = input_url, "songlink lookup");
        let resp = self.client.get(&endpoint).query(&query).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %body, "songlink returned non-success status");
            return Err(SonglinkError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let links: LinkResponse = serde_json::from_str(&body)?;
        debug!(
            page_url = %links.page_url,
            platforms = links.links_by_platform.len(),
            "songlink lookup succeeded"
        );
        Ok(links)
    }

    /// Resolve `input_url` to its unified song.link page.
    pub async fn page_url(&self, input_url: &str) -> Result<String, SonglinkError> {
        Ok(self.links(input_url).await?.page_url)
    }
}

#[async_trait]
impl LinkLookup for SonglinkClient {
    async fn lookup(&self, url: &str) -> Result<LinkResponse, SonglinkError> {
        self.links(url).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use static_assertions::assert_impl_all;

    assert_impl_all!(SonglinkClient: Send, Sync, Clone);

    #[test]
    fn decodes_link_response() {
        let resp: LinkResponse = serde_json::from_value(json!({
            "entityUniqueId": "SPOTIFY_SONG::abc",
            "userCountry": "US",
            "pageUrl": "https://song.link/s/abc",
            "linksByPlatform": {
                "spotify": {
                    "entityUniqueId": "SPOTIFY_SONG::abc",
                    "url": "https://open.spotify.com/track/abc",
                    "nativeAppUriDesktop": "spotify:track:abc"
                },
                "youtube": {
                    "entityUniqueId": "YOUTUBE_VIDEO::xyz",
                    "url": "https://www.youtube.com/watch?v=xyz"
                }
            },
            "entitiesByUniqueId": {
                "SPOTIFY_SONG::abc": {
                    "id": "abc",
                    "type": "song",
                    "title": "Song",
                    "artistName": "Artist",
                    "thumbnailUrl": "https://i.scdn.co/image/abc",
                    "thumbnailWidth": 640,
                    "thumbnailHeight": 640,
                    "apiProvider": "spotify",
                    "platforms": ["spotify"]
                }
            }
        }))
        .unwrap();

        assert_eq!(resp.page_url, "https://song.link/s/abc");
        assert_eq!(resp.links_by_platform.len(), 2);
        let spotify = &resp.links_by_platform["spotify"];
        assert_eq!(spotify.native_app_uri_desktop.as_deref(), Some("spotify:track:abc"));
        assert!(spotify.native_app_uri_mobile.is_none());

        let entity = resp.input_entity().unwrap();
        assert_eq!(entity.kind, "song");
        assert_eq!(entity.artist_name.as_deref(), Some("Artist"));
        assert_eq!(entity.thumbnail_width, Some(640));
        assert_eq!(entity.platforms, vec!["spotify".to_string()]);
    }

    #[test]
    fn platform_iteration_is_sorted() {
        let resp: LinkResponse = serde_json::from_value(json!({
            "pageUrl": "https://song.link/x",
            "linksByPlatform": {
                "youtube": {"url": "y"},
                "appleMusic": {"url": "a"},
                "spotify": {"url": "s"}
            }
        }))
        .unwrap();
        let keys: Vec<&str> = resp.links_by_platform.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["appleMusic", "spotify", "youtube"]);
    }

    #[test]
    fn upstream_error_keeps_body() {
        let err = SonglinkError::Upstream {
            status: 400,
            body: "{\"code\":\"could_not_resolve_entity\"}".to_string(),
        };
        assert!(err.to_string().contains("could_not_resolve_entity"));
    }
}
