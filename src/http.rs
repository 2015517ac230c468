//! HTTP client for the Discord REST API.
//!
//! All outbound REST calls go through [`DiscordHttpClient`] so that the auth
//! header, response logging, and error mapping live in one place.

use async_trait::async_trait;
use reqwest::Method;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DEFAULT_API_BASE;
use crate::types::*;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const USER_AGENT: &str = concat!(
    "DiscordBot (",
    env!("CARGO_PKG_NAME"),
    ", ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HttpError {
    /// Non-success status from Discord.
    #[error("Discord API error {status} on {route}: {body}")]
    Api {
        status: u16,
        body: String,
        route: String,
    },
    /// Transport / network error.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Serialisation error.
    #[error("serialisation error: {0}")]
    Serde(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Typing seam
// ---------------------------------------------------------------------------

/// Shows the "bot is typing…" indicator in a channel.
///
/// Split out so the message router can be exercised without a live client.
#[async_trait]
pub trait Typing: Send + Sync {
    async fn start_typing(&self, channel_id: &str) -> Result<(), HttpError>;
}

// ---------------------------------------------------------------------------
// DiscordHttpClient
// ---------------------------------------------------------------------------

/// A thin HTTP client for the Discord REST API.
///
/// Cheap to clone (`reqwest::Client` is reference counted).
#[derive(Clone)]
pub struct DiscordHttpClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl DiscordHttpClient {
    /// Create a new client with the given bot token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API root (e.g. a local test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    // ------------------------------------------------------------------
    // Low-level: the single request method everything funnels through
    // ------------------------------------------------------------------

    /// Send a request to `{base_url}/{path}` and return the raw body.
    ///
    /// `route` is only used for logs and errors; it should be a template like
    /// `POST /channels/{channel_id}/messages`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        route: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<String, HttpError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let mut req = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bot {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json");
        if let Some(json) = body {
            req = req.json(json);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        info!(route, status = status.as_u16(), body = %text, "API response");

        if status.is_success() {
            Ok(text)
        } else {
            Err(HttpError::Api {
                status: status.as_u16(),
                body: text,
                route: route.to_string(),
            })
        }
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Send a simple text message to a channel.
    pub async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), HttpError> {
        self.create_message(channel_id, &CreateMessage::new().content(content))
            .await
    }

    /// Send a rich message (embeds, components, reply, etc.) to a channel.
    pub async fn create_message(
        &self,
        channel_id: &str,
        msg: &CreateMessage,
    ) -> Result<(), HttpError> {
        let path = format!("channels/{}/messages", channel_id);
        let body = serde_json::to_value(msg)?;
        self.request(
            Method::POST,
            &path,
            "POST /channels/{channel_id}/messages",
            Some(&body),
        )
        .await?;
        Ok(())
    }

    /// React to a message as the bot. `emoji` is a unicode emoji or `name:id`.
    pub async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), HttpError> {
        let path = format!(
            "channels/{}/messages/{}/reactions/{}/@me",
            channel_id,
            message_id,
            urlencoding::encode(emoji)
        );
        self.request(
            Method::PUT,
            &path,
            "PUT /channels/{channel_id}/messages/{message_id}/reactions/{emoji}/@me",
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn pin_message(&self, channel_id: &str, message_id: &str) -> Result<(), HttpError> {
        let path = format!("channels/{}/pins/{}", channel_id, message_id);
        self.request(
            Method::PUT,
            &path,
            "PUT /channels/{channel_id}/pins/{message_id}",
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), HttpError> {
        let path = format!("channels/{}/messages/{}", channel_id, message_id);
        self.request(
            Method::DELETE,
            &path,
            "DELETE /channels/{channel_id}/messages/{message_id}",
            None,
        )
        .await?;
        Ok(())
    }

    /// Trigger the typing indicator (lasts ~10s or until the next message).
    pub async fn trigger_typing(&self, channel_id: &str) -> Result<(), HttpError> {
        let path = format!("channels/{}/typing", channel_id);
        self.request(
            Method::POST,
            &path,
            "POST /channels/{channel_id}/typing",
            None,
        )
        .await?;
        debug!(channel_id, "typing indicator started");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Interactions
    // ------------------------------------------------------------------

    /// Respond to an interaction (initial response).
    pub async fn create_interaction_response(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        response: &InteractionResponse,
    ) -> Result<(), HttpError> {
        let path = format!(
            "interactions/{}/{}/callback",
            interaction_id, interaction_token
        );
        let body = serde_json::to_value(response)?;
        // 204 No Content on success; the body is not parsed.
        self.request(
            Method::POST,
            &path,
            "POST /interactions/{interaction_id}/{token}/callback",
            Some(&body),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Typing for DiscordHttpClient {
    async fn start_typing(&self, channel_id: &str) -> Result<(), HttpError> {
        self.trigger_typing(channel_id).await
    }
}

impl std::fmt::Debug for DiscordHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordHttpClient")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(DiscordHttpClient: Send, Sync, Clone);

    #[test]
    fn debug_redacts_token() {
        let client = DiscordHttpClient::new("very-secret-token");
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("very-secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = DiscordHttpClient::new("t").with_base_url("http://localhost:1234/api/");
        assert_eq!(client.base_url, "http://localhost:1234/api");
    }

    #[test]
    fn api_error_display_includes_route_and_status() {
        let err = HttpError::Api {
            status: 403,
            body: "{\"message\":\"Missing Access\"}".to_string(),
            route: "POST /channels/{channel_id}/typing".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("403"));
        assert!(text.contains("/typing"));
    }
}
