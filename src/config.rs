//! Environment-driven configuration.
//!
//! Everything is read once at startup. [`Config::from_lookup`] takes the
//! variable source as a closure so tests don't touch the process environment.

use std::str::FromStr;

use thiserror::Error;

use crate::types::Intents;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v9";
pub const DEFAULT_SONGLINK_BASE: &str = "https://api.song.link/v1-alpha.1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// How link lookups are answered in the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyStyle {
    /// A grid of per-platform link buttons.
    #[default]
    Buttons,
    /// The unified song.link page URL as plain text.
    Page,
}

impl FromStr for ReplyStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buttons" => Ok(ReplyStyle::Buttons),
            "page" => Ok(ReplyStyle::Page),
            other => Err(format!("expected `buttons` or `page`, got `{}`", other)),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub token: String,
    /// The only channel the bot answers in.
    pub channel_id: String,
    pub api_base: String,
    pub discovery_url: String,
    pub intents: Intents,
    pub songlink_base: String,
    pub user_country: Option<String>,
    pub reply_style: ReplyStyle,
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Older deployments use `TOKEN` and `EXPLODE_CHANNEL_ID`.
        let token = get("DISCORD_TOKEN")
            .or_else(|| get("TOKEN"))
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;
        let channel_id = get("LINK_CHANNEL_ID")
            .or_else(|| get("EXPLODE_CHANNEL_ID"))
            .ok_or(ConfigError::Missing("LINK_CHANNEL_ID"))?;

        let api_base = get("DISCORD_API_BASE")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let discovery_url =
            get("DISCORD_GATEWAY_DISCOVERY_URL").unwrap_or_else(|| format!("{}/gateway", api_base));

        let intents = match get("DISCORD_INTENTS") {
            Some(raw) => {
                let bits = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                    var: "DISCORD_INTENTS",
                    reason: e.to_string(),
                })?;
                Intents::from_bits_retain(bits)
            }
            None => Intents::default(),
        };

        let songlink_base = get("SONGLINK_API_BASE")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_SONGLINK_BASE.to_string());

        let reply_style = match get("REPLY_STYLE") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: "REPLY_STYLE",
                reason,
            })?,
            None => ReplyStyle::default(),
        };

        Ok(Self {
            token,
            channel_id: channel_id.trim().to_string(),
            api_base,
            discovery_url,
            intents,
            songlink_base,
            user_country: get("SONGLINK_USER_COUNTRY"),
            reply_style,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("api_base", &self.api_base)
            .field("discovery_url", &self.discovery_url)
            .field("intents", &self.intents)
            .field("songlink_base", &self.songlink_base)
            .field("user_country", &self.user_country)
            .field("reply_style", &self.reply_style)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = load(&[("DISCORD_TOKEN", "abc"), ("LINK_CHANNEL_ID", "123")]).unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.channel_id, "123");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.discovery_url, "https://discord.com/api/v9/gateway");
        assert_eq!(config.intents, Intents::default());
        assert_eq!(config.songlink_base, DEFAULT_SONGLINK_BASE);
        assert_eq!(config.reply_style, ReplyStyle::Buttons);
        assert!(config.user_country.is_none());
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = load(&[("LINK_CHANNEL_ID", "123")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DISCORD_TOKEN"));
    }

    #[test]
    fn empty_channel_counts_as_missing() {
        let err = load(&[("DISCORD_TOKEN", "abc"), ("LINK_CHANNEL_ID", "  ")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("LINK_CHANNEL_ID"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("DISCORD_TOKEN", "abc"),
            ("LINK_CHANNEL_ID", "123"),
            ("DISCORD_API_BASE", "http://127.0.0.1:9000/api/"),
            ("DISCORD_INTENTS", "513"),
            ("SONGLINK_API_BASE", "http://127.0.0.1:9001"),
            ("SONGLINK_USER_COUNTRY", "JP"),
            ("REPLY_STYLE", "Page"),
        ])
        .unwrap();
        assert_eq!(config.api_base, "http://127.0.0.1:9000/api");
        assert_eq!(config.discovery_url, "http://127.0.0.1:9000/api/gateway");
        assert_eq!(config.intents.bits(), 513);
        assert_eq!(config.songlink_base, "http://127.0.0.1:9001");
        assert_eq!(config.user_country.as_deref(), Some("JP"));
        assert_eq!(config.reply_style, ReplyStyle::Page);
    }

    #[test]
    fn legacy_variable_names_are_accepted() {
        let config = load(&[("TOKEN", "old-token"), ("EXPLODE_CHANNEL_ID", "777")]).unwrap();
        assert_eq!(config.token, "old-token");
        assert_eq!(config.channel_id, "777");
    }

    #[test]
    fn current_names_win_over_legacy_ones() {
        let config = load(&[
            ("DISCORD_TOKEN", "new"),
            ("TOKEN", "old"),
            ("LINK_CHANNEL_ID", "1"),
            ("EXPLODE_CHANNEL_ID", "2"),
        ])
        .unwrap();
        assert_eq!(config.token, "new");
        assert_eq!(config.channel_id, "1");
    }

    #[test]
    fn bad_intents_are_rejected() {
        let err = load(&[
            ("DISCORD_TOKEN", "abc"),
            ("LINK_CHANNEL_ID", "123"),
            ("DISCORD_INTENTS", "lots"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DISCORD_INTENTS", .. }));
    }

    #[test]
    fn bad_reply_style_is_rejected() {
        let err = load(&[
            ("DISCORD_TOKEN", "abc"),
            ("LINK_CHANNEL_ID", "123"),
            ("REPLY_STYLE", "carousel"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "REPLY_STYLE", .. }));
    }

    #[test]
    fn debug_redacts_token() {
        let config = load(&[("DISCORD_TOKEN", "super-secret"), ("LINK_CHANNEL_ID", "1")]).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
    }
}
