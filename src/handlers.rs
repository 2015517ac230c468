//! Message and interaction handlers.
//!
//! [`MessageRouter`] decides what (if anything) to do with a chat message and
//! returns it as an [`Action`]; the bot loop in [`crate::bot`] executes the
//! action against the REST API. Keeping the decision separate from the
//! side effect lets the routing rules be tested without a network.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ReplyStyle;
use crate::http::{DiscordHttpClient, HttpError, Typing};
use crate::songlink::{LinkLookup, LinkResponse};
use crate::types::*;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const REACTION_EMOJI: &str = "👍";

/// Posted in the channel whenever handling a message fails. Never includes
/// the underlying error text.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while handling your message.";

const INTERACTION_REPLY: &str = "Hello";

/// Songlink platform keys we render, with their button labels.
const PLATFORM_LABELS: &[(&str, &str)] = &[
    ("spotify", "Spotify"),
    ("youtube", "YouTube"),
    ("appleMusic", "Apple Music"),
    ("youtubeMusic", "YouTube Music"),
    ("amazonMusic", "Amazon Music"),
    ("soundcloud", "SoundCloud"),
    ("bandcamp", "Bandcamp"),
];

// ---------------------------------------------------------------------------
// Errors / actions
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HandlerError {
    /// The lookup succeeded but no platform we know how to render matched.
    #[error("no link found")]
    NoLinkFound,
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// What the router wants done in response to a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send {
        channel_id: Snowflake,
        message: CreateMessage,
    },
    React {
        channel_id: Snowflake,
        message_id: Snowflake,
        emoji: String,
    },
}

impl Action {
    fn text(channel_id: &str, content: impl Into<String>) -> Self {
        Action::Send {
            channel_id: channel_id.to_string(),
            message: CreateMessage::new().content(content),
        }
    }
}

// ---------------------------------------------------------------------------
// MessageRouter
// ---------------------------------------------------------------------------

/// Routes MESSAGE_CREATE events from the single configured channel.
pub struct MessageRouter<L, T> {
    channel_id: Snowflake,
    reply_style: ReplyStyle,
    lookup: L,
    typing: T,
}

impl<L, T> MessageRouter<L, T>
where
    L: LinkLookup,
    T: Typing,
{
    pub fn new(channel_id: impl Into<Snowflake>, reply_style: ReplyStyle, lookup: L, typing: T) -> Self {
        Self {
            channel_id: channel_id.into(),
            reply_style,
            lookup,
            typing,
        }
    }

    /// Decide how to answer `msg`. `Ok(None)` means stay silent.
    pub async fn handle(&self, msg: &Message) -> Result<Option<Action>, HandlerError> {
        if msg.channel_id != self.channel_id {
            return Ok(None);
        }

        // Bots (ourselves included) never get a reply.
        if msg.author.bot {
            return Ok(None);
        }

        match msg.content.as_str() {
            "ping" => return Ok(Some(Action::text(&msg.channel_id, "pong"))),
            "help" => {
                return Ok(Some(Action::Send {
                    channel_id: msg.channel_id.clone(),
                    message: help_message(),
                }))
            }
            "react" => {
                return Ok(Some(Action::React {
                    channel_id: msg.channel_id.clone(),
                    message_id: msg.id.clone(),
                    emoji: REACTION_EMOJI.to_string(),
                }))
            }
            _ => {}
        }

        if let Err(e) = reqwest::Url::parse(msg.content.trim()) {
            debug!(error = %e, "message is not a URI, ignoring");
            return Ok(None);
        }

        self.typing.start_typing(&msg.channel_id).await?;

        let links = match self.lookup.lookup(msg.content.trim()).await {
            Ok(links) => links,
            Err(e) => {
                // Lookup failures stay out of the channel.
                warn!(error = %e, url = %msg.content, "link lookup failed");
                return Ok(None);
            }
        };

        let reply = match self.reply_style {
            ReplyStyle::Buttons => link_buttons_message(&links)?,
            ReplyStyle::Page => page_message(&links)?,
        };

        info!(channel_id = %msg.channel_id, message_id = %msg.id, "replying with links");
        Ok(Some(Action::Send {
            channel_id: msg.channel_id.clone(),
            message: reply.reply_to(msg.channel_id.clone(), msg.id.clone()),
        }))
    }
}

// ---------------------------------------------------------------------------
// Reply builders
// ---------------------------------------------------------------------------

/// The static `help` greeting.
pub fn help_message() -> CreateMessage {
    CreateMessage::new()
        .content("Hello, World!")
        .embed(Embed::new().title("Hello World").description("Embed Message"))
}

fn platform_label(platform: &str) -> Option<&'static str> {
    PLATFORM_LABELS
        .iter()
        .find(|(key, _)| *key == platform)
        .map(|(_, label)| *label)
}

/// One link button per known platform, five per row, in platform-key order.
pub fn link_buttons_message(links: &LinkResponse) -> Result<CreateMessage, HandlerError> {
    let buttons: Vec<Button> = links
        .links_by_platform
        .iter()
        .filter_map(|(platform, link)| {
            platform_label(platform).map(|label| Button::link(label, link.url.clone()))
        })
        .collect();

    if buttons.is_empty() {
        return Err(HandlerError::NoLinkFound);
    }

    Ok(buttons
        .chunks(MAX_BUTTONS_PER_ROW)
        .fold(CreateMessage::new(), |msg, row| {
            msg.component_row(ActionRow::new(row.to_vec()))
        }))
}

/// The unified song.link page as plain text.
pub fn page_message(links: &LinkResponse) -> Result<CreateMessage, HandlerError> {
    if links.page_url.is_empty() {
        return Err(HandlerError::NoLinkFound);
    }
    Ok(CreateMessage::new().content(links.page_url.clone()))
}

// ---------------------------------------------------------------------------
// Executing actions
// ---------------------------------------------------------------------------

/// Carry out a router [`Action`] against the REST API.
pub async fn execute(http: &DiscordHttpClient, action: &Action) -> Result<(), HttpError> {
    match action {
        Action::Send {
            channel_id,
            message,
        } => http.create_message(channel_id, message).await,
        Action::React {
            channel_id,
            message_id,
            emoji,
        } => http.add_reaction(channel_id, message_id, emoji).await,
    }
}

// ---------------------------------------------------------------------------
// INTERACTION_CREATE handler
// ---------------------------------------------------------------------------

/// Acknowledge any interaction with a canned channel message.
pub async fn respond_to_interaction(
    http: &DiscordHttpClient,
    interaction: &Interaction,
) -> Result<(), HttpError> {
    info!(interaction_id = %interaction.id, "responding to interaction");
    http.create_interaction_response(
        &interaction.id,
        &interaction.token,
        &InteractionResponse::message(INTERACTION_REPLY),
    )
    .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
