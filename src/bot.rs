//! The bot's event loop.
//!
//! Connects to the gateway, then consumes the typed event stream and hands
//! each event to the matching handler, one at a time. The gateway reader and
//! heartbeat run in their own tasks, so a slow lookup only delays the queue.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::events::GatewayEvent;
use crate::gateway::{self, GatewayConfig, GatewayError, GatewaySession};
use crate::handlers::{self, HandlerError, MessageRouter, GENERIC_ERROR_MESSAGE};
use crate::http::DiscordHttpClient;
use crate::songlink::SonglinkClient;
use crate::types::{Interaction, Message};

/// Events buffered between the gateway reader and the dispatch loop.
const EVENT_QUEUE: usize = 256;

#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("gateway task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

type Router = MessageRouter<SonglinkClient, DiscordHttpClient>;

// ---------------------------------------------------------------------------
// Bot
// ---------------------------------------------------------------------------

/// Everything an event handler needs.
pub struct Bot {
    http: DiscordHttpClient,
    router: Router,
}

impl Bot {
    pub fn new(config: &Config) -> Self {
        let http = DiscordHttpClient::new(config.token.clone()).with_base_url(config.api_base.clone());
        let songlink = SonglinkClient::new()
            .with_base_url(config.songlink_base.clone())
            .with_user_country(config.user_country.clone());
        let router = MessageRouter::new(
            config.channel_id.clone(),
            config.reply_style,
            songlink,
            http.clone(),
        );
        Self { http, router }
    }

    pub fn http(&self) -> &DiscordHttpClient {
        &self.http
    }

    /// Route one message and carry out the result.
    ///
    /// Any failure is logged and replaced by a generic notice in the
    /// message's channel.
    pub async fn on_message(&self, msg: &Message) {
        let outcome: Result<(), HandlerError> = match self.router.handle(msg).await {
            Ok(Some(action)) => handlers::execute(&self.http, &action).await.map_err(Into::into),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            error!(error = %e, channel_id = %msg.channel_id, message_id = %msg.id, "failed to handle message");
            if let Err(e) = self.http.send_message(&msg.channel_id, GENERIC_ERROR_MESSAGE).await {
                error!(error = %e, "failed to send error notice");
            }
        }
    }

    pub async fn on_interaction(&self, interaction: &Interaction) {
        if let Err(e) = handlers::respond_to_interaction(&self.http, interaction).await {
            error!(error = %e, interaction_id = %interaction.id, "failed to respond to interaction");
        }
    }

    pub async fn dispatch(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::Ready(ready) => {
                info!(user = %ready.user.username, session_id = %ready.session_id, "bot is ready");
            }
            GatewayEvent::MessageCreate(msg) => self.on_message(&msg).await,
            GatewayEvent::InteractionCreate(interaction) => self.on_interaction(&interaction).await,
            other => {
                warn!(event = ?other.name(), "unhandled gateway event");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Discover, connect and serve until `cancel` fires or the session dies.
pub async fn run(config: Config, cancel: CancellationToken) -> Result<(), BotError> {
    let bot = Bot::new(&config);

    let url = gateway::discover(&config.discovery_url).await?;
    let session = GatewaySession::connect(
        &url,
        GatewayConfig::new(config.token.clone(), config.intents),
    )
    .await?;

    let (events_tx, events_rx) = async_channel::bounded(EVENT_QUEUE);
    let driver = tokio::spawn(session.run(events_tx, cancel.clone()));

    // Queued events are abandoned once shutdown is requested.
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events_rx.recv() => match event {
                Ok(event) => event,
                Err(_) => break,
            },
        };
        // An in-flight lookup is dropped rather than awaited on shutdown.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = bot.dispatch(event) => {}
        }
    }
    events_rx.close();

    let result = driver.await?;
    match &result {
        Ok(()) => info!("bot shut down"),
        Err(e) => error!(error = %e, "bot stopped on gateway error"),
    }
    result.map_err(BotError::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
