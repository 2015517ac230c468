//! Gateway (WebSocket) transport for the Discord API.
//!
//! This module owns the WebSocket connection lifecycle:
//!   - discover the gateway URL over REST
//!   - connect → send IDENTIFY → receive HELLO
//!   - background heartbeat task, re-armed by every HELLO
//!   - sequence number tracking
//!   - clean shutdown on cancellation
//!
//! There is no resume or reconnect: when the socket dies the session is over.
//! The rest of the codebase consumes a channel of [`GatewayEvent`] values
//! without ever touching `tokio_tungstenite` directly.

use std::sync::Arc;
use std::time::Duration;

use async_lock::Mutex;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::events::GatewayEvent;
use crate::types::{ConnectionProperties, GatewayInfo, GatewayPayload, Identify, Intents};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Query parameters appended to the discovered gateway URL.
const GATEWAY_QUERY: &[(&str, &str)] = &[("v", "10"), ("encoding", "json")];

/// Outbound frames queued for the writer task.
const OUTBOUND_QUEUE: usize = 16;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway discovery failed: {0}")]
    Discovery(String),
    #[error("failed to connect to gateway: {0}")]
    Connection(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("gateway read failed: {0}")]
    Transport(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("gateway connection closed (code {code:?})")]
    Closed { code: Option<u16> },
    #[error("failed to encode gateway payload: {0}")]
    Encode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What we identify with.
#[derive(Clone)]
pub struct GatewayConfig {
    pub token: String,
    /// Gateway intents bitmask.
    pub intents: Intents,
    pub properties: ConnectionProperties,
}

impl GatewayConfig {
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            token: token.into(),
            intents,
            properties: ConnectionProperties::default(),
        }
    }

    fn identify(&self) -> Identify {
        Identify {
            token: self.token.clone(),
            intents: self.intents.bits(),
            properties: self.properties.clone(),
            presence: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("properties", &self.properties)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// State shared between the receive loop and the heartbeat task.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Last non-null `s` seen on any envelope.
    pub sequence: Option<u64>,
    /// Period assigned by the most recent HELLO.
    pub heartbeat_interval: Option<Duration>,
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, WsMessage>;

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Resolve the WebSocket URL via `GET /gateway` and append the fixed query.
pub async fn discover(discovery_url: &str) -> Result<String, GatewayError> {
    let resp = reqwest::get(discovery_url)
        .await
        .map_err(|e| GatewayError::Discovery(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(GatewayError::Discovery(format!(
            "{} returned status {}",
            discovery_url, status
        )));
    }

    let info: GatewayInfo = resp
        .json()
        .await
        .map_err(|e| GatewayError::Discovery(format!("malformed body: {}", e)))?;

    with_gateway_query(&info.url)
}

/// Parsing normalises an empty path to `/`, which the handshake request
/// line needs.
fn with_gateway_query(url: &str) -> Result<String, GatewayError> {
    let mut url = reqwest::Url::parse(url)
        .map_err(|e| GatewayError::Discovery(format!("invalid gateway url {:?}: {}", url, e)))?;
    url.query_pairs_mut().extend_pairs(GATEWAY_QUERY);
    Ok(url.into())
}

// ---------------------------------------------------------------------------
// GatewaySession
// ---------------------------------------------------------------------------

/// One live connection to the gateway.
pub struct GatewaySession {
    config: GatewayConfig,
    stream: WsStream,
    state: Arc<Mutex<SessionState>>,
}

impl GatewaySession {
    /// Open the WebSocket. Nothing is sent until [`run`](Self::run).
    pub async fn connect(url: &str, config: GatewayConfig) -> Result<Self, GatewayError> {
        info!(url, "connecting to Discord gateway");
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(GatewayError::Connection)?;
        info!("WebSocket connected");

        Ok(Self {
            config,
            stream,
            state: Arc::new(Mutex::new(SessionState::default())),
        })
    }

    /// A handle to the session state, mainly for diagnostics and tests.
    pub fn state(&self) -> Arc<Mutex<SessionState>> {
        Arc::clone(&self.state)
    }

    /// Identify, then pump frames until `cancel` fires or the socket dies.
    ///
    /// Decoded READY, MESSAGE_CREATE and INTERACTION_CREATE events are pushed
    /// into `events`. Returns `Ok(())` only on cancellation (or when the
    /// consumer drops its receiver).
    pub async fn run(
        self,
        events: async_channel::Sender<GatewayEvent>,
        cancel: CancellationToken,
    ) -> Result<(), GatewayError> {
        let GatewaySession {
            config,
            stream,
            state,
        } = self;

        let (ws_write, mut ws_read) = stream.split();
        let (out_tx, out_rx) = mpsc::channel::<GatewayPayload>(OUTBOUND_QUEUE);
        let writer = tokio::spawn(write_loop(ws_write, out_rx));

        let identify = GatewayPayload::identify(&config.identify())?;
        if out_tx.send(identify).await.is_err() {
            warn!("writer stopped before IDENTIFY could be sent");
        } else {
            info!(intents = config.intents.bits(), "sent IDENTIFY");
        }

        let (interval_tx, interval_rx) = watch::channel::<Option<Duration>>(None);
        let heartbeat_cancel = cancel.child_token();
        let heartbeat = tokio::spawn(heartbeat_loop(
            interval_rx,
            Arc::clone(&state),
            out_tx.clone(),
            heartbeat_cancel.clone(),
        ));

        let result = read_loop(
            &mut ws_read,
            &out_tx,
            &interval_tx,
            &state,
            &events,
            &cancel,
        )
        .await;

        // Cleanup: stop heartbeating, then let the writer drain and close.
        heartbeat_cancel.cancel();
        if let Err(e) = heartbeat.await {
            warn!(error = %e, "heartbeat task ended abnormally");
        }
        drop(out_tx);
        if let Err(e) = writer.await {
            warn!(error = %e, "writer task ended abnormally");
        }

        match &result {
            Ok(()) => info!("gateway session stopped"),
            Err(e) => error!(error = %e, "gateway session terminated"),
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Read loop
// ---------------------------------------------------------------------------

async fn read_loop<S>(
    ws_read: &mut S,
    out_tx: &mpsc::Sender<GatewayPayload>,
    interval_tx: &watch::Sender<Option<Duration>>,
    state: &Arc<Mutex<SessionState>>,
    events: &async_channel::Sender<GatewayEvent>,
    cancel: &CancellationToken,
) -> Result<(), GatewayError>
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => {
                info!("shutdown requested, leaving gateway read loop");
                return Ok(());
            }
            msg = ws_read.next() => msg,
        };

        let text = match msg {
            Some(Ok(WsMessage::Text(text))) => text,
            Some(Ok(WsMessage::Close(frame))) => {
                let code = frame.as_ref().map(|f| u16::from(f.code));
                warn!(close_code = ?code, "WebSocket closed by server");
                return Err(GatewayError::Closed { code });
            }
            // Ping/Pong/Binary: ignore.
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(error = %e, "WebSocket read error");
                return Err(GatewayError::Transport(e));
            }
            None => {
                info!("WebSocket stream ended");
                return Err(GatewayError::Closed { code: None });
            }
        };

        let payload = match GatewayEvent::parse_envelope(text.as_str()) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "skipping undecodable frame");
                continue;
            }
        };
        let sequence = payload.s;

        match GatewayEvent::decode(payload) {
            Ok(event) => {
                if !handle_event(event, out_tx, interval_tx, state, events, cancel).await {
                    info!("no longer forwarding events, leaving gateway read loop");
                    return Ok(());
                }
            }
            Err(e) => warn!(error = %e, "skipping gateway payload"),
        }

        if let Some(s) = sequence {
            state.lock().await.sequence = Some(s);
        }
    }
}

/// Act on one decoded event. Returns `false` once the consumer is gone or
/// shutdown was requested while waiting on a full event queue.
async fn handle_event(
    event: GatewayEvent,
    out_tx: &mpsc::Sender<GatewayPayload>,
    interval_tx: &watch::Sender<Option<Duration>>,
    state: &Arc<Mutex<SessionState>>,
    events: &async_channel::Sender<GatewayEvent>,
    cancel: &CancellationToken,
) -> bool {
    match event {
        GatewayEvent::Hello(hello) => {
            let period = Duration::from_millis(hello.heartbeat_interval);
            state.lock().await.heartbeat_interval = Some(period);
            interval_tx.send_replace(Some(period));
            info!(interval_ms = hello.heartbeat_interval, "received HELLO, heartbeat armed");
            true
        }

        GatewayEvent::HeartbeatRequest => {
            let seq = state.lock().await.sequence;
            if out_tx.send(GatewayPayload::heartbeat(seq)).await.is_err() {
                warn!("failed to queue requested heartbeat");
            }
            debug!(seq = ?seq, "sent requested heartbeat");
            true
        }

        GatewayEvent::HeartbeatAck => {
            debug!("heartbeat acknowledged");
            true
        }

        GatewayEvent::Reconnect => {
            warn!("gateway requested reconnect (op 7); resuming is not supported");
            true
        }

        GatewayEvent::InvalidSession(resumable) => {
            warn!(resumable, "session invalidated (op 9)");
            true
        }

        GatewayEvent::Unknown {
            op, ref event_name, ..
        } => {
            trace!(op, event = ?event_name, "unhandled gateway event");
            true
        }

        GatewayEvent::Ready(ref ready) => {
            info!(user = %ready.user.username, session_id = %ready.session_id, "gateway READY");
            forward(event, events, cancel).await
        }

        GatewayEvent::MessageCreate(_) | GatewayEvent::InteractionCreate(_) => {
            forward(event, events, cancel).await
        }
    }
}

/// Push `event` to the consumer unless shutdown wins the race.
async fn forward(
    event: GatewayEvent,
    events: &async_channel::Sender<GatewayEvent>,
    cancel: &CancellationToken,
) -> bool {
    let name = event.name().map(str::to_string);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(event = ?name, "dropping event, shutdown requested");
            false
        }
        sent = events.send(event) => sent.is_ok(),
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// Send op-1 heartbeats on the period published through `interval_rx`.
///
/// Idle until the first HELLO. Every new period restarts the timer so the
/// next beat lands one full period after the HELLO that set it.
pub(crate) async fn heartbeat_loop(
    mut interval_rx: watch::Receiver<Option<Duration>>,
    state: Arc<Mutex<SessionState>>,
    out_tx: mpsc::Sender<GatewayPayload>,
    cancel: CancellationToken,
) {
    loop {
        let period = *interval_rx.borrow_and_update();

        let period = match period.filter(|p| !p.is_zero()) {
            Some(p) => p,
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = interval_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
                continue;
            }
        };

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("heartbeat task cancelled");
                    return;
                }
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    debug!("heartbeat interval changed, re-arming");
                    break;
                }
                _ = ticker.tick() => {
                    let seq = state.lock().await.sequence;
                    if out_tx.send(GatewayPayload::heartbeat(seq)).await.is_err() {
                        warn!("writer gone, stopping heartbeat task");
                        return;
                    }
                    debug!(seq = ?seq, "sent heartbeat");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Serialise queued payloads onto the socket; close it once every sender is
/// gone.
async fn write_loop(mut ws_write: WsSink, mut out_rx: mpsc::Receiver<GatewayPayload>) {
    while let Some(payload) = out_rx.recv().await {
        let text = match serde_json::to_string(&payload) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, op = payload.op, "failed to encode gateway payload");
                continue;
            }
        };
        if let Err(e) = ws_write.send(WsMessage::Text(text.into())).await {
            warn!(error = %e, op = payload.op, "WS send error");
            break;
        }
    }

    if let Err(e) = ws_write.close().await {
        debug!(error = %e, "error while closing WebSocket");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
