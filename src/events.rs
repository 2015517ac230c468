//! Typed gateway events.
//!
//! Instead of matching on raw `(op, t, serde_json::Value)` tuples everywhere,
//! the gateway module decodes each envelope into this enum so the rest of the
//! bot can pattern-match on strongly-typed data.

use thiserror::Error;

use crate::types::*;

// ---------------------------------------------------------------------------
// The top-level event enum
// ---------------------------------------------------------------------------

/// A fully-parsed event coming off the Discord gateway.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Op 10: the server assigned a heartbeat period.
    Hello(Hello),

    /// We've successfully identified; the bot is ready.
    Ready(ReadyEvent),

    /// A message was created in a channel we can see.
    MessageCreate(Message),

    /// A slash command (or other interaction) was invoked.
    InteractionCreate(Interaction),

    /// Heartbeat ACK from the gateway (op 11).
    HeartbeatAck,

    /// The gateway is asking us to heartbeat immediately (op 1).
    HeartbeatRequest,

    /// Gateway told us to reconnect (op 7).
    Reconnect,

    /// Session has been invalidated (op 9); `true` when resumable.
    InvalidSession(bool),

    /// Anything we don't have a typed variant for.
    Unknown {
        op: u8,
        event_name: Option<String>,
        data: Option<serde_json::Value>,
    },
}

/// A payload that could not be decoded into its typed form.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed gateway envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("op {op} payload is missing")]
    MissingData { op: u8 },
    #[error("failed to decode {event} payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

impl GatewayEvent {
    /// Parse a raw text frame into an envelope.
    pub fn parse_envelope(text: &str) -> Result<GatewayPayload, DecodeError> {
        serde_json::from_str(text).map_err(DecodeError::Envelope)
    }

    /// Decode an envelope by opcode and, for dispatches, by event name.
    ///
    /// Unrecognised opcodes and event names become [`GatewayEvent::Unknown`];
    /// only payloads that are recognised but malformed produce an error.
    pub fn decode(payload: GatewayPayload) -> Result<Self, DecodeError> {
        let GatewayPayload { op, d, t, .. } = payload;

        match OpCode::from_u8(op) {
            Some(OpCode::Dispatch) => Self::decode_dispatch(t, d),

            Some(OpCode::Hello) => {
                let d = d.ok_or(DecodeError::MissingData { op })?;
                serde_json::from_value::<Hello>(d)
                    .map(GatewayEvent::Hello)
                    .map_err(|source| DecodeError::Payload {
                        event: "HELLO".to_string(),
                        source,
                    })
            }

            Some(OpCode::Heartbeat) => Ok(GatewayEvent::HeartbeatRequest),
            Some(OpCode::HeartbeatAck) => Ok(GatewayEvent::HeartbeatAck),
            Some(OpCode::Reconnect) => Ok(GatewayEvent::Reconnect),

            Some(OpCode::InvalidSession) => Ok(GatewayEvent::InvalidSession(
                d.as_ref().and_then(|v| v.as_bool()).unwrap_or(false),
            )),

            // Identify is client → server only; treat it like any other
            // opcode we don't act on.
            Some(OpCode::Identify) | None => Ok(GatewayEvent::Unknown {
                op,
                event_name: t,
                data: d,
            }),
        }
    }

    /// Decode an op-0 DISPATCH by its `t` name.
    fn decode_dispatch(
        event_name: Option<String>,
        data: Option<serde_json::Value>,
    ) -> Result<Self, DecodeError> {
        let Some(name) = event_name else {
            return Ok(GatewayEvent::Unknown {
                op: 0,
                event_name: None,
                data,
            });
        };

        match name.as_str() {
            "READY" => decode_data(&name, data).map(GatewayEvent::Ready),
            "MESSAGE_CREATE" => decode_data(&name, data).map(GatewayEvent::MessageCreate),
            "INTERACTION_CREATE" => decode_data(&name, data).map(GatewayEvent::InteractionCreate),
            _ => Ok(GatewayEvent::Unknown {
                op: 0,
                event_name: Some(name),
                data,
            }),
        }
    }

    /// The dispatch name (`t`) this event came from, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            GatewayEvent::Ready(_) => Some("READY"),
            GatewayEvent::MessageCreate(_) => Some("MESSAGE_CREATE"),
            GatewayEvent::InteractionCreate(_) => Some("INTERACTION_CREATE"),
            GatewayEvent::Unknown { event_name, .. } => event_name.as_deref(),
            _ => None,
        }
    }
}

fn decode_data<T: serde::de::DeserializeOwned>(
    event: &str,
    data: Option<serde_json::Value>,
) -> Result<T, DecodeError> {
    let data = data.ok_or(DecodeError::MissingData { op: 0 })?;
    serde_json::from_value(data).map_err(|source| DecodeError::Payload {
        event: event.to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
