//! Typed representations of the Discord objects this bot reads and writes.
//!
//! Only the handful of fields the bot actually uses are modelled; unknown
//! fields are ignored on deserialisation so payload growth on Discord's side
//! never breaks decoding.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Discord IDs are snowflakes transmitted as strings in JSON.
pub type Snowflake = String;

// ---------------------------------------------------------------------------
// Gateway payload (the envelope that wraps every WS message)
// ---------------------------------------------------------------------------

/// Raw gateway envelope.
///
/// `d` stays opaque here; [`crate::events::GatewayEvent`] decodes it by
/// opcode and event name. An absent `d` is `None` and an explicit `null` is
/// `Some(Value::Null)`, so both survive a round trip.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(
        default,
        deserialize_with = "present_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub d: Option<serde_json::Value>,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayPayload {
    /// Build an op-2 IDENTIFY envelope.
    pub fn identify(identify: &Identify) -> Result<Self, serde_json::Error> {
        Ok(Self {
            op: OpCode::Identify as u8,
            d: Some(serde_json::to_value(identify)?),
            s: None,
            t: None,
        })
    }

    /// Build an op-1 HEARTBEAT envelope carrying the last seen sequence,
    /// or an explicit `null` before any sequence was seen.
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self {
            op: OpCode::Heartbeat as u8,
            d: Some(sequence.map_or(serde_json::Value::Null, serde_json::Value::from)),
            s: None,
            t: None,
        }
    }
}

/// A present `d` field, `null` included.
fn present_data<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// Gateway opcodes used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_repr, Serialize_repr)]
#[repr(u8)]
pub enum OpCode {
    Dispatch = 0,
    Heartbeat = 1,
    Identify = 2,
    Reconnect = 7,
    InvalidSession = 9,
    Hello = 10,
    HeartbeatAck = 11,
}

impl OpCode {
    pub fn from_u8(op: u8) -> Option<Self> {
        match op {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            7 => Some(Self::Reconnect),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Identify / Hello
// ---------------------------------------------------------------------------

bitflags! {
    /// Gateway intents bitmask sent with IDENTIFY.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Intents: u64 {
        const GUILDS = 1;
        const GUILD_MESSAGES = 1 << 9;
        const GUILD_MESSAGE_REACTIONS = 1 << 10;
        const GUILD_MESSAGE_TYPING = 1 << 11;
        const DIRECT_MESSAGES = 1 << 12;
        const MESSAGE_CONTENT = 1 << 15;
    }
}

impl Default for Intents {
    /// GUILD_MESSAGES | GUILD_MESSAGE_TYPING | MESSAGE_CONTENT (35328).
    fn default() -> Self {
        Self::GUILD_MESSAGES | Self::GUILD_MESSAGE_TYPING | Self::MESSAGE_CONTENT
    }
}

/// The `d` payload of an IDENTIFY envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Identify {
    pub token: String,
    pub intents: u64,
    pub properties: ConnectionProperties,
    pub presence: Option<serde_json::Value>,
}

/// Client metadata. Discord only requires the keys to be present.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionProperties {
    #[serde(rename = "$os")]
    pub os: String,
    #[serde(rename = "$browser")]
    pub browser: String,
    #[serde(rename = "$device")]
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: env!("CARGO_PKG_NAME").to_string(),
            device: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

/// The `d` payload of an op-10 HELLO envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Hello {
    /// Heartbeat period in milliseconds.
    pub heartbeat_interval: u64,
}

/// Response body of `GET /gateway`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayInfo {
    pub url: String,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    #[serde(default)]
    pub id: Snowflake,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
    pub global_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A MESSAGE_CREATE payload, trimmed to what the router needs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct MessageReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Snowflake>,
}

// ---------------------------------------------------------------------------
// Embed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Components (link buttons only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_repr, Serialize_repr)]
#[repr(u8)]
pub enum ComponentType {
    ActionRow = 1,
    Button = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_repr, Serialize_repr)]
#[repr(u8)]
pub enum ButtonStyle {
    Primary = 1,
    Secondary = 2,
    Success = 3,
    Danger = 4,
    Link = 5,
}

/// Discord allows at most five buttons per action row.
pub const MAX_BUTTONS_PER_ROW: usize = 5;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub components: Vec<Button>,
}

impl ActionRow {
    pub fn new(components: Vec<Button>) -> Self {
        Self {
            kind: ComponentType::ActionRow,
            components,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub style: ButtonStyle,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Button {
    /// A style-5 button that opens `url` in the user's browser.
    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: ComponentType::Button,
            style: ButtonStyle::Link,
            label: label.into(),
            url: Some(url.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound message body (for REST POST /channels/{id}/messages)
// ---------------------------------------------------------------------------

/// Body for creating a new message. Only non-empty fields are serialised.
///
/// ```ignore
/// let msg = CreateMessage::new()
///     .content("Hello!")
///     .reply_to("123456789", "987654321");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub tts: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
}

impl CreateMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, text: impl Into<String>) -> Self {
        self.content = Some(text.into());
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn component_row(mut self, row: ActionRow) -> Self {
        self.components.push(row);
        self
    }

    /// Mark the message as a reply to another message.
    pub fn reply_to(mut self, channel_id: impl Into<Snowflake>, message_id: impl Into<Snowflake>) -> Self {
        self.message_reference = Some(MessageReference {
            message_id: Some(message_id.into()),
            channel_id: Some(channel_id.into()),
        });
        self
    }
}

// ---------------------------------------------------------------------------
// READY event payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadyEvent {
    #[serde(default)]
    pub v: u8,
    pub user: User,
    #[serde(default)]
    pub session_id: String,
}

// ---------------------------------------------------------------------------
// Interactions
// ---------------------------------------------------------------------------

/// An INTERACTION_CREATE payload. Only the fields needed to answer it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Interaction {
    pub id: Snowflake,
    pub token: String,
    #[serde(rename = "type", default)]
    pub kind: Option<u8>,
    pub channel_id: Option<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: InteractionCallbackType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionCallbackData>,
}

impl InteractionResponse {
    /// A type-4 response that posts `content` as a channel message.
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: InteractionCallbackType::ChannelMessageWithSource,
            data: Some(InteractionCallbackData {
                content: Some(content.into()),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_repr, Serialize_repr)]
#[repr(u8)]
pub enum InteractionCallbackType {
    ChannelMessageWithSource = 4,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionCallbackData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serde_test::{assert_ser_tokens, Token};

    #[test]
    fn gateway_payload_roundtrip_preserves_fields() {
        let payload = GatewayPayload {
            op: 0,
            d: Some(json!({"content": "hi", "nested": [1, 2, 3]})),
            s: Some(42),
            t: Some("MESSAGE_CREATE".to_string()),
        };
        let encoded = serde_json::to_string(&payload).unwrap();
        let decoded: GatewayPayload = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn gateway_payload_roundtrip_keeps_null_and_absent_data_apart() {
        for d in [None, Some(serde_json::Value::Null)] {
            let payload = GatewayPayload {
                op: 1,
                d: d.clone(),
                s: None,
                t: None,
            };
            let encoded = serde_json::to_string(&payload).unwrap();
            let decoded: GatewayPayload = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded.d, d, "encoded as {}", encoded);
        }

        let explicit: GatewayPayload = serde_json::from_str(r#"{"op":1,"d":null}"#).unwrap();
        assert_eq!(explicit.d, Some(serde_json::Value::Null));
    }

    #[test]
    fn gateway_payload_deserializes_with_missing_fields() {
        let payload: GatewayPayload = serde_json::from_str(r#"{"op":11}"#).unwrap();
        assert_eq!(payload.op, 11);
        assert!(payload.d.is_none());
        assert!(payload.s.is_none());
        assert!(payload.t.is_none());
    }

    #[test]
    fn heartbeat_tokens_carry_null_sequence() {
        assert_ser_tokens(
            &GatewayPayload::heartbeat(None),
            &[
                Token::Struct {
                    name: "GatewayPayload",
                    len: 4,
                },
                Token::Str("op"),
                Token::U8(1),
                Token::Str("d"),
                Token::Some,
                Token::Unit,
                Token::Str("s"),
                Token::None,
                Token::Str("t"),
                Token::None,
                Token::StructEnd,
            ],
        );
    }

    #[test]
    fn heartbeat_carries_sequence() {
        let value = serde_json::to_value(GatewayPayload::heartbeat(Some(7))).unwrap();
        assert_eq!(value["op"], 1);
        assert_eq!(value["d"], 7);
    }

    #[test]
    fn heartbeat_without_sequence_sends_explicit_null() {
        let encoded = serde_json::to_string(&GatewayPayload::heartbeat(None)).unwrap();
        assert!(encoded.contains(r#""d":null"#), "got {}", encoded);
    }

    #[test]
    fn identify_payload_shape() {
        let identify = Identify {
            token: "secret".to_string(),
            intents: Intents::default().bits(),
            properties: ConnectionProperties {
                os: "linux".to_string(),
                browser: "chrome".to_string(),
                device: "chrome".to_string(),
            },
            presence: None,
        };
        let value = serde_json::to_value(GatewayPayload::identify(&identify).unwrap()).unwrap();
        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["token"], "secret");
        assert_eq!(value["d"]["intents"], 35328);
        assert_eq!(value["d"]["properties"]["$os"], "linux");
        assert_eq!(value["d"]["properties"]["$browser"], "chrome");
        assert_eq!(value["d"]["properties"]["$device"], "chrome");
        assert!(value["d"]["presence"].is_null());
    }

    #[test]
    fn opcode_mapping() {
        assert_eq!(OpCode::from_u8(10), Some(OpCode::Hello));
        assert_eq!(OpCode::from_u8(0), Some(OpCode::Dispatch));
        assert_eq!(OpCode::from_u8(3), None);
        assert_eq!(OpCode::Heartbeat as u8, 1);
    }

    #[test]
    fn default_intents_match_message_listening_bot() {
        assert_eq!(Intents::default().bits(), 35328);
        assert!(Intents::default().contains(Intents::MESSAGE_CONTENT));
    }

    #[test]
    fn create_message_serializes_only_set_fields() {
        let msg = CreateMessage::new().content("test");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"content":"test"}"#);
    }

    #[test]
    fn create_message_reply_reference() {
        let msg = CreateMessage::new()
            .component_row(ActionRow::new(vec![Button::link("Spotify", "https://open.spotify.com/x")]))
            .reply_to("c1", "m1");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["message_reference"]["message_id"], "m1");
        assert_eq!(value["message_reference"]["channel_id"], "c1");
        assert_eq!(value["components"][0]["type"], 1);
        assert_eq!(value["components"][0]["components"][0]["type"], 2);
        assert_eq!(value["components"][0]["components"][0]["style"], 5);
        assert!(value.get("content").is_none());
    }

    #[test]
    fn message_deserializes_bot_flag_default() {
        let msg: Message = serde_json::from_value(json!({
            "id": "1",
            "channel_id": "2",
            "author": {"id": "3", "username": "alice"},
            "content": "ping",
            "timestamp": "2024-01-01T00:00:00Z",
        }))
        .unwrap();
        assert!(!msg.author.bot);
        assert_eq!(msg.content, "ping");
        assert!(msg.guild_id.is_none());
    }

    #[test]
    fn interaction_response_message_shape() {
        let value = serde_json::to_value(InteractionResponse::message("Hello")).unwrap();
        assert_eq!(value, json!({"type": 4, "data": {"content": "Hello"}}));
    }
}
