//! Gateway wire protocol types.
//!
//! Frames are JSON text messages over a WebSocket. Every frame carries an
//! `op` opcode and a `d` payload; dispatch frames also carry an event name in
//! `t`.
//!
//! ## Connection Flow
//!
//! 1. Client opens the socket and waits (sends nothing)
//! 2. Gateway sends `Hello` (op 10) with the heartbeat interval in milliseconds
//! 3. Client answers with `Identify` (op 2) right away, then starts heartbeating
//! 4. Client sends `Heartbeat` (op 1) every interval until the socket goes away
//! 5. Client sends `PresenceUpdate` (op 3) whenever the presence changes
//!
//! Heartbeat ACKs (op 11) are not tracked.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Default gateway endpoint (API v9, JSON encoding).
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=9&encoding=json";

/// Default endpoint for the HTTP presence fallback.
pub const DEFAULT_PRESENCE_ENDPOINT: &str = "https://discord.com/api/v9/presences";

/// Gateway intents requested on identify (GUILDS | GUILD_MESSAGES).
pub const IDENTIFY_INTENTS: u64 = 513;

/// Member count above which the gateway stops sending offline members.
pub const LARGE_THRESHOLD: u32 = 250;

/// Browser and device name reported in the identify properties.
pub const CLIENT_NAME: &str = "SwicordBot";

/// Activity type "Playing".
pub const ACTIVITY_TYPE_PLAYING: u8 = 0;

pub const STATUS_ONLINE: &str = "online";

/// Gateway opcodes.
pub mod opcode {
    pub const DISPATCH: u64 = 0;
    pub const HEARTBEAT: u64 = 1;
    pub const IDENTIFY: u64 = 2;
    pub const PRESENCE_UPDATE: u64 = 3;
    pub const RECONNECT: u64 = 7;
    pub const INVALID_SESSION: u64 = 9;
    pub const HELLO: u64 = 10;
    pub const HEARTBEAT_ACK: u64 = 11;
}

// ============================================================================
// Outbound
// ============================================================================

/// Frames sent from the client to the gateway.
///
/// Serializes as `{"op": <opcode>, "d": <payload>}`.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCommand {
    /// Liveness signal, `d: null`.
    Heartbeat,
    /// Session handshake, sent once in reply to `Hello`.
    Identify(Identify),
    /// Replace the current presence.
    PresenceUpdate(PresenceUpdate),
}

impl GatewayCommand {
    pub fn opcode(&self) -> u64 {
        match self {
            GatewayCommand::Heartbeat => opcode::HEARTBEAT,
            GatewayCommand::Identify(_) => opcode::IDENTIFY,
            GatewayCommand::PresenceUpdate(_) => opcode::PRESENCE_UPDATE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GatewayCommand::Heartbeat => "Heartbeat",
            GatewayCommand::Identify(_) => "Identify",
            GatewayCommand::PresenceUpdate(_) => "Presence Update",
        }
    }

    /// Encode to the wire text format.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for GatewayCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut frame = serializer.serialize_struct("GatewayCommand", 2)?;
        frame.serialize_field("op", &self.opcode())?;
        match self {
            GatewayCommand::Heartbeat => frame.serialize_field("d", &Option::<()>::None)?,
            GatewayCommand::Identify(identify) => frame.serialize_field("d", identify)?,
            GatewayCommand::PresenceUpdate(update) => frame.serialize_field("d", update)?,
        }
        frame.end()
    }
}

/// Identify payload (op 2).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Identify {
    pub token: String,
    pub intents: u64,
    pub properties: ConnectionProperties,
    pub compress: bool,
    pub large_threshold: u32,
    /// Presence the session starts with.
    pub presence: PresenceUpdate,
}

impl Identify {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            intents: IDENTIFY_INTENTS,
            properties: ConnectionProperties::default(),
            compress: false,
            large_threshold: LARGE_THRESHOLD,
            presence: PresenceUpdate::empty(),
        }
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for Identify {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identify")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("properties", &self.properties)
            .field("compress", &self.compress)
            .field("large_threshold", &self.large_threshold)
            .field("presence", &self.presence)
            .finish()
    }
}

/// Client metadata reported on identify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: CLIENT_NAME.to_string(),
            device: CLIENT_NAME.to_string(),
        }
    }
}

/// Presence update payload (op 3), also embedded in `Identify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    /// Unix time in milliseconds.
    pub since: i64,
    pub activities: Vec<Activity>,
    pub status: String,
    pub afk: bool,
}

impl PresenceUpdate {
    /// Online with no activities.
    pub fn empty() -> Self {
        Self {
            since: 0,
            activities: vec![],
            status: STATUS_ONLINE.to_string(),
            afk: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub timestamps: ActivityTimestamps,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<ActivityButton>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTimestamps {
    /// Unix time in milliseconds.
    pub start: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityButton {
    pub label: String,
    pub url: String,
}

// ============================================================================
// Inbound
// ============================================================================

/// A frame received from the gateway.
///
/// Only `op` and `t` are interpreted; `d` stays opaque until a handler asks
/// for a typed view of it.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayMessage {
    #[serde(default)]
    pub op: Option<u64>,
    /// Event name, only present on dispatch frames.
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub d: serde_json::Value,
}

impl GatewayMessage {
    /// Decode a text frame. Anything that is not a JSON object is rejected.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("frame is not a JSON object"));
        }
        serde_json::from_value(value)
    }

    pub fn is_hello(&self) -> bool {
        self.op == Some(opcode::HELLO)
    }

    /// Typed view of a `Hello` payload.
    pub fn hello(&self) -> serde_json::Result<Hello> {
        Hello::deserialize(&self.d)
    }
}

/// Hello payload (op 10).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Hello {
    /// Milliseconds between heartbeats.
    pub heartbeat_interval: f64,
}

// ============================================================================
// HTTP fallback
// ============================================================================

/// Body of a presence POST on the HTTP fallback path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    pub update: String,
}
