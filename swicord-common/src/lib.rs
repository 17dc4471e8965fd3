//! Swicord Common Types
//!
//! Gateway wire protocol and presence configuration shared by the client
//! library, its binary and its tests.

pub mod presence;
pub mod protocol;

pub use presence::{ActivitySlot, ButtonSlot, PresenceConfig};
pub use protocol::{
    opcode, Activity, ActivityButton, ActivityTimestamps, ConnectionProperties, GatewayCommand,
    GatewayMessage, Hello, Identify, PresenceRequest, PresenceUpdate,
};
