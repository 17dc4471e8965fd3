//! Gateway WebSocket session.
//!
//! [`SessionMachine`] decides what happens on every socket event;
//! [`GatewaySession`] owns the socket and the heartbeat task and carries
//! those decisions out.

mod machine;
mod session;

pub use machine::{
    Action, ConnectionStatus, HeartbeatConfig, SessionMachine, SessionState, SocketEvent,
    MAX_HEARTBEAT_INTERVAL, MIN_HEARTBEAT_INTERVAL,
};
pub use session::{GatewaySession, CONNECT_TIMEOUT};
