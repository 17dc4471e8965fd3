//! Handshake state machine.
//!
//! Pure: socket events go in, actions come out. The session executes the
//! actions against the real socket, which keeps every transition testable
//! without a network.

use std::time::Duration;

use swicord_common::{GatewayCommand, GatewayMessage, Identify};

use crate::error::Error;

/// Heartbeat intervals below this are raised to it.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Heartbeat intervals above this are lowered to it.
pub const MAX_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingHello,
    Identifying,
    Ready,
    /// Transient: a fault always collapses to `Disconnected` within the same
    /// transition.
    Faulted,
}

/// What observers see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub status_text: String,
}

impl ConnectionStatus {
    pub fn new(connected: bool, status_text: impl Into<String>) -> Self {
        Self {
            connected,
            status_text: status_text.into(),
        }
    }

    pub fn disconnected() -> Self {
        Self::new(false, "Disconnected")
    }
}

/// Heartbeat timing taken from `Hello`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartbeatConfig {
    /// Seconds between heartbeats.
    pub interval: f64,
}

impl HeartbeatConfig {
    pub fn from_millis(millis: f64) -> Self {
        Self {
            interval: (millis / 1000.0).max(0.0),
        }
    }

    /// Timer period, clamped to `MIN_HEARTBEAT_INTERVAL..=MAX_HEARTBEAT_INTERVAL`.
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval)
            .unwrap_or(MAX_HEARTBEAT_INTERVAL)
            .clamp(MIN_HEARTBEAT_INTERVAL, MAX_HEARTBEAT_INTERVAL)
    }
}

/// Socket events, as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Opened,
    Closed { code: u16, reason: String },
    TextFrame(String),
    Error(String),
}

/// Side effects requested by a transition, to be executed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Log(String),
    Send(GatewayCommand),
    StartHeartbeat(HeartbeatConfig),
    /// Stop the heartbeat and drop the socket.
    Teardown,
    Publish(ConnectionStatus),
}

#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    heartbeat: Option<HeartbeatConfig>,
    token: String,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            heartbeat: None,
            token: String::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn heartbeat(&self) -> Option<HeartbeatConfig> {
        self.heartbeat
    }

    /// `Disconnected -> Connecting`. The token is kept for the identify.
    pub fn begin_connect(&mut self, token: &str) -> Vec<Action> {
        self.token = token.to_string();
        self.heartbeat = None;
        self.transition(SessionState::Connecting);
        vec![Action::Publish(ConnectionStatus::new(false, "Connecting"))]
    }

    /// Any state -> `Disconnected`.
    pub fn reset(&mut self) -> Vec<Action> {
        self.heartbeat = None;
        self.token.clear();
        self.transition(SessionState::Disconnected);
        vec![Action::Teardown, Action::Publish(ConnectionStatus::disconnected())]
    }

    /// Offline stand-in for a real connect or disconnect; no protocol runs.
    pub fn simulate(&mut self, connected: bool) -> Vec<Action> {
        if connected {
            self.transition(SessionState::Ready);
            vec![
                Action::Log("[SPOOF MODE] Skipping connection. Faking connected state.".to_string()),
                Action::Publish(ConnectionStatus::new(true, "Connected (Spoof)")),
            ]
        } else {
            self.transition(SessionState::Disconnected);
            vec![
                Action::Log("[SPOOF MODE] Skipping disconnect. Faking disconnected state.".to_string()),
                Action::Publish(ConnectionStatus::new(false, "Disconnected (Spoof)")),
            ]
        }
    }

    /// `Identifying -> Ready`, once the identify frame is on the wire.
    pub fn identify_sent(&mut self) -> Vec<Action> {
        if self.state != SessionState::Identifying {
            return vec![];
        }
        self.transition(SessionState::Ready);
        vec![Action::Publish(ConnectionStatus::new(true, "Ready, heartbeat started"))]
    }

    pub fn handle(&mut self, event: SocketEvent) -> Vec<Action> {
        match event {
            SocketEvent::Opened => {
                if self.state != SessionState::Connecting {
                    return vec![Action::Log(
                        Error::Protocol(format!("socket opened while {:?}", self.state)).to_string(),
                    )];
                }
                self.transition(SessionState::AwaitingHello);
                vec![
                    Action::Log("WebSocket connected".to_string()),
                    Action::Publish(ConnectionStatus::new(true, "Connected, awaiting hello")),
                ]
            }
            SocketEvent::Closed { code, reason } => self.fault(
                format!("WebSocket disconnected: Code={}, Reason={}", code, reason),
                ConnectionStatus::new(false, format!("Disconnected (code {})", code)),
            ),
            SocketEvent::Error(cause) => self.fault(
                format!("WebSocket error: {}", cause),
                ConnectionStatus::new(false, format!("Error: {}", cause)),
            ),
            SocketEvent::TextFrame(text) => self.handle_text(&text),
        }
    }

    fn handle_text(&mut self, text: &str) -> Vec<Action> {
        let message = match GatewayMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                return vec![Action::Log(format!("Failed to parse gateway message: {}", e))];
            }
        };

        let received = match (&message.t, message.op) {
            (Some(event), _) => format!("Received event: {}", event),
            (None, Some(op)) => format!("Received op code: {}", op),
            (None, None) => "Received gateway message".to_string(),
        };
        let mut actions = vec![Action::Log(received)];

        if message.is_hello() {
            actions.extend(self.handle_hello(&message));
        }
        actions
    }

    fn handle_hello(&mut self, message: &GatewayMessage) -> Vec<Action> {
        if self.state != SessionState::AwaitingHello {
            let error = Error::Protocol(format!("unexpected Hello while {:?}", self.state));
            return vec![Action::Log(error.to_string())];
        }
        let hello = match message.hello() {
            Ok(hello) => hello,
            Err(e) => {
                let error = Error::Protocol(format!("invalid Hello payload: {}", e));
                return vec![Action::Log(error.to_string())];
            }
        };

        let heartbeat = HeartbeatConfig::from_millis(hello.heartbeat_interval);
        self.heartbeat = Some(heartbeat);
        self.transition(SessionState::Identifying);

        // Identify goes out before the heartbeat timer exists.
        vec![
            Action::Send(GatewayCommand::Identify(Identify::new(self.token.clone()))),
            Action::StartHeartbeat(heartbeat),
            Action::Log(format!(
                "Received Hello, started heartbeat: {}s",
                heartbeat.interval
            )),
        ]
    }

    fn fault(&mut self, line: String, status: ConnectionStatus) -> Vec<Action> {
        self.transition(SessionState::Faulted);
        self.heartbeat = None;
        self.transition(SessionState::Disconnected);
        vec![Action::Log(line), Action::Teardown, Action::Publish(status)]
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "Session state transition");
            self.state = next;
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn awaiting_hello() -> SessionMachine {
        let mut machine = SessionMachine::new();
        machine.begin_connect("token");
        machine.handle(SocketEvent::Opened);
        machine
    }

    fn text(frame: &str) -> SocketEvent {
        SocketEvent::TextFrame(frame.to_string())
    }

    fn logs(actions: &[Action]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Log(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_connect_then_open_sends_nothing() {
        let mut machine = SessionMachine::new();
        machine.begin_connect("token");
        assert_eq!(machine.state(), SessionState::Connecting);

        let actions = machine.handle(SocketEvent::Opened);
        assert_eq!(machine.state(), SessionState::AwaitingHello);
        assert!(!actions.iter().any(|a| matches!(a, Action::Send(_))));
    }

    #[test]
    fn test_hello_sends_identify_before_heartbeat() {
        let mut machine = awaiting_hello();
        let actions = machine.handle(text(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#));

        assert_eq!(machine.state(), SessionState::Identifying);
        assert_eq!(machine.heartbeat(), Some(HeartbeatConfig { interval: 41.25 }));

        let identify_at = actions
            .iter()
            .position(|a| matches!(a, Action::Send(GatewayCommand::Identify(_))))
            .unwrap();
        let heartbeat_at = actions
            .iter()
            .position(|a| matches!(a, Action::StartHeartbeat(_)))
            .unwrap();
        assert!(identify_at < heartbeat_at);

        let identifies = actions
            .iter()
            .filter(|a| matches!(a, Action::Send(GatewayCommand::Identify(_))))
            .count();
        assert_eq!(identifies, 1);
        assert!(!actions.iter().any(|a| matches!(a, Action::Send(GatewayCommand::Heartbeat))));

        match &actions[identify_at] {
            Action::Send(GatewayCommand::Identify(identify)) => {
                assert_eq!(identify.token, "token");
                assert_eq!(identify.intents, 513);
            }
            other => panic!("Expected Identify, got {:?}", other),
        }
    }

    #[test]
    fn test_identify_sent_moves_to_ready() {
        let mut machine = awaiting_hello();
        machine.handle(text(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#));

        let actions = machine.identify_sent();
        assert_eq!(machine.state(), SessionState::Ready);
        assert_eq!(
            actions,
            vec![Action::Publish(ConnectionStatus::new(true, "Ready, heartbeat started"))]
        );
    }

    #[test]
    fn test_malformed_frame_logs_once_and_keeps_state() {
        let mut machine = awaiting_hello();
        let actions = machine.handle(text("this is not json"));

        assert_eq!(machine.state(), SessionState::AwaitingHello);
        assert_eq!(actions.len(), 1);
        assert!(logs(&actions)[0].starts_with("Failed to parse gateway message"));
    }

    #[test]
    fn test_events_and_opcodes_only_log() {
        let mut machine = awaiting_hello();
        machine.handle(text(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#));
        machine.identify_sent();

        let actions = machine.handle(text(r#"{"op":0,"t":"READY","s":1,"d":{}}"#));
        assert_eq!(logs(&actions), vec!["Received event: READY"]);
        assert_eq!(actions.len(), 1);

        let actions = machine.handle(text(r#"{"op":11}"#));
        assert_eq!(logs(&actions), vec!["Received op code: 11"]);

        let actions = machine.handle(text(r#"{"d":{}}"#));
        assert_eq!(logs(&actions), vec!["Received gateway message"]);

        assert_eq!(machine.state(), SessionState::Ready);
    }

    #[test]
    fn test_second_hello_is_a_protocol_error() {
        let mut machine = awaiting_hello();
        machine.handle(text(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#));
        machine.identify_sent();

        let actions = machine.handle(text(r#"{"op":10,"d":{"heartbeat_interval":1000}}"#));
        assert_eq!(machine.state(), SessionState::Ready);
        assert_eq!(machine.heartbeat(), Some(HeartbeatConfig { interval: 41.25 }));
        assert!(!actions.iter().any(|a| matches!(a, Action::Send(_))));
        assert!(logs(&actions)[1].starts_with("Protocol error"));
    }

    #[test]
    fn test_hello_without_interval_is_dropped() {
        let mut machine = awaiting_hello();
        let actions = machine.handle(text(r#"{"op":10,"d":{}}"#));

        assert_eq!(machine.state(), SessionState::AwaitingHello);
        assert!(machine.heartbeat().is_none());
        assert!(!actions.iter().any(|a| matches!(a, Action::Send(_))));
    }

    #[test]
    fn test_socket_error_collapses_to_disconnected() {
        let mut machine = awaiting_hello();
        let actions = machine.handle(SocketEvent::Error("broken pipe".to_string()));

        assert_eq!(machine.state(), SessionState::Disconnected);
        assert!(actions.contains(&Action::Teardown));
        assert!(actions.contains(&Action::Publish(ConnectionStatus::new(false, "Error: broken pipe"))));
    }

    #[test]
    fn test_socket_close_collapses_to_disconnected() {
        let mut machine = awaiting_hello();
        machine.handle(text(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#));
        machine.identify_sent();

        let actions = machine.handle(SocketEvent::Closed {
            code: 4004,
            reason: "Authentication failed.".to_string(),
        });
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert!(machine.heartbeat().is_none());
        assert_eq!(
            logs(&actions),
            vec!["WebSocket disconnected: Code=4004, Reason=Authentication failed."]
        );
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut machine = awaiting_hello();
        machine.reset();
        assert_eq!(machine.state(), SessionState::Disconnected);

        let actions = machine.reset();
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert_eq!(
            actions,
            vec![Action::Teardown, Action::Publish(ConnectionStatus::disconnected())]
        );
    }

    #[test]
    fn test_simulate_never_sends() {
        let mut machine = SessionMachine::new();
        let actions = machine.simulate(true);
        assert_eq!(machine.state(), SessionState::Ready);
        assert!(actions.contains(&Action::Publish(ConnectionStatus::new(true, "Connected (Spoof)"))));

        let actions = machine.simulate(false);
        assert_eq!(machine.state(), SessionState::Disconnected);
        assert!(!actions.iter().any(|a| matches!(a, Action::Send(_) | Action::Teardown)));
    }

    #[test]
    fn test_heartbeat_period_floor() {
        assert_eq!(HeartbeatConfig::from_millis(41250.0).period(), Duration::from_millis(41250));
        assert_eq!(HeartbeatConfig::from_millis(0.0).period(), MIN_HEARTBEAT_INTERVAL);
        assert_eq!(HeartbeatConfig::from_millis(-5.0).interval, 0.0);
    }

    #[test]
    fn test_heartbeat_period_ceiling() {
        assert_eq!(HeartbeatConfig::from_millis(1e22).period(), MAX_HEARTBEAT_INTERVAL);
        assert_eq!(HeartbeatConfig::from_millis(f64::MAX).period(), MAX_HEARTBEAT_INTERVAL);

        // Far beyond the cap, yet the timer start must not overflow.
        let period = HeartbeatConfig::from_millis(1e22).period();
        assert!(tokio::time::Instant::now().checked_add(period).is_some());
    }

    #[test]
    fn test_huge_hello_interval_still_identifies() {
        let mut machine = awaiting_hello();
        let actions = machine.handle(text(r#"{"op":10,"d":{"heartbeat_interval":1e22}}"#));

        assert_eq!(machine.state(), SessionState::Identifying);
        let period = actions.iter().find_map(|a| match a {
            Action::StartHeartbeat(config) => Some(config.period()),
            _ => None,
        });
        assert_eq!(period, Some(MAX_HEARTBEAT_INTERVAL));
    }
}
