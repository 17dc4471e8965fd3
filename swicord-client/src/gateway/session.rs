//! WebSocket session with the gateway.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use swicord_common::{GatewayCommand, PresenceConfig};

use crate::config::{Credentials, GatewayConfig};
use crate::error::{Error, Result};
use crate::log_sink::LogSink;
use crate::presence::build_presence_update;

use super::machine::{Action, ConnectionStatus, SessionMachine, SessionState, SocketEvent};

/// Upper bound for a whole `connect`, including closing a previous socket.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for flushing the close frame on disconnect.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Gateway session handle.
///
/// Cheap to clone; all clones drive the same connection. Every state change,
/// socket write and log line goes through one lock, so observers and the log
/// sink see events in the order they happened.
#[derive(Clone)]
pub struct GatewaySession {
    shared: Arc<Shared>,
}

struct Shared {
    config: GatewayConfig,
    sink: Arc<dyn LogSink>,
    inner: Mutex<Inner>,
}

struct Inner {
    machine: SessionMachine,
    /// Bumped whenever a socket is torn down or a new one is started.
    /// Background tasks only act while their generation is current.
    generation: u64,
    writer: Option<WsWriter>,
    reader: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    status: ConnectionStatus,
    observers: Vec<mpsc::UnboundedSender<ConnectionStatus>>,
}

impl GatewaySession {
    pub fn new(config: GatewayConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                sink,
                inner: Mutex::new(Inner {
                    machine: SessionMachine::new(),
                    generation: 0,
                    writer: None,
                    reader: None,
                    heartbeat: None,
                    status: ConnectionStatus::disconnected(),
                    observers: Vec::new(),
                }),
            }),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.shared.inner.lock().await.machine.state()
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.shared.inner.lock().await.status.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.inner.lock().await.status.connected
    }

    /// Whether a heartbeat timer is running for the current socket.
    pub async fn heartbeat_running(&self) -> bool {
        self.shared
            .inner
            .lock()
            .await
            .heartbeat
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Status changes from now on, in the order they happen.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<ConnectionStatus> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.inner.lock().await.observers.push(tx);
        rx
    }

    /// Open a new socket, dropping any existing one first.
    ///
    /// Returns once the socket is open or the attempt failed; the handshake
    /// continues in the background. Failures are logged and published before
    /// they are returned, and leave the session `Disconnected`.
    pub async fn connect(&self, credentials: &Credentials) -> Result<()> {
        let deadline = Instant::now() + CONNECT_TIMEOUT;
        let mut inner = self.shared.inner.lock().await;

        if self.shared.config.spoof {
            let actions = inner.machine.simulate(true);
            self.shared.apply(&mut inner, actions).await;
            return Ok(());
        }

        self.shared.log("Connecting to gateway...");
        if inner.machine.state() != SessionState::Disconnected {
            self.shared.close_socket(&mut inner, deadline).await;
            let actions = inner.machine.reset();
            self.shared.apply(&mut inner, actions).await;
        }

        let token = credentials.token();
        if token.is_empty() {
            return Err(self.shared.reject(Error::Configuration("missing token".to_string())));
        }
        let request = match self.shared.config.url.as_str().into_client_request() {
            Ok(request) => request,
            Err(e) => {
                return Err(self.shared.reject(Error::Configuration(format!(
                    "invalid gateway URL '{}': {}",
                    self.shared.config.url, e
                ))));
            }
        };
        let uri = request.uri();
        if !matches!(uri.scheme_str(), Some("ws" | "wss")) || uri.host().is_none() {
            return Err(self.shared.reject(Error::Configuration(format!(
                "invalid gateway URL '{}': expected ws:// or wss:// with a host",
                self.shared.config.url
            ))));
        }

        inner.generation += 1;
        let generation = inner.generation;
        let actions = inner.machine.begin_connect(token);
        self.shared.apply(&mut inner, actions).await;
        drop(inner);

        let result = timeout_at(deadline, connect_async(request)).await;

        let mut inner = self.shared.inner.lock().await;
        if inner.generation != generation {
            tracing::debug!("Connection attempt superseded, dropping socket");
            return Ok(());
        }

        let cause = match result {
            Ok(Ok((stream, _response))) => {
                let (writer, reader) = stream.split();
                inner.writer = Some(writer);
                inner.reader = Some(tokio::spawn(read_loop(
                    Arc::downgrade(&self.shared),
                    generation,
                    reader,
                )));
                let actions = inner.machine.handle(SocketEvent::Opened);
                self.shared.apply(&mut inner, actions).await;
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("connect timed out after {}s", CONNECT_TIMEOUT.as_secs()),
        };

        let actions = inner.machine.handle(SocketEvent::Error(cause.clone()));
        self.shared.apply(&mut inner, actions).await;
        Err(Error::Transport(cause))
    }

    /// Stop the heartbeat, close the socket and go `Disconnected`.
    ///
    /// Once this returns, no heartbeat or socket event of the old connection
    /// has any further effect.
    pub async fn disconnect(&self) {
        let mut inner = self.shared.inner.lock().await;

        if self.shared.config.spoof {
            let actions = inner.machine.simulate(false);
            self.shared.apply(&mut inner, actions).await;
            return;
        }

        self.shared.log("Disconnecting from gateway");
        self.shared
            .close_socket(&mut inner, Instant::now() + CLOSE_TIMEOUT)
            .await;
        let actions = inner.machine.reset();
        self.shared.apply(&mut inner, actions).await;
    }

    /// Write a frame if a socket is open; otherwise log and drop it.
    ///
    /// Returns whether the frame was written.
    pub async fn send(&self, command: GatewayCommand) -> bool {
        let mut inner = self.shared.inner.lock().await;

        if self.shared.config.spoof {
            self.shared.log(&format!(
                "[SPOOF MODE] Suppressed sending {} (op {})",
                command.name(),
                command.opcode()
            ));
            return false;
        }

        match self.shared.write(&mut inner, &command).await {
            Ok(sent) => sent,
            Err(cause) => {
                let actions = inner.machine.handle(SocketEvent::Error(cause));
                self.shared.apply(&mut inner, actions).await;
                false
            }
        }
    }

    /// Build a presence update from `config` and send it.
    pub async fn update_presence(&self, config: &PresenceConfig) -> bool {
        self.update_presence_at(config, chrono::Utc::now().timestamp_millis())
            .await
    }

    /// Same as [`update_presence`](Self::update_presence) with an explicit
    /// timestamp in Unix milliseconds.
    pub async fn update_presence_at(&self, config: &PresenceConfig, now_ms: i64) -> bool {
        let update = build_presence_update(config, now_ms);
        self.send(GatewayCommand::PresenceUpdate(update)).await
    }
}

impl Shared {
    fn log(&self, line: &str) {
        self.sink.append(line);
    }

    fn reject(&self, error: Error) -> Error {
        self.log(&error.to_string());
        error
    }

    /// Run the actions of a transition, in order. Actions caused by running
    /// them (a failed write, the identify going out) are queued behind.
    async fn apply(self: &Arc<Self>, inner: &mut Inner, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();

        while let Some(action) = queue.pop_front() {
            match action {
                Action::Log(line) => self.log(&line),
                Action::Publish(status) => inner.publish(status),
                Action::Teardown => drop(inner.teardown()),
                Action::StartHeartbeat(config) => {
                    if let Some(handle) = inner.heartbeat.take() {
                        handle.abort();
                    }
                    inner.heartbeat = Some(tokio::spawn(heartbeat_loop(
                        Arc::downgrade(self),
                        inner.generation,
                        config.period(),
                    )));
                }
                Action::Send(command) => {
                    let identify = matches!(command, GatewayCommand::Identify(_));
                    match self.write(inner, &command).await {
                        Ok(true) if identify => queue.extend(inner.machine.identify_sent()),
                        Ok(_) => {}
                        Err(cause) => queue.extend(inner.machine.handle(SocketEvent::Error(cause))),
                    }
                }
            }
        }
    }

    /// `Ok(false)` when there is no socket or the command cannot be encoded,
    /// `Err` with the cause when the socket write fails.
    async fn write(
        &self,
        inner: &mut Inner,
        command: &GatewayCommand,
    ) -> std::result::Result<bool, String> {
        let Some(writer) = inner.writer.as_mut() else {
            self.log(&format!(
                "Not connected, dropping {} (op {})",
                command.name(),
                command.opcode()
            ));
            return Ok(false);
        };

        let json = match command.to_json() {
            Ok(json) => json,
            Err(e) => {
                self.log(&format!("Failed to encode {} payload: {}", command.name(), e));
                return Ok(false);
            }
        };

        self.log(&format!("Sending {} (op {})", command.name(), command.opcode()));
        if let GatewayCommand::PresenceUpdate(_) = command {
            self.log(&format!("Payload: {}", json));
        }

        writer
            .send(Message::Text(json))
            .await
            .map(|()| true)
            .map_err(|e| e.to_string())
    }

    /// Tear down the socket and try to send a close frame on the way out,
    /// giving up at `deadline` or after `CLOSE_TIMEOUT`, whichever is first.
    async fn close_socket(&self, inner: &mut Inner, deadline: Instant) {
        if let Some(mut writer) = inner.teardown() {
            let deadline = deadline.min(Instant::now() + CLOSE_TIMEOUT);
            if timeout_at(deadline, writer.close()).await.is_err() {
                tracing::debug!("Timed out sending close frame");
            }
        }
    }
}

impl Inner {
    /// Publish-on-change, in order, to every live observer.
    fn publish(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        self.status = status.clone();
        self.observers.retain(|tx| tx.send(status.clone()).is_ok());
    }

    /// Invalidate background tasks and hand back the writer, if any.
    fn teardown(&mut self) -> Option<WsWriter> {
        self.generation += 1;
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
        self.writer.take()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Feed socket events into the state machine until the socket goes away or
/// the connection is superseded.
async fn read_loop(shared: Weak<Shared>, generation: u64, mut reader: WsReader) {
    loop {
        let event = match reader.next().await {
            Some(Ok(Message::Text(text))) => SocketEvent::TextFrame(text),
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.into_owned()))
                    .unwrap_or((1005, String::new()));
                SocketEvent::Closed { code, reason }
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => SocketEvent::Error(e.to_string()),
            None => SocketEvent::Closed {
                code: 1006,
                reason: "connection dropped".to_string(),
            },
        };
        let terminal = !matches!(event, SocketEvent::TextFrame(_));

        let Some(shared) = shared.upgrade() else {
            return;
        };
        let mut inner = shared.inner.lock().await;
        if inner.generation != generation {
            return;
        }
        let actions = inner.machine.handle(event);
        shared.apply(&mut inner, actions).await;

        if terminal || inner.generation != generation {
            return;
        }
    }
}

/// First beat one full period after Hello, then every period. Boxed because
/// it is spawned from `Shared::apply`, which it also awaits.
fn heartbeat_loop(shared: Weak<Shared>, generation: u64, period: Duration) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut inner = shared.inner.lock().await;
            if inner.generation != generation {
                return;
            }
            shared
                .apply(&mut inner, vec![Action::Send(GatewayCommand::Heartbeat)])
                .await;
        }
    })
}
