//! Connection controller and public client surface.
//!
//! One driver task owns the transport and the session for the lifetime
//! of a connection, including reconnect cycles. The [`Client`] handle
//! submits outgoing lines over a command channel and observes typed
//! events over a broadcast channel, so all protocol work happens on a
//! single logical thread of control.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep_until, timeout, Instant, Sleep};
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;
use crate::error::ClientError;
use crate::event::{DisconnectEvent, ErrorEvent, Event};
use crate::message::Message;
use crate::state::{read_lock, write_lock, ChannelState, StateStore};
use crate::tags::TagMap;
use crate::transport::Transport;

const REGISTER_TIMEOUT: Duration = Duration::from_millis(2000);
const PROBE_REPLY_TIMEOUT: Duration = Duration::from_millis(2000);
const PROBE_INTERVAL: Duration = Duration::from_secs(5 * 60);
const CONFIRM_TIMEOUT: Duration = Duration::from_millis(2000);
const RECONNECT_BASE_INTERVAL: Duration = Duration::from_millis(1000);
const RECONNECT_MAX_INTERVAL: Duration = Duration::from_secs(60);

const DEFAULT_TCP_HOST: &str = "irc.chat.twitch.tv";
const DEFAULT_TLS_PORT: u16 = 6697;
const DEFAULT_TCP_PORT: u16 = 6667;
const DEFAULT_WSS_URL: &str = "wss://irc-ws.chat.twitch.tv:443";
const DEFAULT_WS_URL: &str = "ws://irc-ws.chat.twitch.tv:80";

const CAP_REQ_LINE: &str = "CAP REQ :twitch.tv/tags twitch.tv/commands";
const ANONYMOUS_PASS: &str = "SCHMOOPIIE";
const ANONYMOUS_NICK_PREFIX: &str = "justinfan";

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// No transport open.
    #[default]
    Disconnected,
    /// Transport being opened.
    Connecting,
    /// Transport open, registration in flight.
    Connected,
    /// Registration acknowledged; the session is fully usable.
    Registered,
    /// Waiting out the backoff interval before the next attempt.
    Reconnecting,
}

/// How to reach the server.
#[derive(Debug, Clone)]
pub enum ConnectionKind {
    /// Raw TCP, with TLS when the connection is secure.
    Tcp { host: String, port: u16 },
    /// WebSocket, `ws://` or `wss://`.
    WebSocket { url: String },
}

/// Transport selection and reconnect policy.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub kind: ConnectionKind,
    /// Use TLS for TCP connections; for WebSockets the URL scheme decides.
    pub secure: bool,
    /// Automatically reconnect with capped exponential backoff.
    pub reconnect: bool,
}

impl ConnectionConfig {
    /// TCP to the default chat endpoint.
    pub fn tcp(secure: bool) -> Self {
        ConnectionConfig {
            kind: ConnectionKind::Tcp {
                host: DEFAULT_TCP_HOST.to_string(),
                port: if secure { DEFAULT_TLS_PORT } else { DEFAULT_TCP_PORT },
            },
            secure,
            reconnect: true,
        }
    }

    /// TCP to an explicit host and port.
    pub fn tcp_to(host: impl Into<String>, port: u16, secure: bool) -> Self {
        ConnectionConfig {
            kind: ConnectionKind::Tcp {
                host: host.into(),
                port,
            },
            secure,
            reconnect: true,
        }
    }

    /// WebSocket to the default chat endpoint.
    pub fn websocket(secure: bool) -> Self {
        ConnectionConfig {
            kind: ConnectionKind::WebSocket {
                url: if secure { DEFAULT_WSS_URL } else { DEFAULT_WS_URL }.to_string(),
            },
            secure,
            reconnect: true,
        }
    }

    /// WebSocket to an explicit URL.
    pub fn websocket_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let secure = url.starts_with("wss:");
        ConnectionConfig {
            kind: ConnectionKind::WebSocket { url },
            secure,
            reconnect: true,
        }
    }

    /// Toggle automatic reconnection.
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::websocket(true)
    }
}

/// Client configuration.
///
/// Without a name and token the client connects anonymously: a generated
/// `justinfan` nickname and the fixed anonymous credential.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Login name; anonymous when `None`.
    pub name: Option<String>,
    /// OAuth token, without the `oauth:` prefix; anonymous when `None`.
    pub token: Option<String>,
    pub connection: ConnectionConfig,
}

impl ClientConfig {
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        ClientConfig {
            name: Some(name.into()),
            token: Some(token.into()),
            connection: ConnectionConfig::default(),
        }
    }

    /// Anonymous read-only session.
    pub fn anonymous() -> Self {
        ClientConfig::default()
    }
}

/// Session identity and lifecycle state, owned by the driver task and
/// readable through the [`Client`] accessors.
#[derive(Debug)]
struct Session {
    state: ConnectionState,
    nick: String,
    pass: String,
    reconnect_interval: Duration,
}

enum DriverCommand {
    Send(String),
    Quit,
}

enum ExitReason {
    Quit,
    Error(ClientError),
}

/// An asynchronous chat client.
///
/// Create one with [`Client::new`], subscribe to its event stream, and
/// call [`Client::connect`]. The handle stays usable across disconnects
/// and reconnects.
pub struct Client {
    config: ClientConfig,
    session: Arc<RwLock<Session>>,
    store: Arc<RwLock<StateStore>>,
    events: broadcast::Sender<Event>,
    commands: Option<mpsc::UnboundedSender<DriverCommand>>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Client {
        let nick = config.name.clone().unwrap_or_else(anonymous_nick);
        let pass = match &config.token {
            Some(token) => format!("oauth:{token}"),
            None => ANONYMOUS_PASS.to_string(),
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Client {
            config,
            session: Arc::new(RwLock::new(Session {
                state: ConnectionState::Disconnected,
                nick,
                pass,
                reconnect_interval: RECONNECT_BASE_INTERVAL,
            })),
            store: Arc::new(RwLock::new(StateStore::default())),
            events,
            commands: None,
        }
    }

    /// Subscribe to the event stream.
    ///
    /// Every subscriber sees every event; subscribe before calling
    /// [`Client::connect`] to observe the connection lifecycle from the
    /// start.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        read_lock(&self.session).state
    }

    /// Transport open (registration may still be in flight).
    pub fn connected(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connected | ConnectionState::Registered
        )
    }

    /// Registration acknowledged.
    pub fn registered(&self) -> bool {
        self.state() == ConnectionState::Registered
    }

    /// Current nickname; updated from the server's welcome reply.
    pub fn nick(&self) -> String {
        read_lock(&self.session).nick.clone()
    }

    /// Latest session-wide user state, if received.
    pub fn global_user_state(&self) -> Option<TagMap> {
        read_lock(&self.store).global_user_state().cloned()
    }

    /// Latest state for one channel, if any has been received.
    pub fn channel_state(&self, channel: &str) -> Option<ChannelState> {
        read_lock(&self.store).channel(channel).cloned()
    }

    /// Channels with stored state. These are rejoined after a reconnect.
    pub fn known_channels(&self) -> Vec<String> {
        read_lock(&self.store).channel_names()
    }

    /// Open the transport and perform the registration handshake.
    ///
    /// Resolves once the server acknowledges registration. Fails if a
    /// connection attempt is already in flight, if the transport cannot
    /// be opened, or if registration is not acknowledged within the
    /// registration timeout. With reconnection enabled, a failure here
    /// still leaves the backoff loop running in the background.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.state() != ConnectionState::Disconnected {
            return Err(ClientError::AlreadyConnected);
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        self.commands = Some(cmd_tx);

        let ctx = DriverCtx {
            config: self.config.clone(),
            session: Arc::clone(&self.session),
            store: Arc::clone(&self.store),
            events: self.events.clone(),
        };
        tokio::spawn(run_driver(ctx, cmd_rx, Some(ready_tx)));

        match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::ConnectionClosed),
        }
    }

    /// Close the connection and stop any pending reconnect.
    ///
    /// No-op when nothing is connected. Emits a `disconnect` event
    /// without an error.
    pub fn disconnect(&self) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(DriverCommand::Quit);
        }
    }

    /// Send a raw wire line.
    ///
    /// Returns `false` when the line is empty or no connection is open.
    pub fn send_raw(&self, line: &str) -> bool {
        if line.is_empty() || !self.connected() {
            return false;
        }
        match &self.commands {
            Some(commands) => commands.send(DriverCommand::Send(line.to_string())).is_ok(),
            None => false,
        }
    }

    /// Send a chat message to a channel.
    ///
    /// An empty message is a silent no-op returning `false`.
    pub fn say(&self, channel: &str, message: &str) -> bool {
        if message.is_empty() {
            return false;
        }
        let target = format!("#{}", normalize_channel(channel));
        self.send_raw(&Message::privmsg(&target, message).to_string())
    }

    /// Send a slash command to a channel, e.g. `/timeout ronni 600`.
    pub fn send_command(&self, channel: &str, command: &str, params: &[&str]) -> bool {
        let target = format!("#{}", normalize_channel(channel));
        let trailing = format!("/{} {}", command, params.join(" "));
        self.send_raw(&Message::privmsg(&target, &trailing).to_string())
    }

    /// Join a channel.
    ///
    /// Resolves `true` once the matching `join` event is observed,
    /// `false` if no confirmation arrives within the confirmation
    /// timeout. Errors when not registered.
    pub async fn join(&self, channel: &str) -> Result<bool, ClientError> {
        self.confirm_membership(channel, true).await
    }

    /// Leave a channel. Confirmation mirrors [`Client::join`], resolved
    /// by the matching `part` event.
    pub async fn part(&self, channel: &str) -> Result<bool, ClientError> {
        self.confirm_membership(channel, false).await
    }

    async fn confirm_membership(&self, channel: &str, joining: bool) -> Result<bool, ClientError> {
        if !self.registered() {
            return Err(ClientError::NotRegistered);
        }

        let channel = normalize_channel(channel);
        let target = format!("#{channel}");
        let line = if joining {
            Message::join(&target)
        } else {
            Message::part(&target)
        }
        .to_string();

        // Subscribe before sending so the confirmation cannot be missed.
        let mut events = self.events.subscribe();
        if !self.send_raw(&line) {
            return Ok(false);
        }

        let confirmation = async {
            loop {
                match events.recv().await {
                    Ok(Event::Join(ev)) if joining && ev.channel == channel => return true,
                    Ok(Event::Part(ev)) if !joining && ev.channel == channel => return true,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return false,
                }
            }
        };

        Ok(timeout(CONFIRM_TIMEOUT, confirmation).await.unwrap_or(false))
    }
}

/// Everything the driver task shares with the client handle.
struct DriverCtx {
    config: ClientConfig,
    session: Arc<RwLock<Session>>,
    store: Arc<RwLock<StateStore>>,
    events: broadcast::Sender<Event>,
}

impl DriverCtx {
    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn set_state(&self, state: ConnectionState) {
        write_lock(&self.session).state = state;
    }
}

/// Connection driver: owns the transport through connect, register,
/// dispatch, keepalive, and reconnect cycles.
async fn run_driver(
    ctx: DriverCtx,
    mut commands: mpsc::UnboundedReceiver<DriverCommand>,
    mut ready: Option<oneshot::Sender<Result<(), ClientError>>>,
) {
    let mut rejoin = false;

    'outer: loop {
        ctx.set_state(ConnectionState::Connecting);

        let exit = match open_transport(&ctx.config.connection).await {
            Ok(mut transport) => {
                ctx.set_state(ConnectionState::Connected);
                ctx.emit(Event::Connect);
                drive_connection(&ctx, &mut commands, &mut ready, &mut transport, rejoin).await
            }
            Err(e) => ExitReason::Error(e),
        };

        // Teardown: the transport and watchdog state are dropped with
        // the connection; only identity and backoff survive.
        ctx.set_state(ConnectionState::Disconnected);

        match exit {
            ExitReason::Quit => {
                debug!("disconnected");
                ctx.emit(Event::Disconnect(DisconnectEvent { reason: None }));
                break 'outer;
            }
            ExitReason::Error(e) => {
                warn!(error = %e, "connection lost");
                ctx.emit(Event::Disconnect(DisconnectEvent {
                    reason: Some(e.to_string()),
                }));
                match ready.take() {
                    // A caller is awaiting connect(); the error is theirs.
                    Some(tx) => {
                        let _ = tx.send(Err(e));
                    }
                    None => ctx.emit(Event::Error(ErrorEvent {
                        message: e.to_string(),
                    })),
                }
            }
        }

        if !ctx.config.connection.reconnect {
            break 'outer;
        }

        // Backoff: wait out the current interval, then double it for the
        // next round, capped at the ceiling. Registration resets it.
        ctx.set_state(ConnectionState::Reconnecting);
        let delay = read_lock(&ctx.session)
            .reconnect_interval
            .min(RECONNECT_MAX_INTERVAL);
        debug!(delay_ms = delay.as_millis() as u64, "reconnecting");

        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => break,
                cmd = commands.recv() => match cmd {
                    // Nothing to write to between connections.
                    Some(DriverCommand::Send(_)) => continue,
                    Some(DriverCommand::Quit) | None => {
                        ctx.set_state(ConnectionState::Disconnected);
                        break 'outer;
                    }
                },
            }
        }
        {
            let mut session = write_lock(&ctx.session);
            session.reconnect_interval = bump_interval(session.reconnect_interval);
        }
        rejoin = true;
    }
}

async fn open_transport(config: &ConnectionConfig) -> Result<Transport, ClientError> {
    match &config.kind {
        ConnectionKind::Tcp { host, port } => {
            if config.secure {
                Transport::tls(host, *port).await
            } else {
                Transport::tcp(host, *port).await
            }
        }
        ConnectionKind::WebSocket { url } => Transport::websocket(url).await,
    }
}

/// One select-loop step; resolved before any handler touches the
/// transport.
enum Step {
    Line(Result<Option<String>, ClientError>),
    Command(Option<DriverCommand>),
    RegisterTimeout,
    ProbeDue,
    ProbeTimeout,
}

/// Pump one established connection until it ends.
///
/// Performs the registration handshake, dispatches every received line
/// in arrival order, answers inbound probes, runs the keepalive
/// watchdog, and writes caller-submitted lines.
async fn drive_connection(
    ctx: &DriverCtx,
    commands: &mut mpsc::UnboundedReceiver<DriverCommand>,
    ready: &mut Option<oneshot::Sender<Result<(), ClientError>>>,
    transport: &mut Transport,
    rejoin: bool,
) -> ExitReason {
    let dispatcher = Dispatcher::new(ctx.events.clone(), Arc::clone(&ctx.store));

    // Handshake: capability request, credential, nickname, in that order.
    let (pass, nick) = {
        let session = read_lock(&ctx.session);
        (session.pass.clone(), session.nick.clone())
    };
    for line in [
        CAP_REQ_LINE.to_string(),
        format!("PASS {pass}"),
        format!("NICK {nick}"),
    ] {
        if let Err(e) = transport.send_line(&line).await {
            return ExitReason::Error(e);
        }
    }

    let mut register_deadline = Some(Instant::now() + REGISTER_TIMEOUT);
    // Armed once registered; only one probe outstanding at a time.
    let mut next_probe: Option<Instant> = None;
    let mut probe_deadline: Option<Instant> = None;

    loop {
        let step = tokio::select! {
            line = transport.next_line() => Step::Line(line),
            cmd = commands.recv() => Step::Command(cmd),
            _ = sleep_opt(register_deadline), if register_deadline.is_some() => {
                Step::RegisterTimeout
            }
            _ = sleep_opt(next_probe), if next_probe.is_some() => Step::ProbeDue,
            _ = sleep_opt(probe_deadline), if probe_deadline.is_some() => Step::ProbeTimeout,
        };

        match step {
            Step::Line(Ok(Some(raw))) => {
                let outcome = dispatcher.dispatch(&raw);

                // Protocol obligation: answer inbound probes
                // immediately, regardless of watchdog state.
                if let Some(reply) = outcome.reply {
                    if let Err(e) = transport.send_line(reply).await {
                        return ExitReason::Error(e);
                    }
                }

                if outcome.pong && probe_deadline.is_some() {
                    probe_deadline = None;
                    next_probe = Some(Instant::now() + PROBE_INTERVAL);
                }

                if let Some(assigned_nick) = outcome.registered_nick {
                    let newly_registered = {
                        let mut session = write_lock(&ctx.session);
                        if !assigned_nick.is_empty() {
                            session.nick = assigned_nick;
                        }
                        let newly = session.state != ConnectionState::Registered;
                        session.state = ConnectionState::Registered;
                        if newly {
                            session.reconnect_interval = RECONNECT_BASE_INTERVAL;
                        }
                        newly
                    };

                    // A repeated welcome only refreshes the nickname.
                    if newly_registered {
                        debug!("registered");
                        register_deadline = None;
                        next_probe = Some(Instant::now() + PROBE_INTERVAL);
                        ctx.emit(Event::Register);
                        if let Some(tx) = ready.take() {
                            let _ = tx.send(Ok(()));
                        }

                        if rejoin {
                            // Membership is not preserved server-side
                            // across a dropped connection.
                            let channels = read_lock(&ctx.store).channel_names();
                            for channel in channels {
                                let line = Message::join(&format!("#{channel}")).to_string();
                                if let Err(e) = transport.send_line(&line).await {
                                    return ExitReason::Error(e);
                                }
                            }
                        }
                    }
                }
            }
            Step::Line(Ok(None)) => return ExitReason::Error(ClientError::ConnectionClosed),
            Step::Line(Err(e)) => return ExitReason::Error(e),
            Step::Command(Some(DriverCommand::Send(line))) => {
                if let Err(e) = transport.send_line(&line).await {
                    return ExitReason::Error(e);
                }
            }
            Step::Command(Some(DriverCommand::Quit)) | Step::Command(None) => {
                return ExitReason::Quit;
            }
            Step::RegisterTimeout => {
                return ExitReason::Error(ClientError::RegistrationTimeout);
            }
            Step::ProbeDue => {
                next_probe = None;
                if let Err(e) = transport.send_line("PING").await {
                    return ExitReason::Error(e);
                }
                probe_deadline = Some(Instant::now() + PROBE_REPLY_TIMEOUT);
            }
            Step::ProbeTimeout => {
                return ExitReason::Error(ClientError::PingTimeout);
            }
        }
    }
}

/// Sleep until an optional deadline. Disabled select arms still build
/// their future, so absent deadlines get one far enough out to never
/// fire.
fn sleep_opt(deadline: Option<Instant>) -> Sleep {
    sleep_until(deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400)))
}

fn bump_interval(current: Duration) -> Duration {
    (current * 2).min(RECONNECT_MAX_INTERVAL)
}

fn normalize_channel(channel: &str) -> String {
    channel
        .strip_prefix('#')
        .unwrap_or(channel)
        .to_ascii_lowercase()
}

fn anonymous_nick() -> String {
    let mut bytes = [0u8; 4];
    let suffix = match getrandom::getrandom(&mut bytes) {
        Ok(()) => u32::from_le_bytes(bytes) % 100_000,
        Err(_) => 0,
    };
    format!("{ANONYMOUS_NICK_PREFIX}{suffix:05}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_nick_shape() {
        for _ in 0..20 {
            let nick = anonymous_nick();
            let suffix = nick.strip_prefix("justinfan").expect("prefix");
            assert_eq!(suffix.len(), 5);
            assert!(suffix.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_normalize_channel() {
        assert_eq!(normalize_channel("#Dallas"), "dallas");
        assert_eq!(normalize_channel("dallas"), "dallas");
        assert_eq!(normalize_channel("#dallas"), "dallas");
    }

    #[test]
    fn test_backoff_sequence() {
        let base = RECONNECT_BASE_INTERVAL;
        let mut interval = base;
        let mut waits = Vec::new();
        for _ in 0..8 {
            waits.push(interval.min(RECONNECT_MAX_INTERVAL));
            interval = bump_interval(interval);
        }

        let millis: Vec<u128> = waits.iter().map(|d| d.as_millis()).collect();
        assert_eq!(
            millis,
            vec![1000, 2000, 4000, 8000, 16000, 32000, 60000, 60000]
        );
    }

    #[test]
    fn test_default_config_is_anonymous_websocket() {
        let config = ClientConfig::default();
        assert!(config.name.is_none());
        assert!(config.token.is_none());
        assert!(config.connection.secure);
        assert!(config.connection.reconnect);
        match &config.connection.kind {
            ConnectionKind::WebSocket { url } => {
                assert_eq!(url, "wss://irc-ws.chat.twitch.tv:443");
            }
            other => panic!("expected websocket default, got {other:?}"),
        }
    }

    #[test]
    fn test_tcp_config_ports() {
        match ConnectionConfig::tcp(true).kind {
            ConnectionKind::Tcp { port, .. } => assert_eq!(port, 6697),
            _ => unreachable!(),
        }
        match ConnectionConfig::tcp(false).kind {
            ConnectionKind::Tcp { port, .. } => assert_eq!(port, 6667),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_send_refused_while_disconnected() {
        let client = Client::new(ClientConfig::anonymous());
        assert!(!client.say("dallas", "hello"));
        assert!(!client.send_raw("PING"));
    }

    #[test]
    fn test_say_empty_message_is_noop() {
        let client = Client::new(ClientConfig::anonymous());
        assert!(!client.say("dallas", ""));
    }

    #[test]
    fn test_oauth_prefix_applied() {
        let client = Client::new(ClientConfig::new("ronni", "abc123"));
        assert_eq!(read_lock(&client.session).pass, "oauth:abc123");
        assert_eq!(client.nick(), "ronni");
    }

    #[test]
    fn test_anonymous_pass_applied() {
        let client = Client::new(ClientConfig::anonymous());
        assert_eq!(read_lock(&client.session).pass, "SCHMOOPIIE");
        assert!(client.nick().starts_with("justinfan"));
    }

    #[tokio::test]
    async fn test_join_requires_registration() {
        let client = Client::new(ClientConfig::anonymous());
        assert!(matches!(
            client.join("dallas").await,
            Err(ClientError::NotRegistered)
        ));
        assert!(matches!(
            client.part("dallas").await,
            Err(ClientError::NotRegistered)
        ));
    }
}
