//! Manager session: login, request/response correlation, event lists

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::{
    action::{Action, ActionIdGenerator},
    buffer::FrameBuffer,
    commands,
    config::AmiConfig,
    dispatcher::{EventDispatcher, EventHandler},
    error::{AmiError, AmiResult},
    fields::{AmiField, ResponseStatus},
    message::{parse_message, AmiMessage, MessageKind},
    reader::{read_frame, read_line},
};

/// Protocol diagnostics: `info` when the connection was configured with
/// `write_log`, `debug` otherwise.
macro_rules! diag {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

/// Split `host:port`, falling back to `default_port` when no port is given.
///
/// A bare IPv6 address is taken as a host; use `[addr]:port` to attach a
/// port to one.
fn split_server(server: &str, default_port: u16) -> AmiResult<(String, u16)> {
    let invalid = || AmiError::InvalidAddress {
        address: server.to_string(),
    };
    let Some((host, port)) = server.rsplit_once(':') else {
        return Ok((server.to_string(), default_port));
    };
    let host = match host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
    {
        Some(bracketed) => bracketed,
        None if host.contains(':') => return Ok((server.to_string(), default_port)),
        None => host,
    };
    let port = port
        .parse()
        .map_err(|_| invalid())?;
    Ok((host.to_string(), port))
}

/// Establish a TCP connection with a timeout.
async fn tcp_connect_with_timeout(host: &str, port: u16, timeout_ms: u64) -> AmiResult<TcpStream> {
    let address = format!("{}:{}", host, port);
    match timeout(Duration::from_millis(timeout_ms), TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            debug!("[CONNECT] TCP connection established");
            Ok(stream)
        }
        Ok(Err(source)) => {
            warn!("[CONNECT] Unable to connect to manager {}: {}", address, source);
            Err(AmiError::Connect { address, source })
        }
        Err(_) => {
            warn!("[CONNECT] TCP connect timed out after {}ms", timeout_ms);
            Err(AmiError::ConnectTimeout {
                address,
                timeout_ms,
            })
        }
    }
}

/// An authenticated manager session.
///
/// The connection owns its stream, its receive buffer and its event
/// handlers. There is no background reader: frames are read only while a
/// call on the connection is awaiting, and events that arrive meanwhile are
/// dispatched to the registered handlers before the call continues. Every
/// method that touches the stream takes `&mut self`, so at most one action
/// is ever outstanding.
///
/// ```no_run
/// use asterisk_ami_tokio::{AmiConnection, AmiMessage};
///
/// # async fn example() -> Result<(), asterisk_ami_tokio::AmiError> {
/// let mut ami = AmiConnection::connect("pbx.local", "admin", "secret").await?;
///
/// ami.add_event_handler("hangup", |_: &str, event: &AmiMessage, _: &str, _: u16| {
///     println!("hangup on {:?}", event.field("Channel"));
///     true
/// })?;
///
/// let status = ami
///     .send("Status", [("Channel", "SIP/100-00000001")])
///     .await?;
/// for entry in status.events().unwrap_or_default() {
///     println!("{:?}", entry.channel_state());
/// }
///
/// ami.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct AmiConnection<S = TcpStream> {
    host: String,
    port: u16,
    authenticated: bool,
    closed: bool,
    stream: S,
    buffer: FrameBuffer,
    dispatcher: EventDispatcher,
    action_ids: ActionIdGenerator,
    write_log: bool,
}

impl<S> fmt::Debug for AmiConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmiConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("authenticated", &self.authenticated)
            .field("closed", &self.closed)
            .field("buffered", &self.buffer.len())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl AmiConnection<TcpStream> {
    /// Connect and log in with default settings for everything else.
    ///
    /// `server` may carry a port as `host:port`; otherwise 5038 is used.
    pub async fn connect(server: &str, username: &str, secret: &str) -> AmiResult<Self> {
        let config = AmiConfig {
            server: server.to_string(),
            username: username.to_string(),
            secret: secret.to_string(),
            ..AmiConfig::default()
        };
        Self::connect_with_config(&config).await
    }

    /// Connect and log in using every setting in `config`.
    pub async fn connect_with_config(config: &AmiConfig) -> AmiResult<Self> {
        let (host, port) = split_server(&config.server, config.port)?;
        info!("[CONNECT] Connecting to manager at {}:{}", host, port);
        let stream = tcp_connect_with_timeout(&host, port, config.connect_timeout_ms).await?;

        let mut connection = Self::from_stream(stream, host, port);
        connection.write_log = config.write_log;
        connection
            .open_session(&config.username, &config.secret)
            .await
    }
}

impl<S> AmiConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-open stream without reading or writing anything.
    ///
    /// `host` and `port` are only reported to event handlers.
    pub fn from_stream(stream: S, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            authenticated: false,
            closed: false,
            stream,
            buffer: FrameBuffer::new(),
            dispatcher: EventDispatcher::new(),
            action_ids: ActionIdGenerator::new(),
            write_log: false,
        }
    }

    /// Read the banner from an already-open stream and log in.
    ///
    /// On any failure the stream is shut down before the error is returned;
    /// no `Logoff` is sent for a rejected login.
    pub async fn establish(
        stream: S,
        host: impl Into<String>,
        port: u16,
        username: &str,
        secret: &str,
    ) -> AmiResult<Self> {
        Self::from_stream(stream, host, port)
            .open_session(username, secret)
            .await
    }

    async fn open_session(mut self, username: &str, secret: &str) -> AmiResult<Self> {
        let result = match self
            .read_banner()
            .await
        {
            Ok(()) => self
                .login(username, secret)
                .await,
            Err(e) => Err(e),
        };

        match result {
            Ok(response) if self.authenticated => {
                debug!("[AUTH] Logged in as {}", username);
                trace!("[AUTH] Login response: {:?}", response.message());
                Ok(self)
            }
            Ok(response) => {
                diag!(self.write_log, "[AUTH] Failed to login as {}", username);
                let message = response
                    .message()
                    .unwrap_or("Authentication failed")
                    .to_string();
                self.close().await;
                Err(AmiError::auth_failed(message))
            }
            Err(e) => {
                warn!("[CONNECT] Session setup failed: {}", e);
                self.close().await;
                Err(e)
            }
        }
    }

    async fn read_banner(&mut self) -> AmiResult<()> {
        match read_line(&mut self.stream, &mut self.buffer).await? {
            Some(banner) => {
                debug!("[CONNECT] Banner: {}", banner);
                Ok(())
            }
            None => {
                diag!(self.write_log, "[CONNECT] Manager header not received");
                Err(AmiError::BannerMissing)
            }
        }
    }

    /// Send `Login` and record whether it succeeded.
    ///
    /// The connection counts as authenticated only when the response status
    /// is exactly `Success`. The response is returned either way.
    pub async fn login(&mut self, username: &str, secret: &str) -> AmiResult<AmiMessage> {
        debug!("[AUTH] Sending Login for {} [REDACTED]", username);
        let action = Action::new("Login")
            .field(AmiField::Username.as_str(), username)
            .field(AmiField::Secret.as_str(), secret);
        let response = self
            .send_action(action)
            .await?;
        self.authenticated = response.status() == Some(ResponseStatus::Success.as_str());
        Ok(response)
    }

    /// Send an action built from `name` and `fields` and wait for its
    /// response.
    ///
    /// Repeat a field name to send a multi-valued field. An `ActionID`
    /// among the fields is honored; otherwise one is generated.
    pub async fn send<I, K, V>(&mut self, name: &str, fields: I) -> AmiResult<AmiMessage>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: fmt::Display,
    {
        self.send_action(build_action(name, fields))
            .await
    }

    /// Like [`send`](Self::send), but first checks the action's required
    /// fields when it is one of the known [`commands::ACTIONS`]. Unknown
    /// actions are sent unchanged.
    pub async fn invoke<I, K, V>(&mut self, name: &str, fields: I) -> AmiResult<AmiMessage>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: fmt::Display,
    {
        let action = build_action(name, fields);
        if let Some(spec) = commands::lookup(name) {
            spec.check(&action)?;
        }
        self.send_action(action)
            .await
    }

    /// Write `action` and wait for the response carrying its `ActionID`.
    ///
    /// Events read while waiting are dispatched. If the response opens an
    /// event list, the list members are collected into
    /// [`AmiMessage::events`] before returning.
    pub async fn send_action(&mut self, mut action: Action) -> AmiResult<AmiMessage> {
        if self.closed {
            return Err(AmiError::ConnectionClosed);
        }
        let id = action.ensure_action_id(&mut self.action_ids);
        let wire = action.to_wire_format()?;
        debug!("[SEND] {:?}", action);

        if let Err(e) = self
            .write_wire(wire.as_bytes())
            .await
        {
            return Err(self
                .abort(AmiError::Write(e))
                .await);
        }

        self.await_response(Some(&id))
            .await
    }

    /// Wait for the response to `action_id`, or return the next frame
    /// unconditionally when no id is given.
    ///
    /// Frames with other identifiers are skipped (events among them are
    /// dispatched). A response with `EventList: start` is followed by
    /// every frame carrying the same identifier until `EventList: Complete`;
    /// those frames become the response's event list and the terminal frame
    /// is discarded.
    pub async fn await_response(&mut self, action_id: Option<&str>) -> AmiResult<AmiMessage> {
        let Some(id) = action_id else {
            return self
                .read_message(false)
                .await;
        };

        let mut response = self
            .await_matching(id, true)
            .await?;
        if response.is_event_list_start() {
            let mut events = Vec::new();
            loop {
                let item = self
                    .await_matching(id, false)
                    .await?;
                if item.is_event_list_complete() {
                    break;
                }
                events.push(item);
            }
            debug!("[RECV] Collected {} list events for {}", events.len(), id);
            response.set_events(events);
        }
        Ok(response)
    }

    /// Read until a frame carries `id`. With `response_only`, frames of any
    /// other kind are skipped even when the id matches.
    async fn await_matching(&mut self, id: &str, response_only: bool) -> AmiResult<AmiMessage> {
        loop {
            let message = self
                .read_message(false)
                .await?;
            if message.action_id() == Some(id) && (!response_only || message.is_response()) {
                return Ok(message);
            }
            trace!("[RECV] Skipping {:?} frame while waiting for {}", message.kind(), id);
        }
    }

    async fn write_wire(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream
            .write_all(bytes)
            .await?;
        self.stream
            .flush()
            .await
    }

    /// Read, parse and dispatch the next frame.
    ///
    /// The first end-of-stream gives a [`MessageKind::Timeout`] message when
    /// `allow_timeout` is set and [`AmiError::ConnectionClosed`] otherwise.
    /// Either way the connection is closed from then on, and every later
    /// read fails with [`AmiError::ConnectionClosed`]. A read failure or an
    /// oversized frame closes it as well.
    async fn read_message(&mut self, allow_timeout: bool) -> AmiResult<AmiMessage> {
        if self.closed {
            return Err(AmiError::ConnectionClosed);
        }
        let frame = match read_frame(&mut self.stream, &mut self.buffer).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("[RECV] Connection closed by manager");
                let err = self
                    .abort(AmiError::ConnectionClosed)
                    .await;
                if allow_timeout {
                    return Ok(AmiMessage::timeout());
                }
                return Err(err);
            }
            Err(e) => return Err(self.abort(e).await),
        };

        let message = parse_message(&frame);
        match message.kind() {
            MessageKind::Event => {
                if self
                    .dispatcher
                    .dispatch(&message, &self.host, self.port)
                    .is_none()
                {
                    diag!(
                        self.write_log,
                        "[EVENT] No event handler for event '{}'",
                        message
                            .event_name()
                            .unwrap_or_default()
                    );
                }
            }
            MessageKind::Unknown(kind) => {
                diag!(self.write_log, "[RECV] Unhandled response packet from manager: {}", kind);
            }
            MessageKind::Response | MessageKind::Timeout => {}
        }
        Ok(message)
    }

    /// Wait for the next frame of any kind, dispatching it if it is an event.
    ///
    /// With a `wait` limit, running out of time gives a
    /// [`MessageKind::Timeout`] message instead of an error. So does the
    /// peer closing the stream, once; after that the call fails with
    /// [`AmiError::ConnectionClosed`] (see [`is_closed`](Self::is_closed)).
    /// Partially received frames stay buffered for the next call.
    pub async fn next_message(&mut self, wait: Option<Duration>) -> AmiResult<AmiMessage> {
        match wait {
            None => {
                self.read_message(false)
                    .await
            }
            Some(limit) => match timeout(limit, self.read_message(true)).await {
                Ok(result) => result,
                Err(_) => Ok(AmiMessage::timeout()),
            },
        }
    }

    /// `Ping`; a live manager answers `Success` (`Ping: Pong`).
    pub async fn ping(&mut self) -> AmiResult<AmiMessage> {
        self.send_action(Action::new("Ping"))
            .await
    }

    /// Run a CLI command and return its output.
    pub async fn command(&mut self, command: &str) -> AmiResult<String> {
        let response = self
            .send_action(Action::new("Command").field("Command", command))
            .await?
            .into_result()?;
        Ok(response
            .data()
            .unwrap_or_default()
            .to_string())
    }

    /// Read a value from the manager's database.
    ///
    /// The value arrives in a follow-up frame with the same `ActionID`
    /// (a `DBGetResponse` event). Returns an empty string when the lookup is
    /// rejected or the follow-up carries no `Val`.
    pub async fn db_get(&mut self, family: &str, key: &str) -> AmiResult<String> {
        let mut action = Action::new("DBGet")
            .field("Family", family)
            .field("Key", key);
        let id = action.ensure_action_id(&mut self.action_ids);

        let response = self
            .send_action(action)
            .await?;
        if response.status() != Some(ResponseStatus::Success.as_str()) {
            return Ok(String::new());
        }

        let value = match response.events() {
            Some(events) => events
                .iter()
                .find_map(|event| event.field(AmiField::Val))
                .map(str::to_string),
            None => self
                .await_matching(&id, false)
                .await?
                .field(AmiField::Val)
                .map(str::to_string),
        };
        Ok(value.unwrap_or_default())
    }

    /// Set which event classes the manager sends (`on`, `off`, or a
    /// comma-separated class list).
    pub async fn events(&mut self, mask: &str) -> AmiResult<AmiMessage> {
        self.send_action(Action::new("Events").field("EventMask", mask))
            .await
    }

    /// Send `Logoff`. The manager answers `Goodbye` and closes the stream.
    pub async fn logoff(&mut self) -> AmiResult<AmiMessage> {
        let response = self
            .send_action(Action::new("Logoff"))
            .await;
        self.authenticated = false;
        response
    }

    /// Register a handler for `event`, or for every otherwise unhandled
    /// event with `*`. Fails if a handler is already registered.
    pub fn add_event_handler(&mut self, event: &str, handler: impl EventHandler + 'static) -> AmiResult<()> {
        self.dispatcher
            .register(event, handler)
            .inspect_err(|e| diag!(self.write_log, "[EVENT] {}", e))
    }

    /// Remove the handler for `event`. Fails if none is registered.
    pub fn remove_event_handler(&mut self, event: &str) -> AmiResult<()> {
        self.dispatcher
            .unregister(event)
            .inspect_err(|e| diag!(self.write_log, "[EVENT] {}", e))
    }

    /// Log off if logged in, then shut the stream down.
    ///
    /// A failed logoff is logged and otherwise ignored. A connection that is
    /// already closed has nothing left to shut down.
    pub async fn disconnect(mut self) -> AmiResult<()> {
        info!("[CONNECT] Disconnecting from {}:{}", self.host, self.port);
        if self.authenticated {
            if let Err(e) = self
                .logoff()
                .await
            {
                warn!("[CONNECT] Logoff failed: {}", e);
            }
        }
        if self.closed {
            return Ok(());
        }
        self.stream
            .shutdown()
            .await
            .map_err(AmiError::Write)
    }

    /// Mark the connection unusable after `error` and shut the stream down.
    async fn abort(&mut self, error: AmiError) -> AmiError {
        if error.is_connection_error() {
            diag!(self.write_log, "[CONNECT] Closing connection to {}:{}: {}", self.host, self.port, error);
            self.closed = true;
            self.close()
                .await;
        }
        error
    }

    async fn close(&mut self) {
        self.authenticated = false;
        if let Err(e) = self
            .stream
            .shutdown()
            .await
        {
            trace!("[CONNECT] Shutdown failed: {}", e);
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// True once the stream reached end-of-stream or failed. A closed
    /// connection rejects every further action with
    /// [`AmiError::ConnectionClosed`]; drop it and connect again.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

fn build_action<I, K, V>(name: &str, fields: I) -> Action
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: fmt::Display,
{
    fields
        .into_iter()
        .fold(Action::new(name), |action, (key, value)| action.field(key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use tokio::io::{DuplexStream, ReadBuf};

    const BANNER: &[u8] = b"Asterisk Call Manager/5.0.1\r\n";

    /// Scripted manager side of a duplex pipe.
    struct Peer {
        stream: DuplexStream,
        buffer: FrameBuffer,
    }

    impl Peer {
        async fn write(&mut self, bytes: &[u8]) {
            self.stream
                .write_all(bytes)
                .await
                .unwrap();
        }

        async fn request(&mut self) -> Option<String> {
            read_frame(&mut self.stream, &mut self.buffer)
                .await
                .unwrap()
        }
    }

    fn pair() -> (AmiConnection<DuplexStream>, Peer) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let peer = Peer {
            stream: server,
            buffer: FrameBuffer::new(),
        };
        (AmiConnection::from_stream(client, "pbx", 5038), peer)
    }

    /// Accepts every write; every read fails.
    struct ResetStream;

    impl AsyncRead for ResetStream {
        fn poll_read(self: Pin<&mut Self>, _: &mut Context<'_>, _: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::from(io::ErrorKind::ConnectionReset)))
        }
    }

    impl AsyncWrite for ResetStream {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn record_events(conn: &mut AmiConnection<DuplexStream>) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        conn.add_event_handler("*", move |event: &str, _: &AmiMessage, _: &str, _: u16| {
            sink.lock()
                .unwrap()
                .push(event.to_string());
            true
        })
        .unwrap();
        seen
    }

    #[test]
    fn test_split_server() {
        assert_eq!(split_server("pbx", 5038).unwrap(), ("pbx".to_string(), 5038));
        assert_eq!(split_server("pbx:5039", 5038).unwrap(), ("pbx".to_string(), 5039));
        assert_eq!(split_server("[::1]:5039", 5038).unwrap(), ("::1".to_string(), 5039));
        assert_eq!(split_server("fe80::1", 5038).unwrap(), ("fe80::1".to_string(), 5038));
        assert!(matches!(
            split_server("pbx:ami", 5038),
            Err(AmiError::InvalidAddress { .. })
        ));
    }

    #[tokio::test]
    async fn test_ping_skips_foreign_frames_and_dispatches_events() {
        let (mut conn, mut peer) = pair();
        let seen = record_events(&mut conn);
        peer.write(
            b"Event: PeerStatus\r\nPeer: SIP/100\r\n\r\n\
              Response: Success\r\nActionID: other\r\n\r\n\
              Response: Success\r\nActionID: A1\r\nPing: Pong\r\n\r\n",
        )
        .await;

        let response = conn
            .ping()
            .await
            .unwrap();
        assert_eq!(response.action_id(), Some("A1"));
        assert_eq!(response.field("Ping"), Some("Pong"));
        assert_eq!(*seen.lock().unwrap(), vec!["peerstatus".to_string()]);
        assert_eq!(
            peer.request()
                .await
                .as_deref(),
            Some("Action: Ping\r\nActionID: A1")
        );
    }

    #[tokio::test]
    async fn test_event_with_matching_id_does_not_end_wait() {
        let (mut conn, mut peer) = pair();
        let seen = record_events(&mut conn);
        peer.write(
            b"Event: OriginateResponse\r\nActionID: A1\r\n\r\n\
              Response: Success\r\nActionID: A1\r\n\r\n",
        )
        .await;

        let response = conn
            .send("Originate", [("Channel", "SIP/100")])
            .await
            .unwrap();
        assert!(response.is_response());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_event_list_collected_in_order() {
        let (mut conn, mut peer) = pair();
        let seen = record_events(&mut conn);
        peer.write(b"Response: Success\r\nActionID: A1\r\nEventList: start\r\nMessage: Channel status will follow\r\n\r\n")
            .await;
        for n in 1..=4 {
            let frame = format!("Event: Status\r\nActionID: A1\r\nChannel: SIP/{}\r\n\r\n", n);
            peer.write(frame.as_bytes())
                .await;
            if n == 2 {
                peer.write(b"Event: Newstate\r\nChannel: SIP/9\r\n\r\n")
                    .await;
            }
        }
        peer.write(b"Event: StatusComplete\r\nActionID: A1\r\nEventList: Complete\r\nItems: 4\r\n\r\n")
            .await;

        let response = conn
            .send("Status", Vec::<(String, String)>::new())
            .await
            .unwrap();
        let events = response
            .events()
            .unwrap();
        let channels: Vec<_> = events
            .iter()
            .map(|e| e.field("Channel").unwrap())
            .collect();
        assert_eq!(channels, vec!["SIP/1", "SIP/2", "SIP/3", "SIP/4"]);
        assert_eq!(response.message(), Some("Channel status will follow"));

        // list members, the interleaved event and the terminal frame, each once
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.iter().filter(|e| *e == "newstate").count(), 1);
    }

    #[tokio::test]
    async fn test_await_without_id_returns_next_frame() {
        let (mut conn, mut peer) = pair();
        peer.write(b"Event: FullyBooted\r\nStatus: Fully Booted\r\n\r\n")
            .await;
        let message = conn
            .await_response(None)
            .await
            .unwrap();
        assert_eq!(message.event_name(), Some("FullyBooted"));
    }

    #[tokio::test]
    async fn test_establish_logs_in() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let mut peer = Peer {
            stream: server,
            buffer: FrameBuffer::new(),
        };
        peer.write(BANNER)
            .await;
        peer.write(b"Response: Success\r\nActionID: A1\r\nMessage: Authentication accepted\r\n\r\n")
            .await;

        let conn = AmiConnection::establish(client, "pbx", 5038, "admin", "hunter2")
            .await
            .unwrap();
        assert!(conn.is_authenticated());
        assert_eq!(
            peer.request()
                .await
                .as_deref(),
            Some("Action: Login\r\nUsername: admin\r\nSecret: hunter2\r\nActionID: A1")
        );
    }

    #[tokio::test]
    async fn test_rejected_login_closes_without_logoff() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let mut peer = Peer {
            stream: server,
            buffer: FrameBuffer::new(),
        };
        peer.write(BANNER)
            .await;
        peer.write(b"Response: Error\r\nActionID: A1\r\nMessage: Authentication failed\r\n\r\n")
            .await;

        let err = AmiConnection::establish(client, "pbx", 5038, "admin", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::AuthenticationFailed { ref message } if message == "Authentication failed"));

        let login = peer
            .request()
            .await
            .unwrap();
        assert!(login.starts_with("Action: Login"));
        assert!(peer
            .request()
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_banner() {
        let (client, server) = tokio::io::duplex(1024);
        drop(server);
        let err = AmiConnection::establish(client, "pbx", 5038, "admin", "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::BannerMissing));
    }

    #[tokio::test]
    async fn test_stray_crlf_between_frames() {
        let (mut conn, mut peer) = pair();
        let seen = record_events(&mut conn);
        peer.write(
            b"Event: Hangup\r\nChannel: SIP/100-01\r\n\r\n\r\n\
              Response: Success\r\nActionID: A1\r\nPing: Pong\r\n\r\n",
        )
        .await;

        let response = timeout(Duration::from_secs(5), conn.ping())
            .await
            .unwrap()
            .unwrap();
        assert!(response.is_response());
        assert_eq!(response.field("Ping"), Some("Pong"));
        assert_eq!(*seen.lock().unwrap(), vec!["hangup".to_string()]);
    }

    #[tokio::test]
    async fn test_eof_while_awaiting_is_connection_closed() {
        let (mut conn, mut peer) = pair();
        let manager = tokio::spawn(async move {
            let request = peer
                .request()
                .await;
            peer.write(b"Response: Succ")
                .await;
            request
        });

        let err = conn
            .ping()
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::ConnectionClosed));
        assert!(conn.is_closed());
        assert!(!conn.is_authenticated());
        assert_eq!(
            manager
                .await
                .unwrap()
                .as_deref(),
            Some("Action: Ping\r\nActionID: A1")
        );
    }

    #[tokio::test]
    async fn test_next_message_after_eof_reports_closed() {
        let (mut conn, peer) = pair();
        drop(peer);

        let first = conn
            .next_message(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(first.is_timeout());
        assert!(conn.is_closed());

        for _ in 0..3 {
            let err = conn
                .next_message(Some(Duration::from_secs(5)))
                .await
                .unwrap_err();
            assert!(matches!(err, AmiError::ConnectionClosed));
        }
        assert!(matches!(
            conn.next_message(None)
                .await,
            Err(AmiError::ConnectionClosed)
        ));
        assert!(matches!(
            conn.ping()
                .await,
            Err(AmiError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_failure_closes_connection() {
        let mut conn = AmiConnection::from_stream(ResetStream, "pbx", 5038);
        let err = conn
            .ping()
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::FrameRead(ref e) if e.kind() == io::ErrorKind::ConnectionReset));
        assert!(conn.is_closed());

        let err = conn
            .ping()
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::ConnectionClosed));
        conn.disconnect()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_next_message_timeout_keeps_partial_frame() {
        let (mut conn, mut peer) = pair();
        peer.write(b"Event: Hangup\r\nCause: 16\r\n")
            .await;

        let message = conn
            .next_message(Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(message.is_timeout());

        peer.write(b"\r\n")
            .await;
        let message = conn
            .next_message(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(message.event_name(), Some("Hangup"));
        assert_eq!(message.field("Cause"), Some("16"));
    }

    #[tokio::test]
    async fn test_command_returns_inline_output() {
        let (mut conn, mut peer) = pair();
        peer.write(
            b"Response: Follows\r\nPrivilege: Command\r\nActionID: A1\r\n\
              Name/username   Host\n100/100   10.0.0.2\n--END COMMAND--\r\n\r\n",
        )
        .await;

        let output = conn
            .command("sip show peers")
            .await
            .unwrap();
        assert_eq!(output, "Name/username   Host\n100/100   10.0.0.2");
    }

    #[tokio::test]
    async fn test_command_error_is_action_failed() {
        let (mut conn, mut peer) = pair();
        peer.write(b"Response: Error\r\nActionID: A1\r\nMessage: Permission denied\r\n\r\n")
            .await;
        let err = conn
            .command("core stop now")
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::ActionFailed { ref message } if message == "Permission denied"));
    }

    #[tokio::test]
    async fn test_db_get_reads_follow_up_frame() {
        let (mut conn, mut peer) = pair();
        peer.write(
            b"Response: Success\r\nActionID: A1\r\nMessage: Result will follow\r\n\r\n\
              Event: DBGetResponse\r\nActionID: A1\r\nFamily: cidname\r\nKey: 100\r\nVal: Front Desk\r\n\r\n",
        )
        .await;

        let value = conn
            .db_get("cidname", "100")
            .await
            .unwrap();
        assert_eq!(value, "Front Desk");
    }

    #[tokio::test]
    async fn test_db_get_rejected_is_empty() {
        let (mut conn, mut peer) = pair();
        peer.write(b"Response: Error\r\nActionID: A1\r\nMessage: Database entry not found\r\n\r\n")
            .await;
        assert_eq!(
            conn.db_get("cidname", "999")
                .await
                .unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn test_invoke_checks_required_fields_before_sending() {
        let (mut conn, mut peer) = pair();
        let err = conn
            .invoke("Hangup", Vec::<(String, String)>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::MissingField { ref field, .. } if field == "Channel"));

        peer.write(b"Response: Success\r\nActionID: A1\r\nMessage: Channel Hungup\r\n\r\n")
            .await;
        let response = conn
            .invoke("Hangup", [("Channel", "SIP/100-01")])
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(
            peer.request()
                .await
                .as_deref(),
            Some("Action: Hangup\r\nChannel: SIP/100-01\r\nActionID: A1")
        );
    }

    #[tokio::test]
    async fn test_error_response_is_returned_not_raised() {
        let (mut conn, mut peer) = pair();
        peer.write(b"Response: Error\r\nActionID: A1\r\nMessage: No such channel\r\n\r\n")
            .await;
        let response = conn
            .send("Hangup", [("Channel", "SIP/nope")])
            .await
            .unwrap();
        assert_eq!(response.status(), Some("Error"));
        assert_eq!(response.message(), Some("No such channel"));
    }

    #[tokio::test]
    async fn test_disconnect_sends_logoff_when_authenticated() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let mut peer = Peer {
            stream: server,
            buffer: FrameBuffer::new(),
        };
        peer.write(BANNER)
            .await;
        peer.write(b"Response: Success\r\nActionID: A1\r\n\r\n")
            .await;
        peer.write(b"Response: Goodbye\r\nActionID: A2\r\nMessage: Thanks for all the fish.\r\n\r\n")
            .await;

        let conn = AmiConnection::establish(client, "pbx", 5038, "admin", "secret")
            .await
            .unwrap();
        conn.disconnect()
            .await
            .unwrap();

        assert!(peer
            .request()
            .await
            .unwrap()
            .starts_with("Action: Login"));
        assert_eq!(
            peer.request()
                .await
                .as_deref(),
            Some("Action: Logoff\r\nActionID: A2")
        );
        assert!(peer
            .request()
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_handler_registry_through_connection() {
        let (mut conn, _peer) = pair();
        conn.add_event_handler("Hangup", |_: &str, _: &AmiMessage, _: &str, _: u16| true)
            .unwrap();
        assert!(matches!(
            conn.add_event_handler("hangup", |_: &str, _: &AmiMessage, _: &str, _: u16| true),
            Err(AmiError::HandlerAlreadyRegistered { .. })
        ));
        conn.remove_event_handler("HANGUP")
            .unwrap();
        assert!(matches!(
            conn.remove_event_handler("hangup"),
            Err(AmiError::HandlerNotRegistered { .. })
        ));
    }
}
