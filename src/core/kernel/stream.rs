//! Supervised WebSocket stream sessions.
//!
//! A [`StreamSession`] owns one logical stream (an order/account stream or a
//! candle stream) across any number of physical connections. The supervisor
//! task dials, authenticates, subscribes and reads; a second task per live
//! connection sends heartbeats. Connection loss is never surfaced to the
//! caller: the supervisor reconnects on a fixed schedule until stopped.

use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::{Decoded, WsCodec};
use crate::core::kernel::ws::{self, WsConfig, WsWriter};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_retry::strategy::FixedInterval;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Idle,
    Connecting,
    Authenticating,
    Subscribing,
    Streaming,
    /// Between two connections, waiting out the reconnect delay.
    Disconnected,
    Stopped,
}

impl StreamState {
    /// The supervisor is alive (possibly between connections).
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting
                | Self::Authenticating
                | Self::Subscribing
                | Self::Streaming
                | Self::Disconnected
        )
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Disconnected => "disconnected",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Everything needed to open one physical connection.
#[derive(Debug, Clone)]
pub struct StreamPlan {
    pub url: String,
    /// Frames sent right after the handshake (login or subscriptions).
    pub initial_frames: Vec<Message>,
    /// The initial frames are a login whose ack carries the subscriptions.
    pub awaits_login: bool,
}

impl StreamPlan {
    /// Connect and subscribe straight away.
    pub fn subscribe(url: impl Into<String>, frames: Vec<Message>) -> Self {
        Self {
            url: url.into(),
            initial_frames: frames,
            awaits_login: false,
        }
    }

    /// Connect, log in, and subscribe once the codec reports the login ack.
    pub fn login(url: impl Into<String>, login: Message) -> Self {
        Self {
            url: url.into(),
            initial_frames: vec![login],
            awaits_login: true,
        }
    }
}

/// Per-exchange connection preparation, run before every (re)connect.
///
/// Listen keys, connection tokens and login signatures expire, so they are
/// produced fresh for each attempt.
#[async_trait]
pub trait StreamConnector: Send + Sync + 'static {
    async fn prepare(&self) -> Result<StreamPlan, ExchangeError>;

    /// Called on `WsConfig::keepalive_interval` while connected.
    async fn keepalive(&self) -> Result<(), ExchangeError> {
        Ok(())
    }
}

/// Connector for public streams whose URL and frames never change.
#[derive(Debug, Clone)]
pub struct FixedPlan(pub StreamPlan);

#[async_trait]
impl StreamConnector for FixedPlan {
    async fn prepare(&self) -> Result<StreamPlan, ExchangeError> {
        Ok(self.0.clone())
    }
}

pub type EventHandler<E> = Arc<dyn Fn(E) + Send + Sync>;

struct Shared {
    name: String,
    state: RwLock<StreamState>,
    writer: Mutex<Option<WsWriter>>,
}

impl Shared {
    fn state(&self) -> StreamState {
        match self.state.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, state: StreamState) {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = state;
    }

    /// Move to `Connecting` unless a supervisor is already alive.
    fn try_begin(&self) -> Result<(), ExchangeError> {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_active() {
            return Err(ExchangeError::StreamAlreadyRunning(self.name.clone()));
        }
        *guard = StreamState::Connecting;
        Ok(())
    }

    async fn send(&self, message: Message) -> Result<(), ExchangeError> {
        let mut writer = self.writer.lock().await;
        let writer = writer
            .as_mut()
            .ok_or_else(|| ExchangeError::WebSocketError("not connected".to_string()))?;
        writer
            .send(message)
            .await
            .map_err(|e| ExchangeError::WebSocketError(format!("send failed: {}", e)))
    }

    async fn close_writer(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.close().await;
        }
    }
}

struct Running {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// One logical stream with automatic reconnect.
pub struct StreamSession<C: WsCodec> {
    codec: Arc<C>,
    connector: Arc<dyn StreamConnector>,
    config: WsConfig,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl<C: WsCodec> StreamSession<C> {
    pub fn new(
        name: impl Into<String>,
        codec: C,
        connector: Arc<dyn StreamConnector>,
        config: WsConfig,
    ) -> Self {
        Self {
            codec: Arc::new(codec),
            connector,
            config,
            shared: Arc::new(Shared {
                name: name.into(),
                state: RwLock::new(StreamState::Idle),
                writer: Mutex::new(None),
            }),
            running: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_active()
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Spawn the supervisor. Fails if this session is already running.
    pub async fn start(&self, handler: EventHandler<C::Event>) -> Result<(), ExchangeError> {
        let mut running = self.running.lock().await;
        self.shared.try_begin()?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let supervisor = Supervisor {
            codec: Arc::clone(&self.codec),
            connector: Arc::clone(&self.connector),
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            handler,
        };
        let task = tokio::spawn(supervisor.run(stop_rx));
        *running = Some(Running {
            stop: stop_tx,
            task,
        });

        info!(stream = %self.shared.name, "Stream started");
        Ok(())
    }

    /// Stop the supervisor and close the connection. Idempotent.
    pub async fn stop(&self) -> Result<(), ExchangeError> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };

        let _ = running.stop.send(true);
        if tokio::time::timeout(STOP_TIMEOUT, self.shared.close_writer())
            .await
            .is_err()
        {
            warn!(stream = %self.shared.name, "Writer busy at stop, closing after the supervisor exits");
        }

        let mut task = running.task;
        if tokio::time::timeout(STOP_TIMEOUT, &mut task).await.is_err() {
            warn!(stream = %self.shared.name, "Stream supervisor did not exit in time, aborting");
            task.abort();
            // The aborted task releases the writer lock once it is dropped
            let _ = tokio::time::timeout(STOP_TIMEOUT, &mut task).await;
        }
        if tokio::time::timeout(STOP_TIMEOUT, self.shared.close_writer())
            .await
            .is_err()
        {
            warn!(stream = %self.shared.name, "Writer still locked after stop, leaving it open");
        }

        self.shared.set_state(StreamState::Stopped);
        info!(stream = %self.shared.name, "Stream stopped");
        Ok(())
    }
}

/// Holds the current session of one stream kind for an adapter.
///
/// Sessions are built at `start` because the subscription (symbols,
/// interval, callback) is only known then.
pub struct StreamSlot<C: WsCodec> {
    current: std::sync::Mutex<Option<Arc<StreamSession<C>>>>,
}

impl<C: WsCodec> Default for StreamSlot<C> {
    fn default() -> Self {
        Self {
            current: std::sync::Mutex::new(None),
        }
    }
}

impl<C: WsCodec> StreamSlot<C> {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Option<Arc<StreamSession<C>>> {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Install `session` and start it, unless the previous one is still running.
    pub async fn start(
        &self,
        session: StreamSession<C>,
        handler: EventHandler<C::Event>,
    ) -> Result<(), ExchangeError> {
        let session = Arc::new(session);
        {
            let mut current = match self.current.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(running) = current.as_ref().filter(|s| s.is_running()) {
                return Err(ExchangeError::StreamAlreadyRunning(running.name().to_string()));
            }
            *current = Some(Arc::clone(&session));
        }
        session.start(handler).await
    }

    pub async fn stop(&self) -> Result<(), ExchangeError> {
        match self.current() {
            Some(session) => session.stop().await,
            None => Ok(()),
        }
    }

    pub fn state(&self) -> StreamState {
        self.current().map_or(StreamState::Idle, |s| s.state())
    }
}

enum Exit {
    Stopped,
    Lost { streamed: bool, reason: String },
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Supervisor<C: WsCodec> {
    codec: Arc<C>,
    connector: Arc<dyn StreamConnector>,
    config: WsConfig,
    shared: Arc<Shared>,
    handler: EventHandler<C::Event>,
}

impl<C: WsCodec> Supervisor<C> {
    async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut backoff = FixedInterval::new(self.config.reconnect_delay);
        let report_every = self.config.max_consecutive_failures.max(1);
        let mut failures: u32 = 0;

        loop {
            if *stop.borrow() {
                break;
            }

            let outcome = self.run_connection(&mut stop).await;
            self.shared.close_writer().await;

            match outcome {
                Ok(Exit::Stopped) => break,
                Ok(Exit::Lost { streamed, reason }) => {
                    failures = if streamed { 0 } else { failures + 1 };
                    warn!(stream = %self.shared.name, reason = %reason, "Stream connection lost");
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        stream = %self.shared.name,
                        attempt = failures,
                        error = %e,
                        "Stream connection attempt failed"
                    );
                }
            }

            if failures > 0 && failures % report_every == 0 {
                error!(
                    stream = %self.shared.name,
                    failures,
                    "Stream keeps failing to connect, still retrying"
                );
            }

            self.shared.set_state(StreamState::Disconnected);
            let delay = backoff.next().unwrap_or(self.config.reconnect_delay);
            tokio::select! {
                _ = stop.changed() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        debug!(stream = %self.shared.name, "Stream supervisor exited");
    }

    fn lost(&self, reason: impl Into<String>) -> Exit {
        Exit::Lost {
            streamed: self.shared.state() == StreamState::Streaming,
            reason: reason.into(),
        }
    }

    async fn run_connection(&self, stop: &mut watch::Receiver<bool>) -> Result<Exit, ExchangeError> {
        self.shared.set_state(StreamState::Connecting);
        let plan = self.connector.prepare().await?;
        let (writer, mut reader) = ws::connect(&plan.url, self.config.connect_timeout).await?;
        *self.shared.writer.lock().await = Some(writer);

        if *stop.borrow() {
            return Ok(Exit::Stopped);
        }

        self.shared.set_state(if plan.awaits_login {
            StreamState::Authenticating
        } else {
            StreamState::Subscribing
        });
        for frame in plan.initial_frames {
            self.shared.send(frame).await?;
        }
        if !plan.awaits_login {
            self.shared.set_state(StreamState::Streaming);
            info!(stream = %self.shared.name, "Stream subscribed");
        }

        let (failed_tx, mut failed_rx) = oneshot::channel();
        let _heartbeat = AbortOnDrop(tokio::spawn(heartbeat(
            Arc::clone(&self.shared),
            Arc::clone(&self.codec),
            Arc::clone(&self.connector),
            self.config.clone(),
            failed_tx,
        )));

        loop {
            tokio::select! {
                _ = stop.changed() => return Ok(Exit::Stopped),
                reason = &mut failed_rx => {
                    return Ok(self.lost(reason.unwrap_or_else(|_| "heartbeat task ended".to_string())));
                }
                frame = tokio::time::timeout(self.config.idle_timeout, reader.next()) => {
                    let message = match frame {
                        Err(_) => return Ok(self.lost("no frames within idle timeout")),
                        Ok(None) => return Ok(self.lost("connection closed")),
                        Ok(Some(Err(e))) => return Ok(self.lost(format!("read error: {}", e))),
                        Ok(Some(Ok(message))) => message,
                    };
                    match self.handle_frame(message).await {
                        Ok(None) => {}
                        Ok(Some(exit)) => return Ok(exit),
                        Err(e) => return Ok(self.lost(e.to_string())),
                    }
                }
            }
        }
    }

    async fn handle_frame(&self, message: Message) -> Result<Option<Exit>, ExchangeError> {
        match message {
            Message::Ping(payload) => {
                self.shared.send(Message::Pong(payload)).await?;
                return Ok(None);
            }
            Message::Pong(_) | Message::Frame(_) => return Ok(None),
            Message::Close(frame) => {
                return Ok(Some(self.lost(format!("closed by server: {:?}", frame))));
            }
            Message::Text(_) | Message::Binary(_) => {}
        }

        match self.codec.decode_message(message) {
            Ok(Decoded::Ignore) => {}
            Ok(Decoded::Subscribed) => {
                debug!(stream = %self.shared.name, "Subscription acknowledged");
            }
            Ok(Decoded::LoggedIn(frames)) => {
                self.shared.set_state(StreamState::Subscribing);
                for frame in frames {
                    self.shared.send(frame).await?;
                }
                self.shared.set_state(StreamState::Streaming);
                info!(stream = %self.shared.name, "Stream authenticated and subscribed");
            }
            Ok(Decoded::Reply(frame)) => self.shared.send(frame).await?,
            Ok(Decoded::Events(events)) => {
                for event in events {
                    (self.handler)(event);
                }
            }
            Ok(Decoded::Reconnect(reason)) => return Ok(Some(self.lost(reason))),
            Err(e) => {
                warn!(stream = %self.shared.name, error = %e, "Dropping undecodable frame");
            }
        }
        Ok(None)
    }
}

async fn next_tick(interval: Option<&mut Interval>) -> Instant {
    match interval {
        Some(interval) => interval.tick().await,
        None => std::future::pending().await,
    }
}

async fn heartbeat<C: WsCodec>(
    shared: Arc<Shared>,
    codec: Arc<C>,
    connector: Arc<dyn StreamConnector>,
    config: WsConfig,
    failed: oneshot::Sender<String>,
) {
    let start = Instant::now();
    let mut ping = interval_at(start + config.heartbeat_interval, config.heartbeat_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut keepalive = config
        .keepalive_interval
        .map(|period| interval_at(start + period, period));

    loop {
        tokio::select! {
            _ = ping.tick() => {
                if let Err(e) = shared.send(codec.heartbeat()).await {
                    let _ = failed.send(format!("heartbeat failed: {}", e));
                    return;
                }
            }
            _ = next_tick(keepalive.as_mut()) => {
                if let Err(e) = connector.keepalive().await {
                    warn!(stream = %shared.name, error = %e, "Stream keep-alive failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::accept_async;

    struct TextCodec;

    impl WsCodec for TextCodec {
        type Event = String;

        fn encode_subscription(&self, streams: &[String]) -> Result<Message, ExchangeError> {
            Ok(Message::Text(format!("sub:{}", streams.join(","))))
        }

        fn decode_message(&self, message: Message) -> Result<Decoded<String>, ExchangeError> {
            match message {
                Message::Text(text) if text == "ack" => Ok(Decoded::Subscribed),
                Message::Text(text) => Ok(Decoded::Events(vec![text])),
                _ => Ok(Decoded::Ignore),
            }
        }
    }

    struct FixedUrl {
        url: String,
        prepared: AtomicUsize,
    }

    #[async_trait]
    impl StreamConnector for FixedUrl {
        async fn prepare(&self) -> Result<StreamPlan, ExchangeError> {
            self.prepared.fetch_add(1, Ordering::SeqCst);
            let frame = TextCodec.encode_subscription(&["trades".to_string()])?;
            Ok(StreamPlan::subscribe(self.url.clone(), vec![frame]))
        }
    }

    fn fast_config() -> WsConfig {
        WsConfig::default()
            .with_reconnect_delay(Duration::from_millis(50))
            .with_heartbeat_interval(Duration::from_secs(30))
    }

    fn session(url: &str) -> (StreamSession<TextCodec>, Arc<FixedUrl>) {
        let connector = Arc::new(FixedUrl {
            url: url.to_string(),
            prepared: AtomicUsize::new(0),
        });
        let session = StreamSession::new("test/stream", TextCodec, connector.clone(), fast_config());
        (session, connector)
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (session, _) = session("ws://127.0.0.1:1");
        session.stop().await.unwrap();
        assert_eq!(session.state(), StreamState::Idle);

        session.start(Arc::new(|_| {})).await.unwrap();
        session.stop().await.unwrap();
        session.stop().await.unwrap();
        assert_eq!(session.state(), StreamState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_is_bounded_while_writer_is_held() {
        let (session, _) = session("ws://127.0.0.1:1");
        session.start(Arc::new(|_| {})).await.unwrap();

        let shared = Arc::clone(&session.shared);
        let (locked_tx, locked_rx) = tokio::sync::oneshot::channel();
        let holder = tokio::spawn(async move {
            let _guard = shared.writer.lock().await;
            let _ = locked_tx.send(());
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        locked_rx.await.unwrap();

        let started = std::time::Instant::now();
        tokio::time::timeout(STOP_TIMEOUT * 5, session.stop())
            .await
            .expect("stop must not wait on a held writer forever")
            .unwrap();
        assert!(started.elapsed() < STOP_TIMEOUT * 5);
        assert_eq!(session.state(), StreamState::Stopped);
        assert!(!session.is_running());
        holder.abort();
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (session, _) = session("ws://127.0.0.1:1");
        session.start(Arc::new(|_| {})).await.unwrap();
        let err = session.start(Arc::new(|_| {})).await.unwrap_err();
        assert!(matches!(err, ExchangeError::StreamAlreadyRunning(_)));
        session.stop().await.unwrap();

        // A stopped session can be started again
        session.start(Arc::new(|_| {})).await.unwrap();
        assert!(session.is_running());
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconnects_after_server_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            // First connection: take the subscription, then vanish
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            let _ = ws.next().await;
            drop(ws);

            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            let subscription = ws.next().await;
            assert!(matches!(subscription, Some(Ok(Message::Text(ref t))) if t == "sub:trades"));
            ws.send(Message::Text("ack".to_string())).await.unwrap();
            ws.send(Message::Text("hello".to_string())).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (session, connector) = session(&format!("ws://{}", addr));
        let (tx, mut rx) = mpsc::unbounded_channel();
        session
            .start(Arc::new(move |event: String| {
                let _ = tx.send(event);
            }))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event after reconnect");
        assert_eq!(event.as_deref(), Some("hello"));
        assert_eq!(connector.prepared.load(Ordering::SeqCst), 2);
        assert_eq!(session.state(), StreamState::Streaming);

        session.stop().await.unwrap();
        assert_eq!(session.state(), StreamState::Stopped);
    }

    #[tokio::test]
    async fn test_slot_rejects_second_session_while_running() {
        let slot = StreamSlot::new();
        assert_eq!(slot.state(), StreamState::Idle);
        slot.stop().await.unwrap();

        let (first, _) = session("ws://127.0.0.1:1");
        slot.start(first, Arc::new(|_| {})).await.unwrap();
        let (second, _) = session("ws://127.0.0.1:1");
        let err = slot.start(second, Arc::new(|_| {})).await.unwrap_err();
        assert!(matches!(err, ExchangeError::StreamAlreadyRunning(_)));

        slot.stop().await.unwrap();
        assert_eq!(slot.state(), StreamState::Stopped);
        let (third, _) = session("ws://127.0.0.1:1");
        slot.start(third, Arc::new(|_| {})).await.unwrap();
        slot.stop().await.unwrap();
    }
}
