//! # StackExchange Push Session
//!
//! A single websocket subscription to the StackExchange question socket.
//!
//! ## Frames
//! - inbound `pong`: reply to our liveness ping, no payload.
//! - inbound `{"action":"hb","data":...}`: heartbeat, `data` must be echoed back verbatim.
//! - inbound `{"action":"<site>-questions-newest-tag-<tag>","data":"<json>"}`: new question.
//! - outbound `ping`, topic subscriptions and heartbeat echoes, all plain text.
//!
//! ## Lifecycle
//! `connect` spawns a writer task fed by a channel, a receive loop and a
//! keepalive loop. When the receive loop ends for any reason other than an
//! explicit `shutdown`, the session drops back to `Disconnected` and raises
//! the sticky `connection_error` flag. There is no reconnect; restarting the
//! process is the recovery path.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::stackexchange::model::{topic_for, NewQuestionMessage, SocketEnvelope};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Boxed future returned by listeners.
pub type ListenerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Callback invoked once per "new question" notification with the raw topic
/// and the announced id/tags.
pub type NewQuestionListener = Arc<dyn Fn(String, NewQuestionMessage) -> ListenerFuture + Send + Sync>;

/// Configuration of the push socket.
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub url: String,
    /// How often the keepalive loop wakes up; also the silence threshold before pinging.
    pub ping_interval: Duration,
    /// How long to wait for any frame after a ping.
    pub pong_grace: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: "wss://qa.sockets.stackexchange.com/".to_string(),
            ping_interval: Duration::from_secs(120),
            pong_grace: Duration::from_secs(15),
        }
    }
}

/// Errors surfaced by `connect`.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("websocket session already active")]
    AlreadyConnected,

    #[error("failed to open websocket: {0}")]
    Connect(String),
}

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// A decoded inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Pong,
    /// Heartbeat; the payload goes back out unchanged.
    Heartbeat(String),
    Announcement { topic: String, message: NewQuestionMessage },
}

/// Decodes one text frame.
pub fn parse_frame(text: &str) -> Result<InboundFrame, serde_json::Error> {
    if text == "pong" {
        return Ok(InboundFrame::Pong);
    }
    let envelope: SocketEnvelope = serde_json::from_str(text)?;
    if envelope.action == "hb" {
        return Ok(InboundFrame::Heartbeat(envelope.data));
    }
    let message: NewQuestionMessage = serde_json::from_str(&envelope.data)?;
    Ok(InboundFrame::Announcement {
        topic: envelope.action,
        message,
    })
}

/// Per-connection handles. Dropping it closes the outbound channel (the
/// writer task then closes the socket) and wakes both loops.
struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    _closed: watch::Sender<()>,
}

struct Shared {
    connection: Mutex<Option<Connection>>,
    listeners: RwLock<Vec<NewQuestionListener>>,
    last_contact: Mutex<Instant>,
    connection_error: AtomicBool,
}

impl Shared {
    fn touch(&self) {
        *self.last_contact.lock().expect("last_contact lock poisoned") = Instant::now();
    }

    fn last_contact(&self) -> Instant {
        *self.last_contact.lock().expect("last_contact lock poisoned")
    }

    /// Queues a text frame. Returns false when there is no live connection.
    fn send_text(&self, text: String) -> bool {
        let guard = self.connection.lock().expect("connection lock poisoned");
        match guard.as_ref() {
            Some(conn) => conn.outbound.send(Message::Text(text.into())).is_ok(),
            None => false,
        }
    }

    fn listeners(&self) -> Vec<NewQuestionListener> {
        self.listeners.read().expect("listeners lock poisoned").clone()
    }
}

/// The push session. Cheap to share behind an `Arc`.
pub struct PushSession {
    config: PushConfig,
    shared: Arc<Shared>,
}

impl PushSession {
    pub fn new(config: PushConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                connection: Mutex::new(None),
                listeners: RwLock::new(Vec::new()),
                last_contact: Mutex::new(Instant::now()),
                connection_error: AtomicBool::new(false),
            }),
        }
    }

    /// Registers a listener for new-question notifications.
    pub fn add_listener<F, Fut>(&self, listener: F)
    where
        F: Fn(String, NewQuestionMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: NewQuestionListener =
            Arc::new(move |topic: String, message: NewQuestionMessage| -> ListenerFuture {
                Box::pin(listener(topic, message))
            });
        self.shared
            .listeners
            .write()
            .expect("listeners lock poisoned")
            .push(boxed);
    }

    pub fn state(&self) -> SessionState {
        if self.is_connected() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .connection
            .lock()
            .expect("connection lock poisoned")
            .is_some()
    }

    /// Sticky: once the socket died unexpectedly this stays true.
    pub fn connection_error(&self) -> bool {
        self.shared.connection_error.load(Ordering::SeqCst)
    }

    /// Opens the socket and starts the receive and keepalive loops.
    pub async fn connect(&self) -> Result<(), PushError> {
        if self.is_connected() {
            return Err(PushError::AlreadyConnected);
        }

        let (ws_stream, _) = connect_async(self.config.url.as_str())
            .await
            .map_err(|e| PushError::Connect(e.to_string()))?;
        let (write, read) = ws_stream.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(());

        {
            let mut guard = self.shared.connection.lock().expect("connection lock poisoned");
            if guard.is_some() {
                return Err(PushError::AlreadyConnected);
            }
            *guard = Some(Connection {
                outbound: out_tx,
                _closed: closed_tx,
            });
        }
        self.shared.touch();
        log::info!("Websocket connected to {}", self.config.url);

        tokio::spawn(write_loop(write, out_rx));
        tokio::spawn(receive_loop(Arc::clone(&self.shared), read, closed_rx.clone()));
        tokio::spawn(keepalive_loop(
            Arc::clone(&self.shared),
            self.config.ping_interval,
            self.config.pong_grace,
            closed_rx,
        ));
        Ok(())
    }

    /// Subscribes to new questions with `tag` on the site with numeric id `site_id`.
    ///
    /// # Panics
    /// When there is no active session.
    pub fn subscribe_topic(&self, site_id: u32, tag: &str) {
        let topic = topic_for(site_id, tag);
        assert!(self.shared.send_text(topic.clone()), "No active websocket to subscribe {}", topic);
        log::info!("Subscribed to tag {} on site {}", tag, site_id);
    }

    /// Closes the socket without raising the error flag.
    pub fn shutdown(&self) {
        let conn = self.shared.connection.lock().expect("connection lock poisoned").take();
        if conn.is_some() {
            log::info!("Websocket shutting down");
        }
    }
}

async fn write_loop(mut write: SplitSink<WsStream, Message>, mut outbound: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = write.send(message).await {
            log::error!("Failed to send websocket frame: {}", e);
            break;
        }
    }
    let _ = write.close().await;
    log::debug!("Websocket writer stopped");
}

async fn receive_loop(shared: Arc<Shared>, mut read: SplitStream<WsStream>, mut closed: watch::Receiver<()>) {
    log::debug!("Started: websocket receive loop");
    loop {
        tokio::select! {
            _ = closed.changed() => break,
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        shared.touch();
                        handle_text(&shared, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        shared.touch();
                        log::warn!("Websocket closed by remote host: {:?}", frame);
                        break;
                    }
                    Some(Ok(other)) => {
                        shared.touch();
                        log::warn!("Skipping unexpected frame {:?}", other);
                    }
                    Some(Err(e)) => {
                        log::error!("Websocket read error: {}", e);
                        break;
                    }
                    None => {
                        log::warn!("Websocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    let unexpected = shared.connection.lock().expect("connection lock poisoned").take().is_some();
    if unexpected {
        shared.connection_error.store(true, Ordering::SeqCst);
        log::error!("Websocket disconnected; new questions will only show up on scheduled polls");
    }
    log::info!("Cancelled: websocket receive loop");
}

async fn handle_text(shared: &Shared, text: &str) {
    log::debug!("Received frame {}", text);
    match parse_frame(text) {
        Ok(InboundFrame::Pong) => {}
        Ok(InboundFrame::Heartbeat(data)) => {
            log::trace!("Responding to heartbeat: {}", data);
            if !shared.send_text(data) {
                log::warn!("Heartbeat arrived without an outbound channel");
            }
        }
        Ok(InboundFrame::Announcement { topic, message }) => {
            log::info!("Received new question: {:?} on {}", message, topic);
            for listener in shared.listeners() {
                listener(topic.clone(), message.clone()).await;
            }
        }
        Err(e) => log::error!("Error parsing frame {}: {}", text, e),
    }
}

async fn keepalive_loop(
    shared: Arc<Shared>,
    ping_interval: Duration,
    pong_grace: Duration,
    mut closed: watch::Receiver<()>,
) {
    let silence = ping_interval.saturating_sub(Duration::from_secs(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = closed.changed() => break,
            _ = ticker.tick() => {
                if shared.last_contact().elapsed() < silence {
                    continue;
                }
                log::debug!("Sending ping");
                let pinged_at = Instant::now();
                if !shared.send_text("ping".to_string()) {
                    break;
                }
                tokio::select! {
                    _ = closed.changed() => break,
                    _ = tokio::time::sleep(pong_grace) => {}
                }
                // Observational only: the session stays up.
                if shared.last_contact() < pinged_at {
                    log::error!("Ping did not receive pong response");
                }
            }
        }
    }
    log::debug!("Cancelled: websocket keepalive loop");
}
