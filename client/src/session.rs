//! Session lifecycle over the persistent websocket: bearer-token identity,
//! inbound dispatch to subscribers, and idle keepalive.
//!
//! Reconnect policy deliberately lives in the caller (see `network.rs`):
//! this component reports closes through `on_close` and stops, so the UI
//! can show a disconnect state and retries stay bounded.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ClientMessage, ServerMessage, KEEPALIVE_MS};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

type MessageHandler = Box<dyn FnMut(&ServerMessage) + Send>;
type CloseHandler = Box<dyn FnMut() + Send>;

/// Durable storage for the bearer token, which outlives in-memory session
/// state until explicit revocation.
pub trait TokenStore: Send {
    fn load(&self) -> Option<String>;
    fn save(&mut self, token: &str);
    fn clear(&mut self);
}

/// Persists the token to a single file (the fixed storage key). I/O
/// failures log a warning and degrade to in-memory behavior.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
            _ => None,
        }
    }

    fn save(&mut self, token: &str) {
        if let Err(e) = std::fs::write(&self.path, token) {
            warn!("failed to persist session token: {}", e);
        }
    }

    fn clear(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("failed to clear session token: {}", e);
            }
        }
    }
}

/// In-memory store for tests and token-less runs.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Option<String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.clone()
    }

    fn save(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    fn clear(&mut self) {
        self.token = None;
    }
}

/// Local identity state, populated by the first `welcome` message.
#[derive(Debug, Default, Clone)]
pub struct Session {
    pub player_id: Option<String>,
    pub spawned: bool,
    pub revoked: bool,
}

/// Handle returned by `on_message`/`on_close`; pass to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Owns the socket, the token, and the inbound dispatch path.
pub struct SessionConnection {
    url: String,
    token_store: Box<dyn TokenStore>,
    session: Session,
    sink: Option<WsSink>,
    stream: Option<WsStream>,
    last_sent: Option<Instant>,
    message_handlers: Vec<(u64, MessageHandler)>,
    close_handlers: Vec<(u64, CloseHandler)>,
    next_subscription: u64,
}

impl SessionConnection {
    /// `url` is the socket endpoint, e.g. `ws://host:port/ws`.
    pub fn new(url: impl Into<String>, token_store: Box<dyn TokenStore>) -> Self {
        Self {
            url: url.into(),
            token_store,
            session: Session::default(),
            sink: None,
            stream: None,
            last_sent: None,
            message_handlers: Vec::new(),
            close_handlers: Vec::new(),
            next_subscription: 1,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    /// Endpoint with the stored token as a query parameter when present.
    pub fn connect_url(&self) -> String {
        match self.token_store.load() {
            Some(token) => format!("{}?token={}", self.url, token),
            None => self.url.clone(),
        }
    }

    /// Opens the socket; no-op when already open.
    pub async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.is_connected() {
            return Ok(());
        }
        let url = self.connect_url();
        info!("connecting to {}", self.url);
        let (ws, _) = connect_async(url).await?;
        let (sink, stream) = ws.split();
        self.sink = Some(sink);
        self.stream = Some(stream);
        Ok(())
    }

    /// Serializes and transmits an intent. Returns false, without queuing,
    /// when the channel is not open or the write fails.
    pub async fn send(&mut self, message: &ClientMessage) -> bool {
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to encode intent: {}", e);
                return false;
            }
        };
        match sink.send(Message::Text(text)).await {
            Ok(()) => {
                self.last_sent = Some(Instant::now());
                true
            }
            Err(e) => {
                warn!("send on closed channel: {}", e);
                false
            }
        }
    }

    /// Receives and dispatches one inbound message. Malformed frames are
    /// dropped with a diagnostic and reading continues. Returns `None` once
    /// the stream ends, after firing close handlers.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            let frame = match self.stream.as_mut() {
                Some(stream) => stream.next().await,
                None => return None,
            };
            let text = match frame {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => {
                    self.handle_closed();
                    return None;
                }
                Some(Ok(_)) => continue, // ping/pong/binary
                Some(Err(e)) => {
                    warn!("transport error: {}", e);
                    self.handle_closed();
                    return None;
                }
            };
            let Some(message) = parse_frame(&text) else {
                continue;
            };
            if let Some(reply) = self.apply_inbound(&message) {
                self.send(&reply).await;
            }
            self.dispatch_message(&message);
            return Some(message);
        }
    }

    /// Session side effects of an inbound message; returns an intent the
    /// caller must send (the automatic spawn after an unspawned welcome).
    pub(crate) fn apply_inbound(&mut self, message: &ServerMessage) -> Option<ClientMessage> {
        match message {
            ServerMessage::Welcome {
                id,
                token,
                version,
                spawned,
            } => {
                info!("session established as {} (server v{})", id, version);
                self.session.player_id = Some(id.clone());
                self.session.spawned = *spawned;
                self.session.revoked = false;
                self.token_store.save(token);
                if !spawned {
                    return Some(ClientMessage::Spawn { settlement_id: 0 });
                }
                None
            }
            ServerMessage::SessionRevoked { reason } => {
                warn!("session revoked: {}", reason);
                self.session = Session {
                    revoked: true,
                    ..Session::default()
                };
                self.token_store.clear();
                None
            }
            _ => None,
        }
    }

    /// Sends a zero-motion intent when nothing has gone out for the
    /// keepalive interval, so an idle client is not disconnected.
    pub async fn maybe_keepalive(&mut self) {
        if !self.is_connected() {
            return;
        }
        let idle = match self.last_sent {
            Some(at) => at.elapsed() >= Duration::from_millis(KEEPALIVE_MS),
            None => true,
        };
        if idle {
            debug!("idle keepalive");
            self.send(&ClientMessage::idle_input()).await;
        }
    }

    /// Synchronously drops the socket and fires close handlers.
    pub fn close(&mut self) {
        if self.is_connected() {
            self.handle_closed();
        }
    }

    fn handle_closed(&mut self) {
        self.sink = None;
        self.stream = None;
        self.last_sent = None;
        info!("connection closed");
        for (_, handler) in &mut self.close_handlers {
            handler();
        }
    }

    pub fn on_message(&mut self, handler: impl FnMut(&ServerMessage) + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.message_handlers.push((id, Box::new(handler)));
        SubscriptionId(id)
    }

    pub fn on_close(&mut self, handler: impl FnMut() + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.close_handlers.push((id, Box::new(handler)));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.message_handlers.retain(|(handler_id, _)| *handler_id != id.0);
        self.close_handlers.retain(|(handler_id, _)| *handler_id != id.0);
    }

    fn dispatch_message(&mut self, message: &ServerMessage) {
        for (_, handler) in &mut self.message_handlers {
            handler(message);
        }
    }
}

/// Parses one text frame; malformed payloads and unrecognized `type`
/// values are logged and dropped, never fatal to the handler chain.
fn parse_frame(text: &str) -> Option<ServerMessage> {
    match serde_json::from_str(text) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("dropping malformed frame: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn connection_with(store: MemoryTokenStore) -> SessionConnection {
        SessionConnection::new("ws://localhost:9000/ws", Box::new(store))
    }

    #[test]
    fn test_connect_url_without_token() {
        let conn = connection_with(MemoryTokenStore::new());
        assert_eq!(conn.connect_url(), "ws://localhost:9000/ws");
    }

    #[test]
    fn test_connect_url_includes_stored_token() {
        let conn = connection_with(MemoryTokenStore::with_token("tok-7"));
        assert_eq!(conn.connect_url(), "ws://localhost:9000/ws?token=tok-7");
    }

    #[test]
    fn test_welcome_persists_token_and_spawns_when_unspawned() {
        let mut conn = connection_with(MemoryTokenStore::new());
        let reply = conn.apply_inbound(&ServerMessage::Welcome {
            id: "p-1".into(),
            token: "tok-new".into(),
            version: 1,
            spawned: false,
        });

        assert!(matches!(reply, Some(ClientMessage::Spawn { .. })));
        assert_eq!(conn.session().player_id.as_deref(), Some("p-1"));
        assert!(!conn.session().spawned);
        assert_eq!(conn.connect_url(), "ws://localhost:9000/ws?token=tok-new");
    }

    #[test]
    fn test_welcome_when_already_spawned_sends_nothing() {
        let mut conn = connection_with(MemoryTokenStore::new());
        let reply = conn.apply_inbound(&ServerMessage::Welcome {
            id: "p-1".into(),
            token: "tok".into(),
            version: 1,
            spawned: true,
        });
        assert!(reply.is_none());
        assert!(conn.session().spawned);
    }

    #[test]
    fn test_revocation_clears_token_and_session() {
        let mut conn = connection_with(MemoryTokenStore::with_token("tok-old"));
        conn.apply_inbound(&ServerMessage::Welcome {
            id: "p-1".into(),
            token: "tok-old".into(),
            version: 1,
            spawned: true,
        });

        conn.apply_inbound(&ServerMessage::SessionRevoked {
            reason: "expired".into(),
        });
        assert!(conn.session().revoked);
        assert!(conn.session().player_id.is_none());
        assert_eq!(conn.connect_url(), "ws://localhost:9000/ws");
    }

    #[test]
    fn test_parse_frame_drops_malformed_payloads() {
        assert!(parse_frame("{oops").is_none());
        assert!(parse_frame(r#"{"type":"mystery"}"#).is_none());
        assert!(parse_frame(r#"{"type":"notification","text":"hi"}"#).is_some());
    }

    #[test]
    fn test_subscribers_dispatch_and_unsubscribe() {
        let mut conn = connection_with(MemoryTokenStore::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let first = conn.on_message(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&seen);
        let _second = conn.on_message(move |_| {
            counter.fetch_add(10, Ordering::SeqCst);
        });

        let message = ServerMessage::Notification { text: "hi".into() };
        conn.dispatch_message(&message);
        assert_eq!(seen.load(Ordering::SeqCst), 11);

        conn.unsubscribe(first);
        conn.dispatch_message(&message);
        assert_eq!(seen.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn test_close_without_connection_is_a_no_op() {
        let mut conn = connection_with(MemoryTokenStore::new());
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        conn.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Never connected: nothing to close, nothing fires.
        conn.close();
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_on_closed_channel_fails_softly() {
        let mut conn = connection_with(MemoryTokenStore::new());
        assert!(!conn.send(&ClientMessage::idle_input()).await);
    }
}
