//! Connection registry
//!
//! The sole mutable index of live sessions: a handle is present exactly
//! while its connection is open. Everything here runs under one small
//! mutex (the registry lock), which is never held across an await, a
//! decode step, or the dispatcher lock.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use metrics::gauge;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use super::session::{ConnId, Session};

struct ConnectionEntry {
    session: Arc<Session>,
    tx: UnboundedSender<Message>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnId, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly opened connection.
    pub fn on_open(&self, conn: ConnId, session: Arc<Session>, tx: UnboundedSender<Message>) {
        let mut connections = self.connections.lock();
        info!("New connection: {}", session.remote());
        connections.insert(conn, ConnectionEntry { session, tx });

        let count = connections.len();
        gauge!("asr_active_connections", count as f64);
        info!("Number of active connections: {}", count);
    }

    /// Remove a closed connection. Sessions still referenced by the
    /// dispatcher stay alive; later sends to this handle become no-ops.
    pub fn on_close(&self, conn: ConnId) {
        let mut connections = self.connections.lock();
        if let Some(entry) = connections.remove(&conn) {
            info!("Closed connection: {}", entry.session.remote());
        }

        let count = connections.len();
        gauge!("asr_active_connections", count as f64);
        info!("Number of active connections: {}", count);
    }

    pub fn contains(&self, conn: ConnId) -> bool {
        self.connections.lock().contains_key(&conn)
    }

    pub fn session(&self, conn: ConnId) -> Option<Arc<Session>> {
        self.connections.lock().get(&conn).map(|entry| entry.session.clone())
    }

    /// Queue a text frame for the connection's writer task. Unknown handles
    /// and closed channels are ignored: the connection raced a close.
    pub fn send(&self, conn: ConnId, text: impl Into<String>) {
        let connections = self.connections.lock();
        let Some(entry) = connections.get(&conn) else {
            return;
        };

        if entry.tx.send(Message::Text(text.into())).is_err() {
            debug!("Dropping frame for {}: writer already gone", conn);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecognizerConfig;
    use crate::recognizer::{drill::DrillRecognizer, Recognizer};
    use tokio::sync::mpsc;

    fn session() -> Arc<Session> {
        let recognizer = DrillRecognizer::new(&RecognizerConfig::default());
        Arc::new(Session::new(
            recognizer.create_stream(),
            "127.0.0.1:9999".parse().unwrap(),
        ))
    }

    #[test]
    fn test_open_close_tracks_membership() {
        let registry = ConnectionRegistry::new();
        let conn = ConnId::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        registry.on_open(conn, session(), tx);
        assert!(registry.contains(conn));
        assert_eq!(registry.len(), 1);

        registry.on_close(conn);
        assert!(!registry.contains(conn));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_send_after_close_is_a_noop() {
        let registry = ConnectionRegistry::new();
        let conn = ConnId::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.on_open(conn, session(), tx);
        registry.on_close(conn);
        registry.send(conn, "hello");

        assert!(rx.try_recv().is_err(), "no frame may reach a closed handle");
    }

    #[test]
    fn test_send_reaches_writer_channel() {
        let registry = ConnectionRegistry::new();
        let conn = ConnId::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.on_open(conn, session(), tx);
        registry.send(conn, "hypothesis");

        match rx.try_recv().unwrap() {
            Message::Text(text) => assert_eq!(text, "hypothesis"),
            other => panic!("expected text frame, got {:?}", other),
        }
    }
}
