//! Connection handles and per-connection decoding sessions

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use uuid::Uuid;

use crate::recognizer::OnlineStream;

/// Opaque handle for one WebSocket connection, issued at upgrade time.
/// Valid from registry insert until the close path removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stream identity used by the dispatcher's active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(Uuid);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-connection decoding session.
///
/// Co-created with its [`ConnId`] when the connection opens. Ref-counted:
/// the registry, a ready-queue entry, and an in-flight decode step may all
/// hold it at once, so a session outlives a concurrent close until the last
/// holder drops it.
pub struct Session {
    id: StreamId,
    stream: Arc<dyn OnlineStream>,
    remote: SocketAddr,
}

impl Session {
    pub fn new(stream: Arc<dyn OnlineStream>, remote: SocketAddr) -> Self {
        Self {
            id: StreamId(Uuid::new_v4()),
            stream,
            remote,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn stream(&self) -> &dyn OnlineStream {
        self.stream.as_ref()
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }
}
