//! Decoder dispatcher
//!
//! FIFO ready queue of `(ConnId, Session)` pairs awaiting a decode step,
//! plus the active set of stream identities currently queued or decoding.
//! Both live under one small mutex (the dispatcher lock), distinct from the
//! registry lock; no code path holds the two at once.
//!
//! Work units run on tokio's blocking pool: one [`Dispatcher::decode`] call
//! pops one stream, runs one blocking decode step, ships the hypothesis to
//! the connection's writer, and either re-queues the stream (round-robin
//! across active streams) or retires it from the active set. A stream is in
//! the active set exactly while it is enqueued or decoding, which is what
//! guarantees at most one decode step per stream at any instant.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{error, warn};

use super::registry::ConnectionRegistry;
use super::session::{ConnId, Session, StreamId};
use crate::recognizer::OnlineStream;

struct DispatchState {
    queue: VecDeque<(ConnId, Arc<Session>)>,
    active: HashSet<StreamId>,
}

struct Inner {
    state: Mutex<DispatchState>,
    registry: Arc<ConnectionRegistry>,
    runtime: Handle,
    max_queue: usize,
}

/// Cheap-to-clone handle; clones share the queue and active set.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Captures the current tokio runtime handle for posting decode work;
    /// call from within the runtime.
    pub fn new(registry: Arc<ConnectionRegistry>, max_queue: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(DispatchState {
                    queue: VecDeque::new(),
                    active: HashSet::new(),
                }),
                registry,
                runtime: Handle::current(),
                max_queue,
            }),
        }
    }

    /// Enqueue a stream for a decode step. Idempotent: a stream that is
    /// already queued or decoding is left untouched. Returns false only
    /// when a new stream is refused because the queue sits at its
    /// high-water mark.
    pub fn push(&self, conn: ConnId, session: Arc<Session>) -> bool {
        let mut state = self.inner.state.lock();
        if state.active.contains(&session.id()) {
            return true;
        }

        if state.queue.len() >= self.inner.max_queue {
            warn!(
                "Ready queue at high-water mark ({}), refusing stream {}",
                self.inner.max_queue,
                session.id()
            );
            return false;
        }

        state.active.insert(session.id());
        state.queue.push_back((conn, session));
        gauge!("asr_ready_queue_depth", state.queue.len() as f64);
        true
    }

    /// Post one decode work unit to the compute pool. Never runs inline.
    pub fn schedule(&self) {
        let dispatcher = self.clone();
        self.inner.runtime.spawn_blocking(move || dispatcher.decode());
    }

    /// One decode work unit. Runs on the compute pool; blocking.
    pub fn decode(&self) {
        let (conn, session) = {
            let mut state = self.inner.state.lock();
            let Some(pair) = state.queue.pop_front() else {
                return;
            };
            gauge!("asr_ready_queue_depth", state.queue.len() as f64);
            pair
        };
        // The stream stays in the active set while its step runs, so a
        // concurrent push cannot enqueue it a second time.

        let registry = &self.inner.registry;
        let stream = session.stream();
        if let Err(e) = stream.decode() {
            error!("Decode step failed for {}: {}", conn, e);
            let payload = serde_json::json!({ "error": e.to_string() }).to_string();
            registry.send(conn, payload);
            self.inner.state.lock().active.remove(&session.id());
            return;
        }
        counter!("asr_decode_steps", 1);

        registry.send(conn, stream.result().as_json());

        if registry.contains(conn) && stream.is_ready() {
            // Back of the line: other active streams get their step first.
            {
                let mut state = self.inner.state.lock();
                state.queue.push_back((conn, session.clone()));
                gauge!("asr_ready_queue_depth", state.queue.len() as f64);
            }
            self.schedule();
        } else {
            self.inner.state.lock().active.remove(&session.id());

            let last_frame_decoded = stream
                .num_frames_ready()
                .checked_sub(1)
                .is_some_and(|frame| stream.is_last_frame(frame));
            if last_frame_decoded {
                registry.send(conn, "Done");
            }
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn active_streams(&self) -> usize {
        self.inner.state.lock().active.len()
    }
}
