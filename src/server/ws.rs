//! Per-connection WebSocket handling
//!
//! Each connection runs as a pair of tasks: the reader below parses frames
//! and feeds the stream, while a writer task exclusively owns the sink and
//! drains an unbounded channel, so outgoing frames for one handle are never
//! interleaved. The channel sender lives in the registry; dropping the
//! registry entry is what lets the writer wind down.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::dispatcher::Dispatcher;
use super::registry::ConnectionRegistry;
use super::session::{ConnId, Session};
use crate::recognizer::{OnlineStream, Recognizer};

pub(crate) struct ConnectionContext {
    pub recognizer: Arc<dyn Recognizer>,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Dispatcher,
    pub tail_padding_secs: f32,
}

pub(crate) async fn run_connection(socket: WebSocket, remote: SocketAddr, ctx: ConnectionContext) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                warn!("Failed to send frame to {}: {}", remote, e);
            }
        }
        let _ = ws_tx.close().await;
    });

    let conn = ConnId::new();
    let session = Arc::new(Session::new(ctx.recognizer.create_stream(), remote));
    ctx.registry.on_open(conn, session.clone(), tx);

    let sample_rate = ctx.recognizer.sample_rate();

    while let Some(message) = ws_rx.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!("Transport error from {}: {}", remote, e);
                break;
            }
        };

        match message {
            Message::Binary(payload) => {
                if payload.len() % 4 != 0 {
                    warn!(
                        "Dropping audio frame from {}: {} bytes is not a whole number of samples",
                        remote,
                        payload.len()
                    );
                    continue;
                }

                // The payload buffer belongs to the transport; unpack the
                // samples into stream-owned storage before it goes away.
                let samples: Vec<f32> = payload
                    .chunks_exact(4)
                    .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
                    .collect();

                session.stream().accept_waveform(sample_rate, &samples);
                maybe_dispatch(conn, &session, &ctx);
            }
            Message::Text(text) if text == "Done" => {
                // Flush the model's right context with trailing silence,
                // then mark the stream terminal.
                let tail =
                    vec![0.0f32; (ctx.tail_padding_secs * sample_rate as f32) as usize];
                session.stream().accept_waveform(sample_rate, &tail);
                session.stream().input_finished();
                maybe_dispatch(conn, &session, &ctx);
            }
            Message::Text(other) => {
                debug!("Ignoring text frame from {}: {}", remote, other);
            }
            Message::Close(_) => break,
            // Pings are answered by the transport layer
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    // Removing the entry drops the writer's sender; the writer drains what
    // is already queued and closes the socket.
    ctx.registry.on_close(conn);
    let _ = writer.await;
}

fn maybe_dispatch(conn: ConnId, session: &Arc<Session>, ctx: &ConnectionContext) {
    if session.stream().is_ready() && ctx.dispatcher.push(conn, session.clone()) {
        ctx.dispatcher.schedule();
    }
}
