//! Streaming speech-recognition WebSocket server
//!
//! Multiplexes many simultaneous audio streams over long-lived WebSocket
//! connections onto a shared recognizer, and serves a small static HTTP
//! surface on the same listening socket.
//!
//! # Architecture
//!
//! ```text
//! WebSocket frames → Connection tasks → Registry (ConnId → Session)
//!                          │
//!                          ▼
//!                    Dispatcher (ready queue + active set)
//!                          │
//!                          ▼
//!                    Compute pool — Recognizer decode steps
//!                          │
//!                          ▼
//!                    Writer tasks → hypothesis JSON / "Done"
//! ```
//!
//! Connection state lives on the async runtime; decode steps run on the
//! blocking pool. The dispatcher's FIFO queue plus its active set give
//! round-robin progress across streams and at most one decode step per
//! stream at any instant. The model itself is an external collaborator
//! behind the [`recognizer::Recognizer`] capability.

pub mod config;
pub mod error;
pub mod logging;
pub mod recognizer;
pub mod server;

// Re-exports for convenience
pub use config::{RecognizerConfig, ServerConfig};
pub use error::{Error, Result};
pub use server::StreamingServer;
